//! Request/response envelope.
//!
//! Every request gets a structured answer: either a result, or a failure
//! message with a null result. Panics inside the analysis are caught by
//! [`guard`] and reported like any other failure.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::error;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub file: String,
    pub status: Status,
    pub message: Option<String>,
    pub result: Option<T>,
}

impl<T> Response<T> {
    pub fn success(file: impl Into<String>, result: T) -> Self {
        Self {
            file: file.into(),
            status: Status::Success,
            message: None,
            result: Some(result),
        }
    }

    pub fn failed(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: Status::Failed,
            message: Some(message.into()),
            result: None,
        }
    }

    pub fn from_outcome(file: impl Into<String>, outcome: Result<T>) -> Self {
        let file = file.into();
        match outcome {
            Ok(result) => Self::success(file, result),
            Err(e) => {
                error!(file = %file, error = %e, "Request failed");
                Self::failed(file, e.to_string())
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Runs `f`, converting a panic into [`AnalysisError::Internal`].
pub fn guard<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        Err(AnalysisError::Internal(panic_message(panic.as_ref())))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "analysis panicked".to_string()
    }
}
