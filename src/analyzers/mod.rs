//! Trip analysis and cross-trip aggregation.
//!
//! A parsed trip is split into segments, each segment runs through the six
//! extractors (overall, driving, engine, fap, fap regen and fuel) to form one
//! `AnalysisResult`, and any number of results can be averaged into an
//! `AverageResult`.

pub mod aggregate;
pub mod analyzer;
pub mod derived;
pub mod driving;
pub mod engine;
pub mod fap;
pub mod fap_regen;
pub mod fuel;
pub mod overall;
pub mod segment;
pub mod types;
pub mod utility;
