//! gradepath-core — grading, progress, and skill-mastery computation.
//!
//! This crate defines the data model, the pure computation services, the
//! persistence and notification traits, and the pipeline that runs the
//! services in order and issues the resulting writes.

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod progress;
pub mod report;
pub mod scorer;
pub mod skill;
pub mod traits;
pub mod weights;
