//! cadence-core: Scoring, classification, and coaching feedback.
//!
//! This crate compares a learner's recording against a reference recording of
//! the same passage and turns the two feature summaries into category scores,
//! a coarse skill label, and coaching tips produced by an external
//! text-generation backend.

pub mod classify;
pub mod difference;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod statistics;
pub mod traits;
pub mod transcript;
