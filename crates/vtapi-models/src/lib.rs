//! Shared data models for the video transcoding API.
//!
//! This crate provides Serde-serializable types for:
//! - Transcoding jobs and their provider binding
//! - Streaming output parameters
//! - Job listing filters

pub mod filter;
pub mod job;

// Re-export common types
pub use filter::JobFilter;
pub use job::{Job, JobId, JobValidationError, StreamingParams};
