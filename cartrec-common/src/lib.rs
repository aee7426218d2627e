//! Shared types for cartrec services
//!
//! Error taxonomy and job progress types used by the import engine and by
//! anything that polls import progress.

pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{ImportStats, JobSnapshot, JobStatus, JobSummary};
