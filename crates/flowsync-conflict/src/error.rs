//! Error types for the conflict crate

use thiserror::Error;

/// Errors that can occur while comparing workflows
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A workflow section could not be converted to JSON for comparison
    #[error("cannot serialize {section} for comparison: {reason}")]
    Serialization { section: String, reason: String },
}
