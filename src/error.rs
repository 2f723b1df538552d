//! Construction-time errors.
//!
//! Search failures are not errors: a search always completes and reports
//! through its `success` flag.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("node size must be positive, got {0}")]
    InvalidNodeSize(f32),
    #[error("grid needs at least one box")]
    NoBoxes,
}
