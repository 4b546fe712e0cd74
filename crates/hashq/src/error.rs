//! Error types for the hashing service.
//!
//! This module defines the central [`Error`] enum, which captures every
//! reportable failure of the dispatch and lookup paths. Transport layers map
//! each variant onto their own status codes; the core never retries.
//!
//! ## Error Cases
//! - `InvalidInput`: A dispatch was attempted with no value to hash.
//! - `NotFound`: No result is stored for the identifier (never dispatched, not
//!   yet completed, or its transform failed).
//! - `MalformedId`: An identifier could not be parsed as a positive integer.
//! - `Transform`: A deferred computation failed. Only ever logged, since the
//!   caller already received its identifier.
//! - `ServiceShutdown`: Work arrived after draining began.
//! - `Exhausted`: Every identifier up to `u64::MAX` has been issued.

use crate::HashId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the hashing service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The value to dispatch was missing or empty.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No result is stored under the identifier.
    #[error("No result found for id {id}")]
    NotFound { id: HashId },

    /// The identifier is not a positive integer.
    #[error("Malformed id {raw:?}: expected a positive integer")]
    MalformedId { raw: String },

    /// The deferred computation failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Draining has begun and no new work is accepted.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// No identifiers are left to issue.
    #[error("Identifier space exhausted")]
    Exhausted,
}

/// Failure reported by a [`Transform`](crate::Transform).
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[error("Transform failed: {reason}")]
pub struct TransformError {
    pub reason: String,
}

impl TransformError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
