//! Canonical error and result types for the crate.
//!
//! Transport plumbing never surfaces raw I/O errors: connection operations
//! report failures through their boolean or `Option` results and the
//! connection state. `ChatNetError` covers what remains: rejected arguments,
//! operations that are illegal in the current state, and failures of helpers
//! that sit outside the transport (address resolution, worker startup,
//! pattern compilation).

use std::io;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Top-level error type exposed by `chatnet`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChatNetError {
    /// An argument was rejected at the call boundary.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// The operation is not permitted while the connection is in this state.
    #[error("operation not permitted while {0}")]
    IllegalState(ConnectionState),
    /// An I/O failure outside the connection's own transport handling.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A user supplied regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl ChatNetError {
    /// Shorthand for [`ChatNetError::InvalidArgument`].
    #[must_use]
    pub fn invalid(name: &'static str, reason: &'static str) -> Self {
        Self::InvalidArgument { name, reason }
    }

    /// Returns true if the error reports a closed connection.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::IllegalState(ConnectionState::Closed))
    }
}

/// Canonical result alias used by `chatnet` public APIs.
pub type Result<T> = std::result::Result<T, ChatNetError>;
