//! Error types for registry synchronization
//!
//! Every failure the engine can report falls into one of five kinds:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`KitforgeError::Validation`] | `VALIDATION` | No |
//! | [`KitforgeError::Io`] | `IO` | Yes |
//! | [`KitforgeError::Parse`] | `PARSE` | No |
//! | [`KitforgeError::NotFound`] | `NOT_FOUND` | No |
//! | [`KitforgeError::RateLimited`] | `RATE_LIMITED` | Yes |
//!
//! Catalog store failures arrive as [`KitforgeError::Catalog`] and are
//! translated by the service layer before they reach a caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the registry, the rate limiter and the service layer
#[derive(Error, Debug)]
pub enum KitforgeError {
    /// Malformed slug, name, code or metadata. Raised before any I/O.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Reading, writing or deleting a registry artifact failed
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing index or manifest is not in the expected shape
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A slug or id that was assumed present is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Admission denied by a rate limiter
    #[error("Rate limit exceeded for '{identifier}' ({limit} requests per window, resets at {reset_at})")]
    RateLimited {
        identifier: String,
        remaining: u32,
        reset_at: i64,
        limit: u32,
    },

    /// Store-specific failure from the catalog collaborator
    #[error("Catalog store error: {0}")]
    Catalog(String),

    /// The registry actor is gone (shut down or panicked)
    #[error("Registry actor unavailable")]
    ActorUnavailable,
}

impl KitforgeError {
    /// Build an I/O error tagged with the path being touched
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KitforgeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a parse error tagged with the path being read
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        KitforgeError::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            KitforgeError::Validation(_) => "VALIDATION",
            KitforgeError::Io { .. } | KitforgeError::Catalog(_) => "IO",
            KitforgeError::ActorUnavailable => "IO",
            KitforgeError::Parse { .. } => "PARSE",
            KitforgeError::NotFound(_) => "NOT_FOUND",
            KitforgeError::RateLimited { .. } => "RATE_LIMITED",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KitforgeError::Io { .. }
                | KitforgeError::Catalog(_)
                | KitforgeError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KitforgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(KitforgeError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(KitforgeError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(KitforgeError::Catalog("down".into()).code(), "IO");
        assert_eq!(KitforgeError::parse("registry.json", "bad").code(), "PARSE");
    }

    #[test]
    fn test_rate_limited_is_recoverable() {
        let err = KitforgeError::RateLimited {
            identifier: "user-1".into(),
            remaining: 0,
            reset_at: 1_000,
            limit: 10,
        };
        assert!(err.is_recoverable());
        assert!(!KitforgeError::Validation("bad slug".into()).is_recoverable());
    }
}
