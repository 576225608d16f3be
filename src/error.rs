//! Error types for the postMessage monitor.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use postmessage_monitor::{Result, Error};
//!
//! fn example(ctx: &Context) -> Result<()> {
//!     let child = ctx.spawn_child("https://widget.example")?;
//!     child.post_message(Payload::json(serde_json::json!({"x": 1})), "*");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Snapshotting | [`Error::Snapshot`] |
//! | Frame tree | [`Error::AccessDenied`], [`Error::Detached`] |
//! | Delivery | [`Error::ChannelClosed`] |
//! | Instrumentation | [`Error::Instrumentation`] |
//! | External | [`Error::Json`] |
//!
//! No error in this crate is fatal to the instrumented page: hook bodies
//! catch these locally, log them, and still delegate to the raw primitive.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::ContextId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when monitor configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Snapshot Errors
    // ========================================================================
    /// Payload refused a structural snapshot.
    ///
    /// Recovered locally by substituting a degraded descriptor carrying the
    /// payload's runtime type tag.
    #[error("Payload cannot be snapshotted: {type_tag}")]
    Snapshot {
        /// Runtime type tag of the offending payload.
        type_tag: String,
    },

    // ========================================================================
    // Frame Tree Errors
    // ========================================================================
    /// Cross-origin access denied while walking the frame tree.
    ///
    /// Recovered locally by path resolution returning a sentinel string.
    #[error("Cross-origin access denied: {origin} -> {target_origin}")]
    AccessDenied {
        /// Origin of the context performing the access.
        origin: String,
        /// Origin of the context being accessed.
        target_origin: String,
    },

    /// Context is no longer attached to a frame tree.
    ///
    /// Returned when a parent chain cannot be walked because the context
    /// was navigated away or dropped.
    #[error("Context detached: {context_id}")]
    Detached {
        /// The detached context's ID.
        context_id: ContextId,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// Notice channel closed (receiver gone).
    ///
    /// Swallowed by the best-effort sender and logged at debug level;
    /// surfaced only from explicit receiver-side operations.
    #[error("Notice channel closed")]
    ChannelClosed,

    // ========================================================================
    // Instrumentation Errors
    // ========================================================================
    /// Unexpected failure inside an instrumentation hook.
    ///
    /// Caught at the hook boundary; the wrapped primitive is still invoked.
    #[error("Instrumentation error: {message}")]
    Instrumentation {
        /// Description of the internal failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a snapshot error.
    #[inline]
    pub fn snapshot(type_tag: impl Into<String>) -> Self {
        Self::Snapshot {
            type_tag: type_tag.into(),
        }
    }

    /// Creates a cross-origin access error.
    #[inline]
    pub fn access_denied(origin: impl Into<String>, target_origin: impl Into<String>) -> Self {
        Self::AccessDenied {
            origin: origin.into(),
            target_origin: target_origin.into(),
        }
    }

    /// Creates a detached context error.
    #[inline]
    pub fn detached(context_id: ContextId) -> Self {
        Self::Detached { context_id }
    }

    /// Creates an instrumentation error.
    #[inline]
    pub fn instrumentation(message: impl Into<String>) -> Self {
        Self::Instrumentation {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a cross-origin access error.
    #[inline]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Returns `true` if this is a snapshot failure.
    #[inline]
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot { .. })
    }

    /// Returns `true` if this error must never reach the page.
    ///
    /// Every variant except configuration errors is recovered inside the
    /// interception hooks.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("missing origin");
        assert_eq!(err.to_string(), "Configuration error: missing origin");
    }

    #[test]
    fn test_snapshot_error() {
        let err = Error::snapshot("function");
        assert_eq!(err.to_string(), "Payload cannot be snapshotted: function");
        assert!(err.is_snapshot());
    }

    #[test]
    fn test_access_denied() {
        let err = Error::access_denied("https://a.example", "https://b.example");
        assert!(err.is_access_denied());
        assert!(err.to_string().contains("https://b.example"));
    }

    #[test]
    fn test_detached_display() {
        let id = ContextId::generate();
        let err = Error::detached(id);
        assert_eq!(err.to_string(), format!("Context detached: {id}"));
    }

    #[test]
    fn test_instrumentation_error() {
        let err = Error::instrumentation("hook body failed");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("hook body failed"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::ChannelClosed.is_recoverable());
        assert!(Error::snapshot("object").is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
