//! Type-safe identifiers for monitored entities.
//!
//! Newtype wrappers prevent mixing incompatible identifiers at compile time.
//!
//! | Type | Underlying | Purpose |
//! |------|------------|---------|
//! | [`ContextId`] | UUID v4 | Stable identity of a frame slot across navigations |
//! | [`ListenerHash`] | i32 | Fingerprint hash used as the cross-process listener key |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ContextId
// ============================================================================

/// Stable identifier of an execution context (frame slot).
///
/// The ID survives navigation of the context - the page-private state is
/// recreated but settings persisted under this ID are reapplied - and does
/// not survive a restart of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Generates a new random context ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// ListenerHash
// ============================================================================

/// Rolling hash of a callable's full source text.
///
/// Listener removal is matched by this hash rather than by reference
/// identity, because the registered object may be a proxy the monitor
/// installed. Two callables with identical source text share a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerHash(i32);

impl ListenerHash {
    /// Wraps a raw hash value.
    #[inline]
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw hash value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ListenerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_unique() {
        let a = ContextId::generate();
        let b = ContextId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_context_id_serde_transparent() {
        let id = ContextId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_listener_hash_roundtrip() {
        let hash = ListenerHash::new(-123456);
        let json = serde_json::to_string(&hash).expect("serialize");
        assert_eq!(json, "-123456");

        let back: ListenerHash = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, hash);
    }

    #[test]
    fn test_listener_hash_value() {
        assert_eq!(ListenerHash::new(42).value(), 42);
    }
}
