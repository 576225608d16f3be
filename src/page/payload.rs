//! Message payloads, snapshots, and events.
//!
//! Payloads cross the interception boundary as value snapshots because the
//! original object may be mutated after observation. Structured data
//! snapshots cleanly; callables and exotic host objects refuse cloning and
//! degrade to a bounded descriptor carrying their runtime type tag.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};

use crate::error::{Error, Result};

use super::context::Context;
use super::handler::Handler;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length of the string rendering kept in a degraded snapshot.
pub(crate) const DEGRADED_PREVIEW_LIMIT: usize = 500;

// ============================================================================
// ExoticPayload
// ============================================================================

/// A payload that refuses structural snapshotting.
///
/// Models cyclic structures and host objects the boundary cannot clone.
#[derive(Debug, Clone)]
pub struct ExoticPayload {
    /// Runtime type tag (e.g. `"object"`).
    pub type_tag: String,
    /// Best-effort string rendering of the value.
    pub preview: String,
    /// Key set, when the value is a keyed structure.
    pub keys: Option<Vec<String>>,
}

impl ExoticPayload {
    /// Creates an exotic payload with a type tag and rendering.
    pub fn new(type_tag: impl Into<String>, preview: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            preview: preview.into(),
            keys: None,
        }
    }

    /// Attaches the key set of a keyed structure.
    #[must_use]
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Creates a cyclic-object payload with the given key set.
    pub fn cyclic(keys: Vec<String>) -> Self {
        Self::new("object", "[object Object]").with_keys(keys)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// A value posted between contexts.
#[derive(Clone)]
pub enum Payload {
    /// Structured data; snapshots via deep clone.
    Json(Value),
    /// A callable; refuses snapshotting.
    Callable(Handler),
    /// A host object that refuses snapshotting.
    Exotic(ExoticPayload),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(v) => write!(f, "Json({v})"),
            Self::Callable(h) => write!(f, "Callable({h:?})"),
            Self::Exotic(e) => write!(f, "Exotic({})", e.type_tag),
        }
    }
}

impl Payload {
    /// Creates a structured-data payload.
    #[inline]
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    /// Creates a callable payload.
    #[inline]
    #[must_use]
    pub fn callable(handler: Handler) -> Self {
        Self::Callable(handler)
    }

    /// Creates an exotic payload.
    #[inline]
    #[must_use]
    pub fn exotic(payload: ExoticPayload) -> Self {
        Self::Exotic(payload)
    }

    /// Returns the payload's runtime type tag.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        match self {
            Self::Json(Value::String(_)) => "string",
            Self::Json(Value::Number(_)) => "number",
            Self::Json(Value::Bool(_)) => "boolean",
            Self::Json(_) => "object",
            Self::Callable(_) => "function",
            Self::Exotic(e) => &e.type_tag,
        }
    }

    /// Attempts a deep structural snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] when the payload refuses cloning.
    pub fn try_snapshot(&self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value.clone()),
            Self::Callable(_) | Self::Exotic(_) => Err(Error::snapshot(self.type_tag())),
        }
    }

    /// Takes a snapshot, degrading to a simplified descriptor on refusal.
    ///
    /// The degraded shape carries the runtime type tag, a bounded string
    /// rendering, and the key set of keyed structures.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.try_snapshot().unwrap_or_else(|_| self.degraded())
    }

    /// Builds the degraded descriptor for a non-snapshottable payload.
    fn degraded(&self) -> Value {
        let mut descriptor = json!({
            "__simplified": true,
            "type": self.type_tag(),
            "toString": truncate(&self.rendering(), DEGRADED_PREVIEW_LIMIT),
        });

        if let Self::Exotic(exotic) = self
            && let Some(keys) = &exotic.keys
            && let Some(map) = descriptor.as_object_mut()
        {
            map.insert("keys".into(), json!(keys));
        }

        descriptor
    }

    /// Best-effort string rendering of the payload.
    fn rendering(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Callable(handler) => handler.source().to_string(),
            Self::Exotic(exotic) => exotic.preview.clone(),
        }
    }
}

/// Truncates a string to at most `limit` characters.
fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

// ============================================================================
// MessageEvent
// ============================================================================

/// A message event delivered to listeners of a context.
///
/// Carries the posted payload, the sender's origin, and a reference to the
/// sending context when one is available.
#[derive(Clone)]
pub struct MessageEvent {
    /// Posted payload.
    data: Payload,
    /// Origin of the sending context.
    origin: String,
    /// Sending context, when reachable.
    source: Option<Context>,
    /// Propagation flag shared by clones of this event.
    propagation_stopped: Arc<AtomicBool>,
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("origin", &self.origin)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl MessageEvent {
    /// Creates a new message event.
    #[must_use]
    pub fn new(data: Payload, origin: impl Into<String>, source: Option<Context>) -> Self {
        Self {
            data,
            origin: origin.into(),
            source,
            propagation_stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the posted payload.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Returns the sender's origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the sending context, when reachable.
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<&Context> {
        self.source.as_ref()
    }

    /// Stops propagation to listeners not yet invoked.
    #[inline]
    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if propagation has been stopped.
    #[inline]
    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_snapshot_roundtrip() {
        let value = json!({"a": [1, 2, 3], "b": {"nested": true}});
        let payload = Payload::json(value.clone());

        assert_eq!(payload.snapshot(), value);
        assert_eq!(payload.try_snapshot().expect("snapshot"), value);
    }

    #[test]
    fn test_cyclic_payload_degrades() {
        let payload = Payload::exotic(ExoticPayload::cyclic(vec!["self".into(), "x".into()]));
        let snapshot = payload.snapshot();

        assert_eq!(snapshot["__simplified"], json!(true));
        assert_eq!(snapshot["type"], json!("object"));
        assert_eq!(snapshot["keys"], json!(["self", "x"]));
    }

    #[test]
    fn test_callable_payload_degrades() {
        let payload = Payload::callable(Handler::stub("function secret(e) {}"));
        let snapshot = payload.snapshot();

        assert_eq!(snapshot["type"], json!("function"));
        assert!(
            snapshot["toString"]
                .as_str()
                .expect("toString")
                .contains("secret")
        );
        assert!(snapshot.get("keys").is_none());
    }

    #[test]
    fn test_try_snapshot_refusal() {
        let payload = Payload::callable(Handler::stub("function (e) {}"));
        let err = payload.try_snapshot().unwrap_err();
        assert!(err.is_snapshot());
    }

    #[test]
    fn test_degraded_preview_is_bounded() {
        let long = "x".repeat(DEGRADED_PREVIEW_LIMIT * 2);
        let payload = Payload::exotic(ExoticPayload::new("symbol", long));
        let snapshot = payload.snapshot();

        let preview = snapshot["toString"].as_str().expect("toString");
        assert_eq!(preview.chars().count(), DEGRADED_PREVIEW_LIMIT);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(Payload::json(json!("hi")).type_tag(), "string");
        assert_eq!(Payload::json(json!(3)).type_tag(), "number");
        assert_eq!(Payload::json(json!({})).type_tag(), "object");
        assert_eq!(
            Payload::callable(Handler::stub("function (e) {}")).type_tag(),
            "function"
        );
    }

    #[test]
    fn test_stop_propagation_shared_by_clones() {
        let event = MessageEvent::new(Payload::json(json!(1)), "https://example.com", None);
        let clone = event.clone();

        clone.stop_propagation();
        assert!(event.propagation_stopped());
    }
}
