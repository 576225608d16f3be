//! Context-scoped monitor state.
//!
//! All mutable state the interception hooks touch lives here, owned by one
//! context and recreated on navigation: the per-context settings tuple, the
//! tracked-listener collection, and the capped message history.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::ListenerHash;
use crate::page::RegistrationTarget;

use super::fingerprint::Fingerprint;
use super::wrappers::WrapperKind;

// ============================================================================
// Constants
// ============================================================================

/// Ring-buffer cap on captured messages per context.
pub(crate) const MESSAGE_HISTORY_CAP: usize = 500;

/// Number of recent messages returned by a state report.
pub(crate) const REPORT_MESSAGE_TAIL: usize = 100;

// ============================================================================
// Settings
// ============================================================================

/// Per-context configuration tuple.
///
/// Written by inbound configuration pushes, read on every message and
/// registration event. A toggle takes effect on the next relevant event,
/// never retroactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Console narration of observed traffic.
    pub log_enabled: bool,
    /// Console `log`/`dir` enhancement.
    pub console_enhancement_enabled: bool,
    /// Proxy substitution for wrapped listeners.
    pub rerouting_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_enabled: false,
            console_enhancement_enabled: true,
            rerouting_enabled: true,
        }
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Direction of an observed message, relative to the recording context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Message observed on receipt.
    #[serde(rename = "INCOMING")]
    Incoming,
    /// Message observed on transmission.
    #[serde(rename = "OUTGOING")]
    Outgoing,
}

// ============================================================================
// TrackedListener
// ============================================================================

/// One observed `message`-listener registration.
///
/// Holds fingerprints only - callables are never transmitted across the
/// interception boundary. `unwrapped` equals `wrapped` whenever
/// `is_unwrapped` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedListener {
    /// Event kind (always `"message"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Fingerprint of the callable as registered.
    pub wrapped: Fingerprint,
    /// Fingerprint of the innermost original callable.
    pub unwrapped: Fingerprint,
    /// `true` when unwrapping recovered a different callable.
    #[serde(rename = "isUnwrapped")]
    pub is_unwrapped: bool,
    /// Which wrapping convention produced the outermost wrapper.
    #[serde(rename = "wrapperType")]
    pub wrapper_kind: WrapperKind,
    /// Surface the listener was registered on.
    pub target: RegistrationTarget,
    /// Registration time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

// ============================================================================
// MessageRecord
// ============================================================================

/// One observed message, as a value snapshot.
///
/// Immutable once created. Recorded unconditionally; `console_log` marks
/// whether narration was enabled at observation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Observation direction.
    pub direction: Direction,
    /// Sender path (outgoing) or sender origin (incoming).
    pub source: String,
    /// Target origin or `"any"` (outgoing), receiver path (incoming).
    pub target: String,
    /// Payload snapshot, possibly degraded.
    pub data: Value,
    /// Observation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Human-readable call-site expression.
    pub path: String,
    /// Whether console narration was enabled when recorded.
    #[serde(rename = "consoleLog")]
    pub console_log: bool,
}

// ============================================================================
// ContextState
// ============================================================================

/// Monitor state private to one page instantiation.
///
/// Mutated only from within the hook entry points of its own context's
/// single-threaded turn; cleared by navigation.
#[derive(Debug, Default)]
pub struct ContextState {
    /// Per-context configuration.
    pub settings: Settings,
    /// Whether the console enhancement patch is currently applied.
    pub console_patched: bool,
    /// Tracked listeners, in registration order.
    listeners: Vec<TrackedListener>,
    /// Captured messages, oldest first.
    records: VecDeque<MessageRecord>,
}

impl ContextState {
    /// Creates state with the given settings.
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    // ========================================================================
    // Tracked listeners
    // ========================================================================

    /// Appends a tracked listener.
    pub fn push_listener(&mut self, listener: TrackedListener) {
        self.listeners.push(listener);
    }

    /// Removes the first listener whose wrapped fingerprint matches `hash`.
    ///
    /// Matching is by hash, not identity: the registered object may be a
    /// proxy, and callables with identical source text share a hash.
    pub fn remove_listener_by_hash(&mut self, hash: ListenerHash) -> bool {
        match self
            .listeners
            .iter()
            .position(|l| l.kind == "message" && l.wrapped.hash == hash)
        {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns the tracked listeners.
    #[inline]
    #[must_use]
    pub fn listeners(&self) -> &[TrackedListener] {
        &self.listeners
    }

    /// Returns the number of tracked listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Message history
    // ========================================================================

    /// Appends a record, dropping the oldest past the ring cap.
    pub fn push_record(&mut self, record: MessageRecord) {
        if self.records.len() >= MESSAGE_HISTORY_CAP {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Returns the `n` most recent records, oldest first.
    #[must_use]
    pub fn recent_records(&self, n: usize) -> Vec<MessageRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    /// Returns the number of captured records.
    #[inline]
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Drops all captured records.
    pub fn clear_records(&mut self) {
        self.records.clear();
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Milliseconds since the Unix epoch.
#[must_use]
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn listener(hash: i32) -> TrackedListener {
        TrackedListener {
            kind: "message".into(),
            wrapped: Fingerprint::with_hash("function (e) {}", "unknown", hash),
            unwrapped: Fingerprint::with_hash("function (e) {}", "unknown", hash),
            is_unwrapped: false,
            wrapper_kind: WrapperKind::None,
            target: RegistrationTarget::Window,
            timestamp: now_millis(),
        }
    }

    fn record(path: &str) -> MessageRecord {
        MessageRecord {
            direction: Direction::Outgoing,
            source: "top".into(),
            target: "any".into(),
            data: json!({"x": 1}),
            timestamp: now_millis(),
            path: path.into(),
            console_log: false,
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert!(!settings.log_enabled);
        assert!(settings.console_enhancement_enabled);
        assert!(settings.rerouting_enabled);
    }

    #[test]
    fn test_settings_wire_keys() {
        let json = serde_json::to_value(Settings::default()).expect("serialize");
        assert_eq!(json["logEnabled"], json!(false));
        assert_eq!(json["consoleEnhancementEnabled"], json!(true));
        assert_eq!(json["reroutingEnabled"], json!(true));
    }

    #[test]
    fn test_remove_listener_by_hash() {
        let mut state = ContextState::default();
        state.push_listener(listener(1));
        state.push_listener(listener(2));

        assert!(state.remove_listener_by_hash(ListenerHash::new(1)));
        assert_eq!(state.listener_count(), 1);
        assert!(!state.remove_listener_by_hash(ListenerHash::new(1)));
    }

    #[test]
    fn test_remove_first_hash_match_only() {
        let mut state = ContextState::default();
        state.push_listener(listener(7));
        state.push_listener(listener(7));

        assert!(state.remove_listener_by_hash(ListenerHash::new(7)));
        assert_eq!(state.listener_count(), 1);
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut state = ContextState::default();
        for i in 0..(MESSAGE_HISTORY_CAP + 5) {
            state.push_record(record(&format!("p{i}")));
        }

        assert_eq!(state.record_count(), MESSAGE_HISTORY_CAP);
        let recent = state.recent_records(1);
        assert_eq!(recent[0].path, format!("p{}", MESSAGE_HISTORY_CAP + 4));

        // Oldest five were dropped.
        let all = state.recent_records(usize::MAX);
        assert_eq!(all[0].path, "p5");
    }

    #[test]
    fn test_recent_records_tail() {
        let mut state = ContextState::default();
        for i in 0..10 {
            state.push_record(record(&format!("p{i}")));
        }

        let tail = state.recent_records(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].path, "p7");
        assert_eq!(tail[2].path, "p9");
    }

    #[test]
    fn test_record_wire_keys() {
        let json = serde_json::to_value(record("top.postMessage({}, \"*\")")).expect("serialize");
        assert_eq!(json["direction"], json!("OUTGOING"));
        assert_eq!(json["consoleLog"], json!(false));
    }
}
