//! Monitor envelopes in page traffic.
//!
//! The monitor's own messages travel as ordinary payloads carrying a
//! reserved top-level key. The interception hooks must recognize these and
//! pass them through untracked - otherwise the monitor would observe its
//! own observations forever.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::error::Result;
use crate::page::Payload;

use super::control::Control;

// ============================================================================
// Envelope Keys
// ============================================================================

/// Top-level key marking monitor telemetry.
pub const MONITOR_KEY: &str = "__postMessageMonitor";

/// Top-level key marking a configuration push.
pub const CONTROL_KEY: &str = "__postMessageMonitorControl";

/// Top-level key marking an injected test message.
pub const TEST_KEY: &str = "__postMessageMonitorTest";

// ============================================================================
// Construction
// ============================================================================

/// Wraps a control message into its in-band envelope.
///
/// # Errors
///
/// Returns [`crate::Error::Json`] if the control cannot be serialized.
pub fn control_envelope(control: &Control) -> Result<Payload> {
    let value = serde_json::to_value(control)?;
    Ok(Payload::json(json!({ CONTROL_KEY: value })))
}

/// Builds the synthetic message injected by a test-transmit push.
///
/// Carries the test key so inspection surfaces can tell it apart, but is
/// deliberately *not* an internal envelope: tracked listeners observe it.
#[must_use]
pub fn test_message(data: Value) -> Payload {
    Payload::json(json!({ TEST_KEY: true, "data": data }))
}

// ============================================================================
// Detection
// ============================================================================

/// Returns `true` for the monitor's own telemetry or control envelopes.
#[must_use]
pub fn is_internal(payload: &Payload) -> bool {
    match payload {
        Payload::Json(value) => {
            value.get(MONITOR_KEY).is_some() || value.get(CONTROL_KEY).is_some()
        }
        _ => false,
    }
}

/// Extracts the control message from a control envelope, if this is one.
#[must_use]
pub fn extract_control(payload: &Payload) -> Option<Control> {
    let Payload::Json(value) = payload else {
        return None;
    };
    let control = value.get(CONTROL_KEY)?;
    serde_json::from_value(control.clone()).ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_envelope_detected() {
        let payload =
            control_envelope(&Control::UpdateLogging { enabled: true }).expect("envelope");

        assert!(is_internal(&payload));
        let control = extract_control(&payload).expect("control");
        assert!(matches!(control, Control::UpdateLogging { enabled: true }));
    }

    #[test]
    fn test_ordinary_payload_not_internal() {
        let payload = Payload::json(json!({"x": 1}));
        assert!(!is_internal(&payload));
        assert!(extract_control(&payload).is_none());
    }

    #[test]
    fn test_test_message_is_ordinary() {
        let payload = test_message(json!({"probe": 1}));
        assert!(!is_internal(&payload));

        let Payload::Json(value) = &payload else {
            panic!("expected json payload");
        };
        assert_eq!(value[TEST_KEY], json!(true));
        assert_eq!(value["data"]["probe"], json!(1));
    }

    #[test]
    fn test_malformed_control_ignored() {
        let payload = Payload::json(json!({ CONTROL_KEY: {"type": "NO_SUCH_CONTROL"} }));
        assert!(is_internal(&payload));
        assert!(extract_control(&payload).is_none());
    }
}
