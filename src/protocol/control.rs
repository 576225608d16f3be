//! Configuration pushes consumed by the interception layer.
//!
//! Controls arrive in-band as `__postMessageMonitorControl` envelopes and
//! are consumed by the capturing receive hook without emitting telemetry.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::monitor::Settings;

// ============================================================================
// Control
// ============================================================================

/// A configuration push from the relay down to one page context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Control {
    /// Toggle console narration of observed traffic.
    #[serde(rename = "UPDATE_LOGGING")]
    UpdateLogging {
        /// New narration state.
        enabled: bool,
    },

    /// Toggle console `log`/`dir` enhancement.
    #[serde(rename = "UPDATE_CONSOLE_ENHANCEMENT")]
    UpdateConsoleEnhancement {
        /// New enhancement state.
        enabled: bool,
    },

    /// Toggle proxy substitution for wrapped listeners.
    #[serde(rename = "UPDATE_REROUTING")]
    UpdateRerouting {
        /// New rerouting state.
        enabled: bool,
    },

    /// Apply a full settings tuple at once.
    #[serde(rename = "INIT_SETTINGS")]
    InitSettings {
        /// Settings to apply.
        settings: Settings,
    },

    /// Inject a synthetic message to verify listener capture.
    #[serde(rename = "TEST_POSTMESSAGE")]
    TestTransmit {
        /// Payload of the synthetic message.
        data: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_update_logging_wire_form() {
        let control = Control::UpdateLogging { enabled: true };
        let json = serde_json::to_value(&control).expect("serialize");
        assert_eq!(json, json!({"type": "UPDATE_LOGGING", "enabled": true}));
    }

    #[test]
    fn test_init_settings_wire_form() {
        let control = Control::InitSettings {
            settings: Settings::default(),
        };
        let json = serde_json::to_value(&control).expect("serialize");
        assert_eq!(json["type"], json!("INIT_SETTINGS"));
        assert_eq!(json["settings"]["reroutingEnabled"], json!(true));
    }

    #[test]
    fn test_control_roundtrip() {
        let wire = json!({"type": "TEST_POSTMESSAGE", "data": {"probe": 1}});
        let control: Control = serde_json::from_value(wire).expect("deserialize");
        assert!(matches!(control, Control::TestTransmit { .. }));
    }
}
