//! Telemetry notices emitted up to the relay.
//!
//! Fire-and-forget: delivery is best-effort and consumers must tolerate
//! dropped or reordered notices, re-synchronizing via a full state query
//! when needed.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ContextId;
use crate::monitor::{MessageRecord, TrackedListener};

// ============================================================================
// Notice
// ============================================================================

/// A telemetry notice from one page context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    /// A context came up (page load or navigation) and announced itself.
    #[serde(rename = "REGISTER_FRAME")]
    RegisterFrame {
        /// Announcing context.
        #[serde(rename = "contextId")]
        context_id: ContextId,
        /// Context origin.
        origin: String,
        /// Absolute frame path expression.
        path: String,
        /// Listeners tracked so far.
        listeners: Vec<TrackedListener>,
    },

    /// The tracked-listener collection changed.
    #[serde(rename = "UPDATE_LISTENERS")]
    UpdateListeners {
        /// Reporting context.
        #[serde(rename = "contextId")]
        context_id: ContextId,
        /// Current tracked listeners.
        listeners: Vec<TrackedListener>,
    },

    /// A message was observed.
    #[serde(rename = "LOG_MESSAGE")]
    LogMessage {
        /// Observing context.
        #[serde(rename = "contextId")]
        context_id: ContextId,
        /// The observed message.
        #[serde(flatten)]
        record: MessageRecord,
    },
}

impl Notice {
    /// Returns the context the notice originated from.
    #[must_use]
    pub fn context_id(&self) -> ContextId {
        match self {
            Self::RegisterFrame { context_id, .. }
            | Self::UpdateListeners { context_id, .. }
            | Self::LogMessage { context_id, .. } => *context_id,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Direction;

    use serde_json::json;

    #[test]
    fn test_register_frame_wire_form() {
        let notice = Notice::RegisterFrame {
            context_id: ContextId::generate(),
            origin: "https://app.example".into(),
            path: "top".into(),
            listeners: vec![],
        };
        let json = serde_json::to_value(&notice).expect("serialize");

        assert_eq!(json["type"], json!("REGISTER_FRAME"));
        assert_eq!(json["path"], json!("top"));
        assert!(json.get("contextId").is_some());
    }

    #[test]
    fn test_log_message_flattens_record() {
        let notice = Notice::LogMessage {
            context_id: ContextId::generate(),
            record: MessageRecord {
                direction: Direction::Incoming,
                source: "https://other.example".into(),
                target: "top.frames[0]".into(),
                data: json!({"x": 1}),
                timestamp: 1_700_000_000_000,
                path: "top.frames[0]".into(),
                console_log: false,
            },
        };
        let json = serde_json::to_value(&notice).expect("serialize");

        assert_eq!(json["type"], json!("LOG_MESSAGE"));
        assert_eq!(json["direction"], json!("INCOMING"));
        assert_eq!(json["consoleLog"], json!(false));
    }

    #[test]
    fn test_context_id_accessor() {
        let id = ContextId::generate();
        let notice = Notice::UpdateListeners {
            context_id: id,
            listeners: vec![],
        };
        assert_eq!(notice.context_id(), id);
    }
}
