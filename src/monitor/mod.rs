//! The instrumentation engine.
//!
//! This module is the core of the crate: fingerprinting, wrapper
//! unwrapping, and the interception facade, coordinated by the
//! [`Monitor`].
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Monitor`] | Coordinator: pages, settings, relay channel |
//! | [`MonitorBuilder`] | Fluent configuration builder |
//! | [`Fingerprint`] | Stable identity for an opaque callable |
//! | [`WrapperRegistry`] / [`Detector`] | Pluggable unwrapping conventions |
//! | [`Settings`] | Per-context configuration tuple |
//! | [`TrackedListener`] / [`MessageRecord`] | Telemetry records |
//!
//! # Example
//!
//! ```no_run
//! use postmessage_monitor::{Monitor, Handler, Payload};
//!
//! # fn example() -> postmessage_monitor::Result<()> {
//! let monitor = Monitor::builder().logging(true).build();
//! let page = monitor.page("https://app.example")?;
//!
//! page.add_message_listener(Handler::new("function (e) { render(e.data); }", |_e| {}));
//! page.post_message(Payload::json(serde_json::json!({"x": 1})), "*");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for monitor configuration.
pub mod builder;

/// Console `log`/`dir` enhancement.
pub(crate) mod console_patch;

/// Core monitor implementation.
pub mod core;

/// Callable fingerprinting.
pub mod fingerprint;

/// The interception facade.
pub(crate) mod intercept;

/// Structural path resolution for contexts.
pub mod path;

/// Context-scoped monitor state.
pub mod state;

/// Wrapper detection and unwrapping.
pub mod wrappers;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::MonitorBuilder;
pub use self::core::{FrameReport, Monitor, StateReport};
pub use fingerprint::Fingerprint;
pub use state::{ContextState, Direction, MessageRecord, Settings, TrackedListener};
pub use wrappers::{Detector, WrapperKind, WrapperRegistry};
