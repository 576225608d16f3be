//! Page model: the surface the monitor instruments.
//!
//! This module provides the modeled page a host embeds:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Context`] | One frame: console, environment, listeners, children |
//! | [`Handler`] | Opaque callable with an introspectable surface |
//! | [`Payload`] / [`MessageEvent`] | Posted values and delivered events |
//! | [`Console`] | Logging surface with patchable entry points |
//! | [`Environment`] | Third-party globals defined by the page |
//!
//! # Example
//!
//! ```no_run
//! use postmessage_monitor::{Monitor, Handler, Payload};
//!
//! # fn main() -> postmessage_monitor::Result<()> {
//! let monitor = Monitor::builder().build();
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

/// The page console with patchable entry points.
pub mod console;

/// Execution contexts (frames) and raw messaging primitives.
pub mod context;

/// Third-party globals defined by the page.
pub mod environment;

/// Opaque callable handles.
pub mod handler;

/// Message payloads, snapshots, and events.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use console::{Console, ConsoleArg, DirHook, LogHook};
pub use context::{Context, ListenerOptions, RegistrationTarget};

pub(crate) use context::Registration;
pub use environment::Environment;
pub use handler::{Handler, HandlerFn, PropValue};
pub use payload::{ExoticPayload, MessageEvent, Payload};
