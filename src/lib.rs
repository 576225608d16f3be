//! PostMessage Monitor - Embeddable cross-frame message instrumentation.
//!
//! This library instruments `postMessage`-style traffic inside a modeled
//! page: it intercepts outgoing and incoming messages, discovers and
//! fingerprints `message`-event listeners (including ones wrapped by
//! third-party error-reporting or utility libraries), and relays this
//! telemetry to an observation surface over a best-effort channel.
//!
//! # Architecture
//!
//! The engine becomes the single choke point for the three primitives that
//! govern cross-context messaging:
//!
//! - **Register** - listener registration, with wrapper unwrapping,
//!   fingerprinting, and optional proxy substitution (rerouting)
//! - **Unregister** - listener removal, matched by fingerprint hash
//! - **Transmit / Receive** - message transmission and capture-phase
//!   receipt, recorded as value snapshots
//!
//! All hooks run synchronously in the caller's turn, observe by value, and
//! always delegate to the raw primitive - instrumentation failure never
//! breaks the page.
//!
//! # Quick Start
//!
//! ```no_run
//! use postmessage_monitor::{Monitor, Handler, Payload, relay};
//!
//! # fn main() -> postmessage_monitor::Result<()> {
//! // Build the engine with a relay channel
//! let (tx, mut rx) = relay::channel();
//! let monitor = Monitor::builder().notices(tx).build();
//!
//! // Model a page with a cross-origin child frame
//! let page = monitor.page("https://app.example")?;
//! let frame = page.spawn_child("https://widget.example")?;
//!
//! // Page code registers a listener and posts across the frame boundary
//! frame.add_message_listener(Handler::new("function (e) { render(e.data); }", |_e| {}));
//! page.post_message_to(&frame, Payload::json(serde_json::json!({"x": 1})), "*");
//!
//! // Telemetry arrived on the relay channel
//! for notice in rx.drain() {
//!     println!("{notice:?}");
//! }
//!
//! // Or query the aggregated state directly
//! let report = monitor.state();
//! println!("{} listeners tracked", report.total_listeners);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`page`] | The modeled page: contexts, handlers, payloads, console |
//! | [`monitor`] | The engine: fingerprints, unwrapping, interception |
//! | [`protocol`] | Notice/control message types and envelopes |
//! | [`relay`] | Best-effort notice channel to the observation surface |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//!
//! # Features
//!
//! - **Transparent**: raw primitives always run with original arguments
//! - **Unwrapping**: Raven/Sentry, New Relic, Rollbar, Bugsnag, jQuery
//!   conventions out of the box; new conventions are one table entry
//! - **Bounded**: message history is ring-capped per context
//! - **Best-effort telemetry**: a dead relay never blocks or breaks a hook

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for monitored entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// The instrumentation engine.
///
/// Fingerprinting, wrapper unwrapping, and the interception facade.
pub mod monitor;

/// The modeled page the engine instruments.
///
/// Contexts, handlers, payloads, console, and environment.
pub mod page;

/// Cross-boundary message types.
///
/// Telemetry notices, configuration controls, and in-band envelopes.
pub mod protocol;

/// Relay boundary.
///
/// Best-effort notice channel to the observation surface.
pub mod relay;

// ============================================================================
// Re-exports
// ============================================================================

// Page types
pub use page::{
    Console, ConsoleArg, Context, Environment, ExoticPayload, Handler, ListenerOptions,
    MessageEvent, Payload, PropValue, RegistrationTarget,
};

// Monitor types
pub use monitor::{
    Detector, Direction, Fingerprint, FrameReport, MessageRecord, Monitor, MonitorBuilder,
    Settings, StateReport, TrackedListener, WrapperKind, WrapperRegistry,
};

// Protocol types
pub use protocol::{Control, Notice};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ContextId, ListenerHash};
