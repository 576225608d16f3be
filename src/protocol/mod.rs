//! Cross-boundary message types.
//!
//! This module defines the shapes that cross the interception boundary:
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Notice`] | Context → Relay | Telemetry (frames, listeners, messages) |
//! | [`Control`] | Relay → Context | Configuration pushes |
//! | envelopes | In-band | Marking monitor traffic inside page traffic |
//!
//! Notices are fire-and-forget; controls travel in-band as
//! `__postMessageMonitorControl` envelopes consumed by the capturing hook.

// ============================================================================
// Submodules
// ============================================================================

/// Configuration pushes consumed by the interception layer.
pub mod control;

/// Monitor envelopes in page traffic.
pub mod envelope;

/// Telemetry notices emitted up to the relay.
pub mod notice;

// ============================================================================
// Re-exports
// ============================================================================

pub use control::Control;
pub use notice::Notice;
