//! Relay boundary.
//!
//! The relay itself (per-tab aggregation, badge, panel) is an external
//! collaborator; this module provides only the boundary the core talks to:
//! a best-effort, never-blocking notice channel.
//!
//! # Delivery Contract
//!
//! - Sends never block the interception hooks.
//! - Failures are logged at debug level and swallowed.
//! - Consumers must tolerate dropped notices and re-synchronize via
//!   [`crate::Monitor::state`].

// ============================================================================
// Submodules
// ============================================================================

/// Best-effort notice channel.
pub mod channel;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{NoticeReceiver, NoticeSender, channel};
