//! Builder pattern for monitor configuration.
//!
//! Provides a fluent API for configuring and creating [`Monitor`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use postmessage_monitor::{Monitor, relay};
//!
//! let (tx, _rx) = relay::channel();
//! let monitor = Monitor::builder()
//!     .logging(true)
//!     .notices(tx)
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::relay::NoticeSender;

use super::core::Monitor;
use super::state::Settings;
use super::wrappers::{Detector, WrapperRegistry};

// ============================================================================
// MonitorBuilder
// ============================================================================

/// Builder for configuring a [`Monitor`] instance.
///
/// Use [`Monitor::builder()`] to create a new builder. All parts have
/// working defaults: built-in detectors, a disconnected notice channel,
/// and the default settings tuple.
#[derive(Debug, Clone)]
pub struct MonitorBuilder {
    /// Initial master settings.
    settings: Settings,
    /// Notice channel to the relay.
    notices: NoticeSender,
    /// Wrapper-detector table.
    registry: WrapperRegistry,
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            notices: NoticeSender::disconnected(),
            registry: WrapperRegistry::new(),
        }
    }
}

// ============================================================================
// MonitorBuilder Implementation
// ============================================================================

impl MonitorBuilder {
    /// Creates a new builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full initial settings tuple.
    #[inline]
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Enables or disables console narration initially.
    #[inline]
    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.settings.log_enabled = enabled;
        self
    }

    /// Enables or disables console enhancement initially.
    #[inline]
    #[must_use]
    pub fn console_enhancement(mut self, enabled: bool) -> Self {
        self.settings.console_enhancement_enabled = enabled;
        self
    }

    /// Enables or disables listener rerouting initially.
    #[inline]
    #[must_use]
    pub fn rerouting(mut self, enabled: bool) -> Self {
        self.settings.rerouting_enabled = enabled;
        self
    }

    /// Attaches the notice channel to the relay.
    #[inline]
    #[must_use]
    pub fn notices(mut self, notices: NoticeSender) -> Self {
        self.notices = notices;
        self
    }

    /// Adds a detector for another library's wrapping convention.
    #[inline]
    #[must_use]
    pub fn detector(mut self, detector: Detector) -> Self {
        self.registry.register(detector);
        self
    }

    /// Builds the monitor.
    #[must_use]
    pub fn build(self) -> Monitor {
        Monitor::from_parts(self.registry, self.notices, self.settings)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::WrapperKind;
    use crate::page::{Environment, Handler};
    use crate::relay;

    #[test]
    fn test_default_builder() {
        let monitor = MonitorBuilder::new().build();
        let settings = monitor.settings();

        assert!(!settings.log_enabled);
        assert!(settings.console_enhancement_enabled);
        assert!(settings.rerouting_enabled);
    }

    #[test]
    fn test_toggle_methods() {
        let monitor = Monitor::builder()
            .logging(true)
            .console_enhancement(false)
            .rerouting(false)
            .build();
        let settings = monitor.settings();

        assert!(settings.log_enabled);
        assert!(!settings.console_enhancement_enabled);
        assert!(!settings.rerouting_enabled);
    }

    #[test]
    fn test_settings_tuple() {
        let monitor = Monitor::builder()
            .settings(Settings {
                log_enabled: true,
                console_enhancement_enabled: true,
                rerouting_enabled: false,
            })
            .build();

        assert!(monitor.settings().log_enabled);
        assert!(!monitor.settings().rerouting_enabled);
    }

    #[test]
    fn test_notices_attached() {
        let (tx, mut rx) = relay::channel();
        let monitor = Monitor::builder().notices(tx).build();

        monitor.page("https://app.example").expect("page");
        let drained = rx.drain();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn test_custom_detector() {
        fn present(env: &Environment) -> bool {
            env.has("Acme")
        }
        fn unwrap(handler: &Handler) -> Option<Handler> {
            handler.func_prop("__acme_original")
        }
        fn matches(handler: &Handler) -> bool {
            handler.has_flag("__acme_original")
        }

        let monitor = Monitor::builder()
            .detector(Detector {
                kind: WrapperKind::Unknown,
                is_present: present,
                unwrap,
                matches,
            })
            .build();

        assert_eq!(monitor.registry().detectors().len(), 6);
    }
}
