//! Wrapper detection and unwrapping.
//!
//! Monitoring and utility libraries replace page callables with wrappers
//! that call the original plus extra behavior, keeping a reference to the
//! pre-wrap original under a library-specific property. This module keeps a
//! table of independent detectors - one per known convention - and resolves
//! a wrapped callable to its innermost original by applying every detector
//! whose library is present until a full pass changes nothing.
//!
//! Adding a library means pushing one [`Detector`]; the traversal never
//! changes.
//!
//! # Known conventions
//!
//! | Library | Probe |
//! |---------|-------|
//! | Raven/Sentry | `__raven__` + `__orig__`, or `__sentry_wrapped__` + `__sentry_original__` |
//! | New Relic | `nr` + `__nr_original`, or `__NR_original` |
//! | Rollbar | `_rollbar_wrapped` |
//! | Bugsnag | `bugsnag.originalFunction` |
//! | jQuery | `guid` + `handler` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::page::{Environment, Handler};

// ============================================================================
// Constants
// ============================================================================

/// Cap on full fixed-point passes over the detector table.
///
/// Real wrapping compositions are shallow; the cap bounds pathological
/// property graphs.
const MAX_UNWRAP_PASSES: usize = 16;

// ============================================================================
// WrapperKind
// ============================================================================

/// Which wrapping convention produced a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapperKind {
    /// Not wrapped.
    #[serde(rename = "none")]
    None,
    /// Raven or Sentry error reporting.
    #[serde(rename = "Raven/Sentry")]
    RavenSentry,
    /// New Relic browser agent.
    #[serde(rename = "New Relic")]
    NewRelic,
    /// Rollbar error reporting.
    #[serde(rename = "Rollbar")]
    Rollbar,
    /// Bugsnag error reporting.
    #[serde(rename = "Bugsnag")]
    Bugsnag,
    /// jQuery event plumbing.
    #[serde(rename = "jQuery")]
    JQuery,
    /// Wrapped by an unrecognized mechanism.
    #[serde(rename = "unknown wrapper")]
    Unknown,
}

impl fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::RavenSentry => "Raven/Sentry",
            Self::NewRelic => "New Relic",
            Self::Rollbar => "Rollbar",
            Self::Bugsnag => "Bugsnag",
            Self::JQuery => "jQuery",
            Self::Unknown => "unknown wrapper",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Detector
// ============================================================================

/// One entry in the capability-probe table.
///
/// `is_present` tests for the library in the page environment; `unwrap`
/// probes a callable for the library's wrapping convention and returns the
/// pre-wrap original when found; `matches` is the display-only probe used
/// to classify the outermost wrapper.
#[derive(Clone, Copy)]
pub struct Detector {
    /// Convention this detector recognizes.
    pub kind: WrapperKind,
    /// Presence test for the library's globals.
    pub is_present: fn(&Environment) -> bool,
    /// Unwrap probe; `None` when the convention does not apply.
    pub unwrap: fn(&Handler) -> Option<Handler>,
    /// Marker probe for classification.
    pub matches: fn(&Handler) -> bool,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector").field("kind", &self.kind).finish()
    }
}

// ============================================================================
// Built-in Detectors
// ============================================================================

fn raven_present(env: &Environment) -> bool {
    env.has_any(&["Raven", "Sentry"])
}

fn raven_unwrap(handler: &Handler) -> Option<Handler> {
    if handler.has_flag("__raven__")
        && let Some(original) = handler.func_prop("__orig__")
    {
        return Some(original);
    }
    if handler.has_flag("__sentry_wrapped__")
        && let Some(original) = handler.func_prop("__sentry_original__")
    {
        return Some(original);
    }
    None
}

fn raven_matches(handler: &Handler) -> bool {
    handler.has_flag("__raven__") || handler.has_flag("__sentry_wrapped__")
}

fn newrelic_present(env: &Environment) -> bool {
    env.has_any(&["newrelic", "NREUM"])
}

fn newrelic_unwrap(handler: &Handler) -> Option<Handler> {
    if handler.has_flag("nr")
        && let Some(original) = handler.func_prop("__nr_original")
    {
        return Some(original);
    }
    handler.func_prop("__NR_original")
}

fn newrelic_matches(handler: &Handler) -> bool {
    handler.has_flag("nr") || handler.has_flag("__NR_original")
}

fn rollbar_present(env: &Environment) -> bool {
    env.has("Rollbar")
}

fn rollbar_unwrap(handler: &Handler) -> Option<Handler> {
    handler.func_prop("_rollbar_wrapped")
}

fn rollbar_matches(handler: &Handler) -> bool {
    handler.has_flag("_rollbar_wrapped")
}

fn bugsnag_present(env: &Environment) -> bool {
    env.has("Bugsnag")
}

fn bugsnag_unwrap(handler: &Handler) -> Option<Handler> {
    handler.func_prop("bugsnag.originalFunction")
}

fn bugsnag_matches(handler: &Handler) -> bool {
    handler.has_flag("bugsnag") || handler.has_flag("bugsnag.originalFunction")
}

fn jquery_present(env: &Environment) -> bool {
    env.has_any(&["jQuery", "$"])
}

fn jquery_unwrap(handler: &Handler) -> Option<Handler> {
    if handler.has_flag("guid") {
        return handler.func_prop("handler");
    }
    None
}

fn jquery_matches(handler: &Handler) -> bool {
    handler.has_flag("guid") && handler.has_flag("handler")
}

/// The built-in detector table, in priority order.
fn builtin_detectors() -> Vec<Detector> {
    vec![
        Detector {
            kind: WrapperKind::RavenSentry,
            is_present: raven_present,
            unwrap: raven_unwrap,
            matches: raven_matches,
        },
        Detector {
            kind: WrapperKind::NewRelic,
            is_present: newrelic_present,
            unwrap: newrelic_unwrap,
            matches: newrelic_matches,
        },
        Detector {
            kind: WrapperKind::Rollbar,
            is_present: rollbar_present,
            unwrap: rollbar_unwrap,
            matches: rollbar_matches,
        },
        Detector {
            kind: WrapperKind::Bugsnag,
            is_present: bugsnag_present,
            unwrap: bugsnag_unwrap,
            matches: bugsnag_matches,
        },
        Detector {
            kind: WrapperKind::JQuery,
            is_present: jquery_present,
            unwrap: jquery_unwrap,
            matches: jquery_matches,
        },
    ]
}

// ============================================================================
// WrapperRegistry
// ============================================================================

/// The pluggable set of wrapper detectors.
#[derive(Debug, Clone)]
pub struct WrapperRegistry {
    detectors: Vec<Detector>,
}

impl Default for WrapperRegistry {
    fn default() -> Self {
        Self {
            detectors: builtin_detectors(),
        }
    }
}

impl WrapperRegistry {
    /// Creates a registry with the built-in detectors.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a detector for a new library's convention.
    pub fn register(&mut self, detector: Detector) {
        self.detectors.push(detector);
    }

    /// Returns the detector table.
    #[inline]
    #[must_use]
    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Resolves a callable to its innermost original.
    ///
    /// Applies every detector whose library is present, in table order,
    /// until a full pass produces no change. Returns the callable itself
    /// when no known wrapping is detected - `unwrap_all` is idempotent on
    /// already-unwrapped input.
    #[must_use]
    pub fn unwrap_all(&self, env: &Environment, handler: &Handler) -> Handler {
        let mut current = handler.clone();

        for _pass in 0..MAX_UNWRAP_PASSES {
            let before = current.clone();

            for detector in &self.detectors {
                if !(detector.is_present)(env) {
                    continue;
                }
                if let Some(inner) = (detector.unwrap)(&current) {
                    current = inner;
                }
            }

            if current.same_as(&before) {
                return current;
            }
        }

        warn!("Unwrap pass cap reached; returning current callable");
        current
    }

    /// Classifies the outermost wrapping convention, for display.
    ///
    /// Returns [`WrapperKind::Unknown`] when the callable carries some
    /// callable-valued property but matches no known convention, and
    /// [`WrapperKind::None`] when it is not wrapped at all.
    #[must_use]
    pub fn classify(&self, handler: &Handler) -> WrapperKind {
        for detector in &self.detectors {
            if (detector.matches)(handler) {
                return detector.kind;
            }
        }

        if handler.has_any_func_prop() {
            WrapperKind::Unknown
        } else {
            WrapperKind::None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
