//! Page environment globals.
//!
//! Records which third-party globals the page has defined. Wrapper
//! presence tests consult this before probing a callable for that
//! library's wrapping convention.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

// ============================================================================
// Environment
// ============================================================================

/// The set of globals defined in one page context.
#[derive(Default)]
pub struct Environment {
    globals: Mutex<FxHashSet<String>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("globals", &self.globals.lock().len())
            .finish()
    }
}

impl Environment {
    /// Creates an empty environment.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a global.
    pub fn define(&self, name: impl Into<String>) {
        self.globals.lock().insert(name.into());
    }

    /// Removes a global.
    pub fn remove(&self, name: &str) {
        self.globals.lock().remove(name);
    }

    /// Returns `true` if the named global is defined.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.globals.lock().contains(name)
    }

    /// Returns `true` if any of the named globals is defined.
    #[must_use]
    pub fn has_any(&self, names: &[&str]) -> bool {
        let globals = self.globals.lock();
        names.iter().any(|name| globals.contains(*name))
    }

    /// Drops all globals (navigation resets the page).
    pub fn clear(&self) {
        self.globals.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_probe() {
        let env = Environment::new();
        assert!(!env.has("Sentry"));

        env.define("Sentry");
        assert!(env.has("Sentry"));
        assert!(env.has_any(&["Raven", "Sentry"]));
    }

    #[test]
    fn test_remove() {
        let env = Environment::new();
        env.define("jQuery");
        env.remove("jQuery");
        assert!(!env.has("jQuery"));
    }

    #[test]
    fn test_clear() {
        let env = Environment::new();
        env.define("Rollbar");
        env.define("Bugsnag");
        env.clear();
        assert!(!env.has_any(&["Rollbar", "Bugsnag"]));
    }
}
