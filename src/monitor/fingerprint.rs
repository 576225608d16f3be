//! Callable fingerprinting.
//!
//! Produces a stable, comparable identity for an arbitrary callable:
//! bounded source preview, best-effort origin location, and a rolling hash
//! over the full source text. Fingerprints are the sole cross-process
//! comparison key - callables themselves never cross the interception
//! boundary.
//!
//! Location recovery is advisory metadata, tried in priority order:
//! an inline `sourceURL` annotation, an inline `sourceMappingURL`
//! annotation, then a heuristic parse of the registration call-stack
//! skipping frames attributable to the instrumentation itself.

// ============================================================================
// Imports
// ============================================================================

use std::backtrace::Backtrace;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifiers::ListenerHash;
use crate::page::Handler;

use super::intercept::HANDLER_MARKER_PROP;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length of the source preview kept for transport.
pub(crate) const SOURCE_PREVIEW_LIMIT: usize = 100;

/// Sentinel source preview for the monitor's own handlers.
pub(crate) const INTERNAL_CODE: &str = "[PostMessage Monitor's internal handler]";

/// Sentinel location for the monitor's own handlers.
pub(crate) const INTERNAL_LOCATION: &str = "extension";

/// Location reported when no recovery heuristic succeeds.
pub(crate) const UNKNOWN_LOCATION: &str = "unknown";

/// Stack frames containing any of these markers belong to the
/// instrumentation and are skipped by the location heuristic.
const INTERNAL_FRAME_MARKERS: &[&str] = &[
    "postmessage-monitor",
    "postmessage_monitor",
    "chrome-extension",
    "/rustc/",
];

// ============================================================================
// Regexes
// ============================================================================

/// Inline source-origin annotation some bundlers add.
static SOURCE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[#@]\s*sourceURL=\s*(\S+)").expect("valid regex"));

/// Inline source-map annotation.
static SOURCE_MAPPING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[#@]\s*sourceMappingURL=\s*(\S+)").expect("valid regex"));

/// Stack frame with a parenthesized site: `at name (file:line:col)`.
static STACK_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at .*? \((\S+):(\d+):(\d+)\)").expect("valid regex"));

/// Stack frame with a bare site: `at file:line:col`.
static STACK_BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at (\S+):(\d+):(\d+)").expect("valid regex"));

// ============================================================================
// Fingerprint
// ============================================================================

/// Derived identity record for a callable.
///
/// Two fingerprints computed from the same source text are equal; the
/// location field is advisory and excluded from comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Bounded source preview.
    pub code: String,
    /// Recovered origin location, or `"unknown"`.
    pub location: String,
    /// Rolling hash of the full source text.
    pub hash: ListenerHash,
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Fingerprint {}

impl Fingerprint {
    /// Computes the fingerprint of a callable.
    ///
    /// Handlers tagged as the monitor's own short-circuit to the sentinel
    /// fingerprint without walking any stack.
    #[must_use]
    pub fn of(handler: &Handler) -> Self {
        if handler.has_flag(HANDLER_MARKER_PROP) {
            return Self::internal();
        }

        let source = handler.source();
        Self {
            code: preview(source),
            location: recover_location(source, handler.trace()),
            hash: ListenerHash::new(rolling_hash(source)),
        }
    }

    /// The sentinel fingerprint for the monitor's own handlers.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            code: INTERNAL_CODE.to_string(),
            location: INTERNAL_LOCATION.to_string(),
            hash: ListenerHash::new(0),
        }
    }

    /// Builds a fingerprint from explicit parts.
    #[must_use]
    pub fn with_hash(code: impl Into<String>, location: impl Into<String>, hash: i32) -> Self {
        Self {
            code: code.into(),
            location: location.into(),
            hash: ListenerHash::new(hash),
        }
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// Rolling hash over UTF-16 code units: `h = (h << 5) - h + unit`, wrapping
/// at 32 bits.
fn rolling_hash(source: &str) -> i32 {
    let mut hash: i32 = 0;
    for unit in source.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash
}

/// Truncates source text to the transport preview length.
fn preview(source: &str) -> String {
    if source.chars().count() > SOURCE_PREVIEW_LIMIT {
        let head: String = source.chars().take(SOURCE_PREVIEW_LIMIT).collect();
        format!("{head}...")
    } else {
        source.to_string()
    }
}

// ============================================================================
// Location Recovery
// ============================================================================

/// Recovers an origin location in priority order.
fn recover_location(source: &str, trace: Option<&str>) -> String {
    if let Some(captures) = SOURCE_URL_RE.captures(source) {
        return captures[1].to_string();
    }

    if let Some(captures) = SOURCE_MAPPING_RE.captures(source) {
        return format!("mapped: {}", &captures[1]);
    }

    let stack = match trace {
        Some(text) => text.to_string(),
        None => Backtrace::force_capture().to_string(),
    };

    stack_location(&stack).unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

/// Picks the first external `file:line` out of a stack trace.
pub(crate) fn stack_location(stack: &str) -> Option<String> {
    for line in stack.lines() {
        if INTERNAL_FRAME_MARKERS
            .iter()
            .any(|marker| line.contains(marker))
        {
            continue;
        }

        if let Some(captures) = STACK_PAREN_RE
            .captures(line)
            .or_else(|| STACK_BARE_RE.captures(line))
        {
            return Some(format!("{}:{}", &captures[1], &captures[2]));
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_deterministic_hash() {
        let a = Handler::stub("function (e) { console.log(e.data); }");
        let b = Handler::stub("function (e) { console.log(e.data); }");

        let fp_a = Fingerprint::of(&a);
        let fp_b = Fingerprint::of(&b);
        assert_eq!(fp_a.hash, fp_b.hash);
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn test_distinct_sources_distinct_hashes() {
        let a = Fingerprint::of(&Handler::stub("function a(e) {}"));
        let b = Fingerprint::of(&Handler::stub("function b(e) {}"));
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_preview_truncated() {
        let long_source = format!("function (e) {{ {} }}", "x();".repeat(100));
        let fp = Fingerprint::of(&Handler::stub(long_source.clone()));

        assert_eq!(fp.code.chars().count(), SOURCE_PREVIEW_LIMIT + 3);
        assert!(fp.code.ends_with("..."));

        // Hash still covers the full source.
        assert_eq!(fp.hash.value(), rolling_hash(&long_source));
    }

    #[test]
    fn test_source_url_annotation_wins() {
        let handler = Handler::with_trace(
            "function (e) {} //# sourceURL=https://cdn.example/app.js",
            "at handler (https://other.example/x.js:5:1)",
            |_e| {},
        );
        assert_eq!(
            Fingerprint::of(&handler).location,
            "https://cdn.example/app.js"
        );
    }

    #[test]
    fn test_source_mapping_annotation() {
        let handler = Handler::stub("function (e) {} //# sourceMappingURL=app.js.map");
        assert_eq!(Fingerprint::of(&handler).location, "mapped: app.js.map");
    }

    #[test]
    fn test_stack_skips_internal_frames() {
        let trace = "Error\n\
                     at wrap (chrome-extension://abc/pageScript.js:10:5)\n\
                     at install (postmessage-monitor/src/monitor/intercept.rs:44:9)\n\
                     at onMessage (https://app.example/main.js:120:17)";
        let handler = Handler::with_trace("function (e) {}", trace, |_e| {});

        assert_eq!(
            Fingerprint::of(&handler).location,
            "https://app.example/main.js:120"
        );
    }

    #[test]
    fn test_bare_stack_frame() {
        let handler = Handler::with_trace(
            "function (e) {}",
            "at https://app.example/inline.js:3:1",
            |_e| {},
        );
        assert_eq!(
            Fingerprint::of(&handler).location,
            "https://app.example/inline.js:3"
        );
    }

    #[test]
    fn test_unusable_trace_is_unknown() {
        let handler = Handler::with_trace("function (e) {}", "no frames here", |_e| {});
        assert_eq!(Fingerprint::of(&handler).location, UNKNOWN_LOCATION);
    }

    #[test]
    fn test_internal_sentinel() {
        let handler = Handler::stub("function anything(e) {}");
        handler.set_flag(HANDLER_MARKER_PROP);

        let fp = Fingerprint::of(&handler);
        assert_eq!(fp.code, INTERNAL_CODE);
        assert_eq!(fp.location, INTERNAL_LOCATION);
        assert_eq!(fp.hash.value(), 0);
    }

    #[test]
    fn test_wire_keys() {
        let fp = Fingerprint::of(&Handler::stub("function (e) {}"));
        let json = serde_json::to_value(&fp).expect("serialize");
        assert!(json.get("code").is_some());
        assert!(json.get("location").is_some());
        assert!(json.get("hash").is_some());
    }

    proptest! {
        #[test]
        fn prop_hash_deterministic(source in ".{0,200}") {
            prop_assert_eq!(rolling_hash(&source), rolling_hash(&source));
        }

        #[test]
        fn prop_fingerprint_equality_by_source(source in ".{1,100}") {
            let a = Fingerprint::of(&Handler::stub(source.clone()));
            let b = Fingerprint::of(&Handler::stub(source));
            prop_assert_eq!(a, b);
        }
    }
}
