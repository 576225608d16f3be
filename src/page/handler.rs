//! Opaque callable handles.
//!
//! A [`Handler`] models a page-supplied event listener: an invocation
//! closure plus the introspectable surface the interception layer probes -
//! serialized source text, an optional captured registration trace, and a
//! mutable property map standing in for function expando properties
//! (`fn.__sentry_original__` and friends).
//!
//! Identity is pointer identity: two clones of the same handle compare
//! equal via [`Handler::same_as`], two handlers built from the same source
//! text do not.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::payload::MessageEvent;

// ============================================================================
// Types
// ============================================================================

/// Invocation signature shared by all message listeners.
pub type HandlerFn = dyn Fn(&MessageEvent) + Send + Sync;

/// A property value attached to a handler.
///
/// Mirrors the shapes third-party wrappers leave on listener functions:
/// boolean markers, string notes, and references to other callables.
#[derive(Clone)]
pub enum PropValue {
    /// Boolean marker property.
    Bool(bool),
    /// String-valued property.
    Text(String),
    /// Callable-valued property (e.g. a back-reference to a pre-wrap
    /// original).
    Func(Handler),
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Func(h) => write!(f, "Func({h:?})"),
        }
    }
}

/// Internal shared state for a handler.
struct HandlerInner {
    /// Serialized source text (the `toString()` analogue).
    source: String,
    /// Captured registration-site trace, when the host recorded one.
    trace: Option<String>,
    /// Expando properties probed by wrapper detectors.
    props: Mutex<FxHashMap<String, PropValue>>,
    /// The callable itself.
    func: Box<HandlerFn>,
}

// ============================================================================
// Handler
// ============================================================================

/// An opaque callable handle with an introspectable surface.
///
/// Handlers are cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source: &str = &self.inner.source;
        let preview: String = source.chars().take(40).collect();
        f.debug_struct("Handler")
            .field("source", &preview)
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// Creates a handler from source text and an invocation closure.
    pub fn new(
        source: impl Into<String>,
        func: impl Fn(&MessageEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                source: source.into(),
                trace: None,
                props: Mutex::new(FxHashMap::default()),
                func: Box::new(func),
            }),
        }
    }

    /// Creates a handler that ignores its events.
    ///
    /// Useful when only the introspectable surface matters.
    pub fn stub(source: impl Into<String>) -> Self {
        Self::new(source, |_event| {})
    }

    /// Creates a handler carrying a captured registration trace.
    ///
    /// The trace feeds the fingerprinter's location heuristic, standing in
    /// for a live stack capture at the registration site.
    pub fn with_trace(
        source: impl Into<String>,
        trace: impl Into<String>,
        func: impl Fn(&MessageEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                source: source.into(),
                trace: Some(trace.into()),
                props: Mutex::new(FxHashMap::default()),
                func: Box::new(func),
            }),
        }
    }
}

// ============================================================================
// Handler - Invocation and Identity
// ============================================================================

impl Handler {
    /// Invokes the callable with the given event.
    #[inline]
    pub fn invoke(&self, event: &MessageEvent) {
        (self.inner.func)(event);
    }

    /// Returns `true` if both handles reference the same callable.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the serialized source text.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Returns the captured registration trace, if any.
    #[inline]
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        self.inner.trace.as_deref()
    }
}

// ============================================================================
// Handler - Properties
// ============================================================================

impl Handler {
    /// Sets a property on the handler.
    pub fn set_prop(&self, name: impl Into<String>, value: PropValue) {
        self.inner.props.lock().insert(name.into(), value);
    }

    /// Sets a boolean marker property to `true`.
    #[inline]
    pub fn set_flag(&self, name: impl Into<String>) {
        self.set_prop(name, PropValue::Bool(true));
    }

    /// Returns a clone of the named property.
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<PropValue> {
        self.inner.props.lock().get(name).cloned()
    }

    /// Returns `true` if the named property is set and truthy.
    ///
    /// Callable- and string-valued properties count as truthy, matching
    /// loose marker checks like `fn.__raven__` or `fn.guid`.
    #[must_use]
    pub fn has_flag(&self, name: &str) -> bool {
        match self.inner.props.lock().get(name) {
            Some(PropValue::Bool(b)) => *b,
            Some(PropValue::Text(s)) => !s.is_empty(),
            Some(PropValue::Func(_)) => true,
            None => false,
        }
    }

    /// Returns the callable stored under the named property, if any.
    #[must_use]
    pub fn func_prop(&self, name: &str) -> Option<Handler> {
        match self.inner.props.lock().get(name) {
            Some(PropValue::Func(h)) => Some(h.clone()),
            _ => None,
        }
    }

    /// Returns `true` if any property holds a callable.
    ///
    /// Used to distinguish an unrecognized wrapping convention from a
    /// plain unwrapped callable.
    #[must_use]
    pub fn has_any_func_prop(&self) -> bool {
        self.inner
            .props
            .lock()
            .values()
            .any(|v| matches!(v, PropValue::Func(_)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Payload;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> MessageEvent {
        MessageEvent::new(
            Payload::json(serde_json::json!({"ping": true})),
            "https://example.com",
            None,
        )
    }

    #[test]
    fn test_invoke_runs_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let handler = Handler::new("function (e) { count(e); }", move |_e| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        handler.invoke(&event());
        handler.invoke(&event());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clone_shares_identity() {
        let handler = Handler::stub("function (e) {}");
        let clone = handler.clone();
        assert!(handler.same_as(&clone));
    }

    #[test]
    fn test_same_source_distinct_identity() {
        let a = Handler::stub("function (e) {}");
        let b = Handler::stub("function (e) {}");
        assert!(!a.same_as(&b));
    }

    #[test]
    fn test_flag_properties() {
        let handler = Handler::stub("function (e) {}");
        assert!(!handler.has_flag("__raven__"));

        handler.set_flag("__raven__");
        assert!(handler.has_flag("__raven__"));
    }

    #[test]
    fn test_func_prop_roundtrip() {
        let original = Handler::stub("function original(e) {}");
        let wrapper = Handler::stub("function wrapper(e) {}");
        wrapper.set_prop("__orig__", PropValue::Func(original.clone()));

        let recovered = wrapper.func_prop("__orig__").expect("func prop");
        assert!(recovered.same_as(&original));
        assert!(wrapper.has_any_func_prop());
    }

    #[test]
    fn test_text_prop_is_truthy() {
        let handler = Handler::stub("function (e) {}");
        handler.set_prop("guid", PropValue::Text("42".into()));
        assert!(handler.has_flag("guid"));

        handler.set_prop("guid", PropValue::Text(String::new()));
        assert!(!handler.has_flag("guid"));
    }

    #[test]
    fn test_trace_recorded() {
        let handler = Handler::with_trace(
            "function (e) {}",
            "at register (https://app.example/main.js:10:3)",
            |_e| {},
        );
        assert!(handler.trace().expect("trace").contains("main.js"));
    }
}
