//! Execution contexts (frames) and their raw messaging primitives.
//!
//! A [`Context`] is one node in a frame tree: it owns a console, an
//! environment, a listener list, and the monitor state scoped to the
//! current page instantiation. The *instrumented* operations
//! ([`Context::add_listener`], [`Context::remove_listener`],
//! [`Context::post_message`], [`Context::post_message_to`]) route through
//! the interception facade; the raw primitives (`raw_add_listener`,
//! `raw_remove_listener`, `raw_post`) are crate-private and reachable only
//! through that facade, so the facade is the single choke point.
//!
//! # Dispatch
//!
//! Delivery is synchronous within the caller's turn. Capture-phase
//! listeners run before bubble-phase listeners, each phase in registration
//! order, honoring [`MessageEvent::stop_propagation`] between invocations.
//! The monitor's own capturing hook is installed first on every context, so
//! it observes a message before any page listener can throw or stop
//! propagation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ContextId;
use crate::monitor::core::MonitorInner;
use crate::monitor::intercept;
use crate::monitor::state::ContextState;
use crate::monitor::Monitor;

use super::console::Console;
use super::environment::Environment;
use super::handler::Handler;
use super::payload::{MessageEvent, Payload};

// ============================================================================
// RegistrationTarget
// ============================================================================

/// The surface a listener was registered on.
///
/// Messages are only dispatched to window-surface registrations; listeners
/// attached to other surfaces are tracked but never invoked by
/// [`Context::post_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationTarget {
    /// The context's window surface.
    #[serde(rename = "window")]
    Window,
    /// Some other event target in the context (e.g. the document).
    #[serde(rename = "other-target")]
    Other,
}

impl Default for RegistrationTarget {
    fn default() -> Self {
        Self::Window
    }
}

// ============================================================================
// ListenerOptions
// ============================================================================

/// Options accompanying a listener registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerOptions {
    /// Register for the capture phase.
    pub capture: bool,
    /// Registration surface.
    pub target: RegistrationTarget,
}

impl ListenerOptions {
    /// Options for a capture-phase window listener.
    #[inline]
    #[must_use]
    pub fn capturing() -> Self {
        Self {
            capture: true,
            target: RegistrationTarget::Window,
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

/// One raw listener registration.
#[derive(Clone)]
pub(crate) struct Registration {
    /// Event kind (only `"message"` registrations receive posted messages).
    pub kind: String,
    /// The registered callable.
    pub handler: Handler,
    /// Capture-phase flag.
    pub capture: bool,
    /// Registration surface.
    pub target: RegistrationTarget,
}

// ============================================================================
// Context
// ============================================================================

/// Internal shared state for a context.
pub(crate) struct ContextInner {
    /// Stable frame-slot identity, kept across navigations.
    pub id: ContextId,
    /// Current origin.
    pub origin: Mutex<String>,
    /// Parent context, absent for a top-level page.
    pub parent: Weak<ContextInner>,
    /// Child frames, in creation order.
    pub children: Mutex<Vec<Context>>,
    /// Raw listener registrations.
    pub listeners: Mutex<Vec<Registration>>,
    /// The page console (replaced wholesale on navigation).
    pub console: Mutex<Console>,
    /// Third-party globals defined by the page.
    pub environment: Environment,
    /// Monitor state scoped to the current page instantiation.
    pub state: Mutex<ContextState>,
    /// Origin isolation: frame-walk access from other origins throws.
    pub isolated: AtomicBool,
    /// Owning monitor engine.
    pub monitor: Weak<MonitorInner>,
}

/// A handle to one execution context (frame).
///
/// Contexts are cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("origin", &*self.inner.origin.lock())
            .field("children", &self.inner.children.lock().len())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a context node.
    pub(crate) fn new(
        origin: impl Into<String>,
        parent: Weak<ContextInner>,
        monitor: Weak<MonitorInner>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::generate(),
                origin: Mutex::new(origin.into()),
                parent,
                children: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                console: Mutex::new(Console::new()),
                environment: Environment::new(),
                state: Mutex::new(ContextState::default()),
                isolated: AtomicBool::new(false),
                monitor,
            }),
        }
    }

    /// Rebuilds a handle from a raw inner reference.
    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    /// Downgrades to a weak inner reference.
    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Arc::downgrade(&self.inner)
    }
}

// ============================================================================
// Context - Accessors
// ============================================================================

impl Context {
    /// Returns the context's stable identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Returns the context's current origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> String {
        self.inner.origin.lock().clone()
    }

    /// Returns the page console.
    #[inline]
    #[must_use]
    pub fn console(&self) -> Console {
        self.inner.console.lock().clone()
    }

    /// Returns the page environment.
    #[inline]
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    /// Returns the parent context, if this is a subframe.
    #[must_use]
    pub fn parent(&self) -> Option<Context> {
        self.inner.parent.upgrade().map(Context::from_inner)
    }

    /// Returns `true` for a top-level context.
    #[inline]
    #[must_use]
    pub fn is_top(&self) -> bool {
        self.inner.parent.upgrade().is_none()
    }

    /// Returns the top-level context of this frame tree.
    #[must_use]
    pub fn top(&self) -> Context {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Returns the context's direct child frames.
    #[must_use]
    pub fn children(&self) -> Vec<Context> {
        self.inner.children.lock().clone()
    }

    /// Returns `true` if both handles reference the same context.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Marks the context origin-isolated.
    ///
    /// Frame-walk access from other origins then fails instead of using
    /// the allowlisted cross-origin view.
    pub fn set_isolated(&self, isolated: bool) {
        self.inner.isolated.store(isolated, Ordering::SeqCst);
    }

    /// Returns `true` if the context is origin-isolated.
    #[inline]
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.inner.isolated.load(Ordering::SeqCst)
    }

    /// Returns this context's child list as seen from `viewer`.
    ///
    /// The frame collection is ordinarily readable across origins; an
    /// origin-isolated context denies the walk to foreign viewers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccessDenied`] when this context is isolated and
    /// `viewer` sits on a different origin.
    pub(crate) fn children_for(&self, viewer: &Context) -> Result<Vec<Context>> {
        if self.is_isolated() && !self.same_as(viewer) && self.origin() != viewer.origin() {
            return Err(Error::access_denied(viewer.origin(), self.origin()));
        }
        Ok(self.children())
    }

    /// Returns the owning monitor, when still alive.
    pub(crate) fn monitor(&self) -> Option<Monitor> {
        self.inner.monitor.upgrade().map(Monitor::from_inner)
    }

    /// Returns the monitor state of the current page instantiation.
    pub(crate) fn state(&self) -> &Mutex<ContextState> {
        &self.inner.state
    }
}

// ============================================================================
// Context - Lifecycle
// ============================================================================

impl Context {
    /// Creates and instruments a child frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty origin.
    pub fn spawn_child(&self, origin: impl Into<String>) -> Result<Context> {
        let origin = origin.into();
        if origin.is_empty() {
            return Err(Error::config("Child frame origin is required"));
        }

        let child = Context::new(
            origin,
            Arc::downgrade(&self.inner),
            self.inner.monitor.clone(),
        );
        self.inner.children.lock().push(child.clone());

        match self.monitor() {
            Some(monitor) => monitor.initialize_context(&child),
            None => debug!(context_id = %child.id(), "Monitor gone; child frame uninstrumented"),
        }

        Ok(child)
    }

    /// Navigates the context to a new origin.
    ///
    /// The page-private state is destroyed and recreated: listeners,
    /// console, environment, child frames, and monitor state are all
    /// fresh. Settings persisted under this context's ID are reapplied by
    /// the monitor during re-initialization.
    pub fn navigate(&self, origin: impl Into<String>) {
        *self.inner.origin.lock() = origin.into();
        self.inner.listeners.lock().clear();
        self.inner.children.lock().clear();
        *self.inner.console.lock() = Console::new();
        self.inner.environment.clear();
        *self.inner.state.lock() = ContextState::default();
        self.inner.isolated.store(false, Ordering::SeqCst);

        match self.monitor() {
            Some(monitor) => monitor.initialize_context(self),
            None => debug!(context_id = %self.id(), "Monitor gone; navigated frame uninstrumented"),
        }
    }
}

// ============================================================================
// Context - Instrumented Operations
// ============================================================================

impl Context {
    /// Registers a listener for the given event kind.
    pub fn add_listener(&self, kind: &str, handler: Handler, options: ListenerOptions) {
        match self.monitor() {
            Some(monitor) => intercept::register(&monitor, self, kind, handler, options),
            None => self.raw_add_listener(Registration {
                kind: kind.to_string(),
                handler,
                capture: options.capture,
                target: options.target,
            }),
        }
    }

    /// Registers a bubble-phase `message` listener on the window surface.
    #[inline]
    pub fn add_message_listener(&self, handler: Handler) {
        self.add_listener("message", handler, ListenerOptions::default());
    }

    /// Removes a previously registered listener.
    pub fn remove_listener(&self, kind: &str, handler: &Handler, options: ListenerOptions) {
        match self.monitor() {
            Some(monitor) => intercept::unregister(&monitor, self, kind, handler, options),
            None => {
                self.raw_remove_listener(kind, handler, options.capture);
            }
        }
    }

    /// Posts a message to this context itself.
    pub fn post_message(&self, payload: Payload, target_origin: &str) {
        match self.monitor() {
            Some(monitor) => intercept::transmit(&monitor, self, self, payload, target_origin),
            None => {
                let event = MessageEvent::new(payload, self.origin(), Some(self.clone()));
                self.raw_post(event, target_origin);
            }
        }
    }

    /// Posts a message to another context.
    pub fn post_message_to(&self, target: &Context, payload: Payload, target_origin: &str) {
        match self.monitor() {
            Some(monitor) => intercept::transmit(&monitor, self, target, payload, target_origin),
            None => {
                let event = MessageEvent::new(payload, self.origin(), Some(self.clone()));
                target.raw_post(event, target_origin);
            }
        }
    }
}

// ============================================================================
// Context - Raw Primitives
// ============================================================================

impl Context {
    /// Appends a registration to the raw listener list.
    pub(crate) fn raw_add_listener(&self, registration: Registration) {
        self.inner.listeners.lock().push(registration);
    }

    /// Removes the first matching registration.
    ///
    /// Matches by callable identity, or by a registration whose handler
    /// back-references the passed callable - so removing either an
    /// installed proxy or the original it stands in for unhooks the same
    /// registration. Returns `true` if a registration was removed.
    pub(crate) fn raw_remove_listener(&self, kind: &str, handler: &Handler, capture: bool) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let position = listeners.iter().position(|r| {
            r.kind == kind
                && r.capture == capture
                && (r.handler.same_as(handler)
                    || r.handler
                        .func_prop(intercept::PROXY_ORIGINAL_PROP)
                        .is_some_and(|original| original.same_as(handler)))
        });

        match position {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns a snapshot of the raw listener list.
    pub(crate) fn raw_listeners(&self) -> Vec<Registration> {
        self.inner.listeners.lock().clone()
    }

    /// Dispatches a message event to this context's listeners.
    ///
    /// Honors the target-origin restriction, then runs capture-phase
    /// listeners before bubble-phase listeners. The registration list is
    /// snapshotted before dispatch so listeners may register or remove
    /// listeners (or post further messages) without deadlocking.
    pub(crate) fn raw_post(&self, event: MessageEvent, target_origin: &str) {
        if target_origin != "*" && target_origin != self.origin() {
            debug!(
                context_id = %self.id(),
                target_origin,
                "Message dropped: target origin mismatch"
            );
            return;
        }

        let registrations: Vec<Registration> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|r| r.kind == "message" && r.target == RegistrationTarget::Window)
            .cloned()
            .collect();

        for phase_capture in [true, false] {
            for registration in registrations.iter().filter(|r| r.capture == phase_capture) {
                if event.propagation_stopped() {
                    return;
                }
                registration.handler.invoke(&event);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    fn detached_context(origin: &str) -> Context {
        Context::new(origin, Weak::new(), Weak::new())
    }

    fn counting_handler(source: &str) -> (Handler, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let handler = Handler::new(source, move |_e| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        (handler, hits)
    }

    #[test]
    fn test_post_message_delivers_to_listener() {
        let ctx = detached_context("https://app.example");
        let (handler, hits) = counting_handler("function (e) { handle(e); }");

        ctx.add_message_listener(handler);
        ctx.post_message(Payload::json(json!({"x": 1})), "*");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_target_origin_mismatch_drops() {
        let ctx = detached_context("https://app.example");
        let (handler, hits) = counting_handler("function (e) {}");

        ctx.add_message_listener(handler);
        ctx.post_message(Payload::json(json!(1)), "https://other.example");

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_capture_runs_before_bubble() {
        let ctx = detached_context("https://app.example");
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_bubble = Arc::clone(&order);
        ctx.add_message_listener(Handler::new("function bubble(e) {}", move |_e| {
            order_bubble.lock().push("bubble");
        }));

        let order_capture = Arc::clone(&order);
        ctx.add_listener(
            "message",
            Handler::new("function capture(e) {}", move |_e| {
                order_capture.lock().push("capture");
            }),
            ListenerOptions::capturing(),
        );

        ctx.post_message(Payload::json(json!(1)), "*");
        assert_eq!(*order.lock(), vec!["capture", "bubble"]);
    }

    #[test]
    fn test_stop_propagation_skips_later_listeners() {
        let ctx = detached_context("https://app.example");

        ctx.add_message_listener(Handler::new("function stopper(e) {}", |event| {
            event.stop_propagation();
        }));
        let (handler, hits) = counting_handler("function late(e) {}");
        ctx.add_message_listener(handler);

        ctx.post_message(Payload::json(json!(1)), "*");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_other_target_not_dispatched() {
        let ctx = detached_context("https://app.example");
        let (handler, hits) = counting_handler("function doc(e) {}");

        ctx.add_listener(
            "message",
            handler,
            ListenerOptions {
                capture: false,
                target: RegistrationTarget::Other,
            },
        );
        ctx.post_message(Payload::json(json!(1)), "*");

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_listener_by_identity() {
        let ctx = detached_context("https://app.example");
        let (handler, hits) = counting_handler("function (e) {}");

        ctx.add_message_listener(handler.clone());
        ctx.remove_listener("message", &handler, ListenerOptions::default());
        ctx.post_message(Payload::json(json!(1)), "*");

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(ctx.raw_listeners().is_empty());
    }

    #[test]
    fn test_spawn_child_requires_origin() {
        let top = detached_context("https://app.example");
        assert!(top.spawn_child("").is_err());
    }

    #[test]
    fn test_spawn_child_and_tree_walk() {
        let top = detached_context("https://app.example");
        let child = top.spawn_child("https://widget.example").expect("child");

        assert!(top.is_top());
        assert!(!child.is_top());
        assert!(child.top().same_as(&top));
        assert!(child.parent().expect("parent").same_as(&top));
        assert_eq!(top.children().len(), 1);
    }

    #[test]
    fn test_children_for_isolation() {
        let top = detached_context("https://app.example");
        let child = top.spawn_child("https://widget.example").expect("child");

        // Cross-origin frame walks use the allowlisted view by default.
        assert!(child.children_for(&top).is_ok());

        child.set_isolated(true);
        let err = child.children_for(&top).unwrap_err();
        assert!(err.is_access_denied());

        // The isolated context still walks itself.
        assert!(child.children_for(&child).is_ok());
    }

    #[test]
    fn test_navigate_clears_page_state() {
        let ctx = detached_context("https://app.example");
        let (handler, _hits) = counting_handler("function (e) {}");
        ctx.add_message_listener(handler);
        ctx.environment().define("Sentry");
        ctx.spawn_child("https://widget.example").expect("child");
        let id = ctx.id();

        ctx.navigate("https://next.example");

        assert_eq!(ctx.id(), id);
        assert_eq!(ctx.origin(), "https://next.example");
        assert!(ctx.raw_listeners().is_empty());
        assert!(ctx.children().is_empty());
        assert!(!ctx.environment().has("Sentry"));
    }

    #[test]
    fn test_listener_inside_dispatch_does_not_deadlock() {
        let ctx = detached_context("https://app.example");
        let ctx_clone = ctx.clone();

        ctx.add_message_listener(Handler::new("function reg(e) {}", move |_e| {
            ctx_clone.add_message_listener(Handler::stub("function late(e) {}"));
        }));
        ctx.post_message(Payload::json(json!(1)), "*");

        assert_eq!(ctx.raw_listeners().len(), 2);
    }
}
