//! Monitor coordinator and factory.
//!
//! The [`Monitor`] owns everything that outlives a single page context:
//! the wrapper-detector registry, the notice channel to the relay, the
//! master settings, and the per-context settings store that survives
//! navigations. Contexts created through the monitor come up instrumented:
//! capturing receive hook first, console patched when enhancement is on,
//! and a `REGISTER_FRAME` notice announcing the frame.
//!
//! # Example
//!
//! ```no_run
//! use postmessage_monitor::{Monitor, Handler, Payload};
//!
//! # fn example() -> postmessage_monitor::Result<()> {
//! let monitor = Monitor::builder().build();
//! let page = monitor.page("https://app.example")?;
//! let frame = page.spawn_child("https://widget.example")?;
//!
//! page.add_message_listener(Handler::new("function (e) { render(e.data); }", |_e| {}));
//! page.post_message_to(&frame, Payload::json(serde_json::json!({"x": 1})), "*");
//!
//! let report = monitor.state();
//! println!("{} listeners tracked", report.total_listeners);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::ContextId;
use crate::page::Context;
use crate::protocol::envelope;
use crate::protocol::{Control, Notice};
use crate::relay::NoticeSender;

use super::builder::MonitorBuilder;
use super::console_patch;
use super::intercept;
use super::path;
use super::state::{ContextState, MessageRecord, Settings, TrackedListener, REPORT_MESSAGE_TAIL};
use super::wrappers::WrapperRegistry;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the monitor.
pub(crate) struct MonitorInner {
    /// Wrapper-detector table.
    pub registry: WrapperRegistry,

    /// Best-effort channel up to the relay.
    pub notices: NoticeSender,

    /// Master settings applied to newly seen contexts.
    pub master: Mutex<Settings>,

    /// Per-context settings, surviving navigation of that context.
    pub store: Mutex<FxHashMap<ContextId, Settings>>,

    /// Top-level pages created through this monitor.
    pub pages: Mutex<Vec<Context>>,
}

// ============================================================================
// Reports
// ============================================================================

/// Aggregated monitor state, the full-state query consumers re-synchronize
/// with after dropped notices.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    /// Tracked listeners across all frames.
    pub total_listeners: usize,
    /// Per-frame listener lists.
    pub frames: Vec<FrameReport>,
    /// Master narration state.
    pub log_enabled: bool,
    /// Master console-enhancement state.
    pub console_enhancement_enabled: bool,
    /// Master rerouting state.
    pub rerouting_enabled: bool,
    /// Most recent captured messages, oldest first.
    pub captured_messages: Vec<MessageRecord>,
}

/// One frame's slice of a state report.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    /// Frame identity.
    #[serde(rename = "contextId")]
    pub context_id: ContextId,
    /// Frame origin.
    pub url: String,
    /// Absolute frame path expression.
    pub path: String,
    /// Tracked listeners, monitor-attributable entries filtered out.
    pub listeners: Vec<TrackedListener>,
}

// ============================================================================
// Monitor
// ============================================================================

/// The postMessage instrumentation engine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Monitor {
    pub(crate) inner: Arc<MonitorInner>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("pages", &self.inner.pages.lock().len())
            .field("settings", &*self.inner.master.lock())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Creates a configuration builder for the monitor.
    #[inline]
    #[must_use]
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    /// Assembles a monitor from builder parts.
    pub(crate) fn from_parts(
        registry: WrapperRegistry,
        notices: NoticeSender,
        settings: Settings,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                registry,
                notices,
                master: Mutex::new(settings),
                store: Mutex::new(FxHashMap::default()),
                pages: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Rebuilds a handle from a raw inner reference.
    pub(crate) fn from_inner(inner: Arc<MonitorInner>) -> Self {
        Self { inner }
    }

    /// Downgrades to a weak inner reference.
    pub(crate) fn downgrade(&self) -> Weak<MonitorInner> {
        Arc::downgrade(&self.inner)
    }
}

// ============================================================================
// Monitor - Pages
// ============================================================================

impl Monitor {
    /// Creates an instrumented top-level page context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty origin.
    pub fn page(&self, origin: impl Into<String>) -> Result<Context> {
        let origin = origin.into();
        if origin.is_empty() {
            return Err(Error::config(
                "Page origin is required. Example: monitor.page(\"https://app.example\")",
            ));
        }

        let ctx = Context::new(origin, Weak::new(), Arc::downgrade(&self.inner));
        self.inner.pages.lock().push(ctx.clone());
        self.initialize_context(&ctx);
        Ok(ctx)
    }

    /// Finds a live context by its stable identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Detached`] when no context with that ID is
    /// reachable any more - a configuration push targeting it should be
    /// dropped, not retried.
    pub fn context_by_id(&self, context_id: ContextId) -> Result<Context> {
        self.contexts()
            .into_iter()
            .find(|ctx| ctx.id() == context_id)
            .ok_or(Error::Detached { context_id })
    }

    /// Returns every context reachable from this monitor's pages.
    #[must_use]
    pub fn contexts(&self) -> Vec<Context> {
        let mut all = Vec::new();
        let mut queue: Vec<Context> = self.inner.pages.lock().clone();
        while let Some(ctx) = queue.pop() {
            queue.extend(ctx.children());
            all.push(ctx);
        }
        all
    }

    /// Brings a context up instrumented.
    ///
    /// Called on page creation, child-frame creation, and navigation.
    /// Reapplies settings persisted under the context's ID, installs the
    /// capturing receive hook as the first listener, patches the console
    /// when enhancement is on, and announces the frame.
    pub(crate) fn initialize_context(&self, ctx: &Context) {
        let stored = self.inner.store.lock().get(&ctx.id()).copied();
        let settings = stored.unwrap_or_else(|| *self.inner.master.lock());

        *ctx.state().lock() = ContextState::with_settings(settings);
        intercept::install_receive_hook(self, ctx);
        if settings.console_enhancement_enabled {
            console_patch::patch(self, ctx);
        }

        debug!(context_id = %ctx.id(), origin = %ctx.origin(), "Context instrumented");
        self.inner.notices.send(Notice::RegisterFrame {
            context_id: ctx.id(),
            origin: ctx.origin(),
            path: path::frame_path(ctx),
            listeners: Vec::new(),
        });
    }
}

// ============================================================================
// Monitor - Internal Accessors
// ============================================================================

impl Monitor {
    /// Returns the wrapper-detector registry.
    pub(crate) fn registry(&self) -> &WrapperRegistry {
        &self.inner.registry
    }

    /// Returns the notice channel.
    pub(crate) fn notices(&self) -> &NoticeSender {
        &self.inner.notices
    }

    /// Persists a context's settings across navigations of that context.
    pub(crate) fn persist_settings(&self, context_id: ContextId, settings: Settings) {
        self.inner.store.lock().insert(context_id, settings);
    }
}

// ============================================================================
// Monitor - Configuration
// ============================================================================

impl Monitor {
    /// Returns the master settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        *self.inner.master.lock()
    }

    /// Toggles console narration everywhere.
    pub fn set_logging(&self, enabled: bool) {
        self.inner.master.lock().log_enabled = enabled;
        self.broadcast(&Control::UpdateLogging { enabled });
    }

    /// Toggles console enhancement everywhere.
    pub fn set_console_enhancement(&self, enabled: bool) {
        self.inner.master.lock().console_enhancement_enabled = enabled;
        self.broadcast(&Control::UpdateConsoleEnhancement { enabled });
    }

    /// Toggles listener rerouting everywhere.
    pub fn set_rerouting(&self, enabled: bool) {
        self.inner.master.lock().rerouting_enabled = enabled;
        self.broadcast(&Control::UpdateRerouting { enabled });
    }

    /// Pushes the full master settings tuple to every frame.
    pub fn broadcast_settings(&self) {
        let settings = *self.inner.master.lock();
        self.broadcast(&Control::InitSettings { settings });
    }

    /// Injects a synthetic message into a context to verify listener
    /// capture.
    pub fn test_transmit(&self, ctx: &Context, data: Value) {
        self.deliver_control(ctx, &Control::TestTransmit { data });
    }

    /// Drops all captured messages across all frames.
    pub fn clear_messages(&self) {
        for ctx in self.contexts() {
            ctx.state().lock().clear_records();
        }
    }

    /// Delivers a control push to one context, in-band.
    fn deliver_control(&self, ctx: &Context, control: &Control) {
        match envelope::control_envelope(control) {
            Ok(payload) => {
                let event =
                    crate::page::MessageEvent::new(payload, ctx.origin(), Some(ctx.clone()));
                ctx.raw_post(event, "*");
            }
            Err(err) => warn!(error = %err, "Control envelope failed to serialize"),
        }
    }

    /// Delivers a control push to every known context.
    fn broadcast(&self, control: &Control) {
        for ctx in self.contexts() {
            self.deliver_control(&ctx, control);
        }
    }
}

// ============================================================================
// Monitor - State Query
// ============================================================================

impl Monitor {
    /// Builds the aggregated state report.
    #[must_use]
    pub fn state(&self) -> StateReport {
        let settings = *self.inner.master.lock();
        let mut frames = Vec::new();
        let mut captured: Vec<MessageRecord> = Vec::new();
        let mut total = 0;

        for ctx in self.contexts() {
            let (listeners, records) = {
                let state = ctx.state().lock();
                let listeners: Vec<TrackedListener> = state
                    .listeners()
                    .iter()
                    .filter(|l| {
                        !intercept::is_monitor_code(&l.wrapped.code)
                            && !intercept::is_monitor_code(&l.unwrapped.code)
                    })
                    .cloned()
                    .collect();
                (listeners, state.recent_records(usize::MAX))
            };

            total += listeners.len();
            captured.extend(records);
            frames.push(FrameReport {
                context_id: ctx.id(),
                url: ctx.origin(),
                path: path::frame_path(&ctx),
                listeners,
            });
        }

        captured.sort_by_key(|record| record.timestamp);
        let skip = captured.len().saturating_sub(REPORT_MESSAGE_TAIL);
        let captured_messages = captured.split_off(skip);

        StateReport {
            total_listeners: total,
            frames,
            log_enabled: settings.log_enabled,
            console_enhancement_enabled: settings.console_enhancement_enabled,
            rerouting_enabled: settings.rerouting_enabled,
            captured_messages,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
