//! The interception facade.
//!
//! Single choke point for listener registration, listener removal, and
//! message transmission. Every hook observes, then delegates to the raw
//! primitive - registration, removal, and delivery happen regardless of
//! tracking outcome, and an observation failure is logged, never
//! propagated to the page.
//!
//! # Lock discipline
//!
//! No state lock is held across a raw-primitive invocation or a console
//! call. Hooks read settings and mutate tracked state in short scopes,
//! then dispatch lock-free, so listeners may register, remove, or post
//! further messages re-entrantly.

// ============================================================================
// Imports
// ============================================================================

use std::backtrace::Backtrace;

use tracing::warn;

use crate::error::Result;
use crate::page::{
    ConsoleArg, Context, Handler, ListenerOptions, MessageEvent, Payload, PropValue, Registration,
};
use crate::protocol::envelope;
use crate::protocol::{Control, Notice};

use super::Monitor;
use super::console_patch;
use super::fingerprint::{Fingerprint, stack_location};
use super::path;
use super::state::{Direction, MessageRecord, TrackedListener, now_millis};

// ============================================================================
// Markers
// ============================================================================

/// Property tagging a callable as the monitor's own handler.
pub(crate) const HANDLER_MARKER_PROP: &str = "__postMessageMonitor_handler";

/// Property on an installed proxy referencing the callable it replaced.
pub(crate) const PROXY_ORIGINAL_PROP: &str = "__postMessageMonitor_original";

/// Property on an installed proxy referencing the unwrapped original.
pub(crate) const PROXY_UNWRAPPED_PROP: &str = "__postMessageMonitor_unwrapped";

/// Source-text markers identifying monitor-owned callables.
const INTERNAL_SOURCE_MARKERS: &[&str] = &[
    "// Ignore our own messages",
    "__postMessageMonitor",
    "__postMessageMonitorControl",
];

/// Source-text markers identifying monitor-owned fingerprints in display
/// filtering (includes rendered sentinel text).
const DISPLAY_FILTER_MARKERS: &[&str] = &[
    "// Ignore our own messages",
    "__postMessageMonitor",
    "PostMessage Monitor",
    "[PostMessage Monitor]",
];

/// Source text of the capturing receive hook.
const RECEIVE_HOOK_SOURCE: &str = "function (event) {\n    // Ignore our own messages\n    __postMessageMonitor_receive(event);\n}";

/// Source text of an installed reroute proxy.
const PROXY_SOURCE: &str = "function (event) {\n    __postMessageMonitor_reroute(event);\n    return listener.apply(this, arguments);\n}";

// ============================================================================
// Internal-Handler Detection
// ============================================================================

/// Returns `true` for the monitor's own callables.
///
/// Checks the explicit self-tag first, then scans the source text for
/// known internal markers.
pub(crate) fn is_our_own(handler: &Handler) -> bool {
    if handler.has_flag(HANDLER_MARKER_PROP) {
        return true;
    }
    let source = handler.source();
    INTERNAL_SOURCE_MARKERS
        .iter()
        .any(|marker| source.contains(marker))
}

/// Returns `true` for fingerprint code attributable to the monitor.
pub(crate) fn is_monitor_code(code: &str) -> bool {
    DISPLAY_FILTER_MARKERS
        .iter()
        .any(|marker| code.contains(marker))
}

// ============================================================================
// Register
// ============================================================================

/// Instrumented listener registration.
pub(crate) fn register(
    monitor: &Monitor,
    ctx: &Context,
    kind: &str,
    handler: Handler,
    options: ListenerOptions,
) {
    let mut install = handler.clone();

    if kind == "message" {
        match observe_register(monitor, ctx, &handler, options) {
            Ok(Some(proxy)) => install = proxy,
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Listener registration observation failed"),
        }
    }

    ctx.raw_add_listener(Registration {
        kind: kind.to_string(),
        handler: install,
        capture: options.capture,
        target: options.target,
    });
}

/// Tracks a `message` registration; returns a proxy to install instead of
/// the original when rerouting applies.
fn observe_register(
    monitor: &Monitor,
    ctx: &Context,
    handler: &Handler,
    options: ListenerOptions,
) -> Result<Option<Handler>> {
    if is_our_own(handler) {
        // Mark for cheap future checks, register untracked.
        handler.set_flag(HANDLER_MARKER_PROP);
        return Ok(None);
    }

    let unwrapped = monitor
        .registry()
        .unwrap_all(ctx.environment(), handler);
    if is_our_own(&unwrapped) {
        return Ok(None);
    }

    let wrapped_fp = Fingerprint::of(handler);
    let is_unwrapped = !unwrapped.same_as(handler);
    let unwrapped_fp = if is_unwrapped {
        Fingerprint::of(&unwrapped)
    } else {
        wrapped_fp.clone()
    };

    let settings = {
        let mut state = ctx.state().lock();
        state.push_listener(TrackedListener {
            kind: "message".to_string(),
            wrapped: wrapped_fp,
            unwrapped: unwrapped_fp,
            is_unwrapped,
            wrapper_kind: monitor.registry().classify(handler),
            target: options.target,
            timestamp: now_millis(),
        });
        state.settings
    };

    notify_listeners_updated(monitor, ctx);

    if is_unwrapped && settings.rerouting_enabled {
        Ok(Some(build_proxy(ctx, handler.clone(), unwrapped)))
    } else {
        Ok(None)
    }
}

/// Builds the reroute proxy installed in place of a wrapped listener.
///
/// The proxy self-tags as internal, keeps back-references to the wrapped
/// and unwrapped callables, and on invocation narrates (when logging is
/// enabled) before running the original with the original event.
fn build_proxy(ctx: &Context, original: Handler, unwrapped: Handler) -> Handler {
    let ctx_weak = ctx.downgrade();
    let invoke_original = original.clone();
    let narrate_original = original.clone();
    let narrate_unwrapped = unwrapped.clone();

    let proxy = Handler::new(PROXY_SOURCE, move |event| {
        if let Some(inner) = ctx_weak.upgrade() {
            let ctx = Context::from_inner(inner);
            let log_enabled = ctx.state().lock().settings.log_enabled;
            if log_enabled {
                let console = ctx.console();
                console.group("[PostMessage Monitor] Message event caught");
                console.log(&[ConsoleArg::text("Event:"), ConsoleArg::Event(event.clone())]);
                console.log(&[
                    ConsoleArg::text("Original wrapper:"),
                    ConsoleArg::Func(narrate_original.clone()),
                ]);
                console.log(&[
                    ConsoleArg::text("Unwrapped handler:"),
                    ConsoleArg::Func(narrate_unwrapped.clone()),
                ]);
                let source_path = event
                    .source()
                    .map_or_else(|| "unknown".to_string(), |src| path::window_path(&ctx, src));
                console.log(&[ConsoleArg::text("Source path:"), ConsoleArg::text(source_path)]);
                console.log(&[
                    ConsoleArg::text("Target path:"),
                    ConsoleArg::text(path::window_path(&ctx, &ctx)),
                ]);
                console.group_end();
            }
        }

        invoke_original.invoke(event);
    });

    proxy.set_flag(HANDLER_MARKER_PROP);
    proxy.set_prop(PROXY_ORIGINAL_PROP, PropValue::Func(original));
    proxy.set_prop(PROXY_UNWRAPPED_PROP, PropValue::Func(unwrapped));
    proxy
}

// ============================================================================
// Unregister
// ============================================================================

/// Instrumented listener removal.
///
/// A proxy is translated back to the callable it replaced before both the
/// tracking removal (matched by fingerprint hash, not identity) and the
/// raw removal.
pub(crate) fn unregister(
    monitor: &Monitor,
    ctx: &Context,
    kind: &str,
    handler: &Handler,
    options: ListenerOptions,
) {
    if kind != "message" {
        ctx.raw_remove_listener(kind, handler, options.capture);
        return;
    }

    let backing = handler.func_prop(PROXY_ORIGINAL_PROP);
    let effective = backing.as_ref().unwrap_or(handler);

    let fingerprint = Fingerprint::of(effective);
    let removed = ctx.state().lock().remove_listener_by_hash(fingerprint.hash);
    if removed {
        notify_listeners_updated(monitor, ctx);
    }

    ctx.raw_remove_listener(kind, effective, options.capture);
}

// ============================================================================
// Transmit
// ============================================================================

/// Instrumented message transmission.
///
/// Observation is by value snapshot; the raw primitive always receives the
/// original, unmodified payload.
pub(crate) fn transmit(
    monitor: &Monitor,
    sender: &Context,
    target: &Context,
    payload: Payload,
    target_origin: &str,
) {
    if !envelope::is_internal(&payload)
        && let Err(err) = observe_transmit(monitor, sender, target, &payload, target_origin)
    {
        warn!(error = %err, "Transmit observation failed");
    }

    let event = MessageEvent::new(payload, sender.origin(), Some(sender.clone()));
    target.raw_post(event, target_origin);
}

/// Records and optionally narrates an outgoing message.
fn observe_transmit(
    monitor: &Monitor,
    sender: &Context,
    target: &Context,
    payload: &Payload,
    target_origin: &str,
) -> Result<()> {
    let snapshot = payload.snapshot();
    let sender_path = path::frame_path(sender);
    let origin_display = if target_origin.is_empty() {
        "*"
    } else {
        target_origin
    };

    let settings = sender.state().lock().settings;
    let record = MessageRecord {
        direction: Direction::Outgoing,
        source: sender_path.clone(),
        target: if target_origin.is_empty() {
            "any".to_string()
        } else {
            target_origin.to_string()
        },
        data: snapshot.clone(),
        timestamp: now_millis(),
        path: format!("{sender_path}.postMessage({snapshot}, \"{origin_display}\")"),
        console_log: settings.log_enabled,
    };

    sender.state().lock().push_record(record.clone());
    monitor.notices().send(Notice::LogMessage {
        context_id: sender.id(),
        record,
    });

    if settings.log_enabled {
        narrate_outgoing(sender, target, &snapshot, origin_display);
    }
    Ok(())
}

/// Console narration of an outgoing message.
fn narrate_outgoing(
    sender: &Context,
    target: &Context,
    snapshot: &serde_json::Value,
    origin_display: &str,
) {
    let console = sender.console();
    let cross_window = !sender.same_as(target);

    if cross_window {
        let target_path = path::window_path(sender, target);
        console.group(&format!(
            "[PostMessage Monitor] Cross-window Message to {target_path}"
        ));
        console.log(&[ConsoleArg::text("Data:"), ConsoleArg::Json(snapshot.clone())]);
        console.log(&[
            ConsoleArg::text("Target origin:"),
            ConsoleArg::text(origin_display),
        ]);
        console.log(&[ConsoleArg::text("Target path:"), ConsoleArg::text(target_path)]);
    } else {
        console.group(&format!(
            "[PostMessage Monitor] Outgoing Message to {origin_display}"
        ));
        console.log(&[ConsoleArg::text("Data:"), ConsoleArg::Json(snapshot.clone())]);
        console.log(&[
            ConsoleArg::text("Target origin:"),
            ConsoleArg::text(origin_display),
        ]);
    }

    console.log(&[
        ConsoleArg::text("Sender path:"),
        ConsoleArg::text(path::window_path(sender, sender)),
    ]);

    if let Some(site) = caller_site() {
        console.log(&[ConsoleArg::text("Called from:"), ConsoleArg::text(site)]);
    }

    console.group_end();
}

/// Best-effort attribution of the transmitting call site.
fn caller_site() -> Option<String> {
    let stack = Backtrace::force_capture().to_string();
    stack_location(&stack)
}

// ============================================================================
// Receive
// ============================================================================

/// Installs the capturing receive hook as the context's first listener.
pub(crate) fn install_receive_hook(monitor: &Monitor, ctx: &Context) {
    let ctx_weak = ctx.downgrade();
    let monitor_weak = monitor.downgrade();

    let handler = Handler::new(RECEIVE_HOOK_SOURCE, move |event| {
        let (Some(ctx_inner), Some(monitor_inner)) = (ctx_weak.upgrade(), monitor_weak.upgrade())
        else {
            return;
        };
        receive(
            &Monitor::from_inner(monitor_inner),
            &Context::from_inner(ctx_inner),
            event,
        );
    });
    handler.set_flag(HANDLER_MARKER_PROP);

    ctx.raw_add_listener(Registration {
        kind: "message".to_string(),
        handler,
        capture: true,
        target: crate::page::RegistrationTarget::Window,
    });
}

/// Capturing observation of an incoming message.
///
/// Control envelopes are applied and consumed without telemetry; monitor
/// telemetry envelopes pass through untracked; everything else is
/// recorded and optionally narrated.
pub(crate) fn receive(monitor: &Monitor, ctx: &Context, event: &MessageEvent) {
    if let Some(control) = envelope::extract_control(event.data()) {
        apply_control(monitor, ctx, control);
        return;
    }
    if envelope::is_internal(event.data()) {
        return;
    }

    if let Err(err) = observe_receive(monitor, ctx, event) {
        warn!(error = %err, "Receive observation failed");
    }
}

/// Records and optionally narrates an incoming message.
fn observe_receive(monitor: &Monitor, ctx: &Context, event: &MessageEvent) -> Result<()> {
    let source_path = event
        .source()
        .map_or_else(|| "unknown".to_string(), |src| path::window_path(ctx, src));
    let snapshot = event.data().snapshot();
    let frame_path = path::frame_path(ctx);

    let settings = ctx.state().lock().settings;
    let record = MessageRecord {
        direction: Direction::Incoming,
        source: if event.origin().is_empty() {
            "unknown".to_string()
        } else {
            event.origin().to_string()
        },
        target: frame_path.clone(),
        data: snapshot.clone(),
        timestamp: now_millis(),
        path: frame_path,
        console_log: settings.log_enabled,
    };

    ctx.state().lock().push_record(record.clone());
    monitor.notices().send(Notice::LogMessage {
        context_id: ctx.id(),
        record,
    });

    if settings.log_enabled {
        narrate_incoming(ctx, event, &snapshot, &source_path);
    }
    Ok(())
}

/// Console narration of an incoming message, listing eligible listeners.
fn narrate_incoming(
    ctx: &Context,
    event: &MessageEvent,
    snapshot: &serde_json::Value,
    source_path: &str,
) {
    let console = ctx.console();
    console.group(&format!(
        "[PostMessage Monitor] Incoming Message from {}",
        event.origin()
    ));
    console.log(&[ConsoleArg::text("Data:"), ConsoleArg::Json(snapshot.clone())]);
    console.log(&[ConsoleArg::text("Origin:"), ConsoleArg::text(event.origin())]);
    console.log(&[ConsoleArg::text("Source path:"), ConsoleArg::text(source_path)]);
    console.log(&[
        ConsoleArg::text("Target path:"),
        ConsoleArg::text(path::window_path(ctx, ctx)),
    ]);
    console.log(&[ConsoleArg::text("Event:"), ConsoleArg::Event(event.clone())]);

    let active: Vec<TrackedListener> = ctx
        .state()
        .lock()
        .listeners()
        .iter()
        .filter(|l| !is_monitor_code(&l.wrapped.code) && !is_monitor_code(&l.unwrapped.code))
        .cloned()
        .collect();

    if !active.is_empty() {
        console.group("Active listeners that will receive this message:");
        for (index, listener) in active.iter().enumerate() {
            console.group(&format!("Listener #{}", index + 1));
            if listener.is_unwrapped {
                console.log(&[
                    ConsoleArg::text("Original wrapper:"),
                    ConsoleArg::text(&listener.wrapped.code),
                ]);
                console.log(&[
                    ConsoleArg::text("Unwrapped function:"),
                    ConsoleArg::text(&listener.unwrapped.code),
                ]);
                console.log(&[
                    ConsoleArg::text("Wrapper type:"),
                    ConsoleArg::text(listener.wrapper_kind.to_string()),
                ]);
            } else {
                console.log(&[
                    ConsoleArg::text("Function:"),
                    ConsoleArg::text(&listener.wrapped.code),
                ]);
            }
            console.log(&[
                ConsoleArg::text("Added at:"),
                ConsoleArg::text(listener.timestamp.to_string()),
            ]);
            console.log(&[
                ConsoleArg::text("Location:"),
                ConsoleArg::text(&listener.unwrapped.location),
            ]);
            console.group_end();
        }
        console.group_end();
    }

    console.group_end();
}

// ============================================================================
// Control Application
// ============================================================================

/// Applies a configuration push to the context and persists it.
fn apply_control(monitor: &Monitor, ctx: &Context, control: Control) {
    match control {
        Control::UpdateLogging { enabled } => {
            ctx.state().lock().settings.log_enabled = enabled;
        }
        Control::UpdateConsoleEnhancement { enabled } => {
            ctx.state().lock().settings.console_enhancement_enabled = enabled;
            if enabled {
                console_patch::patch(monitor, ctx);
            } else {
                console_patch::unpatch(ctx);
            }
        }
        Control::UpdateRerouting { enabled } => {
            ctx.state().lock().settings.rerouting_enabled = enabled;
        }
        Control::InitSettings { settings } => {
            ctx.state().lock().settings = settings;
            if settings.console_enhancement_enabled {
                console_patch::patch(monitor, ctx);
            } else {
                console_patch::unpatch(ctx);
            }
        }
        Control::TestTransmit { data } => {
            // Injected the way the relay's isolated world posts: straight
            // through the raw primitive, observed only on receipt.
            let event = MessageEvent::new(
                envelope::test_message(data),
                ctx.origin(),
                Some(ctx.clone()),
            );
            ctx.raw_post(event, "*");
            return;
        }
    }

    let settings = ctx.state().lock().settings;
    monitor.persist_settings(ctx.id(), settings);
}

// ============================================================================
// Notifications
// ============================================================================

/// Emits the current tracked-listener collection to the relay.
///
/// Monitor-attributable fingerprints are filtered out before leaving the
/// context.
pub(crate) fn notify_listeners_updated(monitor: &Monitor, ctx: &Context) {
    let listeners: Vec<TrackedListener> = ctx
        .state()
        .lock()
        .listeners()
        .iter()
        .filter(|l| !is_monitor_code(&l.wrapped.code) && !is_monitor_code(&l.unwrapped.code))
        .cloned()
        .collect();

    monitor.notices().send(Notice::UpdateListeners {
        context_id: ctx.id(),
        listeners,
    });
}

// ============================================================================
// Tests
// ============================================================================
