//! Console enhancement.
//!
//! When enabled, the console's `log` entry point expands a trailing
//! message-event argument (one without an accompanying string label) into
//! payload, origin, and resolved source path lines, and the `dir` entry
//! point prints the unwrapped original of a detected wrapper before the
//! wrapper itself.
//!
//! The pre-patch entry points are stored once, on first patch; disabling
//! restores those exact references, and re-enabling wraps the stored
//! originals again - never an already-wrapped entry point.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::page::{ConsoleArg, Context, DirHook, LogHook};

use super::Monitor;
use super::path;

// ============================================================================
// Patch
// ============================================================================

/// Applies the console enhancement to a context.
///
/// Idempotent: a context whose console is already patched is left alone.
pub(crate) fn patch(monitor: &Monitor, ctx: &Context) {
    {
        let mut state = ctx.state().lock();
        if state.console_patched {
            return;
        }
        state.console_patched = true;
    }

    let console = ctx.console();
    let (baseline_log, baseline_dir) = console.baseline_hooks();

    console.install_hooks(
        enhanced_log(ctx, baseline_log.clone()),
        enhanced_dir(monitor, ctx, baseline_log, baseline_dir),
    );
}

/// Removes the console enhancement, restoring the stored baseline.
pub(crate) fn unpatch(ctx: &Context) {
    {
        let mut state = ctx.state().lock();
        if !state.console_patched {
            return;
        }
        state.console_patched = false;
    }

    ctx.console().restore_baseline();
}

// ============================================================================
// Enhanced Entry Points
// ============================================================================

/// Builds the enhanced `log` body over the baseline entry point.
fn enhanced_log(ctx: &Context, baseline: LogHook) -> LogHook {
    let ctx_weak = ctx.downgrade();

    Arc::new(move |console, args| {
        for (index, arg) in args.iter().enumerate() {
            if let ConsoleArg::Event(event) = arg {
                let labeled = args.get(index + 1).is_some_and(ConsoleArg::is_text);
                if index == args.len() - 1 || !labeled {
                    baseline(
                        console,
                        &[arg.clone(), ConsoleArg::text("(MessageEvent details:)")],
                    );
                    baseline(
                        console,
                        &[
                            ConsoleArg::text("Data:"),
                            ConsoleArg::Json(event.data().snapshot()),
                        ],
                    );
                    baseline(
                        console,
                        &[ConsoleArg::text("Origin:"), ConsoleArg::text(event.origin())],
                    );
                    let source = match (event.source(), ctx_weak.upgrade()) {
                        (Some(src), Some(inner)) => {
                            path::window_path(&Context::from_inner(inner), src)
                        }
                        _ => "unknown".to_string(),
                    };
                    baseline(
                        console,
                        &[ConsoleArg::text("Source:"), ConsoleArg::text(source)],
                    );
                    continue;
                }
            }

            // Pass-through arguments go to the baseline one per call.
            baseline(console, std::slice::from_ref(arg));
        }
    })
}

/// Builds the enhanced `dir` body over the baseline entry points.
fn enhanced_dir(
    monitor: &Monitor,
    ctx: &Context,
    baseline_log: LogHook,
    baseline_dir: DirHook,
) -> DirHook {
    let monitor_weak = monitor.downgrade();
    let ctx_weak = ctx.downgrade();

    Arc::new(move |console, arg| {
        if let ConsoleArg::Func(handler) = arg
            && let Some(monitor_inner) = monitor_weak.upgrade()
            && let Some(ctx_inner) = ctx_weak.upgrade()
        {
            let monitor = Monitor::from_inner(monitor_inner);
            let ctx = Context::from_inner(ctx_inner);
            let unwrapped = monitor.registry().unwrap_all(ctx.environment(), handler);

            if !unwrapped.same_as(handler) {
                baseline_log(console, &[ConsoleArg::text("Unwrapped event listener:")]);
                baseline_dir(console, &ConsoleArg::Func(unwrapped));
                baseline_log(console, &[ConsoleArg::text("Original wrapped function:")]);
            }
        }

        baseline_dir(console, arg);
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Handler, MessageEvent, Payload, PropValue};
    use crate::protocol::Control;
    use crate::protocol::envelope;

    use serde_json::json;

    fn setup() -> (Monitor, Context) {
        // Enhancement off initially so tests control the patch cycle.
        let monitor = Monitor::builder().console_enhancement(false).build();
        let page = monitor.page("https://app.example").expect("page");
        (monitor, page)
    }

    fn deliver(ctx: &Context, control: &Control) {
        let payload = envelope::control_envelope(control).expect("envelope");
        let event = MessageEvent::new(payload, ctx.origin(), Some(ctx.clone()));
        ctx.raw_post(event, "*");
    }

    fn sentry_wrap(original: &Handler) -> Handler {
        let wrapper = Handler::stub("function sentryWrapped(e) {}");
        wrapper.set_flag("__sentry_wrapped__");
        wrapper.set_prop("__sentry_original__", PropValue::Func(original.clone()));
        wrapper
    }

    #[test]
    fn test_event_arg_expands() {
        let (monitor, page) = setup();
        patch(&monitor, &page);
        let console = page.console();
        console.take_lines();

        let event = MessageEvent::new(
            Payload::json(json!({"x": 1})),
            "https://other.example",
            None,
        );
        console.log(&[crate::page::ConsoleArg::Event(event)]);

        let lines = console.lines().join("\n");
        assert!(lines.contains("(MessageEvent details:)"));
        assert!(lines.contains(r#"Data: {"x":1}"#));
        assert!(lines.contains("Origin: https://other.example"));
        assert!(lines.contains("Source: unknown"));
    }

    #[test]
    fn test_labeled_event_not_expanded() {
        let (monitor, page) = setup();
        patch(&monitor, &page);
        let console = page.console();
        console.take_lines();

        let event = MessageEvent::new(Payload::json(json!(1)), "https://other.example", None);
        console.log(&[
            crate::page::ConsoleArg::Event(event),
            crate::page::ConsoleArg::text("handled upstream"),
        ]);

        let lines = console.lines().join("\n");
        assert!(!lines.contains("(MessageEvent details:)"));
    }

    #[test]
    fn test_dir_prints_unwrapped_original() {
        let (monitor, page) = setup();
        page.environment().define("Sentry");
        patch(&monitor, &page);
        let console = page.console();
        console.take_lines();

        let original = Handler::stub("function onMessage(e) { handle(e); }");
        console.dir(&crate::page::ConsoleArg::Func(sentry_wrap(&original)));

        let lines = console.lines().join("\n");
        assert!(lines.contains("Unwrapped event listener:"));
        assert!(lines.contains("function onMessage(e)"));
        assert!(lines.contains("Original wrapped function:"));
    }

    #[test]
    fn test_dir_plain_function_untouched() {
        let (monitor, page) = setup();
        patch(&monitor, &page);
        let console = page.console();
        console.take_lines();

        console.dir(&crate::page::ConsoleArg::Func(Handler::stub(
            "function plain(e) {}",
        )));

        let lines = console.lines().join("\n");
        assert!(!lines.contains("Unwrapped event listener:"));
        assert!(lines.contains("function plain(e)"));
    }

    #[test]
    fn test_disable_restores_exact_baseline() {
        let (monitor, page) = setup();
        let console = page.console();
        let baseline = console.current_log();

        patch(&monitor, &page);
        assert!(!std::sync::Arc::ptr_eq(&console.current_log(), &baseline));

        unpatch(&page);
        assert!(std::sync::Arc::ptr_eq(&console.current_log(), &baseline));
    }

    #[test]
    fn test_reenable_does_not_stack() {
        let (monitor, page) = setup();
        let console = page.console();

        deliver(&page, &Control::UpdateConsoleEnhancement { enabled: true });
        deliver(&page, &Control::UpdateConsoleEnhancement { enabled: false });
        deliver(&page, &Control::UpdateConsoleEnhancement { enabled: true });

        console.take_lines();
        let event = MessageEvent::new(Payload::json(json!(1)), "https://other.example", None);
        console.log(&[crate::page::ConsoleArg::Event(event)]);

        // A stacked patch would expand the event twice.
        let details = console
            .lines()
            .iter()
            .filter(|l| l.contains("(MessageEvent details:)"))
            .count();
        assert_eq!(details, 1);
        let _ = monitor;
    }

    #[test]
    fn test_patch_idempotent() {
        let (monitor, page) = setup();
        patch(&monitor, &page);
        let patched = page.console().current_log();

        patch(&monitor, &page);
        assert!(std::sync::Arc::ptr_eq(&page.console().current_log(), &patched));
    }
}
