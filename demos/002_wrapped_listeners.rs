//! Wrapped-listener unwrapping and rerouting.
//!
//! Demonstrates:
//! - A Sentry-style wrapper around a message listener
//! - Fingerprints for the wrapped/unwrapped pair
//! - Proxy substitution (rerouting) with narration enabled
//!
//! Usage:
//!   cargo run --example 002_wrapped_listeners

mod common;

// ============================================================================
// Imports
// ============================================================================

use postmessage_monitor::{Handler, Monitor, Payload, PropValue, Result};
use serde_json::json;

// ============================================================================
// Main
// ============================================================================

fn main() {
    common::init_logging(common::debug_flag());

    if let Err(e) = run() {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    println!("=== 002: Wrapped Listeners ===\n");

    let monitor = Monitor::builder().logging(true).build();
    let page = monitor.page("https://app.example")?;

    // The page loaded Sentry.
    page.environment().define("Sentry");

    // ========================================================================
    // Sentry wraps the page's listener before registration
    // ========================================================================

    let original = Handler::new(
        "function onMessage(e) { if (e.data.action) dispatch(e.data); }",
        |event| {
            println!("[page] original handler ran: {:?}", event.data());
        },
    );

    let run_original = original.clone();
    let wrapped = Handler::new(
        "function sentryWrapped(e) { try { return fn(e); } catch (err) { report(err); } }",
        move |event| run_original.invoke(event),
    );
    wrapped.set_flag("__sentry_wrapped__");
    wrapped.set_prop("__sentry_original__", PropValue::Func(original));

    page.add_message_listener(wrapped);

    // ========================================================================
    // The tracked listener carries both fingerprints
    // ========================================================================

    let report = monitor.state();
    for frame in &report.frames {
        for listener in &frame.listeners {
            println!("[Tracked] wrapper:   {}", listener.wrapped.code);
            println!("          original:  {}", listener.unwrapped.code);
            println!("          kind:      {}", listener.wrapper_kind);
            println!("          unwrapped: {}", listener.is_unwrapped);
        }
    }

    // ========================================================================
    // Rerouting narrates the event before the original runs
    // ========================================================================

    page.post_message(Payload::json(json!({"action": "ping"})), "*");
    common::dump_console("page", page.console().take_lines());

    Ok(())
}
