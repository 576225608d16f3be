//! Console enhancement lifecycle.
//!
//! Demonstrates:
//! - Message-event expansion in console.log
//! - Unwrapped originals in console.dir
//! - Disable/re-enable restoring the exact baseline
//!
//! Usage:
//!   cargo run --example 003_console_enhancement

mod common;

// ============================================================================
// Imports
// ============================================================================

use postmessage_monitor::{
    ConsoleArg, Handler, MessageEvent, Monitor, Payload, PropValue, Result,
};
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
    println!("=== 003: Console Enhancement ===\n");

    let monitor = Monitor::builder().build();
    let page = monitor.page("https://app.example")?;
    page.environment().define("Sentry");
    let console = page.console();

    // ========================================================================
    // Enhanced console.log expands bare message events
    // ========================================================================

    let event = MessageEvent::new(
        Payload::json(json!({"token": "abc", "nested": {"deep": true}})),
        "https://idp.example",
        None,
    );
    console.log(&[ConsoleArg::Event(event)]);

    // ========================================================================
    // Enhanced console.dir reveals a wrapper's original
    // ========================================================================

    let original = Handler::stub("function onMessage(e) { validate(e.origin); }");
    let wrapper = Handler::stub("function sentryWrapped(e) {}");
    wrapper.set_flag("__sentry_wrapped__");
    wrapper.set_prop("__sentry_original__", PropValue::Func(original));
    console.dir(&ConsoleArg::Func(wrapper));

    common::dump_console("enhanced", console.take_lines());

    // ========================================================================
    // Disabling restores the plain entry points
    // ========================================================================

    monitor.set_console_enhancement(false);

    let event = MessageEvent::new(Payload::json(json!({"x": 2})), "https://idp.example", None);
    console.log(&[ConsoleArg::Event(event)]);
    common::dump_console("plain", console.take_lines());

    monitor.set_console_enhancement(true);
    let event = MessageEvent::new(Payload::json(json!({"x": 3})), "https://idp.example", None);
    console.log(&[ConsoleArg::Event(event)]);
    common::dump_console("re-enhanced (single expansion)", console.take_lines());

    Ok(())
}
