//! Basic message monitoring.
//!
//! Demonstrates:
//! - Building a Monitor with a relay channel
//! - Modeling a page with a cross-origin child frame
//! - Observing listener registrations and messages
//! - Querying the aggregated state report
//!
//! Usage:
//!   cargo run --example 001_basic_monitoring
//!   cargo run --example 001_basic_monitoring -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use postmessage_monitor::{Handler, Monitor, Payload, Result, relay};
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
    println!("=== 001: Basic Monitoring ===\n");

    // ========================================================================
    // Build the engine
    // ========================================================================

    let (tx, mut rx) = relay::channel();
    let monitor = Monitor::builder().notices(tx).build();

    let page = monitor.page("https://app.example")?;
    let frame = page.spawn_child("https://widget.example")?;
    println!("[Setup] page + child frame instrumented");

    // ========================================================================
    // Page code registers listeners and talks across the boundary
    // ========================================================================

    frame.add_message_listener(Handler::new(
        "function (e) { widget.render(e.data); }",
        |event| {
            println!("[widget] received: {:?}", event.data());
        },
    ));

    page.post_message_to(&frame, Payload::json(json!({"action": "init", "x": 1})), "*");
    frame.post_message_to(&page, Payload::json(json!({"action": "ready"})), "*");

    // ========================================================================
    // Inspect the telemetry
    // ========================================================================

    println!("\n[Relay] notices:");
    for notice in rx.drain() {
        println!("  {}", serde_json::to_string(&notice)?);
    }

    let report = monitor.state();
    println!("\n[State] {} listener(s) tracked", report.total_listeners);
    for frame_report in &report.frames {
        println!(
            "  {} ({}) - {} listener(s)",
            frame_report.path,
            frame_report.url,
            frame_report.listeners.len()
        );
    }
    println!(
        "[State] {} captured message(s)",
        report.captured_messages.len()
    );

    Ok(())
}
