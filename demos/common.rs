//! Shared utilities for demos.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Initialize tracing output for a demo.
pub fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Returns true when `--debug` was passed.
pub fn debug_flag() -> bool {
    std::env::args().any(|arg| arg == "--debug")
}

/// Dump a console's collected lines with a banner.
pub fn dump_console(label: &str, lines: Vec<String>) {
    println!("\n--- console: {label} ---");
    for line in lines {
        println!("{line}");
    }
    println!("--- end ---\n");
}
