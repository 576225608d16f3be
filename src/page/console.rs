//! The page console.
//!
//! Models the logging surface the console-enhancement feature patches. The
//! `log` and `dir` bodies live in swappable slots so enhancement can
//! replace them and later restore the exact pre-patch entry points - the
//! first patch stores the baseline once, and every disable restores those
//! same references.
//!
//! Output is collected as indented lines (groups indent by two spaces) and
//! mirrored to `tracing` at trace level.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use super::handler::Handler;
use super::payload::MessageEvent;

// ============================================================================
// Types
// ============================================================================

/// Replaceable body of the console's `log` entry point.
pub type LogHook = Arc<dyn Fn(&Console, &[ConsoleArg]) + Send + Sync>;

/// Replaceable body of the console's `dir` entry point.
pub type DirHook = Arc<dyn Fn(&Console, &ConsoleArg) + Send + Sync>;

// ============================================================================
// ConsoleArg
// ============================================================================

/// A value passed to a console entry point.
#[derive(Clone)]
pub enum ConsoleArg {
    /// Plain text.
    Text(String),
    /// Structured data.
    Json(Value),
    /// A message event.
    Event(MessageEvent),
    /// A callable.
    Func(Handler),
}

impl ConsoleArg {
    /// Creates a text argument.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Renders the argument for line output.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Event(event) => format!("MessageEvent {{ origin: {} }}", event.origin()),
            Self::Func(handler) => handler.source().to_string(),
        }
    }

    /// Returns `true` for a plain-text argument.
    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl fmt::Debug for ConsoleArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsoleArg({})", self.render())
    }
}

// ============================================================================
// Console
// ============================================================================

/// Internal shared state for a console.
struct ConsoleInner {
    /// Current `log` body.
    log_slot: Mutex<LogHook>,
    /// Current `dir` body.
    dir_slot: Mutex<DirHook>,
    /// Pre-patch entry points, stored once on first patch.
    baseline: Mutex<Option<(LogHook, DirHook)>>,
    /// Current group nesting depth.
    depth: AtomicUsize,
    /// Collected output lines.
    lines: Mutex<Vec<String>>,
}

/// The logging surface of one page context.
///
/// Cheap to clone; clones share output and entry points.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("lines", &self.inner.lines.lock().len())
            .field("depth", &self.inner.depth.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Creates a console with the default entry points.
    #[must_use]
    pub fn new() -> Self {
        let log: LogHook = Arc::new(|console: &Console, args: &[ConsoleArg]| {
            let rendered: Vec<String> = args.iter().map(ConsoleArg::render).collect();
            console.write_line(&rendered.join(" "));
        });
        let dir: DirHook = Arc::new(|console: &Console, arg: &ConsoleArg| {
            console.write_line(&arg.render());
        });

        Self {
            inner: Arc::new(ConsoleInner {
                log_slot: Mutex::new(log),
                dir_slot: Mutex::new(dir),
                baseline: Mutex::new(None),
                depth: AtomicUsize::new(0),
                lines: Mutex::new(Vec::new()),
            }),
        }
    }
}

// ============================================================================
// Console - Entry Points
// ============================================================================

impl Console {
    /// Logs a sequence of arguments.
    pub fn log(&self, args: &[ConsoleArg]) {
        // Clone the hook out of the slot so the body runs lock-free and a
        // patched body can call back into this console.
        let hook = self.inner.log_slot.lock().clone();
        hook(self, args);
    }

    /// Inspects a single value.
    pub fn dir(&self, arg: &ConsoleArg) {
        let hook = self.inner.dir_slot.lock().clone();
        hook(self, arg);
    }

    /// Opens a group: prints the title and indents subsequent lines.
    pub fn group(&self, title: &str) {
        self.write_line(title);
        self.inner.depth.fetch_add(1, Ordering::SeqCst);
    }

    /// Closes the innermost group.
    pub fn group_end(&self) {
        let _ = self
            .inner
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
    }

    /// Reports an error line.
    pub fn error(&self, message: &str) {
        self.write_line(message);
    }

    /// Writes one indented output line.
    pub fn write_line(&self, text: &str) {
        let depth = self.inner.depth.load(Ordering::SeqCst);
        let line = format!("{}{}", "  ".repeat(depth), text);
        trace!(target: "postmessage_monitor::console", "{line}");
        self.inner.lines.lock().push(line);
    }
}

// ============================================================================
// Console - Output Access
// ============================================================================

impl Console {
    /// Returns a copy of all collected lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.inner.lines.lock().clone()
    }

    /// Drains and returns all collected lines.
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.lines.lock())
    }
}

// ============================================================================
// Console - Patching Support
// ============================================================================

impl Console {
    /// Stores the current entry points as the baseline, once.
    ///
    /// Returns clones of the baseline hooks. Patching twice keeps the
    /// original baseline so re-enabling never wraps an already-wrapped
    /// entry point.
    pub(crate) fn baseline_hooks(&self) -> (LogHook, DirHook) {
        let mut baseline = self.inner.baseline.lock();
        let (log, dir) = baseline.get_or_insert_with(|| {
            (
                self.inner.log_slot.lock().clone(),
                self.inner.dir_slot.lock().clone(),
            )
        });
        (log.clone(), dir.clone())
    }

    /// Installs replacement entry points.
    pub(crate) fn install_hooks(&self, log: LogHook, dir: DirHook) {
        *self.inner.log_slot.lock() = log;
        *self.inner.dir_slot.lock() = dir;
    }

    /// Restores the stored baseline entry points.
    ///
    /// Returns `false` when no patch was ever applied.
    pub(crate) fn restore_baseline(&self) -> bool {
        let baseline = self.inner.baseline.lock();
        match &*baseline {
            Some((log, dir)) => {
                *self.inner.log_slot.lock() = log.clone();
                *self.inner.dir_slot.lock() = dir.clone();
                true
            }
            None => false,
        }
    }

    /// Returns the current `log` entry point.
    pub(crate) fn current_log(&self) -> LogHook {
        self.inner.log_slot.lock().clone()
    }

    /// Returns the current `dir` entry point.
    pub(crate) fn current_dir(&self) -> DirHook {
        self.inner.dir_slot.lock().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Payload;

    use serde_json::json;

    #[test]
    fn test_log_renders_args() {
        let console = Console::new();
        console.log(&[ConsoleArg::text("Data:"), ConsoleArg::Json(json!({"x": 1}))]);

        let lines = console.lines();
        assert_eq!(lines, vec![r#"Data: {"x":1}"#]);
    }

    #[test]
    fn test_group_indents() {
        let console = Console::new();
        console.group("outer");
        console.log(&[ConsoleArg::text("inside")]);
        console.group_end();
        console.log(&[ConsoleArg::text("after")]);

        assert_eq!(console.lines(), vec!["outer", "  inside", "after"]);
    }

    #[test]
    fn test_group_end_saturates() {
        let console = Console::new();
        console.group_end();
        console.log(&[ConsoleArg::text("still fine")]);
        assert_eq!(console.lines(), vec!["still fine"]);
    }

    #[test]
    fn test_take_lines_drains() {
        let console = Console::new();
        console.log(&[ConsoleArg::text("one")]);
        assert_eq!(console.take_lines(), vec!["one"]);
        assert!(console.lines().is_empty());
    }

    #[test]
    fn test_baseline_stored_once() {
        let console = Console::new();
        let (first_log, _) = console.baseline_hooks();

        let replacement: LogHook = Arc::new(|c: &Console, _args: &[ConsoleArg]| {
            c.write_line("patched");
        });
        console.install_hooks(replacement, console.current_dir());

        // A second baseline request must return the original, not the patch.
        let (second_log, _) = console.baseline_hooks();
        assert!(Arc::ptr_eq(&first_log, &second_log));
    }

    #[test]
    fn test_restore_baseline_identity() {
        let console = Console::new();
        let (baseline_log, baseline_dir) = console.baseline_hooks();

        let replacement: LogHook = Arc::new(|_c: &Console, _args: &[ConsoleArg]| {});
        console.install_hooks(replacement, baseline_dir.clone());
        assert!(!Arc::ptr_eq(&console.current_log(), &baseline_log));

        assert!(console.restore_baseline());
        assert!(Arc::ptr_eq(&console.current_log(), &baseline_log));
    }

    #[test]
    fn test_restore_without_patch() {
        let console = Console::new();
        assert!(!console.restore_baseline());
    }

    #[test]
    fn test_event_arg_render() {
        let event = MessageEvent::new(Payload::json(json!(1)), "https://a.example", None);
        let arg = ConsoleArg::Event(event);
        assert!(arg.render().contains("https://a.example"));
        assert!(!arg.is_text());
    }
}
