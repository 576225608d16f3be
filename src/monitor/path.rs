//! Structural path resolution for contexts.
//!
//! Produces the human-readable paths shown in telemetry: an absolute path
//! from the top-level context (`top.frames[0].frames[2]`) and a relative
//! path as seen from a viewing context (`self`, `parent`, `frames[1]`).
//! Cross-origin failures resolve to sentinels instead of errors -
//! incomplete telemetry beats a thrown exception inside a hook.

// ============================================================================
// Imports
// ============================================================================

use crate::page::Context;

// ============================================================================
// Sentinels
// ============================================================================

/// Relative path of a context that cannot be located from the viewer.
pub const UNKNOWN_WINDOW: &str = "unknown-window";

/// Relative path when cross-origin restrictions deny the walk entirely.
pub const ACCESS_DENIED: &str = "access-denied";

/// Absolute path when the chain to the top context cannot be walked.
pub const UNKNOWN_FRAME: &str = "unknown-frame";

// ============================================================================
// Absolute Paths
// ============================================================================

/// Resolves the absolute path of a context from its top-level ancestor.
///
/// Walks the parent chain, locating each level's index in its parent's
/// child collection, and renders `top.frames[i]…`. An origin-isolated
/// ancestor denies the walk and yields [`UNKNOWN_FRAME`].
#[must_use]
pub fn frame_path(ctx: &Context) -> String {
    if ctx.is_top() {
        return "top".to_string();
    }

    let mut suffix = String::new();
    let mut current = ctx.clone();

    while let Some(parent) = current.parent() {
        let siblings = match parent.children_for(ctx) {
            Ok(children) => children,
            Err(_) => return UNKNOWN_FRAME.to_string(),
        };

        if let Some(index) = siblings.iter().position(|c| c.same_as(&current)) {
            suffix = format!(".frames[{index}]{suffix}");
        }
        current = parent;
    }

    format!("top{suffix}")
}

// ============================================================================
// Relative Paths
// ============================================================================

/// Resolves the path of `target` as seen from `viewer`.
///
/// Checks `self`, `top`, and `parent`, then searches the viewer's child
/// frames and their child frames (isolated subframes are skipped, not
/// fatal). A target outside the viewer's frame tree resolves to
/// [`ACCESS_DENIED`] when its origin differs from the viewer's, otherwise
/// to [`UNKNOWN_WINDOW`].
#[must_use]
pub fn window_path(viewer: &Context, target: &Context) -> String {
    if target.same_as(viewer) {
        return "self".to_string();
    }
    if target.same_as(&viewer.top()) {
        return "top".to_string();
    }
    if viewer.parent().is_some_and(|parent| parent.same_as(target)) {
        return "parent".to_string();
    }

    let frames = viewer.children();
    for (i, frame) in frames.iter().enumerate() {
        if frame.same_as(target) {
            return format!("frames[{i}]");
        }
    }

    for (i, frame) in frames.iter().enumerate() {
        let Ok(subframes) = frame.children_for(viewer) else {
            continue;
        };
        for (j, subframe) in subframes.iter().enumerate() {
            if subframe.same_as(target) {
                return format!("frames[{i}].frames[{j}]");
            }
        }
    }

    if !target.top().same_as(&viewer.top()) && target.origin() != viewer.origin() {
        return ACCESS_DENIED.to_string();
    }

    UNKNOWN_WINDOW.to_string()
}

// ============================================================================
// Tests
// ============================================================================
