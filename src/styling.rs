//! Consolidated styling module for terminal output.
//!
//! This module uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - Semantic style constants for the status glyph categories

use anstyle::{AnsiColor, Color, Style};

// ============================================================================
// Re-exports from anstream (auto-detecting output)
// ============================================================================

/// Auto-detecting print that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::print;

/// Auto-detecting println that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::println;

/// Auto-detecting eprintln that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprintln;

// ============================================================================
// Semantic Style Constants
// ============================================================================

/// Working-tree glyph style (red)
pub const WORKTREE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Stash-count glyph style (yellow)
pub const STASH: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Bugs-file glyph style (cyan)
pub const BUGS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));

/// Branch-status glyph style (magenta)
pub const BRANCH: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta)));

/// Wrap `text` in `style` escape codes when `enabled`, or pass it through untouched.
pub fn paint(text: &str, style: Style, enabled: bool) -> String {
    if enabled {
        format!("{}{}{}", style.render(), text, style.render_reset())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_enabled_wraps_with_escapes() {
        let painted = paint("S M", WORKTREE, true);
        assert!(painted.contains("\x1b["), "should contain ANSI escape codes");
        assert!(painted.contains("S M"));
    }

    #[test]
    fn test_paint_disabled_is_passthrough() {
        assert_eq!(paint("S M", WORKTREE, false), "S M");
    }
}
