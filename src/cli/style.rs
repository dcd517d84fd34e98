//! Terminal styling helpers

use owo_colors::OwoColorize;
use std::fmt::Display;

/// Semantic styles for CLI output
pub trait Stylize {
    /// Bold, for names and values the user acts on
    fn emphasis(&self) -> String;

    /// Dimmed, for secondary detail
    fn muted(&self) -> String;

    /// Cyan, for timestamps and durations
    fn accent(&self) -> String;

    /// Yellow, for things that need attention
    fn warning(&self) -> String;
}

impl<T: Display> Stylize for T {
    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    fn warning(&self) -> String {
        self.yellow().to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    "✓".green().to_string()
}

/// Dimmed arrow
pub fn arrow() -> String {
    "→".dimmed().to_string()
}
