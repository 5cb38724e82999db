//! Spinner shown while a turn waits for its first token.
//!
//! The spinner draws on stderr and only on an interactive terminal, so piped
//! output and `--json` stay clean.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress feedback mode based on output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive terminal: animated spinner.
    Interactive,
    /// Piped output or `--json`: nothing.
    Silent,
}

impl ProgressMode {
    pub fn detect(json: bool) -> Self {
        if json || !std::io::stderr().is_terminal() {
            Self::Silent
        } else {
            Self::Interactive
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Braille spinner frames.
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Start a spinner. Hidden unless `mode` is interactive.
    pub fn spinner(message: &str, mode: ProgressMode) -> Self {
        let bar = if mode.is_interactive() {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_chars(SPINNER_CHARS)
                .template("{spinner:.cyan} {msg} ({elapsed})")
            {
                pb.set_style(style);
            }
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };

        Self { bar }
    }

    /// Remove the spinner line. Safe to call more than once.
    pub fn finish_clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_silent() {
        assert_eq!(ProgressMode::detect(true), ProgressMode::Silent);
    }

    #[test]
    fn test_hidden_spinner_finishes() {
        let progress = Progress::spinner("Đang tra cứu...", ProgressMode::Silent);
        progress.finish_clear();
        progress.finish_clear();
    }
}
