//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning or degraded answer | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |

use owo_colors::OwoColorize;

use laodong_core::{Citation, IntentCategory};

use super::color::ColorMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    Hint,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
        }
    }
}

/// Formatting for every line the CLI prints.
///
/// # Example
///
/// ```ignore
/// let style = Style::new(ColorMode::Never);
/// assert_eq!(style.message(MessageType::Ok, "Done"), "[ok] Done");
/// ```
#[derive(Debug, Clone)]
pub struct Style {
    color_mode: ColorMode,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    /// A message with its type prefix.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if !self.colors_enabled() {
            return format!("{} {}", prefix, text);
        }
        let colored = match msg_type {
            MessageType::Ok => prefix.green().to_string(),
            MessageType::Err => prefix.red().to_string(),
            MessageType::Warn => prefix.yellow().to_string(),
            MessageType::Info => prefix.blue().to_string(),
            MessageType::Hint => prefix.cyan().to_string(),
        };
        format!("{} {}", colored, text)
    }

    /// Section header, bold when colors are on.
    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// An error line followed by optional cause and hint lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);

        if let Some(cause) = cause {
            output.push_str(&format!("\n      Cause: {}", cause));
        }
        if let Some(hint) = hint {
            output.push_str(&format!("\n      Hint: {}", hint));
        }

        output
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.colors_enabled() {
            format!("{}: {}", key.dimmed(), value)
        } else {
            format!("{}: {}", key, value)
        }
    }

    /// Relevance score: green from 0.8, yellow from 0.5, red below.
    pub fn score(&self, value: f32) -> String {
        let formatted = format!("{:.2}", value);
        if !self.colors_enabled() {
            return formatted;
        }
        if value >= 0.8 {
            formatted.green().to_string()
        } else if value >= 0.5 {
            formatted.yellow().to_string()
        } else {
            formatted.red().to_string()
        }
    }

    /// `LEGAL` / `CHAT` badge.
    pub fn category(&self, category: IntentCategory) -> String {
        let label = category.to_string();
        if !self.colors_enabled() {
            return label;
        }
        match category {
            IntentCategory::Legal => label.magenta().to_string(),
            IntentCategory::Chat => label.cyan().to_string(),
        }
    }

    /// Short provision reference, e.g. `Điều 139 (45/2019/QH14)`.
    pub fn citation(&self, citation: &Citation) -> String {
        let reference = format!("Điều {}", citation.article);
        let source = format!("({})", citation.source_code);
        if self.colors_enabled() {
            format!("{} {}", reference.bold(), source.dimmed())
        } else {
            format!("{} {}", reference, source)
        }
    }

    /// Prompt shown before each line of input in the REPL.
    pub fn prompt(&self) -> String {
        if self.colors_enabled() {
            format!("{} ", "bạn>".green().bold())
        } else {
            "bạn> ".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laodong_core::ChunkId;

    fn plain() -> Style {
        Style::new(ColorMode::Never)
    }

    #[test]
    fn test_message_prefixes() {
        assert_eq!(plain().message(MessageType::Ok, "Done"), "[ok] Done");
        assert_eq!(plain().message(MessageType::Err, "Failed"), "[err] Failed");
        assert_eq!(MessageType::Hint.prefix(), "[hint]");
    }

    #[test]
    fn test_error_with_context() {
        let output = plain().error_with_context(
            "Failed to start",
            Some("corpus.path is not set"),
            Some("Pass --corpus or set LAODONG_CORPUS"),
        );
        assert!(output.starts_with("[err] Failed to start"));
        assert!(output.contains("Cause: corpus.path is not set"));
        assert!(output.contains("Hint: Pass --corpus"));
    }

    #[test]
    fn test_error_without_context_is_one_line() {
        assert_eq!(plain().error_with_context("boom", None, None), "[err] boom");
    }

    #[test]
    fn test_citation_and_category() {
        let citation = Citation {
            provision_id: "blld-2019-139".to_string(),
            source_code: "45/2019/QH14".to_string(),
            article: "139".to_string(),
            article_title: Some("Nghỉ thai sản".to_string()),
            chapter: None,
            chunk_id: ChunkId::new("139-1"),
            score: 0.91,
        };
        assert_eq!(plain().citation(&citation), "Điều 139 (45/2019/QH14)");
        assert_eq!(plain().category(IntentCategory::Legal), "LEGAL");
        assert_eq!(plain().score(0.914), "0.91");
    }
}
