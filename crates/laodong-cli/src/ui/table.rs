//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `laodong ask`, `laodong chat` | `render_citations_table()` |
//! | `laodong health` | `render_health_table()` |
//! | `/history` in the REPL | `render_history_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use laodong_core::{Citation, ConversationTurn, HealthReport};

use super::format::{format_latency, format_relative_time, one_line, truncate_str};

/// Widest text column, whatever the terminal width.
const MAX_TEXT_COLUMN: usize = 72;

fn text_column(terminal_width: usize, used: usize) -> usize {
    terminal_width.saturating_sub(used).clamp(20, MAX_TEXT_COLUMN)
}

/// Citations of one answer.
///
/// ```text
/// #   ARTICLE   TITLE                 SOURCE         SCORE
/// 1   139       Nghỉ thai sản         45/2019/QH14    0.91
/// 2   141       Trợ cấp thai sản      45/2019/QH14    0.64
/// ```
pub fn render_citations_table(citations: &[Citation], terminal_width: usize) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("ARTICLE"),
        Cell::new("TITLE"),
        Cell::new("SOURCE"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(3)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(20)),
        ColumnConstraint::LowerBoundary(Width::Fixed(14)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
    ]);

    let title_width = text_column(terminal_width, 40);
    for (i, citation) in citations.iter().enumerate() {
        let title = citation
            .article_title
            .as_deref()
            .map(|t| truncate_str(t, title_width))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&citation.article),
            Cell::new(title),
            Cell::new(&citation.source_code),
            Cell::new(format!("{:.2}", citation.score)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

/// One row per capability backend.
///
/// ```text
/// CAPABILITY   BACKEND                  STATUS   LATENCY   ERROR
/// embed        bge-m3                   ok         12 ms   -
/// generate     gpt-4o-mini              down      3.0 s    generate timed out ...
/// ```
pub fn render_health_table(report: &HealthReport, terminal_width: usize) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("CAPABILITY"),
        Cell::new("BACKEND"),
        Cell::new("STATUS"),
        Cell::new("LATENCY").set_alignment(CellAlignment::Right),
        Cell::new("ERROR"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(10)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
    ]);

    let error_width = text_column(terminal_width, 50);
    for entry in &report.capabilities {
        let status = if entry.healthy { "ok" } else { "down" };
        let error = entry
            .error
            .as_deref()
            .map(|e| truncate_str(&one_line(e), error_width))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&entry.capability),
            Cell::new(truncate_str(&entry.backend, 24)),
            Cell::new(status),
            Cell::new(format_latency(entry.latency_ms)).set_alignment(CellAlignment::Right),
            Cell::new(error),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Article numbers an answer cited, e.g. `139, 46`.
fn cited_articles(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return "-".to_string();
    }
    let articles: Vec<&str> = citations.iter().map(|c| c.article.as_str()).collect();
    truncate_str(&articles.join(", "), 16)
}

/// Committed turns of a session, oldest first.
pub fn render_history_table(turns: &[ConversationTurn], terminal_width: usize) -> String {
    if turns.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("WHEN"),
        Cell::new("ROLE"),
        Cell::new("TOKENS").set_alignment(CellAlignment::Right),
        Cell::new("CITED"),
        Cell::new("TEXT"),
    ]);

    let text_width = text_column(terminal_width, 52);
    for turn in turns {
        table.add_row(vec![
            Cell::new(format_relative_time(turn.timestamp)),
            Cell::new(turn.role.label()),
            Cell::new(turn.tokens).set_alignment(CellAlignment::Right),
            Cell::new(cited_articles(&turn.citations)),
            Cell::new(truncate_str(&one_line(&turn.text), text_width)),
        ]);
    }

    table.trim_fmt().to_string()
}
