//! Lexical legal signals shared by the router and the rewriter.
//!
//! - article references: `Điều 139`, `khoản 2`, `Chương X`
//! - instrument names and codes: `Bộ luật`, `Nghị định`, `145/2020/NĐ-CP`
//! - protected keywords: phrases that must survive query rewriting verbatim
//! - numbers: ages, durations, amounts and article numbers

use std::sync::LazyLock;

use regex::Regex;

/// Legal phrases a rewrite must never drop or paraphrase.
pub const PROTECTED_KEYWORDS: &[&str] = &[
    "sáp nhập",
    "tái cơ cấu",
    "mang thai",
    "thai sản",
    "nghỉ hưu",
    "sa thải",
    "độc hại",
    "BHTN",
    "BHXH",
    "trợ cấp",
    "hợp đồng",
];

static ARTICLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(điều|khoản|điểm|chương|mục)\s+(\d+[a-zđ]?|(?-i:[IVXLC]+))\b")
        .expect("Invalid regex")
});

static INSTRUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(bộ luật|luật|nghị định|thông tư|nghị quyết|quyết định|bhxh|bhyt|bhtn|blld|bllđ)\b|\b\d+/\d{4}/[A-ZĐ][A-ZĐ\-]*\d*\b",
    )
    .expect("Invalid regex")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,/]\d+)*").expect("Invalid regex"));

/// Article, clause or chapter references as written, e.g. `Điều 139`.
pub fn article_references(text: &str) -> Vec<String> {
    ARTICLE_REF
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn has_article_reference(text: &str) -> bool {
    ARTICLE_REF.is_match(text)
}

pub fn has_instrument(text: &str) -> bool {
    INSTRUMENT.is_match(text)
}

/// Protected keywords present in the text, in canonical spelling.
pub fn protected_keywords(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    PROTECTED_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| lower.contains(&kw.to_lowercase()))
        .collect()
}

/// Numbers as written (`06`, `139`, `45/2019`, `1.5`).
pub fn numbers(text: &str) -> Vec<&str> {
    NUMBER.find_iter(text).map(|m| m.as_str()).collect()
}

/// Article references followed by protected keywords, deduplicated.
///
/// These are the terms a follow-up question inherits from earlier turns.
pub fn anchors(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let candidates = article_references(text)
        .into_iter()
        .chain(protected_keywords(text).into_iter().map(String::from));
    for anchor in candidates {
        if !out.iter().any(|a| a.to_lowercase() == anchor.to_lowercase()) {
            out.push(anchor);
        }
    }
    out
}

/// Strength of the legal signal in `[0, 1]`.
///
/// Article reference 0.5, instrument 0.3, each protected keyword 0.2.
pub fn legal_signal(text: &str) -> f32 {
    let mut signal: f32 = 0.0;
    if has_article_reference(text) {
        signal += 0.5;
    }
    if has_instrument(text) {
        signal += 0.3;
    }
    signal += 0.2 * protected_keywords(text).len() as f32;
    signal.min(1.0)
}
