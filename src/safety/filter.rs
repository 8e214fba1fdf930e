//! Comment stripping and keyword scanning.

use std::sync::LazyLock;

use regex::Regex;

use super::{Classification, Rejection};

/// Keywords that mark a statement as writing data, changing schema or
/// changing privileges.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
];

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*$").expect("valid line comment pattern"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment pattern"));

static FORBIDDEN: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|keyword| {
            let pattern = Regex::new(&format!(r"\b{keyword}\b")).expect("valid keyword pattern");
            (*keyword, pattern)
        })
        .collect()
});

/// Strips comments, trims and uppercases the query.
///
/// Line comments are removed before block comments, so a `/*` that only
/// appears inside a `--` comment never opens a block.
pub fn normalize(raw: &str) -> String {
    let without_line = LINE_COMMENT.replace_all(raw, "");
    let without_block = BLOCK_COMMENT.replace_all(&without_line, "");
    without_block.trim().to_uppercase()
}

/// Classifies a raw query string.
pub fn classify(raw: &str) -> Classification {
    let normalized = normalize(raw);

    if normalized.is_empty() {
        return Classification::Rejected(Rejection::Empty);
    }

    if !(normalized.starts_with("SELECT") || normalized.starts_with("WITH")) {
        let leading = normalized
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .next()
            .unwrap_or_default()
            .to_string();
        return Classification::Rejected(Rejection::LeadingKeyword(leading));
    }

    for (keyword, pattern) in FORBIDDEN.iter() {
        if pattern.is_match(&normalized) {
            return Classification::Rejected(Rejection::ForbiddenKeyword(keyword));
        }
    }

    Classification::ReadOnly
}

/// Returns true if the query passes the read-only filter.
pub fn is_read_only(raw: &str) -> bool {
    classify(raw).is_read_only()
}
