//! Preprocessing for scraped or pasted regulation text.
//!
//! Each pass is a function `&str -> String`; [`preprocess`] runs them in order.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline: strip tags, decode entities, normalize whitespace.
pub fn preprocess(raw: &str) -> String {
    let mut result = strip_html_tags(raw);
    result = decode_entities(&result);
    result = normalize_whitespace(&result);
    result
}

/// Remove HTML tags, keeping their text content.
pub fn strip_html_tags(text: &str) -> String {
    static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("valid regex")
    });
    static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)<(br\s*/?|/p|/div|/li|/h[1-6]|/tr)>").expect("valid regex")
    });
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

    let without_blocks = BLOCK_RE.replace_all(text, "");
    let with_breaks = BREAK_RE.replace_all(&without_blocks, "\n");
    TAG_RE.replace_all(&with_breaks, "").to_string()
}

/// Decode the handful of entities that survive tag stripping.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse horizontal whitespace, cap blank-line runs at one, and trim.
pub fn normalize_whitespace(text: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));
    static BLANKS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let lines: Vec<String> = text
        .lines()
        .map(|line| SPACES_RE.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    BLANKS_RE.replace_all(&joined, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_but_keeps_text() {
        assert_eq!(
            strip_html_tags("<p>The <b>fee</b> is $10</p>"),
            "The fee is $10\n"
        );
    }

    #[test]
    fn drops_script_and_style_bodies() {
        let html = "<style>p{color:red}</style><p>Rule</p><script>alert(1)</script>";
        assert_eq!(strip_html_tags(html).trim(), "Rule");
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(
            normalize_whitespace("  a   b\t c \n\n\n\n d  "),
            "a b c\n\nd"
        );
    }

    #[test]
    fn full_pipeline() {
        let raw = "<html><body><h1>Regulation&nbsp;12</h1>\n<p>Fees &amp; charges</p></body></html>";
        assert_eq!(preprocess(raw), "Regulation 12\n\nFees & charges");
    }
}
