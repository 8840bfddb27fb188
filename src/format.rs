//! Response formatting.
//!
//! The agent's answers carry lightweight markup markers: `#` headings,
//! `**` emphasis, `-`/`1.` list items, and bracketed chapter references
//! like `**[Chapter XXXI]**`. This module normalizes that text for display
//! so every renderer downstream sees well-formed markdown. It is a pure
//! presentation layer; nothing here touches the decision logic.

use std::sync::OnceLock;

use regex::Regex;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})([^#\s])").expect("valid heading regex"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"))
}

/// Normalize the agent's raw answer into clean display markdown:
/// a space after heading hashes, at most one blank line between blocks,
/// no trailing whitespace.
pub fn render_markdown(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");

    let text = heading_re().replace_all(&text, "$1 $2");
    let text = blank_lines_re().replace_all(&text, "\n\n");

    let cleaned: Vec<&str> = text.lines().map(str::trim_end).collect();
    cleaned.join("\n").trim().to_string()
}

/// Shorten a string for log output, preserving char boundaries.
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_hashes_get_a_space() {
        assert_eq!(render_markdown("###Weather"), "### Weather");
        assert_eq!(render_markdown("####Sub"), "#### Sub");
        // Already well-formed headings are untouched
        assert_eq!(render_markdown("### Weather"), "### Weather");
    }

    #[test]
    fn excess_blank_lines_collapse() {
        let raw = "intro\n\n\n\n### Section\n\n\nbody";
        assert_eq!(render_markdown(raw), "intro\n\n### Section\n\nbody");
    }

    #[test]
    fn trailing_whitespace_is_stripped() {
        let raw = "line one   \nline two\t\n";
        assert_eq!(render_markdown(raw), "line one\nline two");
    }

    #[test]
    fn emphasis_and_references_pass_through() {
        let raw = "**[Chapter XXXI - Pompeii]**\n- a list item\n1. numbered";
        assert_eq!(render_markdown(raw), raw);
    }

    #[test]
    fn mid_line_hashes_are_not_headings() {
        let raw = "humidity is 40% #nice";
        assert_eq!(render_markdown(raw), raw);
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("a longer sentence", 8), "a longer...");
    }
}
