//! Editor content cleanup applied before anything is persisted.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Find-in-note wraps every match in one of these.
static SEARCH_HIGHLIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<mark class="search-highlight[^>]*>([^<]*)</mark>"#).expect("valid regex")
});

/// Focus mode marks the block under the caret; everything else is dimmed via CSS.
static FOCUSED_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s*class="focused-block""#).expect("valid regex"));

/// Strips transient presentation markup so it never reaches the store.
///
/// Clean content comes back unchanged, so applying this twice is the same as
/// applying it once.
pub fn strip_transient_markup(html: &str) -> Cow<'_, str> {
    let unhighlighted = SEARCH_HIGHLIGHT_RE.replace_all(html, "$1");
    if !FOCUSED_BLOCK_RE.is_match(&unhighlighted) {
        return unhighlighted;
    }
    Cow::Owned(FOCUSED_BLOCK_RE.replace_all(&unhighlighted, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_search_highlight_wrapper() {
        let html = r#"<p>buy <mark class="search-highlight current">milk</mark> today</p>"#;
        assert_eq!(strip_transient_markup(html), "<p>buy milk today</p>");
    }

    #[test]
    fn test_highlight_match_is_case_insensitive() {
        let html = r#"<MARK class="search-highlight">X</MARK>"#;
        assert_eq!(strip_transient_markup(html), "X");
    }

    #[test]
    fn test_strips_focused_block_class() {
        let html = r#"<p class="focused-block">one</p><p>two</p>"#;
        assert_eq!(strip_transient_markup(html), "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_both_kinds_together() {
        let html =
            r#"<h2 class="focused-block">a <mark class="search-highlight">X</mark></h2>"#;
        assert_eq!(strip_transient_markup(html), "<h2>a X</h2>");
    }

    #[test]
    fn test_plain_content_is_a_fixed_point() {
        let html = r#"<p>plain <b>bold</b> <mark>kept</mark></p>"#;
        let once = strip_transient_markup(html);
        assert!(matches!(once, Cow::Borrowed(_)));
        assert_eq!(once, html);

        let dirty = r#"<p class="focused-block"><mark class="search-highlight">a</mark></p>"#;
        let cleaned = strip_transient_markup(dirty).into_owned();
        assert_eq!(strip_transient_markup(&cleaned), cleaned.as_str());
    }
}
