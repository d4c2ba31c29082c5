//! Text helpers for chat message limits.

use unicode_segmentation::UnicodeSegmentation;

const ELLIPSIS: &str = "…";

/// Cut `text` to at most `max` user-perceived characters, marking the cut
/// with an ellipsis. Never splits a grapheme cluster.
pub fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_none() {
        return head;
    }

    let keep: String = head.graphemes(true).take(max - 1).collect();
    format!("{keep}{ELLIPSIS}")
}
