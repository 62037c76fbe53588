//! Joining of wrapped table cells.

use super::bidi::{collapse_whitespace, normalize};

/// Join a raw, possibly multi-line cell into one logical line.
///
/// `raw` holds the visual lines top-to-bottom. They are reversed before the
/// right-to-left reordering in [`normalize`], which flips the whole line, so
/// a wrapped Hebrew cell reads top line first. Each line is
/// whitespace-collapsed on its own, the lines are joined with a single space,
/// and blank lines are dropped.
///
/// For a cell without line breaks this is exactly `normalize(raw)`.
pub fn join_cell(raw: &str) -> String {
    let line = raw
        .split('\n')
        .rev()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    normalize(&line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_visual_lines() {
        // Lines reverse to "עולם שלום"; the RTL pass then yields the
        // reference bidi layout of that string.
        assert_eq!(join_cell("שלום\nעולם"), "םולש םלוע");
    }

    #[test]
    fn test_hebrew_top_line_reads_first() {
        // "ןולא" over "לודג" reads "אלון גדול".
        assert_eq!(join_cell("ןולא\nלודג"), "אלון גדול");
    }

    #[test]
    fn test_line_order_reversed_for_latin() {
        assert_eq!(join_cell("second  line\nfirst line"), "first line second line");
    }

    #[test]
    fn test_single_line_equals_normalize() {
        for raw in ["  12 ןתיב ", "Oak", "", "a  \t b"] {
            assert_eq!(join_cell(raw), normalize(raw));
        }
    }

    #[test]
    fn test_blank_lines_dropped() {
        assert_eq!(join_cell("b\n\n  \na"), "a b");
        assert_eq!(join_cell("\n"), "");
    }

    #[test]
    fn test_crlf_line_breaks() {
        assert_eq!(join_cell("two\r\none"), "one two");
    }
}
