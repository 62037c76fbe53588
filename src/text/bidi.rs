//! Visual-to-logical reordering of mixed Hebrew/Latin fragments.

use std::borrow::Cow;

use unicode_bidi::BidiInfo;
use unicode_normalization::UnicodeNormalization;

/// Normalize a raw text fragment.
///
/// Applies NFC, collapses every whitespace run to one space, trims, and then
/// reorders the fragment with the Unicode bidirectional algorithm so that
/// right-to-left runs read correctly while digit and Latin runs keep their
/// left-to-right order.
///
/// The paragraph direction is taken from the first strong character, so a
/// fragment that opens with Hebrew is laid out right-to-left and one that
/// opens with Latin left-to-right.
///
/// # Example
///
/// ```
/// use felling::text::normalize;
///
/// assert_eq!(normalize("  12   ןתיב "), "ביתן 12");
/// assert_eq!(normalize("Main  St."), "Main St.");
/// ```
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let collapsed = collapse_whitespace(&composed);

    if !has_rtl(&collapsed) {
        return collapsed;
    }

    reorder_visual(&collapsed).into_owned()
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the fragment contains any right-to-left character.
pub fn has_rtl(text: &str) -> bool {
    BidiInfo::new(text, None).has_rtl()
}

fn reorder_visual(text: &str) -> Cow<'_, str> {
    let info = BidiInfo::new(text, None);

    match info.paragraphs.as_slice() {
        [] => Cow::Borrowed(text),
        [para] => info.reorder_line(para, para.range.clone()),
        paragraphs => {
            let mut out = String::with_capacity(text.len());
            for para in paragraphs {
                out.push_str(&info.reorder_line(para, para.range.clone()));
            }
            Cow::Owned(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize("  a \t  b\u{00A0} c  "), "a b c");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_latin_untouched() {
        assert_eq!(normalize("Permit 2024/117"), "Permit 2024/117");
    }

    #[test]
    fn test_pure_hebrew_reversed() {
        assert_eq!(normalize("םולש"), "שלום");
    }

    #[test]
    fn test_numbers_keep_order_inside_hebrew() {
        // Visual "12 ןתיב" is logical "ביתן 12": the digits are not flipped.
        assert_eq!(normalize("12 ןתיב"), "ביתן 12");
    }

    #[test]
    fn test_latin_paragraph_with_hebrew_run() {
        assert_eq!(normalize("ABC םולש"), "ABC שלום");
    }

    #[test]
    fn test_idempotent_without_rtl() {
        for sample in ["  x  y ", "12/03/2024", "Pinus  halepensis", ""] {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_rtl_reordering_is_an_involution() {
        let visual = "םלוע םולש";
        let logical = normalize(visual);
        assert_eq!(logical, "שלום עולם");
        assert_eq!(normalize(&logical), visual);
    }

    #[test]
    fn test_collapse_idempotent() {
        let once = collapse_whitespace(" \n a\r\n b ");
        assert_eq!(once, "a b");
        assert_eq!(collapse_whitespace(&once), once);
    }

    #[test]
    fn test_has_rtl() {
        assert!(has_rtl("abc ש"));
        assert!(!has_rtl("abc 123"));
    }
}
