#![forbid(unsafe_code)]

//! Conversion between stored node labels and editor text.
//!
//! Tree labels are stored as lightweight markup where `<br>` marks a line
//! break. The inline editor works on plain text: line breaks become `'\n'`
//! and every other tag is dropped. Floating node labels are stored as plain
//! text and never need conversion.

/// Convert stored markup to editor text.
///
/// `<br>`, `<br/>` and `<br />` (any case) become `'\n'`; other tags are
/// removed. An unterminated `<` is kept literally.
#[must_use]
pub fn markup_to_plain(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let tag = after[..end].trim().trim_end_matches('/').trim();
        if tag.eq_ignore_ascii_case("br") {
            out.push('\n');
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Convert editor text to stored markup (`'\n'` becomes `<br>`).
#[must_use]
pub fn plain_to_markup(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br>")
}

/// Whether the text is empty or whitespace only.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn br_variants_become_newlines() {
        assert_eq!(markup_to_plain("a<br>b<BR/>c<br />d"), "a\nb\nc\nd");
    }

    #[test]
    fn other_tags_are_stripped() {
        assert_eq!(markup_to_plain("<b>bold</b> and <i>it</i>"), "bold and it");
    }

    #[test]
    fn unterminated_tag_is_literal() {
        assert_eq!(markup_to_plain("x < y"), "x < y");
    }

    #[test]
    fn newlines_become_br() {
        assert_eq!(plain_to_markup("one\ntwo\r\nthree"), "one<br>two<br>three");
    }

    #[test]
    fn plain_text_survives_both_ways() {
        let text = "line one\nline two";
        assert_eq!(markup_to_plain(&plain_to_markup(text)), text);
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank("  \n\t"));
        assert!(!is_blank(" a "));
    }
}
