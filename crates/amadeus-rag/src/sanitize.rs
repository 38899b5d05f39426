//! Chunk text clean-up applied before anything reaches the vector store.

use std::sync::LazyLock;

use regex::Regex;

/// Literal `\uXXXX` sequences left behind by some extractors.
static UNICODE_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\u[0-9A-Fa-f]{4}").expect("static regex"));

/// Strip escape artefacts, every C0/C1 control character and BOMs, then
/// trim.
///
/// Newlines and tabs are controls too. Chunks are sanitised after
/// splitting, so boundaries are already fixed.
pub fn sanitize_content(content: &str) -> String {
    UNICODE_ESCAPE
        .replace_all(content, "")
        .chars()
        .filter(|&c| !is_stripped(c))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn is_stripped(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}' | '\u{FEFF}')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn removes_literal_unicode_escapes() {
        assert_eq!(sanitize_content(r"caf\u00e9 menu"), "caf menu");
    }

    #[test]
    fn removes_control_chars_and_bom() {
        let raw = "\u{FEFF}one\u{0007} \u{0085}two\u{0000}";
        assert_eq!(sanitize_content(raw), "one two");
    }

    #[test]
    fn newlines_and_tabs_are_controls_too() {
        assert_eq!(sanitize_content("line one\r\nline two\tcol"), "line oneline twocol");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize_content("   AN 15MAR PARMAD  "), "AN 15MAR PARMAD");
    }

    #[test]
    fn leaves_regular_unicode_untouched() {
        assert_eq!(sanitize_content("São Paulo – GRU"), "São Paulo – GRU");
    }
}
