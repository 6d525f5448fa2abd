//! Text normalization helpers shared by indexing and querying.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// UTF-8 byte order mark.
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Letters that do not decompose into a base letter plus combining marks.
fn substitute(c: char) -> Option<&'static str> {
    Some(match c {
        'Æ' => "AE",
        'æ' => "ae",
        'Œ' => "OE",
        'œ' => "oe",
        'Ð' | 'Đ' => "D",
        'ð' | 'đ' => "d",
        'Ł' => "L",
        'ł' => "l",
        'Ø' => "O",
        'ø' => "o",
        'Þ' => "Th",
        'þ' => "th",
        'ß' => "ss",
        'ẞ' => "SS",
        'Ĳ' => "Y",
        'ĳ' => "y",
        'Ǝ' | 'Ə' => "E",
        'ǝ' | 'ə' => "e",
        _ => return None,
    })
}

/// Fold a string to ASCII where a Latin equivalent exists.
///
/// The input is decomposed, combining marks are dropped, ligatures and special Latin letters
/// are replaced, and the result is recomposed. Case is preserved.
///
/// # Examples
///
/// ```
/// use genealogy_search::text::ascii_fold;
///
/// assert_eq!(ascii_fold("Ærø Kirkegård"), "AEro Kirkegard");
/// assert_eq!(ascii_fold("Straße"), "Strasse");
/// ```
pub fn ascii_fold(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    for c in s.nfd().filter(|c| !is_combining_mark(*c)) {
        match substitute(c) {
            Some(replacement) => folded.push_str(replacement),
            None => folded.push(c),
        }
    }
    folded.nfc().collect()
}

/// Lowercased [`ascii_fold`], the form used for lookups.
pub fn fold_lower(s: &str) -> String {
    ascii_fold(s).to_lowercase()
}

/// Drop a leading UTF-8 byte order mark.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(BOM).unwrap_or(bytes)
}

/// Split a name into words on runs of anything that is not a letter or a search marker
/// (`*`, `?`, `~`).
pub fn split_word(name: &str) -> Vec<&str> {
    name.split(|c: char| !(c.is_alphabetic() || matches!(c, '*' | '?' | '~')))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether a search value carries wildcard or fuzzy markers.
pub fn has_search_markers(value: &str) -> bool {
    value.contains(['~', '*', '?'])
}

/// Whether a token carries a wildcard.
pub fn has_wildcard(token: &str) -> bool {
    token.contains(['*', '?'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_fold_strips_accents() {
        assert_eq!(ascii_fold("José Núñez"), "Jose Nunez");
        assert_eq!(ascii_fold("Zoë"), "Zoe");
    }

    #[test]
    fn test_ascii_fold_ligatures_and_latin_letters() {
        assert_eq!(ascii_fold("Œuvre"), "OEuvre");
        assert_eq!(ascii_fold("Łódź"), "Lodz");
        assert_eq!(ascii_fold("Þór"), "Thor");
        assert_eq!(ascii_fold("Ǽ"), "AE");
        assert_eq!(ascii_fold("ǣ"), "ae");
        assert_eq!(ascii_fold("Ǿ"), "O");
        assert_eq!(ascii_fold("Đorđe"), "Dorde");
    }

    #[test]
    fn test_ascii_fold_preserves_case() {
        assert_eq!(ascii_fold("STRAẞE"), "STRASSE");
        assert_eq!(fold_lower("ÉMILE"), "emile");
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBF{}"), b"{}");
        assert_eq!(strip_bom(b"{}"), b"{}");
        assert_eq!(strip_bom(b"\xEF\xBB"), b"\xEF\xBB");
    }

    #[test]
    fn test_split_word_keeps_markers() {
        assert_eq!(split_word("Mary-Ann  O'Neil"), vec!["Mary", "Ann", "O", "Neil"]);
        assert_eq!(split_word("Fl*nt ~Smyth j?n"), vec!["Fl*nt", "~Smyth", "j?n"]);
        assert!(split_word(" - ").is_empty());
    }
}
