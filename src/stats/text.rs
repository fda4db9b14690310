use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold free text for keyword matching: strip diacritics (á→a, ç→c, ê→e),
/// lower-case, and trim surrounding whitespace and dots.
pub fn fold(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}
