/// Deepest level the hierarchy distinguishes. Codes of ten digits or more all
/// sit on this level.
pub const MAX_LEVEL: u8 = 5;

pub fn is_digit_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

/// A code the builder can place purely from its own digits: at least one
/// two-digit group, an even number of digits, nothing but digits.
pub fn has_structural_shape(code: &str) -> bool {
    is_digit_code(code) && code.len() >= 2 && code.len() % 2 == 0
}

/// `level == ceil(len / 2)`, clamped to `1..=MAX_LEVEL`.
pub fn level_for_code(code: &str) -> u8 {
    let groups = code.chars().count().div_ceil(2);
    groups.clamp(1, MAX_LEVEL as usize) as u8
}

/// Parent by prefix truncation: drop the last two-digit group.
/// Two-digit (sector) codes have no parent.
pub fn truncated_parent(code: &str) -> Option<String> {
    let len = code.chars().count();
    if len <= 2 {
        return None;
    }
    Some(code.chars().take(len - 2).collect())
}

/// Converts Arabic-Indic and Extended Arabic-Indic digits to ASCII.
pub fn ascii_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            _ => c,
        })
        .collect()
}

/// Parses a spreadsheet-formatted amount.
///
/// Accepts thousands separators (`,`, `٬`, spaces, apostrophes), the Arabic
/// decimal separator `٫`, a leading minus and accounting-style parentheses
/// for negatives: `"(1,234.50)"` parses to `-1234.5`. Blank cells are zero.
/// Returns `None` when the text is not a number at all.
pub fn parse_amount(text: &str) -> Option<f64> {
    let text = ascii_digits(text.trim());
    if text.is_empty() || text == "-" {
        return Some(0.0);
    }

    let (negative, body) = match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, text.as_str()),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '\u{066C}' | '\'' | '\u{00A0}') && !c.is_whitespace())
        .map(|c| if c == '\u{066B}' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return Some(0.0);
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Reduces an account name to a comparison key.
///
/// Drops any leading code/numbering prefix, Arabic diacritics and tatweel,
/// folds the hamza carriers, alef maqsura and ta marbuta onto their plain
/// letters, turns dashes and punctuation into spaces, lowercases Latin text
/// and collapses whitespace.
pub fn normalize_account_name(name: &str) -> String {
    let name = ascii_digits(name);
    let stripped = name.trim_start_matches(|c: char| {
        c.is_ascii_digit() || c.is_whitespace() || is_separator(c) || matches!(c, '.' | ')' | '(')
    });

    let folded: String = stripped
        .chars()
        .filter_map(|c| match c {
            '\u{064B}'..='\u{0652}' | '\u{0670}' | '\u{0640}' => None,
            '\u{0622}' | '\u{0623}' | '\u{0625}' | '\u{0671}' => Some('\u{0627}'),
            '\u{0624}' => Some('\u{0648}'),
            '\u{0626}' | '\u{0649}' => Some('\u{064A}'),
            '\u{0629}' => Some('\u{0647}'),
            c if is_separator(c) || matches!(c, '.' | ',' | '\u{060C}' | '\u{061B}' | ':' | '(' | ')' | '/') => {
                Some(' ')
            }
            c => Some(c),
        })
        .flat_map(char::to_lowercase)
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        '-' | '_' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}'
    )
}

/// Rounds to one decimal place, the precision the quality score is reported in.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_code() {
        assert_eq!(level_for_code("01"), 1);
        assert_eq!(level_for_code("0101"), 2);
        assert_eq!(level_for_code("010101"), 3);
        assert_eq!(level_for_code("01010101"), 4);
        assert_eq!(level_for_code("0101010101"), 5);
        assert_eq!(level_for_code("010101010101"), 5);
        assert_eq!(level_for_code("010"), 2);
        assert_eq!(level_for_code("0"), 1);
    }

    #[test]
    fn test_level_matches_half_length_for_all_lengths() {
        for len in 1..=16usize {
            let code = "1".repeat(len);
            let expected = len.div_ceil(2).clamp(1, 5) as u8;
            assert_eq!(level_for_code(&code), expected, "length {}", len);
        }
    }

    #[test]
    fn test_truncated_parent() {
        assert_eq!(truncated_parent("01"), None);
        assert_eq!(truncated_parent("0102"), Some("01".to_string()));
        assert_eq!(truncated_parent("010203"), Some("0102".to_string()));
    }

    #[test]
    fn test_structural_shape() {
        assert!(has_structural_shape("01"));
        assert!(has_structural_shape("010203"));
        assert!(!has_structural_shape("0"));
        assert!(!has_structural_shape("010"));
        assert!(!has_structural_shape("01A2"));
        assert!(!has_structural_shape(""));
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("(1,234.50)"), Some(-1234.5));
        assert_eq!(parse_amount("1,234,567.25"), Some(1_234_567.25));
        assert_eq!(parse_amount("-75"), Some(-75.0));
        assert_eq!(parse_amount("  "), Some(0.0));
        assert_eq!(parse_amount("-"), Some(0.0));
        assert_eq!(parse_amount("١٬٢٣٤٫٥"), Some(1234.5));
        assert_eq!(parse_amount("12 500"), Some(12_500.0));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_normalize_account_name_arabic_variants() {
        let canonical = normalize_account_name("الأصول المتداولة");
        assert_eq!(normalize_account_name("الاصول المتداوله"), canonical);
        assert_eq!(normalize_account_name("إلاصول   المتـــداولة"), canonical);
        assert_eq!(normalize_account_name("01 - الأصول المتداولة"), canonical);
        assert_eq!(normalize_account_name("٠١ – الأُصول المتداولة"), canonical);
        assert_eq!(
            normalize_account_name("مستشفى"),
            normalize_account_name("مستشفي")
        );
    }

    #[test]
    fn test_normalize_account_name_latin() {
        assert_eq!(
            normalize_account_name("0101.  Cash-on-Hand"),
            normalize_account_name("cash on hand")
        );
    }
}
