//! Locale-aware numeric parsing.
//!
//! Source files mix French (`13.291,00`) and US (`13,291.00`) grouping. When
//! both separators occur, the one appearing last is the decimal point and the
//! other is a thousands separator. A lone comma is a decimal point.

/// Values treated as "no data" rather than as parse failures.
const PLACEHOLDERS: [&str; 8] = ["", "-", "--", "n/a", "na", "nan", "null", "none"];

/// True when the cell holds no value (empty or a known placeholder).
pub fn is_placeholder(raw: &str) -> bool {
    let trimmed = raw.trim();
    PLACEHOLDERS
        .iter()
        .any(|p| trimmed.eq_ignore_ascii_case(p))
}

/// Parse a decimal written in either grouping convention.
///
/// Whitespace (including non-breaking spaces used as thousands separators)
/// and percent signs are stripped first. Returns `None` for placeholders,
/// unparseable text and non-finite results.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    if is_placeholder(raw) {
        return None;
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{202f}' && *c != '%')
        .collect();

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    let value = canonical.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Parse a non-negative amount; negatives are rejected.
pub fn parse_non_negative(raw: &str) -> Option<f64> {
    parse_decimal(raw).filter(|v| *v >= 0.0)
}

/// Parse a share count. Fractional inputs are rounded to the nearest share.
pub fn parse_volume(raw: &str) -> Option<u64> {
    parse_non_negative(raw).map(|v| v.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_grouping() {
        assert_eq!(parse_decimal("13.291,00"), Some(13291.0));
        assert_eq!(parse_decimal("1.234.567,89"), Some(1234567.89));
    }

    #[test]
    fn us_grouping() {
        assert_eq!(parse_decimal("13,291.00"), Some(13291.0));
        assert_eq!(parse_decimal("1,234,567.89"), Some(1234567.89));
    }

    #[test]
    fn lone_comma_is_decimal_point() {
        assert_eq!(parse_decimal("12,5"), Some(12.5));
        assert_eq!(parse_decimal("0,35"), Some(0.35));
    }

    #[test]
    fn percent_and_spaces_are_stripped() {
        assert_eq!(parse_decimal("-1,25%"), Some(-1.25));
        assert_eq!(parse_decimal(" 0.80 % "), Some(0.8));
        assert_eq!(parse_decimal("13 291,00"), Some(13291.0));
        assert_eq!(parse_decimal("13\u{a0}291,00"), Some(13291.0));
    }

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_decimal("42"), Some(42.0));
        assert_eq!(parse_decimal("7.125"), Some(7.125));
    }

    #[test]
    fn placeholders_are_none() {
        for p in ["", "  ", "-", "--", "N/A", "nan", "NULL", "None"] {
            assert!(is_placeholder(p), "{p:?} should be a placeholder");
            assert_eq!(parse_decimal(p), None);
        }
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("1,2,3"), None);
        assert_eq!(parse_decimal("inf"), None);
    }

    #[test]
    fn volume_rounds_and_rejects_negatives() {
        assert_eq!(parse_volume("1 204"), Some(1204));
        assert_eq!(parse_volume("15,6"), Some(16));
        assert_eq!(parse_volume("-3"), None);
    }
}
