use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads the leading integer of a form value: leading whitespace and a
/// sign are skipped, and anything after the first non-digit is ignored.
/// Returns `None` when there are no leading digits or the number
/// doesn’t fit in an `i64`.
///
/// ```
/// use posttest::normalization::parse_leading_integer;
/// assert_eq!(parse_leading_integer(" 42"), Some(42));
/// assert_eq!(parse_leading_integer("4.7"), Some(4));
/// assert_eq!(parse_leading_integer("-3"), Some(-3));
/// assert_eq!(parse_leading_integer("abc"), None);
/// assert_eq!(parse_leading_integer(""), None);
/// ```
pub fn parse_leading_integer(raw: impl AsRef<str>) -> Option<i64> {
    let trimmed = raw.as_ref().trim_start();

    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or_else(|| rest.len());

    if end == 0 {
        return None;
    }

    let magnitude: i64 = rest[..end].parse().ok()?;

    Some(if negative { -magnitude } else { magnitude })
}

/// Turns a free-text form value into an optional column value. Blank
/// text becomes `None`; anything else is kept verbatim.
///
/// ```
/// use posttest::normalization::optional_text;
/// assert_eq!(optional_text("  "), None);
/// assert_eq!(optional_text(" fine "), Some(" fine ".to_owned()));
/// ```
pub fn optional_text(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_owned())
    }
}

/// Deserializes a form value that may arrive as a string, a number or
/// `null` into its text form. `null` becomes the empty string.
pub fn deserialize_lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected text or a number, not {}", other))),
    }
}
