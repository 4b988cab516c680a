//! Field constraints for submitted forms. Every check returns the message
//! shown to the user on failure.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

pub type Fields = BTreeMap<String, String>;

pub fn required<'f>(fields: &'f Fields, id: &str, label: &str) -> Result<&'f str, String> {
    match fields.get(id).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("{label} is required.")),
    }
}

pub fn integer_in_range(
    fields: &Fields,
    id: &str,
    label: &str,
    range: RangeInclusive<i64>,
) -> Result<i64, String> {
    let raw = required(fields, id, label)?;
    let out_of_range = || {
        format!(
            "{label} must be a whole number between {} and {}.",
            range.start(),
            range.end()
        )
    };
    let value: i64 = raw.parse().map_err(|_| out_of_range())?;
    if !range.contains(&value) {
        return Err(out_of_range());
    }
    Ok(value)
}

/// Resolves a submitted identifier against `known`. Mention syntax such as
/// `<@&123>` or `<#123>` is accepted.
pub fn existing_id(fields: &Fields, id: &str, label: &str, known: &[String]) -> Result<String, String> {
    let raw = required(fields, id, label)?;
    let normalized = strip_mention(raw);
    if known.iter().any(|k| k == normalized) {
        Ok(normalized.to_string())
    } else {
        Err(format!("{label} `{normalized}` does not exist on this server."))
    }
}

pub fn strip_mention(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = match trimmed.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        Some(inner) => inner,
        None => return trimmed,
    };
    inner
        .strip_prefix("@&")
        .or_else(|| inner.strip_prefix("@!"))
        .or_else(|| inner.strip_prefix('@'))
        .or_else(|| inner.strip_prefix('#'))
        .unwrap_or(inner)
}
