use std::sync::LazyLock;

use regex::Regex;

static COUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s?([kKmM])?\b").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountKind {
    Connections,
    Followers,
}

/// Which count, if any, a short text snippet describes.
///
/// "12 mutual connections" and "Following" are about the viewer, not the
/// profile, and are ignored.
pub(crate) fn classify(text: &str) -> Option<CountKind> {
    let lower = text.to_lowercase();
    if lower.contains("mutual") || lower.contains("following") {
        return None;
    }
    if lower.contains("connection") {
        Some(CountKind::Connections)
    } else if lower.contains("follower") {
        Some(CountKind::Followers)
    } else {
        None
    }
}

/// First number embedded in `text`: commas stripped, `K`/`M` expanded, and
/// `500+` read as 500.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn parse_count(text: &str) -> Option<u64> {
    let captures = COUNT_PATTERN.captures(text)?;
    let digits = captures.get(1)?.as_str().replace(',', "");
    let multiplier: u64 = match captures.get(2).map(|m| m.as_str()) {
        Some("k" | "K") => 1_000,
        Some("m" | "M") => 1_000_000,
        _ => 1,
    };

    if digits.contains('.') {
        let value: f64 = digits.parse().ok()?;
        let scaled = (value * multiplier as f64).round();
        (scaled >= 0.0 && scaled < u64::MAX as f64).then_some(scaled as u64)
    } else {
        digits.parse::<u64>().ok()?.checked_mul(multiplier)
    }
}
