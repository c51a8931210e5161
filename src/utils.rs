//! Small value helpers for cleaning reference data

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::types::NOT_AVAILABLE;

// Literal patterns; compilation cannot fail
#[allow(clippy::expect_used)]
static FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("footnote pattern"));
#[allow(clippy::expect_used)]
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("year pattern"));

/// Latin letters that have no canonical decomposition, and their plain forms
const UNDECOMPOSABLE: &[(char, &str)] = &[
    ('ø', "o"), ('Ø', "O"), ('ß', "ss"), ('ł', "l"), ('Ł', "L"), ('đ', "d"), ('Đ', "D"),
    ('æ', "ae"), ('Æ', "AE"), ('œ', "oe"), ('Œ', "OE"), ('ı', "i"),
];

/// Convert a lap or race time to seconds
///
/// Accepts `ss.sss`, `m:ss.sss` and `h:mm:ss.sss`. Returns `None` for
/// [`NOT_AVAILABLE`], empty strings and anything unparseable.
pub fn lap_time_seconds(time: &str) -> Option<f64> {
    let time = time.trim();
    if time.is_empty() || time == NOT_AVAILABLE {
        return None;
    }

    let mut seconds = 0.0;
    for (i, part) in time.rsplit(':').enumerate() {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 || i > 2 {
            return None;
        }
        seconds += value * 60f64.powi(i as i32);
    }
    Some(seconds)
}

/// Every year named in a season list such as `"1950–1960, 1962[a]"`
///
/// Footnote markers are removed, en-dash ranges expanded inclusively and the
/// result sorted without duplicates. Parts without a four-digit year are ignored.
pub fn extract_years(text: &str) -> Vec<i32> {
    let clean = FOOTNOTE.replace_all(text, "");
    let mut years: Vec<i32> = Vec::new();

    for part in clean.split(',') {
        let mut found = YEAR
            .find_iter(part)
            .filter_map(|m| m.as_str().parse::<i32>().ok());
        let Some(start) = found.next() else {
            continue;
        };
        let is_range = part.contains('–') || part.contains('-');
        match found.next() {
            Some(end) if is_range && end >= start => years.extend(start..=end),
            Some(other) => years.extend([start, other]),
            None => years.push(start),
        }
    }

    years.sort_unstable();
    years.dedup();
    years
}

/// Replace accented Latin letters with their plain forms
///
/// Letters are NFKD-decomposed and combining marks dropped; the few letters
/// without a decomposition (`ø`, `ß`, `ł`, ...) are mapped by hand.
pub fn remove_accents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        match UNDECOMPOSABLE.iter().find(|(letter, _)| *letter == ch) {
            Some((_, plain)) => out.push_str(plain),
            None => out.push(ch),
        }
    }
    out
}
