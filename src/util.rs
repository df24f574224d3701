// Cell-level parsing, name casing and the small statistics the aggregator
// needs. Nothing here knows about categories or regions.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Numeric cell as `f64`, or `None` for blanks and text.
///
/// Thousands separators are ignored, so `"1,204"` reads as 1204. Any ASCII
/// letter makes the cell non-numeric, which keeps `"12 kits"` and `"NaN"`
/// out.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() || s.bytes().any(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    s.replace(',', "").parse().ok()
}

/// Count cells are never negative and never missing: anything that does not
/// parse to a finite, non-negative number becomes zero.
pub fn parse_count(s: Option<&str>) -> f64 {
    match parse_f64_safe(s) {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}

/// Strict parse with the configured primary format.
pub fn parse_date_with(s: Option<&str>, format: &str) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, format).ok()
}

// Tried in order by the permissive parser.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d %b %Y",
    "%d-%b-%Y", "%b %d, %Y", "%d %B %Y", "%B %d, %Y", "%Y%m%d",
];

const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Best-effort parse used when the primary format rejected every row.
pub fn parse_date_permissive(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in FALLBACK_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Word-wise capitalization: a letter is upper-cased when the preceding
/// character is not a letter, and lower-cased otherwise.
///
/// `"north 24 paraganas"` becomes `"North 24 Paraganas"`, `"k.v.rangareddy"`
/// becomes `"K.V.Rangareddy"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Arithmetic mean; 0 for an empty slice.
pub fn average(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

/// Sample standard deviation (n - 1). Fewer than two values give 0.
pub fn sample_std(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = average(v);
    let ss: f64 = v.iter().map(|x| (x - mean) * (x - mean)).sum();
    (ss / (v.len() - 1) as f64).sqrt()
}

/// `n` rounded to `decimals` places with `en` thousands separators.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (whole, frac) = match fixed.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::new();
    // "-0" and "-0.00" read as zero.
    if n < 0.0 && fixed.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
        out.push('-');
    }
    out.push_str(&whole.parse::<u64>().unwrap_or(0).to_formatted_string(&Locale::en));
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_int<T: ToFormattedString>(n: T) -> String {
    n.to_formatted_string(&Locale::en)
}
