//! Guarded ratio arithmetic.
//!
//! RULE: No rate or ratio anywhere in the engine divides directly.
//! Everything goes through these helpers so a zero denominator can
//! never poison a snapshot with NaN or infinity.

/// Percentage with one decimal of rounding. Returns 0.0 when the
/// denominator is non-positive.
pub fn safe_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    ((numerator / denominator) * 1000.0).round() / 10.0
}

/// Plain ratio, 0.0 when the denominator is non-positive.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Median of an unsorted sample. Returns 0.0 for an empty slice.
pub fn median(values: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
