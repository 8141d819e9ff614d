//! Decimal rounding of numeric leaves.
//!
//! Exporters on different platforms disagree in the last few bits of a float.
//! Rounding every numeric array to a fixed number of decimals before comparing
//! absorbs that noise; real differences show up far above 1e-12.

/// Rounds `value` to `places` decimal places.
///
/// Goes through the exact decimal expansion instead of `(x * 10^p).round()`,
/// which loses precision once `x * 10^p` passes 2^53. Non-finite values pass
/// through unchanged and `-0.0` comes back as `0.0`.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let text = format!("{:.*}", places as usize, value);
    let rounded = text.parse::<f64>().unwrap_or(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Rounds every element of a numeric leaf.
pub fn round_leaf(values: &[f64], places: u32) -> Vec<f64> {
    values.iter().map(|&v| round_to(v, places)).collect()
}
