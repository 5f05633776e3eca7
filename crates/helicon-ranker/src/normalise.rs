//! Score normalisation functions.
//! Population z-scores make candidate and path scores comparable across a result set.

/// Floor for the standard deviation of a constant population.
pub const SIGMA_FLOOR: f64 = 1e-9;

/// Population z-scores: z_i = (v_i − μ) / σ, same order as input.
///
/// σ is the population (not Bessel-corrected) standard deviation. Lists of
/// zero or one value map to all zeros; a degenerate σ is replaced by
/// `SIGMA_FLOOR`.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.0; n];
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    // Identical inputs can leave rounding noise instead of an exact zero.
    let sigma = match variance.sqrt() {
        s if s < SIGMA_FLOOR => SIGMA_FLOOR,
        s => s,
    };

    values.iter().map(|v| (v - mean) / sigma).collect()
}
