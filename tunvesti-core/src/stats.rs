//! Small descriptive statistics shared by the metric and correlation stages.
//!
//! All functions are two-pass (mean first, then deviations) so results do
//! not depend on summation order beyond the input order itself.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator). `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Pearson correlation of two equally long samples.
///
/// `None` when fewer than two pairs exist or either side has zero variance.
/// A constant side counts as zero variance even when its mean is not exactly
/// representable. The result is clamped to [-1, 1] to absorb rounding.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    if is_constant(xs) || is_constant(ys) {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if r.is_finite() {
        Some(r.clamp(-1.0, 1.0))
    } else {
        None
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Trailing-window Pearson correlation. Entry `i` covers `[i + 1 - window, i]`
/// and is `None` until the window is full.
pub fn rolling_pearson(xs: &[f64], ys: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = xs.len().min(ys.len());
    let mut out = vec![None; n];
    if window == 0 {
        return out;
    }
    for i in (window.saturating_sub(1))..n {
        let start = i + 1 - window;
        out[i] = pearson(&xs[start..=i], &ys[start..=i]);
    }
    out
}
