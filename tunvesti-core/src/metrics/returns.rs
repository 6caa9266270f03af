//! Simple percentage returns.

/// Percentage change from `prev` to `cur`. Undefined when the previous close
/// is not positive.
pub fn pct_change(prev: f64, cur: f64) -> Option<f64> {
    if prev <= 0.0 {
        return None;
    }
    let r = (cur - prev) / prev * 100.0;
    r.is_finite().then_some(r)
}

/// Returns of a chronologically ordered close series. The first entry is
/// always `None`.
pub fn pct_changes(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;
    for &c in closes {
        out.push(prev.and_then(|p| pct_change(p, c)));
        prev = Some(c);
    }
    out
}
