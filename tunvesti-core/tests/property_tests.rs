//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Locale parsing: French and US grouping of the same amount agree
//! 2. Pearson: bounded and symmetric
//! 3. Reconciliation: independent of batch arrival order
//! 4. Rolling windows: values appear exactly from the window-th row on

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use tunvesti_core::normalize::parse_decimal;
use tunvesti_core::stats::pearson;
use tunvesti_core::{
    derive_metrics, reconcile, BatchId, MetricsConfig, PriceBatch, PriceRecord, ReconcileInput,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn group_thousands(n: u64, sep: char) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i64::from(n))
}

fn arb_records() -> impl Strategy<Value = Vec<PriceRecord>> {
    prop::collection::vec((0..3usize, 0..10u32, 1.0..100.0_f64), 0..12).prop_map(|rows| {
        rows.into_iter()
            .map(|(t, d, c)| PriceRecord::new(["A", "B", "C"][t], day(d), c))
            .collect()
    })
}

// ── 1. Locale parsing ────────────────────────────────────────────────

proptest! {
    #[test]
    fn french_and_us_grouping_agree(whole in 0u64..100_000_000, cents in 0u64..100) {
        let us = format!("{}.{cents:02}", group_thousands(whole, ','));
        let fr = format!("{},{cents:02}", group_thousands(whole, '.'));
        let a = parse_decimal(&us).unwrap();
        let b = parse_decimal(&fr).unwrap();
        prop_assert_eq!(a, b);
        let expected = whole as f64 + cents as f64 / 100.0;
        prop_assert!((a - expected).abs() < 1e-6);
    }
}

// ── 2. Pearson ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn pearson_is_bounded_and_symmetric(
        pairs in prop::collection::vec((-50.0..50.0_f64, -50.0..50.0_f64), 2..60)
    ) {
        let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let r = pearson(&xs, &ys);
        prop_assert_eq!(r, pearson(&ys, &xs));
        if let Some(r) = r {
            prop_assert!((-1.0..=1.0).contains(&r));
        }
    }
}

// ── 3. Reconciliation order ──────────────────────────────────────────

proptest! {
    #[test]
    fn batch_arrival_order_does_not_matter(
        historical in arb_records(),
        batches in prop::collection::vec(arb_records(), 0..4),
    ) {
        prop_assume!(!historical.is_empty());
        let batches: Vec<PriceBatch> = batches
            .into_iter()
            .enumerate()
            .map(|(i, records)| PriceBatch {
                id: BatchId::new(format!("updated_stocks_{i}.csv"), Some(day(i as u32))),
                records,
            })
            .collect();

        let hist = PriceBatch { id: BatchId::new("historical.csv", None), records: historical };
        let mut forward = ReconcileInput::new(hist.clone());
        forward.incremental = batches.clone();
        let mut backward = ReconcileInput::new(hist);
        backward.incremental = batches.into_iter().rev().collect();

        let a = reconcile(forward).unwrap();
        let b = reconcile(backward).unwrap();
        prop_assert_eq!(a.rows, b.rows);
    }
}

// ── 4. Rolling window depth ──────────────────────────────────────────

proptest! {
    #[test]
    fn volatility_count_matches_window_depth(
        closes in prop::collection::vec(1.0..100.0_f64, 1..80)
    ) {
        let records: Vec<PriceRecord> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PriceRecord::new("A", day(i as u32), *c))
            .collect();
        let reconciled = reconcile(ReconcileInput::new(PriceBatch {
            id: BatchId::new("historical.csv", None),
            records,
        }))
        .unwrap();
        let derived = derive_metrics(reconciled.rows, &[], &MetricsConfig::default()).unwrap();

        let present = derived.rows.iter().filter(|r| r.metrics.volatility_30d.is_some()).count();
        prop_assert_eq!(present, closes.len().saturating_sub(29));
        for row in derived.rows.iter().take(29) {
            prop_assert!(row.metrics.volatility_30d.is_none());
        }
    }
}
