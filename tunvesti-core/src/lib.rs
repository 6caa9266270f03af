//! Tunvesti Core: data integration and metric derivation for BVMT price history.
//!
//! This crate contains the pure transformation stages of the pipeline:
//! - Domain records (prices, benchmark, sector and dividend references, enriched rows)
//! - Raw record normalization with locale-aware numeric parsing
//! - Source reconciliation with explicit last-write-wins priority
//! - Per-ticker metric derivation (returns, rolling volatility, rolling volume)
//! - Stock, benchmark and sector correlations
//! - Fact and dimension table projections
//!
//! Every stage consumes the previous stage's output and returns a new table
//! plus a report. Nothing here touches the filesystem or the network.

pub mod correlation;
pub mod domain;
pub mod materialize;
pub mod metrics;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod stats;

pub use correlation::{
    compute_correlations, BenchmarkCorrelation, CorrelationConfig, CorrelationMatrix,
    CorrelationReport, CorrelationSet, PairCorrelation, ReturnPanel, SectorCorrelation,
};
pub use domain::{
    BenchmarkRecord, DerivedMetrics, DividendRecord, EnrichedRow, PriceRecord, ReconciledRow,
    RecordSource, SectorAssignment, UNCLASSIFIED,
};
pub use materialize::{
    date_dimension, fact_table, stock_dimension, DateDimRow, FactRow, MaterializeError,
    StockDimRow,
};
pub use metrics::{derive_metrics, DeriveError, DeriveReport, Derived, MetricsConfig};
pub use normalize::{
    normalize_benchmark, normalize_dividends, normalize_historical, normalize_incremental,
    normalize_sectors, NormalizeError, NormalizeReport, Normalized, RawRow, RawTable, RowIssue,
    SourceKind,
};
pub use reconcile::{
    reconcile, BatchId, BenchmarkBatch, NullCounts, PriceBatch, ReconcileError, ReconcileInput,
    ReconcileReport, Reconciled,
};
pub use report::{Stage, StageSummary};
