//! Domain types for the price dataset

pub mod enriched;
pub mod price;
pub mod reference;

pub use enriched::{DerivedMetrics, EnrichedRow, ReconciledRow, RecordSource};
pub use price::{BenchmarkRecord, PriceRecord};
pub use reference::{DividendRecord, SectorAssignment, UNCLASSIFIED};
