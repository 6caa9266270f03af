//! Tunvesti Runner: pipeline orchestration over `tunvesti-core`.
//!
//! This crate provides:
//! - TOML configuration with defaults for every path and stage setting
//! - Source discovery (incremental batches by file-name prefix) and CSV loading
//! - Stage sequencing with the fatal / degraded / row-level error policy
//! - CSV export of every output table and a deterministic run manifest

pub mod config;
pub mod export;
pub mod loader;
pub mod manifest;
pub mod pipeline;

pub use config::{ConfigError, InputsConfig, OutputsConfig, PipelineConfig};
pub use export::{TableCsv, WrittenTable};
pub use loader::{
    batch_id_from_file_name, discover_batches, read_enriched_table, read_raw_table, BatchFile,
    LoadError, LoadedTable,
};
pub use manifest::{InputRecord, InputRole, InputStatus, RunManifest};
pub use pipeline::{
    check_inputs, run_correlation_stage, run_pipeline, CorrelationOutcome, InputCheck,
    PipelineError, RunOutcome, SystemCheck,
};
