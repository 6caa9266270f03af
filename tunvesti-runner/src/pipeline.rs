//! Stage sequencing: load → normalize → reconcile → derive → correlate →
//! materialize → write.
//!
//! Error policy:
//! - Fatal (returned as [`PipelineError`]): the historical source is missing,
//!   unreadable or lacks required columns; no historical rows survive; any
//!   output fails to write.
//! - Degraded (logged at `warn`, recorded in the manifest): an optional
//!   source is missing or unusable. The run continues without it.
//! - Row-level: dropped rows are counted per source; the count is logged at
//!   `warn` and the first reasons at `debug`.
//!
//! Every table is computed in memory before the first file is written.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use tunvesti_core::{
    compute_correlations, date_dimension, derive_metrics, fact_table, normalize_benchmark,
    normalize_dividends, normalize_historical, normalize_incremental, normalize_sectors,
    reconcile, stock_dimension, BatchId, BenchmarkBatch, CorrelationReport, CorrelationSet,
    DeriveError, MaterializeError, NormalizeError, NormalizeReport, Normalized, PriceBatch,
    RawTable, ReconcileError, ReconcileInput, Stage, StageSummary,
};

use crate::config::{ConfigError, OutputsConfig, PipelineConfig};
use crate::export::{self, TableCsv, WrittenTable};
use crate::loader::{
    discover_batches, file_label, read_enriched_table, read_raw_table, BatchFile, LoadError,
};
use crate::manifest::{InputRecord, InputRole, InputStatus, RunManifest};

/// How many row-level drop reasons are logged per source.
const LOGGED_ISSUES: usize = 5;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("historical source not found: {}", .0.display())]
    HistoricalMissing(PathBuf),

    #[error("historical source unreadable: {0}")]
    HistoricalUnreadable(#[source] LoadError),

    #[error("historical source rejected: {0}")]
    HistoricalInvalid(#[source] NormalizeError),

    #[error("reconcile: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("derive metrics: {0}")]
    Derive(#[from] DeriveError),

    #[error("materialize: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("write outputs: {0:#}")]
    Write(anyhow::Error),

    #[error("enriched table not found: {} (run the full pipeline first)", .0.display())]
    EnrichedMissing(PathBuf),

    #[error("enriched table unreadable: {0}")]
    EnrichedUnreadable(#[source] LoadError),
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output_dir: PathBuf,
    pub manifest: RunManifest,
}

/// Result of recomputing the correlation tables from an enriched table.
#[derive(Debug, Clone)]
pub struct CorrelationOutcome {
    pub report: CorrelationReport,
    pub tables: Vec<WrittenTable>,
}

// ─── Source loading ─────────────────────────────────────────────────

type Normalizer<T> = fn(&RawTable) -> Result<Normalized<T>, NormalizeError>;

/// Inputs and warnings gathered while loading sources.
#[derive(Debug, Default)]
struct SourceLog {
    inputs: Vec<InputRecord>,
    warnings: Vec<String>,
}

impl SourceLog {
    fn degraded(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn loaded(
        &mut self,
        name: &str,
        path: &Path,
        role: InputRole,
        hash: String,
        report: &NormalizeReport,
    ) {
        log_normalize_report(report);
        if report.dropped > 0 {
            self.warnings
                .push(format!("{}: {} rows dropped", report.source, report.dropped));
        }
        self.inputs.push(InputRecord {
            name: name.to_string(),
            path: path.display().to_string(),
            role,
            status: InputStatus::Loaded,
            rows_in: report.rows_in,
            rows_out: report.rows_out,
            dropped: report.dropped,
            blake3: Some(hash),
        });
    }

    fn skipped(&mut self, name: &str, path: &Path, hash: Option<String>, reason: String) {
        self.degraded(format!("{name}: {reason}; continuing without it"));
        let mut record =
            InputRecord::absent(name, path.display().to_string(), InputRole::Optional);
        record.status = InputStatus::Skipped;
        record.blake3 = hash;
        self.inputs.push(record);
    }

    /// Load an optional source. Any failure degrades to `None`.
    fn optional<T>(
        &mut self,
        name: &str,
        path: &Path,
        normalize: Normalizer<T>,
    ) -> Option<Vec<T>> {
        if !path.exists() {
            self.degraded(format!(
                "{name}: {} not found; continuing without it",
                path.display()
            ));
            self.inputs.push(InputRecord::absent(
                name,
                path.display().to_string(),
                InputRole::Optional,
            ));
            return None;
        }
        let loaded = match read_raw_table(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.skipped(name, path, None, e.to_string());
                return None;
            }
        };
        match normalize(&loaded.table) {
            Ok(normalized) => {
                self.loaded(name, path, InputRole::Optional, loaded.hash, &normalized.report);
                Some(normalized.records)
            }
            Err(e) => {
                self.skipped(name, path, Some(loaded.hash), e.to_string());
                None
            }
        }
    }
}

fn log_normalize_report(report: &NormalizeReport) {
    info!(
        source = %report.source,
        kind = %report.kind,
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        "normalized"
    );
    if report.dropped > 0 {
        warn!(
            source = %report.source,
            dropped = report.dropped,
            "rows dropped during normalization"
        );
        for issue in report.issues.iter().take(LOGGED_ISSUES) {
            debug!("{issue}");
        }
    }
    if report.inconsistent > 0 {
        warn!(
            source = %report.source,
            rows = report.inconsistent,
            "rows with high below low kept as-is"
        );
    }
    if !report.ignored_columns.is_empty() {
        debug!(source = %report.source, columns = ?report.ignored_columns, "ignored columns");
    }
}

/// Read and normalize every configured source into a reconciliation input.
fn load_sources(
    config: &PipelineConfig,
    log: &mut SourceLog,
) -> Result<(ReconcileInput, StageSummary), PipelineError> {
    let inputs = &config.inputs;

    let hist_path = &inputs.historical;
    if !hist_path.exists() {
        return Err(PipelineError::HistoricalMissing(hist_path.clone()));
    }
    let loaded = read_raw_table(hist_path).map_err(PipelineError::HistoricalUnreadable)?;
    let historical =
        normalize_historical(&loaded.table).map_err(PipelineError::HistoricalInvalid)?;
    log.loaded("historical", hist_path, InputRole::Required, loaded.hash, &historical.report);

    let mut rows_in = historical.report.rows_in;
    let mut dropped = historical.report.dropped;

    let mut input = ReconcileInput::new(PriceBatch {
        id: BatchId::new(file_label(hist_path), None),
        records: historical.records,
    });

    let dir = &inputs.daily_updates_dir;
    if dir.is_dir() {
        for batch in discover_or_warn(dir, &inputs.stock_batch_prefix, log) {
            let name = format!("incremental:{}", batch.id.label);
            if let Some(records) = log.optional(&name, &batch.path, normalize_incremental) {
                input.incremental.push(PriceBatch {
                    id: batch.id,
                    records,
                });
            }
        }
        for batch in discover_or_warn(dir, &inputs.index_batch_prefix, log) {
            let name = format!("benchmark:{}", batch.id.label);
            if let Some(records) = log.optional(&name, &batch.path, normalize_benchmark) {
                input.benchmark_updates.push(BenchmarkBatch {
                    id: batch.id,
                    records,
                });
            }
        }
    } else {
        log.degraded(format!(
            "daily updates directory {} not found; using the historical load only",
            dir.display()
        ));
    }

    for record in log.inputs.iter().filter(|r| r.name.starts_with("incremental:")) {
        rows_in += record.rows_in;
        dropped += record.dropped;
    }

    input.benchmark = log
        .optional("benchmark", &inputs.benchmark, normalize_benchmark)
        .map(|records| BenchmarkBatch {
            id: BatchId::new(file_label(&inputs.benchmark), None),
            records,
        });
    input.sectors = log.optional("sectors", &inputs.sectors, normalize_sectors);
    input.dividends = log.optional("dividends", &inputs.dividends, normalize_dividends);

    let summary = StageSummary::from_keys(
        Stage::Normalize,
        rows_in,
        dropped,
        std::iter::once(&input.historical)
            .chain(&input.incremental)
            .flat_map(|b| b.records.iter().map(|r| r.key())),
    );
    Ok((input, summary))
}

fn discover_or_warn(dir: &Path, prefix: &str, log: &mut SourceLog) -> Vec<BatchFile> {
    match discover_batches(dir, prefix) {
        Ok(batches) => {
            debug!(dir = %dir.display(), prefix, count = batches.len(), "discovered batches");
            batches
        }
        Err(e) => {
            log.degraded(format!("{e}; skipping {prefix}* batches"));
            Vec::new()
        }
    }
}

// ─── Tables ─────────────────────────────────────────────────────────

fn table(
    name: &'static str,
    file: &str,
    rows: usize,
    content: anyhow::Result<String>,
) -> Result<TableCsv, PipelineError> {
    Ok(TableCsv {
        name,
        file: file.to_string(),
        rows,
        content: content.map_err(PipelineError::Write)?,
    })
}

fn correlation_tables(
    set: &CorrelationSet,
    outputs: &OutputsConfig,
) -> Result<Vec<TableCsv>, PipelineError> {
    Ok(vec![
        table(
            "correlation_matrix",
            &outputs.correlation_matrix,
            set.matrix.len(),
            export::correlation_matrix_csv(&set.matrix),
        )?,
        table(
            "correlation_pairs",
            &outputs.correlation_pairs,
            set.pairs.len(),
            export::correlation_pairs_csv(&set.pairs),
        )?,
        table(
            "stock_benchmark",
            &outputs.stock_benchmark,
            set.stock_benchmark.len(),
            export::stock_benchmark_csv(&set.stock_benchmark),
        )?,
        table(
            "sector_benchmark",
            &outputs.sector_benchmark,
            set.sector_benchmark.len(),
            export::sector_benchmark_csv(&set.sector_benchmark),
        )?,
    ])
}

fn log_correlation_report(report: &CorrelationReport) {
    info!(
        tickers = report.matrix_tickers,
        defined_pairs = report.defined_pairs,
        undefined_pairs = report.undefined_pairs,
        benchmark_dates = report.benchmark_dates,
        "{}",
        report.summary
    );
    if !report.excluded_tickers.is_empty() {
        info!(
            count = report.excluded_tickers.len(),
            "tickers below the benchmark overlap threshold"
        );
        debug!(tickers = ?report.excluded_tickers, "excluded from benchmark correlation");
    }
    if !report.excluded_sectors.is_empty() {
        debug!(sectors = ?report.excluded_sectors, "excluded from sector correlation");
    }
}

// ─── Entry points ───────────────────────────────────────────────────

/// Run every stage and write all output tables plus the manifest.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunOutcome, PipelineError> {
    let mut manifest = RunManifest::new(config.config_hash()?);
    let mut log = SourceLog::default();

    let (input, normalize_summary) = load_sources(config, &mut log)?;
    info!("{normalize_summary}");

    let reconciled = reconcile(input)?;
    let report = &reconciled.report;
    info!(
        superseded = report.superseded,
        historical_overridden = report.historical_overridden,
        incremental_batches = report.incremental_batches,
        benchmark_dates = report.benchmark_dates,
        "{}",
        report.summary
    );
    if report.sector_conflicts > 0 || report.dividend_conflicts > 0 {
        warn!(
            sector_conflicts = report.sector_conflicts,
            dividend_conflicts = report.dividend_conflicts,
            "conflicting reference duplicates; first entry kept"
        );
    }
    debug!(null_counts = ?report.null_counts, "optional field nulls after reconciliation");
    for w in &report.warnings {
        warn!("{w}");
    }
    log.warnings.extend(report.warnings.iter().cloned());
    let reconcile_summary = report.summary.clone();
    let reconciled_rows = reconciled.rows.len();
    let reconciled_content = export::reconciled_csv(&reconciled.rows);

    let derived = derive_metrics(reconciled.rows, &reconciled.benchmark, &config.metrics)?;
    info!(
        with_return = derived.report.rows_with_return,
        with_volatility = derived.report.rows_with_volatility,
        with_benchmark_return = derived.report.rows_with_benchmark_return,
        "{}",
        derived.report.summary
    );
    if derived.report.zero_previous_close > 0 {
        warn!(
            rows = derived.report.zero_previous_close,
            "returns left null after a zero close"
        );
    }

    let correlations = compute_correlations(&derived.rows, &config.correlation);
    log_correlation_report(&correlations.report);

    let facts = fact_table(&derived.rows);
    let dim_date = date_dimension(&derived.rows)?;
    let dim_stock = stock_dimension(&derived.rows)?;
    let materialize_summary = StageSummary::from_keys(
        Stage::Materialize,
        derived.rows.len(),
        0,
        facts.iter().map(|f| (f.ticker.as_str(), f.date)),
    );
    info!(
        dates = dim_date.len(),
        stocks = dim_stock.len(),
        "{materialize_summary}"
    );

    let outputs = &config.outputs;
    let mut tables = vec![
        table("reconciled", &outputs.reconciled, reconciled_rows, reconciled_content)?,
        table(
            "enriched",
            &outputs.enriched,
            derived.rows.len(),
            export::enriched_csv(&derived.rows),
        )?,
        table("fact", &outputs.fact, facts.len(), export::fact_csv(&facts))?,
        table("dim_date", &outputs.dim_date, dim_date.len(), export::dim_date_csv(&dim_date))?,
        table(
            "dim_stock",
            &outputs.dim_stock,
            dim_stock.len(),
            export::dim_stock_csv(&dim_stock),
        )?,
    ];
    tables.extend(correlation_tables(&correlations, outputs)?);

    manifest.inputs = log.inputs;
    manifest.warnings = log.warnings;
    manifest.stages = vec![
        normalize_summary,
        reconcile_summary,
        derived.report.summary.clone(),
        correlations.report.summary.clone(),
        materialize_summary,
    ];

    manifest.tables = export::write_tables(&outputs.dir, &tables).map_err(PipelineError::Write)?;
    for t in &manifest.tables {
        debug!(table = %t.name, file = %t.file, rows = t.rows, "wrote table");
    }

    let manifest_csv = TableCsv {
        name: "manifest",
        file: outputs.manifest.clone(),
        rows: 0,
        content: manifest.to_json().map_err(PipelineError::Write)?,
    };
    export::write_table(&outputs.dir, &manifest_csv).map_err(PipelineError::Write)?;
    info!(
        dir = %outputs.dir.display(),
        tables = manifest.tables.len(),
        warnings = manifest.warnings.len(),
        "run complete"
    );

    Ok(RunOutcome {
        output_dir: outputs.dir.clone(),
        manifest,
    })
}

/// Recompute and rewrite the correlation tables from the enriched table of a
/// previous run.
pub fn run_correlation_stage(
    config: &PipelineConfig,
) -> Result<CorrelationOutcome, PipelineError> {
    let outputs = &config.outputs;
    let path = outputs.path(&outputs.enriched);
    if !path.exists() {
        return Err(PipelineError::EnrichedMissing(path));
    }
    let rows = read_enriched_table(&path).map_err(PipelineError::EnrichedUnreadable)?;
    info!(path = %path.display(), rows = rows.len(), "loaded enriched table");

    let set = compute_correlations(&rows, &config.correlation);
    log_correlation_report(&set.report);

    let tables = correlation_tables(&set, outputs)?;
    let written = export::write_tables(&outputs.dir, &tables).map_err(PipelineError::Write)?;
    Ok(CorrelationOutcome {
        report: set.report,
        tables: written,
    })
}

// ─── System check ───────────────────────────────────────────────────

/// Presence of one configured input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCheck {
    pub name: &'static str,
    pub path: PathBuf,
    pub role: InputRole,
    pub exists: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCheck {
    pub inputs: Vec<InputCheck>,
}

impl SystemCheck {
    /// True when every required input exists.
    pub fn is_ready(&self) -> bool {
        self.inputs
            .iter()
            .all(|c| c.exists || c.role == InputRole::Optional)
    }
}

/// Report which configured inputs exist. Reads directory listings only.
pub fn check_inputs(config: &PipelineConfig) -> SystemCheck {
    let inputs = &config.inputs;
    let file = |name, path: &PathBuf, role| InputCheck {
        name,
        path: path.clone(),
        role,
        exists: path.is_file(),
        detail: None,
    };

    let dir = &inputs.daily_updates_dir;
    let batch_count = |prefix: &str| match discover_batches(dir, prefix) {
        Ok(b) => b.len().to_string(),
        Err(e) => format!("error ({e})"),
    };
    let daily = InputCheck {
        name: "daily_updates",
        path: dir.clone(),
        role: InputRole::Optional,
        exists: dir.is_dir(),
        detail: dir.is_dir().then(|| {
            format!(
                "{} stock batches, {} index snapshots",
                batch_count(&inputs.stock_batch_prefix),
                batch_count(&inputs.index_batch_prefix)
            )
        }),
    };

    SystemCheck {
        inputs: vec![
            file("historical", &inputs.historical, InputRole::Required),
            daily,
            file("benchmark", &inputs.benchmark, InputRole::Optional),
            file("sectors", &inputs.sectors, InputRole::Optional),
            file("dividends", &inputs.dividends, InputRole::Optional),
        ],
    }
}
