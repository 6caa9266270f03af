//! Run manifest: what was read, what each stage did, what was written.
//!
//! The manifest carries no wall-clock time, so two runs over identical inputs
//! and configuration serialize to identical bytes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tunvesti_core::StageSummary;

use crate::export::WrittenTable;

/// Whether an input is required for the run to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    Required,
    Optional,
}

/// What happened to one input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStatus {
    Loaded,
    Missing,
    /// Present but unusable (unreadable, or required columns absent).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub name: String,
    pub path: String,
    pub role: InputRole,
    pub status: InputStatus,
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped: usize,
    pub blake3: Option<String>,
}

impl InputRecord {
    pub fn absent(name: impl Into<String>, path: impl Into<String>, role: InputRole) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            role,
            status: InputStatus::Missing,
            rows_in: 0,
            rows_out: 0,
            dropped: 0,
            blake3: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub tool: String,
    pub version: String,
    pub config_hash: String,
    pub inputs: Vec<InputRecord>,
    pub stages: Vec<StageSummary>,
    pub tables: Vec<WrittenTable>,
    pub warnings: Vec<String>,
}

impl RunManifest {
    pub fn new(config_hash: String) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
            inputs: Vec::new(),
            stages: Vec::new(),
            tables: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize run manifest to JSON")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to deserialize run manifest from JSON")
    }

    /// Written table by logical name.
    pub fn table(&self, name: &str) -> Option<&WrittenTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}
