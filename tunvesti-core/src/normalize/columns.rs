//! Column layout resolution.
//!
//! Each source declares the fields it understands and the header spellings
//! accepted for each. Header matching is case-insensitive; anything not
//! declared is recorded as ignored and never read.

use super::numeric::is_placeholder;
use super::RawRow;
use std::collections::HashMap;

/// One field a source understands.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnSpec {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(field: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            field,
            aliases,
            required: true,
        }
    }

    pub const fn optional(field: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            field,
            aliases,
            required: false,
        }
    }
}

/// Field name → column index for one table.
#[derive(Debug)]
pub(crate) struct Layout {
    positions: HashMap<&'static str, usize>,
    pub ignored: Vec<String>,
}

impl Layout {
    /// Resolve specs against a header row. Returns the names of missing
    /// required fields on failure.
    pub fn resolve(headers: &[String], specs: &[ColumnSpec]) -> Result<Self, Vec<String>> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (idx, name) in normalized.iter().enumerate() {
            // First occurrence of a duplicated header wins.
            by_name.entry(name.as_str()).or_insert(idx);
        }

        let mut positions = HashMap::new();
        let mut missing = Vec::new();
        for spec in specs {
            let found = spec
                .aliases
                .iter()
                .find_map(|alias| by_name.get(alias).copied());
            match found {
                Some(idx) => {
                    positions.insert(spec.field, idx);
                }
                None if spec.required => missing.push(spec.field.to_string()),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(missing);
        }

        let used: Vec<usize> = positions.values().copied().collect();
        let ignored = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !used.contains(idx))
            .map(|(_, h)| h.trim().to_string())
            .collect();

        Ok(Self { positions, ignored })
    }

    /// Trimmed cell for `field`, or `None` when the column is absent, the
    /// row is short, or the cell is a placeholder.
    pub fn get<'a>(&self, row: &'a RawRow, field: &str) -> Option<&'a str> {
        let idx = *self.positions.get(field)?;
        let cell = row.fields.get(idx)?.trim();
        if is_placeholder(cell) {
            None
        } else {
            Some(cell)
        }
    }
}

/// Lowercase, trim, and drop a UTF-8 BOM left on the first header by
/// spreadsheet exports.
pub(crate) fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}
