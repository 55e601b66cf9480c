use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::features::{AWAY_CORNERS, FeatureRecord, HOME_CORNERS};

pub const ID_COLUMNS: [&str; 3] = ["fixture_id", "home_team", "away_team"];
pub const GROUND_TRUTH_COLUMNS: [&str; 2] = [HOME_CORNERS, AWAY_CORNERS];

const COLUMNS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub fixture_id: Option<u64>,
    pub home_team: String,
    pub away_team: String,
    pub values: Vec<f64>,
}

/// Records laid out on the union of their feature names. Cells a record does
/// not carry are 0.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

/// Whitespace in provider stat names becomes `_` so column names are safe
/// identifiers for the modelling side.
pub fn normalize_column(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

impl FeatureTable {
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        let normalized = records
            .iter()
            .map(|r| {
                r.features
                    .iter()
                    .map(|(k, v)| (normalize_column(k), *v))
                    .collect::<BTreeMap<_, _>>()
            })
            .collect::<Vec<_>>();

        let columns = normalized
            .iter()
            .flat_map(|m| m.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        let rows = records
            .iter()
            .zip(&normalized)
            .map(|(record, values)| TableRow {
                fixture_id: record.fixture_id,
                home_team: record.home_team.clone(),
                away_team: record.away_team.clone(),
                values: columns
                    .iter()
                    .map(|c| values.get(c).copied().unwrap_or(0.0))
                    .collect(),
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.values.get(idx)).copied()
    }

    /// Model inputs: every column except the ground-truth labels.
    pub fn feature_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !GROUND_TRUTH_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    /// Lay rows out on `columns` exactly: missing columns are 0.0, extras dropped.
    pub fn reindex(&self, columns: &[String]) -> Self {
        let lookup = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.as_str(), idx))
            .collect::<BTreeMap<_, _>>();
        let rows = self
            .rows
            .iter()
            .map(|row| TableRow {
                values: columns
                    .iter()
                    .map(|c| {
                        lookup
                            .get(c.as_str())
                            .and_then(|idx| row.values.get(*idx))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect(),
                ..row.clone()
            })
            .collect();
        Self {
            columns: columns.to_vec(),
            rows,
        }
    }

    pub fn append(&mut self, other: &FeatureTable) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other.clone();
            return;
        }
        let union = self
            .columns
            .iter()
            .chain(other.columns.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let mut merged = self.reindex(&union);
        merged.rows.extend(other.reindex(&union).rows);
        *self = merged;
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnsFile {
    version: u32,
    columns: Vec<String>,
}

pub fn save_columns(path: &Path, columns: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    let file = ColumnsFile {
        version: COLUMNS_VERSION,
        columns: columns.to_vec(),
    };
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&file).context("serialize training columns")?;
    fs::write(&tmp, json).context("write training columns")?;
    fs::rename(&tmp, path).context("swap training columns")?;
    Ok(())
}

/// `None` when no training run has saved a column list yet.
pub fn load_columns(path: &Path) -> Result<Option<Vec<String>>> {
    let Ok(raw) = fs::read_to_string(path) else {
        return Ok(None);
    };
    let file = serde_json::from_str::<ColumnsFile>(&raw)
        .with_context(|| format!("parse training columns {}", path.display()))?;
    if file.version != COLUMNS_VERSION {
        return Ok(None);
    }
    Ok(Some(file.columns))
}
