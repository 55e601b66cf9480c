use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::table::{FeatureTable, ID_COLUMNS};

const MAX_SHEET_NAME: usize = 31;

pub struct ExportReport {
    pub sheets: usize,
    pub rows: usize,
}

/// One worksheet per `(name, table)`, header row first, numbers as numbers.
pub fn write_workbook(path: &Path, sheets: &[(String, FeatureTable)]) -> Result<ExportReport> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }

    let mut workbook = Workbook::new();
    let mut rows = 0usize;
    for (name, table) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(name))?;
        write_table(sheet, table)?;
        rows += table.len();
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        sheets: sheets.len(),
        rows,
    })
}

fn write_table(worksheet: &mut Worksheet, table: &FeatureTable) -> Result<()> {
    let header = ID_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(table.columns().iter().cloned());
    for (col_idx, name) in header.enumerate() {
        worksheet
            .write_string(0, col_idx as u16, &name)
            .with_context(|| format!("write header ({col_idx})"))?;
    }

    let offset = ID_COLUMNS.len();
    for (idx, row) in table.rows().iter().enumerate() {
        let row_idx = (idx + 1) as u32;
        if let Some(id) = row.fixture_id {
            worksheet
                .write_number(row_idx, 0, id as f64)
                .with_context(|| format!("write cell ({row_idx},0)"))?;
        }
        worksheet
            .write_string(row_idx, 1, &row.home_team)
            .with_context(|| format!("write cell ({row_idx},1)"))?;
        worksheet
            .write_string(row_idx, 2, &row.away_team)
            .with_context(|| format!("write cell ({row_idx},2)"))?;
        for (col, value) in row.values.iter().enumerate() {
            let col_idx = (col + offset) as u16;
            worksheet
                .write_number(row_idx, col_idx, *value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

/// Excel rejects `[]:*?/\` in sheet names and caps them at 31 characters.
pub fn sheet_name(raw: &str) -> String {
    let cleaned = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .collect::<String>();
    let trimmed = cleaned.trim().trim_matches('\'');
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }
    trimmed.chars().take(MAX_SHEET_NAME).collect()
}
