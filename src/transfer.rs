//! Bulk export and closed-world import of labels
//!
//! Rows are keyed by external id. An import must name only ids the store
//! knows; every record it does not name is set to `No`.

use crate::error::{ClassifierError, Result};
use crate::store::{Collection, Store, Transaction};
use calamine::{open_workbook_auto, Reader};
use star_classifier_common::export::excel_core::{generate_excel_buffer, SheetData};
use star_classifier_common::layout::{ALL_RECORDS_SHEET_NAME, RESULTS_SHEET_NAME};
use star_classifier_common::{format_tsv, parse_table, parse_tsv, ExportRow, ImportRow, ItemRecord, Label};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Which records an export includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    /// Yes and Ambiguous, the rows worth a follow-up
    #[default]
    Flagged,
    All,
}

impl ExportScope {
    pub fn matches(&self, record: &ItemRecord) -> bool {
        match self {
            ExportScope::Flagged => matches!(record.label, Some(Label::Yes | Label::Ambiguous)),
            ExportScope::All => true,
        }
    }
}

/// Outcome of a successful import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    /// Records that received a label from the table
    pub listed: usize,
    /// Records absent from the table, set to `No`
    pub forced_no: usize,
}

/// Export rows for the records matching `predicate`, in store order
pub fn export_rows<F>(store: &Store, predicate: F) -> Result<Vec<ExportRow>>
where
    F: Fn(&ItemRecord) -> bool,
{
    let records: Vec<ItemRecord> = store.get_all(Collection::Stars)?;
    Ok(records
        .iter()
        .filter(|r| predicate(r))
        .map(ExportRow::from)
        .collect())
}

/// Apply a complete label assignment in one transaction
///
/// Fails without writing anything if any row names an unknown id.
pub async fn import_rows(store: &mut Store, rows: &[ImportRow]) -> Result<ImportSummary> {
    let records: Vec<ItemRecord> = store.get_all(Collection::Stars)?;
    let known: BTreeSet<&str> = records.iter().map(|r| r.external_id.as_str()).collect();

    let mut unknown: Vec<String> = Vec::new();
    let mut assignment: HashMap<&str, Option<Label>> = HashMap::new();
    for row in rows {
        if !known.contains(row.external_id.as_str()) {
            if !unknown.contains(&row.external_id) {
                unknown.push(row.external_id.clone());
            }
            continue;
        }
        if assignment.insert(row.external_id.as_str(), row.label).is_some() {
            warn!(line = row.line, id = %row.external_id, "id listed twice, later row wins");
        }
    }

    if !unknown.is_empty() {
        return Err(ClassifierError::unknown_ids(unknown));
    }

    let mut summary = ImportSummary {
        rows: rows.len(),
        ..Default::default()
    };
    let mut tx = Transaction::new();
    for record in &records {
        let label = match assignment.get(record.external_id.as_str()) {
            Some(label) => {
                summary.listed += 1;
                *label
            }
            None => {
                summary.forced_no += 1;
                Some(Label::No)
            }
        };
        tx.put(
            Collection::Stars,
            record.file_name.as_str(),
            &record.clone().with_label(label),
        )?;
    }
    store.commit(tx).await?;

    info!(rows = summary.rows, listed = summary.listed, forced_no = summary.forced_no, "import applied");
    Ok(summary)
}

/// Clipboard text for `rows`
pub fn rows_to_tsv(rows: &[ExportRow]) -> String {
    format_tsv(rows)
}

/// Write the results workbook; `all_rows` adds a second sheet
pub async fn write_workbook(
    path: &Path,
    rows: &[ExportRow],
    all_rows: Option<&[ExportRow]>,
) -> Result<()> {
    let mut sheets = vec![SheetData {
        name: RESULTS_SHEET_NAME,
        rows,
    }];
    if let Some(all_rows) = all_rows {
        sheets.push(SheetData {
            name: ALL_RECORDS_SHEET_NAME,
            rows: all_rows,
        });
    }

    let buffer = generate_excel_buffer(&sheets)
        .map_err(|e| ClassifierError::ClipboardOrExportFailed(e.to_string()))?;
    tokio::fs::write(path, buffer).await.map_err(|e| {
        ClassifierError::ClipboardOrExportFailed(format!("{}: {}", path.display(), e))
    })?;

    info!(path = %path.display(), rows = rows.len(), "workbook written");
    Ok(())
}

pub async fn write_tsv(path: &Path, rows: &[ExportRow]) -> Result<()> {
    tokio::fs::write(path, format_tsv(rows)).await.map_err(|e| {
        ClassifierError::ClipboardOrExportFailed(format!("{}: {}", path.display(), e))
    })
}

/// Parse import text; parse failures become [`ClassifierError::InvalidImportRow`]
pub fn parse_import_text(text: &str) -> Result<Vec<ImportRow>> {
    parse_tsv(text).map_err(invalid_row)
}

/// Read the first worksheet of an xlsx/xls/ods workbook
pub fn read_import_workbook(path: &Path) -> Result<Vec<ImportRow>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ClassifierError::InvalidArgument(format!("{}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ClassifierError::InvalidArgument(format!("{}: no worksheet", path.display())))?
        .map_err(|e| ClassifierError::InvalidArgument(format!("{}: {}", path.display(), e)))?;

    let table: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    parse_table(&table).map_err(invalid_row)
}

/// Read import rows from a workbook or a TSV file, chosen by extension
pub async fn read_import_file(path: &Path) -> Result<Vec<ImportRow>> {
    let is_workbook = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "xlsx" | "xls" | "ods"))
        .unwrap_or(false);

    if is_workbook {
        read_import_workbook(path)
    } else {
        let text = tokio::fs::read_to_string(path).await?;
        parse_import_text(&text)
    }
}

fn invalid_row(error: star_classifier_common::Error) -> ClassifierError {
    match error {
        star_classifier_common::Error::Parse { line, reason } => {
            ClassifierError::InvalidImportRow { line, reason }
        }
        other => ClassifierError::Common(other),
    }
}
