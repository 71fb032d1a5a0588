//! Table layout shared by the xlsx and TSV exporters
//!
//! Column order is fixed: external id, discoverer (blank), label.
//! Importers read column 0 and column 2 and ignore anything to the right.

/// Column index of the external id
pub const ID_COLUMN: usize = 0;
/// Column index of the discoverer (always blank on export)
pub const DISCOVERER_COLUMN: usize = 1;
/// Column index of the label
pub const LABEL_COLUMN: usize = 2;

/// Clipboard (TSV) header row
pub const TSV_HEADERS: [&str; 3] = ["External ID", "Discoverer", "Label"];

/// Workbook header row
pub const SHEET_HEADERS: [&str; 3] = ["Номер TIC", "Відкривач", "Чи зоря змінна ?"];

/// Sheet holding the rows that passed the export predicate
pub const RESULTS_SHEET_NAME: &str = "Результати";

/// Optional second sheet holding every record
pub const ALL_RECORDS_SHEET_NAME: &str = "Усі";

/// Default workbook file name
pub const DEFAULT_EXPORT_FILE_NAME: &str = "classification_results.xlsx";

/// Column widths in characters (id, discoverer, label)
pub const COLUMN_WIDTHS: [f64; 3] = [16.0, 18.0, 28.0];
