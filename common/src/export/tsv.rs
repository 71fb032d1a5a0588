//! Clipboard text export
//!
//! Tab-separated, one header row, same three columns as the workbook.

use crate::layout::TSV_HEADERS;
use crate::types::ExportRow;

/// Format rows as clipboard text (header + one line per row, `\n` separated)
pub fn format_tsv(rows: &[ExportRow]) -> String {
    let mut out = TSV_HEADERS.join("\t");
    out.push('\n');

    for row in rows {
        let label = row.label.map(|l| l.as_str()).unwrap_or_default();
        out.push_str(&sanitize(&row.external_id));
        out.push('\t');
        out.push_str(&sanitize(&row.discoverer));
        out.push('\t');
        out.push_str(label);
        out.push('\n');
    }

    out
}

// Cells must not break the row structure.
fn sanitize(cell: &str) -> String {
    cell.replace(['\t', '\n', '\r'], " ")
}
