//! Import table parser
//!
//! Turns pasted tab-separated text (or rows read from a workbook) into
//! `ImportRow`s. The first row is always a header and is skipped.

use crate::error::{Error, Result};
use crate::layout::{ID_COLUMN, LABEL_COLUMN};
use crate::types::{ImportRow, Label};

/// Parse tab-separated import text
///
/// - line 1 is the header and is skipped
/// - blank lines are skipped
/// - column 0 is the external id, column 2 the label; further columns are ignored
/// - a missing or empty label cell means "no label"
///
/// # Examples
/// ```
/// use star_classifier_common::parse_tsv;
///
/// let text = "External ID\tDiscoverer\tLabel\n100\t\tТак\n";
/// let rows = parse_tsv(text).unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].external_id, "100");
/// ```
pub fn parse_tsv(text: &str) -> Result<Vec<ImportRow>> {
    let mut rows = Vec::new();

    for (idx, raw_line) in text.lines().enumerate().skip(1) {
        let line = raw_line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let cells: Vec<&str> = line.split('\t').collect();
        rows.push(parse_cells(idx + 1, &cells)?);
    }

    Ok(rows)
}

/// Parse rows that were already split into cells (header included)
pub fn parse_table<S: AsRef<str>>(table: &[Vec<S>]) -> Result<Vec<ImportRow>> {
    let mut rows = Vec::new();

    for (idx, row) in table.iter().enumerate().skip(1) {
        let cells: Vec<&str> = row.iter().map(|c| c.as_ref()).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(parse_cells(idx + 1, &cells)?);
    }

    Ok(rows)
}

fn parse_cells(line: usize, cells: &[&str]) -> Result<ImportRow> {
    let external_id = cells
        .get(ID_COLUMN)
        .map(|c| c.trim())
        .unwrap_or_default();

    if external_id.is_empty() {
        return Err(Error::Parse {
            line,
            reason: "empty external id".into(),
        });
    }

    let label_cell = cells.get(LABEL_COLUMN).copied().unwrap_or_default();
    let label = Label::parse_cell(label_cell).map_err(|e| Error::Parse {
        line,
        reason: e.to_string(),
    })?;

    Ok(ImportRow {
        line,
        external_id: external_id.to_string(),
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_skips_header_and_blank_lines() {
        let text = "External ID\tDiscoverer\tLabel\n100\t\tТак\n\n200\t\tНі\n";
        let rows = parse_tsv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].external_id, "100");
        assert_eq!(rows[0].label, Some(Label::Yes));
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].external_id, "200");
        assert_eq!(rows[1].label, Some(Label::No));
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn test_parse_tsv_ignores_extra_columns_and_crlf() {
        let text = "id\tx\tlabel\textra\r\n300\tSomeone\tAmbiguous\tnote\r\n";
        let rows = parse_tsv(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].external_id, "300");
        assert_eq!(rows[0].label, Some(Label::Ambiguous));
    }

    #[test]
    fn test_parse_tsv_missing_label_column_is_unlabeled() {
        let text = "header\n400\n500\t\t\n";
        let rows = parse_tsv(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, None);
        assert_eq!(rows[1].label, None);
    }

    #[test]
    fn test_parse_tsv_unknown_label_reports_line() {
        let text = "header\n100\t\tТак\n200\t\tmaybe\n";
        let err = parse_tsv(text).unwrap_err();
        match err {
            Error::Parse { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("maybe"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_tsv_empty_id_is_error() {
        let text = "header\n\t\tТак\n";
        assert!(matches!(parse_tsv(text), Err(Error::Parse { line: 2, .. })));
    }

    #[test]
    fn test_parse_tsv_header_only() {
        assert!(parse_tsv("External ID\tDiscoverer\tLabel").unwrap().is_empty());
        assert!(parse_tsv("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_table() {
        let table = vec![
            vec!["Номер TIC".to_string(), "Відкривач".to_string(), "Чи зоря змінна ?".to_string()],
            vec!["100".to_string(), String::new(), "Так".to_string()],
            vec![String::new(), String::new(), String::new()],
            vec!["200".to_string()],
        ];
        let rows = parse_table(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, Some(Label::Yes));
        assert_eq!(rows[1].external_id, "200");
        assert_eq!(rows[1].label, None);
        assert_eq!(rows[1].line, 4);
    }
}
