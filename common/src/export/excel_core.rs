//! Workbook export
//!
//! Builds the results workbook from the column layout in layout.rs

use crate::error::{Error, Result};
use crate::layout::{COLUMN_WIDTHS, DISCOVERER_COLUMN, ID_COLUMN, LABEL_COLUMN, SHEET_HEADERS};
use crate::types::ExportRow;
use rust_xlsxwriter::*;

/// One worksheet worth of rows
pub struct SheetData<'a> {
    pub name: &'a str,
    pub rows: &'a [ExportRow],
}

/// Generate a workbook into a buffer
///
/// Every sheet gets the same header row and column layout.
pub fn generate_excel_buffer(sheets: &[SheetData<'_>]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(sheet.name)
            .map_err(|e| Error::Excel(format!("sheet name: {}", e)))?;

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet
                .set_column_width(col as u16, *width)
                .map_err(|e| Error::Excel(format!("column width: {}", e)))?;
        }

        for (col, header) in SHEET_HEADERS.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| Error::Excel(format!("header: {}", e)))?;
        }

        for (idx, row) in sheet.rows.iter().enumerate() {
            let excel_row = (idx + 1) as u32;
            let label = row.label.map(|l| l.as_str()).unwrap_or_default();
            let cells = [
                (ID_COLUMN, row.external_id.as_str()),
                (DISCOVERER_COLUMN, row.discoverer.as_str()),
                (LABEL_COLUMN, label),
            ];
            for (col, value) in cells {
                worksheet
                    .write_string(excel_row, col as u16, value)
                    .map_err(|e| Error::Excel(format!("row {}: {}", excel_row + 1, e)))?;
            }
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| Error::Excel(format!("save: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    #[test]
    fn test_generate_excel_buffer_is_zip() {
        let rows = vec![ExportRow {
            external_id: "100".into(),
            discoverer: String::new(),
            label: Some(Label::Yes),
        }];
        let buffer = generate_excel_buffer(&[SheetData {
            name: "Результати",
            rows: &rows,
        }])
        .unwrap();

        // xlsx is a zip container
        assert!(buffer.starts_with(b"PK"));
    }

    #[test]
    fn test_generate_excel_buffer_two_sheets() {
        let rows: Vec<ExportRow> = Vec::new();
        let buffer = generate_excel_buffer(&[
            SheetData { name: "Результати", rows: &rows },
            SheetData { name: "Усі", rows: &rows },
        ]);
        assert!(buffer.is_ok());
    }

    #[test]
    fn test_generate_excel_buffer_rejects_bad_sheet_name() {
        let rows: Vec<ExportRow> = Vec::new();
        let result = generate_excel_buffer(&[SheetData { name: "a/b", rows: &rows }]);
        assert!(matches!(result, Err(Error::Excel(_))));
    }
}
