//! Table serialization and download artifacts.
//!
//! CSV goes through the `csv` writer. Excel output is attempted with
//! `rust_xlsxwriter` first; if that engine fails, the hand-built OOXML
//! writer in [`ooxml`] produces the workbook instead.

pub mod ooxml;

use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::error::{ExportError, ExportResult};
use crate::models::{Cell, ConversionRequest, ExportArtifact, Table, TargetFormat};

// =============================================================================
// CSV
// =============================================================================

/// Serialize as comma-separated UTF-8 with a header row and no index column.
pub fn write_csv(table: &Table) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    for row in 0..table.row_count() {
        writer.write_record(table.row(row).map(Cell::to_string))?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

// =============================================================================
// Excel
// =============================================================================

/// Spreadsheet writing engines, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadsheetEngine {
    /// `rust_xlsxwriter`, bold header row.
    XlsxWriter,
    /// Direct OOXML package writer.
    Ooxml,
}

impl SpreadsheetEngine {
    pub fn write(&self, table: &Table) -> ExportResult<Vec<u8>> {
        match self {
            SpreadsheetEngine::XlsxWriter => write_with_xlsxwriter(table),
            SpreadsheetEngine::Ooxml => ooxml::write_workbook(table),
        }
    }
}

fn write_with_xlsxwriter(table: &Table) -> ExportResult<Vec<u8>> {
    let too_large = || ExportError::TooLarge {
        rows: table.row_count() + 1,
        cols: table.column_count(),
    };

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();

    for (col, column) in table.columns.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| too_large())?;
        worksheet.write_string_with_format(0, col, column.name.as_str(), &header)?;

        for (row, cell) in column.cells.iter().enumerate() {
            let row = u32::try_from(row + 1).map_err(|_| too_large())?;
            match cell {
                Cell::Number(n) if n.is_finite() => {
                    worksheet.write_number(row, col, *n)?;
                }
                Cell::Number(n) => {
                    worksheet.write_string(row, col, n.to_string())?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(row, col, s.as_str())?;
                }
                Cell::Missing => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Excel bytes plus how they were produced.
#[derive(Debug, Clone)]
pub struct XlsxOutput {
    pub bytes: Vec<u8>,
    pub engine: SpreadsheetEngine,
    /// Error text of the primary engine, when the fallback had to run.
    pub primary_error: Option<String>,
}

/// Serialize as XLSX: primary engine first, fallback engine on failure.
///
/// A fallback failure is returned as the error.
pub fn write_xlsx(table: &Table) -> ExportResult<XlsxOutput> {
    write_xlsx_with(table, SpreadsheetEngine::XlsxWriter, SpreadsheetEngine::Ooxml)
}

pub(crate) fn write_xlsx_with(
    table: &Table,
    primary: SpreadsheetEngine,
    fallback: SpreadsheetEngine,
) -> ExportResult<XlsxOutput> {
    match primary.write(table) {
        Ok(bytes) => Ok(XlsxOutput { bytes, engine: primary, primary_error: None }),
        Err(err) => {
            tracing::warn!(engine = ?primary, error = %err, "primary spreadsheet engine failed");
            let bytes = fallback.write(table)?;
            Ok(XlsxOutput {
                bytes,
                engine: fallback,
                primary_error: Some(err.to_string()),
            })
        }
    }
}

// =============================================================================
// Artifacts
// =============================================================================

/// Replace the extension of `original` with the target's (`.csv` / `.xlsx`).
pub fn artifact_filename(original: &str, target: TargetFormat) -> String {
    let stem = match original.rfind('.') {
        Some(dot) if dot > 0 => &original[..dot],
        _ => original,
    };
    format!("{}{}", stem, target.extension())
}

/// Result of a conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub artifact: ExportArtifact,
    /// Primary spreadsheet engine error, when the fallback was used.
    pub primary_error: Option<String>,
}

/// Serialize the current table for download. Nothing is cached: every call
/// re-serializes.
pub fn convert(
    table: &Table,
    original_name: &str,
    request: ConversionRequest,
) -> ExportResult<Conversion> {
    let target = request.target_format;

    let (data, primary_error) = match target {
        TargetFormat::Csv => (write_csv(table)?, None),
        TargetFormat::Excel => {
            let output = write_xlsx(table)?;
            (output.bytes, output.primary_error)
        }
    };

    Ok(Conversion {
        artifact: ExportArtifact {
            data,
            filename: artifact_filename(original_name, target),
            mime_type: target.mime_type(),
        },
        primary_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::XLSX_MIME;
    use crate::models::Column;
    use crate::parser::{parse_csv_bytes, parse_excel_bytes};

    fn numbers() -> Table {
        Table::new(vec![
            Column::new("x", vec![Cell::Number(1.0), Cell::Number(2.0)]),
            Column::new("y", vec![Cell::Number(0.5), Cell::Missing]),
        ])
    }

    #[test]
    fn test_csv_output() {
        let table = Table::new(vec![
            Column::new("id", vec![Cell::Number(1.0), Cell::Number(2.0)]),
            Column::new("note", vec![Cell::Text("a, b".into()), Cell::Missing]),
        ]);
        let bytes = write_csv(&table).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "id,note\n1,\"a, b\"\n2,\n");
    }

    #[test]
    fn test_csv_round_trip() {
        let source = "id,name,score\n1,Ann,3.5\n2,,\n3,\"Lee, Bo\",7\n";
        let table = parse_csv_bytes(source.as_bytes()).unwrap();

        let reparsed = parse_csv_bytes(&write_csv(&table).unwrap()).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn test_artifact_filename() {
        assert_eq!(artifact_filename("a.csv", TargetFormat::Excel), "a.xlsx");
        assert_eq!(artifact_filename("Report.XLSX", TargetFormat::Excel), "Report.xlsx");
        assert_eq!(artifact_filename("Report.XLSX", TargetFormat::Csv), "Report.csv");
        assert_eq!(artifact_filename("my.data.csv", TargetFormat::Excel), "my.data.xlsx");
        assert_eq!(artifact_filename("noext", TargetFormat::Csv), "noext.csv");
    }

    #[test]
    fn test_convert_to_excel() {
        let conversion = convert(
            &numbers(),
            "Numbers.XLSX",
            ConversionRequest { target_format: TargetFormat::Excel },
        )
        .unwrap();

        assert_eq!(conversion.artifact.mime_type, XLSX_MIME);
        assert_eq!(conversion.artifact.filename, "Numbers.xlsx");
        assert!(conversion.primary_error.is_none());

        let parsed = parse_excel_bytes(&conversion.artifact.data).unwrap();
        assert_eq!(parsed, numbers());
    }

    #[test]
    fn test_convert_to_csv() {
        let conversion = convert(
            &numbers(),
            "nums.xlsx",
            ConversionRequest { target_format: TargetFormat::Csv },
        )
        .unwrap();

        assert_eq!(conversion.artifact.mime_type, "text/csv");
        assert_eq!(conversion.artifact.filename, "nums.csv");
        assert_eq!(conversion.artifact.data, b"x,y\n1,0.5\n2,\n".to_vec());
    }

    #[test]
    fn test_fallback_engine_used_when_primary_fails() {
        // Excel caps cell text at 32767 characters; rust_xlsxwriter refuses it.
        let long = "z".repeat(40_000);
        let table = Table::new(vec![Column::new("text", vec![Cell::Text(long.clone())])]);

        let output = write_xlsx(&table).unwrap();
        assert_eq!(output.engine, SpreadsheetEngine::Ooxml);
        assert!(output.primary_error.is_some());

        let parsed = parse_excel_bytes(&output.bytes).unwrap();
        assert_eq!(parsed.columns[0].cells[0], Cell::Text(long));
    }

    #[test]
    fn test_engines_agree() {
        let table = Table::new(vec![
            Column::new("n", vec![Cell::Number(3.0), Cell::Number(-1.25)]),
            Column::new("s", vec![Cell::Text("<tag>".into()), Cell::Text("ü".into())]),
        ]);

        let primary = parse_excel_bytes(&SpreadsheetEngine::XlsxWriter.write(&table).unwrap()).unwrap();
        let fallback = parse_excel_bytes(&SpreadsheetEngine::Ooxml.write(&table).unwrap()).unwrap();
        assert_eq!(primary, fallback);
        assert_eq!(primary, table);
    }

    #[test]
    fn test_engines_agree_on_control_characters() {
        let table = Table::new(vec![Column::new(
            "s",
            vec![Cell::Text("a\u{1}b".into()), Cell::Text("line\nbreak".into())],
        )]);

        let primary = parse_excel_bytes(&SpreadsheetEngine::XlsxWriter.write(&table).unwrap()).unwrap();
        let fallback = parse_excel_bytes(&SpreadsheetEngine::Ooxml.write(&table).unwrap()).unwrap();
        assert_eq!(primary, fallback);
        assert_eq!(fallback.columns[0].cells[0], Cell::Text("a_x0001_b".into()));
    }

    #[test]
    fn test_fallback_failure_is_returned() {
        let long = "z".repeat(40_000);
        let table = Table::new(vec![Column::new("text", vec![Cell::Text(long)])]);

        let err = write_xlsx_with(&table, SpreadsheetEngine::XlsxWriter, SpreadsheetEngine::XlsxWriter)
            .unwrap_err();
        assert!(matches!(err, ExportError::Xlsx(_)));
    }
}
