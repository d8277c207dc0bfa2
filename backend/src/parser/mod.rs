//! Format detection and parsing of uploaded files into a [`Table`].
//!
//! CSV input is decoded with encoding auto-detection and read as
//! comma-separated text with a header row. Excel input is read from the
//! first worksheet with `calamine`, first row as header.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, XlsxError};
use std::io::Cursor;
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::models::{Cell, Column, FileFormat, Table, UploadedFile};

/// Spellings read as a missing value.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na_token(value: &str) -> bool {
    NA_TOKENS.contains(&value)
}

// =============================================================================
// Format detection
// =============================================================================

/// Lower-cased extension of a file name, including the dot (`".csv"`).
/// Empty when the name has no extension.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Detect the format from a file name suffix.
pub fn detect_format(name: &str) -> ParseResult<FileFormat> {
    match file_extension(name).as_str() {
        ".csv" => Ok(FileFormat::Csv),
        ".xlsx" => Ok(FileFormat::Excel),
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Detect the encoding of raw bytes. Valid UTF-8 wins; otherwise chardet guesses.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        // Not valid UTF-8, so a UTF-8/ASCII guess is wrong: assume Western.
        "" | "ascii" | "utf-8" | "utf8" => "windows-1252".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding, stripping a leading BOM.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

// =============================================================================
// Headers
// =============================================================================

/// Name blank headers `Unnamed: <i>` and suffix repeats with `.1`, `.2`, ...
fn normalize_headers<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut names: Vec<String> = Vec::new();

    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while names.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        names.push(candidate);
    }

    names
}

// =============================================================================
// CSV
// =============================================================================

/// Parse CSV text into a table.
///
/// Short rows are padded with missing cells; a row with more fields than the
/// header is an error.
pub fn parse_csv_str(content: &str) -> ParseResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ParseError::Empty);
    }
    let names = normalize_headers(headers.iter().map(str::to_string));
    let width = names.len();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for record in reader.records() {
        let record = record?;
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(ParseError::Csv {
                line,
                message: format!("Expected {} fields, saw {}", width, record.len()),
            });
        }
        for (col, values) in raw.iter_mut().enumerate() {
            let value = record.get(col).filter(|v| !is_na_token(v));
            values.push(value.map(str::to_string));
        }
    }

    let columns = names
        .into_iter()
        .zip(raw)
        .map(|(name, values)| csv_column(name, values))
        .collect();

    Ok(Table::new(columns))
}

/// Numeric when every present value parses as a number; otherwise text verbatim.
fn csv_column(name: String, values: Vec<Option<String>>) -> Column {
    let numbers: Option<Vec<Cell>> = values
        .iter()
        .map(|v| match v {
            None => Some(Cell::Missing),
            Some(s) => s.trim().parse::<f64>().ok().map(Cell::Number),
        })
        .collect();

    let cells = numbers.unwrap_or_else(|| {
        values
            .into_iter()
            .map(|v| v.map(Cell::Text).unwrap_or(Cell::Missing))
            .collect()
    });

    Column::new(name, cells)
}

/// Parse CSV bytes, detecting the encoding first.
pub fn parse_csv_bytes(bytes: &[u8]) -> ParseResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_csv_str(&content)
}

// =============================================================================
// Excel
// =============================================================================

/// Parse the first worksheet of an XLSX workbook.
pub fn parse_excel_bytes(bytes: &[u8]) -> ParseResult<Table> {
    let mut workbook: Xlsx<Cursor<&[u8]>> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: XlsxError| ParseError::Excel(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)?
        .map_err(|e| ParseError::Excel(e.to_string()))?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(ParseError::Empty)?;
    let names = normalize_headers(header.iter().map(|c| match c {
        Data::Empty => String::new(),
        other => other.to_string(),
    }));

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (col, values) in cells.iter_mut().enumerate() {
            values.push(row.get(col).map(excel_cell).unwrap_or(Cell::Missing));
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column::new(name, cells))
        .collect();

    Ok(Table::new(columns))
}

fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Empty => Cell::Missing,
        Data::String(s) if is_na_token(s) => Cell::Missing,
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Parse bytes in a known format.
pub fn parse_bytes(bytes: &[u8], format: FileFormat) -> ParseResult<Table> {
    match format {
        FileFormat::Csv => parse_csv_bytes(bytes),
        FileFormat::Excel => parse_excel_bytes(bytes),
    }
}

/// Detect the format of an upload from its name and parse it.
pub fn parse_upload(file: &UploadedFile) -> ParseResult<(FileFormat, Table)> {
    let format = detect_format(&file.name)?;
    let table = parse_bytes(&file.bytes, format)?;
    Ok((format, table))
}

/// Read and parse a file from disk.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Table> {
    let file = UploadedFile::from_path(path.as_ref())?;
    parse_upload(&file).map(|(_, table)| table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnKind;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("a.csv").unwrap(), FileFormat::Csv);
        assert_eq!(detect_format("report.XLSX").unwrap(), FileFormat::Excel);
        assert_eq!(detect_format("archive.tar.csv").unwrap(), FileFormat::Csv);

        let err = detect_format("notes.txt").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: .txt");
        assert!(detect_format("README").is_err());
        assert!(detect_format("old.xls").is_err());
    }

    #[test]
    fn test_simple_csv() {
        let table = parse_csv_str("name,age\nAlice,30\nBob,25").unwrap();

        assert_eq!(table.column_names(), vec!["name", "age"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].kind, ColumnKind::Text);
        assert_eq!(table.columns[1].kind, ColumnKind::Numeric);
        assert_eq!(table.columns[1].cells, vec![Cell::Number(30.0), Cell::Number(25.0)]);
    }

    #[test]
    fn test_quoted_values() {
        let table = parse_csv_str("name,value\n\"Smith, J\",\"Hello \"\"World\"\"\"").unwrap();
        assert_eq!(table.columns[0].cells[0], Cell::Text("Smith, J".into()));
        assert_eq!(table.columns[1].cells[0], Cell::Text("Hello \"World\"".into()));
    }

    #[test]
    fn test_missing_values() {
        let table = parse_csv_str("id,val\n1,10\n1,10\n2,").unwrap();
        assert_eq!(
            table.column("val").unwrap().cells,
            vec![Cell::Number(10.0), Cell::Number(10.0), Cell::Missing]
        );
        assert!(table.column("val").unwrap().is_numeric());
    }

    #[test]
    fn test_na_tokens() {
        let table = parse_csv_str("a,b\nNA,x\n3,NULL\nnan,n/a").unwrap();
        assert_eq!(
            table.columns[0].cells,
            vec![Cell::Missing, Cell::Number(3.0), Cell::Missing]
        );
        assert_eq!(
            table.columns[1].cells,
            vec![Cell::Text("x".into()), Cell::Missing, Cell::Missing]
        );
    }

    #[test]
    fn test_mixed_column_stays_text() {
        let table = parse_csv_str("code\n1\nA2\n3").unwrap();
        assert_eq!(table.columns[0].kind, ColumnKind::Text);
        assert_eq!(table.columns[0].cells[0], Cell::Text("1".into()));
    }

    #[test]
    fn test_short_rows_padded() {
        let table = parse_csv_str("a,b,c\n1,2").unwrap();
        assert_eq!(table.columns[2].cells, vec![Cell::Missing]);
    }

    #[test]
    fn test_long_row_rejected() {
        let err = parse_csv_str("a,b\n1,2\n3,4,5\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "{msg}");
        assert!(msg.contains("Expected 2 fields, saw 3"), "{msg}");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv_str("a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv_str(""), Err(ParseError::Empty)));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = parse_csv_str("a,b\n").unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_header_normalization() {
        let table = parse_csv_str(",a,a,a\n1,2,3,4").unwrap();
        assert_eq!(table.column_names(), vec!["Unnamed: 0", "a", "a.1", "a.2"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
        assert_ne!(detect_encoding(bytes), "utf-8");
    }

    #[test]
    fn test_non_utf8_csv_still_parses() {
        let mut bytes = b"nom\nSoci".to_vec();
        bytes.extend_from_slice(&[0xE9, 0x74, 0xE9]);

        let table = parse_csv_bytes(&bytes).unwrap();
        assert_eq!(table.row_count(), 1);
        match &table.columns[0].cells[0] {
            Cell::Text(s) => assert!(s.starts_with("Soci")),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = b"\xEF\xBB\xBFid\n1".to_vec();
        let table = parse_csv_bytes(&bytes).unwrap();
        assert_eq!(table.column_names(), vec!["id"]);
    }

    #[test]
    fn test_invalid_excel() {
        let err = parse_excel_bytes(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, ParseError::Excel(_)));
    }

    #[test]
    fn test_parse_upload_unsupported_skips_parsing() {
        let file = UploadedFile::new("data.json", b"{}".to_vec());
        assert!(matches!(parse_upload(&file), Err(ParseError::UnsupportedFormat(_))));
    }
}
