//! Minimal OOXML workbook writer.
//!
//! Builds the package by hand: one worksheet, a shared string table and a
//! default stylesheet, zipped with the `zip` crate. Used as the fallback
//! spreadsheet engine.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{XLSX_MAX_COLS, XLSX_MAX_ROWS};
use crate::error::{ExportError, ExportResult};
use crate::models::{Cell, Table};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const CONTENT_TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

/// Serialize `table` as an XLSX workbook with a single `Sheet1`.
pub fn write_workbook(table: &Table) -> ExportResult<Vec<u8>> {
    let rows = table.row_count() + 1;
    let cols = table.column_count();
    if rows > XLSX_MAX_ROWS || cols > XLSX_MAX_COLS {
        return Err(ExportError::TooLarge { rows, cols });
    }

    let mut strings = SharedStrings::default();
    let sheet = worksheet_xml(table, &mut strings);

    let parts: [(&str, String); 7] = [
        ("[Content_Types].xml", format!("{XML_DECL}{CONTENT_TYPES}")),
        (
            "_rels/.rels",
            format!(
                r#"{XML_DECL}<Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
            ),
        ),
        (
            "xl/workbook.xml",
            format!(
                r#"{XML_DECL}<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            format!(
                r#"{XML_DECL}<Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/><Relationship Id="rId3" Type="{REL_NS}/styles" Target="styles.xml"/></Relationships>"#
            ),
        ),
        (
            "xl/styles.xml",
            format!(
                r#"{XML_DECL}<styleSheet xmlns="{MAIN_NS}"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#
            ),
        ),
        ("xl/sharedStrings.xml", strings.to_xml()),
        ("xl/worksheets/sheet1.xml", sheet),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, body) in parts {
        zip.start_file(path, options)?;
        zip.write_all(body.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

fn worksheet_xml(table: &Table, strings: &mut SharedStrings) -> String {
    let mut xml = format!(r#"{XML_DECL}<worksheet xmlns="{MAIN_NS}"><sheetData>"#);

    xml.push_str(r#"<row r="1">"#);
    for (col, column) in table.columns.iter().enumerate() {
        let idx = strings.intern(&column.name);
        let _ = write!(xml, r#"<c r="{}1" t="s"><v>{}</v></c>"#, column_letters(col), idx);
    }
    xml.push_str("</row>");

    for row in 0..table.row_count() {
        let r = row + 2;
        let _ = write!(xml, r#"<row r="{}">"#, r);
        for (col, cell) in table.row(row).enumerate() {
            let reference = format!("{}{}", column_letters(col), r);
            match cell {
                Cell::Number(n) if n.is_finite() => {
                    let _ = write!(xml, r#"<c r="{}"><v>{}</v></c>"#, reference, n);
                }
                Cell::Number(n) => {
                    let idx = strings.intern(&n.to_string());
                    let _ = write!(xml, r#"<c r="{}" t="s"><v>{}</v></c>"#, reference, idx);
                }
                Cell::Text(s) => {
                    let idx = strings.intern(s);
                    let _ = write!(xml, r#"<c r="{}" t="s"><v>{}</v></c>"#, reference, idx);
                }
                Cell::Missing => {}
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Shared string table, deduplicated in first-seen order.
#[derive(Default)]
struct SharedStrings {
    order: Vec<String>,
    lookup: HashMap<String, usize>,
    count: usize,
}

impl SharedStrings {
    fn intern(&mut self, value: &str) -> usize {
        self.count += 1;
        if let Some(&idx) = self.lookup.get(value) {
            return idx;
        }
        let idx = self.order.len();
        self.order.push(value.to_string());
        self.lookup.insert(value.to_string(), idx);
        idx
    }

    fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}<sst xmlns="{MAIN_NS}" count="{}" uniqueCount="{}">"#,
            self.count,
            self.order.len()
        );
        for s in &self.order {
            let _ = write!(xml, r#"<si><t xml:space="preserve">{}</t></si>"#, escape_xml(s));
        }
        xml.push_str("</sst>");
        xml
    }
}

/// Spreadsheet column name for a 0-based index: 0 -> A, 25 -> Z, 26 -> AA.
pub(crate) fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Escape XML text. Control characters XML 1.0 cannot carry are written as
/// `_xHHHH_`, the same form `rust_xlsxwriter` uses.
fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "_x{:04X}_", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use crate::parser::parse_excel_bytes;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(51), "AZ");
        assert_eq!(column_letters(52), "BA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\">"), "a&lt;b &amp; &quot;c&quot;&gt;");
        assert_eq!(escape_xml("bell\u{7}"), "bell_x0007_");
        assert_eq!(escape_xml("a\u{1}b\u{1f}"), "a_x0001_b_x001F_");
        assert_eq!(escape_xml("tab\there\n"), "tab\there\n");
    }

    #[test]
    fn test_shared_strings_dedupe() {
        let mut strings = SharedStrings::default();
        assert_eq!(strings.intern("x"), 0);
        assert_eq!(strings.intern("y"), 1);
        assert_eq!(strings.intern("x"), 0);
        let xml = strings.to_xml();
        assert!(xml.contains(r#"count="3" uniqueCount="2""#));
    }

    #[test]
    fn test_workbook_reads_back() {
        let table = Table::new(vec![
            Column::new("id", vec![Cell::Number(1.0), Cell::Number(2.5)]),
            Column::new("name", vec![Cell::Text("Tom & Jerry".into()), Cell::Missing]),
        ]);

        let bytes = write_workbook(&table).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let parsed = parse_excel_bytes(&bytes).unwrap();
        assert_eq!(parsed.column_names(), vec!["id", "name"]);
        assert_eq!(parsed.columns[0].cells, table.columns[0].cells);
        assert_eq!(parsed.columns[1].cells[0], Cell::Text("Tom & Jerry".into()));
        assert_eq!(parsed.row_count(), 2);
    }
}
