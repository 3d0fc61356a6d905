use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// In-memory `.xlsx` package. Cell texts that parse as numbers are written
/// as numeric cells, everything else as inline strings; empty texts leave
/// the cell out.
#[derive(Default)]
pub struct XlsxBuilder {
    sheets: Vec<(String, String)>,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet whose rows start at row 1.
    pub fn sheet(self, name: &str, rows: &[&[&str]]) -> Self {
        let numbered = rows.iter().enumerate().map(|(index, cells)| (index + 1, *cells)).collect::<Vec<_>>();
        self.sheet_with_rows(name, &numbered)
    }

    /// Adds a sheet with explicit row numbers, so rows can be skipped.
    pub fn sheet_with_rows(mut self, name: &str, rows: &[(usize, &[&str])]) -> Self {
        let mut xml = String::from(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);
        for (number, cells) in rows {
            xml.push_str(&format!(r#"<row r="{number}">"#));
            for (index, text) in cells.iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                let reference = format!("{}{number}", column_letters(index + 1));
                if text.parse::<f64>().is_ok() {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{text}</v></c>"#));
                } else {
                    xml.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(text)
                    ));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        self.sheets.push((name.to_owned(), xml));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut workbook = String::from(
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut relationships =
            String::from(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let id = index + 1;
            workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#, escape(name)));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
            ));
        }
        workbook.push_str("</sheets></workbook>");
        relationships.push_str("</Relationships>");

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("xl/workbook.xml", options).unwrap();
        writer.write_all(workbook.as_bytes()).unwrap();
        writer.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        writer.write_all(relationships.as_bytes()).unwrap();
        for (index, (_, xml)) in self.sheets.iter().enumerate() {
            writer.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rest = (col - 1) % 26;
        letters.push(b'A' + rest as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Unwraps a whole output stream into plain strings, `None` as `""`.
pub fn plain(rows: Vec<Vec<Option<String>>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
        .collect()
}
