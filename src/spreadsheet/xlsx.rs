use crate::error::ResultMessage;
use crate::error::SheetRowsError;
use crate::helpers::reader::SourceReader;
use crate::helpers::reader::WorkbookSource;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::resolve_number_formats;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::row::Row;
use crate::spreadsheet::SheetDescriptor;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// An opened `.xlsx` workbook. Package metadata, styles and the shared
/// string table are loaded up front; worksheets are streamed on demand.
pub struct Workbook {
    name: String,
    zip: ZipArchive<SourceReader>,
    shared_strings: Vec<String>,
    number_formats: Vec<CellType>,
    sheets: Vec<SheetDescriptor>,
    sheet_paths: Vec<String>,
}

impl Workbook {
    pub fn open(source: impl Into<WorkbookSource>) -> Result<Workbook, SheetRowsError> {
        let source = source.into();
        let name = source.name();
        Self::open_source(source, &name).with_prefix(&name)
    }

    fn open_source(source: WorkbookSource, name: &str) -> Result<Workbook, SheetRowsError> {
        let mut reader = SourceReader::new(source)?;
        if reader.is_compound_file()? {
            Err(SpreadsheetError::PasswordProtected(name.to_owned()))?;
        }

        let mut zip = ZipArchive::new(reader)?;
        let (sheet_entries, is_1904) = load_workbook(&mut zip)?;
        if sheet_entries.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook(name.to_owned()))?;
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        debug!(
            workbook = name,
            sheets = sheet_entries.len(),
            shared_strings = shared_strings.len(),
            is_1904,
            "opened workbook"
        );

        let (sheets, sheet_paths) = sheet_entries
            .into_iter()
            .enumerate()
            .map(|(index, (sheet_name, path))| (SheetDescriptor { name: sheet_name, index }, path))
            .unzip();
        Ok(Workbook {
            name: name.to_owned(),
            zip,
            shared_strings,
            number_formats,
            sheets,
            sheet_paths,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Worksheets in workbook order.
    pub fn sheets(&self) -> &[SheetDescriptor] {
        &self.sheets
    }

    /// Streams the rows of the worksheet at `index`.
    pub fn rows(&mut self, index: usize) -> Result<XlsxRows<'_>, SheetRowsError> {
        let Workbook {
            zip,
            shared_strings,
            number_formats,
            sheet_paths,
            ..
        } = self;
        let path = sheet_paths.get(index).ok_or(SpreadsheetError::SheetIndexOutOfRange {
            index,
            count: sheet_paths.len(),
        })?;
        let reader = zip
            .xml_reader(path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
        Ok(XlsxRows {
            reader,
            shared_strings,
            number_formats,
            row_count: 0,
            finished: false,
        })
    }
}

/// Lazy row sequence of one worksheet. Rows without any populated cell are
/// skipped; dropping the iterator stops reading the worksheet part.
pub struct XlsxRows<'a> {
    reader: XmlReader<BufReader<ZipFile<'a, SourceReader>>>,
    shared_strings: &'a [String],
    number_formats: &'a [CellType],
    row_count: usize,
    finished: bool,
}

impl XlsxRows<'_> {
    fn read_row(&mut self) -> Result<Option<Row>, SheetRowsError> {
        let mut cells = Vec::<Cell>::new();
        let mut number = 0usize;
        let mut col_count = 0usize;
        let mut in_row = false;
        // (row, col, kind, is_shared_string) of the open <c> element
        let mut current: Option<(usize, usize, CellType, bool)> = None;
        let mut value = String::new();
        match_xml_events!(self.reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                number = event.get_attribute_value("r")?
                    .and_then(|r| r.parse::<usize>().ok())
                    .unwrap_or(self.row_count + 1);
                self.row_count = number;
                col_count = 0;
                in_row = true;
                cells.clear();
            }
            Event::End(event) if event.name() == TAG_ROW => {
                in_row = false;
                if !cells.is_empty() {
                    return Ok(Some(Row::new(number, std::mem::take(&mut cells))));
                }
            }
            Event::Start(event) if in_row && event.name() == TAG_CELL => {
                let (row, col) = match event.get_attribute_value("r")? {
                    Some(reference) => reference_to_index(&reference)
                        .ok_or_else(|| SpreadsheetError::InvalidReference(reference.to_string()))?,
                    None => (number, col_count + 1),
                };
                col_count = col;
                let (mut kind, is_shared) = match event.get_attribute_value("t")?.as_deref() {
                    Some("s") => (CellType::String, true),
                    Some("inlineStr") | Some("str") => (CellType::String, false),
                    Some("d") => (CellType::IsoDateTime, false),
                    Some("b") => (CellType::Boolean, false),
                    Some("e") => (CellType::Error, false),
                    _ => (CellType::Number, false),
                };
                if kind == CellType::Number {
                    if let Some(style) = event.get_attribute_value("s")? {
                        let style = style.parse::<usize>()?;
                        kind = self.number_formats.get(style).copied().unwrap_or(CellType::Number);
                    }
                }
                current = Some((row, col, kind, is_shared));
                value.clear();
            }
            Event::Start(event) if current.is_some() && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut self.reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if current.is_some() && event.name() == TAG_VALUE => {
                value = read_string_value(&mut self.reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if let Some((row, col, kind, is_shared)) = current.take() {
                    if is_shared {
                        let index = value.trim().parse::<usize>()?;
                        let text = self.shared_strings
                            .get(index)
                            .ok_or(SpreadsheetError::SharedStringOutOfRange(index))?;
                        value.clone_from(text);
                    }
                    if !value.is_empty() {
                        cells.push(Cell::new(row, col, kind, std::mem::take(&mut value)));
                    }
                }
            }
        });
        Ok(None)
    }
}

impl Iterator for XlsxRows<'_> {
    type Item = Result<Row, SheetRowsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.read_row();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result.transpose()
    }
}

/// Reads worksheet names with their part paths, and whether the workbook uses
/// the 1904 date system.
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), SheetRowsError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::MissingPart("xl/workbook.xml".to_owned()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<String>;
            let mut id = None::<String>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?.to_string());
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?.to_string());
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id) {
                    sheets.push((name, path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Cell type per style index, from `xl/styles.xml`.
fn load_number_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>, is_1904: bool) -> Result<Vec<CellType>, SheetRowsError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(resolve_number_formats(format_indexes, custom_formats, is_1904))
}

fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, SheetRowsError> {
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };
    let mut shared_strings = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`, skipping phonetic runs. With
/// `is_text_content` the element's own text counts, otherwise only `<t>` runs.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetRowsError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="false"/>
<sheets><sheet name="Report" sheetId="1" r:id="rId1"/><sheet name="Notes &amp; more" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

    const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    const STYLES: &str = r#"<styleSheet>
<numFmts count="1"><numFmt numFmtId="164" formatCode="dd.mm.yyyy"/></numFmts>
<cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="2"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<sst count="3" uniqueCount="3">
<si><t>Name</t></si>
<si><r><t>Rich </t></r><r><t>text</t></r><rPh><t>ignored</t></rPh></si>
<si><t xml:space="preserve">  padded </t></si>
</sst>"#;

    const SHEET1: &str = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="inlineStr"><is><t>Inline</t></is></c></row>
<row r="2"><c r="A2" s="1"/><c r="B2" s="2"/></row>
<row r="3"><c r="A3" t="s"><v>1</v></c><c r="B3" s="1"><v>45260</v></c><c r="C3" t="b"><v>1</v></c><c r="D3" s="2"><v>12.5</v></c></row>
<row r="5"><c r="B5" t="e"><v>#DIV/0!</v></c><c r="C5" t="s"><v>2</v></c><c r="D5" t="str"><v>a &lt; b</v></c></row>
</sheetData></worksheet>"#;

    const SHEET2: &str = r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row></sheetData></worksheet>"#;

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn workbook() -> Workbook {
        Workbook::open(package(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]))
        .unwrap()
    }

    fn texts(row: &Row) -> Vec<(String, String)> {
        row.cells().map(|cell| (cell.address(), cell.text())).collect()
    }

    #[test]
    fn test_sheets_in_workbook_order() {
        let workbook = workbook();
        let sheets = workbook.sheets();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0], SheetDescriptor { name: "Report".to_owned(), index: 0 });
        assert_eq!(sheets[1], SheetDescriptor { name: "Notes & more".to_owned(), index: 1 });
    }

    #[test]
    fn test_rows_are_streamed_with_rendered_text() {
        let mut workbook = workbook();
        let rows = workbook.rows(0).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        // row 2 holds only empty styled cells
        assert_eq!(rows.iter().map(|row| row.number).collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(texts(&rows[0]), vec![
            ("A1".to_owned(), "Name".to_owned()),
            ("C1".to_owned(), "Inline".to_owned()),
        ]);
        assert_eq!(texts(&rows[1]), vec![
            ("A3".to_owned(), "Rich text".to_owned()),
            ("B3".to_owned(), "2023-11-30".to_owned()),
            ("C3".to_owned(), "true".to_owned()),
            ("D3".to_owned(), "12.5".to_owned()),
        ]);
        assert_eq!(texts(&rows[2]), vec![
            ("B5".to_owned(), "#DIV/0!".to_owned()),
            ("C5".to_owned(), "  padded ".to_owned()),
            ("D5".to_owned(), "a < b".to_owned()),
        ]);
        assert_eq!(rows[1].cell_at(4).and_then(|cell| cell.to_double()), Some(12.5));
    }

    #[test]
    fn test_rows_without_references() {
        let mut workbook = workbook();
        let rows = workbook.rows(1).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(texts(&rows[0]), vec![
            ("A1".to_owned(), "1".to_owned()),
            ("B1".to_owned(), "2".to_owned()),
        ]);
    }

    #[test]
    fn test_sheet_index_out_of_range() {
        let mut workbook = workbook();
        assert!(workbook.rows(2).is_err());
    }

    #[test]
    fn test_reading_can_stop_early() {
        let mut workbook = workbook();
        let first = workbook.rows(0).unwrap().next().unwrap().unwrap();
        assert_eq!(first.number, 1);
        // the archive is usable again once the first stream is dropped
        assert_eq!(workbook.rows(1).unwrap().count(), 1);
    }

    #[test]
    fn test_broken_shared_string_index_fuses_stream() {
        let mut workbook = Workbook::open(package(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/worksheets/sheet1.xml", r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>7</v></c></row><row r="2"><c r="A2"><v>1</v></c></row></sheetData></worksheet>"#),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]))
        .unwrap();
        let mut rows = workbook.rows(0).unwrap();
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_open_rejects_non_workbooks() {
        assert!(Workbook::open(b"not a zip".to_vec()).is_err());
        assert!(Workbook::open(package(&[("docProps/app.xml", "<Properties/>")])).is_err());
        let empty = package(&[
            ("xl/workbook.xml", "<workbook><sheets/></workbook>"),
            ("xl/_rels/workbook.xml.rels", "<Relationships/>"),
        ]);
        let error = Workbook::open(empty).err().unwrap();
        assert!(error.to_string().contains("no worksheets"), "{error}");
    }
}
