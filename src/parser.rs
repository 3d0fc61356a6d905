use crate::config::GlobalConfig;
use crate::engine::SheetRows;
use crate::engine::OutputRow;
use crate::error::SheetRowsError;
use crate::helpers::reader::WorkbookSource;
use crate::spreadsheet::{Row, SheetDescriptor, Workbook, XlsxRows};
use std::str::FromStr;
use tracing::debug;

/// Entry point: owns a [`GlobalConfig`] and opens workbooks with it.
#[derive(Clone, Default)]
pub struct SheetParser {
    config: GlobalConfig,
}

impl SheetParser {
    pub fn new(config: GlobalConfig) -> Self {
        SheetParser { config }
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Opens a workbook. Sheets are read only when requested.
    pub fn open_workbook(&self, source: impl Into<WorkbookSource>) -> Result<WorkbookRows<'_>, SheetRowsError> {
        Ok(WorkbookRows {
            config: &self.config,
            workbook: Workbook::open(source)?,
            next_index: 0,
        })
    }

    /// Output rows of a sheet whose raw rows come from somewhere else.
    pub fn sheet_rows<I>(&self, sheet_name: &str, sheet_index: usize, rows: I) -> SheetRows<'_, I>
    where
        I: Iterator<Item = Result<Row, SheetRowsError>>,
    {
        SheetRows::new(sheet_name, sheet_index, &self.config, rows)
    }
}

/// The sheets of an opened workbook, one active stream at a time.
pub struct WorkbookRows<'c> {
    config: &'c GlobalConfig,
    workbook: Workbook,
    next_index: usize,
}

impl<'c> WorkbookRows<'c> {
    pub fn workbook_name(&self) -> &str {
        self.workbook.name()
    }

    pub fn sheets(&self) -> &[SheetDescriptor] {
        self.workbook.sheets()
    }

    /// Stream of the next sheet in workbook order, or `None` after the last.
    /// The previous stream must be dropped first.
    pub fn next_sheet(&mut self) -> Option<Result<SheetStream<'_>, SheetRowsError>> {
        if self.next_index >= self.workbook.sheets().len() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(self.sheet(index))
    }

    /// Stream of the first sheet the selector accepts.
    pub fn find_sheet(&mut self, selector: &SheetSelector) -> Result<Option<SheetStream<'_>>, SheetRowsError> {
        let found = self
            .workbook
            .sheets()
            .iter()
            .find(|sheet| selector.matches(sheet))
            .map(|sheet| sheet.index);
        match found {
            Some(index) => self.sheet(index).map(Some),
            None => {
                debug!(workbook = self.workbook.name(), selector = %selector, "no sheet matched");
                Ok(None)
            }
        }
    }

    /// Stream of the sheet at `index`.
    pub fn sheet(&mut self, index: usize) -> Result<SheetStream<'_>, SheetRowsError> {
        let config = self.config;
        let sheet_name = self
            .workbook
            .sheets()
            .get(index)
            .map(|sheet| sheet.name.clone())
            .unwrap_or_default();
        let rows = self.workbook.rows(index)?;
        debug!(sheet = %sheet_name, index, "streaming sheet");
        Ok(SheetStream {
            rows: SheetRows::new(sheet_name.clone(), index, config, rows),
            sheet_name,
            sheet_index: index,
        })
    }
}

/// Output rows of one worksheet together with its identity.
pub struct SheetStream<'a> {
    pub sheet_name: String,
    pub sheet_index: usize,
    pub rows: SheetRows<'a, XlsxRows<'a>>,
}

impl Iterator for SheetStream<'_> {
    type Item = Result<OutputRow, SheetRowsError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// Chooses one sheet of a workbook.
#[derive(Clone, Debug, Default)]
pub enum SheetSelector {
    #[default]
    First,
    Name(String),
    /// Zero-based position
    Index(usize),
    Pattern(glob::Pattern),
}

impl SheetSelector {
    /// Parses `text` against the sheets of a workbook: a sheet named exactly
    /// `text` wins, so a sheet called `2024` is not mistaken for an index.
    pub fn parse_for(text: &str, sheets: &[SheetDescriptor]) -> Result<Self, glob::PatternError> {
        if sheets.iter().any(|sheet| sheet.name == text) {
            Ok(SheetSelector::Name(text.to_owned()))
        } else {
            text.parse()
        }
    }

    pub fn matches(&self, sheet: &SheetDescriptor) -> bool {
        match self {
            SheetSelector::First => true,
            SheetSelector::Name(name) => &sheet.name == name,
            SheetSelector::Index(index) => sheet.index == *index,
            SheetSelector::Pattern(pattern) => pattern.matches(&sheet.name),
        }
    }
}

impl FromStr for SheetSelector {
    type Err = glob::PatternError;

    /// Digits select by index, glob syntax by pattern, anything else by name.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = text.parse::<usize>() {
            Ok(SheetSelector::Index(index))
        } else if text.contains(['*', '?', '[']) {
            Ok(SheetSelector::Pattern(glob::Pattern::new(text)?))
        } else {
            Ok(SheetSelector::Name(text.to_owned()))
        }
    }
}

impl std::fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetSelector::First => f.write_str("first sheet"),
            SheetSelector::Name(name) => write!(f, "sheet \"{name}\""),
            SheetSelector::Index(index) => write!(f, "sheet #{index}"),
            SheetSelector::Pattern(pattern) => write!(f, "sheet matching \"{pattern}\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, index: usize) -> SheetDescriptor {
        SheetDescriptor {
            name: name.to_owned(),
            index,
        }
    }

    #[test]
    fn test_selector_from_str() {
        assert!(matches!("2".parse::<SheetSelector>(), Ok(SheetSelector::Index(2))));
        assert!(matches!("Report".parse::<SheetSelector>(), Ok(SheetSelector::Name(ref name)) if name == "Report"));
        assert!(matches!("2024-*".parse::<SheetSelector>(), Ok(SheetSelector::Pattern(_))));
        assert!("[".parse::<SheetSelector>().is_err());
    }

    #[test]
    fn test_exact_sheet_name_beats_index() {
        let sheets = vec![descriptor("Summary", 0), descriptor("2024", 1), descriptor("[draft]", 2)];
        assert!(matches!(
            SheetSelector::parse_for("2024", &sheets),
            Ok(SheetSelector::Name(ref name)) if name == "2024"
        ));
        assert!(matches!(SheetSelector::parse_for("1", &sheets), Ok(SheetSelector::Index(1))));
        assert!(matches!(
            SheetSelector::parse_for("[draft]", &sheets),
            Ok(SheetSelector::Name(ref name)) if name == "[draft]"
        ));
        assert!(matches!(SheetSelector::parse_for("Sum*", &sheets), Ok(SheetSelector::Pattern(_))));
    }

    #[test]
    fn test_selector_matches() {
        let sheet = descriptor("2024-03", 1);
        assert!(SheetSelector::First.matches(&sheet));
        assert!(SheetSelector::Index(1).matches(&sheet));
        assert!(!SheetSelector::Index(0).matches(&sheet));
        assert!(SheetSelector::Name("2024-03".to_owned()).matches(&sheet));
        assert!("2024-*".parse::<SheetSelector>().unwrap().matches(&sheet));
        assert!(!"2023-*".parse::<SheetSelector>().unwrap().matches(&sheet));
    }

    #[test]
    fn test_parser_over_custom_rows() {
        let parser = SheetParser::default();
        let rows = vec![Ok(Row::from_texts(1, &["A"])), Ok(Row::from_texts(2, &["x"]))];
        let output = parser
            .sheet_rows("Custom", 0, rows.into_iter())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(output, vec![vec![Some("A".to_owned())], vec![Some("x".to_owned())]]);
    }
}
