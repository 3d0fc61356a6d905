//! # Sheet Configuration
//!
//! Declarative rules that say where data sits in a worksheet: which rows hold
//! preamble assertions and head fields, which row is the header, and how each
//! output column is found and computed. Callbacks are shared `Arc` closures so
//! one [`GlobalConfig`] can drive any number of sheets, also in parallel.
use crate::spreadsheet::{Cell, ColumnKey, Row};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) mod binder;
pub mod file;

pub use binder::bind;

pub type CellToString = Arc<dyn Fn(&Cell) -> String + Send + Sync>;
/// Maps a worksheet name to the name of the [`SheetConfig`] to use.
pub type SheetConfigSelector = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type AssertFn = Arc<dyn Fn(&Cell) -> bool + Send + Sync>;
pub type HeadFieldFn = Arc<dyn Fn(&Cell) -> Option<String> + Send + Sync>;
/// Accepts or rejects the text of a header cell.
pub type HeaderNameTest = Arc<dyn Fn(&str) -> bool + Send + Sync>;
/// Computes one output value of a data row.
pub type ValueFn = Arc<dyn Fn(&ValueContext<'_>) -> Option<String> + Send + Sync>;
/// Decides whether a fully projected row is emitted.
pub type RowsFilter = Arc<dyn Fn(&[Option<String>]) -> bool + Send + Sync>;

/// Renders a cell the default way: its display text, or `""` when absent.
pub fn default_cell_text(cell: Option<&Cell>) -> String {
    cell.map(Cell::text).unwrap_or_default()
}

/// Configuration of a whole parse. Immutable while sheets are streamed.
#[derive(Clone, Default)]
pub struct GlobalConfig {
    pub sheet_configs: Vec<SheetConfig>,
    pub sheet_config_selector: Option<SheetConfigSelector>,
    /// Replaces [`default_cell_text`] wherever a cell is turned into text
    pub cell_to_string: Option<CellToString>,
}

impl GlobalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sheet(mut self, sheet_config: SheetConfig) -> Self {
        self.sheet_configs.push(sheet_config);
        self
    }

    #[must_use]
    pub fn with_selector(mut self, selector: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.sheet_config_selector = Some(Arc::new(selector));
        self
    }

    #[must_use]
    pub fn with_cell_to_string(mut self, cell_to_string: impl Fn(&Cell) -> String + Send + Sync + 'static) -> Self {
        self.cell_to_string = Some(Arc::new(cell_to_string));
        self
    }

    /// Text of a possibly absent cell. Absent cells are always `""`.
    pub fn cell_text(&self, cell: Option<&Cell>) -> String {
        match (cell, &self.cell_to_string) {
            (Some(cell), Some(cell_to_string)) => cell_to_string(cell),
            (cell, _) => default_cell_text(cell),
        }
    }
}

/// Rules for one worksheet.
#[derive(Clone)]
pub struct SheetConfig {
    /// Sheet name this config applies to, or the key returned by the selector
    pub name: Option<String>,
    /// Zero-based sheet index this config applies to
    pub sheet_index: Option<usize>,
    /// 1-based number of the header row
    pub header_row: usize,
    pub asserts: Vec<AssertRule>,
    pub head_fields: Vec<HeadFieldRule>,
    /// Output columns; derived from the header row when `None`
    pub headers: Option<Vec<HeaderRule>>,
    pub rows_filter: Option<RowsFilter>,
}

impl SheetConfig {
    /// Config with no rules and the header on row 1.
    pub const EMPTY: SheetConfig = SheetConfig {
        name: None,
        sheet_index: None,
        header_row: 1,
        asserts: Vec::new(),
        head_fields: Vec::new(),
        headers: None,
        rows_filter: None,
    };

    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Config bound to a sheet (or selector key) by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::EMPTY
        }
    }

    /// Config bound to a sheet by zero-based index.
    pub fn for_index(sheet_index: usize) -> Self {
        Self {
            sheet_index: Some(sheet_index),
            ..Self::EMPTY
        }
    }

    #[must_use]
    pub fn with_header_row(mut self, header_row: usize) -> Self {
        self.header_row = header_row;
        self
    }

    #[must_use]
    pub fn with_assert(mut self, rule: AssertRule) -> Self {
        self.asserts.push(rule);
        self
    }

    #[must_use]
    pub fn with_head_field(mut self, rule: HeadFieldRule) -> Self {
        self.head_fields.push(rule);
        self
    }

    /// Appends an output column.
    #[must_use]
    pub fn with_header(mut self, rule: impl Into<HeaderRule>) -> Self {
        self.headers.get_or_insert_with(Vec::new).push(rule.into());
        self
    }

    #[must_use]
    pub fn with_rows_filter(mut self, filter: impl Fn(&[Option<String>]) -> bool + Send + Sync + 'static) -> Self {
        self.rows_filter = Some(Arc::new(filter));
        self
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("sheet_configs", &self.sheet_configs)
            .field("has_selector", &self.sheet_config_selector.is_some())
            .field("has_cell_to_string", &self.cell_to_string.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SheetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetConfig")
            .field("name", &self.name)
            .field("sheet_index", &self.sheet_index)
            .field("header_row", &self.header_row)
            .field("asserts", &self.asserts.len())
            .field("head_fields", &self.head_fields.len())
            .field("headers", &self.headers.as_ref().map(|rules| rules.iter().map(HeaderRule::name).collect::<Vec<_>>()))
            .field("has_rows_filter", &self.rows_filter.is_some())
            .finish_non_exhaustive()
    }
}

/// Structural check on a cell at or above the header row. Fires once, when
/// row `row_num` is read; an absent cell skips the check.
#[derive(Clone)]
pub struct AssertRule {
    pub name: String,
    pub column_key: ColumnKey,
    pub row_num: usize,
    pub assert: AssertFn,
}

impl AssertRule {
    pub fn new(
        name: impl Into<String>,
        column_key: impl Into<ColumnKey>,
        row_num: usize,
        assert: impl Fn(&Cell) -> bool + Send + Sync + 'static,
    ) -> Self {
        AssertRule {
            name: name.into(),
            column_key: column_key.into(),
            row_num,
            assert: Arc::new(assert),
        }
    }
}

/// Named scalar read from a cell above the header row.
#[derive(Clone)]
pub struct HeadFieldRule {
    pub name: String,
    pub column_key: ColumnKey,
    pub row_num: usize,
    /// Defaults to the configured cell text
    pub value: Option<HeadFieldFn>,
}

impl HeadFieldRule {
    pub fn new(name: impl Into<String>, column_key: impl Into<ColumnKey>, row_num: usize) -> Self {
        HeadFieldRule {
            name: name.into(),
            column_key: column_key.into(),
            row_num,
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Fn(&Cell) -> Option<String> + Send + Sync + 'static) -> Self {
        self.value = Some(Arc::new(value));
        self
    }
}

/// One output column.
#[derive(Clone)]
pub enum HeaderRule {
    /// Bound to a source column
    Actual(ActualHeader),
    /// Computed from the row and the head fields only
    Virtual(VirtualHeader),
}

impl HeaderRule {
    /// Configured output name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            HeaderRule::Actual(header) => header.name.as_deref(),
            HeaderRule::Virtual(header) => Some(&header.name),
        }
    }
}

/// Output column read from a source column. The column is given by
/// `column_key`, or searched in the header row with `header_name_test`,
/// falling back to an exact match on `name`.
#[derive(Clone, Default)]
pub struct ActualHeader {
    pub name: Option<String>,
    pub column_key: Option<ColumnKey>,
    pub header_name_test: Option<HeaderNameTest>,
    pub value: Option<ValueFn>,
}

impl ActualHeader {
    /// Column at a fixed key; the sheet's own label is the output name.
    pub fn at(column_key: impl Into<ColumnKey>) -> Self {
        ActualHeader {
            column_key: Some(column_key.into()),
            ..Self::default()
        }
    }

    /// Column found by its header label.
    pub fn named(name: impl Into<String>) -> Self {
        ActualHeader {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_column_key(mut self, column_key: impl Into<ColumnKey>) -> Self {
        self.column_key = Some(column_key.into());
        self
    }

    #[must_use]
    pub fn with_header_test(mut self, test: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.header_name_test = Some(Arc::new(test));
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Fn(&ValueContext<'_>) -> Option<String> + Send + Sync + 'static) -> Self {
        self.value = Some(Arc::new(value));
        self
    }

    /// Same as [`ActualHeader::with_value`] for an already shared closure.
    #[must_use]
    pub fn with_value_fn(mut self, value: ValueFn) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Clone)]
pub struct VirtualHeader {
    pub name: String,
    pub value: ValueFn,
}

impl VirtualHeader {
    pub fn new(
        name: impl Into<String>,
        value: impl Fn(&ValueContext<'_>) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        VirtualHeader {
            name: name.into(),
            value: Arc::new(value),
        }
    }

    pub fn from_fn(name: impl Into<String>, value: ValueFn) -> Self {
        VirtualHeader {
            name: name.into(),
            value,
        }
    }
}

impl From<ActualHeader> for HeaderRule {
    fn from(header: ActualHeader) -> Self {
        HeaderRule::Actual(header)
    }
}

impl From<VirtualHeader> for HeaderRule {
    fn from(header: VirtualHeader) -> Self {
        HeaderRule::Virtual(header)
    }
}

/// Head field values of one sheet. Filled while the preamble is read and
/// only handed out by shared reference afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadFields {
    fields: HashMap<String, String>,
}

impl HeadFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.fields.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Overwrites `name`; a `None` value clears it.
    pub(crate) fn set(&mut self, name: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.fields.insert(name.to_owned(), value);
            }
            None => {
                self.fields.remove(name);
            }
        }
    }
}

/// What a value transform sees for one output slot of one data row.
pub struct ValueContext<'a> {
    /// Name of the worksheet being streamed
    pub sheet_name: &'a str,
    /// Source cell of an actual column; `None` for virtual columns and empty cells
    pub cell: Option<&'a Cell>,
    pub row: &'a Row,
    pub head_fields: &'a HeadFields,
    /// Header cell text matched by an actual column, or the name of a virtual one
    pub header_name: &'a str,
}
