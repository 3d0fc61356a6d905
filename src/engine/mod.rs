//! # Row Stream Engine
//!
//! Turns the raw rows of one worksheet into output rows. The engine walks
//! three phases keyed on the row number:
//!
//! - rows above the header row are the preamble: assertions run and head
//!   fields are collected;
//! - the header row is checked, its columns are resolved once and its labels
//!   are emitted as the first output row;
//! - every later row is projected through the header rules and filtered.
//!
//! The first error ends the stream.
use crate::config::bind;
use crate::config::GlobalConfig;
use crate::config::HeadFields;
use crate::config::HeaderRule;
use crate::config::SheetConfig;
use crate::error::SheetRowsError;
use crate::spreadsheet::Row;
use std::borrow::Cow;
use thiserror::Error;
use tracing::{debug, trace};

pub(crate) mod header;
pub(crate) mod preamble;
pub(crate) mod projector;

pub use header::ResolvedColumn;

use header::{derive_headers, header_labels, resolve_columns};
use preamble::PreambleScanner;
use projector::project_row;

/// Values of one output row, one slot per header rule.
pub type OutputRow = Vec<Option<String>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Assertion \"{name}\" at cell {address} failed")]
    AssertionFailure { name: String, address: String },

    #[error("[{sheet}] Column \"{header}\" not found in sheet \"{sheet}\"")]
    ColumnNotFound { sheet: String, header: String },

    #[error("[{sheet}] \"{header}\" header mapping is not correct")]
    HeaderMismatch { sheet: String, header: String },

    #[error("[{sheet}] Header cell at column={column} should not be empty or have implicit name in config")]
    EmptyHeader { sheet: String, column: usize },

    #[error("[{sheet}] No headers config for row {row}")]
    MissingHeaderConfig { sheet: String, row: usize },

    #[error("[{sheet}] Header #{slot} needs a column key, a header name test or a name")]
    ConfigurationGap { sheet: String, slot: usize },

    #[error("[{sheet}] Invalid column key '{key}' in rule \"{rule}\"")]
    InvalidColumnKey { sheet: String, rule: String, key: String },
}

enum Phase<'c> {
    Preamble(PreambleScanner<'c>),
    Data {
        rules: Cow<'c, [HeaderRule]>,
        columns: Vec<Option<ResolvedColumn>>,
        head_fields: HeadFields,
    },
    Done,
}

/// Output rows of one worksheet, pulled lazily from its raw rows.
///
/// The first item is the header row; later items are data rows that passed
/// the rows filter. Rows are expected in ascending row number order.
pub struct SheetRows<'c, I> {
    sheet_name: String,
    config: &'c GlobalConfig,
    sheet_config: &'c SheetConfig,
    rows: I,
    phase: Phase<'c>,
}

impl<'c, I> SheetRows<'c, I>
where
    I: Iterator<Item = Result<Row, SheetRowsError>>,
{
    /// Binds the sheet to its config and wraps its raw rows.
    pub fn new(sheet_name: impl Into<String>, sheet_index: usize, config: &'c GlobalConfig, rows: I) -> Self {
        let sheet_name = sheet_name.into();
        let sheet_config = bind(&sheet_name, sheet_index, config);
        SheetRows {
            sheet_name,
            config,
            sheet_config,
            rows,
            phase: Phase::Preamble(PreambleScanner::new(sheet_config)),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Config bound to this sheet.
    pub fn sheet_config(&self) -> &'c SheetConfig {
        self.sheet_config
    }

    /// Head fields, once the header row has been read.
    pub fn head_fields(&self) -> Option<&HeadFields> {
        match &self.phase {
            Phase::Data { head_fields, .. } => Some(head_fields),
            _ => None,
        }
    }

    fn step(&mut self, row: &Row) -> Result<Option<OutputRow>, EngineError> {
        let sheet = self.sheet_name.as_str();
        let header_row = self.sheet_config.header_row;
        match &mut self.phase {
            Phase::Preamble(scanner) => {
                if row.number > header_row {
                    return Err(EngineError::MissingHeaderConfig {
                        sheet: sheet.to_owned(),
                        row: row.number,
                    });
                }
                scanner.check_asserts(sheet, row)?;
                if row.number < header_row {
                    scanner.extract_head_fields(sheet, row, self.config)?;
                    return Ok(None);
                }

                let rules = match self.sheet_config.headers.as_deref() {
                    Some(rules) => Cow::Borrowed(rules),
                    None => Cow::Owned(derive_headers(row)),
                };
                let columns = resolve_columns(sheet, &rules, row, self.config)?;
                let labels = header_labels(&rules, &columns);
                debug!(sheet, header_row, labels = ?labels, "header row processed");
                let output = labels.into_iter().map(Some).collect();
                let head_fields = match std::mem::replace(&mut self.phase, Phase::Done) {
                    Phase::Preamble(scanner) => scanner.finish(),
                    _ => HeadFields::default(),
                };
                self.phase = Phase::Data {
                    rules,
                    columns,
                    head_fields,
                };
                Ok(Some(output))
            }
            Phase::Data {
                rules,
                columns,
                head_fields,
            } => {
                let values = project_row(sheet, rules, columns, row, head_fields, self.config)?;
                match &self.sheet_config.rows_filter {
                    Some(filter) if !filter(&values) => {
                        trace!(sheet, row = row.number, "row dropped by filter");
                        Ok(None)
                    }
                    _ => Ok(Some(values)),
                }
            }
            Phase::Done => Ok(None),
        }
    }
}

impl<I> Iterator for SheetRows<'_, I>
where
    I: Iterator<Item = Result<Row, SheetRowsError>>,
{
    type Item = Result<OutputRow, SheetRowsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if matches!(self.phase, Phase::Done) {
                return None;
            }
            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(error)) => {
                    self.phase = Phase::Done;
                    return Some(Err(error));
                }
                None => {
                    self.phase = Phase::Done;
                    return None;
                }
            };
            match self.step(&row) {
                Ok(Some(output)) => return Some(Ok(output)),
                Ok(None) => continue,
                Err(error) => {
                    self.phase = Phase::Done;
                    return Some(Err(error.into()));
                }
            }
        }
    }
}

impl<I> std::iter::FusedIterator for SheetRows<'_, I> where I: Iterator<Item = Result<Row, SheetRowsError>> {}
