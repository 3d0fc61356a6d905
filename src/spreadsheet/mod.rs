//! # Spreadsheet Reading
//!
//! The decoding side of the crate: a streaming reader for Office Open XML
//! workbooks (`.xlsx`, `.xlsm`) that yields one [`Row`] at a time, plus the
//! [`Row`] and [`Cell`] types every other module works on.
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod row;
pub(crate) mod xlsx;

pub use cell::{Cell, CellType};
pub use row::{ColumnKey, Row};
pub use xlsx::{Workbook, XlsxRows};

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing part '{0}' in workbook package")]
    MissingPart(String),

    #[error("Workbook '{0}' contains no worksheets")]
    EmptyWorkbook(String),

    #[error("Workbook '{0}' is password protected")]
    PasswordProtected(String),

    #[error("Sheet index {index} out of range, workbook has {count} sheets")]
    SheetIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid cell reference '{0}'")]
    InvalidReference(String),

    #[error("Shared string index {0} out of range")]
    SharedStringOutOfRange(usize),
}

/// Identifies one worksheet of a workbook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetDescriptor {
    pub name: String,
    /// Zero-based position in workbook order
    pub index: usize,
}
