//! # Sheet Rows
//!
//! Configuration-driven extraction of tabular data from Excel workbooks.
//!
//! A worksheet is rarely a clean table: report titles, sign-off lines and
//! key/value pairs sit above the real header row, and columns move around
//! between versions of the same report. This crate streams the rows of a
//! `.xlsx` workbook and turns each sheet into a sequence of output rows
//! (the header first, then one row per data row) under a declarative
//! [`GlobalConfig`]:
//!
//! - **Assertions** check the structure of the rows at or above the header
//! - **Head fields** capture scalars such as a seller or a period from the
//!   preamble and make them available to every data row
//! - **Header rules** locate columns by position, by label or by predicate,
//!   and compute values with transforms or from head fields
//! - **Row filters** drop rows after they have been projected
//!
//! Rows are pulled lazily: nothing beyond the current row of the current
//! sheet is held in memory, so arbitrarily large worksheets can be processed.
//!
//! ```no_run
//! use sheet_rows::{ActualHeader, GlobalConfig, SheetConfig, SheetParser, SheetSelector};
//!
//! let config = GlobalConfig::new().with_sheet(
//!     SheetConfig::named("Sales")
//!         .with_header_row(2)
//!         .with_header(ActualHeader::named("Item"))
//!         .with_header(ActualHeader::named("Amount").with_value_fn(sheet_rows::tools::money())),
//! );
//! let parser = SheetParser::new(config);
//! let mut workbook = parser.open_workbook("report.xlsx")?;
//! if let Some(rows) = workbook.find_sheet(&SheetSelector::Name("Sales".to_owned()))? {
//!     for row in rows {
//!         println!("{:?}", row?);
//!     }
//! }
//! # Ok::<(), sheet_rows::SheetRowsError>(())
//! ```
pub mod config;
pub mod engine;
pub mod error;
mod helpers;
mod parser;
pub mod spreadsheet;
pub mod tools;

pub use config::{
    ActualHeader, AssertRule, GlobalConfig, HeadFieldRule, HeadFields, HeaderRule, SheetConfig, ValueContext,
    VirtualHeader,
};
pub use engine::{EngineError, OutputRow, SheetRows};
pub use error::SheetRowsError;
pub use helpers::reader::WorkbookSource;
pub use helpers::xml::XmlError;
pub use parser::{SheetParser, SheetSelector, SheetStream, WorkbookRows};
pub use spreadsheet::{Cell, CellType, ColumnKey, Row, SheetDescriptor};
