use thiserror::Error;

/// Error type of every fallible operation in the crate.
/// Wraps the module errors as well as those of the standard library and the
/// decoding dependencies.
#[derive(Error, Debug)]
pub enum SheetRowsError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Configuration errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::file::ConfigError),

    // Row stream errors
    #[error("{0}")]
    EngineError(#[from] crate::engine::EngineError),
}

impl SheetRowsError {
    /// The row stream failure behind this error, if it is one.
    pub fn as_engine_error(&self) -> Option<&crate::engine::EngineError> {
        match self {
            SheetRowsError::EngineError(error) => Some(error),
            _ => None,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetRowsError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetRowsError::WithContextError(format!("{}: {}", message, e)))
    }
}
