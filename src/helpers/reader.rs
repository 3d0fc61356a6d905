use crate::error::SheetRowsError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::PathBuf;

/// Leading bytes of a Compound File Binary container. Encrypted OOXML
/// workbooks are wrapped in one instead of a plain zip archive.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Where a workbook comes from. The engine reads through it once, sequentially.
#[derive(Clone, Debug)]
pub enum WorkbookSource {
    /// A file on the local file system
    Path(PathBuf),
    /// An in-memory copy of the workbook file
    Bytes(Vec<u8>),
}

impl WorkbookSource {
    /// Human readable name used to prefix error messages.
    pub fn name(&self) -> String {
        match self {
            WorkbookSource::Path(path) => path.display().to_string(),
            WorkbookSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for WorkbookSource {
    fn from(path: &str) -> Self {
        WorkbookSource::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for WorkbookSource {
    fn from(path: PathBuf) -> Self {
        WorkbookSource::Path(path)
    }
}

impl From<Vec<u8>> for WorkbookSource {
    fn from(bytes: Vec<u8>) -> Self {
        WorkbookSource::Bytes(bytes)
    }
}

/// A reader over either a local file or an in-memory buffer
pub(crate) enum SourceReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer
    Memory(Cursor<Vec<u8>>),
}

impl SourceReader {
    /// Opens the underlying bytes of a workbook source.
    pub(crate) fn new(source: WorkbookSource) -> Result<SourceReader, SheetRowsError> {
        match source {
            WorkbookSource::Path(path) => {
                let file = File::open(path)?;
                Ok(SourceReader::Local(BufReader::new(file)))
            }
            WorkbookSource::Bytes(bytes) => Ok(SourceReader::Memory(Cursor::new(bytes))),
        }
    }

    /// Checks whether the source is a CFB container rather than a zip archive.
    /// The read position is restored before returning.
    pub(crate) fn is_compound_file(&mut self) -> Result<bool, SheetRowsError> {
        let mut signature = [0u8; 8];
        let mut filled = 0usize;
        while filled < signature.len() {
            let count = self.read(&mut signature[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        self.seek(SeekFrom::Start(0))?;
        Ok(filled == signature.len() && signature == CFB_SIGNATURE)
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SourceReader::Local(reader) => reader.read(buf),
            SourceReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            SourceReader::Local(reader) => reader.seek(pos),
            SourceReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_path_and_bytes() {
        assert!(matches!(WorkbookSource::from("report.xlsx"), WorkbookSource::Path(_)));
        assert!(matches!(WorkbookSource::from(vec![1u8, 2, 3]), WorkbookSource::Bytes(_)));
        assert_eq!(WorkbookSource::from(vec![1u8, 2, 3]).name(), "<3 bytes>");
    }

    #[test]
    fn test_open_local_file() {
        // Cargo.toml always exists next to the crate sources
        let result = SourceReader::new(WorkbookSource::from("Cargo.toml"));
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = SourceReader::new(WorkbookSource::from("non_existent_file.xlsx"));
        assert!(result.is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn test_detect_compound_file() {
        let mut bytes = CFB_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let mut reader = SourceReader::new(WorkbookSource::Bytes(bytes)).unwrap();
        assert!(reader.is_compound_file().unwrap());

        let mut reader = SourceReader::new(WorkbookSource::Bytes(b"PK\x03\x04".to_vec())).unwrap();
        assert!(!reader.is_compound_file().unwrap());
        let mut head = [0u8; 2];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"PK");
    }
}
