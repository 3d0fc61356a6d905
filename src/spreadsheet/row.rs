use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::reference::col_to_index;
use std::fmt::Display;

/// Column of a worksheet, given either as a 1-based number or as letters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Index(usize),
    Letter(String),
}

impl ColumnKey {
    /// 1-based column number, or `None` when the key names no column.
    pub fn index(&self) -> Option<usize> {
        match self {
            ColumnKey::Index(index) => Some(*index).filter(|index| *index > 0),
            ColumnKey::Letter(letters) => col_to_index(letters),
        }
    }
}

impl From<usize> for ColumnKey {
    fn from(index: usize) -> Self {
        ColumnKey::Index(index)
    }
}

impl From<&str> for ColumnKey {
    fn from(letters: &str) -> Self {
        ColumnKey::Letter(letters.to_owned())
    }
}

impl From<String> for ColumnKey {
    fn from(letters: String) -> Self {
        ColumnKey::Letter(letters)
    }
}

impl Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKey::Index(index) => write!(f, "{index}"),
            ColumnKey::Letter(letters) => f.write_str(letters),
        }
    }
}

/// One worksheet row with its populated cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// Row number (1-based)
    pub number: usize,
    /// Populated cells, ordered by column
    cells: Vec<Cell>,
}

impl Row {
    /// Builds a row, ordering the cells by column. When a column occurs
    /// twice the last cell wins.
    pub fn new(number: usize, mut cells: Vec<Cell>) -> Self {
        cells.reverse();
        cells.sort_by_key(|cell| cell.col);
        cells.dedup_by_key(|cell| cell.col);
        Row { number, cells }
    }

    /// Row of text cells laid out from column A onwards; empty strings leave a gap.
    pub fn from_texts<S: AsRef<str>>(number: usize, texts: &[S]) -> Self {
        let cells = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.as_ref().is_empty())
            .map(|(index, text)| Cell::string(number, index + 1, text.as_ref()))
            .collect();
        Row { number, cells }
    }

    pub fn cell(&self, key: &ColumnKey) -> Option<&Cell> {
        self.cell_at(key.index()?)
    }

    pub fn cell_at(&self, col: usize) -> Option<&Cell> {
        self.cells
            .binary_search_by_key(&col, |cell| cell.col)
            .ok()
            .map(|index| &self.cells[index])
    }

    /// Populated cells in column order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_key_index() {
        assert_eq!(ColumnKey::from("C").index(), Some(3));
        assert_eq!(ColumnKey::from(5).index(), Some(5));
        assert_eq!(ColumnKey::from(0).index(), None);
        assert_eq!(ColumnKey::from("3C").index(), None);
    }

    #[test]
    fn test_cell_lookup() {
        let row = Row::new(4, vec![Cell::string(4, 3, "c"), Cell::string(4, 1, "a")]);
        assert_eq!(row.cell(&"A".into()).map(|cell| cell.text()), Some("a".to_owned()));
        assert_eq!(row.cell(&3.into()).map(|cell| cell.text()), Some("c".to_owned()));
        assert!(row.cell(&"B".into()).is_none());
        assert_eq!(row.cells().map(|cell| cell.col).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_duplicate_column_keeps_last_cell() {
        let row = Row::new(1, vec![Cell::string(1, 2, "old"), Cell::string(1, 2, "new")]);
        assert_eq!(row.cells().count(), 1);
        assert_eq!(row.cell_at(2).map(|cell| cell.value.as_str()), Some("new"));
    }
}
