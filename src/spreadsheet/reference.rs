//! A1-style cell references. Rows and columns are 1-based throughout.

/// Converts column letters to a column number: A = 1, Z = 26, AA = 27, ...
/// Returns `None` for an empty string or anything but ASCII letters.
pub fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |index, char| {
        if char.is_ascii_alphabetic() {
            let digit = (char.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            index.checked_mul(26)?.checked_add(digit)
        } else {
            None
        }
    })
}

/// Converts a column number back to letters. Column 0 has no letters.
pub fn index_to_col(mut col: usize) -> String {
    let mut letters = String::new();
    while col > 0 {
        col -= 1;
        letters.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    letters
}

/// Cell address such as `C12` for row 12, column 3.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row)
}

/// Splits an address such as `C12` into `(row, col)`.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|char: char| char.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let col = col_to_index(letters.trim_start_matches('$'))?;
    let row = digits.parse::<usize>().ok().filter(|row| *row > 0)?;
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_to_index() {
        assert_eq!(col_to_index("A"), Some(1));
        assert_eq!(col_to_index("z"), Some(26));
        assert_eq!(col_to_index("AA"), Some(27));
        assert_eq!(col_to_index("XFD"), Some(16_384));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn test_index_to_col() {
        assert_eq!(index_to_col(1), "A");
        assert_eq!(index_to_col(26), "Z");
        assert_eq!(index_to_col(27), "AA");
        assert_eq!(index_to_col(52), "AZ");
        assert_eq!(index_to_col(0), "");
    }

    #[test]
    fn test_reference() {
        assert_eq!(index_to_reference(12, 3), "C12");
        assert_eq!(reference_to_index("C12"), Some((12, 3)));
        assert_eq!(reference_to_index("AB7"), Some((7, 28)));
        assert_eq!(reference_to_index("C"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A0"), None);
    }
}
