use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use std::fmt::Display;

/// How the raw value of a cell is to be interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellType {
    /// Boolean stored as `1` / `0`
    Boolean,
    /// Plain numeric value
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time string (`t="d"` cells)
    IsoDateTime,
    /// Text, either inline or resolved from the shared string table
    String,
    /// Error value such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Classifies a built-in number format id. Only date and time formats are
    /// interesting, everything else stays a plain number.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Classifies a custom number format code by looking for date and time
    /// tokens outside of literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_bracket = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }
}

/// A populated cell of a worksheet.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row number (1-based)
    pub row: usize,
    /// Column number (1-based)
    pub col: usize,
    /// Interpretation of `value`
    pub kind: CellType,
    /// Raw stored value
    pub value: String,
}

impl Cell {
    pub fn new(row: usize, col: usize, kind: CellType, value: impl Into<String>) -> Self {
        Cell {
            row,
            col,
            kind,
            value: value.into(),
        }
    }

    /// A text cell.
    pub fn string(row: usize, col: usize, value: impl Into<String>) -> Self {
        Self::new(row, col, CellType::String, value)
    }

    /// A plain numeric cell.
    pub fn number(row: usize, col: usize, value: f64) -> Self {
        Self::new(row, col, CellType::Number, value.to_string())
    }

    /// Address such as `C12`.
    pub fn address(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Rendered display text of the cell.
    pub fn text(&self) -> String {
        self.to_string()
    }

    /// Typed numeric value: numbers of any format, or text that parses as one.
    pub fn to_double(&self) -> Option<f64> {
        match self.kind {
            CellType::Boolean | CellType::IsoDateTime | CellType::Error => None,
            CellType::String => self.value.trim().parse::<f64>().ok().filter(|value| value.is_finite()),
            _ => self.value.parse::<f64>().ok(),
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = match self.kind {
            CellType::Boolean => Some(if self.value == "1" { "true" } else { "false" }.to_owned()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value),
            CellType::IsoDateTime => Some(self.value.replace('T', " ")),
            CellType::Number | CellType::String | CellType::Error => None,
        };
        // Values that fail to render as a date or time are shown as stored
        match rendered {
            Some(text) => f.write_str(&text),
            None => f.write_str(&self.value),
        }
    }
}

const MAX_SERIAL_DAYS: f64 = 1e8;

/// Serial day number to `YYYY-MM-DD`, honouring the Lotus 1-2-3 leap year bug
/// of the 1900 date system.
fn to_date_string(value: &str, is_1904: bool) -> Option<String> {
    let serial = value.trim().parse::<f64>().ok()?;
    // Far outside the range chrono can represent
    if serial.is_nan() || serial.abs() >= MAX_SERIAL_DAYS {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Day fraction to `HH:MM:SS`, with milliseconds when present.
fn to_time_string(value: &str) -> Option<String> {
    let fraction = value.trim().parse::<f64>().ok()?.fract();
    let mut rest = (fraction * 86_400_000f64).round() as i64;
    let milliseconds = rest % 1_000;
    rest /= 1_000;
    let seconds = rest % 60;
    rest /= 60;
    let minutes = rest % 60;
    let hours = rest / 60;
    if milliseconds > 0 {
        Some(format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}"))
    } else {
        Some(format!("{hours:02}:{minutes:02}:{seconds:02}"))
    }
}

fn to_datetime_string(value: &str, is_1904: bool) -> Option<String> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Some(format!("{date} {time}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_number_format() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("dd.mm.yyyy hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("[h]:mm:ss", false), CellType::NumberTime1900);
        assert_eq!(CellType::parse_custom_number_format("#,##0.00\" days\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
    }

    #[test]
    fn test_builtin_number_format() {
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("22", true), Some(CellType::NumberDateTime1904));
        assert_eq!(CellType::parse_builtin_number_format_id("2", false), None);
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(Cell::new(1, 1, CellType::Boolean, "1").text(), "true");
        assert_eq!(Cell::new(1, 1, CellType::Number, "45.258965").text(), "45.258965");
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1900, "45260").text(), "2023-11-30");
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1900, "1").text(), "1900-01-01");
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1904, "0").text(), "1904-01-01");
        assert_eq!(Cell::new(1, 1, CellType::NumberTime1900, "0.5").text(), "12:00:00");
        assert_eq!(Cell::new(1, 1, CellType::NumberDateTime1900, "45260.75").text(), "2023-11-30 18:00:00");
        assert_eq!(Cell::new(1, 1, CellType::IsoDateTime, "2023-11-30T08:15:00").text(), "2023-11-30 08:15:00");
        assert_eq!(Cell::new(1, 1, CellType::Error, "#DIV/0!").text(), "#DIV/0!");
    }

    #[test]
    fn test_unparsable_date_falls_back_to_raw_value() {
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1900, "soon").text(), "soon");
    }

    #[test]
    fn test_out_of_range_serial_falls_back_to_raw_value() {
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1904, "1e300").text(), "1e300");
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1900, "-1e300").text(), "-1e300");
        assert_eq!(Cell::new(1, 1, CellType::NumberDateTime1904, "1e300").text(), "1e300");
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1904, "NaN").text(), "NaN");
        assert_eq!(Cell::new(1, 1, CellType::NumberDate1900, "99999999").text(), "99999999");
    }

    #[test]
    fn test_to_double() {
        assert_eq!(Cell::number(1, 1, 12.5).to_double(), Some(12.5));
        assert_eq!(Cell::string(1, 1, " 7.25 ").to_double(), Some(7.25));
        assert_eq!(Cell::string(1, 1, "abc").to_double(), None);
        assert_eq!(Cell::new(1, 1, CellType::Boolean, "1").to_double(), None);
        assert_eq!(Cell::string(2, 3, "x").address(), "C2");
    }
}
