//! address.rs – координаты ячеек (1-based) и A1-метки

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;

use crate::error::{ExcelError, Result};

/// Last row of an XLSX grid.
pub const MAX_ROW: u32 = 1_048_576;
/// Last column of an XLSX grid (`XFD`).
pub const MAX_COL: u32 = 16_384;

static RE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]{1,7})$").expect("static regex"));

/// A single cell slot, `row` and `col` both start with 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    /// Builds an address and checks it against the XLSX grid.
    pub fn new(row: u32, col: u32) -> Result<Self> {
        let addr = Self { row, col };
        addr.validate()?;
        Ok(addr)
    }

    /// Same as [`CellAddress::new`] but takes signed keyword arguments
    /// (the runner hands over whatever the user typed).
    pub fn from_signed(row: i64, col: i64) -> Result<Self> {
        let row = u32::try_from(row).map_err(|_| ExcelError::Address(format!("row {row}")))?;
        let col = u32::try_from(col).map_err(|_| ExcelError::Address(format!("column {col}")))?;
        Self::new(row, col)
    }

    pub fn validate(&self) -> Result<()> {
        if self.row < 1 || self.row > MAX_ROW {
            return Err(ExcelError::Address(format!(
                "row {} out of range 1..={MAX_ROW}",
                self.row
            )));
        }
        if self.col < 1 || self.col > MAX_COL {
            return Err(ExcelError::Address(format!(
                "column {} out of range 1..={MAX_COL}",
                self.col
            )));
        }
        Ok(())
    }
}

impl FromStr for CellAddress {
    type Err = ExcelError;

    /// Parses `"C7"` / `"$C$7"`.
    fn from_str(s: &str) -> Result<Self> {
        let caps = RE_LABEL
            .captures(s.trim())
            .ok_or_else(|| ExcelError::Address(s.to_owned()))?;
        let col = letters_to_col(&caps[1]).ok_or_else(|| ExcelError::Address(s.to_owned()))?;
        let row = caps[2]
            .parse::<u32>()
            .map_err(|_| ExcelError::Address(s.to_owned()))?;
        Self::new(row, col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row)
    }
}

/// 1 -> "A", 27 -> "AA".
pub fn col_to_letters(col: u32) -> String {
    let mut idx = col.saturating_sub(1);
    let mut s = String::new();
    loop {
        let rem = idx % 26;
        s.insert(0, (b'A' + rem as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    s
}

/// "A" -> 1, "AA" -> 27. `None` for empty or non-letter input.
pub fn letters_to_col(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    s.bytes().try_fold(0u32, |acc, b| {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        acc.checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)
    })
}
