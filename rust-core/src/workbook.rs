//! workbook.rs – in-memory модель книги: листы и разреженные ячейки

use std::{collections::BTreeMap, fmt};

use crate::{
    address::CellAddress,
    config::LibraryConfig,
    error::{ExcelError, Result},
    value::CellValue,
};

const MAX_SHEET_TITLE: usize = 31;
const FORBIDDEN_TITLE_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

static EMPTY: CellValue = CellValue::Empty;

/// One sheet of a workbook. Only populated cells are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    title: String,
    cells: BTreeMap<CellAddress, CellValue>,
}

impl Worksheet {
    fn new(title: String) -> Self {
        Self {
            title,
            cells: BTreeMap::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Value at `addr`, `Empty` when nothing was written there.
    pub fn cell(&self, addr: CellAddress) -> &CellValue {
        self.cells.get(&addr).unwrap_or(&EMPTY)
    }

    /// Stores `value`; `Empty` clears the slot.
    pub fn set_cell(&mut self, addr: CellAddress, value: CellValue) -> Result<()> {
        addr.validate()?;
        check_value(&value)?;
        self.put(addr, value);
        Ok(())
    }

    /// Writes a batch only if every address and value in it is valid.
    pub fn set_cells<I>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = (CellAddress, CellValue)>,
    {
        let cells: Vec<_> = cells.into_iter().collect();
        for (addr, value) in &cells {
            addr.validate()?;
            check_value(value)?;
        }
        for (addr, value) in cells {
            self.put(addr, value);
        }
        Ok(())
    }

    fn put(&mut self, addr: CellAddress, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&addr);
        } else {
            self.cells.insert(addr, value);
        }
    }

    /// Highest populated row, 0 for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.cells.keys().next_back().map_or(0, |a| a.row)
    }

    /// Highest populated column, 0 for an empty sheet.
    pub fn max_column(&self) -> u32 {
        self.cells.keys().map(|a| a.col).max().unwrap_or(0)
    }

    /// Populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellAddress, &CellValue)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Values of `row` for columns `first_col..=last_col` (empties included).
    pub fn row_values(&self, row: u32, first_col: u32, last_col: u32) -> Vec<CellValue> {
        (first_col..=last_col)
            .map(|col| self.cell(CellAddress { row, col }).clone())
            .collect()
    }

    /// Values of `col` for rows `first_row..=last_row` (empties included).
    pub fn column_values(&self, col: u32, first_row: u32, last_row: u32) -> Vec<CellValue> {
        (first_row..=last_row)
            .map(|row| self.cell(CellAddress { row, col }).clone())
            .collect()
    }

    /// Whole used area starting at A1, one `Vec` per row.
    pub fn values(&self) -> Vec<Vec<CellValue>> {
        let max_col = self.max_column();
        (1..=self.max_row())
            .map(|row| self.row_values(row, 1, max_col))
            .collect()
    }
}

fn check_value(value: &CellValue) -> Result<()> {
    match value {
        CellValue::Number(n) if !n.is_finite() => {
            Err(ExcelError::InvalidValue(format!("{n} cannot be stored in a cell")))
        }
        _ => Ok(()),
    }
}

/// Opaque document handle. The caller owns it and threads it through
/// read / write / save; dropping it discards the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    name: String,
    sheets: Vec<Worksheet>,
    active: usize,
}

impl Workbook {
    /// New document with a single default sheet.
    pub fn create(name: &str) -> Result<Self> {
        Self::create_with(name, &LibraryConfig::default())
    }

    pub fn create_with(name: &str, cfg: &LibraryConfig) -> Result<Self> {
        let mut wb = Self::empty(name)?;
        wb.create_sheet(&cfg.default_sheet_name)?;
        Ok(wb)
    }

    /// Document without sheets; the reader fills it.
    pub(crate) fn empty(name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(ExcelError::Creation("document name must not be empty".into()));
        }
        Ok(Self {
            name: name.to_owned(),
            sheets: Vec::new(),
            active: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.title.clone()).collect()
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Appends a new empty sheet (it goes last in the tab order).
    pub fn create_sheet(&mut self, title: &str) -> Result<&mut Worksheet> {
        validate_title(title)?;
        if self
            .sheets
            .iter()
            .any(|s| s.title.eq_ignore_ascii_case(title))
        {
            return Err(ExcelError::Creation(format!("sheet {title} already exists")));
        }
        self.sheets.push(Worksheet::new(title.to_owned()));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    pub fn active_sheet(&self) -> Result<&Worksheet> {
        self.sheets.get(self.active).ok_or_else(|| no_sheets(&self.name))
    }

    pub fn set_active(&mut self, title: &str) -> Result<()> {
        self.active = self.position(title)?;
        Ok(())
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub(crate) fn set_active_index(&mut self, idx: usize) {
        if idx < self.sheets.len() {
            self.active = idx;
        }
    }

    /// `None` selects the active sheet.
    pub fn sheet(&self, title: Option<&str>) -> Result<&Worksheet> {
        match title {
            None => self.active_sheet(),
            Some(t) => Ok(&self.sheets[self.position(t)?]),
        }
    }

    pub fn sheet_mut(&mut self, title: Option<&str>) -> Result<&mut Worksheet> {
        let idx = match title {
            None if self.active < self.sheets.len() => self.active,
            None => return Err(no_sheets(&self.name)),
            Some(t) => self.position(t)?,
        };
        Ok(&mut self.sheets[idx])
    }

    fn position(&self, title: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.title == title)
            .ok_or_else(|| ExcelError::SheetNotFound(title.to_owned()))
    }

    /// Write to the active sheet.
    pub fn write_cell<V: Into<CellValue>>(&mut self, addr: CellAddress, value: V) -> Result<()> {
        self.sheet_mut(None)?.set_cell(addr, value.into())
    }

    /// Read from the active sheet; `Empty` when unset.
    pub fn read_cell(&self, addr: CellAddress) -> Result<CellValue> {
        Ok(self.active_sheet()?.cell(addr).clone())
    }

    /// Same titles in the same order, same populated values.
    /// Document names and the active sheet are not compared.
    pub fn content_eq(&self, other: &Workbook) -> bool {
        self.sheets.len() == other.sheets.len()
            && self
                .sheets
                .iter()
                .zip(&other.sheets)
                .all(|(a, b)| a.title == b.title && a.cells == b.cells)
    }
}

impl fmt::Display for Workbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ExcelError::Creation("sheet title must not be empty".into()));
    }
    if title.chars().count() > MAX_SHEET_TITLE {
        return Err(ExcelError::Creation(format!(
            "sheet title {title} is longer than {MAX_SHEET_TITLE} characters"
        )));
    }
    if let Some(c) = title.chars().find(|c| FORBIDDEN_TITLE_CHARS.contains(c)) {
        return Err(ExcelError::Creation(format!(
            "sheet title {title} contains '{c}'"
        )));
    }
    Ok(())
}

fn no_sheets(doc: &str) -> ExcelError {
    ExcelError::SheetNotFound(format!("<active sheet of {doc}>"))
}
