//! library.rs – адаптер документов: кэш книг по doc_id + текущий документ

use std::path::Path;

use log::debug;

use crate::{
    address::{CellAddress, MAX_COL, MAX_ROW},
    compare,
    config::LibraryConfig,
    error::{ExcelError, Result},
    value::CellValue,
    workbook::{Workbook, Worksheet},
};

/// Keyword-facing document adapter.
///
/// Holds the documents opened during a test run, keyed by a caller-chosen
/// identifier, and remembers which one is *current*. Cell keywords always
/// act on the current document. The cache belongs to this value; two
/// libraries never share documents.
#[derive(Debug, Default)]
pub struct ExcelLibrary {
    config: LibraryConfig,
    cache: Vec<(String, Workbook)>, // порядок вставки важен для close_current
    current_id: Option<String>,
}

/// Documents
impl ExcelLibrary {
    pub fn new(config: LibraryConfig) -> Self {
        Self {
            config,
            cache: Vec::new(),
            current_id: None,
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Identifiers of the cached documents, oldest first.
    pub fn document_ids(&self) -> Vec<&str> {
        self.cache.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    /// Creates a new document and makes it current.
    ///
    /// # Returns
    /// The identifier of the created document.
    pub fn create_excel_document(&mut self, doc_id: &str) -> Result<String> {
        self.ensure_free(doc_id)?;
        let wb = Workbook::create_with(doc_id, &self.config)?;
        Ok(self.insert(doc_id, wb))
    }

    /// Opens an xlsx file under `doc_id` and makes it current.
    pub fn open_excel_document<P: AsRef<Path>>(&mut self, filename: P, doc_id: &str) -> Result<String> {
        self.ensure_free(doc_id)?;
        let wb = Workbook::open_with(filename, &self.config)?;
        Ok(self.insert(doc_id, wb))
    }

    /// Opens an xlsx document from a byte stream (e.g. an HTTP response body).
    pub fn open_excel_document_from_stream(&mut self, stream: &[u8], doc_id: &str) -> Result<String> {
        self.ensure_free(doc_id)?;
        let wb = Workbook::from_bytes_with(stream, doc_id, &self.config)?;
        Ok(self.insert(doc_id, wb))
    }

    /// Makes `doc_id` current.
    ///
    /// # Returns
    /// The identifier of the previously current document.
    pub fn switch_current_excel_document(&mut self, doc_id: &str) -> Result<Option<String>> {
        if !self.cache.iter().any(|(id, _)| id == doc_id) {
            return Err(ExcelError::NoSuchDocument(doc_id.to_owned()));
        }
        Ok(self.current_id.replace(doc_id.to_owned()))
    }

    /// Drops the current document; the oldest remaining one becomes current.
    ///
    /// # Returns
    /// The identifier of the new current document, if any is left.
    pub fn close_current_excel_document(&mut self) -> Option<String> {
        if let Some(id) = self.current_id.take() {
            self.cache.retain(|(cached, _)| *cached != id);
            debug!("closed document {id}");
        }
        self.current_id = self.cache.first().map(|(id, _)| id.clone());
        self.current_id.clone()
    }

    pub fn close_all_excel_documents(&mut self) {
        self.cache.clear();
        self.current_id = None;
    }

    /// Saves the current document to `filename`.
    pub fn save_excel_document<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        self.current()?.save_with(filename, &self.config)
    }

    pub fn get_list_sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.current()?.sheet_names())
    }

    /// Compares two files cell by cell.
    pub fn excel_documents_equal<A: AsRef<Path>, B: AsRef<Path>>(&self, path_a: A, path_b: B) -> bool {
        compare::documents_equal_with(path_a, path_b, &self.config)
    }

    pub fn current(&self) -> Result<&Workbook> {
        let id = self.current_id.as_deref().ok_or(ExcelError::NoOpenedDocuments)?;
        self.cache
            .iter()
            .find(|(cached, _)| cached == id)
            .map(|(_, wb)| wb)
            .ok_or(ExcelError::NoOpenedDocuments)
    }

    pub fn current_mut(&mut self) -> Result<&mut Workbook> {
        let id = self.current_id.as_deref().ok_or(ExcelError::NoOpenedDocuments)?;
        self.cache
            .iter_mut()
            .find(|(cached, _)| cached == id)
            .map(|(_, wb)| wb)
            .ok_or(ExcelError::NoOpenedDocuments)
    }

    fn ensure_free(&self, doc_id: &str) -> Result<()> {
        if doc_id.trim().is_empty() {
            return Err(ExcelError::Creation("document id must not be empty".into()));
        }
        if self.cache.iter().any(|(id, _)| id == doc_id) {
            return Err(ExcelError::DocumentExists(doc_id.to_owned()));
        }
        Ok(())
    }

    fn insert(&mut self, doc_id: &str, wb: Workbook) -> String {
        debug!("document {doc_id} cached ({} sheets)", wb.sheets().len());
        self.cache.push((doc_id.to_owned(), wb));
        self.current_id = Some(doc_id.to_owned());
        doc_id.to_owned()
    }

    fn sheet(&self, sheet_name: Option<&str>) -> Result<&Worksheet> {
        self.current()?.sheet(sheet_name)
    }

    fn sheet_mut(&mut self, sheet_name: Option<&str>) -> Result<&mut Worksheet> {
        self.current_mut()?.sheet_mut(sheet_name)
    }
}

/// Cells
impl ExcelLibrary {
    /// Every row of the sheet from A1 to its last populated cell.
    pub fn make_list_from_excel_sheet(&self, sheet_name: Option<&str>) -> Result<Vec<Vec<CellValue>>> {
        Ok(self.sheet(sheet_name)?.values())
    }

    /// Content of a cell, `Empty` when unset. Row and column start with 1.
    pub fn read_excel_cell(&self, row_num: i64, col_num: i64, sheet_name: Option<&str>) -> Result<CellValue> {
        let addr = CellAddress::from_signed(row_num, col_num)?;
        Ok(self.sheet(sheet_name)?.cell(addr).clone())
    }

    /// Reads columns `col_offset + 1 ..= col_offset + max_num` of a row.
    /// `max_num == 0` reads through the sheet's last populated column.
    pub fn read_excel_row(
        &self,
        row_num: i64,
        col_offset: i64,
        max_num: i64,
        sheet_name: Option<&str>,
    ) -> Result<Vec<CellValue>> {
        let start = CellAddress::from_signed(row_num, offset(col_offset)?.saturating_add(1))?;
        let sheet = self.sheet(sheet_name)?;
        let last = window_end(col_offset, max_num, sheet.max_column(), MAX_COL)?;
        Ok(sheet.row_values(start.row, start.col, last))
    }

    /// Reads rows `row_offset + 1 ..= row_offset + max_num` of a column.
    /// `max_num == 0` reads through the sheet's last populated row.
    pub fn read_excel_column(
        &self,
        col_num: i64,
        row_offset: i64,
        max_num: i64,
        sheet_name: Option<&str>,
    ) -> Result<Vec<CellValue>> {
        let start = CellAddress::from_signed(offset(row_offset)?.saturating_add(1), col_num)?;
        let sheet = self.sheet(sheet_name)?;
        let last = window_end(row_offset, max_num, sheet.max_row(), MAX_ROW)?;
        Ok(sheet.column_values(start.col, start.row, last))
    }

    pub fn write_excel_cell<V: Into<CellValue>>(
        &mut self,
        row_num: i64,
        col_num: i64,
        value: V,
        sheet_name: Option<&str>,
    ) -> Result<()> {
        let addr = CellAddress::from_signed(row_num, col_num)?;
        self.sheet_mut(sheet_name)?.set_cell(addr, value.into())
    }

    /// Writes `row_data[i]` into column `col_offset + 1 + i`.
    pub fn write_excel_row(
        &mut self,
        row_num: i64,
        row_data: Vec<CellValue>,
        col_offset: i64,
        sheet_name: Option<&str>,
    ) -> Result<()> {
        let cells = row_cells(row_num, row_data, offset(col_offset)?)?;
        self.sheet_mut(sheet_name)?.set_cells(cells)
    }

    /// Writes `rows_data[i]` as row `rows_offset + 1 + i`.
    /// Nothing is written when any target cell is out of range.
    pub fn write_excel_rows(
        &mut self,
        rows_data: Vec<Vec<CellValue>>,
        rows_offset: i64,
        col_offset: i64,
        sheet_name: Option<&str>,
    ) -> Result<()> {
        let rows_offset = offset(rows_offset)?;
        let col_offset = offset(col_offset)?;
        let mut cells = Vec::new();
        for (i, row_data) in rows_data.into_iter().enumerate() {
            cells.extend(row_cells(rows_offset.saturating_add(i as i64 + 1), row_data, col_offset)?);
        }
        self.sheet_mut(sheet_name)?.set_cells(cells)
    }

    /// Writes `col_data[i]` into row `row_offset + 1 + i`.
    pub fn write_excel_column(
        &mut self,
        col_num: i64,
        col_data: Vec<CellValue>,
        row_offset: i64,
        sheet_name: Option<&str>,
    ) -> Result<()> {
        let row_offset = offset(row_offset)?;
        let cells = col_data
            .into_iter()
            .enumerate()
            .map(|(i, v)| Ok((CellAddress::from_signed(row_offset.saturating_add(i as i64 + 1), col_num)?, v)))
            .collect::<Result<Vec<_>>>()?;
        self.sheet_mut(sheet_name)?.set_cells(cells)
    }
}

fn offset(n: i64) -> Result<i64> {
    if n < 0 {
        return Err(ExcelError::Address(format!("negative offset {n}")));
    }
    Ok(n)
}

fn row_cells(row_num: i64, data: Vec<CellValue>, col_offset: i64) -> Result<Vec<(CellAddress, CellValue)>> {
    data.into_iter()
        .enumerate()
        .map(|(i, v)| Ok((CellAddress::from_signed(row_num, col_offset.saturating_add(i as i64 + 1))?, v)))
        .collect()
}

/// Last index of a read window, capped by the grid `limit`.
/// May be below the first index, which yields an empty window.
fn window_end(start_offset: i64, max_num: i64, used: u32, limit: u32) -> Result<u32> {
    if max_num < 0 {
        return Err(ExcelError::argument(format!("max_num must not be negative, got {max_num}")));
    }
    if max_num == 0 {
        return Ok(used);
    }
    let end = start_offset.saturating_add(max_num).min(i64::from(limit));
    Ok(end as u32)
}
