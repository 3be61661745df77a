//! excellib-core – Excel documents for test-automation keywords.
//!
//! Two layers:
//! * [`Workbook`] – an owned document handle (create, read/write cells, save, open);
//! * [`ExcelLibrary`] – the keyword adapter: a per-instance cache of documents
//!   keyed by identifier, plus [`ExcelLibrary::run_keyword`] for name-based dispatch.
//!
//! ```no_run
//! use excellib_core::{CellAddress, Workbook};
//!
//! # fn main() -> excellib_core::Result<()> {
//! let mut wb = Workbook::create("doc_name")?;
//! wb.write_cell(CellAddress::new(1, 1)?, "text")?;
//! wb.save("doc_name.xlsx")?;
//! assert_eq!(wb.to_string(), "doc_name");
//! # Ok(())
//! # }
//! ```

mod address;
mod compare;
mod config;
mod error;
mod keywords;
mod library;
mod numfmt;
mod test;
mod value;
mod workbook;
mod xlsx;

pub use address::{CellAddress, MAX_COL, MAX_ROW, col_to_letters, letters_to_col};
pub use compare::{documents_equal, documents_equal_with};
pub use config::{
    DEFAULT_SHEET_NAME, ENV_COMPRESSION_LEVEL, ENV_DEFAULT_SHEET_NAME, ENV_MAX_PART_BYTES,
    LibraryConfig,
};
pub use error::{ExcelError, Result};
pub use keywords::{
    ArgSpec, KEYWORDS, KeywordSpec, KeywordValue, LIBRARY_DOC, find_keyword, keyword_names,
    normalize,
};
pub use library::ExcelLibrary;
pub use value::CellValue;
pub use workbook::{Workbook, Worksheet};
pub use xlsx::scan;
