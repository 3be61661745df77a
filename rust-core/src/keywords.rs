//! keywords.rs – таблица keyword'ов и диспетчеризация по имени
//!
//! A runner calls a keyword by name with positional and named arguments.
//! Names are matched the way Robot Framework matches them: case does not
//! matter, spaces and underscores are ignored.

use log::debug;

use crate::{
    error::{ExcelError, Result},
    library::ExcelLibrary,
    value::CellValue,
};

/// Argument or result exchanged with the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    Scalar(CellValue),
    Bytes(Vec<u8>),
    List(Vec<KeywordValue>),
}

impl KeywordValue {
    /// The runner's "no value" (`None` in Python).
    pub fn none() -> Self {
        KeywordValue::Scalar(CellValue::Empty)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, KeywordValue::Scalar(CellValue::Empty))
    }
}

impl From<CellValue> for KeywordValue {
    fn from(v: CellValue) -> Self {
        KeywordValue::Scalar(v)
    }
}

impl From<String> for KeywordValue {
    fn from(s: String) -> Self {
        KeywordValue::Scalar(CellValue::String(s))
    }
}

impl From<Option<String>> for KeywordValue {
    fn from(s: Option<String>) -> Self {
        KeywordValue::Scalar(s.into())
    }
}

impl From<f64> for KeywordValue {
    fn from(n: f64) -> Self {
        KeywordValue::Scalar(CellValue::Number(n))
    }
}

impl From<bool> for KeywordValue {
    fn from(b: bool) -> Self {
        KeywordValue::Scalar(CellValue::Bool(b))
    }
}

impl<T: Into<KeywordValue>> FromIterator<T> for KeywordValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        KeywordValue::List(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    /// Default as shown to the runner; `None` marks a required argument.
    pub default: Option<&'static str>,
}

const fn req(name: &'static str) -> ArgSpec {
    ArgSpec { name, default: None }
}

const fn opt(name: &'static str, default: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        default: Some(default),
    }
}

#[derive(Debug)]
pub struct KeywordSpec {
    pub name: &'static str,
    pub args: &'static [ArgSpec],
    pub doc: &'static str,
}

impl KeywordSpec {
    /// Argument list in the runner's notation: `name` or `name=default`.
    pub fn signature(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| match a.default {
                Some(d) => format!("{}={d}", a.name),
                None => a.name.to_owned(),
            })
            .collect()
    }
}

pub const LIBRARY_DOC: &str = "Library for working with Excel documents.\n\n\
Documents are kept in a cache under a caller-chosen identifier; cell keywords \
act on the current document. Rows and columns start with 1.\n\n\
| Create Excel Document | doc_id=docname1 |\n\
| Write Excel Cell | row_num=1 | col_num=1 | value=text |\n\
| Save Excel Document | filename=file.xlsx |\n\
| Close Current Excel Document |";

pub static KEYWORDS: &[KeywordSpec] = &[
    KeywordSpec {
        name: "Create Excel Document",
        args: &[req("doc_id")],
        doc: "Creates a new document with one empty sheet and makes it current.\n\
              Returns the document identifier. Fails if the identifier is taken.",
    },
    KeywordSpec {
        name: "Open Excel Document",
        args: &[req("filename"), req("doc_id")],
        doc: "Opens an xlsx file under `doc_id` and makes it current. Returns `doc_id`.",
    },
    KeywordSpec {
        name: "Open Excel Document From Stream",
        args: &[req("stream"), req("doc_id")],
        doc: "Opens an xlsx document from bytes (e.g. an HTTP response body). Returns `doc_id`.",
    },
    KeywordSpec {
        name: "Switch Current Excel Document",
        args: &[req("doc_id")],
        doc: "Makes `doc_id` current. Returns the identifier of the previous current document.",
    },
    KeywordSpec {
        name: "Close Current Excel Document",
        args: &[],
        doc: "Closes the current document. The oldest remaining document becomes current; \
              its identifier is returned (None when the cache is empty).",
    },
    KeywordSpec {
        name: "Close All Excel Documents",
        args: &[],
        doc: "Closes every cached document.",
    },
    KeywordSpec {
        name: "Save Excel Document",
        args: &[req("filename")],
        doc: "Saves the current document to `filename`.",
    },
    KeywordSpec {
        name: "Get List Sheet Names",
        args: &[],
        doc: "Returns the sheet titles of the current document.",
    },
    KeywordSpec {
        name: "Make List From Excel Sheet",
        args: &[opt("sheet_name", "None")],
        doc: "Returns every row of the sheet, from A1 to the last populated cell, as a list of lists.",
    },
    KeywordSpec {
        name: "Read Excel Cell",
        args: &[req("row_num"), req("col_num"), opt("sheet_name", "None")],
        doc: "Returns the content of a cell, None when the cell is empty.",
    },
    KeywordSpec {
        name: "Read Excel Row",
        args: &[
            req("row_num"),
            opt("col_offset", "0"),
            opt("max_num", "0"),
            opt("sheet_name", "None"),
        ],
        doc: "Returns `max_num` cells of a row starting after `col_offset` columns. \
              `max_num=0` reads up to the last populated column.",
    },
    KeywordSpec {
        name: "Read Excel Column",
        args: &[
            req("col_num"),
            opt("row_offset", "0"),
            opt("max_num", "0"),
            opt("sheet_name", "None"),
        ],
        doc: "Returns `max_num` cells of a column starting after `row_offset` rows. \
              `max_num=0` reads up to the last populated row.",
    },
    KeywordSpec {
        name: "Write Excel Cell",
        args: &[
            req("row_num"),
            req("col_num"),
            req("value"),
            opt("sheet_name", "None"),
        ],
        doc: "Writes `value` to a cell. None clears the cell.",
    },
    KeywordSpec {
        name: "Write Excel Row",
        args: &[
            req("row_num"),
            req("row_data"),
            opt("col_offset", "0"),
            opt("sheet_name", "None"),
        ],
        doc: "Writes a list of values into a row, starting after `col_offset` columns.",
    },
    KeywordSpec {
        name: "Write Excel Rows",
        args: &[
            req("rows_data"),
            opt("rows_offset", "0"),
            opt("col_offset", "0"),
            opt("sheet_name", "None"),
        ],
        doc: "Writes a list of rows, starting after `rows_offset` rows and `col_offset` columns.",
    },
    KeywordSpec {
        name: "Write Excel Column",
        args: &[
            req("col_num"),
            req("col_data"),
            opt("row_offset", "0"),
            opt("sheet_name", "None"),
        ],
        doc: "Writes a list of values into a column, starting after `row_offset` rows.",
    },
    KeywordSpec {
        name: "Excel Documents Equal",
        args: &[req("path_a"), req("path_b")],
        doc: "Returns True when both files hold the same sheets with the same cell values. \
              Formatting is ignored; a file that cannot be loaded gives False.",
    },
];

/// `"Read Excel Cell"` / `"read_excel_cell"` -> `"readexcelcell"`.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn find_keyword(name: &str) -> Option<&'static KeywordSpec> {
    let wanted = normalize(name);
    KEYWORDS.iter().find(|k| normalize(k.name) == wanted)
}

pub fn keyword_names() -> Vec<&'static str> {
    KEYWORDS.iter().map(|k| k.name).collect()
}

/// Arguments matched against a [`KeywordSpec`].
struct BoundArgs {
    keyword: &'static str,
    slots: Vec<(&'static str, Option<KeywordValue>)>,
}

fn bind(
    spec: &'static KeywordSpec,
    positional: Vec<KeywordValue>,
    named: Vec<(String, KeywordValue)>,
) -> Result<BoundArgs> {
    if positional.len() > spec.args.len() {
        return Err(ExcelError::argument(format!(
            "Keyword '{}' expected at most {} arguments, got {}.",
            spec.name,
            spec.args.len(),
            positional.len() + named.len()
        )));
    }
    let mut slots: Vec<_> = spec.args.iter().map(|a| (a.name, None)).collect();
    for (slot, value) in slots.iter_mut().zip(positional) {
        slot.1 = Some(value);
    }
    for (name, value) in named {
        let slot = slots
            .iter_mut()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| {
                ExcelError::argument(format!(
                    "Keyword '{}' got unexpected named argument '{name}'.",
                    spec.name
                ))
            })?;
        if slot.1.is_some() {
            return Err(ExcelError::argument(format!(
                "Keyword '{}' got multiple values for argument '{name}'.",
                spec.name
            )));
        }
        slot.1 = Some(value);
    }
    if let Some((arg, _)) = spec
        .args
        .iter()
        .zip(&slots)
        .find(|(a, (_, v))| a.default.is_none() && v.is_none())
    {
        return Err(ExcelError::argument(format!(
            "Keyword '{}' missing value for argument '{}'.",
            spec.name, arg.name
        )));
    }
    Ok(BoundArgs {
        keyword: spec.name,
        slots,
    })
}

impl BoundArgs {
    fn take(&mut self, name: &str) -> Option<KeywordValue> {
        self.slots
            .iter_mut()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.take())
    }

    fn bad(&self, name: &str, expected: &str, got: &KeywordValue) -> ExcelError {
        ExcelError::argument(format!(
            "Keyword '{}': argument '{name}' must be {expected}, got {got:?}.",
            self.keyword
        ))
    }

    fn required(&mut self, name: &str) -> Result<KeywordValue> {
        self.take(name).ok_or_else(|| {
            ExcelError::argument(format!(
                "Keyword '{}' missing value for argument '{name}'.",
                self.keyword
            ))
        })
    }

    fn string(&mut self, name: &str) -> Result<String> {
        match self.required(name)? {
            KeywordValue::Scalar(v) if !v.is_empty() => Ok(v.to_string()),
            KeywordValue::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
            other => Err(self.bad(name, "a string", &other)),
        }
    }

    /// `None` when omitted, passed as None, or typed as the text `None`
    /// (the runner hands `sheet_name=None` over as a string).
    fn opt_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.take(name) {
            None => Ok(None),
            Some(v) if v.is_none() => Ok(None),
            Some(KeywordValue::Scalar(CellValue::String(s))) if s == "None" => Ok(None),
            Some(KeywordValue::Scalar(v)) => Ok(Some(v.to_string())),
            Some(other) => Err(self.bad(name, "a string", &other)),
        }
    }

    /// Integers arrive as numbers or as the text the user typed.
    fn int(&mut self, name: &str, default: Option<i64>) -> Result<i64> {
        let value = match (self.take(name), default) {
            (Some(v), _) => v,
            (None, Some(d)) => return Ok(d),
            (None, None) => self.required(name)?,
        };
        let parsed = match &value {
            KeywordValue::Scalar(CellValue::Number(n)) if n.fract() == 0.0 => Some(*n as i64),
            KeywordValue::Scalar(CellValue::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.bad(name, "an integer", &value))
    }

    fn value(&mut self, name: &str) -> Result<CellValue> {
        match self.required(name)? {
            KeywordValue::Scalar(v) => Ok(v),
            other => Err(self.bad(name, "a cell value", &other)),
        }
    }

    fn values(&mut self, name: &str) -> Result<Vec<CellValue>> {
        let value = self.required(name)?;
        self.list_of_scalars(name, value)
    }

    fn list_of_scalars(&self, name: &str, value: KeywordValue) -> Result<Vec<CellValue>> {
        match value {
            KeywordValue::List(items) => items
                .into_iter()
                .map(|item| match item {
                    KeywordValue::Scalar(v) => Ok(v),
                    other => Err(self.bad(name, "a list of cell values", &other)),
                })
                .collect(),
            other => Err(self.bad(name, "a list", &other)),
        }
    }

    fn table(&mut self, name: &str) -> Result<Vec<Vec<CellValue>>> {
        match self.required(name)? {
            KeywordValue::List(rows) => rows
                .into_iter()
                .map(|row| self.list_of_scalars(name, row))
                .collect(),
            other => Err(self.bad(name, "a list of lists", &other)),
        }
    }

    fn bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        match self.required(name)? {
            KeywordValue::Bytes(b) => Ok(b),
            KeywordValue::Scalar(CellValue::String(s)) => Ok(s.into_bytes()),
            other => Err(self.bad(name, "bytes", &other)),
        }
    }
}

fn table_value(rows: Vec<Vec<CellValue>>) -> KeywordValue {
    rows.into_iter()
        .map(|row| row.into_iter().collect::<KeywordValue>())
        .collect()
}

/// Dispatch
impl ExcelLibrary {
    /// Runs a keyword by name.
    ///
    /// # Arguments
    /// * `name` - Keyword name in any Robot-style spelling.
    /// * `positional` - Positional arguments, in declaration order.
    /// * `named` - `name=value` arguments.
    ///
    /// # Returns
    /// The keyword result; keywords without a result return [`KeywordValue::none`].
    pub fn run_keyword(
        &mut self,
        name: &str,
        positional: Vec<KeywordValue>,
        named: Vec<(String, KeywordValue)>,
    ) -> Result<KeywordValue> {
        let spec = find_keyword(name).ok_or_else(|| ExcelError::UnknownKeyword(name.to_owned()))?;
        debug!("keyword {} ({} positional, {} named)", spec.name, positional.len(), named.len());
        let mut a = bind(spec, positional, named)?;

        Ok(match spec.name {
            "Create Excel Document" => self.create_excel_document(&a.string("doc_id")?)?.into(),
            "Open Excel Document" => {
                let filename = a.string("filename")?;
                self.open_excel_document(filename, &a.string("doc_id")?)?.into()
            }
            "Open Excel Document From Stream" => {
                let stream = a.bytes("stream")?;
                self.open_excel_document_from_stream(&stream, &a.string("doc_id")?)?.into()
            }
            "Switch Current Excel Document" => {
                self.switch_current_excel_document(&a.string("doc_id")?)?.into()
            }
            "Close Current Excel Document" => self.close_current_excel_document().into(),
            "Close All Excel Documents" => {
                self.close_all_excel_documents();
                KeywordValue::none()
            }
            "Save Excel Document" => {
                self.save_excel_document(a.string("filename")?)?;
                KeywordValue::none()
            }
            "Get List Sheet Names" => self.get_list_sheet_names()?.into_iter().collect(),
            "Make List From Excel Sheet" => {
                let sheet = a.opt_string("sheet_name")?;
                table_value(self.make_list_from_excel_sheet(sheet.as_deref())?)
            }
            "Read Excel Cell" => {
                let row = a.int("row_num", None)?;
                let col = a.int("col_num", None)?;
                let sheet = a.opt_string("sheet_name")?;
                self.read_excel_cell(row, col, sheet.as_deref())?.into()
            }
            "Read Excel Row" => {
                let row = a.int("row_num", None)?;
                let col_offset = a.int("col_offset", Some(0))?;
                let max_num = a.int("max_num", Some(0))?;
                let sheet = a.opt_string("sheet_name")?;
                self.read_excel_row(row, col_offset, max_num, sheet.as_deref())?
                    .into_iter()
                    .collect()
            }
            "Read Excel Column" => {
                let col = a.int("col_num", None)?;
                let row_offset = a.int("row_offset", Some(0))?;
                let max_num = a.int("max_num", Some(0))?;
                let sheet = a.opt_string("sheet_name")?;
                self.read_excel_column(col, row_offset, max_num, sheet.as_deref())?
                    .into_iter()
                    .collect()
            }
            "Write Excel Cell" => {
                let row = a.int("row_num", None)?;
                let col = a.int("col_num", None)?;
                let value = a.value("value")?;
                let sheet = a.opt_string("sheet_name")?;
                self.write_excel_cell(row, col, value, sheet.as_deref())?;
                KeywordValue::none()
            }
            "Write Excel Row" => {
                let row = a.int("row_num", None)?;
                let data = a.values("row_data")?;
                let col_offset = a.int("col_offset", Some(0))?;
                let sheet = a.opt_string("sheet_name")?;
                self.write_excel_row(row, data, col_offset, sheet.as_deref())?;
                KeywordValue::none()
            }
            "Write Excel Rows" => {
                let rows = a.table("rows_data")?;
                let rows_offset = a.int("rows_offset", Some(0))?;
                let col_offset = a.int("col_offset", Some(0))?;
                let sheet = a.opt_string("sheet_name")?;
                self.write_excel_rows(rows, rows_offset, col_offset, sheet.as_deref())?;
                KeywordValue::none()
            }
            "Write Excel Column" => {
                let col = a.int("col_num", None)?;
                let data = a.values("col_data")?;
                let row_offset = a.int("row_offset", Some(0))?;
                let sheet = a.opt_string("sheet_name")?;
                self.write_excel_column(col, data, row_offset, sheet.as_deref())?;
                KeywordValue::none()
            }
            "Excel Documents Equal" => {
                let path_a = a.string("path_a")?;
                let path_b = a.string("path_b")?;
                self.excel_documents_equal(path_a, path_b).into()
            }
            other => return Err(ExcelError::UnknownKeyword(other.to_owned())),
        })
    }
}
