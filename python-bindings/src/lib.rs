//! Python module `excellib`: the keyword library as Robot Framework sees it.
//!
//! ```text
//! *** Settings ***
//! Library    excellib.ExcelLibrary
//! ```
//!
//! The class implements Robot's dynamic library API, every call goes
//! through [`ExcelLibrary::run_keyword`].

use log::debug;
use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyByteArray, PyBytes, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};

use excellib_core::{
    CellValue, ExcelError, ExcelLibrary, KeywordValue, LIBRARY_DOC, LibraryConfig, find_keyword,
    keyword_names,
};

create_exception!(excellib, CreationError, PyException);
create_exception!(excellib, AddressError, PyException);
create_exception!(excellib, ExcelIOError, PyException);
create_exception!(excellib, SuchIdIsExistException, PyException);
create_exception!(excellib, NoSuchIdException, PyException);
create_exception!(excellib, NoOpenedDocumentsException, PyException);
create_exception!(excellib, SheetNotFoundError, PyException);
create_exception!(excellib, InvalidValueError, PyException);
create_exception!(excellib, DocumentFormatError, PyException);
create_exception!(excellib, KeywordArgumentError, PyException);
create_exception!(excellib, NoSuchKeywordError, PyException);

fn to_py_err(e: ExcelError) -> PyErr {
    let msg = e.to_string();
    match e {
        ExcelError::Creation(_) => CreationError::new_err(msg),
        ExcelError::Address(_) => AddressError::new_err(msg),
        ExcelError::Io { .. } => ExcelIOError::new_err(msg),
        ExcelError::DocumentExists(_) => SuchIdIsExistException::new_err(msg),
        ExcelError::NoSuchDocument(_) => NoSuchIdException::new_err(msg),
        ExcelError::NoOpenedDocuments => NoOpenedDocumentsException::new_err(msg),
        ExcelError::SheetNotFound(_) => SheetNotFoundError::new_err(msg),
        ExcelError::InvalidValue(_) => InvalidValueError::new_err(msg),
        ExcelError::Format(_) => DocumentFormatError::new_err(msg),
        ExcelError::Argument(_) => KeywordArgumentError::new_err(msg),
        ExcelError::UnknownKeyword(_) => NoSuchKeywordError::new_err(msg),
    }
}

// ── Python -> keyword values ─────────────────────────────────────

fn from_py(obj: &Bound<'_, PyAny>) -> PyResult<KeywordValue> {
    if obj.is_none() {
        return Ok(KeywordValue::none());
    }
    // bool раньше int, в Python bool является подклассом int
    if obj.is_instance_of::<PyBool>() {
        return Ok(CellValue::Bool(obj.extract::<bool>()?).into());
    }
    if obj.is_instance_of::<PyInt>() {
        return Ok(CellValue::Number(obj.extract::<f64>()?).into());
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(CellValue::Number(obj.extract::<f64>()?).into());
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(CellValue::String(obj.extract::<String>()?).into());
    }
    if let Ok(b) = obj.downcast::<PyBytes>() {
        return Ok(KeywordValue::Bytes(b.as_bytes().to_vec()));
    }
    if let Ok(b) = obj.downcast::<PyByteArray>() {
        return Ok(KeywordValue::Bytes(b.to_vec()));
    }
    if obj.is_instance_of::<PyList>() || obj.is_instance_of::<PyTuple>() {
        let items = obj
            .try_iter()?
            .map(|item| from_py(&item?))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(KeywordValue::List(items));
    }
    // всё остальное (Decimal, datetime, ...) пишем текстом
    Ok(CellValue::String(obj.str()?.to_string()).into())
}

// ── keyword values -> Python ─────────────────────────────────────

fn to_py(py: Python<'_>, value: KeywordValue) -> PyResult<PyObject> {
    Ok(match value {
        KeywordValue::Scalar(CellValue::Empty) => py.None(),
        KeywordValue::Scalar(CellValue::String(s)) => PyString::new(py, &s).into_any().unbind(),
        KeywordValue::Scalar(CellValue::Bool(b)) => PyBool::new(py, b).to_owned().into_any().unbind(),
        KeywordValue::Scalar(CellValue::Number(n)) => {
            // целые числа возвращаем как int, как это делает openpyxl
            if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                (n as i64).into_pyobject(py)?.into_any().unbind()
            } else {
                PyFloat::new(py, n).into_any().unbind()
            }
        }
        KeywordValue::Bytes(b) => PyBytes::new(py, &b).into_any().unbind(),
        KeywordValue::List(items) => {
            let items = items
                .into_iter()
                .map(|item| to_py(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new(py, items)?.into_any().unbind()
        }
    })
}

#[pyclass(name = "ExcelLibrary", module = "excellib")]
struct PyExcelLibrary {
    library: ExcelLibrary,
}

#[pymethods]
impl PyExcelLibrary {
    #[classattr]
    const ROBOT_LIBRARY_SCOPE: &'static str = "GLOBAL";

    #[new]
    #[pyo3(signature = (default_sheet_name = None, compression_level = None))]
    fn new(default_sheet_name: Option<String>, compression_level: Option<i64>) -> Self {
        let mut config = LibraryConfig::from_env();
        if let Some(name) = default_sheet_name {
            config = config.with_default_sheet_name(name);
        }
        if let Some(level) = compression_level {
            config = config.with_compression_level(level);
        }
        PyExcelLibrary {
            library: ExcelLibrary::new(config),
        }
    }

    fn get_keyword_names(&self) -> Vec<&'static str> {
        keyword_names()
    }

    #[pyo3(signature = (name, args, kwargs = None))]
    fn run_keyword(
        &mut self,
        py: Python<'_>,
        name: &str,
        args: &Bound<'_, PyAny>,
        kwargs: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<PyObject> {
        let positional = args
            .try_iter()?
            .map(|arg| from_py(&arg?))
            .collect::<PyResult<Vec<_>>>()?;
        let mut named = Vec::new();
        if let Some(kwargs) = kwargs {
            for (key, value) in kwargs.iter() {
                let key: String = key
                    .extract()
                    .map_err(|_| PyTypeError::new_err("keyword argument names must be strings"))?;
                named.push((key, from_py(&value)?));
            }
        }
        debug!("run_keyword {name}: {} positional, {} named", positional.len(), named.len());
        let result = self
            .library
            .run_keyword(name, positional, named)
            .map_err(to_py_err)?;
        to_py(py, result)
    }

    fn get_keyword_arguments(&self, name: &str) -> PyResult<Vec<String>> {
        find_keyword(name)
            .map(|k| k.signature())
            .ok_or_else(|| to_py_err(ExcelError::UnknownKeyword(name.to_owned())))
    }

    fn get_keyword_documentation(&self, name: &str) -> String {
        match name {
            "__intro__" => LIBRARY_DOC.to_owned(),
            "__init__" => "Takes optional `default_sheet_name` and `compression_level`.".to_owned(),
            _ => find_keyword(name).map(|k| k.doc.to_owned()).unwrap_or_default(),
        }
    }

    /// Identifier of the current document, None when nothing is open.
    #[getter]
    fn current_document(&self) -> Option<String> {
        self.library.current_id().map(str::to_owned)
    }
}

#[pymodule]
fn excellib(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<PyExcelLibrary>()?;
    m.add("CreationError", py.get_type::<CreationError>())?;
    m.add("AddressError", py.get_type::<AddressError>())?;
    m.add("ExcelIOError", py.get_type::<ExcelIOError>())?;
    m.add("SuchIdIsExistException", py.get_type::<SuchIdIsExistException>())?;
    m.add("NoSuchIdException", py.get_type::<NoSuchIdException>())?;
    m.add("NoOpenedDocumentsException", py.get_type::<NoOpenedDocumentsException>())?;
    m.add("SheetNotFoundError", py.get_type::<SheetNotFoundError>())?;
    m.add("InvalidValueError", py.get_type::<InvalidValueError>())?;
    m.add("DocumentFormatError", py.get_type::<DocumentFormatError>())?;
    m.add("KeywordArgumentError", py.get_type::<KeywordArgumentError>())?;
    m.add("NoSuchKeywordError", py.get_type::<NoSuchKeywordError>())?;
    Ok(())
}
