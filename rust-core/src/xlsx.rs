//! xlsx.rs – чтение/запись пакета XLSX (zip + SpreadsheetML)

use std::{
    borrow::Cow,
    collections::HashMap,
    fs::File,
    io::{Cursor, Read, Seek, Write},
    path::Path,
};

use ::zip as zip_crate;
use anyhow::{Context, bail};
use log::debug;
use quick_xml::{
    Reader, Writer,
    escape::{resolve_predefined_entity, unescape},
    events::{BytesDecl, BytesStart, BytesText, Event},
};
use tempfile::NamedTempFile;

use crate::{
    address::{CellAddress, MAX_ROW, col_to_letters},
    config::LibraryConfig,
    numfmt::{self, NumberKind},
    error::{ExcelError, Result},
    value::CellValue,
    workbook::{Workbook, Worksheet},
};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_OFFICE_DOC: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Files
impl Workbook {
    /// Loads an XLSX file; the document is named after the file.
    pub fn open<P: AsRef<Path>>(src: P) -> Result<Self> {
        Self::open_with(src, &LibraryConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(src: P, cfg: &LibraryConfig) -> Result<Self> {
        let src = src.as_ref();
        let file = File::open(src).map_err(|e| ExcelError::io(src, e))?;
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| src.display().to_string());
        let mut wb = Workbook::empty(&name)?;
        read_package(&mut wb, file, cfg)
            .with_context(|| format!("cannot read {}", src.display()))?;
        debug!("opened {} ({} sheets)", src.display(), wb.sheets().len());
        Ok(wb)
    }

    /// Loads a document from an in-memory XLSX stream (e.g. an HTTP body).
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self> {
        Self::from_bytes_with(bytes, name, &LibraryConfig::default())
    }

    pub fn from_bytes_with(bytes: &[u8], name: &str, cfg: &LibraryConfig) -> Result<Self> {
        let mut wb = Workbook::empty(name)?;
        read_package(&mut wb, Cursor::new(bytes), cfg)?;
        Ok(wb)
    }

    /// Serializes the document into XLSX bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&LibraryConfig::default())
    }

    pub fn to_bytes_with(&self, cfg: &LibraryConfig) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        write_package(self, &mut out, cfg.compression_level)?;
        Ok(out.into_inner())
    }

    /// Saves the document to `dst`.
    ///
    /// The package is written into a temporary file next to `dst` and then
    /// renamed over it, so a failed save never leaves a truncated file.
    ///
    /// # Errors
    /// [`ExcelError::Io`] when the target directory is missing or unwritable.
    pub fn save<P: AsRef<Path>>(&self, dst: P) -> Result<()> {
        self.save_with(dst, &LibraryConfig::default())
    }

    pub fn save_with<P: AsRef<Path>>(&self, dst: P, cfg: &LibraryConfig) -> Result<()> {
        let dst = dst.as_ref();
        let bytes = self.to_bytes_with(cfg)?;
        let dir = match dst.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ExcelError::io(dst, e))?;
        tmp.write_all(&bytes).map_err(|e| ExcelError::io(dst, e))?;
        tmp.persist(dst).map_err(|e| ExcelError::io(dst, e.error))?;
        debug!("saved {} to {}", self.name(), dst.display());
        Ok(())
    }
}

/// Sheet titles of an XLSX file, in tab order, without loading cells.
pub fn scan<P: AsRef<Path>>(src: P) -> Result<Vec<String>> {
    let src = src.as_ref();
    let file = File::open(src).map_err(|e| ExcelError::io(src, e))?;
    let mut zip = zip_crate::ZipArchive::new(file).context("not a zip archive")?;
    let max = LibraryConfig::default().max_part_bytes;
    let wb_xml = read_part(&mut zip, "xl/workbook.xml", max)?
        .context("xl/workbook.xml not found")?;
    let rels_xml = read_part(&mut zip, "xl/_rels/workbook.xml.rels", max)?
        .context("xl/_rels/workbook.xml.rels not found")?;
    let info = parse_workbook_xml(&wb_xml)?;
    let rels = parse_workbook_rels(&rels_xml)?;
    let mut titles = Vec::new();
    for (title, rid) in info.sheets {
        if rel_target(&rels, &rid, &title)?.is_some() {
            titles.push(title);
        }
    }
    Ok(titles)
}

/* ============================== READER ==================================== */

fn read_package<R: Read + Seek>(
    wb: &mut Workbook,
    src: R,
    cfg: &LibraryConfig,
) -> anyhow::Result<()> {
    let mut zip = zip_crate::ZipArchive::new(src).context("not a zip archive")?;
    let max = cfg.max_part_bytes;

    // ── workbook.xml ───────────────────────────────────────────────
    let wb_xml = read_part(&mut zip, "xl/workbook.xml", max)?
        .context("xl/workbook.xml not found")?;
    let info = parse_workbook_xml(&wb_xml)?;

    // ── workbook.xml.rels ──────────────────────────────────────────
    let rels_xml = read_part(&mut zip, "xl/_rels/workbook.xml.rels", max)?
        .context("xl/_rels/workbook.xml.rels not found")?;
    let rels = parse_workbook_rels(&rels_xml)?;

    // ── sharedStrings.xml (может отсутствовать) ─────────────────────
    let shared = match read_part(&mut zip, "xl/sharedStrings.xml", max)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    // ── styles.xml: только форматы дат ─────────────────────────────
    let styles = match read_part(&mut zip, "xl/styles.xml", max)? {
        Some(xml) => numfmt::parse_styles(&xml)?,
        None => Vec::new(),
    };
    let ctx = SheetContext {
        shared: &shared,
        styles: &styles,
        date1904: info.date1904,
    };

    let mut active = 0;
    for (idx, (title, rid)) in info.sheets.into_iter().enumerate() {
        // chartsheet / dialogsheet / macrosheet не содержат ячеек
        let Some(path) = rel_target(&rels, &rid, &title)? else {
            continue;
        };
        let xml = read_part(&mut zip, path, max)?
            .with_context(|| format!("{path} not found"))?;
        if idx == info.active_tab {
            active = wb.sheets().len();
        }
        let ws = wb.create_sheet(&title)?;
        parse_sheet(&xml, &ctx, ws).with_context(|| format!("sheet {title}"))?;
    }
    wb.set_active_index(active);
    Ok(())
}

/// Worksheet part behind `rid`; `None` for sheets of another kind.
fn rel_target<'a>(
    rels: &'a HashMap<String, (String, String)>,
    rid: &str,
    title: &str,
) -> anyhow::Result<Option<&'a str>> {
    let (kind, path) = rels
        .get(rid)
        .with_context(|| format!("relationship {rid} for sheet {title} not found"))?;
    if kind.ends_with("/worksheet") {
        Ok(Some(path))
    } else {
        debug!("skipping sheet {title}: {kind}");
        Ok(None)
    }
}

/// Reads a whole part, `None` when the archive has no such entry.
fn read_part<R: Read + Seek>(
    zip: &mut zip_crate::ZipArchive<R>,
    name: &str,
    max: u64,
) -> anyhow::Result<Option<Vec<u8>>> {
    let part = match zip.by_name(name) {
        Ok(p) => p,
        Err(zip_crate::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("cannot open {name}")),
    };
    if part.size() > max {
        bail!("{name} is {} bytes, limit is {max}", part.size());
    }
    let mut buf = Vec::with_capacity(part.size() as usize);
    part.take(max.saturating_add(1)).read_to_end(&mut buf)?;
    if buf.len() as u64 > max {
        bail!("{name} exceeds {max} bytes");
    }
    Ok(Some(buf))
}

pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes().with_checks(false).flatten().find_map(|a| {
        (a.key.as_ref() == key).then(|| {
            let raw = String::from_utf8_lossy(&a.value);
            unescape(&raw).map(Cow::into_owned).unwrap_or_else(|_| raw.into_owned())
        })
    })
}

#[derive(Default)]
struct WorkbookInfo {
    /// `(title, r:id)` in tab order
    sheets: Vec<(String, String)>,
    active_tab: usize,
    date1904: bool,
}

fn parse_workbook_xml(xml: &[u8]) -> anyhow::Result<WorkbookInfo> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut info = WorkbookInfo::default();
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attr(e, b"name").context("<sheet> without name")?;
                    let rid = attr(e, b"r:id").context("<sheet> without r:id")?;
                    info.sheets.push((name, rid));
                }
                b"workbookView" => {
                    if let Some(tab) = attr(e, b"activeTab").and_then(|v| v.parse().ok()) {
                        info.active_tab = tab;
                    }
                }
                b"workbookPr" => {
                    info.date1904 = matches!(attr(e, b"date1904").as_deref(), Some("1" | "true"));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(info)
}

/// `rId -> (relationship type, zip path)`.
fn parse_workbook_rels(xml: &[u8]) -> anyhow::Result<HashMap<String, (String, String)>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut rels = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let (Some(id), Some(target), Some(kind)) =
                    (attr(e, b"Id"), attr(e, b"Target"), attr(e, b"Type"))
                else {
                    continue;
                };
                let path = match target.strip_prefix('/') {
                    Some(abs) => abs.to_owned(),
                    None => format!("xl/{target}"),
                };
                rels.insert(id, (kind, path));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

fn parse_shared_strings(xml: &[u8]) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    let mut in_rph = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_rph = true,
                b"t" if !in_rph => in_t = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => strings.push(decode_excel_escapes(&current)),
                b"rPh" => in_rph = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(ref t) if in_t => push_text(&mut current, t)?,
            Event::CData(ref t) if in_t => current.push_str(std::str::from_utf8(t)?),
            Event::GeneralRef(ref r) if in_t => push_entity(&mut current, r)?,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum TextSlot {
    None,
    Value,
    Formula,
    Inline,
}

/// Workbook-wide data a sheet needs to resolve its cells.
struct SheetContext<'a> {
    shared: &'a [String],
    styles: &'a [NumberKind],
    date1904: bool,
}

#[derive(Default)]
struct PendingCell {
    kind: Option<String>,
    style: Option<usize>,
    value: String,
    formula: String,
    inline: String,
}

fn parse_sheet(xml: &[u8], ctx: &SheetContext<'_>, ws: &mut Worksheet) -> anyhow::Result<()> {
    let mut reader = Reader::from_reader(xml);

    let mut row_num = 0u32;
    let mut next_col = 1u32;
    let mut cell: Option<(CellAddress, PendingCell)> = None;
    let mut slot = TextSlot::None;
    let mut in_is = false;
    let mut in_rph = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                row_num = match attr(e, b"r") {
                    Some(r) => r.parse().with_context(|| format!("bad row number {r}"))?,
                    None => row_num.checked_add(1).context("row number overflow")?,
                };
                if !(1..=MAX_ROW).contains(&row_num) {
                    bail!("row number {row_num} out of range 1..={MAX_ROW}");
                }
                next_col = 1;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                let addr = cell_address(e, row_num, next_col)?;
                next_col = addr.col + 1;
                let pending = PendingCell {
                    kind: attr(e, b"t"),
                    style: attr(e, b"s").and_then(|v| v.parse().ok()),
                    ..Default::default()
                };
                cell = Some((addr, pending));
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                next_col = cell_address(e, row_num, next_col)?.col + 1;
            }
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"v" => slot = TextSlot::Value,
                b"f" => slot = TextSlot::Formula,
                b"is" => in_is = true,
                b"rPh" => in_rph = true,
                b"t" if in_is && !in_rph => slot = TextSlot::Inline,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" | b"f" | b"t" => slot = TextSlot::None,
                b"is" => in_is = false,
                b"rPh" => in_rph = false,
                b"c" => {
                    if let Some((addr, pending)) = cell.take() {
                        let value = resolve_cell(pending, ctx)
                            .with_context(|| format!("cell {addr}"))?;
                        ws.set_cell(addr, value)?;
                    }
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if let Some(buf) = slot_buffer(&mut cell, slot) {
                    push_text(buf, t)?;
                }
            }
            Event::CData(ref t) => {
                if let Some(buf) = slot_buffer(&mut cell, slot) {
                    buf.push_str(std::str::from_utf8(t)?);
                }
            }
            Event::GeneralRef(ref r) => {
                if let Some(buf) = slot_buffer(&mut cell, slot) {
                    push_entity(buf, r)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn cell_address(e: &BytesStart<'_>, row: u32, col: u32) -> anyhow::Result<CellAddress> {
    Ok(match attr(e, b"r") {
        Some(r) => r.parse::<CellAddress>()?,
        None => CellAddress::new(row, col)?,
    })
}

fn slot_buffer(cell: &mut Option<(CellAddress, PendingCell)>, slot: TextSlot) -> Option<&mut String> {
    let (_, pending) = cell.as_mut()?;
    match slot {
        TextSlot::None => None,
        TextSlot::Value => Some(&mut pending.value),
        TextSlot::Formula => Some(&mut pending.formula),
        TextSlot::Inline => Some(&mut pending.inline),
    }
}

fn resolve_cell(cell: PendingCell, ctx: &SheetContext<'_>) -> anyhow::Result<CellValue> {
    // формулы возвращаем как текст "=..."; shared-формулы без текста читаем по кэшу
    if !cell.formula.is_empty() {
        return Ok(CellValue::String(format!("={}", cell.formula)));
    }
    Ok(match cell.kind.as_deref() {
        Some("s") => {
            let idx: usize = cell
                .value
                .trim()
                .parse()
                .with_context(|| format!("bad shared string index {}", cell.value))?;
            let s = ctx
                .shared
                .get(idx)
                .with_context(|| format!("shared string {idx} out of range"))?;
            CellValue::String(s.clone())
        }
        Some("inlineStr") => CellValue::String(decode_excel_escapes(&cell.inline)),
        Some("str") | Some("e") | Some("d") => CellValue::String(cell.value),
        Some("b") => CellValue::Bool(cell.value.trim() == "1"),
        _ if cell.value.trim().is_empty() => CellValue::Empty,
        _ => {
            let n: f64 = cell
                .value
                .trim()
                .parse()
                .with_context(|| format!("bad number {}", cell.value))?;
            // числа с форматом даты отдаём строкой ISO, как видит их пользователь
            let kind = cell
                .style
                .and_then(|s| ctx.styles.get(s).copied())
                .unwrap_or_default();
            match kind {
                NumberKind::Plain => CellValue::Number(n),
                _ => numfmt::serial_to_iso(n, ctx.date1904, kind)
                    .map_or(CellValue::Number(n), CellValue::String),
            }
        }
    })
}

fn push_text(out: &mut String, text: &BytesText<'_>) -> anyhow::Result<()> {
    let raw = std::str::from_utf8(text)?;
    out.push_str(&unescape(raw)?);
    Ok(())
}

/// `&amp;`, `&#10;`, `&#x41;` split out by the reader.
fn push_entity(out: &mut String, name: &[u8]) -> anyhow::Result<()> {
    let name = std::str::from_utf8(name)?;
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => num.parse::<u32>(),
        }
        .with_context(|| format!("bad character reference &{name};"))?;
        out.push(char::from_u32(code).with_context(|| format!("invalid character &{name};"))?);
        return Ok(());
    }
    match resolve_predefined_entity(name) {
        Some(s) => out.push_str(s),
        None => bail!("unknown entity &{name};"),
    }
    Ok(())
}

/// `_x000D_` → `\r`; `_x005F_` escapes a literal `_`.
fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = tail
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| tail.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &tail[7..];
            }
            None => {
                out.push_str("_x");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Inverse of [`decode_excel_escapes`] for characters XML 1.0 cannot carry.
fn encode_excel_escapes(s: &str) -> Cow<'_, str> {
    let needs = s.chars().any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
        || s.contains("_x");
    if !needs {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for (i, c) in s.char_indices() {
        if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else if c == '_' && looks_escaped(&s[i..]) {
            out.push_str("_x005F_");
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn looks_escaped(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7
        && &b[..2] == b"_x"
        && b[2..6].iter().all(u8::is_ascii_hexdigit)
        && b[6] == b'_'
}

/* ============================== WRITER ==================================== */

fn write_package<W: Write + Seek>(wb: &Workbook, out: W, level: i64) -> anyhow::Result<()> {
    let mut zout = zip_crate::ZipWriter::new(out);
    let opt: zip_crate::write::FileOptions<'_, ()> = zip_crate::write::FileOptions::default()
        .compression_method(zip_crate::CompressionMethod::Deflated)
        .compression_level(Some(level));

    let count = wb.sheets().len();

    zout.start_file("[Content_Types].xml", opt)?;
    zout.write_all(content_types_xml(count).as_bytes())?;

    zout.start_file("_rels/.rels", opt)?;
    zout.write_all(package_rels_xml().as_bytes())?;

    zout.start_file("xl/workbook.xml", opt)?;
    zout.write_all(&workbook_xml(wb)?)?;

    zout.start_file("xl/_rels/workbook.xml.rels", opt)?;
    zout.write_all(workbook_rels_xml(count).as_bytes())?;

    zout.start_file("xl/styles.xml", opt)?;
    zout.write_all(STYLES_XML.as_bytes())?;

    for (i, ws) in wb.sheets().iter().enumerate() {
        zout.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), opt)?;
        zout.write_all(&sheet_xml(ws)?)?;
    }

    zout.finish()?;
    Ok(())
}

fn content_types_xml(sheets: usize) -> String {
    let mut overrides = String::new();
    for i in 1..=sheets {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>{overrides}</Types>"#
    )
}

fn package_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{REL_OFFICE_DOC}" Target="xl/workbook.xml"/></Relationships>"#
    )
}

fn workbook_rels_xml(sheets: usize) -> String {
    let mut rels = String::new();
    for i in 1..=sheets {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{i}" Type="{REL_WORKSHEET}" Target="worksheets/sheet{i}.xml"/>"#
        ));
    }
    let styles_id = sheets + 1;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PKG_REL}">{rels}<Relationship Id="rId{styles_id}" Type="{REL_STYLES}" Target="styles.xml"/></Relationships>"#
    )
}

fn workbook_xml(wb: &Workbook) -> anyhow::Result<Vec<u8>> {
    let active = wb.active_index();

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer
        .create_element("workbook")
        .with_attribute(("xmlns", NS_MAIN))
        .with_attribute(("xmlns:r", NS_REL))
        .write_inner_content(|w| {
            w.create_element("bookViews").write_inner_content(|w| {
                w.create_element("workbookView")
                    .with_attribute(("activeTab", active.to_string().as_str()))
                    .write_empty()?;
                Ok(())
            })?;
            w.create_element("sheets").write_inner_content(|w| {
                for (i, ws) in wb.sheets().iter().enumerate() {
                    let id = (i + 1).to_string();
                    let rid = format!("rId{id}");
                    w.create_element("sheet")
                        .with_attribute(("name", ws.title()))
                        .with_attribute(("sheetId", id.as_str()))
                        .with_attribute(("r:id", rid.as_str()))
                        .write_empty()?;
                }
                Ok(())
            })?;
            Ok(())
        })?;
    Ok(writer.into_inner())
}

fn sheet_xml(ws: &Worksheet) -> anyhow::Result<Vec<u8>> {
    // группируем ячейки по строкам, BTreeMap уже отсортирован (row, col)
    let mut rows: Vec<(u32, Vec<(&CellAddress, &CellValue)>)> = Vec::new();
    for (addr, value) in ws.cells() {
        match rows.last_mut() {
            Some((r, cells)) if *r == addr.row => cells.push((addr, value)),
            _ => rows.push((addr.row, vec![(addr, value)])),
        }
    }
    let dimension = if ws.is_empty() {
        "A1".to_owned()
    } else {
        format!(
            "A1:{}{}",
            col_to_letters(ws.max_column()),
            ws.max_row()
        )
    };

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer
        .create_element("worksheet")
        .with_attribute(("xmlns", NS_MAIN))
        .write_inner_content(|w| {
            w.create_element("dimension")
                .with_attribute(("ref", dimension.as_str()))
                .write_empty()?;
            w.create_element("sheetData").write_inner_content(|w| {
                for (row_num, cells) in &rows {
                    w.create_element("row")
                        .with_attribute(("r", row_num.to_string().as_str()))
                        .write_inner_content(|w| {
                            for (addr, value) in cells {
                                write_cell(w, addr, value)?;
                            }
                            Ok(())
                        })?;
                }
                Ok(())
            })?;
            Ok(())
        })?;
    Ok(writer.into_inner())
}

fn write_cell<W: Write>(
    w: &mut Writer<W>,
    addr: &CellAddress,
    value: &CellValue,
) -> std::io::Result<()> {
    let coord = addr.to_string();
    let c_elem = w.create_element("c").with_attribute(("r", coord.as_str()));
    if let Some(formula) = value.formula() {
        c_elem.write_inner_content(|w2| {
            w2.create_element("f")
                .write_text_content(BytesText::new(formula))?;
            Ok(())
        })?;
        return Ok(());
    }
    match value {
        CellValue::Empty => {}
        CellValue::String(s) => {
            let text = encode_excel_escapes(s);
            let preserve = text.starts_with(char::is_whitespace)
                || text.ends_with(char::is_whitespace)
                || text.contains('\n');
            c_elem
                .with_attribute(("t", "inlineStr"))
                .write_inner_content(|w2| {
                    w2.create_element("is").write_inner_content(|w3| {
                        let mut t = w3.create_element("t");
                        if preserve {
                            t = t.with_attribute(("xml:space", "preserve"));
                        }
                        t.write_text_content(BytesText::new(&text))?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
        }
        CellValue::Number(n) => {
            let v = n.to_string();
            c_elem.write_inner_content(|w2| {
                w2.create_element("v").write_text_content(BytesText::new(&v))?;
                Ok(())
            })?;
        }
        CellValue::Bool(b) => {
            c_elem
                .with_attribute(("t", "b"))
                .write_inner_content(|w2| {
                    w2.create_element("v")
                        .write_text_content(BytesText::new(if *b { "1" } else { "0" }))?;
                    Ok(())
                })?;
        }
    }
    Ok(())
}
