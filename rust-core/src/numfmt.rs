//! numfmt.rs – форматы чисел из styles.xml: какие стили означают дату/время

use std::collections::HashMap;

use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveTime};
use quick_xml::{Reader, events::Event};

use crate::xlsx::attr;

/// How a numeric cell with a given style should be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum NumberKind {
    #[default]
    Plain,
    Date,
    Time,
}

/// Last serial Excel can display (9999-12-31).
const MAX_SERIAL_DAYS: f64 = 2_958_465.0;

fn builtin_kind(id: u32) -> NumberKind {
    match id {
        14..=17 | 22 => NumberKind::Date,
        18..=21 | 45..=47 => NumberKind::Time,
        _ => NumberKind::Plain,
    }
}

/// Classifies a custom format code. Quoted literals, `\x` escapes and
/// `[...]` sections (colours, locales, elapsed time) are ignored.
fn custom_kind(code: &str) -> NumberKind {
    let mut tokens = String::new();
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '[' => {
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            c => tokens.push(c.to_ascii_lowercase()),
        }
    }
    let date = tokens.contains('y') || tokens.contains('d');
    let time = tokens.contains('h') || tokens.contains('s');
    match (date, time, tokens.contains('m')) {
        (true, _, _) => NumberKind::Date,
        (false, true, _) => NumberKind::Time,
        (false, false, true) => NumberKind::Date, // "mmm" / "mmmm"
        _ => NumberKind::Plain,
    }
}

/// Number kind per `cellXfs` index (the `s` attribute of a cell).
pub(crate) fn parse_styles(xml: &[u8]) -> anyhow::Result<Vec<NumberKind>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr(e, b"numFmtId")
                        .context("<numFmt> without numFmtId")?;
                    let code = attr(e, b"formatCode").unwrap_or_default();
                    custom.insert(id.parse().with_context(|| format!("bad numFmtId {id}"))?, code);
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let id = attr(e, b"numFmtId")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    xf_formats.push(id);
                }
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(xf_formats
        .into_iter()
        .map(|id| match custom.get(&id) {
            Some(code) => custom_kind(code),
            None => builtin_kind(id),
        })
        .collect())
}

/// Excel serial number rendered the way the value is displayed:
/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or `HH:MM:SS`.
/// `None` when the serial is outside Excel's calendar.
pub(crate) fn serial_to_iso(serial: f64, date1904: bool, kind: NumberKind) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_SERIAL_DAYS + 1.0 {
        return None;
    }
    let mut days = serial.floor() as i64;
    let mut secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    if secs >= 86_400 {
        days += 1;
        secs -= 86_400;
    }
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    if kind == NumberKind::Time && days == 0 {
        return Some(time.format("%H:%M:%S").to_string());
    }
    // в системе 1900 есть несуществующее 29.02.1900 (serial 60)
    let base = match (date1904, days < 60) {
        (true, _) => NaiveDate::from_ymd_opt(1904, 1, 1)?,
        (false, true) => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        (false, false) => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    let date = base.checked_add_signed(Duration::days(days))?;
    Some(if secs == 0 {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.and_time(time).format("%Y-%m-%d %H:%M:%S").to_string()
    })
}
