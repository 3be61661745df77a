#[cfg(test)]
use crate::{
    CellAddress, CellValue, ExcelError, ExcelLibrary, KeywordValue, LibraryConfig, Workbook,
    documents_equal, find_keyword, scan,
};
#[cfg(test)]
use anyhow::Result;
#[cfg(test)]
use std::io::{Cursor, Write};

#[cfg(test)]
fn addr(row: u32, col: u32) -> CellAddress {
    CellAddress::new(row, col).unwrap()
}

#[cfg(test)]
fn s(v: &str) -> KeywordValue {
    KeywordValue::Scalar(CellValue::from(v))
}

/* ============================== HANDLE ==================================== */

#[test]
fn new_document_has_no_values() -> Result<()> {
    let wb = Workbook::create("fresh")?;
    for (row, col) in [(1, 1), (7, 3), (1_048_576, 16_384)] {
        assert_eq!(wb.read_cell(addr(row, col))?, CellValue::Empty);
    }
    assert_eq!(wb.sheet_names(), vec!["Sheet".to_owned()]);
    Ok(())
}

#[test]
fn written_values_read_back() -> Result<()> {
    let mut wb = Workbook::create("rw")?;
    let values = [
        CellValue::from("text"),
        CellValue::from(42i64),
        CellValue::from(-0.125),
        CellValue::from(true),
        CellValue::from(false),
        CellValue::from("=SUM(A1:A3)"),
        CellValue::from(""),
    ];
    for (i, v) in values.iter().enumerate() {
        wb.write_cell(addr(i as u32 + 1, 2), v.clone())?;
    }
    for (i, v) in values.iter().enumerate() {
        assert_eq!(&wb.read_cell(addr(i as u32 + 1, 2))?, v);
    }

    wb.write_cell(addr(1, 2), CellValue::Empty)?;
    assert_eq!(wb.read_cell(addr(1, 2))?, CellValue::Empty);
    Ok(())
}

#[test]
fn handle_displays_its_name() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let wb = Workbook::create("doc_name")?;
    wb.save(dir.path().join("doc_name.xlsx"))?;
    assert_eq!(wb.to_string(), "doc_name");
    assert!(dir.path().join("doc_name.xlsx").exists());
    Ok(())
}

#[test]
fn out_of_range_write_is_rejected() -> Result<()> {
    let mut wb = Workbook::create("bounds")?;
    wb.write_cell(addr(2, 2), "keep")?;
    let before = wb.clone();

    for bad in [
        CellAddress { row: 0, col: 1 },
        CellAddress { row: 1, col: 0 },
        CellAddress { row: 1_048_577, col: 1 },
        CellAddress { row: 1, col: 16_385 },
    ] {
        let err = wb.write_cell(bad, "x").unwrap_err();
        assert!(matches!(err, ExcelError::Address(_)), "{err}");
    }
    assert_eq!(wb, before);
    Ok(())
}

#[test]
fn non_finite_numbers_are_rejected() -> Result<()> {
    let mut wb = Workbook::create("nan")?;
    let err = wb.write_cell(addr(1, 1), f64::NAN).unwrap_err();
    assert!(matches!(err, ExcelError::InvalidValue(_)));
    assert_eq!(wb.read_cell(addr(1, 1))?, CellValue::Empty);
    Ok(())
}

#[test]
fn invalid_names_fail_creation() {
    assert!(matches!(Workbook::create("  "), Err(ExcelError::Creation(_))));
    let cfg = LibraryConfig::default().with_default_sheet_name("bad/name");
    assert!(matches!(
        Workbook::create_with("ok", &cfg),
        Err(ExcelError::Creation(_))
    ));

    let mut wb = Workbook::create("dups").unwrap();
    assert!(matches!(wb.create_sheet("sheet"), Err(ExcelError::Creation(_))));
    assert!(matches!(
        wb.create_sheet("a title that is way longer than 31"),
        Err(ExcelError::Creation(_))
    ));
}

#[test]
fn labels_parse_and_print() -> Result<()> {
    assert_eq!("A1".parse::<CellAddress>()?, addr(1, 1));
    assert_eq!("$c$7".parse::<CellAddress>()?, addr(7, 3));
    assert_eq!("XFD1048576".parse::<CellAddress>()?, addr(1_048_576, 16_384));
    assert!(matches!("XFE1".parse::<CellAddress>(), Err(ExcelError::Address(_))));
    assert!(matches!("A0".parse::<CellAddress>(), Err(ExcelError::Address(_))));
    assert!("1A".parse::<CellAddress>().is_err());
    assert_eq!(addr(12, 28).to_string(), "AB12");
    assert_eq!(addr(1, 16_384).to_string(), "XFD1");
    Ok(())
}

/* ============================== FILES ===================================== */

#[test]
fn saved_document_equals_itself() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("self.xlsx");

    let mut wb = Workbook::create("self")?;
    wb.write_cell(addr(1, 1), "Name")?;
    wb.write_cell(addr(1, 2), 3.5)?;
    wb.write_cell(addr(4, 3), true)?;
    wb.create_sheet("Second")?.set_cell(addr(2, 2), "other".into())?;
    wb.save(&path)?;

    assert!(documents_equal(&path, &path));

    let reopened = Workbook::open(&path)?;
    assert!(reopened.content_eq(&wb));
    assert_eq!(reopened.name(), "self.xlsx");
    assert_eq!(scan(&path)?, vec!["Sheet".to_owned(), "Second".to_owned()]);
    Ok(())
}

#[test]
fn comparison_is_symmetric() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.xlsx");
    let b = dir.path().join("b.xlsx");
    let c = dir.path().join("c.xlsx");

    let mut wb = Workbook::create("a")?;
    wb.write_cell(addr(1, 1), "same")?;
    wb.save(&a)?;
    wb.save(&c)?;
    wb.write_cell(addr(1, 1), "changed")?;
    wb.save(&b)?;

    assert!(!documents_equal(&a, &b));
    assert_eq!(documents_equal(&a, &b), documents_equal(&b, &a));
    assert!(documents_equal(&a, &c));
    assert!(documents_equal(&c, &a));

    let missing = dir.path().join("missing.xlsx");
    assert!(!documents_equal(&a, &missing));
    assert!(!documents_equal(&missing, &a));
    Ok(())
}

#[test]
fn sheet_order_matters_for_equality() -> Result<()> {
    let mut one = Workbook::create("one")?;
    one.create_sheet("B")?;
    let mut two = Workbook::create("two")?;
    two.create_sheet("B")?;
    assert!(one.content_eq(&two));

    let mut three = Workbook::create_with("three", &LibraryConfig::default().with_default_sheet_name("B"))?;
    three.create_sheet("Sheet")?;
    assert!(!one.content_eq(&three));
    Ok(())
}

#[test]
fn active_sheet_survives_save() -> Result<()> {
    let mut wb = Workbook::create("tabs")?;
    wb.create_sheet("Second")?;
    wb.set_active("Second")?;
    wb.write_cell(addr(1, 1), "on second")?;
    assert!(matches!(wb.set_active("Third"), Err(ExcelError::SheetNotFound(_))));

    let back = Workbook::from_bytes(&wb.to_bytes()?, "tabs")?;
    assert_eq!(back.active_sheet()?.title(), "Second");
    assert_eq!(back.read_cell(addr(1, 1))?, CellValue::from("on second"));
    Ok(())
}

#[test]
fn save_into_missing_directory_is_io_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let wb = Workbook::create("io")?;
    let err = wb.save(dir.path().join("no/such/dir/out.xlsx")).unwrap_err();
    assert!(matches!(err, ExcelError::Io { .. }), "{err}");
    Ok(())
}

#[test]
fn awkward_strings_survive_a_round_trip() -> Result<()> {
    let tricky = [
        "  padded  ",
        "line\nbreak",
        "a < b & c > \"d\" 'e'",
        "bell\u{7}char",
        "_x0041_ stays literal",
        "кириллица",
    ];
    let mut wb = Workbook::create("tricky")?;
    for (i, t) in tricky.iter().enumerate() {
        wb.write_cell(addr(i as u32 + 1, 1), *t)?;
    }
    let back = Workbook::from_bytes(&wb.to_bytes()?, "back")?;
    for (i, t) in tricky.iter().enumerate() {
        assert_eq!(back.read_cell(addr(i as u32 + 1, 1))?, CellValue::from(*t));
    }
    Ok(())
}

#[test]
fn garbage_is_a_format_error() {
    let err = Workbook::from_bytes(b"definitely not a zip", "junk").unwrap_err();
    assert!(matches!(err, ExcelError::Format(_)));
}

#[test]
fn oversized_parts_are_refused() -> Result<()> {
    let mut wb = Workbook::create("big")?;
    wb.write_cell(addr(1, 1), "x".repeat(4096))?;
    let bytes = wb.to_bytes()?;
    let cfg = LibraryConfig::default().with_max_part_bytes(1024);
    assert!(matches!(
        Workbook::from_bytes_with(&bytes, "big", &cfg),
        Err(ExcelError::Format(_))
    ));
    Ok(())
}

#[cfg(test)]
fn build_package(parts: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut zout = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opt = zip::write::SimpleFileOptions::default();
    for (name, body) in parts {
        zout.start_file(*name, opt)?;
        zout.write_all(body.as_bytes())?;
    }
    Ok(zout.finish()?.into_inner())
}

#[cfg(test)]
fn foreign_xlsx() -> Result<Vec<u8>> {
    build_package(&[
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <bookViews><workbookView activeTab="1"/></bookViews>
  <sheets>
    <sheet name="Data &amp; More" sheetId="1" r:id="rId7"/>
    <sheet name="Empty" sheetId="2" r:id="rId8"/>
  </sheets>
</workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/data.xml"/>
  <Relationship Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/empty.xml"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#,
        ),
        (
            "xl/sharedStrings.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>plain</t></si>
  <si><r><t>rich </t></r><r><t>text</t></r><rPh><t>skip</t></rPh></si>
  <si><t>Tom &amp; Jerry_x000D_</t></si>
</sst>"#,
        ),
        (
            "xl/worksheets/data.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1">
      <c r="A1" t="s"><v>0</v></c>
      <c r="B1" t="s"><v>1</v></c>
      <c r="C1" t="s"><v>2</v></c>
    </row>
    <row r="3">
      <c><v>1.5E3</v></c>
      <c t="b"><v>1</v></c>
      <c t="str"><f>CONCAT(A1,"x")</f><v>plainx</v></c>
      <c t="e"><v>#N/A</v></c>
      <c r="F3" s="1"/>
      <c><v>7</v></c>
    </row>
  </sheetData>
</worksheet>"#,
        ),
        (
            "xl/worksheets/empty.xml",
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#,
        ),
    ])
}

#[test]
fn reads_documents_written_by_other_tools() -> Result<()> {
    let wb = Workbook::from_bytes(&foreign_xlsx()?, "foreign")?;
    assert_eq!(wb.sheet_names(), vec!["Data & More".to_owned(), "Empty".to_owned()]);
    assert_eq!(wb.active_sheet()?.title(), "Empty");

    let data = wb.sheet(Some("Data & More"))?;
    assert_eq!(data.cell(addr(1, 1)), &CellValue::from("plain"));
    assert_eq!(data.cell(addr(1, 2)), &CellValue::from("rich text"));
    assert_eq!(data.cell(addr(1, 3)), &CellValue::from("Tom & Jerry\r"));
    assert_eq!(data.cell(addr(3, 1)), &CellValue::Number(1500.0));
    assert_eq!(data.cell(addr(3, 2)), &CellValue::Bool(true));
    assert_eq!(data.cell(addr(3, 3)), &CellValue::from("=CONCAT(A1,\"x\")"));
    assert_eq!(data.cell(addr(3, 4)), &CellValue::from("#N/A"));
    assert_eq!(data.cell(addr(3, 6)), &CellValue::Empty);
    assert_eq!(data.cell(addr(3, 7)), &CellValue::Number(7.0));
    assert_eq!(data.len(), 8);
    assert!(wb.sheet(Some("Empty"))?.is_empty());
    Ok(())
}

#[cfg(test)]
const WORKSHEET_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

#[cfg(test)]
fn one_sheet_xlsx(sheet_xml: &str, styles_xml: Option<&str>) -> Result<Vec<u8>> {
    let workbook = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    let rels = format!(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{WORKSHEET_REL}" Target="worksheets/sheet1.xml"/></Relationships>"#
    );
    let sheet = format!(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_xml}</sheetData></worksheet>"#
    );
    let mut parts = vec![
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels.as_str()),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ];
    if let Some(styles) = styles_xml {
        parts.push(("xl/styles.xml", styles));
    }
    build_package(&parts)
}

#[test]
fn chart_sheets_are_skipped() -> Result<()> {
    let rels = format!(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="{WORKSHEET_REL}" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet" Target="chartsheets/sheet1.xml"/>
  <Relationship Id="rId3" Type="{WORKSHEET_REL}" Target="worksheets/sheet2.xml"/>
</Relationships>"#
    );
    let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1"><v>5</v></c></row></sheetData></worksheet>"#;
    let bytes = build_package(&[
        (
            "xl/workbook.xml",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <bookViews><workbookView activeTab="2"/></bookViews>
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Chart1" sheetId="2" r:id="rId2"/>
    <sheet name="Tail" sheetId="3" r:id="rId3"/>
  </sheets>
</workbook>"#,
        ),
        ("xl/_rels/workbook.xml.rels", rels.as_str()),
        ("xl/worksheets/sheet1.xml", sheet),
        ("xl/worksheets/sheet2.xml", sheet),
        ("xl/chartsheets/sheet1.xml", "<chartsheet/>"),
    ])?;

    let wb = Workbook::from_bytes(&bytes, "charts")?;
    assert_eq!(wb.sheet_names(), vec!["Data".to_owned(), "Tail".to_owned()]);
    assert_eq!(wb.active_sheet()?.title(), "Tail");
    assert_eq!(wb.read_cell(addr(1, 1))?, CellValue::Number(5.0));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("charts.xlsx");
    std::fs::write(&path, &bytes)?;
    assert!(documents_equal(&path, &path));
    assert_eq!(scan(&path)?, vec!["Data".to_owned(), "Tail".to_owned()]);
    Ok(())
}

#[test]
fn unknown_sheet_relationship_is_a_format_error() -> Result<()> {
    let bytes = build_package(&[
        (
            "xl/workbook.xml",
            r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Lost" sheetId="1" r:id="rId9"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#,
        ),
    ])?;
    assert!(matches!(
        Workbook::from_bytes(&bytes, "lost"),
        Err(ExcelError::Format(_))
    ));
    Ok(())
}

#[test]
fn row_numbers_outside_the_grid_are_format_errors() -> Result<()> {
    for rows in [
        r#"<row r="4294967295"/><row><c><v>1</v></c></row>"#,
        r#"<row r="1048577"><c><v>1</v></c></row>"#,
        r#"<row r="0"/>"#,
    ] {
        let bytes = one_sheet_xlsx(rows, None)?;
        let err = Workbook::from_bytes(&bytes, "rows").unwrap_err();
        assert!(matches!(err, ExcelError::Format(_)), "{rows}: {err}");
    }

    let bytes = one_sheet_xlsx(r#"<row r="1048575"/><row><c><v>1</v></c></row>"#, None)?;
    let wb = Workbook::from_bytes(&bytes, "last")?;
    assert_eq!(wb.read_cell(addr(1_048_576, 1))?, CellValue::Number(1.0));
    Ok(())
}

#[test]
fn date_formatted_numbers_read_as_iso_text() -> Result<()> {
    let styles = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="2">
    <numFmt numFmtId="164" formatCode="yyyy-mm-dd hh:mm"/>
    <numFmt numFmtId="165" formatCode="&quot;days&quot; 0"/>
  </numFmts>
  <cellStyleXfs count="1"><xf numFmtId="14"/></cellStyleXfs>
  <cellXfs count="6">
    <xf numFmtId="0"/>
    <xf numFmtId="14" applyNumberFormat="1"/>
    <xf numFmtId="164" applyNumberFormat="1"><alignment horizontal="left"/></xf>
    <xf numFmtId="21"/>
    <xf numFmtId="4"/>
    <xf numFmtId="165"/>
  </cellXfs>
</styleSheet>"#;
    let row = r#"<row r="1">
  <c r="A1" s="1"><v>45292</v></c>
  <c r="B1" s="2"><v>45292.5</v></c>
  <c r="C1" s="3"><v>0.75</v></c>
  <c r="D1" s="4"><v>1234.5</v></c>
  <c r="E1"><v>45292</v></c>
  <c r="F1" s="1"><v>59</v></c>
  <c r="G1" s="1"><v>61</v></c>
  <c r="H1" s="5"><v>3</v></c>
</row>"#;
    let wb = Workbook::from_bytes(&one_sheet_xlsx(row, Some(styles))?, "dates")?;
    let expected = [
        CellValue::from("2024-01-01"),
        CellValue::from("2024-01-01 12:00:00"),
        CellValue::from("18:00:00"),
        CellValue::Number(1234.5),
        CellValue::Number(45292.0),
        CellValue::from("1900-02-28"),
        CellValue::from("1900-03-01"),
        CellValue::Number(3.0),
    ];
    for (i, want) in expected.iter().enumerate() {
        assert_eq!(&wb.read_cell(addr(1, i as u32 + 1))?, want, "column {}", i + 1);
    }
    Ok(())
}

/* ============================== LIBRARY =================================== */

#[test]
fn document_cache_follows_current_document() -> Result<()> {
    let mut lib = ExcelLibrary::default();
    assert!(matches!(lib.get_list_sheet_names(), Err(ExcelError::NoOpenedDocuments)));

    assert_eq!(lib.create_excel_document("doc1")?, "doc1");
    assert_eq!(lib.create_excel_document("doc2")?, "doc2");
    assert!(matches!(lib.create_excel_document("doc1"), Err(ExcelError::DocumentExists(_))));
    assert_eq!(lib.current_id(), Some("doc2"));

    assert_eq!(lib.switch_current_excel_document("doc1")?, Some("doc2".to_owned()));
    assert!(matches!(
        lib.switch_current_excel_document("nope"),
        Err(ExcelError::NoSuchDocument(_))
    ));

    lib.write_excel_cell(1, 1, "in doc1", None)?;
    lib.switch_current_excel_document("doc2")?;
    assert_eq!(lib.read_excel_cell(1, 1, None)?, CellValue::Empty);

    lib.create_excel_document("doc3")?;
    assert_eq!(lib.close_current_excel_document(), Some("doc1".to_owned()));
    assert_eq!(lib.read_excel_cell(1, 1, None)?, CellValue::from("in doc1"));
    assert_eq!(lib.document_ids(), vec!["doc1", "doc2"]);

    lib.close_all_excel_documents();
    assert_eq!(lib.close_current_excel_document(), None);
    assert!(matches!(lib.read_excel_cell(1, 1, None), Err(ExcelError::NoOpenedDocuments)));
    Ok(())
}

#[test]
fn rows_and_columns_use_offsets() -> Result<()> {
    let mut lib = ExcelLibrary::default();
    lib.create_excel_document("grid")?;
    let row: Vec<CellValue> = ["t1", "t2", "t3"].into_iter().map(CellValue::from).collect();
    lib.write_excel_row(5, row.clone(), 0, Some("Sheet"))?;
    assert_eq!(lib.read_excel_row(5, 0, 3, Some("Sheet"))?, row);
    assert_eq!(lib.read_excel_row(5, 1, 2, None)?, row[1..].to_vec());
    assert_eq!(lib.read_excel_row(5, 0, 0, None)?, row);

    let col: Vec<CellValue> = ["a1", "a2", "a3"].into_iter().map(CellValue::from).collect();
    lib.write_excel_column(4, col.clone(), 2, None)?;
    assert_eq!(lib.read_excel_cell(3, 4, None)?, CellValue::from("a1"));
    assert_eq!(lib.read_excel_column(4, 2, 3, None)?, col);
    assert_eq!(
        lib.read_excel_column(4, 0, 0, None)?,
        vec![
            CellValue::Empty,
            CellValue::Empty,
            CellValue::from("a1"),
            CellValue::from("a2"),
            CellValue::from("a3"),
        ]
    );

    lib.write_excel_rows(
        vec![vec![1.0.into(), 2.0.into()], vec![3.0.into()]],
        9,
        1,
        None,
    )?;
    assert_eq!(lib.read_excel_cell(10, 2, None)?, CellValue::Number(1.0));
    assert_eq!(lib.read_excel_cell(10, 3, None)?, CellValue::Number(2.0));
    assert_eq!(lib.read_excel_cell(11, 2, None)?, CellValue::Number(3.0));

    let table = lib.make_list_from_excel_sheet(None)?;
    assert_eq!(table.len(), 11);
    assert!(table.iter().all(|r| r.len() == 4));
    assert_eq!(table[4][..3], row[..]);
    assert_eq!(table[4][3], CellValue::from("a3"));
    Ok(())
}

#[test]
fn failed_batch_write_changes_nothing() -> Result<()> {
    let mut lib = ExcelLibrary::default();
    lib.create_excel_document("atomic")?;
    let err = lib
        .write_excel_row(1, vec!["a".into(), "b".into()], 16_383, None)
        .unwrap_err();
    assert!(matches!(err, ExcelError::Address(_)));
    assert!(lib.make_list_from_excel_sheet(None)?.is_empty());

    assert!(matches!(
        lib.write_excel_cell(-1, 1, "x", None),
        Err(ExcelError::Address(_))
    ));
    assert!(matches!(
        lib.read_excel_row(1, -2, 0, None),
        Err(ExcelError::Address(_))
    ));
    assert!(matches!(
        lib.write_excel_cell(1, 1, "x", Some("Missing")),
        Err(ExcelError::SheetNotFound(_))
    ));
    Ok(())
}

#[test]
fn stream_and_file_documents() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("file1.xlsx");

    let mut lib = ExcelLibrary::new(LibraryConfig::default().with_default_sheet_name("Data"));
    lib.create_excel_document("doc1")?;
    lib.write_excel_cell(1, 1, "text", None)?;
    lib.save_excel_document(&path)?;
    assert_eq!(lib.get_list_sheet_names()?, vec!["Data".to_owned()]);

    lib.open_excel_document(&path, "from_file")?;
    assert_eq!(lib.read_excel_cell(1, 1, Some("Data"))?, CellValue::from("text"));

    let bytes = std::fs::read(&path)?;
    lib.open_excel_document_from_stream(&bytes, "from_stream")?;
    assert_eq!(lib.read_excel_cell(1, 1, None)?, CellValue::from("text"));

    assert!(lib.excel_documents_equal(&path, &path));
    assert!(matches!(
        lib.open_excel_document(dir.path().join("absent.xlsx"), "absent"),
        Err(ExcelError::Io { .. })
    ));
    Ok(())
}

/* ============================== KEYWORDS ================================== */

#[test]
fn keyword_names_match_robot_style() {
    for spelling in ["Read Excel Cell", "read_excel_cell", "READ excel_Cell", "readexcelcell"] {
        assert_eq!(find_keyword(spelling).map(|k| k.name), Some("Read Excel Cell"));
    }
    assert!(find_keyword("Read Word Cell").is_none());
    let spec = find_keyword("write excel row").unwrap();
    assert_eq!(
        spec.signature(),
        vec!["row_num", "row_data", "col_offset=0", "sheet_name=None"]
    );
}

#[test]
fn keywords_run_through_dispatch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("file1.xlsx").display().to_string();
    let mut lib = ExcelLibrary::default();

    let id = lib.run_keyword("Create Excel Document", vec![], vec![("doc_id".into(), s("docname1"))])?;
    assert_eq!(id, s("docname1"));

    // the runner hands integers over as text
    lib.run_keyword(
        "Write Excel Cell",
        vec![s("1"), s("1")],
        vec![("value".into(), s("text"))],
    )?;
    lib.run_keyword(
        "write_excel_rows",
        vec![KeywordValue::List(vec![
            KeywordValue::List(vec![s("r1"), 2.0.into()]),
            KeywordValue::List(vec![true.into()]),
        ])],
        vec![("rows_offset".into(), s("1"))],
    )?;
    let row = lib.run_keyword("Read Excel Row", vec![s("2")], vec![("max_num".into(), 2.0.into())])?;
    assert_eq!(row, KeywordValue::List(vec![s("r1"), 2.0.into()]));

    lib.run_keyword("Save Excel Document", vec![s(&file)], vec![])?;
    let cell = lib.run_keyword("Read Excel Cell", vec![1.0.into(), 1.0.into()], vec![])?;
    assert_eq!(cell, s("text"));
    let empty = lib.run_keyword("Read Excel Cell", vec![s("9"), s("9")], vec![])?;
    assert!(empty.is_none());

    let names = lib.run_keyword("Get List Sheet Names", vec![], vec![])?;
    assert_eq!(names, KeywordValue::List(vec![s("Sheet")]));

    let equal = lib.run_keyword("Excel Documents Equal", vec![s(&file), s(&file)], vec![])?;
    assert_eq!(equal, KeywordValue::from(true));

    let closed = lib.run_keyword("Close Current Excel Document", vec![], vec![])?;
    assert!(closed.is_none());
    Ok(())
}

#[test]
fn none_text_selects_the_active_sheet() -> Result<()> {
    let mut lib = ExcelLibrary::default();
    lib.run_keyword("Create Excel Document", vec![s("doc")], vec![])?;
    lib.run_keyword(
        "Write Excel Cell",
        vec![s("1"), s("1"), s("value")],
        vec![("sheet_name".into(), s("None"))],
    )?;
    let cell = lib.run_keyword("Read Excel Cell", vec![s("1"), s("1"), s("None")], vec![])?;
    assert_eq!(cell, s("value"));

    let err = lib
        .run_keyword("Read Excel Cell", vec![s("1"), s("1"), s("Other")], vec![])
        .unwrap_err();
    assert!(matches!(err, ExcelError::SheetNotFound(_)));
    Ok(())
}

#[test]
fn keyword_argument_errors() -> Result<()> {
    let mut lib = ExcelLibrary::default();
    let err = lib.run_keyword("No Such Keyword", vec![], vec![]).unwrap_err();
    assert!(matches!(err, ExcelError::UnknownKeyword(_)));

    let err = lib.run_keyword("Read Excel Cell", vec![s("1")], vec![]).unwrap_err();
    assert!(matches!(err, ExcelError::Argument(_)), "{err}");

    let err = lib
        .run_keyword("Create Excel Document", vec![s("a"), s("b")], vec![])
        .unwrap_err();
    assert!(matches!(err, ExcelError::Argument(_)));

    let err = lib
        .run_keyword("Create Excel Document", vec![s("a")], vec![("doc_id".into(), s("b"))])
        .unwrap_err();
    assert!(matches!(err, ExcelError::Argument(_)));

    let err = lib
        .run_keyword("Create Excel Document", vec![], vec![("name".into(), s("b"))])
        .unwrap_err();
    assert!(matches!(err, ExcelError::Argument(_)));

    lib.run_keyword("Create Excel Document", vec![s("doc")], vec![])?;
    let err = lib
        .run_keyword("Read Excel Cell", vec![s("one"), s("1")], vec![])
        .unwrap_err();
    assert!(matches!(err, ExcelError::Argument(_)));

    let err = lib
        .run_keyword("Write Excel Row", vec![s("1"), s("not a list")], vec![])
        .unwrap_err();
    assert!(matches!(err, ExcelError::Argument(_)));
    Ok(())
}

/* ============================== CONFIG ==================================== */

#[test]
fn environment_overrides_defaults() -> Result<()> {
    use crate::{ENV_COMPRESSION_LEVEL, ENV_DEFAULT_SHEET_NAME, ENV_MAX_PART_BYTES};

    // единственный тест, который трогает EXCELLIB_* переменные
    unsafe {
        std::env::set_var(ENV_DEFAULT_SHEET_NAME, "Report");
        std::env::set_var(ENV_COMPRESSION_LEVEL, "42");
        std::env::set_var(ENV_MAX_PART_BYTES, "4096");
    }
    let cfg = LibraryConfig::from_env();
    assert_eq!(cfg.default_sheet_name, "Report");
    assert_eq!(cfg.compression_level, 9);
    assert_eq!(cfg.max_part_bytes, 4096);
    assert_eq!(Workbook::create_with("env", &cfg)?.sheet_names(), vec!["Report".to_owned()]);

    unsafe {
        std::env::set_var(ENV_DEFAULT_SHEET_NAME, "   ");
        std::env::set_var(ENV_COMPRESSION_LEVEL, "-3");
        std::env::set_var(ENV_MAX_PART_BYTES, "lots");
    }
    let cfg = LibraryConfig::from_env();
    assert_eq!(cfg.default_sheet_name, "Sheet");
    assert_eq!(cfg.compression_level, 0);
    assert_eq!(cfg.max_part_bytes, LibraryConfig::default().max_part_bytes);

    unsafe {
        std::env::remove_var(ENV_DEFAULT_SHEET_NAME);
        std::env::remove_var(ENV_COMPRESSION_LEVEL);
        std::env::remove_var(ENV_MAX_PART_BYTES);
    }
    assert_eq!(LibraryConfig::from_env(), LibraryConfig::default());
    Ok(())
}
