//! Minimal Office Open XML writer: one worksheet, inline strings, no styles.
use crate::database::table::Datum;
use crate::database::table::TabularResult;
use crate::error::SheetflowError;
use crate::spreadsheet::reference::index_to_reference;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// MIME type of an `.xlsx` workbook.
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

type XmlWriter<'a> = Writer<&'a mut ZipWriter<Cursor<Vec<u8>>>>;

/// Encodes a result as a single-sheet workbook: a header row followed by one row per record.
pub(crate) fn write_workbook(sheet_name: &str, result: &TabularResult) -> Result<Vec<u8>, SheetflowError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    write_content_types(&mut Writer::new(&mut zip))?;

    zip.start_file("_rels/.rels", options)?;
    write_relationships(&mut Writer::new(&mut zip), REL_OFFICE_DOCUMENT, "xl/workbook.xml")?;

    zip.start_file("xl/workbook.xml", options)?;
    write_workbook_part(&mut Writer::new(&mut zip), sheet_name)?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    write_relationships(&mut Writer::new(&mut zip), REL_WORKSHEET, "worksheets/sheet1.xml")?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    write_worksheet(&mut Writer::new(&mut zip), result)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn write_declaration(writer: &mut XmlWriter) -> Result<(), SheetflowError> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

fn write_content_types(writer: &mut XmlWriter) -> Result<(), SheetflowError> {
    write_declaration(writer)?;
    writer.write_event(Event::Start(BytesStart::new("Types").with_attributes([("xmlns", NS_CONTENT_TYPES)])))?;
    writer.write_event(Event::Empty(BytesStart::new("Default").with_attributes([
        ("Extension", "rels"),
        ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
    ])))?;
    writer.write_event(Event::Empty(BytesStart::new("Default").with_attributes([
        ("Extension", "xml"),
        ("ContentType", "application/xml"),
    ])))?;
    writer.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
        ("PartName", "/xl/workbook.xml"),
        ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"),
    ])))?;
    writer.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
        ("PartName", "/xl/worksheets/sheet1.xml"),
        ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("Types")))?;
    Ok(())
}

fn write_relationships(writer: &mut XmlWriter, kind: &str, target: &str) -> Result<(), SheetflowError> {
    write_declaration(writer)?;
    writer.write_event(Event::Start(
        BytesStart::new("Relationships").with_attributes([("xmlns", NS_PACKAGE_RELATIONSHIPS)]),
    ))?;
    writer.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
        ("Id", "rId1"),
        ("Type", kind),
        ("Target", target),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(())
}

fn write_workbook_part(writer: &mut XmlWriter, sheet_name: &str) -> Result<(), SheetflowError> {
    write_declaration(writer)?;
    writer.write_event(Event::Start(
        BytesStart::new("workbook").with_attributes([("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("sheets")))?;
    writer.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
        ("name", sheet_name),
        ("sheetId", "1"),
        ("r:id", "rId1"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("sheets")))?;
    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(())
}

fn write_worksheet(writer: &mut XmlWriter, result: &TabularResult) -> Result<(), SheetflowError> {
    write_declaration(writer)?;
    writer.write_event(Event::Start(BytesStart::new("worksheet").with_attributes([("xmlns", NS_MAIN)])))?;
    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

    let header: Vec<Datum> = result.columns().iter().map(|name| Datum::Text(name.to_owned())).collect();
    write_row(writer, 0, &header)?;
    for (index, row) in result.rows().iter().enumerate() {
        write_row(writer, index + 1, row)?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(())
}

fn write_row(writer: &mut XmlWriter, row: usize, values: &[Datum]) -> Result<(), SheetflowError> {
    let number = (row + 1).to_string();
    writer.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", number.as_str())])))?;
    for (col, value) in values.iter().enumerate() {
        write_cell(writer, &index_to_reference(row, col), value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

/// Writes one cell. Nulls, empty strings and non-finite numbers leave the cell out.
fn write_cell(writer: &mut XmlWriter, reference: &str, value: &Datum) -> Result<(), SheetflowError> {
    let (kind, text) = match value {
        Datum::Null => return Ok(()),
        Datum::Text(text) if text.is_empty() => return Ok(()),
        Datum::Float(number) if !number.is_finite() => return Ok(()),
        Datum::Text(text) => ("inlineStr", text.to_owned()),
        Datum::Bool(flag) => ("b", if *flag { "1" } else { "0" }.to_owned()),
        Datum::Int(number) => ("n", number.to_string()),
        Datum::Float(number) => ("n", number.to_string()),
    };

    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    if kind != "n" {
        cell.push_attribute(("t", kind));
    }
    writer.write_event(Event::Start(cell))?;
    if kind == "inlineStr" {
        writer.write_event(Event::Start(BytesStart::new("is")))?;
        write_text_element(writer, "t", &text)?;
        writer.write_event(Event::End(BytesEnd::new("is")))?;
    } else {
        write_text_element(writer, "v", &text)?;
    }
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<(), SheetflowError> {
    let mut start = BytesStart::new(tag);
    if tag == "t" && text.trim() != text {
        start.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
