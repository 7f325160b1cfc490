//! Upload fixtures generated in code.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_RELS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// CSV text with a `name,age,active` header and `rows` data rows.
pub fn csv_fixture(rows: usize) -> Vec<u8> {
    let mut out = String::from("name,age,active\n");
    for i in 0..rows {
        out.push_str(&format!("person{},{},{}\n", i, 20 + i, i % 2 == 0));
    }
    out.into_bytes()
}

/// An `.xlsx` workbook with the same columns as [`csv_fixture`]. Ages are
/// stored as numbers and `active` as booleans.
pub fn xlsx_fixture(rows: usize) -> Vec<u8> {
    let mut sheet_data = String::from(
        r#"<row r="1"><c r="A1" t="inlineStr"><is><t>name</t></is></c><c r="B1" t="inlineStr"><is><t>age</t></is></c><c r="C1" t="inlineStr"><is><t>active</t></is></c></row>"#,
    );
    for i in 0..rows {
        let r = i + 2;
        sheet_data.push_str(&format!(
            r#"<row r="{r}"><c r="A{r}" t="inlineStr"><is><t>person{i}</t></is></c><c r="B{r}"><v>{age}</v></c><c r="C{r}" t="b"><v>{active}</v></c></row>"#,
            r = r,
            i = i,
            age = 20 + i,
            active = u8::from(i % 2 == 0),
        ));
    }

    let parts = [
        (
            "[Content_Types].xml".to_string(),
            format!(
                r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#,
                XML_HEADER
            ),
        ),
        (
            "_rels/.rels".to_string(),
            format!(
                r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
                XML_HEADER, RELS_NS, DOC_RELS
            ),
        ),
        (
            "xl/workbook.xml".to_string(),
            format!(
                r#"{}<workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="People" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                XML_HEADER, SHEET_NS, DOC_RELS
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(
                r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
                XML_HEADER, RELS_NS, DOC_RELS
            ),
        ),
        (
            "xl/worksheets/sheet1.xml".to_string(),
            format!(
                r#"{}<worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
                XML_HEADER, SHEET_NS, sheet_data
            ),
        ),
    ];

    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        writer
            .start_file(name, options)
            .expect("Failed to start workbook part");
        writer
            .write_all(body.as_bytes())
            .expect("Failed to write workbook part");
    }
    writer
        .finish()
        .expect("Failed to finish workbook")
        .into_inner()
}

/// A PDF with one line of text per page.
pub fn pdf_fixture(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("Failed to encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}
