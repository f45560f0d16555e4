use super::*;
use crate::Document;

fn minimal_document() -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(crate::dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(crate::dictionary! {
        "Font" => crate::dictionary! { "F1" => font_id },
    });
    let content = crate::Content {
        operations: vec![
            crate::Operation::new("BT", vec![]),
            crate::Operation::new("Tf", vec!["F1".into(), 48.into()]),
            crate::Operation::new("Td", vec![100.into(), 600.into()]),
            crate::Operation::new("Tj", vec![crate::Object::string_literal("Hello World!")]),
            crate::Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(crate::Stream::new(Dictionary::new(), content.encode().unwrap()));
    let page_id = doc.add_object(crate::dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        crate::dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }
        .into(),
    );
    let catalog_id = doc.add_object(crate::dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.max_id = doc.objects.keys().map(|id| id.0).max().unwrap_or(0);
    doc
}

#[test]
fn load_document_round_trips_through_save() {
    let mut doc = minimal_document();
    assert_eq!(doc.version, "1.5");

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.version, "1.5");
    assert_eq!(reloaded.get_pages().len(), 1);
}

#[test]
#[should_panic(expected = "Xref(Start)")]
fn load_short_document() {
    let _doc = Document::load_mem(b"%PDF-1.5\n%%EOF\n").unwrap();
}

#[test]
fn load_document_with_preceding_bytes() {
    let mut doc = minimal_document();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let mut content = b"garbage".to_vec();
    content.extend(bytes);
    let doc = Document::load_mem(&content).unwrap();
    assert_eq!(doc.version, "1.5");
}

#[test]
fn load_many_shallow_brackets() {
    let content: String = std::iter::repeat("()")
        .take(MAX_BRACKET * 10)
        .flat_map(|x| x.chars())
        .collect();
    const STREAM_CRUFT: usize = 33;
    let doc = format!(
        "%PDF-1.5
1 0 obj<</Type/Pages/Kids[5 0 R]/Count 1/Resources 3 0 R/MediaBox[0 0 595 842]>>endobj
2 0 obj<</Type/Font/Subtype/Type1/BaseFont/Courier>>endobj
3 0 obj<</Font<</F1 2 0 R>>>>endobj
5 0 obj<</Type/Page/Parent 1 0 R/Contents[4 0 R]>>endobj
6 0 obj<</Type/Catalog/Pages 1 0 R>>endobj
4 0 obj<</Length {}>>stream
BT
/F1 48 Tf
100 600 Td
({}) Tj
ET
endstream endobj\n",
        content.len() + STREAM_CRUFT,
        content
    );
    let doc = format!(
        "{}xref\n0 7\n0000000000 65535 f \n0000000009 00000 n \n0000000096 00000 n \n0000000155 00000 n \n0000000291 00000 n \n0000000191 00000 n \n0000000248 00000 n \ntrailer\n<</Root 6 0 R/Size 7>>\nstartxref\n{}\n%%EOF",
        doc,
        doc.len()
    );

    let _doc = Document::load_mem(doc.as_bytes()).unwrap();
}

#[test]
fn load_too_deep_brackets() {
    let content: Vec<u8> = std::iter::repeat(b'(')
        .take(MAX_BRACKET + 1)
        .chain(std::iter::repeat(b')').take(MAX_BRACKET + 1))
        .collect();
    let content = String::from_utf8(content).unwrap();
    const STREAM_CRUFT: usize = 33;
    let doc = format!(
        "%PDF-1.5
1 0 obj<</Type/Pages/Kids[5 0 R]/Count 1/Resources 3 0 R/MediaBox[0 0 595 842]>>endobj
2 0 obj<</Type/Font/Subtype/Type1/BaseFont/Courier>>endobj
3 0 obj<</Font<</F1 2 0 R>>>>endobj
5 0 obj<</Type/Page/Parent 1 0 R/Contents[7 0 R 4 0 R]>>endobj
6 0 obj<</Type/Catalog/Pages 1 0 R>>endobj
7 0 obj<</Length 45>>stream
BT /F1 48 Tf 100 600 Td (Hello World!) Tj ET
endstream
endobj
4 0 obj<</Length {}>>stream
BT
/F1 48 Tf
100 600 Td
({}) Tj
ET
endstream endobj\n",
        content.len() + STREAM_CRUFT,
        content
    );
    let doc = format!(
        "{}xref\n0 7\n0000000000 65535 f \n0000000009 00000 n \n0000000096 00000 n \n0000000155 00000 n \n0000000387 00000 n \n0000000191 00000 n \n0000000254 00000 n \n0000000297 00000 n \ntrailer\n<</Root 6 0 R/Size 7>>\nstartxref\n{}\n%%EOF",
        doc,
        doc.len()
    );

    let doc = Document::load_mem(doc.as_bytes()).unwrap();
    let pages = doc.get_pages().keys().cloned().collect::<Vec<_>>();
    assert_eq!("Hello World!\n", doc.extract_text(&pages).unwrap());
}

/// Builds a document whose xref table's first subsection starts at object
/// `1` instead of `0` (§4.D.4): every table row is one higher than the
/// object id the header it points at actually declares.
fn off_by_one_xref_document() -> String {
    const STREAM_CRUFT: usize = 33;
    let text = "Hello World!";
    let body = format!(
        "%PDF-1.5\n\
         0 0 obj<</Type/Pages/Kids[4 0 R]/Count 1/Resources 2 0 R/MediaBox[0 0 595 842]>>endobj\n\
         1 0 obj<</Type/Font/Subtype/Type1/BaseFont/Courier>>endobj\n\
         2 0 obj<</Font<</F1 1 0 R>>>>endobj\n\
         4 0 obj<</Type/Page/Parent 0 0 R/Contents 3 0 R>>endobj\n\
         5 0 obj<</Type/Catalog/Pages 0 0 R>>endobj\n\
         3 0 obj<</Length {}>>stream\n\
         BT /F1 48 Tf 100 600 Td ({}) Tj ET\n\
         endstream endobj\n",
        text.len() + STREAM_CRUFT,
        text
    );

    let offset_of = |needle: &str| body.find(needle).expect("object header present");
    let entry = |needle: &str| format!("{:010} 00000 n \n", offset_of(needle));

    let xref = format!(
        "xref\n1 6\n{}{}{}{}{}{}trailer\n<</Root 5 0 R/Size 6>>\n",
        entry("0 0 obj"),
        entry("1 0 obj"),
        entry("2 0 obj"),
        entry("3 0 obj"),
        entry("4 0 obj"),
        entry("5 0 obj"),
    );

    let xref_start = body.len();
    format!("{body}{xref}startxref\n{xref_start}\n%%EOF")
}

#[test]
fn off_by_one_xref_is_corrected_by_default() {
    let doc = off_by_one_xref_document();
    let reloaded = Document::load_mem(doc.as_bytes()).unwrap();
    assert_eq!(reloaded.catalog_id().unwrap(), (5, 0));
    assert_eq!(reloaded.get_pages().len(), 1);
}

#[test]
fn off_by_one_xref_is_rejected_in_strict_mode() {
    let doc = off_by_one_xref_document();
    let err = Document::load_mem_strict(doc.as_bytes()).unwrap_err();
    assert!(matches!(err, Error::Xref(XrefError::NotZeroIndexed)));
}

#[test]
fn search_substring_finds_last_occurrence() {
    assert_eq!(Reader::search_substring(b"hello world", b"xyz", 0), None);
    assert_eq!(Reader::search_substring(b"hello world", b"world", 0), Some(6));

    let buffer = b"%%EOF\ntest%%EOF\nend";
    assert_eq!(Reader::search_substring(buffer, b"%%EOF", 0), Some(10));
    assert_eq!(Reader::search_substring(buffer, b"%%EOF", 6), Some(10));
    assert_eq!(Reader::search_substring(buffer, b"%%EOF", 15), None);
    assert_eq!(Reader::search_substring(b"%%EOF", b"%%EOF", 0), Some(0));

    let buffer_with_many_percents = b"%%%PDF-1.3%%%comment%%%more%%EOF";
    assert_eq!(
        Reader::search_substring(buffer_with_many_percents, b"%%EOF", 0),
        Some(27)
    );
}
