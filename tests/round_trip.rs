//! Build-then-reload round trips. No binary fixture assets ship with this
//! crate, so every scenario here constructs its own document in memory,
//! saves it, and reloads the bytes.

use pdfweld::{Content, Document, Object, ObjectId, Operation};

fn page_with_text(doc: &mut Document, text: &str) -> ObjectId {
    let content = Content { operations: vec![
        Operation::new("BT", vec![]),
        Operation::new("Td", vec![72.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ] };
    doc.add_page(content).unwrap()
}

#[test]
fn blank_document_round_trips() {
    let mut doc = Document::new();
    doc.add_blank_page(None).unwrap();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 1);
    assert_eq!(reloaded.version, "1.5");
}

#[test]
fn text_content_survives_round_trip() {
    let mut doc = Document::new();
    page_with_text(&mut doc, "Hello, pdfweld");

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    let pages: Vec<u32> = reloaded.get_pages().keys().cloned().collect();
    let text = reloaded.extract_text(&pages).unwrap();
    assert!(text.contains("Hello, pdfweld"));
}

#[test]
fn renumbering_keeps_orphans_and_leaves_ids_contiguous() {
    let mut doc = Document::new();
    let page_id = page_with_text(&mut doc, "kept");
    // nothing points at this object; the renumber pass still keeps it
    // (appended after the reachable ones) rather than silently dropping it.
    let orphan = doc.add_object(Object::string_literal("nobody references me"));
    assert_ne!(orphan, page_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 1);

    let survived = reloaded
        .objects
        .values()
        .any(|o| o.as_str().ok() == Some(b"nobody references me".as_slice()));
    assert!(survived, "orphaned object should survive a save/reload round trip");

    // every surviving id is contiguous starting at 1
    let max_id = reloaded.objects.keys().map(|id| id.0).max().unwrap();
    assert_eq!(reloaded.objects.len() as u32, max_id);
}

#[test]
fn multi_page_document_preserves_order_and_count() {
    let mut doc = Document::new();
    for i in 0..5 {
        page_with_text(&mut doc, &format!("page {i}"));
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 5);
}

#[test]
fn info_dictionary_fields_round_trip() {
    let mut doc = Document::new();
    doc.set_info_field("Title", "A Test Document").unwrap();
    doc.set_info_field("Author", "Ada Kowalczyk").unwrap();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.title().as_deref(), Some("A Test Document"));
    assert_eq!(reloaded.author().as_deref(), Some("Ada Kowalczyk"));
}
