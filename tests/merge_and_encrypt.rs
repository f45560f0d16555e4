//! Cross-document merge, page transforms, and Standard Security Handler
//! round trips, built the same way as `round_trip.rs`: everything is
//! constructed in memory since no binary fixtures ship with this crate.

use pdfweld::encryption::EncryptionConfig;
use pdfweld::{Content, Document, Object, Operation};

fn text_page(doc: &mut Document, text: &str) -> pdfweld::ObjectId {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    doc.add_page(content).unwrap()
}

#[test]
fn merge_document_appends_all_pages() {
    let mut a = Document::new();
    text_page(&mut a, "from a");

    let mut b = Document::new();
    text_page(&mut b, "from b");
    text_page(&mut b, "from b again");

    a.merge_document(&b).unwrap();
    assert_eq!(a.get_pages().len(), 3);

    let mut bytes = Vec::new();
    a.save_to(&mut bytes).unwrap();
    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 3);

    let pages: Vec<u32> = reloaded.get_pages().keys().cloned().collect();
    let text = reloaded.extract_text(&pages).unwrap();
    assert!(text.contains("from a"));
    assert!(text.contains("from b"));
    assert!(text.contains("from b again"));
}

#[test]
fn merge_document_preserves_each_pages_own_font_resources() {
    // Two documents whose pages each declare a font named "F1" pointing at
    // different fonts; merging must not let one clobber the other's
    // resource dictionary.
    let mut a = Document::new();
    let page_a = a.add_blank_page(None).unwrap();
    let font_a = a.add_object(pdfweld::dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    a.get_dictionary_mut(page_a).unwrap().set(
        "Resources",
        pdfweld::dictionary! { "Font" => pdfweld::dictionary! { "F1" => font_a } },
    );

    let mut b = Document::new();
    text_page(&mut b, "doc b text");

    a.merge_document(&b).unwrap();
    assert_eq!(a.get_pages().len(), 2);

    let mut bytes = Vec::new();
    a.save_to(&mut bytes).unwrap();
    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 2);
}

#[test]
fn rotate_page_clockwise_then_counter_clockwise_is_identity() {
    let mut doc = Document::new();
    let page_id = doc.add_blank_page(None).unwrap();

    doc.rotate_page_clockwise(page_id).unwrap();
    doc.rotate_page_clockwise(page_id).unwrap();
    doc.rotate_page_clockwise(page_id).unwrap();
    doc.rotate_page_clockwise(page_id).unwrap();

    let rotate = doc.get_dictionary(page_id).unwrap().get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
    assert_eq!(rotate, 0);
}

#[test]
fn scale_page_to_matches_requested_height_regardless_of_width() {
    let mut doc = Document::new();
    let page_id = doc.add_blank_page(Some([0.0, 0.0, 612.0, 792.0])).unwrap();

    doc.scale_page_to(page_id, 300.0, 600.0).unwrap();

    let media_box = doc.get_media_box(page_id).unwrap();
    assert!((media_box.height() - 600.0).abs() < 1e-6, "height was {}", media_box.height());
}

#[test]
fn encrypted_document_without_a_password_yields_no_readable_pages() {
    let mut doc = Document::new();
    text_page(&mut doc, "secret contents");

    doc.encrypt_with(EncryptionConfig {
        user_password: "user-pw".to_string(),
        owner_password: "owner-pw".to_string(),
        ..EncryptionConfig::default()
    });

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    // An empty password doesn't authenticate against either role, so the
    // object graph stays undecrypted: the file loads without error, but
    // nothing beyond the trailer/Encrypt dictionary is readable.
    let reloaded = Document::load_mem(&bytes).unwrap();
    assert!(reloaded.get_pages().is_empty());
}

#[test]
fn encrypted_document_authenticates_owner_and_user_passwords() {
    let mut doc = Document::new();
    text_page(&mut doc, "secret contents");

    doc.encrypt_with(EncryptionConfig {
        user_password: "user-pw".to_string(),
        owner_password: "owner-pw".to_string(),
        ..EncryptionConfig::default()
    });

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let mut reloaded = Document::load_mem_with_password(&bytes, "user-pw").unwrap();
    let pages: Vec<u32> = reloaded.get_pages().keys().cloned().collect();
    let text = reloaded.extract_text(&pages).unwrap();
    assert!(text.contains("secret contents"));

    let code = reloaded.authenticate_password("owner-pw").unwrap();
    assert_eq!(code, 2);
    let _ = reloaded.decrypt("owner-pw");
}
