use pdfweld::{Destination, Document, FitType, Object};

#[test]
fn bookmark_round_trips_through_save() {
    let mut doc = Document::new();
    let page_one = doc.add_blank_page(None).unwrap();
    let page_two = doc.add_blank_page(None).unwrap();

    let parent = doc.add_bookmark("Chapter 1", page_one, None).unwrap();
    doc.add_bookmark("Section 1.1", page_two, Some(parent)).unwrap();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    let outline = reloaded.get_outline();
    assert_eq!(outline.len(), 1);
    assert_eq!(outline[0].title, "Chapter 1");
    assert_eq!(outline[0].children.len(), 1);
    assert_eq!(outline[0].children[0].title, "Section 1.1");
}

#[test]
fn named_destination_round_trips_through_save() {
    let mut doc = Document::new();
    let page_id = doc.add_blank_page(None).unwrap();
    doc.add_named_destination("intro", page_id).unwrap();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    let dests = reloaded.named_destinations().unwrap();
    let dest = dests.get(b"intro".as_slice()).unwrap();
    assert!(matches!(dest.fit, FitType::FitH { .. }));
}

#[test]
fn merge_transformed_page_renames_colliding_resource_names() {
    let mut a = Document::new();
    let page_a = a.add_blank_page(None).unwrap();
    let font_a = a.add_object(pdfweld::dictionary! {
        "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
    });
    a.get_dictionary_mut(page_a).unwrap().set(
        "Resources",
        pdfweld::dictionary! { "Font" => pdfweld::dictionary! { "F1" => font_a } },
    );

    let mut b = Document::new();
    let page_b = b.add_blank_page(None).unwrap();
    let font_b = b.add_object(pdfweld::dictionary! {
        "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Courier",
    });
    b.get_dictionary_mut(page_b).unwrap().set(
        "Resources",
        pdfweld::dictionary! { "Font" => pdfweld::dictionary! { "F1" => font_b } },
    );

    a.merge_page(page_a, &b, page_b).unwrap();

    let resources = a.get_dictionary(page_a).unwrap().get(b"Resources").and_then(Object::as_dict).unwrap();
    let fonts = resources.get(b"Font").and_then(Object::as_dict).unwrap();
    // the original F1 stays, and the colliding import gets a distinct name
    assert!(fonts.get(b"F1").is_ok());
    assert!(fonts.get(b"F1renamed").is_ok());
}

#[test]
fn destination_parse_is_inverse_of_format() {
    let array = vec![Object::Reference((7, 0)), Object::name("XYZ"), Object::Null, Object::Real(842.0), Object::Null];
    let dest = Destination::parse(&array).unwrap();
    assert_eq!(dest.format(), array);
}
