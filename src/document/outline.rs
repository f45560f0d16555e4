//! Document outline (bookmarks): a linked tree of `/Outlines` items, each
//! pointing at a destination via `/Dest` or a `/GoTo` action's `/D` entry.

use std::collections::HashSet;

use crate::destinations::Destination;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectId};
use crate::Document;

#[derive(Debug, Clone)]
pub struct Bookmark {
    pub title: String,
    pub page: Option<ObjectId>,
    pub children: Vec<Bookmark>,
}

impl Document {
    pub fn get_outline(&self) -> Vec<Bookmark> {
        match self.outlines_root_first_child() {
            Some(first_id) => self.collect_outline_siblings(first_id, &mut HashSet::new()),
            None => Vec::new(),
        }
    }

    fn outlines_root_first_child(&self) -> Option<ObjectId> {
        let catalog_id = self.catalog_id().ok()?;
        let outlines_id = self.get_dictionary(catalog_id).ok()?.get(b"Outlines").and_then(Object::as_reference).ok()?;
        self.get_dictionary(outlines_id).ok()?.get(b"First").and_then(Object::as_reference).ok()
    }

    fn collect_outline_siblings(&self, first_id: ObjectId, seen: &mut HashSet<ObjectId>) -> Vec<Bookmark> {
        let mut out = Vec::new();
        let mut current = Some(first_id);
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            let Ok(dict) = self.get_dictionary(id) else { break };
            let title = dict.get(b"Title").and_then(Object::as_text_string).unwrap_or_default();
            let page = self.resolve_destination_page(dict);
            let children = dict
                .get(b"First")
                .and_then(Object::as_reference)
                .ok()
                .map(|first_child| self.collect_outline_siblings(first_child, seen))
                .unwrap_or_default();
            out.push(Bookmark { title, page, children });
            current = dict.get(b"Next").and_then(Object::as_reference).ok();
        }
        out
    }

    fn resolve_destination_page(&self, dict: &Dictionary) -> Option<ObjectId> {
        if let Ok(dest) = dict.get(b"Dest") {
            if let Some(page) = self.destination_page(dest) {
                return Some(page);
            }
        }
        if let Ok(action) = dict.get(b"A").and_then(Object::as_dict) {
            if let Ok(dest) = action.get(b"D") {
                return self.destination_page(dest);
            }
        }
        None
    }

    fn destination_page(&self, dest: &Object) -> Option<ObjectId> {
        match dest {
            Object::Array(arr) => arr.first().and_then(|o| o.as_reference().ok()),
            Object::Reference(id) => self
                .get_object(*id)
                .ok()
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| o.as_reference().ok()),
            _ => None,
        }
    }

    /// Append a bookmark pointing at `page_id` via a `/GoTo` action, under
    /// `parent` if given or else the document's root `/Outlines` (creating
    /// it on first use). Wire shape: `{/Title title, /A {/S /GoTo, /D
    /// [pageref /FitH top]}}` (§6).
    pub fn add_bookmark(&mut self, title: &str, page_id: ObjectId, parent: Option<ObjectId>) -> Result<ObjectId> {
        let parent_id = match parent {
            Some(id) => id,
            None => self.outlines_root_id()?,
        };

        let top = self.get_media_box(page_id).map(|b| b.upper_right.1).unwrap_or(792.0);
        let dest = Destination::new_fit_h(Object::Reference(page_id), top);
        let action = crate::dictionary! {
            "S" => "GoTo",
            "D" => Object::Array(dest.format()),
        };
        let item_id = self.add_object(crate::dictionary! {
            "Title" => Object::string_literal(title),
            "Parent" => parent_id,
            "A" => Object::Dictionary(action),
        });

        let last = self.get_dictionary(parent_id)?.get(b"Last").and_then(Object::as_reference).ok();
        match last {
            Some(last_id) => {
                self.get_dictionary_mut(last_id)?.set("Next", item_id);
                self.get_dictionary_mut(item_id)?.set("Prev", last_id);
                self.get_dictionary_mut(parent_id)?.set("Last", item_id);
            }
            None => {
                self.get_dictionary_mut(parent_id)?.set("First", item_id);
                self.get_dictionary_mut(parent_id)?.set("Last", item_id);
            }
        }

        let count = self.get_dictionary(parent_id)?.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        self.get_dictionary_mut(parent_id)?.set("Count", Object::Integer(count + 1));

        Ok(item_id)
    }

    fn outlines_root_id(&mut self) -> Result<ObjectId> {
        let catalog_id = self.catalog_id()?;
        match self.get_dictionary(catalog_id)?.get(b"Outlines").and_then(Object::as_reference) {
            Ok(id) => Ok(id),
            Err(_) => {
                let id = self.add_object(crate::dictionary! { "Type" => "Outlines", "Count" => 0 });
                self.get_dictionary_mut(catalog_id)?.set("Outlines", id);
                Ok(id)
            }
        }
    }
}
