//! Saving a document back out (§4.H): a reachability sweep renumbers every
//! live object starting from 1, references are rewritten to match, and the
//! result is emitted as a classical cross-reference table. No incremental
//! or xref-stream output - every save produces a single, self-contained
//! file.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::encryption::EncryptionConfig;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectId, Stream};
use crate::writer::{write_object, ObjectEncryption};
use crate::xref::{Xref, XrefEntry};
use crate::Document;

impl Document {
    pub(super) fn pages_root_id(&self) -> Result<ObjectId> {
        self.catalog_id()
            .and_then(|id| self.get_dictionary(id))
            .and_then(|cat| cat.get(b"Pages"))
            .and_then(Object::as_reference)
    }

    /// Append a blank page sized like `media_box` (or 612x792 / US Letter
    /// if `None`) and return its object id.
    pub fn add_blank_page(&mut self, media_box: Option<[f64; 4]>) -> Result<ObjectId> {
        let media_box = media_box.unwrap_or([0.0, 0.0, 612.0, 792.0]);
        let pages_root = self.pages_root_id()?;
        let page_id = self.add_object(crate::dictionary! {
            "Type" => "Page",
            "Parent" => pages_root,
            "MediaBox" => Object::Array(media_box.iter().map(|&v| Object::Real(v)).collect()),
            "Resources" => Dictionary::new(),
        });
        let kids = self.get_dictionary_mut(pages_root)?.get_mut(b"Kids").and_then(Object::as_array_mut)?;
        kids.push(Object::Reference(page_id));
        let count = self.get_dictionary(pages_root)?.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        self.get_dictionary_mut(pages_root)?.set("Count", Object::Integer(count + 1));
        Ok(page_id)
    }

    pub fn add_page(&mut self, content: crate::Content) -> Result<ObjectId> {
        let page_id = self.add_blank_page(None)?;
        let bytes = content.encode()?;
        let stream_id = self.add_object(Stream::new(Dictionary::new(), bytes));
        self.get_dictionary_mut(page_id)?.set("Contents", stream_id);
        Ok(page_id)
    }

    /// Insert `page_id` (already present in the document) at `index`
    /// (0-based) of the pages root's `/Kids`.
    pub fn insert_page(&mut self, index: usize, page_id: ObjectId) -> Result<()> {
        let pages_root = self.pages_root_id()?;
        let kids = self.get_dictionary_mut(pages_root)?.get_mut(b"Kids").and_then(Object::as_array_mut)?;
        let index = index.min(kids.len());
        kids.insert(index, Object::Reference(page_id));
        let count = self.get_dictionary(pages_root)?.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        self.get_dictionary_mut(pages_root)?.set("Count", Object::Integer(count + 1));
        Ok(())
    }

    /// Configure the Standard Security Handler for the next `save`/`save_to`
    /// call. Takes effect once, then is cleared.
    pub fn encrypt_with(&mut self, config: EncryptionConfig) {
        self.pending_encryption = Some(config);
    }

    pub(crate) fn finalize_encryption(&mut self) -> Result<()> {
        let Some(config) = self.pending_encryption.take() else {
            return Ok(());
        };

        let id0 = crate::encryption::random_id_bytes()?;
        self.trailer.set(
            "ID",
            Object::Array(vec![
                Object::String(id0.clone(), crate::object::StringFormat::Hexadecimal),
                Object::String(id0.clone(), crate::object::StringFormat::Hexadecimal),
            ]),
        );

        let (encrypt_dict, key) = crate::encryption::build_encrypt_dictionary(&config, &id0)?;
        let encrypt_id = self.add_object(encrypt_dict);
        self.trailer.set("Encrypt", encrypt_id);
        self.encryption_state = Some(crate::encryption::EncryptionState::from_key(key, config.revision, true));
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.save_to(&mut file)
    }

    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.finalize_encryption()?;
        self.renumber_objects();
        self.write_document(target)
    }

    /// DFS from the trailer's roots (`Root`, `Info`, `Encrypt`), assigning
    /// contiguous 1-based ids to every reachable object; unreachable
    /// objects are dropped, orphans (reachable from nothing, but still
    /// present) are appended at the end so nothing already in `self.objects`
    /// is silently lost. Rewrites every reference in place to the new ids.
    fn renumber_objects(&mut self) -> HashMap<ObjectId, ObjectId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();

        for key in [&b"Root"[..], b"Info", b"Encrypt"] {
            if let Ok(id) = self.trailer.get(key).and_then(Object::as_reference) {
                self.visit(id, &mut visited, &mut order);
            }
        }
        for &id in self.objects.keys().collect::<Vec<_>>() {
            if !visited.contains(&id) {
                self.visit(id, &mut visited, &mut order);
            }
        }

        let mut remap = HashMap::with_capacity(order.len());
        for (i, old_id) in order.iter().enumerate() {
            remap.insert(*old_id, ((i + 1) as u32, 0u16));
        }

        let mut renumbered = std::collections::BTreeMap::new();
        for old_id in &order {
            if let Some(object) = self.objects.remove(old_id) {
                let new_id = remap[old_id];
                renumbered.insert(new_id, remap_object_references(object, &remap));
            }
        }
        self.objects = renumbered;
        self.max_id = order.len() as u32;

        if let Ok(root) = self.trailer.get(b"Root").and_then(Object::as_reference) {
            if let Some(&new_id) = remap.get(&root) {
                self.trailer.set("Root", new_id);
            }
        }
        if let Ok(info) = self.trailer.get(b"Info").and_then(Object::as_reference) {
            if let Some(&new_id) = remap.get(&info) {
                self.trailer.set("Info", new_id);
            }
        }
        if let Ok(encrypt) = self.trailer.get(b"Encrypt").and_then(Object::as_reference) {
            if let Some(&new_id) = remap.get(&encrypt) {
                self.trailer.set("Encrypt", new_id);
            }
        }

        remap
    }

    fn visit(&self, id: ObjectId, visited: &mut HashSet<ObjectId>, order: &mut Vec<ObjectId>) {
        if !visited.insert(id) {
            return;
        }
        order.push(id);
        if let Some(object) = self.objects.get(&id) {
            self.visit_children(object, visited, order);
        }
    }

    fn visit_children(&self, object: &Object, visited: &mut HashSet<ObjectId>, order: &mut Vec<ObjectId>) {
        match object {
            Object::Reference(id) => self.visit(*id, visited, order),
            Object::Array(items) => {
                for item in items {
                    self.visit_children(item, visited, order);
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.iter() {
                    self.visit_children(value, visited, order);
                }
            }
            Object::Stream(stream) => {
                for (_, value) in stream.dict.iter() {
                    self.visit_children(value, visited, order);
                }
            }
            _ => {}
        }
    }

    fn write_document<W: Write>(&self, target: &mut W) -> Result<()> {
        let mut writer = CountingWriter::new(target);
        writer.write_all(format!("%PDF-{}\n", self.version).as_bytes())?;
        if !self.binary_mark.is_empty() {
            writer.write_all(b"%")?;
            writer.write_all(&self.binary_mark)?;
            writer.write_all(b"\n")?;
        } else {
            writer.write_all(b"%\xE2\xE3\xCF\xD3\n")?;
        }

        let mut xref = Xref::new(self.max_id + 1);
        xref.insert(0, XrefEntry::Free { next: 0, gen: 65535 });

        for (id, object) in &self.objects {
            let offset = writer.offset() as u32;
            xref.insert(id.0, XrefEntry::Normal { offset, generation: 0 });

            let encryption = self.encryption_state.as_ref().map(|state| ObjectEncryption {
                key: state_key(state),
                id: *id,
            });

            write!(writer, "{} {} obj\n", id.0, id.1)?;
            write_object(&mut writer, object, encryption.as_ref())?;
            writer.write_all(b"\nendobj\n")?;
        }

        let xref_start = writer.offset();
        writer.write_all(b"xref\n")?;
        write!(writer, "0 {}\n", xref.size)?;
        for i in 0..xref.size {
            match xref.get(i) {
                Some(XrefEntry::Normal { offset, generation }) => {
                    write!(writer, "{:010} {:05} n \n", offset, generation)?;
                }
                _ => {
                    write!(writer, "{:010} {:05} f \n", 0, 65535)?;
                }
            }
        }

        writer.write_all(b"trailer\n")?;
        let mut trailer = self.trailer.clone();
        trailer.set("Size", Object::Integer(xref.size as i64));
        write_object(&mut writer, &Object::Dictionary(trailer), None)?;
        write!(writer, "\nstartxref\n{xref_start}\n%%EOF")?;

        Ok(())
    }
}

fn remap_object_references(object: Object, remap: &HashMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(id) => Object::Reference(*remap.get(&id).unwrap_or(&id)),
        Object::Array(items) => Object::Array(items.into_iter().map(|o| remap_object_references(o, remap)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict_references(dict, remap)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict_references(stream.dict, remap);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict_references(dict: Dictionary, remap: &HashMap<ObjectId, ObjectId>) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), remap_object_references(value.clone(), remap));
    }
    out
}

/// `EncryptionState`'s key field isn't public; this crate-internal accessor
/// lets the writer read it without widening the type's public surface.
fn state_key(state: &crate::encryption::EncryptionState) -> &[u8] {
    state.key()
}

/// Counts bytes written so far, giving the writer exact byte offsets for
/// the xref table without a second serialization pass.
struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    offset: usize,
}

impl<'a, W: Write> CountingWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        CountingWriter { inner, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.offset += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
