//! Page tree flattening, box/attribute inheritance, content-stream access,
//! and the page-composition operations built on top of them (§4.E-§4.G).

use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;

use crate::content::{Content, Operation};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectId, Stream};
use crate::Document;

/// A page box (`MediaBox`, `CropBox`, ...) as two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub lower_left: (f64, f64),
    pub upper_right: (f64, f64),
}

impl Rectangle {
    pub fn width(&self) -> f64 {
        self.upper_right.0 - self.lower_left.0
    }

    pub fn height(&self) -> f64 {
        self.upper_right.1 - self.lower_left.1
    }

    fn from_object(obj: &Object) -> Result<Self> {
        let arr = obj.as_array()?;
        if arr.len() != 4 {
            return Err(Error::InvalidStream("a box array must have exactly 4 entries".to_string()));
        }
        Ok(Rectangle {
            lower_left: (arr[0].as_float()?, arr[1].as_float()?),
            upper_right: (arr[2].as_float()?, arr[3].as_float()?),
        })
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            self.lower_left.0.into(),
            self.lower_left.1.into(),
            self.upper_right.0.into(),
            self.upper_right.1.into(),
        ])
    }
}

/// A 2D affine transform in PDF's row-vector form: `[x' y' 1] = [x y 1] *
/// M`, stored as `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    pub fn rotate_degrees(degrees: f64) -> Self {
        let r = degrees.to_radians();
        Matrix([r.cos(), r.sin(), -r.sin(), r.cos(), 0.0, 0.0])
    }

    /// Compose so that a point is transformed by `self`, then by `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        let a = self.0;
        let b = other.0;
        Matrix([
            a[0] * b[0] + a[1] * b[2],
            a[0] * b[1] + a[1] * b[3],
            a[2] * b[0] + a[3] * b[2],
            a[2] * b[1] + a[3] * b[3],
            a[4] * b[0] + a[5] * b[2] + b[4],
            a[4] * b[1] + a[5] * b[3] + b[5],
        ])
    }

    pub fn to_operands(self) -> Vec<Object> {
        self.0.iter().map(|&v| Object::Real(v)).collect()
    }

    /// Transform a single point, `(x, y) * self`.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = self.0;
        (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
    }
}

/// Resource dictionary categories that get merged key-by-key when one
/// page is composited onto another (§4.G); everything else in
/// `/Resources` is copied wholesale from the receiving page.
const RESOURCE_CATEGORIES: [&[u8]; 7] =
    [b"ExtGState", b"Font", b"XObject", b"ColorSpace", b"Pattern", b"Shading", b"Properties"];

fn dict_category(doc: &Document, dict: &Dictionary, key: &[u8]) -> Dictionary {
    dict.get(key)
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

impl Document {
    /// Flatten the page tree into `page number -> page object id`, in
    /// document order. Nodes without an explicit `/Type /Pages` are
    /// treated as leaves, matching how real-world producers sometimes
    /// omit it.
    pub fn get_pages(&self) -> BTreeMap<u32, ObjectId> {
        let mut pages = BTreeMap::new();
        if let Ok(pages_root) = self
            .catalog_id()
            .and_then(|id| self.get_dictionary(id))
            .and_then(|cat| cat.get(b"Pages"))
            .and_then(Object::as_reference)
        {
            let mut counter = 1u32;
            let mut seen = HashSet::new();
            self.collect_pages(pages_root, &mut counter, &mut pages, &mut seen);
        }
        pages
    }

    fn collect_pages(&self, node_id: ObjectId, counter: &mut u32, pages: &mut BTreeMap<u32, ObjectId>, seen: &mut HashSet<ObjectId>) {
        if !seen.insert(node_id) {
            return;
        }
        let Ok(dict) = self.get_dictionary(node_id) else { return };

        if dict.has_type(b"Pages") {
            if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
                for kid in kids {
                    if let Ok(kid_id) = kid.as_reference() {
                        self.collect_pages(kid_id, counter, pages, seen);
                    }
                }
            }
        } else {
            pages.insert(*counter, node_id);
            *counter += 1;
        }
    }

    /// Walk `/Parent` links until `key` is found directly on a node,
    /// implementing the page tree's attribute-inheritance rule (§4.E). The
    /// found value is dereferenced before being returned: inheritable
    /// attributes and `/Resources` are just as often stored as an indirect
    /// `N G R` reference as inline, and callers downcast the result with
    /// `as_dict`/`as_array`, which only succeeds against the resolved form.
    pub fn get_inherited<'a>(&'a self, page_id: ObjectId, key: &[u8]) -> Result<&'a Object> {
        let mut current = page_id;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return Err(Error::ReferenceCycle(current));
            }
            let dict = self.get_dictionary(current)?;
            if let Ok(value) = dict.get(key) {
                return self.dereference(value).map(|(_, obj)| obj);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference)?;
        }
    }

    pub fn get_media_box(&self, page_id: ObjectId) -> Result<Rectangle> {
        self.get_inherited(page_id, b"MediaBox")
            .map_err(|_| Error::PageSizeNotDefined)
            .and_then(Rectangle::from_object)
    }

    pub fn get_crop_box(&self, page_id: ObjectId) -> Result<Rectangle> {
        self.get_inherited(page_id, b"CropBox")
            .and_then(Rectangle::from_object)
            .or_else(|_| self.get_media_box(page_id))
    }

    pub fn get_bleed_box(&self, page_id: ObjectId) -> Result<Rectangle> {
        self.get_inherited(page_id, b"BleedBox")
            .and_then(Rectangle::from_object)
            .or_else(|_| self.get_crop_box(page_id))
    }

    pub fn get_trim_box(&self, page_id: ObjectId) -> Result<Rectangle> {
        self.get_inherited(page_id, b"TrimBox")
            .and_then(Rectangle::from_object)
            .or_else(|_| self.get_crop_box(page_id))
    }

    pub fn get_art_box(&self, page_id: ObjectId) -> Result<Rectangle> {
        self.get_inherited(page_id, b"ArtBox")
            .and_then(Rectangle::from_object)
            .or_else(|_| self.get_crop_box(page_id))
    }

    pub fn get_page_resources(&self, page_id: ObjectId) -> Result<&Dictionary> {
        self.get_inherited(page_id, b"Resources").and_then(Object::as_dict)
    }

    fn page_content_stream_ids(&self, page_id: ObjectId) -> Result<Vec<ObjectId>> {
        match self.get_inherited(page_id, b"Contents")? {
            Object::Reference(id) => Ok(vec![*id]),
            Object::Array(arr) => Ok(arr.iter().filter_map(|o| o.as_reference().ok()).collect()),
            _ => Err(Error::Type(page_id, "Contents")),
        }
    }

    /// Each `/Contents` array element's decompressed bytes, kept separate
    /// so one malformed part doesn't poison the rest (see
    /// `extract_text_from_page`).
    pub fn get_page_content_parts(&self, page_id: ObjectId) -> Result<Vec<Vec<u8>>> {
        let ids = self.page_content_stream_ids(page_id)?;
        let mut parts = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_object(id).and_then(Object::as_stream).and_then(Stream::decompressed_content) {
                Ok(bytes) => parts.push(bytes),
                Err(e) => warn!("skipping unreadable content stream {id:?}: {e}"),
            }
        }
        Ok(parts)
    }

    /// All of a page's content, merged into one stream and parsed as a
    /// unit. Used wherever an operation needs to rewrite content (merge,
    /// compress, transform) and a part-by-part failure should propagate
    /// rather than be silently dropped.
    pub fn get_and_decode_page_content(&self, page_id: ObjectId) -> Result<Content> {
        let parts = self.get_page_content_parts(page_id)?;
        let mut merged = Vec::new();
        for part in &parts {
            merged.extend_from_slice(part);
            merged.push(b'\n');
        }
        Content::decode(&merged)
    }

    fn set_page_content(&mut self, page_id: ObjectId, content: Content) -> Result<()> {
        let bytes = content.encode()?;
        let stream_id = self.add_object(Stream::new(Dictionary::new(), bytes));
        self.get_dictionary_mut(page_id)?.set("Contents", stream_id);
        Ok(())
    }

    /// Per-part lenient text extraction: each content-stream part is
    /// decoded independently and a part that fails to parse contributes
    /// an empty line rather than failing the whole page.
    pub fn extract_text_from_page(&self, page_id: ObjectId) -> Result<String> {
        let parts = self.get_page_content_parts(page_id)?;
        let mut pieces = Vec::with_capacity(parts.len());
        for part in parts {
            match Content::decode(&part) {
                Ok(content) => pieces.push(text_from_content(&content)),
                Err(e) => {
                    warn!("skipping undecodable content stream part: {e}");
                    pieces.push(String::new());
                }
            }
        }
        Ok(pieces.join("\n"))
    }

    pub fn extract_text(&self, page_numbers: &[u32]) -> Result<String> {
        let pages = self.get_pages();
        let mut out = String::new();
        for (i, num) in page_numbers.iter().enumerate() {
            let page_id = *pages.get(num).ok_or(Error::MissingXrefEntry)?;
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&self.extract_text_from_page(page_id)?);
        }
        Ok(out)
    }

    /// Concatenate every part of a page's `/Contents` and re-emit it as a
    /// single Flate-compressed stream, shrinking it on disk without
    /// changing its rendered appearance.
    pub fn compress_page_content(&mut self, page_id: ObjectId) -> Result<()> {
        let parts = self.get_page_content_parts(page_id)?;
        if parts.is_empty() {
            return Ok(());
        }
        let mut merged = Vec::new();
        for part in &parts {
            merged.extend_from_slice(part);
            merged.push(b'\n');
        }
        let compressed = crate::filters::encode_flate(&merged)?;
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("FlateDecode"));
        let stream_id = self.add_object(Stream::new(dict, compressed));
        self.get_dictionary_mut(page_id)?.set("Contents", stream_id);
        Ok(())
    }

    pub fn compress_content_streams(&mut self) -> Result<()> {
        let page_ids: Vec<ObjectId> = self.get_pages().into_values().collect();
        for page_id in page_ids {
            self.compress_page_content(page_id)?;
        }
        Ok(())
    }

    pub fn rotate_page_clockwise(&mut self, page_id: ObjectId) -> Result<()> {
        self.rotate_page_by(page_id, 90)
    }

    pub fn rotate_page_counter_clockwise(&mut self, page_id: ObjectId) -> Result<()> {
        self.rotate_page_by(page_id, -90)
    }

    fn rotate_page_by(&mut self, page_id: ObjectId, degrees: i64) -> Result<()> {
        let current = self.get_inherited(page_id, b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        let normalized = (((current + degrees) % 360) + 360) % 360;
        self.get_dictionary_mut(page_id)?.set("Rotate", Object::Integer(normalized));
        Ok(())
    }

    /// Wrap a page's content in `q <matrix> cm ... Q` so every drawing
    /// operation is transformed by `matrix`.
    pub fn add_transformation(&mut self, page_id: ObjectId, matrix: Matrix) -> Result<()> {
        let mut content = self.get_and_decode_page_content(page_id)?;
        let mut wrapped = Vec::with_capacity(content.operations.len() + 2);
        wrapped.push(Operation::new("q", vec![]));
        wrapped.push(Operation::new("cm", matrix.to_operands()));
        wrapped.append(&mut content.operations);
        wrapped.push(Operation::new("Q", vec![]));
        self.set_page_content(page_id, Content { operations: wrapped })
    }

    /// Scale a page by independent x/y factors, adjusting `MediaBox` to
    /// match so the page's on-disk size changes along with its content.
    ///
    /// Note: an earlier revision of this swapped `sx`/`sy` in the box
    /// resize, shrinking width by the height factor and vice versa.
    pub fn scale_page_by(&mut self, page_id: ObjectId, sx: f64, sy: f64) -> Result<()> {
        let media_box = self.get_media_box(page_id)?;
        self.add_transformation(page_id, Matrix::scale(sx, sy))?;
        let new_box = Rectangle {
            lower_left: (media_box.lower_left.0 * sx, media_box.lower_left.1 * sy),
            upper_right: (media_box.upper_right.0 * sx, media_box.upper_right.1 * sy),
        };
        self.get_dictionary_mut(page_id)?.set("MediaBox", new_box.to_object());
        Ok(())
    }

    pub fn scale_page(&mut self, page_id: ObjectId, factor: f64) -> Result<()> {
        self.scale_page_by(page_id, factor, factor)
    }

    /// Scale a page so its `MediaBox` becomes exactly `(width, height)`.
    pub fn scale_page_to(&mut self, page_id: ObjectId, width: f64, height: f64) -> Result<()> {
        let media_box = self.get_media_box(page_id)?;
        let sx = width / media_box.width();
        let sy = height / media_box.height();
        self.scale_page_by(page_id, sx, sy)
    }

    /// Copy `other_page_id` from `other` onto the end of `self` as a new
    /// page, renumbering every object it reaches. This is what
    /// `merge_document` uses to concatenate whole documents; for
    /// compositing one page's content onto an existing page, see
    /// `merge_page` below.
    fn import_and_append_page(
        &mut self, other: &Document, other_page_id: ObjectId, cache: &mut HashMap<ObjectId, ObjectId>,
    ) -> Result<ObjectId> {
        let imported_page_id = self.import_foreign(other, other_page_id, cache)?;

        let pages_root = self.pages_root_id()?;
        let kids = self.get_dictionary_mut(pages_root)?.get_mut(b"Kids").and_then(Object::as_array_mut)?;
        kids.push(Object::Reference(imported_page_id));
        let count = self.get_dictionary(pages_root)?.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        self.get_dictionary_mut(pages_root)?.set("Count", Object::Integer(count + 1));
        self.get_dictionary_mut(imported_page_id)?.set("Parent", pages_root);

        Ok(imported_page_id)
    }

    /// Append every page of `other` onto `self`, in order. One `cache` is
    /// shared across the whole loop (rather than one per page) so an
    /// object reachable from more than one of `other`'s pages — a common
    /// font/XObject, or an annotation whose `/A`/`/D` points at another
    /// page of `other` — is imported once and every subsequent reference
    /// to it resolves to that same copy instead of a fresh duplicate.
    pub fn merge_document(&mut self, other: &Document) -> Result<()> {
        let mut cache = HashMap::new();
        for (_, page_id) in other.get_pages() {
            self.import_and_append_page(other, page_id, &mut cache)?;
        }
        Ok(())
    }

    /// Composite `other_page_id` (from `other`, which may be a different
    /// document) onto `page_id`: resources are merged key-by-key with
    /// rename-on-collision, `other`'s content is transformed by `matrix`
    /// (if given) and appended under its own `q`/`Q`, and `page_id`'s
    /// `MediaBox` is grown to cover the transformed page when `expand` is
    /// set (§4.G).
    pub fn merge_transformed_page(
        &mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, matrix: Option<Matrix>, expand: bool,
    ) -> Result<()> {
        let mut cache = HashMap::new();

        let self_resources = self.get_inherited(page_id, b"Resources").ok().and_then(|o| o.as_dict().ok()).cloned().unwrap_or_default();
        let other_resources =
            other.get_inherited(other_page_id, b"Resources").ok().and_then(|o| o.as_dict().ok()).cloned().unwrap_or_default();

        let mut new_resources = Dictionary::new();
        let mut rename: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

        for &category in RESOURCE_CATEGORIES.iter() {
            let self_cat = dict_category(self, &self_resources, category);
            let other_cat = dict_category(other, &other_resources, category);
            if self_cat.is_empty() && other_cat.is_empty() {
                continue;
            }

            let mut merged = self_cat.clone();
            for (key, other_raw) in other_cat.iter() {
                match self_cat.get(key) {
                    Ok(self_raw) => {
                        let self_resolved = self.dereference(self_raw).ok().map(|(_, o)| o.clone());
                        let other_resolved = other.dereference(other_raw).ok().map(|(_, o)| o.clone());
                        if self_resolved == other_resolved {
                            continue;
                        }
                        let new_key = [key.as_slice(), b"renamed".as_slice()].concat();
                        let imported = self.import_foreign_value(other, other_raw, &mut cache)?;
                        merged.set(new_key.clone(), imported);
                        rename.insert(key.clone(), new_key);
                    }
                    Err(_) => {
                        let imported = self.import_foreign_value(other, other_raw, &mut cache)?;
                        merged.set(key.clone(), imported);
                    }
                }
            }
            if !merged.is_empty() {
                new_resources.set(category, Object::Dictionary(merged));
            }
        }

        let mut procset = self_resources
            .get(b"ProcSet")
            .ok()
            .and_then(|o| self.dereference(o).ok())
            .and_then(|(_, o)| o.as_array().ok())
            .map(|a| a.to_vec())
            .unwrap_or_default();
        let other_procset = other_resources
            .get(b"ProcSet")
            .ok()
            .and_then(|o| other.dereference(o).ok())
            .and_then(|(_, o)| o.as_array().ok())
            .map(|a| a.to_vec())
            .unwrap_or_default();
        for item in other_procset {
            if !procset.contains(&item) {
                procset.push(item);
            }
        }
        if !procset.is_empty() {
            new_resources.set("ProcSet", Object::Array(procset));
        }

        // Content composition: self's existing content first (so it stays
        // beneath whatever `other` draws), each side isolated in its own
        // `q`/`Q` so graphics-state changes don't leak across the seam.
        let self_content = self.get_and_decode_page_content(page_id).unwrap_or_default();
        let other_content = other.get_and_decode_page_content(other_page_id).unwrap_or_default();

        let mut composed = Vec::with_capacity(self_content.operations.len() + other_content.operations.len() + 4);
        composed.push(Operation::new("q", vec![]));
        composed.extend(self_content.operations);
        composed.push(Operation::new("Q", vec![]));

        composed.push(Operation::new("q", vec![]));
        if let Some(m) = matrix {
            composed.push(Operation::new("cm", m.to_operands()));
        }
        for mut op in other_content.operations {
            for operand in op.operands.iter_mut() {
                if let Object::Name(name) = operand {
                    if let Some(new_name) = rename.get(name.as_slice()) {
                        *name = new_name.clone();
                    }
                }
            }
            composed.push(op);
        }
        composed.push(Operation::new("Q", vec![]));

        if expand {
            let self_box = self.get_media_box(page_id)?;
            let other_box = other.get_media_box(other_page_id)?;
            let corners = [
                (other_box.lower_left.0, other_box.lower_left.1),
                (other_box.lower_left.0, other_box.upper_right.1),
                (other_box.upper_right.0, other_box.upper_right.1),
                (other_box.upper_right.0, other_box.lower_left.1),
            ];
            let transformed = corners.map(|(x, y)| match matrix {
                Some(m) => m.apply(x, y),
                None => (x, y),
            });
            let min_x = transformed.iter().map(|p| p.0).fold(self_box.lower_left.0, f64::min);
            let min_y = transformed.iter().map(|p| p.1).fold(self_box.lower_left.1, f64::min);
            let max_x = transformed.iter().map(|p| p.0).fold(self_box.upper_right.0, f64::max);
            let max_y = transformed.iter().map(|p| p.1).fold(self_box.upper_right.1, f64::max);
            let new_box = Rectangle { lower_left: (min_x, min_y), upper_right: (max_x, max_y) };
            self.get_dictionary_mut(page_id)?.set("MediaBox", new_box.to_object());
        }

        self.set_page_content(page_id, Content { operations: composed })?;
        self.get_dictionary_mut(page_id)?.set("Resources", Object::Dictionary(new_resources));
        Ok(())
    }

    /// Composite `other_page_id` onto `page_id` with no transform.
    pub fn merge_page(&mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId) -> Result<()> {
        self.merge_transformed_page(page_id, other, other_page_id, None, false)
    }

    pub fn merge_scaled_page(&mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, factor: f64) -> Result<()> {
        self.merge_transformed_page(page_id, other, other_page_id, Some(Matrix::scale(factor, factor)), false)
    }

    pub fn merge_rotated_page(
        &mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, rotation_degrees: f64,
    ) -> Result<()> {
        self.merge_transformed_page(page_id, other, other_page_id, Some(Matrix::rotate_degrees(rotation_degrees)), false)
    }

    pub fn merge_translated_page(&mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, tx: f64, ty: f64) -> Result<()> {
        self.merge_transformed_page(page_id, other, other_page_id, Some(Matrix::translate(tx, ty)), false)
    }

    pub fn merge_rotated_scaled_page(
        &mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, rotation_degrees: f64, scale: f64,
    ) -> Result<()> {
        let ctm = Matrix::rotate_degrees(rotation_degrees).then(&Matrix::scale(scale, scale));
        self.merge_transformed_page(page_id, other, other_page_id, Some(ctm), false)
    }

    pub fn merge_scaled_translated_page(
        &mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, scale: f64, tx: f64, ty: f64,
    ) -> Result<()> {
        let ctm = Matrix::scale(scale, scale).then(&Matrix::translate(tx, ty));
        self.merge_transformed_page(page_id, other, other_page_id, Some(ctm), false)
    }

    pub fn merge_rotated_scaled_translated_page(
        &mut self, page_id: ObjectId, other: &Document, other_page_id: ObjectId, rotation_degrees: f64, scale: f64, tx: f64,
        ty: f64,
    ) -> Result<()> {
        let ctm = Matrix::rotate_degrees(rotation_degrees).then(&Matrix::scale(scale, scale)).then(&Matrix::translate(tx, ty));
        self.merge_transformed_page(page_id, other, other_page_id, Some(ctm), false)
    }

    fn import_foreign_value(&mut self, other: &Document, value: &Object, cache: &mut HashMap<ObjectId, ObjectId>) -> Result<Object> {
        self.rewrite_foreign_references(other, value.clone(), cache)
    }

    fn import_foreign(&mut self, other: &Document, other_id: ObjectId, cache: &mut HashMap<ObjectId, ObjectId>) -> Result<ObjectId> {
        if let Some(&mapped) = cache.get(&other_id) {
            return Ok(mapped);
        }
        let new_id = self.new_object_id();
        cache.insert(other_id, new_id);

        let object = other.get_object(other_id)?.clone();
        let rewritten = self.rewrite_foreign_references(other, object, cache)?;
        self.objects.insert(new_id, rewritten);
        Ok(new_id)
    }

    fn rewrite_foreign_references(&mut self, other: &Document, object: Object, cache: &mut HashMap<ObjectId, ObjectId>) -> Result<Object> {
        Ok(match object {
            Object::Reference(id) => Object::Reference(self.import_foreign(other, id, cache)?),
            Object::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.rewrite_foreign_references(other, item, cache)?);
                }
                Object::Array(out)
            }
            Object::Dictionary(dict) => {
                let mut out = Dictionary::new();
                for (key, value) in dict.iter() {
                    let rewritten = self.rewrite_foreign_references(other, value.clone(), cache)?;
                    out.set(key.clone(), rewritten);
                }
                Object::Dictionary(out)
            }
            Object::Stream(stream) => {
                let mut dict = Dictionary::new();
                for (key, value) in stream.dict.iter() {
                    let rewritten = self.rewrite_foreign_references(other, value.clone(), cache)?;
                    dict.set(key.clone(), rewritten);
                }
                let mut new_stream = Stream::new(dict, stream.content);
                new_stream.allows_compression = stream.allows_compression;
                Object::Stream(new_stream)
            }
            leaf => leaf,
        })
    }

    /// Replace every occurrence of `from` with `to` in a page's text-showing
    /// operators (`Tj`, `'`, `"`, and `TJ`'s string operands).
    pub fn replace_text(&mut self, page_id: ObjectId, from: &str, to: &str) -> Result<()> {
        let mut content = self.get_and_decode_page_content(page_id)?;
        for op in content.operations.iter_mut() {
            match op.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    if let Some(operand) = op.operands.last_mut() {
                        replace_in_string_operand(operand, from, to);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first_mut() {
                        for item in items.iter_mut() {
                            replace_in_string_operand(item, from, to);
                        }
                    }
                }
                _ => {}
            }
        }
        self.set_page_content(page_id, content)
    }
}

fn replace_in_string_operand(operand: &mut Object, from: &str, to: &str) {
    if let Object::String(bytes, format) = operand {
        if let Ok(text) = Object::String(bytes.clone(), *format).as_text_string() {
            if text.contains(from) {
                *bytes = text.replace(from, to).into_bytes();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn page_with_content(doc: &mut Document, media_box: [f64; 4], text: &str) -> ObjectId {
        let page_id = doc.add_blank_page(Some(media_box)).unwrap();
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Td", vec![10.into(), 10.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        doc.set_page_content(page_id, content).unwrap();
        page_id
    }

    #[test]
    fn media_box_falls_back_to_parent() {
        let mut doc = Document::new();
        let pages_root = doc.pages_root_id().unwrap();
        doc.get_dictionary_mut(pages_root)
            .unwrap()
            .set("MediaBox", Object::Array(vec![0.into(), 0.into(), 200.into(), 300.into()]));
        let page_id = doc.add_object(crate::dictionary! {
            "Type" => "Page",
            "Parent" => pages_root,
        });
        let media_box = doc.get_media_box(page_id).unwrap();
        assert_eq!(media_box.width(), 200.0);
        assert_eq!(media_box.height(), 300.0);
    }

    #[test]
    fn crop_box_falls_back_to_media_box() {
        let mut doc = Document::new();
        let page_id = page_with_content(&mut doc, [0.0, 0.0, 595.0, 842.0], "hello");
        let crop = doc.get_crop_box(page_id).unwrap();
        assert_eq!(crop.width(), 595.0);
        assert_eq!(crop.height(), 842.0);
    }

    #[test]
    fn rotate_by_normalizes_modulo_360() {
        let mut doc = Document::new();
        let page_id = page_with_content(&mut doc, [0.0, 0.0, 100.0, 100.0], "x");
        doc.rotate_page_by(page_id, 450).unwrap();
        let rotate = doc.get_dictionary(page_id).unwrap().get(b"Rotate").and_then(Object::as_i64).unwrap();
        assert_eq!(rotate, 90);
    }

    #[test]
    fn rotate_clockwise_then_counter_clockwise_is_identity() {
        let mut doc = Document::new();
        let page_id = page_with_content(&mut doc, [0.0, 0.0, 100.0, 100.0], "x");
        doc.rotate_page_clockwise(page_id).unwrap();
        doc.rotate_page_counter_clockwise(page_id).unwrap();
        let rotate = doc.get_dictionary(page_id).unwrap().get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        assert_eq!(rotate, 0);
    }

    #[test]
    fn scale_page_to_matches_target_size() {
        let mut doc = Document::new();
        let page_id = page_with_content(&mut doc, [0.0, 0.0, 100.0, 200.0], "x");
        doc.scale_page_to(page_id, 50.0, 50.0).unwrap();
        let media_box = doc.get_media_box(page_id).unwrap();
        assert!((media_box.width() - 50.0).abs() < 1e-6);
        assert!((media_box.height() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn matrix_then_composes_translate_scale_rotate_in_order() {
        let m = Matrix::translate(10.0, 0.0).then(&Matrix::scale(2.0, 2.0));
        let (x, y) = m.apply(1.0, 0.0);
        assert!((x - 22.0).abs() < 1e-9);
        assert!((y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn merge_document_appends_pages_and_renames_colliding_resources() {
        let mut doc = Document::new();
        page_with_content(&mut doc, [0.0, 0.0, 100.0, 100.0], "base");
        assert_eq!(doc.get_pages().len(), 1);

        let mut other = Document::new();
        page_with_content(&mut other, [0.0, 0.0, 100.0, 100.0], "other");

        doc.merge_document(&other).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn replace_text_rewrites_literal_string_operand() {
        let mut doc = Document::new();
        let page_id = page_with_content(&mut doc, [0.0, 0.0, 100.0, 100.0], "Hello World");
        doc.replace_text(page_id, "Hello", "Goodbye").unwrap();
        let text = doc.extract_text_from_page(page_id).unwrap();
        assert!(text.contains("Goodbye World"));
    }
}

/// Dispatches on operator per §4.F: `Tj` appends its operand if it decodes
/// as text; `'` prepends a newline then behaves as `Tj`; `"` prepends a
/// newline then uses operand[2]; `T*` emits a bare newline; `TJ` appends
/// each decoded text-string element of its array operand. Raw byte strings
/// that don't decode are skipped silently.
fn text_from_content(content: &Content) -> String {
    let mut out = String::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" => {
                if let Some(s) = op.operands.first().and_then(|o| o.as_text_string().ok()) {
                    out.push_str(&s);
                }
            }
            "'" => {
                out.push('\n');
                if let Some(s) = op.operands.first().and_then(|o| o.as_text_string().ok()) {
                    out.push_str(&s);
                }
            }
            "\"" => {
                out.push('\n');
                if let Some(s) = op.operands.get(2).and_then(|o| o.as_text_string().ok()) {
                    out.push_str(&s);
                }
            }
            "T*" => out.push('\n'),
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        if let Ok(s) = item.as_text_string() {
                            out.push_str(&s);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    out
}
