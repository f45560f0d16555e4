//! The `Document` type: a loaded or freshly-built PDF's object table plus
//! everything needed to save it back out. Reading (§4.D/§4.E) and writing
//! (§4.H) live in `crate::reader`/`write`; this module holds the type
//! itself and the handful of accessors everything else is built on.

mod info;
mod outline;
mod page;
mod write;

use std::collections::{BTreeMap, HashMap};

use crate::encryption::{EncryptionConfig, EncryptionState};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectId};
use crate::xref::Xref;

pub use outline::Bookmark;
pub use page::{Matrix, Rectangle};

/// A PDF document, either freshly loaded (§4.D) or built up in memory.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: String,
    pub xref_start: usize,
    pub max_id: u32,
    pub binary_mark: Vec<u8>,
    pub trailer: Dictionary,
    pub reference_table: Xref,
    pub objects: BTreeMap<ObjectId, Object>,
    pub encryption_state: Option<EncryptionState>,
    /// Raw, still-encrypted object bytes, retained from a password-less
    /// load of an encrypted document so a later `decrypt(password)` call
    /// can recover them without re-reading the file.
    pub raw_objects: HashMap<ObjectId, Vec<u8>>,
    /// Encryption requested via `encrypt_with`, consumed by the next save.
    pub pending_encryption: Option<EncryptionConfig>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// A blank, already-writable document: an empty `/Pages` tree, an
    /// empty `/Info` dictionary, and a `/Catalog` tying them together,
    /// mirroring what `PyPDF2.PdfFileWriter.__init__` sets up before a
    /// caller adds a single page.
    pub fn new() -> Self {
        let mut document = Document::empty();
        document.seed_blank_structure();
        document
    }

    /// A document with no objects at all, not even the blank-writer
    /// scaffolding `new` seeds. Used internally as the `Reader`'s starting
    /// point, since every field gets overwritten (or, for encrypted
    /// documents, additively populated) from the parsed file rather than
    /// built up through the public writer API.
    pub(crate) fn empty() -> Self {
        Document {
            version: "1.5".to_string(),
            xref_start: 0,
            max_id: 0,
            binary_mark: Vec::new(),
            trailer: Dictionary::new(),
            reference_table: Xref::new(0),
            objects: BTreeMap::new(),
            encryption_state: None,
            raw_objects: HashMap::new(),
            pending_encryption: None,
        }
    }

    fn seed_blank_structure(&mut self) {
        let pages_id = self.add_object(crate::dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(Vec::new()),
            "Count" => 0,
        });
        let info_id = self.add_object(Dictionary::new());
        let catalog_id = self.add_object(crate::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.trailer.set("Root", catalog_id);
        self.trailer.set("Info", info_id);
    }

    pub fn with_version<S: Into<String>>(version: S) -> Self {
        let mut document = Document::new();
        document.version = version.into();
        document
    }

    /// Reserve the next object id without inserting anything, for callers
    /// that need to wire up a reference before the object it points at
    /// exists yet (e.g. a page's `/Parent` during tree construction).
    pub fn new_object_id(&mut self) -> ObjectId {
        self.max_id += 1;
        (self.max_id, 0)
    }

    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        let id = self.new_object_id();
        self.objects.insert(id, object.into());
        id
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::MissingXrefEntry)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::MissingXrefEntry)
    }

    pub fn get_dictionary(&self, id: ObjectId) -> Result<&Dictionary> {
        self.get_object(id).and_then(Object::as_dict)
    }

    pub fn get_dictionary_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        self.get_object_mut(id).and_then(Object::as_dict_mut)
    }

    /// Follow `value` through however many `Reference` hops it takes to
    /// reach a non-reference object (§3 "indirect reference" semantics).
    pub fn dereference<'a>(&'a self, value: &'a Object) -> Result<(ObjectId, &'a Object)> {
        let mut current = value;
        let mut id = (0u32, 0u16);
        let mut seen = std::collections::HashSet::new();
        while let Object::Reference(ref_id) = current {
            if !seen.insert(*ref_id) {
                return Err(Error::ReferenceCycle(*ref_id));
            }
            id = *ref_id;
            current = self.objects.get(ref_id).ok_or(Error::MissingXrefEntry)?;
        }
        Ok((id, current))
    }

    pub(crate) fn catalog_id(&self) -> Result<ObjectId> {
        self.trailer.get(b"Root").and_then(Object::as_reference)
    }

    /// Try `password` against the Standard Security Handler, returning
    /// which role it authenticated as (1 = user, 2 = owner) without
    /// changing document state. Used internally during load; exposed so
    /// callers can probe a password before committing to `decrypt`.
    pub fn authenticate_password(&self, password: &str) -> Result<u8> {
        crate::encryption::authenticate(self, password)
    }

    /// Decrypt a document that was loaded without a password (or with the
    /// wrong one), per §7: returns `0` if `password` authenticates neither
    /// role, `1` if it's the user password, `2` if it's the owner
    /// password. Compressed objects packed in an object stream at load
    /// time cannot be recovered this way, since their container's raw
    /// bytes aren't retained once unpacked.
    pub fn decrypt(&mut self, password: &str) -> Result<u8> {
        let code = match self.authenticate_password(password) {
            Ok(code) => code,
            Err(_) => return Ok(0),
        };

        let state = EncryptionState::decode(self, password)?;
        let encrypt_ref = self.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok());

        let raw: Vec<(ObjectId, Vec<u8>)> = self.raw_objects.iter().map(|(k, v)| (*k, v.clone())).collect();
        for (obj_id, raw_bytes) in raw {
            if Some(obj_id) == encrypt_ref {
                continue;
            }
            if let Ok((id, mut object)) = crate::reader::parse_raw_object_bytes(&raw_bytes) {
                match crate::encryption::decrypt_object(&state, obj_id, &mut object) {
                    Ok(()) => {
                        self.objects.insert(id, object);
                    }
                    Err(e) => log::warn!("failed to decrypt object {obj_id:?}: {e}, skipping it"),
                }
            }
        }

        self.encryption_state = Some(state);
        if let Some(enc_ref) = encrypt_ref {
            self.objects.remove(&enc_ref);
        }
        self.trailer.remove(b"Encrypt");

        Ok(code)
    }
}
