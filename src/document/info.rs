//! The `/Info` dictionary: author/title/subject metadata and, separately,
//! XMP metadata carried as a stream hung off the catalog.

use crate::error::Result;
use crate::object::Object;
use crate::Document;

impl Document {
    fn info_dict(&self) -> Result<&crate::Dictionary> {
        let info_id = self.trailer.get(b"Info").and_then(Object::as_reference)?;
        self.get_dictionary(info_id)
    }

    fn info_dict_mut(&mut self) -> Result<&mut crate::Dictionary> {
        let info_id = self.trailer.get(b"Info").and_then(Object::as_reference)?;
        self.get_dictionary_mut(info_id)
    }

    fn info_string(&self, key: &[u8]) -> Option<String> {
        self.info_dict().ok()?.get(key).ok()?.as_text_string().ok()
    }

    pub fn title(&self) -> Option<String> {
        self.info_string(b"Title")
    }

    pub fn author(&self) -> Option<String> {
        self.info_string(b"Author")
    }

    pub fn subject(&self) -> Option<String> {
        self.info_string(b"Subject")
    }

    pub fn keywords(&self) -> Option<String> {
        self.info_string(b"Keywords")
    }

    pub fn creator(&self) -> Option<String> {
        self.info_string(b"Creator")
    }

    pub fn producer(&self) -> Option<String> {
        self.info_string(b"Producer")
    }

    /// `/CreationDate`, parsed from the PDF date-string format
    /// (`D:YYYYMMDDHHmmSSOHH'mm'`).
    #[cfg(feature = "chrono")]
    pub fn creation_date(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        self.info_dict().ok()?.get(b"CreationDate").ok()?.as_datetime()
    }

    /// `/ModDate`, parsed the same way as [`Document::creation_date`].
    #[cfg(feature = "chrono")]
    pub fn mod_date(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        self.info_dict().ok()?.get(b"ModDate").ok()?.as_datetime()
    }

    /// Set an `/Info` field, creating the `/Info` dictionary (and trailer
    /// entry) if this is the first one set.
    pub fn set_info_field(&mut self, key: &str, value: &str) -> Result<()> {
        if self.trailer.get(b"Info").and_then(Object::as_reference).is_err() {
            let info_id = self.add_object(crate::Dictionary::new());
            self.trailer.set("Info", info_id);
        }
        self.info_dict_mut()?.set(key, Object::string_literal(value));
        Ok(())
    }

    /// Set `/CreationDate` from the local system clock's representation
    /// of `time`.
    #[cfg(feature = "chrono")]
    pub fn set_creation_date(&mut self, time: chrono::DateTime<chrono::Local>) -> Result<()> {
        self.set_info_object("CreationDate", time.into())
    }

    /// Set `/ModDate`, mirroring [`Document::set_creation_date`].
    #[cfg(feature = "chrono")]
    pub fn set_mod_date(&mut self, time: chrono::DateTime<chrono::Local>) -> Result<()> {
        self.set_info_object("ModDate", time.into())
    }

    #[cfg(feature = "chrono")]
    fn set_info_object(&mut self, key: &str, value: Object) -> Result<()> {
        if self.trailer.get(b"Info").and_then(Object::as_reference).is_err() {
            let info_id = self.add_object(crate::Dictionary::new());
            self.trailer.set("Info", info_id);
        }
        self.info_dict_mut()?.set(key, value);
        Ok(())
    }

    /// The raw bytes of the catalog's `/Metadata` stream (XMP), if present.
    /// This crate does not parse XMP itself - callers needing structured
    /// access should hand the bytes to an XMP-aware crate.
    pub fn xmp_metadata(&self) -> Option<Vec<u8>> {
        let catalog_id = self.catalog_id().ok()?;
        let catalog = self.get_dictionary(catalog_id).ok()?;
        let metadata_id = catalog.get(b"Metadata").and_then(Object::as_reference).ok()?;
        let stream = self.get_object(metadata_id).ok()?.as_stream().ok()?;
        stream.decompressed_content().ok()
    }
}
