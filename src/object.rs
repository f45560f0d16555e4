use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// `(object number, generation number)`, the identity of every indirect
/// object in a document.
pub type ObjectId = (u32, u16);

/// How a `String` object was (or should be) framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hexadecimal,
}

/// A PDF object. Every variant round-trips through the parser (§4.C) and
/// `write_to` (§4.A); `getObject()`-style dereferencing never yields a
/// bare `Reference` (see `Document::dereference`).
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>, StringFormat),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn string_literal<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::String(s.into(), StringFormat::Literal)
    }

    pub fn name<S: Into<Vec<u8>>>(s: S) -> Self {
        Object::Name(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(b) => Ok(*b),
            _ => Err(Error::Type((0, 0), "Boolean")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(i) => Ok(*i),
            Object::Real(f) => Ok(*f as i64),
            _ => Err(Error::Type((0, 0), "Integer")),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(f) => Ok(*f),
            _ => Err(Error::Type((0, 0), "Real")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(name) => Ok(name),
            _ => Err(Error::Type((0, 0), "Name")),
        }
    }

    pub fn as_name_str(&self) -> Result<&str> {
        self.as_name()
            .and_then(|n| std::str::from_utf8(n).map_err(|_| Error::Type((0, 0), "Name")))
    }

    /// Raw on-disk bytes of a string object, regardless of text decoding.
    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(bytes, _) => Ok(bytes),
            Object::Name(name) => Ok(name),
            _ => Err(Error::Type((0, 0), "String")),
        }
    }

    /// Decode a string object per the PDF text-string rules (§3): a
    /// leading UTF-16BE BOM selects UTF-16BE, otherwise PDFDocEncoding.
    pub fn as_text_string(&self) -> Result<String> {
        let bytes = self.as_str()?;
        Ok(decode_text_string(bytes))
    }

    pub fn as_array(&self) -> Result<&[Object]> {
        match self {
            Object::Array(arr) => Ok(arr),
            _ => Err(Error::Type((0, 0), "Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Object>> {
        match self {
            Object::Array(arr) => Ok(arr),
            _ => Err(Error::Type((0, 0), "Array")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&stream.dict),
            _ => Err(Error::Type((0, 0), "Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            Object::Stream(stream) => Ok(&mut stream.dict),
            _ => Err(Error::Type((0, 0), "Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(Error::Type((0, 0), "Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(Error::Type((0, 0), "Stream")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            _ => Err(Error::Type((0, 0), "Reference")),
        }
    }

    #[cfg(feature = "chrono")]
    pub fn as_datetime(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        let bytes = self.as_str().ok()?;
        let text = decode_text_string(bytes);
        parse_pdf_date(&text)
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::DateTime<chrono::Local>> for Object {
    fn from(time: chrono::DateTime<chrono::Local>) -> Self {
        Object::string_literal(format_pdf_date(&time.fixed_offset()))
    }
}

/// PDFDocEncoding differs from WinAnsi (`encoding_rs::WINDOWS_1252`) only in
/// a handful of control-range codepoints; everything else round-trips
/// through the existing Windows-1252 table, so the crate does not ship a
/// full transcoding table of its own.
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        decoded.into_owned()
    }
}

#[cfg(feature = "chrono")]
fn parse_pdf_date(text: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    use chrono::{FixedOffset, TimeZone};

    let text = text.strip_prefix("D:").unwrap_or(text);
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 14 {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    let hour: u32 = digits[8..10].parse().ok()?;
    let minute: u32 = digits[10..12].parse().ok()?;
    let second: u32 = digits[12..14].parse().ok()?;

    let rest = &text[digits.len()..];
    let offset = parse_pdf_date_offset(rest).unwrap_or(0);
    let tz = FixedOffset::east_opt(offset)?;
    tz.with_ymd_and_hms(year, month, day, hour, minute, second).single()
}

#[cfg(feature = "chrono")]
fn parse_pdf_date_offset(rest: &str) -> Option<i32> {
    let mut chars = rest.chars();
    let sign = match chars.next()? {
        '+' => 1,
        '-' => -1,
        'Z' => return Some(0),
        _ => return None,
    };
    let tail: String = chars.collect();
    let mut parts = tail.splitn(2, '\'');
    let hh: i32 = parts.next()?.parse().ok()?;
    let mm: i32 = parts
        .next()
        .map(|m| m.trim_end_matches('\'').parse().unwrap_or(0))
        .unwrap_or(0);
    Some(sign * (hh * 3600 + mm * 60))
}

#[cfg(feature = "chrono")]
fn format_pdf_date(time: &chrono::DateTime<chrono::FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let hh = offset.abs() / 3600;
    let mm = (offset.abs() % 3600) / 60;
    format!("D:{}{sign}{hh:02}'{mm:02}'", time.format("%Y%m%d%H%M%S"))
}

/// An ordered key→value mapping. Order is preserved (`indexmap`) purely so
/// that re-serializing an untouched dictionary produces a byte-identical
/// diff; semantics never depend on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

impl Dictionary {
    pub fn new() -> Self {
        Dictionary(IndexMap::new())
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0
            .get(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.0
            .get_mut(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut Object)> {
        self.0.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_type(&self) -> Result<&[u8]> {
        self.get(b"Type").and_then(Object::as_name)
    }

    pub fn has_type(&self, name: &[u8]) -> bool {
        matches!(self.get_type(), Ok(t) if t == name)
    }

    /// Raw (un-dereferenced) lookup — used by resource merging (§9 open
    /// question: keep foreign-absent keys as references, not resolved
    /// copies) to avoid inlining objects that should stay indirect.
    pub fn raw_get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(key)
    }
}

impl<K: Into<Vec<u8>>, V: Into<Object>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.set(k, v);
        }
        dict
    }
}

/// A stream object: its dictionary plus payload bytes. `content` holds
/// whatever bytes are currently authoritative — either the as-parsed
/// (possibly filtered) bytes, or bytes a caller has just `set_content`'d.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub content: Vec<u8>,
    pub allows_compression: bool,
    pub start_position: Option<usize>,
}

impl Stream {
    pub fn new(dict: Dictionary, content: Vec<u8>) -> Self {
        let mut dict = dict;
        dict.set("Length", Object::Integer(content.len() as i64));
        Stream {
            dict,
            content,
            allows_compression: true,
            start_position: None,
        }
    }

    pub fn with_start_position(mut self, pos: usize) -> Self {
        self.start_position = Some(pos);
        self
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.set("Length", Object::Integer(content.len() as i64));
        self.content = content;
    }

    /// Decode the stream according to the filter chain named in its
    /// dictionary, delegating the actual transform to the filter
    /// collaborators (flate2/weezl/ASCIIHex — see `crate::filters`).
    pub fn decompressed_content(&self) -> Result<Vec<u8>> {
        crate::filters::decode(&self.content, &self.dict)
    }

    pub fn filter_names(&self) -> Vec<Vec<u8>> {
        match self.dict.get(b"Filter") {
            Ok(Object::Name(name)) => vec![name.clone()],
            Ok(Object::Array(names)) => names.iter().filter_map(|o| o.as_name().ok().map(|n| n.to_vec())).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Object::Boolean(v)
    }
}
impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Object::Integer(v)
    }
}
impl From<i32> for Object {
    fn from(v: i32) -> Self {
        Object::Integer(v as i64)
    }
}
impl From<u32> for Object {
    fn from(v: u32) -> Self {
        Object::Integer(v as i64)
    }
}
impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Object::Real(v)
    }
}
impl From<f32> for Object {
    fn from(v: f32) -> Self {
        Object::Real(v as f64)
    }
}
impl From<Vec<Object>> for Object {
    fn from(v: Vec<Object>) -> Self {
        Object::Array(v)
    }
}
impl From<Dictionary> for Object {
    fn from(v: Dictionary) -> Self {
        Object::Dictionary(v)
    }
}
impl From<Stream> for Object {
    fn from(v: Stream) -> Self {
        Object::Stream(v)
    }
}
impl From<ObjectId> for Object {
    fn from(v: ObjectId) -> Self {
        Object::Reference(v)
    }
}
impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Object::string_literal(v)
    }
}
impl From<String> for Object {
    fn from(v: String) -> Self {
        Object::string_literal(v)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        crate::writer::write_object(&mut buf, self, None).map_err(|_| fmt::Error)?;
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }
}

/// Build a `Dictionary` from `"Key" => value` pairs, names supplied without
/// the leading `/`.
#[macro_export]
macro_rules! dictionary {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $value);
        )*
        dict
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_equality_is_byte_equality() {
        assert_eq!(Object::name("Foo"), Object::name("Foo"));
        assert_ne!(Object::name("Foo"), Object::name("Bar"));
    }

    #[test]
    fn dictionary_preserves_insertion_order() {
        let dict = dictionary! {
            "B" => 1,
            "A" => 2,
        };
        let keys: Vec<&[u8]> = dict.keys().map(|k| k.as_slice()).collect();
        assert_eq!(keys, vec![b"B".as_slice(), b"A".as_slice()]);
    }

    #[test]
    fn text_string_decodes_utf16_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for u in "hi".encode_utf16() {
            bytes.extend_from_slice(&u.to_be_bytes());
        }
        let obj = Object::String(bytes, StringFormat::Hexadecimal);
        assert_eq!(obj.as_text_string().unwrap(), "hi");
    }
}
