use std::collections::BTreeMap;

use nom_locate::LocatedSpan;

use crate::error::{ParseError, Result};
use crate::object::{Object, ObjectId, Stream};
use crate::parser::{self, ParserInput};

/// An object stream's decoded contents: every indirect object it packs,
/// keyed by `(object number, generation 0)` — object streams may only
/// contain generation-0 objects.
pub struct ObjectStream {
    pub objects: BTreeMap<ObjectId, Object>,
}

impl ObjectStream {
    /// Decode `stream` (a `/Type /ObjStm`) into its packed objects, per
    /// §GLOSSARY "Object stream" and the `/N`/`/First` header fields.
    pub fn new(stream: &mut Stream) -> Result<Self> {
        let data = stream.decompressed_content()?;

        let n = stream
            .dict
            .get(b"N")
            .and_then(Object::as_i64)
            .map_err(|_| ParseError::InvalidObject)? as usize;
        let first = stream
            .dict
            .get(b"First")
            .and_then(Object::as_i64)
            .map_err(|_| ParseError::InvalidObject)? as usize;

        let header_input = ParserInput::new_extra(&data[..first.min(data.len())], "objstm header");
        let header_pairs = parser::object_stream_header(header_input, n)?;

        let mut objects = BTreeMap::new();
        for (obj_num, rel_offset) in header_pairs {
            let start = first + rel_offset;
            if start > data.len() {
                continue;
            }
            let body = LocatedSpan::new_extra(&data[start..], "objstm object");
            if let Ok((_, object)) = parser::direct_object(body) {
                objects.insert((obj_num, 0), object);
            }
        }

        Ok(ObjectStream { objects })
    }
}
