//! Low-level object serialization (§4.A write-side rules): `Real`
//! formatting, `Name` escaping, string literal-vs-hex choice, and stream
//! `/Length` rewriting with encryption applied before the stream
//! delimiters are written.

use std::io::Write;

use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectId, StringFormat};

/// Per-object encryption context threaded through the writer so a stream's
/// or string's bytes are encrypted with that object's derived key before
/// the `/Length`-prefixed delimiters are emitted (§4.I write path).
pub struct ObjectEncryption<'a> {
    pub key: &'a [u8],
    pub id: ObjectId,
}

pub fn write_object<W: Write>(writer: &mut W, object: &Object, encryption: Option<&ObjectEncryption>) -> Result<()> {
    match object {
        Object::Null => writer.write_all(b"null")?,
        Object::Boolean(b) => writer.write_all(if *b { b"true" } else { b"false" })?,
        Object::Integer(i) => {
            let mut buf = itoa::Buffer::new();
            writer.write_all(buf.format(*i).as_bytes())?;
        }
        Object::Real(f) => write_real(writer, *f)?,
        Object::Name(name) => write_name(writer, name)?,
        Object::String(bytes, format) => write_string(writer, bytes, *format, encryption)?,
        Object::Array(items) => {
            writer.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writer.write_all(b" ")?;
                }
                write_object(writer, item, encryption)?;
            }
            writer.write_all(b"]")?;
        }
        Object::Dictionary(dict) => write_dict(writer, dict, encryption)?,
        Object::Stream(stream) => {
            let content = if let Some(enc) = encryption {
                crate::encryption::encrypt_bytes(enc.key, enc.id, &stream.content)?
            } else {
                stream.content.clone()
            };
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::Integer(content.len() as i64));
            write_dict(writer, &dict, encryption)?;
            writer.write_all(b"\nstream\n")?;
            writer.write_all(&content)?;
            writer.write_all(b"\nendstream")?;
        }
        Object::Reference(id) => {
            write!(writer, "{} {} R", id.0, id.1)?;
        }
    }
    Ok(())
}

/// §4.A: no exponent notation, trailing zeros trimmed, but an
/// integer-valued real keeps its decimal point (`2.0`, not `2`) so it
/// still round-trips as a `Real` rather than parsing back as an `Integer`.
fn write_real<W: Write>(writer: &mut W, value: f64) -> Result<()> {
    let mut s = format!("{value:.6}");
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn write_name<W: Write>(writer: &mut W, name: &[u8]) -> Result<()> {
    writer.write_all(b"/")?;
    for &byte in name {
        let needs_escape = !(0x21..=0x7E).contains(&byte)
            || matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#');
        if needs_escape {
            write!(writer, "#{byte:02X}")?;
        } else {
            writer.write_all(&[byte])?;
        }
    }
    Ok(())
}

fn write_string<W: Write>(
    writer: &mut W, bytes: &[u8], format: StringFormat, encryption: Option<&ObjectEncryption>,
) -> Result<()> {
    let encrypted;
    let bytes = if let Some(enc) = encryption {
        encrypted = crate::encryption::encrypt_bytes(enc.key, enc.id, bytes)?;
        &encrypted
    } else {
        bytes
    };
    match format {
        StringFormat::Literal => {
            writer.write_all(b"(")?;
            for &byte in bytes {
                match byte {
                    b'(' | b')' | b'\\' => {
                        writer.write_all(&[b'\\', byte])?;
                    }
                    b'\n' => writer.write_all(b"\\n")?,
                    b'\r' => writer.write_all(b"\\r")?,
                    b'\t' => writer.write_all(b"\\t")?,
                    0x08 => writer.write_all(b"\\b")?,
                    0x0C => writer.write_all(b"\\f")?,
                    _ => writer.write_all(&[byte])?,
                }
            }
            writer.write_all(b")")?;
        }
        StringFormat::Hexadecimal => {
            writer.write_all(b"<")?;
            for &byte in bytes {
                write!(writer, "{byte:02x}")?;
            }
            writer.write_all(b">")?;
        }
    }
    Ok(())
}

fn write_dict<W: Write>(writer: &mut W, dict: &Dictionary, encryption: Option<&ObjectEncryption>) -> Result<()> {
    writer.write_all(b"<<")?;
    for (key, value) in dict.iter() {
        write_name(writer, key)?;
        writer.write_all(b" ")?;
        write_object(writer, value, encryption)?;
        writer.write_all(b" ")?;
    }
    writer.write_all(b">>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn to_string(object: &Object) -> String {
        let mut buf = Vec::new();
        write_object(&mut buf, object, None).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn integers_and_reals_format_compactly() {
        assert_eq!(to_string(&Object::Integer(42)), "42");
        assert_eq!(to_string(&Object::Real(3.5)), "3.5");
        assert_eq!(to_string(&Object::Real(2.0)), "2.0");
    }

    #[test]
    fn names_escape_irregular_bytes() {
        assert_eq!(to_string(&Object::name("A B")), "/A#20B");
    }

    #[test]
    fn literal_strings_escape_parens() {
        assert_eq!(to_string(&Object::string_literal("a(b)c")), "(a\\(b\\)c)");
    }

    #[test]
    fn dictionaries_preserve_order() {
        let dict = dictionary! { "B" => 1, "A" => 2 };
        assert_eq!(to_string(&Object::Dictionary(dict)), "<</B 1 /A 2 >>");
    }
}
