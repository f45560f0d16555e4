//! Content-stream tokenizer/re-serializer (§4.F): a page's `/Contents`
//! stream is a sequence of operands followed by an operator, plus the
//! special `BI ... ID ... EI` inline-image form where the "operand" is
//! raw image bytes rather than PDF objects.

use crate::error::{ParseError, Result};
use crate::object::{Dictionary, Object, StringFormat};

/// One operator and its operands, e.g. `100 600 Td` → `Operation { operator:
/// "Td", operands: [100, 600] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
}

impl Operation {
    pub fn new<S: Into<String>>(operator: S, operands: Vec<Object>) -> Self {
        Operation {
            operator: operator.into(),
            operands,
        }
    }
}

/// An inline image: `BI <dict> ID <data> EI`, folded into a single
/// `Operation` whose operator is `"BI"` and whose sole operand encodes
/// this struct (see `Content::encode`/`Content::decode`).
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

/// A fully decoded content stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub operations: Vec<Operation>,
}

impl Content {
    /// Parse a decoded (already FlateDecode'd, etc) content stream.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let mut operations = Vec::new();
        let mut operands: Vec<Object> = Vec::new();

        while pos < data.len() {
            pos = skip_ws_and_comments(data, pos);
            if pos >= data.len() {
                break;
            }

            if data[pos..].starts_with(b"BI") && is_operator_boundary(data, pos, 2) {
                let (image, new_pos) = parse_inline_image(data, pos + 2)?;
                operations.push(Operation::new("BI", vec![encode_inline_image(&image)]));
                operands.clear();
                pos = new_pos;
                continue;
            }

            match peek_operand(data, pos) {
                Some(()) => {
                    let (object, new_pos) = crate::parser::direct_object(crate::parser::ParserInput::new_extra(
                        &data[pos..],
                        "content operand",
                    ))
                    .map(|(rest, obj)| (obj, data.len() - rest.fragment().len()))
                    .map_err(|_| ParseError::InvalidContentStream("bad operand".into()))?;
                    operands.push(object);
                    pos = new_pos;
                }
                None => {
                    let (operator, new_pos) = parse_operator(data, pos)?;
                    operations.push(Operation::new(operator, std::mem::take(&mut operands)));
                    pos = new_pos;
                }
            }
        }

        Ok(Content { operations })
    }

    /// Re-serialize, reproducing the teacher's layout: one operation per
    /// line, operands space-separated before the operator.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for op in &self.operations {
            if op.operator == "BI" {
                if let Some(Object::Dictionary(wrapper)) = op.operands.first() {
                    let image = decode_inline_image(wrapper);
                    write_inline_image(&mut out, &image);
                    out.push(b'\n');
                    continue;
                }
            }
            for operand in &op.operands {
                crate::writer::write_object(&mut out, operand, None)?;
                out.push(b' ');
            }
            out.extend_from_slice(op.operator.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }
}

fn is_operator_boundary(data: &[u8], pos: usize, len: usize) -> bool {
    let after = pos + len;
    after >= data.len() || data[after].is_ascii_whitespace() || data[after] == b'/' || data[after] == b'('
}

fn peek_operand(data: &[u8], pos: usize) -> Option<()> {
    match data.get(pos)? {
        b'/' | b'(' | b'<' | b'[' | b'0'..=b'9' | b'+' | b'-' | b'.' => Some(()),
        b't' if data[pos..].starts_with(b"true") => Some(()),
        b'f' if data[pos..].starts_with(b"false") => Some(()),
        _ => None,
    }
}

fn skip_ws_and_comments(data: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < data.len() && data[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < data.len() && data[pos] == b'%' {
            while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
            continue;
        }
        break;
    }
    pos
}

fn parse_operator(data: &[u8], pos: usize) -> Result<(String, usize)> {
    let start = pos;
    let mut p = pos;
    while p < data.len()
        && !data[p].is_ascii_whitespace()
        && !matches!(data[p], b'/' | b'(' | b'<' | b'[' | b'%')
    {
        p += 1;
    }
    if p == start {
        return Err(ParseError::InvalidContentStream("empty operator".into()).into());
    }
    let operator = std::str::from_utf8(&data[start..p])
        .map_err(|_| ParseError::InvalidContentStream("non-utf8 operator".into()))?
        .to_string();
    Ok((operator, p))
}

/// Parse `<dict> ID <raw bytes> EI`, `pos` is just past `BI`.
fn parse_inline_image(data: &[u8], pos: usize) -> Result<(InlineImage, usize)> {
    let mut dict = Dictionary::new();
    let mut p = skip_ws_and_comments(data, pos);
    loop {
        p = skip_ws_and_comments(data, p);
        if data[p..].starts_with(b"ID") {
            p += 2;
            break;
        }
        let (key_obj, new_pos) = crate::parser::direct_object(crate::parser::ParserInput::new_extra(&data[p..], "BI key"))
            .map(|(rest, obj)| (obj, data.len() - rest.fragment().len()))
            .map_err(|_| ParseError::InvalidContentStream("bad inline image key".into()))?;
        let key = key_obj.as_name().map_err(|_| ParseError::InvalidContentStream("BI key not a name".into()))?.to_vec();
        p = skip_ws_and_comments(data, new_pos);
        let (value, new_pos) = crate::parser::direct_object(crate::parser::ParserInput::new_extra(&data[p..], "BI value"))
            .map(|(rest, obj)| (obj, data.len() - rest.fragment().len()))
            .map_err(|_| ParseError::InvalidContentStream("bad inline image value".into()))?;
        dict.set(key, value);
        p = new_pos;
    }
    // A single whitespace byte separates `ID` from the raw data.
    if p < data.len() && data[p].is_ascii_whitespace() {
        p += 1;
    }
    let data_start = p;
    let end = find_ei(data, data_start)?;
    let image_data = data[data_start..end].to_vec();
    let mut after = end + 2;
    after = skip_ws_and_comments(data, after);
    Ok((InlineImage { dict, data: image_data }, after))
}

fn find_ei(data: &[u8], start: usize) -> Result<usize> {
    let mut p = start;
    while p + 2 <= data.len() {
        if &data[p..p + 2] == b"EI" && (p == start || data[p - 1].is_ascii_whitespace()) {
            let after = p + 2;
            if after >= data.len() || data[after].is_ascii_whitespace() {
                let mut end = p;
                if end > start && data[end - 1].is_ascii_whitespace() {
                    end -= 1;
                }
                return Ok(end);
            }
        }
        p += 1;
    }
    Err(ParseError::InvalidContentStream("unterminated inline image".into()).into())
}

fn write_inline_image(out: &mut Vec<u8>, image: &InlineImage) {
    out.extend_from_slice(b"BI\n");
    for (key, value) in image.dict.iter() {
        out.push(b'/');
        out.extend_from_slice(key);
        out.push(b' ');
        let mut buf = Vec::new();
        let _ = crate::writer::write_object(&mut buf, value, None);
        out.extend_from_slice(&buf);
        out.push(b'\n');
    }
    out.extend_from_slice(b"ID ");
    out.extend_from_slice(&image.data);
    out.extend_from_slice(b"\nEI");
}

/// `InlineImage` is smuggled through `Operation::operands` as a one-element
/// `Dictionary` wrapper so `Content` doesn't need a third operand variant.
fn encode_inline_image(image: &InlineImage) -> Object {
    let mut wrapper = image.dict.clone();
    wrapper.set("__InlineData", Object::String(image.data.clone(), StringFormat::Hexadecimal));
    Object::Dictionary(wrapper)
}

fn decode_inline_image(wrapper: &Dictionary) -> InlineImage {
    let mut dict = wrapper.clone();
    let data = dict
        .remove(b"__InlineData")
        .and_then(|o| o.as_str().ok().map(|b| b.to_vec()))
        .unwrap_or_default();
    InlineImage { dict, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple_text_show() {
        let content = Content::decode(b"BT /F1 48 Tf 100 600 Td (Hello) Tj ET").unwrap();
        let operators: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["BT", "Tf", "Td", "Tj", "ET"]);
        assert_eq!(content.operations[3].operands, vec![Object::string_literal("Hello")]);
    }

    #[test]
    fn round_trips_through_encode() {
        let content = Content::decode(b"1 0 0 1 0 0 cm").unwrap();
        let encoded = content.encode().unwrap();
        let redecoded = Content::decode(&encoded).unwrap();
        assert_eq!(content, redecoded);
    }

    #[test]
    fn strips_comments_mid_stream() {
        let content = Content::decode(b"q % a comment\nQ").unwrap();
        let operators: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["q", "Q"]);
    }

    #[test]
    fn inline_image_round_trips() {
        let data = b"BI /W 1 /H 1 /BPC 8 /CS /G ID \x7f EI Q";
        let content = Content::decode(data).unwrap();
        assert_eq!(content.operations[0].operator, "BI");
        let encoded = content.encode().unwrap();
        let redecoded = Content::decode(&encoded).unwrap();
        assert_eq!(content.operations[0], redecoded.operations[0]);
    }
}
