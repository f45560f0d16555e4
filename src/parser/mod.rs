//! The low-level tokenizer (§4.B) and recursive object parser (§4.C),
//! plus the xref/trailer loader (§4.D). Positions are tracked with
//! `nom_locate::LocatedSpan` so parse errors can report a byte offset.
//! The tokenizer (whitespace/comment skipping, names, keywords, digit
//! runs) is built on real `nom` combinators; the object grammar above it
//! stays hand-rolled recursive descent, since PDF's grammar is
//! context-sensitive (a dictionary's `/Length` decides how many stream
//! bytes to consume) in a way `nom`'s combinator chains don't model well.

use std::collections::HashSet;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::multi::{many0, many0_count};
use nom::sequence::preceded;
use nom::IResult;
use nom_locate::LocatedSpan;

use crate::error::{Error, ParseError, Result, XrefError};
use crate::object::{Dictionary, Object, ObjectId, Stream, StringFormat};
use crate::reader::Reader;
use crate::xref::{Xref, XrefEntry};

pub type ParserInput<'a> = LocatedSpan<&'a [u8], &'static str>;

/// The concrete error nom's combinators are instantiated with below; PDF's
/// tokenizer never needs more than "matched" or "didn't".
type NomError<'a> = nom::error::Error<&'a [u8]>;

/// Literal-string nesting/embedding guard (§4.C edge cases, exercised by
/// `reader::tests::load_too_deep_brackets`).
pub const MAX_BRACKET: usize = crate::reader::MAX_BRACKET;

// ---------------------------------------------------------------------
// §4.B — low-level tokenizer, built on `nom` combinators
// ---------------------------------------------------------------------

fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// `%` through end-of-line, the comment's own bytes (without the `%`).
fn comment(input: &[u8]) -> IResult<&[u8], &[u8], NomError> {
    preceded(tag(&b"%"[..]), take_while(|b: u8| b != b'\n' && b != b'\r'))(input)
}

/// One run of whitespace bytes or one comment; `many0_count` below repeats
/// this to skip a whole stretch of insignificant bytes (§4.B).
fn whitespace_or_comment_run(input: &[u8]) -> IResult<&[u8], &[u8], NomError> {
    alt((take_while1(is_whitespace), comment))(input)
}

pub(crate) fn skip_whitespace_and_comments(data: &[u8], pos: usize) -> usize {
    match many0_count(whitespace_or_comment_run)(&data[pos..]) {
        Ok((rest, _)) => data.len() - rest.len(),
        Err(_) => pos,
    }
}

fn expect_keyword(data: &[u8], pos: usize, keyword: &[u8]) -> Option<usize> {
    let (rest, _) = tag::<_, _, NomError>(keyword)(&data[pos..]).ok()?;
    Some(data.len() - rest.len())
}

/// Consume a run of digits, returning the parsed magnitude and new
/// position. Does not handle a sign.
fn parse_digits(data: &[u8], pos: usize) -> Option<(u64, usize)> {
    let (rest, digits) = digit1::<_, NomError>(&data[pos..]).ok()?;
    let value: u64 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((value, data.len() - rest.len()))
}

fn parse_uint(data: &[u8], pos: usize) -> Option<(u64, usize)> {
    parse_digits(data, pos)
}

/// One name character: either a regular byte, or a `#xx` hex escape
/// decoded to the byte it represents (§4.A name escaping, reversed).
fn name_char(input: &[u8]) -> IResult<&[u8], u8, NomError> {
    use nom::error::{Error as NErr, ErrorKind};
    use nom::Err;

    if let Some(&b'#') = input.first() {
        if input.len() >= 3 && input[1].is_ascii_hexdigit() && input[2].is_ascii_hexdigit() {
            let hex = std::str::from_utf8(&input[1..3]).map_err(|_| Err::Error(NErr::new(input, ErrorKind::HexDigit)))?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| Err::Error(NErr::new(input, ErrorKind::HexDigit)))?;
            return Ok((&input[3..], byte));
        }
    }
    match input.first() {
        Some(&b) if is_regular(b) => Ok((&input[1..], b)),
        _ => Err(nom::Err::Error(NErr::new(input, ErrorKind::Char))),
    }
}

fn parse_name(data: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    if data.get(pos) != Some(&b'/') {
        return None;
    }
    let (rest, bytes): (&[u8], Vec<u8>) = many0(name_char)(&data[pos + 1..]).ok()?;
    Some((bytes, data.len() - rest.len()))
}

#[derive(Debug, Clone, Copy)]
struct NumToken {
    is_integer: bool,
    int_val: i64,
    real_val: f64,
}

fn parse_number_token(data: &[u8], pos: usize) -> Option<(NumToken, usize)> {
    let mut p = pos;
    let mut sign = 1i64;
    if p < data.len() && (data[p] == b'+' || data[p] == b'-') {
        if data[p] == b'-' {
            sign = -1;
        }
        p += 1;
    }
    let int_start = p;
    while p < data.len() && data[p].is_ascii_digit() {
        p += 1;
    }
    let mut is_integer = true;
    let mut frac_start = p;
    let mut frac_end = p;
    if p < data.len() && data[p] == b'.' {
        is_integer = false;
        p += 1;
        frac_start = p;
        while p < data.len() && data[p].is_ascii_digit() {
            p += 1;
        }
        frac_end = p;
    }
    if int_start == p || (int_start == frac_start && frac_start == frac_end && is_integer) {
        // No digits at all.
        if int_start == p {
            return None;
        }
    }
    let int_text = std::str::from_utf8(&data[int_start..if is_integer { p } else { frac_start - 1 }]).ok()?;
    let int_val: i64 = if int_text.is_empty() { 0 } else { int_text.parse().ok()? };

    let text = std::str::from_utf8(&data[pos..p]).ok()?;
    let real_val: f64 = text.parse().unwrap_or(int_val as f64);

    Some((
        NumToken {
            is_integer,
            int_val: sign * int_val,
            real_val: if sign < 0 { -real_val.abs() } else { real_val.abs() },
        },
        p,
    ))
}

fn parse_name(data: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    if pos >= data.len() || data[pos] != b'/' {
        return None;
    }
    let mut p = pos + 1;
    let mut bytes = Vec::new();
    while p < data.len() && is_regular(data[p]) {
        if data[p] == b'#' && p + 2 < data.len() && data[p + 1].is_ascii_hexdigit() && data[p + 2].is_ascii_hexdigit() {
            let hex = std::str::from_utf8(&data[p + 1..p + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            bytes.push(byte);
            p += 3;
        } else {
            bytes.push(data[p]);
            p += 1;
        }
    }
    Some((bytes, p))
}

fn parse_literal_string(data: &[u8], pos: usize) -> Result<(Vec<u8>, usize)> {
    debug_assert_eq!(data[pos], b'(');
    let mut p = pos + 1;
    let mut depth = 1usize;
    let mut out = Vec::new();
    while p < data.len() {
        match data[p] {
            b'\\' if p + 1 < data.len() => {
                p += 1;
                match data[p] {
                    b'n' => {
                        out.push(b'\n');
                        p += 1;
                    }
                    b'r' => {
                        out.push(b'\r');
                        p += 1;
                    }
                    b't' => {
                        out.push(b'\t');
                        p += 1;
                    }
                    b'b' => {
                        out.push(0x08);
                        p += 1;
                    }
                    b'f' => {
                        out.push(0x0C);
                        p += 1;
                    }
                    b'(' => {
                        out.push(b'(');
                        p += 1;
                    }
                    b')' => {
                        out.push(b')');
                        p += 1;
                    }
                    b'\\' => {
                        out.push(b'\\');
                        p += 1;
                    }
                    b'\r' => {
                        p += 1;
                        if p < data.len() && data[p] == b'\n' {
                            p += 1;
                        }
                    }
                    b'\n' => {
                        p += 1;
                    }
                    b'0'..=b'7' => {
                        let mut val: u32 = 0;
                        let mut n = 0;
                        while n < 3 && p < data.len() && (b'0'..=b'7').contains(&data[p]) {
                            val = val * 8 + (data[p] - b'0') as u32;
                            p += 1;
                            n += 1;
                        }
                        out.push((val & 0xFF) as u8);
                    }
                    other => {
                        out.push(other);
                        p += 1;
                    }
                }
            }
            b'(' => {
                depth += 1;
                if depth > MAX_BRACKET {
                    return Err(ParseError::TooDeeplyNested(MAX_BRACKET).into());
                }
                out.push(b'(');
                p += 1;
            }
            b')' => {
                depth -= 1;
                p += 1;
                if depth == 0 {
                    return Ok((out, p));
                }
                out.push(b')');
            }
            other => {
                out.push(other);
                p += 1;
            }
        }
    }
    Err(ParseError::UnexpectedEof.into())
}

fn parse_hex_string(data: &[u8], pos: usize) -> Result<(Vec<u8>, usize)> {
    debug_assert_eq!(data[pos], b'<');
    let mut p = pos + 1;
    let mut digits = Vec::new();
    loop {
        if p >= data.len() {
            return Err(ParseError::UnexpectedEof.into());
        }
        match data[p] {
            b'>' => {
                p += 1;
                break;
            }
            b if b.is_ascii_hexdigit() => digits.push(b),
            b if is_whitespace(b) => {}
            _ => return Err(ParseError::InvalidObject.into()),
        }
        p += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        let text = std::str::from_utf8(pair).map_err(|_| ParseError::InvalidObject)?;
        bytes.push(u8::from_str_radix(text, 16).map_err(|_| ParseError::InvalidObject)?);
    }
    Ok((bytes, p))
}

fn parse_object_with(
    data: &[u8], pos: usize, reader: Option<&Reader>, already_seen: &mut HashSet<ObjectId>,
) -> Result<(Object, usize)> {
    let pos = skip_whitespace_and_comments(data, pos);
    if pos >= data.len() {
        return Err(ParseError::UnexpectedEof.into());
    }
    match data[pos] {
        b'/' => {
            let (name, p) = parse_name(data, pos).ok_or(ParseError::InvalidObject)?;
            Ok((Object::Name(name), p))
        }
        b'(' => {
            let (bytes, p) = parse_literal_string(data, pos)?;
            Ok((Object::String(bytes, StringFormat::Literal), p))
        }
        b'<' if pos + 1 < data.len() && data[pos + 1] == b'<' => parse_dict_or_stream(data, pos, reader, already_seen),
        b'<' => {
            let (bytes, p) = parse_hex_string(data, pos)?;
            Ok((Object::String(bytes, StringFormat::Hexadecimal), p))
        }
        b'[' => {
            let mut p = pos + 1;
            let mut items = Vec::new();
            loop {
                p = skip_whitespace_and_comments(data, p);
                if p >= data.len() {
                    return Err(ParseError::UnexpectedEof.into());
                }
                if data[p] == b']' {
                    p += 1;
                    break;
                }
                let (obj, new_p) = parse_object_with(data, p, reader, already_seen)?;
                items.push(obj);
                p = new_p;
            }
            Ok((Object::Array(items), p))
        }
        b't' if data[pos..].starts_with(b"true") => Ok((Object::Boolean(true), pos + 4)),
        b'f' if data[pos..].starts_with(b"false") => Ok((Object::Boolean(false), pos + 5)),
        b'n' if data[pos..].starts_with(b"null") => Ok((Object::Null, pos + 4)),
        b'0'..=b'9' | b'+' | b'-' | b'.' => {
            let (token, p) = parse_number_token(data, pos).ok_or(ParseError::InvalidObject)?;
            if token.is_integer && token.int_val >= 0 {
                // Lookahead for "gen R".
                let after_first = skip_whitespace_and_comments(data, p);
                if let Some((gen, after_gen)) = parse_digits(data, after_first) {
                    let after_gen_ws = skip_whitespace_and_comments(data, after_gen);
                    if after_gen_ws < data.len()
                        && data[after_gen_ws] == b'R'
                        && (after_gen_ws + 1 >= data.len() || !is_regular(data[after_gen_ws + 1]))
                    {
                        return Ok((Object::Reference((token.int_val as u32, gen as u16)), after_gen_ws + 1));
                    }
                }
            }
            if token.is_integer {
                Ok((Object::Integer(token.int_val), p))
            } else {
                Ok((Object::Real(token.real_val), p))
            }
        }
        _ => Err(ParseError::InvalidObject.into()),
    }
}

fn parse_dict_or_stream(
    data: &[u8], pos: usize, reader: Option<&Reader>, already_seen: &mut HashSet<ObjectId>,
) -> Result<(Object, usize)> {
    let mut p = pos + 2;
    let mut dict = Dictionary::new();
    loop {
        p = skip_whitespace_and_comments(data, p);
        if p >= data.len() {
            return Err(ParseError::UnexpectedEof.into());
        }
        if data[p] == b'>' && p + 1 < data.len() && data[p + 1] == b'>' {
            p += 2;
            break;
        }
        let (key, new_p) = parse_name(data, p).ok_or(ParseError::InvalidObject)?;
        p = skip_whitespace_and_comments(data, new_p);
        let (value, new_p) = parse_object_with(data, p, reader, already_seen)?;
        dict.set(key, value);
        p = new_p;
    }

    // §4.C: a dict immediately followed by `stream` promotes to a Stream.
    let after_ws = skip_whitespace_and_comments(data, p);
    if let Some(reader) = reader {
        if let Some(stream_kw_end) = expect_keyword(data, after_ws, b"stream") {
            let mut data_start = stream_kw_end;
            if data.get(data_start) == Some(&b'\r') {
                data_start += 1;
            }
            if data.get(data_start) == Some(&b'\n') {
                data_start += 1;
            }
            let length = resolve_length(&dict, reader, already_seen);
            let end = match length {
                Some(len) => {
                    let mut candidate = data_start + len;
                    if candidate > data.len() || !tolerant_endstream_follows(data, candidate) {
                        // §4.D edge case: tolerate an off-by-one /Length.
                        if candidate + 1 <= data.len() && tolerant_endstream_follows(data, candidate + 1) {
                            candidate += 1;
                        } else if candidate > 0 && candidate - 1 <= data.len() && tolerant_endstream_follows(data, candidate - 1) {
                            candidate -= 1;
                        } else {
                            candidate = scan_for_endstream(data, data_start).unwrap_or(data.len());
                        }
                    }
                    candidate
                }
                None => scan_for_endstream(data, data_start).unwrap_or(data.len()),
            };
            let content = data[data_start..end.min(data.len())].to_vec();
            let mut end_pos = end.min(data.len());
            end_pos = skip_whitespace_and_comments(data, end_pos);
            if let Some(after_endstream) = expect_keyword(data, end_pos, b"endstream") {
                end_pos = after_endstream;
            }
            let stream = Stream::new(dict, content).with_start_position(data_start);
            return Ok((Object::Stream(stream), end_pos));
        }
    }
    Ok((Object::Dictionary(dict), p))
}

fn tolerant_endstream_follows(data: &[u8], pos: usize) -> bool {
    let p = skip_whitespace_and_comments(data, pos.min(data.len()));
    data[p..].starts_with(b"endstream")
}

fn scan_for_endstream(data: &[u8], start: usize) -> Option<usize> {
    let needle = b"endstream";
    let mut p = start;
    while p + needle.len() <= data.len() {
        if &data[p..p + needle.len()] == needle {
            let mut end = p;
            // Trim the EOL that precedes `endstream` (§4.C).
            if end > start && data[end - 1] == b'\n' {
                end -= 1;
                if end > start && data[end - 1] == b'\r' {
                    end -= 1;
                }
            } else if end > start && data[end - 1] == b'\r' {
                end -= 1;
            }
            return Some(end);
        }
        p += 1;
    }
    None
}

/// Resolve `/Length` to a byte count, following one level of indirection
/// through the reader's xref table when necessary (§4.D.4 / §4.C).
fn resolve_length(dict: &Dictionary, reader: &Reader, already_seen: &HashSet<ObjectId>) -> Option<usize> {
    match dict.get(b"Length").ok()? {
        Object::Integer(n) => usize::try_from(*n).ok(),
        Object::Reference(id) => {
            if already_seen.contains(id) {
                return None;
            }
            let entry = reader.document.reference_table.get(id.0)?;
            if let XrefEntry::Normal { offset, generation } = *entry {
                if generation != id.1 {
                    return None;
                }
                let data = reader.buffer;
                let offset = offset as usize;
                if offset > data.len() {
                    return None;
                }
                let pos = skip_whitespace_and_comments(data, offset);
                let (_num, pos) = parse_uint(data, pos)?;
                let pos = skip_whitespace_and_comments(data, pos);
                let (_gen, pos) = parse_uint(data, pos)?;
                let pos = skip_whitespace_and_comments(data, pos);
                let pos = expect_keyword(data, pos, b"obj")?;
                let pos = skip_whitespace_and_comments(data, pos);
                let (token, _pos) = parse_number_token(data, pos)?;
                usize::try_from(token.int_val).ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------
// §4.C public entry points
// ---------------------------------------------------------------------

/// Parse a single object with no reader context (used for object-stream
/// members and content-stream operands, neither of which may contain a
/// stream or an indirect reference needing xref lookups).
pub fn direct_object(input: ParserInput) -> Result<(ParserInput, Object)> {
    let data = *input.fragment();
    let mut dummy = HashSet::new();
    let (object, pos) = parse_object_with(data, 0, None, &mut dummy)?;
    Ok((LocatedSpan::new_extra(&data[pos..], input.extra), object))
}

/// Parse the indirect object at `offset`: `id gen obj ... endobj`.
pub fn indirect_object(
    input: ParserInput, offset: usize, expected_id: Option<ObjectId>, reader: &Reader, already_seen: &mut HashSet<ObjectId>,
) -> Result<(ObjectId, Object)> {
    let data = *input.fragment();
    if offset > data.len() {
        return Err(Error::InvalidOffset(offset));
    }
    let mut pos = skip_whitespace_and_comments(data, offset);
    let (num, new_pos) = parse_uint(data, pos).ok_or(ParseError::InvalidObject)?;
    pos = skip_whitespace_and_comments(data, new_pos);
    let (gen, new_pos) = parse_uint(data, pos).ok_or(ParseError::InvalidObject)?;
    pos = skip_whitespace_and_comments(data, new_pos);
    pos = expect_keyword(data, pos, b"obj").ok_or(ParseError::InvalidObject)?;
    let id: ObjectId = (num as u32, gen as u16);
    let _ = expected_id;

    let (object, pos) = parse_object_with(data, pos, Some(reader), already_seen)?;
    let after = skip_whitespace_and_comments(data, pos);
    let _ = expect_keyword(data, after, b"endobj");
    Ok((id, object))
}

/// Parse the header of an object stream: `n` pairs of `(object number,
/// relative offset)` integers.
pub fn object_stream_header(input: ParserInput, n: usize) -> Result<Vec<(u32, usize)>> {
    let data = *input.fragment();
    let mut pos = 0usize;
    let mut pairs = Vec::with_capacity(n);
    for _ in 0..n {
        pos = skip_whitespace_and_comments(data, pos);
        let (obj_num, new_pos) = parse_uint(data, pos).ok_or(ParseError::InvalidObject)?;
        pos = skip_whitespace_and_comments(data, new_pos);
        let (rel_offset, new_pos) = parse_uint(data, pos).ok_or(ParseError::InvalidObject)?;
        pos = new_pos;
        pairs.push((obj_num as u32, rel_offset as usize));
    }
    Ok(pairs)
}

/// `%PDF-1.x` header; returns the version string (`"1.5"`, etc).
pub fn header(input: ParserInput) -> Option<String> {
    let data = *input.fragment();
    let pos = data.windows(5).position(|w| w == b"%PDF-")?;
    let start = pos + 5;
    let mut end = start;
    while end < data.len() && (data[end].is_ascii_digit() || data[end] == b'.') {
        end += 1;
    }
    if end == start {
        return None;
    }
    Some(String::from_utf8_lossy(&data[start..end]).into_owned())
}

/// The binary-marker comment on the line following the header, if its
/// bytes are all ≥ 0x80 (kept byte-exact so a re-saved file still opens
/// in tools that sniff this line to decide binary-transfer-safety).
pub fn binary_mark(input: ParserInput) -> Option<Vec<u8>> {
    let data = *input.fragment();
    if data.first() != Some(&b'%') {
        return None;
    }
    let end = data.iter().position(|&b| b == b'\n' || b == b'\r').unwrap_or(data.len());
    Some(data[1..end].to_vec())
}

/// `startxref\n<offset>\n%%EOF`; returns the offset.
pub fn xref_start(input: ParserInput) -> Option<i64> {
    let data = *input.fragment();
    let pos = data.windows(9).position(|w| w == b"startxref")?;
    let pos = skip_whitespace_and_comments(data, pos + 9);
    let (value, _) = parse_digits(data, pos)?;
    Some(value as i64)
}

// ---------------------------------------------------------------------
// §4.D — xref & trailer loader
// ---------------------------------------------------------------------

/// Parse the xref section (classical table *or* xref stream) beginning at
/// `input`'s start, plus its trailer dictionary.
pub fn xref_and_trailer(input: ParserInput, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let data = *input.fragment();
    let pos = skip_whitespace_and_comments(data, 0);
    if pos >= data.len() {
        return Err(XrefError::Parse.into());
    }
    if data[pos..].starts_with(b"xref") {
        parse_classical_xref(data, pos + 4)
    } else if data[pos].is_ascii_digit() {
        parse_xref_stream(data, pos, reader)
    } else {
        Err(XrefError::Parse.into())
    }
}

fn parse_classical_xref(data: &[u8], mut pos: usize) -> Result<(Xref, Dictionary)> {
    let mut xref = Xref::new(0);
    let mut first_subsection = true;
    loop {
        pos = skip_whitespace_and_comments(data, pos);
        if data[pos..].starts_with(b"trailer") {
            pos += 7;
            break;
        }
        let (first_id, new_pos) = match parse_uint(data, pos) {
            Some(v) => v,
            None => return Err(XrefError::Parse.into()),
        };
        if first_subsection {
            if first_id != 0 {
                xref.zero_index_candidate = Some(first_id as u32);
            }
            first_subsection = false;
        }
        pos = skip_whitespace_and_comments(data, new_pos);
        let (count, new_pos) = parse_uint(data, pos).ok_or(XrefError::Parse)?;
        pos = new_pos;
        // A single EOL is expected before the first fixed-width entry.
        if pos < data.len() && (data[pos] == b'\r' || data[pos] == b'\n') {
            if data[pos] == b'\r' && data.get(pos + 1) == Some(&b'\n') {
                pos += 2;
            } else {
                pos += 1;
            }
        }
        for i in 0..count {
            pos = skip_whitespace_and_comments(data, pos);
            if pos + 18 > data.len() {
                return Err(XrefError::Parse.into());
            }
            let entry_bytes = &data[pos..pos + 18.min(data.len() - pos)];
            let offset: u32 = std::str::from_utf8(&entry_bytes[0..10])
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(XrefError::Parse)?;
            let generation: u16 = std::str::from_utf8(&entry_bytes[11..16])
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(XrefError::Parse)?;
            let kind = entry_bytes[17];
            let id = first_id as u32 + i as u32;
            let entry = match kind {
                b'n' => XrefEntry::Normal { offset, generation },
                b'f' => XrefEntry::Free { next: offset, gen: generation },
                _ => return Err(XrefError::Parse.into()),
            };
            xref.entries.entry(id).or_insert(entry);
            // Realign past the 20-byte (or tolerated 19/21-byte) record.
            pos += 18;
            while pos < data.len() && (data[pos] == b' ' || data[pos] == b'\r' || data[pos] == b'\n') {
                pos += 1;
                if data.get(pos.saturating_sub(1)) == Some(&b'\n') {
                    break;
                }
            }
        }
    }
    pos = skip_whitespace_and_comments(data, pos);
    let mut dummy_reader_seen = HashSet::new();
    let (trailer_obj, _pos) = parse_object_with(data, pos, None, &mut dummy_reader_seen)?;
    let trailer = trailer_obj.as_dict().map_err(|_| XrefError::Parse)?.clone();
    if let Ok(size) = trailer.get(b"Size").and_then(Object::as_i64) {
        xref.size = size.max(0) as u32;
    }
    Ok((xref, trailer))
}

/// Peek the `id gen obj` header at `offset` without parsing the object body,
/// for verifying a candidate zero-index shift (§4.D.4) against what's
/// actually on disk. Returns `None` if `offset` doesn't land on such a header.
pub fn peek_object_header(data: &[u8], offset: usize) -> Option<(u32, u16)> {
    if offset > data.len() {
        return None;
    }
    let pos = skip_whitespace_and_comments(data, offset);
    let (num, pos) = parse_uint(data, pos)?;
    let pos = skip_whitespace_and_comments(data, pos);
    let (gen, pos) = parse_uint(data, pos)?;
    let pos = skip_whitespace_and_comments(data, pos);
    expect_keyword(data, pos, b"obj")?;
    Some((num as u32, gen as u16))
}

fn parse_xref_stream(data: &[u8], pos: usize, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let mut already_seen = HashSet::new();
    let input = LocatedSpan::new_extra(data, "xref stream");
    let (_, object) = indirect_object(input, pos, None, reader, &mut already_seen)?;
    let stream = object.as_stream().map_err(|_| XrefError::Parse)?;
    let trailer = stream.dict.clone();
    let decoded = stream.decompressed_content().map_err(|_| XrefError::Parse)?;

    let w = trailer.get(b"W").and_then(Object::as_array).map_err(|_| XrefError::Parse)?;
    if w.len() != 3 {
        return Err(XrefError::Parse.into());
    }
    let widths: Vec<usize> = w
        .iter()
        .map(|o| o.as_i64().unwrap_or(0).max(0) as usize)
        .collect();

    let size = trailer.get(b"Size").and_then(Object::as_i64).map_err(|_| XrefError::Parse)?;
    let index: Vec<i64> = match trailer.get(b"Index").and_then(Object::as_array) {
        Ok(arr) => arr.iter().filter_map(|o| o.as_i64().ok()).collect(),
        Err(_) => vec![0, size],
    };

    let mut xref = Xref::new(size.max(0) as u32);
    let row_width = widths[0] + widths[1] + widths[2];
    let mut cursor = 0usize;
    let mut pairs = index.chunks_exact(2);
    for pair in &mut pairs {
        let (first, count) = (pair[0], pair[1]);
        for i in 0..count {
            if cursor + row_width > decoded.len() {
                break;
            }
            let row = &decoded[cursor..cursor + row_width];
            cursor += row_width;
            let mut offset_in_row = 0usize;
            let read_field = |w: usize, row: &[u8], start: &mut usize| -> u64 {
                if w == 0 {
                    return 1; // default type is 1 (in-use) per §4.D.2
                }
                let mut v: u64 = 0;
                for &b in &row[*start..*start + w] {
                    v = (v << 8) | b as u64;
                }
                *start += w;
                v
            };
            let field_type = read_field(widths[0], row, &mut offset_in_row);
            let field2 = read_field(widths[1], row, &mut offset_in_row);
            let field3 = read_field(widths[2], row, &mut offset_in_row);

            let id = (first + i) as u32;
            let entry = match field_type {
                0 => XrefEntry::Free { next: field2 as u32, gen: field3 as u16 },
                1 => XrefEntry::Normal { offset: field2 as u32, generation: field3 as u16 },
                2 => XrefEntry::Compressed { container: field2 as u32, index: field3 as u16 },
                _ => XrefEntry::UnusableFree,
            };
            xref.entries.entry(id).or_insert(entry);
        }
    }

    Ok((xref, trailer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(data: &[u8]) -> ParserInput<'_> {
        LocatedSpan::new_extra(data, "test")
    }

    #[test]
    fn header_extracts_version() {
        assert_eq!(header(span(b"%PDF-1.5\n...")), Some("1.5".to_string()));
    }

    #[test]
    fn xref_start_finds_offset() {
        assert_eq!(xref_start(span(b"startxref\n1234\n%%EOF")), Some(1234));
    }

    #[test]
    fn name_decodes_hex_escape() {
        let (name, pos) = parse_name(b"/A#42C", 0).unwrap();
        assert_eq!(name, b"ABC");
        assert_eq!(pos, 6);
    }

    #[test]
    fn literal_string_allows_balanced_parens() {
        let (s, _) = parse_literal_string(b"(a(b)c)", 0).unwrap();
        assert_eq!(s, b"a(b)c");
    }

    #[test]
    fn number_token_distinguishes_integer_and_real() {
        let (tok, _) = parse_number_token(b"3.14", 0).unwrap();
        assert!(!tok.is_integer);
        assert!((tok.real_val - 3.14).abs() < 1e-9);

        let (tok, _) = parse_number_token(b"42", 0).unwrap();
        assert!(tok.is_integer);
        assert_eq!(tok.int_val, 42);
    }

    #[test]
    fn reference_lookahead_recognizes_indirect_ref() {
        let mut seen = HashSet::new();
        let (object, _) = parse_object_with(b"12 0 R", 0, None, &mut seen).unwrap();
        assert_eq!(object, Object::Reference((12, 0)));
    }
}
