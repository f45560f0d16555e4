use std::io;

use crate::object::ObjectId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type. Reader operations surface these directly; the
/// writer can only fail on the output stream's own I/O.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("xref error: {0}")]
    Xref(#[from] XrefError),

    #[error("object {0:?} is not of the expected type: {1}")]
    Type(ObjectId, &'static str),

    #[error("dictionary is missing key /{0}")]
    DictKey(String),

    #[error("no object found with id {0:?}")]
    MissingXrefEntry,

    #[error("reference cycle detected while resolving {0:?}")]
    ReferenceCycle(ObjectId),

    #[error("offset {0} is out of bounds")]
    InvalidOffset(usize),

    #[error("invalid stream: {0}")]
    InvalidStream(String),

    #[error("numeric cast failed: {0}")]
    NumericCast(String),

    #[error("unknown destination fit type: {0}")]
    UnknownFitType(String),

    #[error("page has no defined size and none could be inherited")]
    PageSizeNotDefined,

    #[error("encrypted document has not been decrypted")]
    NotDecrypted,

    #[error("document is encrypted with an unsupported handler: {0}")]
    UnsupportedEncryption(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("decryption failed: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("operation not supported: {0}")]
    Unimplemented(&'static str),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("file does not start with a recognizable %PDF- header")]
    InvalidFileHeader,

    #[error("invalid xref table or stream")]
    InvalidXref,

    #[error("invalid object at the given offset")]
    InvalidObject,

    #[error("dictionary is not followed by a valid stream")]
    InvalidStreamHeader,

    #[error("literal string nesting exceeds the maximum of {0}")]
    TooDeeplyNested(usize),

    #[error("content stream is malformed: {0}")]
    InvalidContentStream(String),

    #[error("unexpected end of input while parsing")]
    UnexpectedEof,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum XrefError {
    #[error("could not locate startxref")]
    Start,

    #[error("startxref of a /Prev table points out of bounds")]
    PrevStart,

    #[error("/XRefStm points out of bounds")]
    StreamStart,

    #[error("xref table is malformed")]
    Parse,

    #[error("xref table is not zero-indexed")]
    NotZeroIndexed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("the /Encrypt dictionary uses an unsupported filter or version")]
    UnsupportedHandler,

    #[error("no password has authenticated this document yet")]
    NotAuthenticated,

    #[error("RC4 keystream application failed")]
    Cipher,
}
