//! PDF Standard Security Handler, revisions 2 and 3 (§4.I): RC4-based
//! encryption keyed from a user/owner password pair, per the algorithms
//! numbered 3.1-3.7 in the PDF specification. AES (handler V >= 4) and
//! public-key security handlers are out of scope.

mod rc4;

use md5::{Digest, Md5};

use crate::error::{DecryptionError, Error, Result};
use crate::object::{Dictionary, Object, ObjectId, StringFormat};
use crate::Document;

/// Padding appended to a password shorter than 32 bytes before hashing
/// (PDF spec, "Algorithm 3.2" step a).
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// The file encryption key, derived once a password authenticates, plus
/// what's needed to key individual objects (Algorithm 3.1).
#[derive(Debug, Clone)]
pub struct EncryptionState {
    key: Vec<u8>,
    revision: u8,
    encrypt_metadata: bool,
}

impl EncryptionState {
    pub(crate) fn from_key(key: Vec<u8>, revision: u8, encrypt_metadata: bool) -> Self {
        EncryptionState {
            key,
            revision,
            encrypt_metadata,
        }
    }

    /// The derived file encryption key, for the writer's per-object keying.
    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    /// Authenticate `password` against `document`'s `/Encrypt` dictionary
    /// and derive the file encryption key on success.
    pub(crate) fn decode(document: &Document, password: &str) -> Result<Self> {
        let params = EncryptParams::read(document)?;
        let (_, key) = authenticate_with_params(&params, password.as_bytes())?;
        Ok(EncryptionState {
            key,
            revision: params.r,
            encrypt_metadata: params.encrypt_metadata,
        })
    }
}

/// The subset of the `/Encrypt` dictionary the handler needs, plus the
/// file's first `/ID` element (mixed into the key per Algorithm 3.2).
struct EncryptParams {
    o: Vec<u8>,
    u: Vec<u8>,
    p: i32,
    r: u8,
    length_bytes: usize,
    id0: Vec<u8>,
    encrypt_metadata: bool,
}

impl EncryptParams {
    fn read(document: &Document) -> Result<Self> {
        let encrypt_obj = document
            .trailer
            .get(b"Encrypt")
            .map_err(|_| DecryptionError::UnsupportedHandler)?;

        let encrypt_dict: &Dictionary = match encrypt_obj {
            Object::Reference(id) => document
                .get_dictionary(*id)
                .map_err(|_| DecryptionError::UnsupportedHandler)?,
            Object::Dictionary(dict) => dict,
            _ => return Err(DecryptionError::UnsupportedHandler.into()),
        };

        let filter = encrypt_dict
            .get(b"Filter")
            .and_then(Object::as_name)
            .map_err(|_| DecryptionError::UnsupportedHandler)?;
        if filter != b"Standard" {
            return Err(DecryptionError::UnsupportedHandler.into());
        }

        let v = encrypt_dict.get(b"V").and_then(Object::as_i64).unwrap_or(0);
        if !(0..=2).contains(&v) {
            return Err(DecryptionError::UnsupportedHandler.into());
        }

        let r = encrypt_dict
            .get(b"R")
            .and_then(Object::as_i64)
            .map_err(|_| DecryptionError::UnsupportedHandler)?;
        if r != 2 && r != 3 {
            return Err(DecryptionError::UnsupportedHandler.into());
        }

        let o = encrypt_dict
            .get(b"O")
            .and_then(Object::as_str)
            .map_err(|_| DecryptionError::UnsupportedHandler)?
            .to_vec();
        let u = encrypt_dict
            .get(b"U")
            .and_then(Object::as_str)
            .map_err(|_| DecryptionError::UnsupportedHandler)?
            .to_vec();
        let p = encrypt_dict
            .get(b"P")
            .and_then(Object::as_i64)
            .map_err(|_| DecryptionError::UnsupportedHandler)? as i32;

        let length_bits = encrypt_dict.get(b"Length").and_then(Object::as_i64).unwrap_or(40);
        let length_bytes = (length_bits / 8).max(5) as usize;

        let encrypt_metadata = encrypt_dict
            .get(b"EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        let id0 = document
            .trailer
            .get(b"ID")
            .and_then(Object::as_array)
            .ok()
            .and_then(|arr| arr.first())
            .and_then(|o| o.as_str().ok())
            .map(|b| b.to_vec())
            .unwrap_or_default();

        Ok(EncryptParams {
            o,
            u,
            p,
            r: r as u8,
            length_bytes,
            id0,
            encrypt_metadata,
        })
    }
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PADDING[..32 - n]);
    out
}

/// Algorithm 3.2: derive the file encryption key from a (padded) password.
fn compute_encryption_key(params: &EncryptParams, password: &[u8]) -> Vec<u8> {
    let padded = pad_password(password);
    let key_len = if params.r == 2 { 5 } else { params.length_bytes };

    let mut hasher = Md5::new();
    hasher.update(padded);
    hasher.update(&params.o);
    hasher.update(params.p.to_le_bytes());
    hasher.update(&params.id0);
    let mut digest = hasher.finalize().to_vec();

    if params.r >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_len]);
            digest = h.finalize().to_vec();
        }
    }

    digest.truncate(key_len);
    digest
}

/// Algorithms 3.4 (R2) / 3.5 (R3) - the `/U` entry's value for a given key.
fn compute_u(params: &EncryptParams, key: &[u8]) -> Vec<u8> {
    if params.r == 2 {
        rc4::apply(key, &PADDING)
    } else {
        let mut hasher = Md5::new();
        hasher.update(PADDING);
        hasher.update(&params.id0);
        let mut digest = hasher.finalize().to_vec();
        digest = rc4::apply(key, &digest);
        for i in 1u8..=19 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            digest = rc4::apply(&round_key, &digest);
        }
        digest.resize(32, 0);
        digest
    }
}

/// Algorithm 3.3 - the `/O` entry's value.
fn compute_o(owner_password: &[u8], user_password: &[u8], r: u8, length_bytes: usize) -> Vec<u8> {
    let padded_owner = pad_password(owner_password);
    let key_len = if r == 2 { 5 } else { length_bytes };

    let mut hasher = Md5::new();
    hasher.update(padded_owner);
    let mut digest = hasher.finalize().to_vec();
    if r >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_len]);
            digest = h.finalize().to_vec();
        }
    }
    let rc4_key = &digest[..key_len];

    let padded_user = pad_password(user_password);
    let mut o = rc4::apply(rc4_key, &padded_user);
    if r >= 3 {
        for i in 1u8..=19 {
            let round_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            o = rc4::apply(&round_key, &o);
        }
    }
    o
}

/// Algorithm 3.6: does `password` authenticate as the user password?
fn authenticate_user_password(params: &EncryptParams, password: &[u8]) -> Option<Vec<u8>> {
    let key = compute_encryption_key(params, password);
    let computed_u = compute_u(params, &key);
    let matches = if params.r == 2 {
        computed_u == params.u
    } else {
        params.u.len() >= 16 && computed_u[..16] == params.u[..16]
    };
    matches.then_some(key)
}

/// Algorithm 3.7: recover the user password implied by an owner password
/// and check it authenticates.
fn authenticate_owner_password(params: &EncryptParams, owner_password: &[u8]) -> Option<Vec<u8>> {
    let padded_owner = pad_password(owner_password);
    let key_len = if params.r == 2 { 5 } else { params.length_bytes };

    let mut hasher = Md5::new();
    hasher.update(padded_owner);
    let mut digest = hasher.finalize().to_vec();
    if params.r >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_len]);
            digest = h.finalize().to_vec();
        }
    }
    let rc4_key = &digest[..key_len];

    let mut user_password = params.o.clone();
    if params.r == 2 {
        user_password = rc4::apply(rc4_key, &user_password);
    } else {
        for i in (0..=19u8).rev() {
            let round_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            user_password = rc4::apply(&round_key, &user_password);
        }
    }

    authenticate_user_password(params, &user_password)
}

/// Try `password` as both user and owner password, per §7's `decrypt()`
/// return codes: 1 means it authenticated as the user password, 2 as the
/// owner password.
fn authenticate_with_params(params: &EncryptParams, password: &[u8]) -> std::result::Result<(u8, Vec<u8>), DecryptionError> {
    if let Some(key) = authenticate_user_password(params, password) {
        return Ok((1, key));
    }
    if let Some(key) = authenticate_owner_password(params, password) {
        return Ok((2, key));
    }
    Err(DecryptionError::NotAuthenticated)
}

/// Authenticate `password` against `document` without building a full
/// `EncryptionState`; used by `Document::authenticate_password`.
pub(crate) fn authenticate(document: &Document, password: &str) -> Result<u8> {
    let params = EncryptParams::read(document)?;
    let (code, _) = authenticate_with_params(&params, password.as_bytes())?;
    Ok(code)
}

/// Algorithm 3.1: the per-object key, derived from the file key plus the
/// object's id and generation number.
fn derive_object_key(base_key: &[u8], id: ObjectId) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(base_key);
    hasher.update([
        id.0 as u8,
        (id.0 >> 8) as u8,
        (id.0 >> 16) as u8,
        id.1 as u8,
        (id.1 >> 8) as u8,
    ]);
    let digest = hasher.finalize();
    let key_len = (base_key.len() + 5).min(16);
    digest[..key_len].to_vec()
}

/// Decrypt every string/stream nested in `object`, in place. `Metadata`
/// streams are left alone when `/EncryptMetadata false` was set.
pub(crate) fn decrypt_object(
    state: &EncryptionState, id: ObjectId, object: &mut Object,
) -> std::result::Result<(), DecryptionError> {
    match object {
        Object::String(bytes, _) => {
            let key = derive_object_key(&state.key, id);
            *bytes = rc4::apply(&key, bytes);
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                decrypt_object(state, id, item)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                decrypt_object(state, id, value)?;
            }
        }
        Object::Stream(stream) => {
            let skip_content = stream.dict.has_type(b"Metadata") && !state.encrypt_metadata;
            if !skip_content {
                let key = derive_object_key(&state.key, id);
                stream.content = rc4::apply(&key, &stream.content);
            }
            for (_, value) in stream.dict.iter_mut() {
                decrypt_object(state, id, value)?;
            }
        }
        Object::Null | Object::Boolean(_) | Object::Integer(_) | Object::Real(_) | Object::Name(_) | Object::Reference(_) => {}
    }
    Ok(())
}

/// Encrypt `data` (a string or stream payload) for object `id`, used by
/// the writer when saving with encryption configured.
pub fn encrypt_bytes(key: &[u8], id: ObjectId, data: &[u8]) -> Result<Vec<u8>> {
    let object_key = derive_object_key(key, id);
    Ok(rc4::apply(&object_key, data))
}

bitflags::bitflags! {
    /// The `/P` entry's permission bits (PDF 1.7 Table 22). Bit numbering
    /// follows the spec (bit 1 is the least significant); bits not named
    /// here are reserved and always read back as 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        const PRINT            = 1 << 2;  // bit 3
        const MODIFY           = 1 << 3;  // bit 4
        const COPY             = 1 << 4;  // bit 5
        const ANNOTATE         = 1 << 5;  // bit 6
        const FILL_FORMS       = 1 << 8;  // bit 9
        const EXTRACT_FOR_ACCESSIBILITY = 1 << 9;  // bit 10
        const ASSEMBLE         = 1 << 10; // bit 11
        const PRINT_HIGH_RES   = 1 << 11; // bit 12
    }
}

impl Permissions {
    /// `/P` is a signed 32-bit integer with every reserved bit set to 1
    /// (bits 7-8 below revision 3, bits 13-32 always); encode that here so
    /// callers only ever think in terms of the named bits above.
    fn to_p_value(self) -> i32 {
        const RESERVED_ONES: u32 = 0xFFFF_F0C0; // bits 7,8 and 13-32
        (self.bits() | RESERVED_ONES) as i32
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::all()
    }
}

/// What the caller wants the Standard Security Handler configured with,
/// before a document is saved (§4.I write path).
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    pub user_password: String,
    pub owner_password: String,
    pub permissions: Permissions,
    /// 2 (40-bit RC4) or 3 (variable length, up to 128-bit RC4).
    pub revision: u8,
    pub key_length_bytes: usize,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        EncryptionConfig {
            user_password: String::new(),
            owner_password: String::new(),
            permissions: Permissions::all(),
            revision: 3,
            key_length_bytes: 16,
        }
    }
}

/// 16 random bytes for a freshly-written file's `/ID`.
pub(crate) fn random_id_bytes() -> Result<Vec<u8>> {
    let mut buf = [0u8; 16];
    getrandom::fill(&mut buf).map_err(|e| Error::IO(std::io::Error::other(e)))?;
    Ok(buf.to_vec())
}

/// Build the `/Encrypt` dictionary and derive the file encryption key for
/// `config`, given the file's (already chosen) first `/ID` element.
pub(crate) fn build_encrypt_dictionary(config: &EncryptionConfig, id0: &[u8]) -> Result<(Dictionary, Vec<u8>)> {
    let r = config.revision.clamp(2, 3);
    let length_bytes = if r == 2 { 5 } else { config.key_length_bytes.clamp(5, 16) };
    let p = config.permissions.to_p_value();

    let o = compute_o(config.owner_password.as_bytes(), config.user_password.as_bytes(), r, length_bytes);

    let params = EncryptParams {
        o: o.clone(),
        u: Vec::new(),
        p,
        r,
        length_bytes,
        id0: id0.to_vec(),
        encrypt_metadata: true,
    };
    let key = compute_encryption_key(&params, config.user_password.as_bytes());
    let u = compute_u(&params, &key);

    let mut dict = Dictionary::new();
    dict.set("Filter", Object::name("Standard"));
    dict.set("V", Object::Integer(if r == 2 { 1 } else { 2 }));
    dict.set("R", Object::Integer(r as i64));
    dict.set("O", Object::String(o, StringFormat::Hexadecimal));
    dict.set("U", Object::String(u, StringFormat::Hexadecimal));
    dict.set("P", Object::Integer(p as i64));
    dict.set("Length", Object::Integer((length_bytes * 8) as i64));

    Ok((dict, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypted_params(user_pw: &[u8], owner_pw: &[u8], r: u8) -> (EncryptParams, Vec<u8>) {
        let length_bytes = if r == 2 { 5 } else { 16 };
        let o = compute_o(owner_pw, user_pw, r, length_bytes);
        let params = EncryptParams {
            o,
            u: Vec::new(),
            p: -4,
            r,
            length_bytes,
            id0: vec![1, 2, 3, 4],
            encrypt_metadata: true,
        };
        let key = compute_encryption_key(&params, user_pw);
        let u = compute_u(&params, &key);
        (EncryptParams { u, ..params }, key)
    }

    #[test]
    fn user_password_round_trips_revision_2() {
        let (params, _key) = encrypted_params(b"user", b"owner", 2);
        assert!(authenticate_user_password(&params, b"user").is_some());
        assert!(authenticate_user_password(&params, b"wrong").is_none());
    }

    #[test]
    fn user_password_round_trips_revision_3() {
        let (params, _key) = encrypted_params(b"user", b"owner", 3);
        assert!(authenticate_user_password(&params, b"user").is_some());
        assert!(authenticate_user_password(&params, b"wrong").is_none());
    }

    #[test]
    fn owner_password_recovers_user_password() {
        let (params, _key) = encrypted_params(b"user", b"owner", 3);
        assert!(authenticate_owner_password(&params, b"owner").is_some());
        assert!(authenticate_owner_password(&params, b"wrong").is_none());
    }

    #[test]
    fn permissions_set_reserved_bits_on_encode() {
        let p = (Permissions::PRINT | Permissions::COPY).to_p_value();
        // bits 7, 8, and 13-32 must read back as 1 regardless of the named bits.
        assert_eq!(p & 0xFFFF_F0C0u32 as i32, 0xFFFF_F0C0u32 as i32);
        assert_ne!(p & Permissions::MODIFY.bits() as i32, Permissions::MODIFY.bits() as i32);
    }

    #[test]
    fn object_decryption_round_trips() {
        let state = EncryptionState::from_key(vec![1, 2, 3, 4, 5], 3, true);
        let id = (7, 0);
        let plaintext = b"hello pdf";
        let encrypted = encrypt_bytes(&state.key, id, plaintext).unwrap();
        let mut object = Object::String(encrypted, StringFormat::Literal);
        decrypt_object(&state, id, &mut object).unwrap();
        assert_eq!(object.as_str().unwrap(), plaintext);
    }
}
