//! Password protection for rendered PDFs.
//!
//! Applies the PDF standard security handler, revision 3 (128-bit RC4), to
//! an already serialized document: every string and stream is encrypted
//! with its per-object key and an `/Encrypt` dictionary is added to the
//! trailer.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use md5::{Digest, Md5};

use crate::error::{Error, Result};

/// Padding string from the standard security handler.
const PAD_BYTES: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// File key length in bytes (128 bits).
const KEY_LEN: usize = 16;

/// All user permissions granted; the two low bits must be clear.
const PERMISSIONS: i32 = -4;

/// Encrypt a serialized PDF with `user_password` and `owner_password`.
/// An empty owner password falls back to the user password.
pub fn encrypt_pdf(pdf: &[u8], user_password: &str, owner_password: &str) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf).map_err(lopdf_error)?;
    if doc.is_encrypted() {
        return Err(Error::Logic("document is already encrypted".to_string()));
    }

    let file_id = ensure_file_id(&mut doc);
    let owner_password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };

    let owner_entry = owner_entry(owner_password.as_bytes(), user_password.as_bytes());
    let key = file_key(user_password.as_bytes(), &owner_entry, &file_id);
    let user_entry = user_entry(&key, &file_id);

    for (&id, object) in doc.objects.iter_mut() {
        let is_xref = object
            .as_stream()
            .map(|s| s.dict.has_type(b"XRef"))
            .unwrap_or(false);
        if !is_xref {
            encrypt_object(object, &object_key(&key, id));
        }
    }

    let mut encrypt = Dictionary::new();
    encrypt.set("Filter", Object::Name(b"Standard".to_vec()));
    encrypt.set("V", 2);
    encrypt.set("R", 3);
    encrypt.set("Length", (KEY_LEN * 8) as i64);
    encrypt.set("O", Object::String(owner_entry.to_vec(), StringFormat::Hexadecimal));
    encrypt.set("U", Object::String(user_entry.to_vec(), StringFormat::Hexadecimal));
    encrypt.set("P", PERMISSIONS as i64);
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));

    // 128-bit keys need PDF 1.4.
    if doc.version.as_str() < "1.4" {
        doc.version = "1.4".to_string();
    }

    let mut out = Vec::with_capacity(pdf.len() + 512);
    doc.save_to(&mut out).map_err(|e| lopdf_error(e.into()))?;
    log::debug!("encrypted document ({} -> {} bytes)", pdf.len(), out.len());
    Ok(out)
}

fn lopdf_error(e: lopdf::Error) -> Error {
    Error::Render(format!("cannot encrypt document: {e}"))
}

/// First element of the trailer `/ID`, adding an identifier when missing.
fn ensure_file_id(doc: &mut Document) -> Vec<u8> {
    let existing = doc
        .trailer
        .get(b"ID")
        .and_then(Object::as_array)
        .ok()
        .and_then(|ids| ids.first())
        .and_then(|id| id.as_str().ok())
        .map(<[u8]>::to_vec);
    if let Some(id) = existing {
        return id;
    }
    let id = uuid::Uuid::new_v4().as_bytes().to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id.clone(), StringFormat::Hexadecimal),
        ]),
    );
    id
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PAD_BYTES;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PAD_BYTES[..32 - len]);
    padded
}

/// MD5, then 50 more rounds over the first `KEY_LEN` bytes.
fn stretch(mut digest: [u8; 16]) -> [u8; 16] {
    for _ in 0..50 {
        digest = Md5::digest(&digest[..KEY_LEN]).into();
    }
    digest
}

/// RC4 with `key`, then 19 more passes keyed with `key XOR i`.
fn rc4_rounds(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = rc4(key, data);
    let mut round_key = vec![0u8; key.len()];
    for i in 1..=19u8 {
        for (k, r) in key.iter().zip(round_key.iter_mut()) {
            *r = k ^ i;
        }
        out = rc4(&round_key, &out);
    }
    out
}

/// The `/O` entry.
fn owner_entry(owner_password: &[u8], user_password: &[u8]) -> [u8; 32] {
    let owner_key = stretch(Md5::digest(pad_password(owner_password)).into());
    let encrypted = rc4_rounds(&owner_key[..KEY_LEN], &pad_password(user_password));
    let mut entry = [0u8; 32];
    entry.copy_from_slice(&encrypted);
    entry
}

/// The file encryption key derived from the user password.
fn file_key(user_password: &[u8], owner_entry: &[u8; 32], file_id: &[u8]) -> [u8; KEY_LEN] {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(owner_entry);
    hasher.update((PERMISSIONS as u32).to_le_bytes());
    hasher.update(file_id);
    stretch(hasher.finalize().into())
}

/// The `/U` entry: 16 significant bytes plus 16 bytes of padding.
fn user_entry(key: &[u8], file_id: &[u8]) -> [u8; 32] {
    let mut hasher = Md5::new();
    hasher.update(PAD_BYTES);
    hasher.update(file_id);
    let encrypted = rc4_rounds(key, &hasher.finalize());
    let mut entry = [0u8; 32];
    entry[..16].copy_from_slice(&encrypted);
    entry[16..].copy_from_slice(&PAD_BYTES[..16]);
    entry
}

/// Per-object key: file key plus the low bytes of object and generation.
fn object_key(key: &[u8], (number, generation): ObjectId) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(&number.to_le_bytes()[..3]);
    hasher.update(&generation.to_le_bytes()[..2]);
    let digest = hasher.finalize();
    digest[..(key.len() + 5).min(16)].to_vec()
}

fn encrypt_object(object: &mut Object, key: &[u8]) {
    match object {
        Object::String(bytes, _) => *bytes = rc4(key, bytes),
        Object::Array(items) => items.iter_mut().for_each(|item| encrypt_object(item, key)),
        Object::Dictionary(dict) => encrypt_dictionary(dict, key),
        Object::Stream(stream) => {
            encrypt_dictionary(&mut stream.dict, key);
            let content = rc4(key, &stream.content);
            stream.set_content(content);
        }
        _ => {}
    }
}

fn encrypt_dictionary(dict: &mut Dictionary, key: &[u8]) {
    for (_, value) in dict.iter_mut() {
        encrypt_object(value, key);
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|&byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            byte ^ state[state[i as usize].wrapping_add(state[j as usize]) as usize]
        })
        .collect()
}
