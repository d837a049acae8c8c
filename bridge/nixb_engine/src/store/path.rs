//! Store path arithmetic: digests, Nix base-32 and path syntax.

use sha2::{Digest, Sha256};

/// Digits of Nix's base-32 encoding (no `e`, `o`, `u`, `t`).
const BASE32_ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Length of the hash part of a store path.
pub(crate) const HASH_LEN: usize = 32;

/// Longest allowed name part.
const MAX_NAME_LEN: usize = 211;

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Fold `hash` into `size` bytes by XOR.
pub(crate) fn compress_hash(hash: &[u8], size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    for (i, byte) in hash.iter().enumerate() {
        out[i % size] ^= byte;
    }
    out
}

/// Nix base-32: least significant bits first, most significant digit
/// printed first.
pub(crate) fn to_base32(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let len = (bytes.len() * 8 - 1) / 5 + 1;
    let mut out = String::with_capacity(len);
    for n in (0..len).rev() {
        let bit = n * 5;
        let i = bit / 8;
        let j = bit % 8;
        let low = u32::from(bytes[i]) >> j;
        let high = bytes.get(i + 1).map_or(0, |&b| u32::from(b) << (8 - j));
        let digit = ((low | high) & 0x1f) as usize;
        out.push(char::from(BASE32_ALPHABET[digit]));
    }
    out
}

/// `<store_dir>/<hash>-<name>` where the hash covers `kind`, the content
/// digest, the store directory and the name.
pub(crate) fn make_store_path(kind: &str, digest_hex: &str, store_dir: &str, name: &str) -> String {
    let fingerprint = format!("{kind}:sha256:{digest_hex}:{store_dir}:{name}");
    let digest = Sha256::digest(fingerprint.as_bytes());
    let hash = to_base32(&compress_hash(&digest, 20));
    format!("{store_dir}/{hash}-{name}")
}

/// Check the name part of a store path.
pub(crate) fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("name is too long");
    }
    if name.starts_with('.') {
        return Err("name must not start with a period");
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || "+-._?=".contains(c);
    if !name.chars().all(allowed) {
        return Err("name contains a forbidden character");
    }
    Ok(())
}

/// Validate `path` as a store path under `store_dir`.
pub(crate) fn check_store_path(store_dir: &str, path: &str) -> Result<(), &'static str> {
    let base = path
        .strip_prefix(store_dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or("not in the store directory")?;
    if base.contains('/') {
        return Err("not a top-level store entry");
    }
    if base.len() < HASH_LEN + 2 || base.as_bytes()[HASH_LEN] != b'-' {
        return Err("missing hash part");
    }
    let (hash, name) = (&base[..HASH_LEN], &base[HASH_LEN + 1..]);
    if !hash.bytes().all(|b| BASE32_ALPHABET.contains(&b)) {
        return Err("hash part is not base-32");
    }
    check_name(name)
}
