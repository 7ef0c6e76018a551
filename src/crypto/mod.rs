// At-rest AEAD envelope: `nonce(12) || seal(json)` for every persisted file.
//
// Grounded on the key-bootstrap and nonce-prepend semantics of
// `examples/original_source/encryption_functions.go`, expressed with the
// `aes-gcm` crate the way `security_vault/tde.rs` uses it.

use crate::error::{DbError, Result};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm,
};
use rand::RngCore;
use std::fs;
use std::path::Path;

/// AEAD key length in bytes (AES-256, 256-bit key).
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Environment variable the process-wide key is kept in once loaded.
pub const KEY_ENV_VAR: &str = "EK";

/// Loads the key at `path` into the `EK` environment slot, generating and
/// persisting a fresh 32-byte printable-ASCII key if the file is absent or
/// too short.
pub fn ensure_key(path: &Path) -> Result<Vec<u8>> {
    let existing = fs::read(path).ok();

    let key = match existing {
        Some(bytes) if bytes.len() >= KEY_LEN => bytes[..KEY_LEN].to_vec(),
        _ => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut rng = rand::rng();
            let key: Vec<u8> = (0..KEY_LEN)
                .map(|_| KEY_ALPHABET[(rng.next_u32() as usize) % KEY_ALPHABET.len()])
                .collect();

            write_owner_rw(path, &key)?;
            key
        }
    };

    // SAFETY: single-threaded startup path; no other thread reads env yet.
    unsafe {
        std::env::set_var(KEY_ENV_VAR, String::from_utf8_lossy(&key).to_string());
    }

    Ok(key)
}

#[cfg(unix)]
fn write_owner_rw(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    std::io::Write::write_all(&mut file, bytes)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_owner_rw(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)?;
    Ok(())
}

/// Seals `plaintext` under `key`, returning `nonce || ciphertext_with_tag`.
/// A fresh random nonce is generated for every call; it is never reused.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = GenericArray::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| DbError::CryptoAuth)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Opens a blob produced by [`encrypt`]. Fails with `CryptoAuth` if the tag
/// does not verify, and if the blob is too short to contain a nonce.
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(DbError::CryptoAuth);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    let nonce = GenericArray::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| DbError::CryptoAuth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_arbitrary_plaintext() {
        let key = vec![7u8; KEY_LEN];
        let plaintext = b"{\"hello\":\"world\"}".to_vec();
        let blob = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &blob).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = vec![9u8; KEY_LEN];
        let mut blob = encrypt(&key, b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(matches!(decrypt(&key, &blob), Err(DbError::CryptoAuth)));
    }

    #[test]
    fn nonce_is_not_reused_across_calls() {
        let key = vec![1u8; KEY_LEN];
        let a = encrypt(&key, b"same message").unwrap();
        let b = encrypt(&key, b"same message").unwrap();
        assert_ne!(&a[..12], &b[..12]);
    }

    #[test]
    fn ensure_key_generates_and_persists_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys/main.dat");
        let key = ensure_key(&path).unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert!(key.iter().all(|b| b.is_ascii_alphabetic()));

        let persisted = fs::read(&path).unwrap();
        assert_eq!(persisted, key);
    }

    #[test]
    fn ensure_key_reloads_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys/main.dat");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![b'z'; KEY_LEN]).unwrap();

        let key = ensure_key(&path).unwrap();
        assert_eq!(key, vec![b'z'; KEY_LEN]);
    }
}
