// Private/public token pair service. The core treats the pair as opaque byte
// blobs produced by an external primitive (`spec.md` §1); this crate supplies
// that primitive with `ed25519-dalek`, the asymmetric crate already in the
// teacher's stack, standing in for the Go original's own keypair routines
// (`examples/original_source/user_functions.go`: `generatePrivateKey`,
// `generatePublicKey`, `confirmPublicKey`).

use crate::error::{DbError, Result};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;

/// Produces a fresh opaque private-token blob (an ed25519 signing key seed).
pub fn generate_private_token() -> Vec<u8> {
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed).to_bytes().to_vec()
}

/// Derives the public-token blob that corresponds to `private`.
pub fn generate_public_token(private: &[u8]) -> Result<Vec<u8>> {
    let signing_key = signing_key_from_bytes(private)?;
    Ok(signing_key.verifying_key().to_bytes().to_vec())
}

/// Compares a candidate public token against the one derived from `private`.
pub fn confirm_public_token(candidate: &[u8], private: &[u8]) -> Result<bool> {
    let derived = generate_public_token(private)?;
    Ok(constant_time_eq(candidate, &derived))
}

fn signing_key_from_bytes(private: &[u8]) -> Result<SigningKey> {
    let seed: [u8; 32] = private
        .try_into()
        .map_err(|_| DbError::InvalidInput("private token must be 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&seed))
}

fn verifying_key_from_bytes(public: &[u8]) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = public
        .try_into()
        .map_err(|_| DbError::InvalidInput("public token must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| DbError::InvalidInput("malformed public token".into()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
