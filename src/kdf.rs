//! Password-based key derivation: PBKDF2-HMAC-SHA-1 → 256-bit keys
//!
//! Parameters are fixed by the v3 format for interoperability: SHA-1 as
//! the PBKDF2 PRF, 10000 iterations, 32-byte output. SHA-1 appears here
//! only as the PRF inside PBKDF2, where collision attacks do not apply.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

use crate::keys::Salt;
use crate::KEY_SIZE;

/// PBKDF2 iteration count fixed by the v3 format.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Derive a 256-bit key from a password and salt.
///
/// Both keys of a password-mode envelope come from this function, called
/// with two independent salts. Deterministic: the same password and salt
/// always produce the same key.
pub fn derive_key(password: &str, salt: &Salt) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha1>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut key,
    );
    key
}
