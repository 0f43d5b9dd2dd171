//! saltbox: password-sealed authenticated-encryption envelopes
//!
//! Seals a plaintext into a self-describing binary envelope (format v3):
//! AES-256-CBC with PKCS#7 padding for confidentiality, HMAC-SHA-256 over
//! the header and ciphertext for integrity, and either a password (PBKDF2
//! key derivation, salts carried in the header) or a caller-provided pair
//! of 256-bit keys.
//!
//! Envelope layout:
//! ```text
//! password mode:
//! [3][1][8: encryption salt][8: HMAC salt][16: IV][ciphertext][32: HMAC]
//!
//! key mode:
//! [3][0][16: IV][ciphertext][32: HMAC]
//!
//! The HMAC trailer covers everything before it.
//! ```
//!
//! One-shot:
//! ```
//! let credential = saltbox::Credential::password("correct horse battery staple");
//! let envelope = saltbox::encrypt(b"attack at dawn", &credential);
//! let plaintext = saltbox::decrypt(&envelope, &credential).unwrap();
//! assert_eq!(plaintext, b"attack at dawn");
//! ```
//!
//! Streaming: [`Encryptor`] and [`Decryptor`] accept input in arbitrary
//! chunks. Plaintext returned by a decryptor's `update` is not yet
//! authenticated; discard it unless `finalize` succeeds.

mod auth;
mod decryptor;
mod engine;
mod tail;

pub mod error;
pub mod kdf;
pub mod keys;
pub mod v3;

pub use decryptor::Decryptor;
pub use error::{Error, Result};
pub use keys::{Credential, EncryptionKey, HmacKey, Iv, Salt, Tag};
pub use v3::Encryptor;

use secrecy::ExposeSecret;

/// Size of the AES-256 and HMAC-SHA-256 keys in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of a key-derivation salt in bytes.
pub const SALT_SIZE: usize = 8;

/// Size of an AES-CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Size of the HMAC-SHA-256 trailer in bytes.
pub const TAG_SIZE: usize = 32;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Seal `plaintext` into a fresh envelope with random salts and IV.
pub fn encrypt(plaintext: &[u8], credential: &Credential) -> Vec<u8> {
    Encryptor::new(credential).encrypt(plaintext)
}

/// Open a complete envelope, returning the plaintext only if the
/// authentication trailer verifies.
///
/// A password credential accepts any supported envelope format; raw keys
/// are bound to format v3.
pub fn decrypt(envelope: &[u8], credential: &Credential) -> Result<Vec<u8>> {
    match credential {
        Credential::Password(password) => {
            Decryptor::new(password.expose_secret()).decrypt(envelope)
        }
        Credential::Keys { .. } => v3::Decryptor::new(credential).decrypt(envelope),
    }
}
