//! Key material and credentials for sealing and opening envelopes

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::{IV_SIZE, KEY_SIZE, SALT_SIZE, TAG_SIZE};

/// A 256-bit AES encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::InvalidLength {
                what: "encryption key",
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a random key from the process CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 256-bit HMAC-SHA-256 key. Zeroized on drop.
#[derive(Clone)]
pub struct HmacKey {
    bytes: [u8; KEY_SIZE],
}

impl HmacKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::InvalidLength {
                what: "hmac key",
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a random key from the process CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl Drop for HmacKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An 8-byte key-derivation salt, carried in password-mode headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SALT_SIZE {
            return Err(Error::InvalidLength {
                what: "salt",
                expected: SALT_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; SALT_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }

    /// Generate a random salt from the process CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }
}

/// A 16-byte AES-CBC initialization vector, carried in every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(Error::InvalidLength {
                what: "iv",
                expected: IV_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; IV_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }

    /// Generate a random IV from the process CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }
}

/// A 32-byte HMAC-SHA-256 authentication trailer.
///
/// Compared only in constant time during verification; does not implement
/// `PartialEq`.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    bytes: [u8; TAG_SIZE],
}

impl Tag {
    pub fn from_bytes(bytes: [u8; TAG_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TAG_SIZE {
            return Err(Error::InvalidLength {
                what: "tag",
                expected: TAG_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; TAG_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.bytes
    }
}

/// The secret that seals or opens envelopes.
///
/// The kind decides the envelope mode: passwords write mode-1 headers
/// (salts included), raw keys write mode-0 headers.
#[derive(Debug)]
pub enum Credential {
    /// Derive both keys from a password via PBKDF2.
    Password(SecretString),
    /// Caller-provided encryption and HMAC keys.
    Keys {
        encryption: EncryptionKey,
        hmac: HmacKey,
    },
}

impl Credential {
    /// Password credential.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn password(password: &str) -> Self {
        assert!(!password.is_empty(), "password must not be empty");
        Self::Password(SecretString::from(password))
    }

    /// Raw-keys credential.
    pub fn keys(encryption: EncryptionKey, hmac: HmacKey) -> Self {
        Self::Keys { encryption, hmac }
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        match self {
            Self::Password(password) => {
                Self::Password(SecretString::from(password.expose_secret()))
            }
            Self::Keys { encryption, hmac } => Self::Keys {
                encryption: encryption.clone(),
                hmac: hmac.clone(),
            },
        }
    }
}
