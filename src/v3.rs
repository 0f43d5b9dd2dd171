//! Envelope format v3: AES-256-CBC + PKCS#7 body, HMAC-SHA-256 trailer
//!
//! Byte layout:
//! ```text
//! password mode:
//! [0]      version = 3
//! [1]      mode    = 1
//! [2..10]  encryption-key salt
//! [10..18] HMAC-key salt
//! [18..34] IV
//! [34..]   ciphertext, then a 32-byte HMAC-SHA-256 trailer
//!
//! key mode:
//! [0]      version = 3
//! [1]      mode    = 0
//! [2..18]  IV
//! [18..]   ciphertext, then a 32-byte HMAC-SHA-256 trailer
//! ```
//!
//! The trailer covers the header and the whole ciphertext. In password
//! mode the two keys are derived independently via
//! [`kdf::derive_key`](crate::kdf::derive_key), one salt each.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::auth::{constant_time_eq, Authenticator};
use crate::engine::{DecryptEngine, EncryptEngine};
use crate::error::{Error, Result};
use crate::kdf;
use crate::keys::{Credential, EncryptionKey, HmacKey, Iv, Salt};
use crate::tail::TailBuffer;
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Version byte opening every v3 envelope.
pub const VERSION: u8 = 3;

/// Header length in key mode.
pub const KEY_HEADER_SIZE: usize = 18;

/// Header length in password mode.
pub const PASSWORD_HEADER_SIZE: usize = 34;

/// Leading bytes needed to recognize a v3 envelope.
pub(crate) const PREAMBLE_SIZE: usize = 1;

const MODE_KEYS: u8 = 0;
const MODE_PASSWORD: u8 = 1;

/// Streaming v3 encryptor.
///
/// Feed plaintext through [`update`](Self::update) and close the envelope
/// with [`finalize`](Self::finalize). The header is emitted in front of
/// the first output.
pub struct Encryptor {
    engine: EncryptEngine,
    auth: Authenticator,
    pending_header: Option<Vec<u8>>,
}

impl Encryptor {
    /// Seal with a credential, generating fresh random salts and IV.
    pub fn new(credential: &Credential) -> Self {
        match credential {
            Credential::Password(password) => Self::password_encryptor(
                password.expose_secret(),
                Salt::random(),
                Salt::random(),
                Iv::random(),
            ),
            Credential::Keys { encryption, hmac } => {
                Self::with_keys_and_iv(encryption, hmac, Iv::random())
            }
        }
    }

    /// Password-mode encryptor with random salts and IV.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn with_password(password: &str) -> Self {
        assert!(!password.is_empty(), "password must not be empty");
        Self::password_encryptor(password, Salt::random(), Salt::random(), Iv::random())
    }

    /// Key-mode encryptor with a random IV.
    pub fn with_keys(encryption: &EncryptionKey, hmac: &HmacKey) -> Self {
        Self::with_keys_and_iv(encryption, hmac, Iv::random())
    }

    /// Deterministic password-mode construction from explicit salts and
    /// IV. Only for reproducing known envelopes: reusing an IV across
    /// messages breaks CBC confidentiality.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn with_password_parts(
        password: &str,
        encryption_salt: Salt,
        hmac_salt: Salt,
        iv: Iv,
    ) -> Self {
        assert!(!password.is_empty(), "password must not be empty");
        Self::password_encryptor(password, encryption_salt, hmac_salt, iv)
    }

    /// Deterministic key-mode construction from an explicit IV. Same IV
    /// reuse caveat as [`with_password_parts`](Self::with_password_parts).
    pub fn with_keys_and_iv(encryption: &EncryptionKey, hmac: &HmacKey, iv: Iv) -> Self {
        let mut header = Vec::with_capacity(KEY_HEADER_SIZE);
        header.push(VERSION);
        header.push(MODE_KEYS);
        header.extend_from_slice(iv.as_bytes());
        Self::from_parts(encryption, hmac, &iv, header)
    }

    fn password_encryptor(
        password: &str,
        encryption_salt: Salt,
        hmac_salt: Salt,
        iv: Iv,
    ) -> Self {
        let encryption_key = EncryptionKey::from_bytes(kdf::derive_key(password, &encryption_salt));
        let hmac_key = HmacKey::from_bytes(kdf::derive_key(password, &hmac_salt));

        let mut header = Vec::with_capacity(PASSWORD_HEADER_SIZE);
        header.push(VERSION);
        header.push(MODE_PASSWORD);
        header.extend_from_slice(encryption_salt.as_bytes());
        header.extend_from_slice(hmac_salt.as_bytes());
        header.extend_from_slice(iv.as_bytes());
        Self::from_parts(&encryption_key, &hmac_key, &iv, header)
    }

    fn from_parts(encryption: &EncryptionKey, hmac: &HmacKey, iv: &Iv, header: Vec<u8>) -> Self {
        Self {
            engine: EncryptEngine::new(encryption, iv),
            auth: Authenticator::new(hmac),
            pending_header: Some(header),
        }
    }

    /// Encrypt more plaintext, returning the envelope bytes that are ready.
    #[must_use]
    pub fn update(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let ciphertext = self.engine.update(plaintext);
        self.authenticate(ciphertext)
    }

    /// Flush the cipher, append the authentication trailer, and return the
    /// closing bytes of the envelope.
    pub fn finalize(self) -> Vec<u8> {
        let Self {
            engine,
            mut auth,
            pending_header,
        } = self;

        let final_block = engine.finalize();
        let mut out = match pending_header {
            Some(mut header) => {
                header.extend_from_slice(&final_block);
                header
            }
            None => final_block,
        };
        auth.update(&out);
        out.extend_from_slice(auth.finalize().as_bytes());
        out
    }

    /// Seal a complete plaintext in one call.
    pub fn encrypt(mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut envelope = self.update(plaintext);
        envelope.extend_from_slice(&self.finalize());
        envelope
    }

    /// Prepend the header to the first emission and feed everything
    /// emitted into the trailer computation.
    fn authenticate(&mut self, ciphertext: Vec<u8>) -> Vec<u8> {
        let out = match self.pending_header.take() {
            Some(mut header) => {
                header.extend_from_slice(&ciphertext);
                header
            }
            None => ciphertext,
        };
        self.auth.update(&out);
        out
    }
}

/// Streaming v3 decryptor for a fixed credential.
///
/// Plaintext returned by [`update`](Self::update) is unauthenticated
/// until [`finalize`](Self::finalize) succeeds; discard it on error.
pub struct Decryptor {
    phase: Phase,
}

enum Phase {
    AwaitingHeader {
        buffer: Vec<u8>,
        credential: Credential,
    },
    Streaming(Engine),
}

impl Decryptor {
    pub fn new(credential: &Credential) -> Self {
        Self {
            phase: Phase::AwaitingHeader {
                buffer: Vec::with_capacity(PASSWORD_HEADER_SIZE),
                credential: credential.clone(),
            },
        }
    }

    /// Password-mode decryptor.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn with_password(password: &str) -> Self {
        assert!(!password.is_empty(), "password must not be empty");
        Self {
            phase: Phase::AwaitingHeader {
                buffer: Vec::with_capacity(PASSWORD_HEADER_SIZE),
                credential: Credential::Password(SecretString::from(password)),
            },
        }
    }

    /// Key-mode decryptor.
    pub fn with_keys(encryption: &EncryptionKey, hmac: &HmacKey) -> Self {
        Self::new(&Credential::Keys {
            encryption: encryption.clone(),
            hmac: hmac.clone(),
        })
    }

    /// Absorb more of the envelope, returning any plaintext already
    /// decodable. Nothing comes out until the header is complete.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        match &mut self.phase {
            Phase::Streaming(engine) => Ok(engine.update(data)),
            Phase::AwaitingHeader { buffer, credential } => {
                buffer.extend_from_slice(data);
                let required = required_header_size(credential);
                if buffer.len() < required {
                    return Ok(Vec::new());
                }
                let mut engine = build_engine(&buffer[..required], credential)?;
                let body = buffer.split_off(required);
                let out = engine.update(&body);
                self.phase = Phase::Streaming(engine);
                Ok(out)
            }
        }
    }

    /// Flush the cipher and verify the trailer. The plaintext is trusted
    /// only when this returns `Ok`.
    pub fn finalize(self) -> Result<Vec<u8>> {
        match self.phase {
            Phase::AwaitingHeader { .. } => Err(Error::MessageTooShort),
            Phase::Streaming(engine) => engine.finalize(),
        }
    }

    /// Open a complete envelope in one call, returning only authenticated
    /// plaintext.
    pub fn decrypt(mut self, envelope: &[u8]) -> Result<Vec<u8>> {
        let mut plaintext = self.update(envelope)?;
        plaintext.extend_from_slice(&self.finalize()?);
        Ok(plaintext)
    }
}

fn required_header_size(credential: &Credential) -> usize {
    match credential {
        Credential::Password(_) => PASSWORD_HEADER_SIZE,
        Credential::Keys { .. } => KEY_HEADER_SIZE,
    }
}

/// Validate a complete header against the credential and stand up the
/// streaming state. Version is checked before mode.
fn build_engine(header: &[u8], credential: &Credential) -> Result<Engine> {
    if header[0] != VERSION {
        return Err(Error::UnknownHeader);
    }
    match credential {
        Credential::Password(password) => {
            if header[1] != MODE_PASSWORD {
                return Err(Error::InvalidCredentialType);
            }
            let mut encryption_salt = [0u8; SALT_SIZE];
            encryption_salt.copy_from_slice(&header[2..10]);
            let mut hmac_salt = [0u8; SALT_SIZE];
            hmac_salt.copy_from_slice(&header[10..18]);
            let mut iv = [0u8; IV_SIZE];
            iv.copy_from_slice(&header[18..34]);

            let encryption_key = EncryptionKey::from_bytes(kdf::derive_key(
                password.expose_secret(),
                &Salt::from_bytes(encryption_salt),
            ));
            let hmac_key = HmacKey::from_bytes(kdf::derive_key(
                password.expose_secret(),
                &Salt::from_bytes(hmac_salt),
            ));
            debug!(mode = MODE_PASSWORD, "v3 header accepted");
            Ok(Engine::new(
                &encryption_key,
                &hmac_key,
                &Iv::from_bytes(iv),
                header,
            ))
        }
        Credential::Keys { encryption, hmac } => {
            if header[1] != MODE_KEYS {
                return Err(Error::InvalidCredentialType);
            }
            let mut iv = [0u8; IV_SIZE];
            iv.copy_from_slice(&header[2..18]);
            debug!(mode = MODE_KEYS, "v3 header accepted");
            Ok(Engine::new(encryption, hmac, &Iv::from_bytes(iv), header))
        }
    }
}

/// Post-header streaming state: tail withholding, trailer accumulation,
/// block decryption.
struct Engine {
    cipher: DecryptEngine,
    auth: Authenticator,
    tail: TailBuffer,
}

impl Engine {
    fn new(encryption_key: &EncryptionKey, hmac_key: &HmacKey, iv: &Iv, header: &[u8]) -> Self {
        let mut auth = Authenticator::new(hmac_key);
        auth.update(header);
        Self {
            cipher: DecryptEngine::new(encryption_key, iv),
            auth,
            tail: TailBuffer::new(TAG_SIZE),
        }
    }

    fn update(&mut self, data: &[u8]) -> Vec<u8> {
        let body = self.tail.update(data);
        self.auth.update(&body);
        self.cipher.update(&body)
    }

    /// Compute the cipher flush, the expected trailer, and the retained
    /// trailer before deciding anything, then compare in constant time. A
    /// bad final block and a bad trailer are indistinguishable by design
    /// of the error surface.
    fn finalize(self) -> Result<Vec<u8>> {
        let Self { cipher, auth, tail } = self;
        let plaintext = cipher.finalize();
        let expected = auth.finalize();
        let trailer = tail.finalize();
        let tag_ok = constant_time_eq(expected.as_bytes(), &trailer);
        match (tag_ok, plaintext) {
            (true, Ok(plaintext)) => Ok(plaintext),
            _ => {
                debug!("envelope failed authentication");
                Err(Error::HmacMismatch)
            }
        }
    }
}
