//! Password decryption with envelope-format detection.
//!
//! A password caller does not know which format version sealed the
//! envelope, so the first bytes are buffered and run past a table of
//! candidate formats. Each candidate declares how many leading bytes it
//! needs to decide; the first one to claim the stream gets the buffered
//! bytes replayed into it and handles everything from there. Today the
//! table holds the v3 format only. A format that cannot be told apart
//! that early would grow `preamble_size` for every candidate.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{Error, Result};
use crate::v3;

#[derive(Clone, Copy)]
struct Candidate {
    /// Leading bytes needed before `sniff` can decide.
    preamble_size: usize,
    sniff: fn(&[u8], &str) -> Option<Format>,
}

const CANDIDATES: &[Candidate] = &[Candidate {
    preamble_size: v3::PREAMBLE_SIZE,
    sniff: sniff_v3,
}];

fn sniff_v3(preamble: &[u8], password: &str) -> Option<Format> {
    (preamble[0] == v3::VERSION).then(|| Format::V3(v3::Decryptor::with_password(password)))
}

enum Format {
    V3(v3::Decryptor),
}

impl Format {
    fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Format::V3(inner) => inner.update(data),
        }
    }

    fn finalize(self) -> Result<Vec<u8>> {
        match self {
            Format::V3(inner) => inner.finalize(),
        }
    }
}

enum Phase {
    Sniffing {
        buffer: Vec<u8>,
        candidates: Vec<Candidate>,
    },
    Committed(Format),
}

/// Streaming password decryptor that works out the envelope format from
/// the leading bytes.
///
/// Plaintext returned by [`update`](Self::update) is unauthenticated
/// until [`finalize`](Self::finalize) succeeds; discard it on error.
pub struct Decryptor {
    password: SecretString,
    phase: Phase,
}

impl Decryptor {
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn new(password: &str) -> Self {
        assert!(!password.is_empty(), "password must not be empty");
        Self {
            password: SecretString::from(password),
            phase: Phase::Sniffing {
                buffer: Vec::new(),
                candidates: CANDIDATES.to_vec(),
            },
        }
    }

    /// Absorb more of the envelope. Returns [`Error::UnknownHeader`] as
    /// soon as every candidate format has ruled the stream out.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let Self { password, phase } = self;
        match phase {
            Phase::Committed(format) => format.update(data),
            Phase::Sniffing { buffer, candidates } => {
                buffer.extend_from_slice(data);
                let to_check = std::mem::take(candidates);
                for candidate in to_check {
                    if buffer.len() < candidate.preamble_size {
                        candidates.push(candidate);
                        continue;
                    }
                    let preamble = &buffer[..candidate.preamble_size];
                    if let Some(mut format) = (candidate.sniff)(preamble, password.expose_secret())
                    {
                        debug!("envelope format detected, replaying buffered bytes");
                        let pending = std::mem::take(buffer);
                        let out = format.update(&pending);
                        *phase = Phase::Committed(format);
                        return out;
                    }
                }
                if candidates.is_empty() {
                    Err(Error::UnknownHeader)
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Close the stream. The plaintext already returned is trusted only
    /// when this returns `Ok`.
    pub fn finalize(self) -> Result<Vec<u8>> {
        match self.phase {
            Phase::Committed(format) => format.finalize(),
            Phase::Sniffing { candidates, .. } => {
                if candidates.is_empty() {
                    Err(Error::UnknownHeader)
                } else {
                    Err(Error::MessageTooShort)
                }
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v3::Encryptor;

    #[test]
    fn detects_v3_and_round_trips() {
        let envelope = Encryptor::with_password("opossum").encrypt(b"carried across formats");
        let plaintext = Decryptor::new("opossum").decrypt(&envelope).unwrap();
        assert_eq!(plaintext, b"carried across formats");
    }

    #[test]
    fn byte_at_a_time_feed() {
        let envelope = Encryptor::with_password("drip").encrypt(b"one byte per call");
        let mut decryptor = Decryptor::new("drip");
        let mut plaintext = Vec::new();
        for byte in &envelope {
            plaintext.extend_from_slice(&decryptor.update(std::slice::from_ref(byte)).unwrap());
        }
        plaintext.extend_from_slice(&decryptor.finalize().unwrap());
        assert_eq!(plaintext, b"one byte per call");
    }

    #[test]
    fn unknown_leading_byte_is_rejected_immediately() {
        let mut decryptor = Decryptor::new("pw");
        assert_eq!(decryptor.update(&[0x99]), Err(Error::UnknownHeader));
        assert_eq!(decryptor.finalize(), Err(Error::UnknownHeader));
    }

    #[test]
    fn finalize_without_input_is_too_short() {
        assert_eq!(Decryptor::new("pw").finalize(), Err(Error::MessageTooShort));
    }

    #[test]
    fn empty_updates_stay_undecided() {
        let mut decryptor = Decryptor::new("pw");
        assert_eq!(decryptor.update(&[]), Ok(Vec::new()));
        assert_eq!(decryptor.update(&[]), Ok(Vec::new()));
        assert_eq!(decryptor.finalize(), Err(Error::MessageTooShort));
    }

    #[test]
    #[should_panic(expected = "password must not be empty")]
    fn empty_password_is_rejected() {
        let _ = Decryptor::new("");
    }
}
