//! HMAC-SHA-256 accumulation and constant-time tag comparison

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::keys::{HmacKey, Tag};

/// Accumulates the authentication tag over header and ciphertext bytes.
pub(crate) struct Authenticator {
    mac: Hmac<Sha256>,
}

impl Authenticator {
    pub(crate) fn new(key: &HmacKey) -> Self {
        let mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
            .expect("HMAC accepts any key length");
        Self { mac }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    pub(crate) fn finalize(self) -> Tag {
        Tag::from_bytes(self.mac.finalize().into_bytes().into())
    }
}

/// Constant-time equality for authentication tags.
///
/// Mismatched lengths compare unequal; contents are compared without
/// data-dependent branching. Lengths are not secret here.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
