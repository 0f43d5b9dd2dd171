//! Streaming AES-256-CBC with PKCS#7 padding
//!
//! Both directions carry partial input across calls so callers can feed
//! arbitrary chunk sizes. The decrypt side additionally withholds the
//! trailing complete block, which may be the padded final block, until
//! `finalize` strips the padding.

use aes::Aes256;
use cipher::block_padding::{Padding, Pkcs7, UnpadError};
use cipher::{Block, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::keys::{EncryptionKey, Iv};
use crate::BLOCK_SIZE;

/// Accumulates raw input and releases the longest prefix that is safe to
/// run through the block cipher now.
struct BlockQueue {
    pending: Vec<u8>,
    hold_last_block: bool,
}

impl BlockQueue {
    fn new(hold_last_block: bool) -> Self {
        Self {
            pending: Vec::with_capacity(BLOCK_SIZE),
            hold_last_block,
        }
    }

    /// Append `data` and split off the releasable block-aligned prefix.
    /// With `hold_last_block`, a trailing complete block stays queued.
    fn absorb(&mut self, data: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(data);
        let len = self.pending.len();
        let rem = len % BLOCK_SIZE;
        let release = if rem != 0 {
            len - rem
        } else if self.hold_last_block && len > 0 {
            len - BLOCK_SIZE
        } else {
            len
        };
        self.pending.drain(..release).collect()
    }

    fn take_pending(self) -> Vec<u8> {
        self.pending
    }
}

/// Streaming CBC encryption. `update` emits whole ciphertext blocks;
/// `finalize` pads whatever remains and emits the last block.
pub(crate) struct EncryptEngine {
    cbc: cbc::Encryptor<Aes256>,
    queue: BlockQueue,
}

impl EncryptEngine {
    pub(crate) fn new(key: &EncryptionKey, iv: &Iv) -> Self {
        Self {
            cbc: cbc::Encryptor::new(key.as_bytes().into(), iv.as_bytes().into()),
            queue: BlockQueue::new(false),
        }
    }

    pub(crate) fn update(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = self.queue.absorb(plaintext);
        for block in out.chunks_exact_mut(BLOCK_SIZE) {
            self.cbc.encrypt_block_mut(Block::<Aes256>::from_mut_slice(block));
        }
        out
    }

    pub(crate) fn finalize(self) -> Vec<u8> {
        let Self { mut cbc, queue } = self;
        let partial = queue.take_pending();
        let mut block = Block::<Aes256>::default();
        block[..partial.len()].copy_from_slice(&partial);
        Pkcs7::pad(&mut block, partial.len());
        cbc.encrypt_block_mut(&mut block);
        block.to_vec()
    }
}

/// Streaming CBC decryption. `update` emits plaintext for every complete
/// block except the last one seen so far; `finalize` decrypts the withheld
/// block and strips the padding.
pub(crate) struct DecryptEngine {
    cbc: cbc::Decryptor<Aes256>,
    queue: BlockQueue,
}

impl DecryptEngine {
    pub(crate) fn new(key: &EncryptionKey, iv: &Iv) -> Self {
        Self {
            cbc: cbc::Decryptor::new(key.as_bytes().into(), iv.as_bytes().into()),
            queue: BlockQueue::new(true),
        }
    }

    pub(crate) fn update(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        let mut out = self.queue.absorb(ciphertext);
        for block in out.chunks_exact_mut(BLOCK_SIZE) {
            self.cbc.decrypt_block_mut(Block::<Aes256>::from_mut_slice(block));
        }
        out
    }

    /// Fails when the stream was not a whole number of blocks, when it was
    /// empty, or when the final block does not end in valid padding.
    pub(crate) fn finalize(self) -> Result<Vec<u8>, UnpadError> {
        let Self { mut cbc, queue } = self;
        let held = queue.take_pending();
        if held.len() != BLOCK_SIZE {
            return Err(UnpadError);
        }
        let mut block = Block::<Aes256>::default();
        block.copy_from_slice(&held);
        cbc.decrypt_block_mut(&mut block);
        let plaintext = Pkcs7::unpad(&block)?;
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine_pair() -> (EncryptEngine, DecryptEngine) {
        let key = EncryptionKey::from_bytes([0x42; 32]);
        let iv = Iv::from_bytes([0x24; 16]);
        (EncryptEngine::new(&key, &iv), DecryptEngine::new(&key, &iv))
    }

    #[test]
    fn round_trip_unaligned_stream() {
        let (mut enc, mut dec) = engine_pair();
        let mut ciphertext = enc.update(b"hello ");
        ciphertext.extend_from_slice(&enc.update(b"block cipher world"));
        ciphertext.extend_from_slice(&enc.finalize());
        assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);

        let mut plaintext = dec.update(&ciphertext);
        plaintext.extend_from_slice(&dec.finalize().unwrap());
        assert_eq!(plaintext, b"hello block cipher world");
    }

    #[test]
    fn aligned_input_gains_a_full_padding_block() {
        let (mut enc, _) = engine_pair();
        let mut ciphertext = enc.update(&[0u8; BLOCK_SIZE]);
        ciphertext.extend_from_slice(&enc.finalize());
        assert_eq!(ciphertext.len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn decrypt_withholds_the_trailing_block() {
        let (mut enc, mut dec) = engine_pair();
        let mut ciphertext = enc.update(&[7u8; 40]);
        ciphertext.extend_from_slice(&enc.finalize());
        assert_eq!(ciphertext.len(), 48);

        let early = dec.update(&ciphertext);
        assert_eq!(early.len(), 2 * BLOCK_SIZE);
        let rest = dec.finalize().unwrap();
        assert_eq!(early.len() + rest.len(), 40);
    }

    #[test]
    fn empty_plaintext_is_one_padding_block() {
        let (enc, mut dec) = engine_pair();
        let ciphertext = enc.finalize();
        assert_eq!(ciphertext.len(), BLOCK_SIZE);
        assert!(dec.update(&ciphertext).is_empty());
        assert_eq!(dec.finalize().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn empty_ciphertext_fails_finalize() {
        let (_, dec) = engine_pair();
        assert!(dec.finalize().is_err());
    }

    #[test]
    fn misaligned_ciphertext_fails_finalize() {
        let (_, mut dec) = engine_pair();
        let _ = dec.update(&[0u8; 21]);
        assert!(dec.finalize().is_err());
    }

    proptest! {
        /// Chunk boundaries never change the stream: any split of the
        /// input encrypts to the same bytes as a single call.
        #[test]
        fn split_encryption_matches_whole(
            data in proptest::collection::vec(any::<u8>(), 0..=256),
            split in 0usize..=256,
        ) {
            let split = split.min(data.len());
            let key = EncryptionKey::from_bytes([0x42; 32]);
            let iv = Iv::from_bytes([0x24; 16]);

            let mut whole = EncryptEngine::new(&key, &iv);
            let mut expected = whole.update(&data);
            expected.extend_from_slice(&whole.finalize());

            let mut parts = EncryptEngine::new(&key, &iv);
            let mut actual = parts.update(&data[..split]);
            actual.extend_from_slice(&parts.update(&data[split..]));
            actual.extend_from_slice(&parts.finalize());

            prop_assert_eq!(actual, expected);
        }

        /// Decryption inverts encryption for any plaintext and any split
        /// of the ciphertext stream.
        #[test]
        fn decrypt_inverts_encrypt(
            data in proptest::collection::vec(any::<u8>(), 0..=256),
            split in 0usize..=512,
        ) {
            let (mut enc, mut dec) = engine_pair();
            let mut ciphertext = enc.update(&data);
            ciphertext.extend_from_slice(&enc.finalize());

            let split = split.min(ciphertext.len());
            let mut plaintext = dec.update(&ciphertext[..split]);
            plaintext.extend_from_slice(&dec.update(&ciphertext[split..]));
            plaintext.extend_from_slice(&dec.finalize().unwrap());
            prop_assert_eq!(plaintext, data);
        }
    }
}
