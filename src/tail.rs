//! Delayed-emission buffer for trailing-tag streams
//!
//! A v3 envelope ends with a fixed-size authentication trailer that is not
//! length-prefixed, so a streaming reader only learns where the ciphertext
//! stops when the stream does. [`TailBuffer`] keeps the most recent
//! `capacity` bytes back at all times: everything it emits is guaranteed
//! ciphertext, and whatever it still holds at the end of the stream is the
//! trailer.

pub(crate) struct TailBuffer {
    held: Vec<u8>,
    capacity: usize,
}

impl TailBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            held: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Absorb `chunk`, returning every byte now known not to belong to the
    /// trailing `capacity` bytes. Emission order matches input order.
    #[must_use]
    pub(crate) fn update(&mut self, chunk: &[u8]) -> Vec<u8> {
        if chunk.len() >= self.capacity {
            // The chunk alone covers the tail: everything held so far plus
            // the chunk's head is safe to emit.
            let split = chunk.len() - self.capacity;
            let mut out = std::mem::take(&mut self.held);
            out.extend_from_slice(&chunk[..split]);
            self.held.extend_from_slice(&chunk[split..]);
            out
        } else if self.held.len() + chunk.len() <= self.capacity {
            self.held.extend_from_slice(chunk);
            Vec::new()
        } else {
            let excess = self.held.len() + chunk.len() - self.capacity;
            let out: Vec<u8> = self.held.drain(..excess).collect();
            self.held.extend_from_slice(chunk);
            out
        }
    }

    /// The retained tail: the last `capacity` bytes of the stream, or the
    /// whole stream if it was shorter.
    pub(crate) fn finalize(self) -> Vec<u8> {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_input_is_fully_retained() {
        let mut buf = TailBuffer::new(4);
        assert!(buf.update(&[1, 2, 3]).is_empty());
        assert_eq!(buf.finalize(), vec![1, 2, 3]);
    }

    #[test]
    fn exact_capacity_is_fully_retained() {
        let mut buf = TailBuffer::new(4);
        assert!(buf.update(&[1, 2, 3, 4]).is_empty());
        assert_eq!(buf.finalize(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn overflow_emits_the_oldest_byte() {
        let mut buf = TailBuffer::new(4);
        assert_eq!(buf.update(&[1, 2, 3, 4, 5]), vec![1]);
        assert_eq!(buf.finalize(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn short_updates_accumulate() {
        let mut buf = TailBuffer::new(4);
        assert!(buf.update(&[1, 2]).is_empty());
        assert!(buf.update(&[3, 4]).is_empty());
        assert_eq!(buf.finalize(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn overflow_across_updates_emits_in_order() {
        let mut buf = TailBuffer::new(4);
        assert!(buf.update(&[1, 2, 3]).is_empty());
        assert_eq!(buf.update(&[4, 5, 6]), vec![1, 2]);
        assert_eq!(buf.finalize(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn large_second_update_flushes_held_bytes() {
        let mut buf = TailBuffer::new(4);
        assert!(buf.update(&[1, 2, 3]).is_empty());
        assert_eq!(buf.update(&[4, 5, 6, 7, 8, 9]), vec![1, 2, 3, 4, 5]);
        assert_eq!(buf.finalize(), vec![6, 7, 8, 9]);
    }

    #[test]
    fn zero_capacity_emits_everything() {
        let mut buf = TailBuffer::new(0);
        assert_eq!(buf.update(&[1, 2, 3]), vec![1, 2, 3]);
        assert!(buf.finalize().is_empty());
    }

    #[test]
    fn empty_chunks_change_nothing() {
        let mut buf = TailBuffer::new(4);
        assert!(buf.update(&[]).is_empty());
        assert!(buf.update(&[1, 2]).is_empty());
        assert!(buf.update(&[]).is_empty());
        assert_eq!(buf.finalize(), vec![1, 2]);
    }

    proptest! {
        /// Emitted bytes followed by the retained tail always reconstruct
        /// the input, and between calls the buffer holds back exactly the
        /// last `capacity` bytes seen so far.
        #[test]
        fn emitted_plus_retained_reconstructs_input(
            capacity in 0usize..=64,
            chunks in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..=40), 0..=12),
        ) {
            let mut buf = TailBuffer::new(capacity);
            let mut input = Vec::new();
            let mut emitted = Vec::new();
            for chunk in &chunks {
                input.extend_from_slice(chunk);
                emitted.extend_from_slice(&buf.update(chunk));
                prop_assert_eq!(emitted.len(), input.len() - capacity.min(input.len()));
                prop_assert_eq!(&emitted[..], &input[..emitted.len()]);
            }
            let retained = buf.finalize();

            prop_assert_eq!(retained.len(), capacity.min(input.len()));
            let mut reconstructed = emitted;
            reconstructed.extend_from_slice(&retained);
            prop_assert_eq!(reconstructed, input);
        }
    }
}
