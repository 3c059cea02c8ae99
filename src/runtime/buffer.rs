//! Fixed-capacity directional buffers.
//!
//! Each relay direction stages bytes in a `DirectionalBuffer`: reads append at
//! the fill offset, flushes drain from the head and shift any unsent tail back
//! to offset zero. Capacity never changes after construction, which bounds the
//! memory held by a pair.

/// Default per-direction capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 40 * 1024;

/// Bounded staging area for bytes travelling in one direction of a pair.
///
/// Invariant: `0 <= used <= capacity`.
pub struct DirectionalBuffer {
    data: Box<[u8]>,
    used: usize,
}

impl DirectionalBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used == self.data.len()
    }

    /// Free space remaining at the tail.
    pub fn spare(&self) -> usize {
        self.data.len() - self.used
    }

    /// Occupied region, oldest byte first.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Writable region at the fill offset.
    ///
    /// Bytes placed here become part of the buffer only after `commit`.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.used..]
    }

    /// Mark `n` bytes of the spare region as filled.
    ///
    /// # Panics
    /// Panics if `n` exceeds the spare capacity.
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.spare(), "commit past buffer capacity");
        self.used += n;
    }

    /// Drop `n` bytes from the head and shift the remainder to offset zero.
    ///
    /// # Panics
    /// Panics if `n` exceeds the occupied length.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.used, "consume past buffered length");
        if n == 0 {
            return;
        }
        self.data.copy_within(n..self.used, 0);
        self.used -= n;
    }

    /// Append as much of `bytes` as fits, returning how many were taken.
    #[cfg(test)]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.spare());
        self.spare_mut()[..n].copy_from_slice(&bytes[..n]);
        self.commit(n);
        n
    }
}

impl std::fmt::Debug for DirectionalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionalBuffer")
            .field("used", &self.used)
            .field("capacity", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = DirectionalBuffer::new(DEFAULT_BUFFER_SIZE);

        assert_eq!(buf.capacity(), 40960);
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.spare(), 40960);
        assert!(buf.is_empty());
        assert!(!buf.is_full());
        assert!(buf.filled().is_empty());
    }

    #[test]
    fn test_append_and_compact() {
        let mut buf = DirectionalBuffer::new(16);

        assert_eq!(buf.extend_from_slice(b"hello world"), 11);
        assert_eq!(buf.filled(), b"hello world");

        // Partial flush keeps the tail in order at offset zero
        buf.consume(6);
        assert_eq!(buf.filled(), b"world");
        assert_eq!(buf.spare(), 11);

        buf.extend_from_slice(b"!");
        assert_eq!(buf.filled(), b"world!");

        buf.consume(6);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extend_clamps_to_capacity() {
        let mut buf = DirectionalBuffer::new(4);

        assert_eq!(buf.extend_from_slice(b"abcdef"), 4);
        assert!(buf.is_full());
        assert_eq!(buf.filled(), b"abcd");

        // Full buffer accepts nothing more
        assert_eq!(buf.extend_from_slice(b"gh"), 0);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_spare_mut_commit() {
        let mut buf = DirectionalBuffer::new(8);

        buf.spare_mut()[..3].copy_from_slice(b"xyz");
        assert!(buf.is_empty()); // not visible until committed

        buf.commit(3);
        assert_eq!(buf.filled(), b"xyz");
        assert_eq!(buf.spare_mut().len(), 5);
    }

    #[test]
    fn test_consume_zero_is_noop() {
        let mut buf = DirectionalBuffer::new(8);
        buf.extend_from_slice(b"abc");

        buf.consume(0);
        assert_eq!(buf.filled(), b"abc");
    }

    #[test]
    #[should_panic(expected = "commit past buffer capacity")]
    fn test_commit_past_capacity_panics() {
        let mut buf = DirectionalBuffer::new(2);
        buf.commit(3);
    }

    #[test]
    #[should_panic(expected = "consume past buffered length")]
    fn test_consume_past_length_panics() {
        let mut buf = DirectionalBuffer::new(8);
        buf.extend_from_slice(b"ab");
        buf.consume(3);
    }
}
