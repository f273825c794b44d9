/// A growable buffer tracking how many leading bytes are filled.
///
/// Encoders obtain scratch space with [`unfilled_to`](WriteBuf::unfilled_to)
/// and commit it with [`advance`](WriteBuf::advance), so a single buffer can
/// be reused across a whole connection sequence.
#[derive(Debug, Default)]
pub struct WriteBuf {
    inner: Vec<u8>,
    filled: usize,
}

impl WriteBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a mutable slice of at least `size` unfilled bytes.
    pub fn unfilled_to(&mut self, size: usize) -> &mut [u8] {
        if self.inner.len() < self.filled + size {
            self.inner.resize(self.filled + size, 0);
        }
        &mut self.inner[self.filled..]
    }

    pub fn advance(&mut self, len: usize) {
        debug_assert!(self.filled + len <= self.inner.len());
        self.filled += len;
    }

    pub fn filled_len(&self) -> usize {
        self.filled
    }

    pub fn filled(&self) -> &[u8] {
        &self.inner[..self.filled]
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn clear(&mut self) {
        self.filled = 0;
    }

    pub fn into_inner(mut self) -> Vec<u8> {
        self.inner.truncate(self.filled);
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_reuse() {
        let mut buf = WriteBuf::new();

        buf.unfilled_to(4).copy_from_slice(&[1, 2, 3, 4]);
        buf.advance(4);
        assert_eq!(buf.filled(), [1, 2, 3, 4]);

        buf.unfilled_to(2)[..2].copy_from_slice(&[5, 6]);
        buf.advance(2);
        assert_eq!(buf.filled(), [1, 2, 3, 4, 5, 6]);

        buf.clear();
        assert!(buf.is_empty());
    }
}
