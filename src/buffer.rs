//! Growable output buffer with a caller-supplied scratch region.
//!
//! Handshake flights commonly fit in a few hundred bytes, so output starts
//! in a small stack slice owned by the caller and only migrates to the heap
//! when it overflows. Growth doubles to amortize appends; the buffer never
//! shrinks. Disposal wipes whatever was written.

use alloc::vec::Vec;
use zeroize::Zeroize;

use crate::error::Error;

/// Output sink backed by caller scratch until it spills to the heap.
pub struct OutputBuffer<'a> {
    scratch: &'a mut [u8],
    heap: Vec<u8>,
    spilled: bool,
    used: usize,
}

impl<'a> OutputBuffer<'a> {
    /// Attach a non-empty scratch region. Nothing is allocated until the
    /// scratch overflows.
    pub fn new(scratch: &'a mut [u8]) -> Self {
        debug_assert!(!scratch.is_empty());
        Self {
            scratch,
            heap: Vec::new(),
            spilled: false,
            used: 0,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Current capacity (scratch or heap, whichever is active).
    pub fn capacity(&self) -> usize {
        if self.spilled {
            self.heap.capacity()
        } else {
            self.scratch.len()
        }
    }

    /// The written region.
    pub fn as_slice(&self) -> &[u8] {
        if self.spilled {
            &self.heap[..self.used]
        } else {
            &self.scratch[..self.used]
        }
    }

    /// Mutable view of the written region.
    pub fn filled_mut(&mut self) -> &mut [u8] {
        if self.spilled {
            &mut self.heap[..self.used]
        } else {
            &mut self.scratch[..self.used]
        }
    }

    /// Ensure capacity for `delta` additional bytes.
    ///
    /// On allocation failure the buffer keeps its previous contents and
    /// remains usable.
    pub fn reserve(&mut self, delta: usize) -> Result<(), Error> {
        let needed = self.used.checked_add(delta).ok_or(Error::NoMemory)?;
        if needed <= self.capacity() {
            return Ok(());
        }

        if !self.spilled {
            // First overflow: migrate scratch contents to the heap.
            let target = needed.max(self.scratch.len() * 2);
            let mut heap = Vec::new();
            heap.try_reserve_exact(target).map_err(|_| Error::NoMemory)?;
            heap.extend_from_slice(&self.scratch[..self.used]);
            self.scratch[..self.used].zeroize();
            self.heap = heap;
            self.spilled = true;
        } else {
            let target = needed.max(self.heap.capacity() * 2);
            self.heap
                .try_reserve_exact(target - self.heap.len())
                .map_err(|_| Error::NoMemory)?;
        }
        Ok(())
    }

    /// Append bytes, growing as needed.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), Error> {
        self.reserve(data.len())?;
        if self.spilled {
            self.heap.extend_from_slice(data);
        } else {
            self.scratch[self.used..self.used + data.len()].copy_from_slice(data);
        }
        self.used += data.len();
        Ok(())
    }

    /// Append a single byte.
    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        self.extend_from_slice(core::slice::from_ref(&byte))
    }

    /// Drop bytes from the end. `len` above the current length is a no-op.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.used {
            return;
        }
        if self.spilled {
            self.heap[len..self.used].zeroize();
            self.heap.truncate(len);
        } else {
            self.scratch[len..self.used].zeroize();
        }
        self.used = len;
    }
}

impl Drop for OutputBuffer<'_> {
    fn drop(&mut self) {
        // The buffer may have carried traffic secrets or plaintext.
        self.scratch[..].zeroize();
        self.heap.zeroize();
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_scratch_while_it_fits() {
        let mut scratch = [0u8; 16];
        let mut buf = OutputBuffer::new(&mut scratch);
        buf.extend_from_slice(b"hello").unwrap();
        buf.extend_from_slice(b" world").unwrap();
        assert_eq!(buf.as_slice(), b"hello world");
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn spills_to_heap_on_overflow() {
        let mut scratch = [0u8; 8];
        let mut buf = OutputBuffer::new(&mut scratch);
        buf.extend_from_slice(b"0123456").unwrap();
        assert_eq!(buf.capacity(), 8);
        buf.extend_from_slice(b"89abcdef").unwrap();
        assert_eq!(buf.as_slice(), b"012345689abcdef");
        // First spill doubles the scratch size at minimum.
        assert!(buf.capacity() >= 16);
    }

    #[test]
    fn scratch_is_wiped_after_spill() {
        let mut scratch = [0u8; 4];
        {
            let mut buf = OutputBuffer::new(&mut scratch);
            buf.extend_from_slice(b"abcd").unwrap();
            buf.extend_from_slice(b"efgh").unwrap();
            assert_eq!(buf.as_slice(), b"abcdefgh");
        }
        assert_eq!(scratch, [0u8; 4]);
    }

    #[test]
    fn doubling_growth() {
        let mut scratch = [0u8; 4];
        let mut buf = OutputBuffer::new(&mut scratch);
        buf.extend_from_slice(&[0x42; 5]).unwrap();
        let cap1 = buf.capacity();
        buf.extend_from_slice(&[0x42; 64]).unwrap();
        assert!(buf.capacity() >= cap1 * 2);
        assert_eq!(buf.len(), 69);
        assert!(buf.as_slice().iter().all(|&b| b == 0x42));
    }

    #[test]
    fn truncate_drops_tail() {
        let mut scratch = [0u8; 32];
        let mut buf = OutputBuffer::new(&mut scratch);
        buf.extend_from_slice(b"0123456789").unwrap();
        buf.truncate(4);
        assert_eq!(buf.as_slice(), b"0123");
        buf.truncate(100);
        assert_eq!(buf.len(), 4);
        buf.extend_from_slice(b"xy").unwrap();
        assert_eq!(buf.as_slice(), b"0123xy");
    }

    #[test]
    fn drop_wipes_scratch() {
        let mut scratch = [0u8; 8];
        {
            let mut buf = OutputBuffer::new(&mut scratch);
            buf.extend_from_slice(b"secret!").unwrap();
        }
        assert_eq!(scratch, [0u8; 8]);
    }

    #[test]
    fn filled_mut_allows_in_place_edits() {
        let mut scratch = [0u8; 16];
        let mut buf = OutputBuffer::new(&mut scratch);
        buf.extend_from_slice(&[0u8; 5]).unwrap();
        buf.filled_mut()[0] = 0x17;
        assert_eq!(buf.as_slice()[0], 0x17);
    }
}
