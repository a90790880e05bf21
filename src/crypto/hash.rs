//! Hash capability: incremental contexts over the closed algorithm set.

use sha2::{Digest as _, Sha256, Sha384};
use zeroize::Zeroize;

use crate::MAX_DIGEST_SIZE;

/// Hash algorithms used by the supported cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
}

impl HashAlgorithm {
    /// Digest size in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
        }
    }

    /// Internal block size in bytes.
    pub fn block_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 128,
        }
    }

    /// Create a fresh incremental context.
    pub fn create(self) -> HashContext {
        match self {
            HashAlgorithm::Sha256 => HashContext::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => HashContext::Sha384(Sha384::new()),
        }
    }

    /// Digest of the empty input.
    pub fn empty_hash(self) -> HashOutput {
        self.create().finalize()
    }
}

/// A fixed-capacity digest value. The live length is the algorithm's
/// digest size.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HashOutput {
    bytes: [u8; MAX_DIGEST_SIZE],
    len: usize,
}

impl HashOutput {
    pub(crate) fn from_slice(data: &[u8]) -> Self {
        debug_assert!(data.len() <= MAX_DIGEST_SIZE);
        let mut bytes = [0u8; MAX_DIGEST_SIZE];
        bytes[..data.len()].copy_from_slice(data);
        Self {
            bytes,
            len: data.len(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Wipe the digest bytes.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.len = 0;
    }
}

impl AsRef<[u8]> for HashOutput {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl core::fmt::Debug for HashOutput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "HashOutput({} bytes)", self.len)
    }
}

/// Incremental hash context.
#[derive(Clone)]
pub enum HashContext {
    Sha256(Sha256),
    Sha384(Sha384),
}

impl HashContext {
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            HashContext::Sha256(_) => HashAlgorithm::Sha256,
            HashContext::Sha384(_) => HashAlgorithm::Sha384,
        }
    }

    /// Feed bytes into the context.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            HashContext::Sha256(h) => h.update(data),
            HashContext::Sha384(h) => h.update(data),
        }
    }

    /// Digest and consume the context.
    pub fn finalize(self) -> HashOutput {
        match self {
            HashContext::Sha256(h) => HashOutput::from_slice(&h.finalize()),
            HashContext::Sha384(h) => HashOutput::from_slice(&h.finalize()),
        }
    }

    /// Digest without consuming: clone the state and finalize the clone.
    pub fn snapshot(&self) -> HashOutput {
        self.clone().finalize()
    }

    /// Digest and reset the context to its initial state.
    pub fn finalize_reset(&mut self) -> HashOutput {
        match self {
            HashContext::Sha256(h) => HashOutput::from_slice(&h.finalize_reset()),
            HashContext::Sha384(h) => HashOutput::from_slice(&h.finalize_reset()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn sha256_empty() {
        assert_eq!(
            HashAlgorithm::Sha256.empty_hash().as_slice(),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn sha384_empty() {
        assert_eq!(
            HashAlgorithm::Sha384.empty_hash().as_slice(),
            hex!(
                "38b060a751ac96384cd9327eb1b1e36a21fdb71114be07434c0cc7bf63f6e1da"
                "274edebfe76f65fbd51ad2f14898b95b"
            )
        );
    }

    #[test]
    fn snapshot_does_not_consume() {
        let mut ctx = HashAlgorithm::Sha256.create();
        ctx.update(b"data");
        let h1 = ctx.snapshot();
        let h2 = ctx.snapshot();
        assert_eq!(h1, h2);

        ctx.update(b"more");
        assert_ne!(ctx.snapshot(), h1);
    }

    #[test]
    fn finalize_reset_restarts() {
        let mut ctx = HashAlgorithm::Sha384.create();
        ctx.update(b"abc");
        let first = ctx.finalize_reset();
        let empty = ctx.snapshot();
        assert_ne!(first, empty);
        assert_eq!(empty, HashAlgorithm::Sha384.empty_hash());
    }

    #[test]
    fn digest_sizes() {
        assert_eq!(HashAlgorithm::Sha256.digest_size(), 32);
        assert_eq!(HashAlgorithm::Sha384.digest_size(), 48);
        assert_eq!(HashAlgorithm::Sha256.empty_hash().len(), 32);
        assert_eq!(HashAlgorithm::Sha384.empty_hash().len(), 48);
    }
}
