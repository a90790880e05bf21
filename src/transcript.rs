//! Running transcript hash over handshake messages.
//!
//! Fed every handshake message exactly as it appears on the wire, in the
//! order sent or received, and nothing else. Intermediate digests are
//! required while later messages are still pending, so reads snapshot the
//! state instead of consuming it.

use crate::crypto::{HashAlgorithm, HashContext, HashOutput};

/// Incremental transcript hash for one connection.
pub struct TranscriptHash {
    ctx: HashContext,
}

impl TranscriptHash {
    /// Create an empty transcript for the negotiated hash.
    pub fn new(hash: HashAlgorithm) -> Self {
        Self { ctx: hash.create() }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.ctx.algorithm()
    }

    /// Absorb one handshake message (header and body, as transmitted).
    pub fn update(&mut self, message: &[u8]) {
        self.ctx.update(message);
    }

    /// The digest of everything absorbed so far, without consuming.
    pub fn current_hash(&self) -> HashOutput {
        self.ctx.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_is_empty_hash() {
        let t = TranscriptHash::new(HashAlgorithm::Sha256);
        assert_eq!(t.current_hash(), HashAlgorithm::Sha256.empty_hash());
    }

    #[test]
    fn incremental_equals_one_shot() {
        let mut t = TranscriptHash::new(HashAlgorithm::Sha256);
        t.update(b"hello");
        t.update(b" world");

        let mut one = HashAlgorithm::Sha256.create();
        one.update(b"hello world");
        assert_eq!(t.current_hash(), one.finalize());
    }

    #[test]
    fn current_hash_does_not_consume() {
        let mut t = TranscriptHash::new(HashAlgorithm::Sha384);
        t.update(b"data");
        let h1 = t.current_hash();
        let h2 = t.current_hash();
        assert_eq!(h1, h2);

        t.update(b"more");
        assert_ne!(t.current_hash(), h1);
    }
}
