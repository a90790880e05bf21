//! Cryptographic capabilities: cipher suites, key exchange, hashing, HKDF,
//! and the registry that groups the enabled algorithms with a PRNG.
//!
//! Dispatch is by tagged variants over the closed algorithm set; each
//! variant wraps its RustCrypto backend.

pub mod aead;
pub mod hash;
pub mod kdf;
pub mod kex;

pub use aead::{AeadAlgorithm, AeadCipher, NONCE_SIZE, TAG_SIZE};
pub use hash::{HashAlgorithm, HashContext, HashOutput};
pub use kex::{KeyExchangeContext, NamedGroup, SharedSecret};

use rand_core::{CryptoRng, RngCore};

/// A TLS 1.3 cipher suite: an AEAD paired with a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CipherSuite {
    Aes128GcmSha256 = 0x1301,
    Aes256GcmSha384 = 0x1302,
    ChaCha20Poly1305Sha256 = 0x1303,
}

impl CipherSuite {
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x1301 => Some(Self::Aes128GcmSha256),
            0x1302 => Some(Self::Aes256GcmSha384),
            0x1303 => Some(Self::ChaCha20Poly1305Sha256),
            _ => None,
        }
    }

    pub fn aead(self) -> AeadAlgorithm {
        match self {
            CipherSuite::Aes128GcmSha256 => AeadAlgorithm::Aes128Gcm,
            CipherSuite::Aes256GcmSha384 => AeadAlgorithm::Aes256Gcm,
            CipherSuite::ChaCha20Poly1305Sha256 => AeadAlgorithm::ChaCha20Poly1305,
        }
    }

    pub fn hash(self) -> HashAlgorithm {
        match self {
            CipherSuite::Aes128GcmSha256 | CipherSuite::ChaCha20Poly1305Sha256 => {
                HashAlgorithm::Sha256
            }
            CipherSuite::Aes256GcmSha384 => HashAlgorithm::Sha384,
        }
    }
}

/// The enabled algorithms and the PRNG for one or more connections.
///
/// Registries are immutable shared data: construct once, share freely.
/// List order is preference order for negotiation.
pub struct CryptoRegistry {
    /// Fills the slice with cryptographically secure random bytes.
    pub random_bytes: fn(&mut [u8]),
    /// Supported key-exchange groups, most preferred first.
    pub key_exchanges: &'static [NamedGroup],
    /// Supported cipher suites, most preferred first.
    pub cipher_suites: &'static [CipherSuite],
}

/// Every supported group, preference order.
pub const ALL_KEY_EXCHANGES: &[NamedGroup] = &[NamedGroup::X25519, NamedGroup::Secp256r1];

/// Every supported suite, preference order.
pub const ALL_CIPHER_SUITES: &[CipherSuite] = &[
    CipherSuite::Aes128GcmSha256,
    CipherSuite::Aes256GcmSha384,
    CipherSuite::ChaCha20Poly1305Sha256,
];

fn os_random_bytes(buf: &mut [u8]) {
    rand_core::OsRng.fill_bytes(buf);
}

impl CryptoRegistry {
    /// A registry with every supported algorithm enabled, drawing
    /// randomness from the operating system.
    pub fn default_registry() -> Self {
        Self {
            random_bytes: os_random_bytes,
            key_exchanges: ALL_KEY_EXCHANGES,
            cipher_suites: ALL_CIPHER_SUITES,
        }
    }

    /// Adapt the registry's byte filler to the `RngCore` interface the
    /// key-exchange backends expect.
    pub fn rng(&self) -> RegistryRng {
        RegistryRng {
            fill_bytes: self.random_bytes,
        }
    }
}

/// `RngCore` adapter over a registry's `random_bytes` function.
pub struct RegistryRng {
    fill_bytes: fn(&mut [u8]),
}

impl RegistryRng {
    pub fn fill(&mut self, buf: &mut [u8]) {
        (self.fill_bytes)(buf)
    }
}

impl RngCore for RegistryRng {
    fn next_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        (self.fill_bytes)(&mut b);
        u32::from_le_bytes(b)
    }

    fn next_u64(&mut self) -> u64 {
        let mut b = [0u8; 8];
        (self.fill_bytes)(&mut b);
        u64::from_le_bytes(b)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        (self.fill_bytes)(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        (self.fill_bytes)(dest);
        Ok(())
    }
}

impl CryptoRng for RegistryRng {}
