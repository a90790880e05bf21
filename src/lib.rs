//! A transport-agnostic TLS 1.3 endpoint engine.
//!
//! The crate drives the RFC 8446 handshake to completion and then protects
//! application traffic with authenticated records. It performs no I/O:
//! bytes from the peer go in, bytes for the peer come out, and everything
//! in between (transcript hashing, the HKDF key schedule, AEAD record
//! protection, alert semantics) happens in memory.
//!
//! Concrete certificate handling stays outside: the application supplies
//! [`cert::CertificateCallbacks`] for chain lookup and signature
//! verification, and a [`crypto::CryptoRegistry`] selects the enabled
//! cipher suites, key-exchange groups, and PRNG.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

extern crate alloc;

pub mod alert;
pub mod buffer;
pub mod cert;
pub mod crypto;
pub mod error;
pub mod extensions;
pub mod key_schedule;
pub mod messages;
pub mod record;
pub mod transcript;

mod connection;
mod handshake;

pub use alert::Alert;
pub use buffer::OutputBuffer;
pub use cert::{CertificateCallbacks, CertificateSelection, Signer, Verifier};
pub use connection::{Connection, HandshakeStatus};
pub use crypto::{CipherSuite, CryptoRegistry, HashAlgorithm, NamedGroup};
pub use error::Error;
pub use handshake::Role;
pub use key_schedule::KeySchedule;
pub use transcript::TranscriptHash;

/// Largest (EC)DHE shared secret across the supported groups.
pub const MAX_SECRET_SIZE: usize = 32;
/// Largest AEAD IV across the supported ciphers.
pub const MAX_IV_SIZE: usize = 16;
/// Largest hash digest across the supported algorithms.
pub const MAX_DIGEST_SIZE: usize = 64;
