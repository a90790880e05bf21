//! Certificate callbacks: the two operations the core delegates instead of
//! carrying certificate logic itself.
//!
//! The server-side `lookup` picks a chain, a signature scheme, and a
//! one-shot signer; the receiving side's `verify` validates the chain and
//! returns a one-shot verifier. Both capabilities are consumed by their
//! single use, so "called exactly once" is enforced by the move. Their
//! `Drop` runs whenever the handshake abandons them, which is where any
//! temporary key material gets released.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::crypto::HashOutput;
use crate::error::Error;

/// Signs the CertificateVerify content with the private key belonging to
/// the chain returned by `lookup`.
pub trait Signer {
    /// Produce the signature over `message`. Consumes the signer.
    fn sign(self: Box<Self>, message: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Verifies the peer's CertificateVerify signature with the public key of
/// an already-validated chain.
pub trait Verifier {
    /// Check `signature` over `message`. Consumes the verifier.
    fn verify(self: Box<Self>, message: &[u8], signature: &[u8]) -> Result<(), Error>;
}

/// What a server `lookup` yields: the chain to present (end-entity
/// first), the chosen signature scheme, and the signer bound to it.
pub struct CertificateSelection {
    pub chain: Vec<Vec<u8>>,
    /// A scheme from the client's advertised signature_algorithms.
    pub scheme: u16,
    pub signer: Box<dyn Signer>,
}

/// Application-supplied certificate operations.
///
/// Errors that are already alert-classed pass through the handshake
/// verbatim; anything else is reported as handshake_failure.
pub trait CertificateCallbacks {
    /// Server side, after ClientHello: choose a chain and signer.
    /// `server_name` is the client's SNI, `offered_schemes` its
    /// signature_algorithms list.
    fn lookup(
        &self,
        server_name: Option<&str>,
        offered_schemes: &[u16],
    ) -> Result<CertificateSelection, Error>;

    /// Receiver side, after Certificate: validate the chain (end-entity
    /// first) and return the verifier for CertificateVerify.
    fn verify(&self, chain: &[Vec<u8>]) -> Result<Box<dyn Verifier>, Error>;
}

/// Context string for a server's CertificateVerify (RFC 8446 §4.4.3).
pub const CONTEXT_SERVER: &[u8] = b"TLS 1.3, server CertificateVerify";

/// Build the signed content of CertificateVerify: 64 spaces, the context
/// string, a zero separator, and the transcript hash at that point.
pub fn certificate_verify_message(context: &[u8], transcript_hash: &HashOutput) -> Vec<u8> {
    let mut message = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    message.extend_from_slice(&[0x20u8; 64]);
    message.extend_from_slice(context);
    message.push(0);
    message.extend_from_slice(transcript_hash.as_slice());
    message
}
