//! Key-exchange capability over the supported named groups.
//!
//! Two operation styles coexist. The client calls [`NamedGroup::prepare`]
//! while building ClientHello, before it knows the server's choice, and
//! later resolves exactly one of the contexts against the server share.
//! The server calls [`NamedGroup::exchange`] when processing ClientHello:
//! a one-shot that returns its own share together with the shared secret.

use alloc::vec::Vec;
use zeroize::Zeroize;

use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::crypto::RegistryRng;
use crate::error::Error;

/// TLS named groups supported for (EC)DHE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NamedGroup {
    Secp256r1 = 23,
    X25519 = 29,
}

impl NamedGroup {
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            23 => Some(Self::Secp256r1),
            29 => Some(Self::X25519),
            _ => None,
        }
    }

    /// Wire length of a public share for this group.
    pub fn share_len(self) -> usize {
        match self {
            // Uncompressed SEC1 point: 0x04 || x || y.
            NamedGroup::Secp256r1 => 65,
            NamedGroup::X25519 => 32,
        }
    }

    /// Create a private context and emit its public share.
    pub fn prepare(self, rng: &mut RegistryRng) -> Result<(KeyExchangeContext, Vec<u8>), Error> {
        match self {
            NamedGroup::X25519 => {
                let mut seed = [0u8; 32];
                rng.fill(&mut seed);
                let secret = x25519_dalek::StaticSecret::from(seed);
                seed.zeroize();
                let public = x25519_dalek::PublicKey::from(&secret);
                Ok((
                    KeyExchangeContext::X25519(secret),
                    public.as_bytes().to_vec(),
                ))
            }
            NamedGroup::Secp256r1 => {
                let secret = p256::ecdh::EphemeralSecret::random(rng);
                let public = secret.public_key().to_encoded_point(false);
                Ok((
                    KeyExchangeContext::Secp256r1(secret),
                    public.as_bytes().to_vec(),
                ))
            }
        }
    }

    /// One-shot exchange against a peer share: returns our fresh public
    /// share and the shared secret.
    pub fn exchange(
        self,
        rng: &mut RegistryRng,
        peer_share: &[u8],
    ) -> Result<(Vec<u8>, SharedSecret), Error> {
        let (ctx, public) = self.prepare(rng)?;
        let secret = ctx.exchange(peer_share)?;
        Ok((public, secret))
    }
}

/// Private key-exchange state created by [`NamedGroup::prepare`].
///
/// Resolving the exchange consumes the context; unresolved contexts are
/// dropped (and their private scalars wiped) when the handshake abandons
/// them.
pub enum KeyExchangeContext {
    X25519(x25519_dalek::StaticSecret),
    Secp256r1(p256::ecdh::EphemeralSecret),
}

impl KeyExchangeContext {
    pub fn group(&self) -> NamedGroup {
        match self {
            KeyExchangeContext::X25519(_) => NamedGroup::X25519,
            KeyExchangeContext::Secp256r1(_) => NamedGroup::Secp256r1,
        }
    }

    /// Resolve the exchange against the peer's public share.
    pub fn exchange(self, peer_share: &[u8]) -> Result<SharedSecret, Error> {
        match self {
            KeyExchangeContext::X25519(secret) => {
                let peer: [u8; 32] = peer_share.try_into().map_err(|_| Error::IncompatibleKey)?;
                let peer = x25519_dalek::PublicKey::from(peer);
                let shared = secret.diffie_hellman(&peer);
                // Reject the all-zero output of a low-order peer point.
                if !shared.was_contributory() {
                    return Err(Error::IncompatibleKey);
                }
                Ok(SharedSecret::from_slice(shared.as_bytes()))
            }
            KeyExchangeContext::Secp256r1(secret) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_share)
                    .map_err(|_| Error::IncompatibleKey)?;
                let shared = secret.diffie_hellman(&peer);
                Ok(SharedSecret::from_slice(shared.raw_secret_bytes()))
            }
        }
    }
}

/// The (EC)DHE shared secret. Wiped on drop.
pub struct SharedSecret {
    bytes: [u8; 32],
}

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedSecret").field("bytes", &"<redacted>").finish()
    }
}

impl SharedSecret {
    fn from_slice(data: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(data);
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
