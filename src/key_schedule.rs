//! TLS 1.3 key schedule (RFC 8446 section 7.1).
//!
//! ```text
//!             0
//!             |
//!             v
//!   PSK ->  HKDF-Extract = Early Secret
//!             |
//!             v
//!   ECDHE -> HKDF-Extract = Handshake Secret
//!             |
//!             +-> Derive-Secret(., "c hs traffic", CH..SH)
//!             +-> Derive-Secret(., "s hs traffic", CH..SH)
//!             |
//!             v
//!     0  ->  HKDF-Extract = Master Secret
//!             |
//!             +-> Derive-Secret(., "c ap traffic", CH..SF)
//!             +-> Derive-Secret(., "s ap traffic", CH..SF)
//! ```
//!
//! PSK-based resumption is not supported, so the early secret is always
//! extracted from zeros.

use zeroize::Zeroize;

use crate::crypto::kdf::{hkdf_expand_label, hkdf_extract, hmac};
use crate::crypto::{HashAlgorithm, HashOutput};
use crate::error::Error;
use crate::MAX_DIGEST_SIZE;

/// A traffic secret or finished key; length is the hash's digest size.
/// Wiped on drop.
pub struct Secret {
    hash: HashAlgorithm,
    bytes: [u8; MAX_DIGEST_SIZE],
}

impl Secret {
    fn zero(hash: HashAlgorithm) -> Self {
        Self {
            hash,
            bytes: [0u8; MAX_DIGEST_SIZE],
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.hash.digest_size()]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.hash.digest_size()]
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash,
            bytes: self.bytes,
        }
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Secret({:?})", self.hash)
    }
}

/// TLS 1.3 key schedule state for one connection.
pub struct KeySchedule {
    hash: HashAlgorithm,
    early_secret: [u8; MAX_DIGEST_SIZE],
    handshake_secret: [u8; MAX_DIGEST_SIZE],
    master_secret: [u8; MAX_DIGEST_SIZE],
}

impl KeySchedule {
    /// Initialize the schedule: Early Secret = HKDF-Extract(0, 0).
    pub fn new(hash: HashAlgorithm) -> Self {
        let n = hash.digest_size();
        let zeros = [0u8; MAX_DIGEST_SIZE];
        let mut early_secret = [0u8; MAX_DIGEST_SIZE];
        hkdf_extract(hash, &zeros[..n], &zeros[..n], &mut early_secret[..n]);

        Self {
            hash,
            early_secret,
            handshake_secret: [0u8; MAX_DIGEST_SIZE],
            master_secret: [0u8; MAX_DIGEST_SIZE],
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    /// Derive-Secret(secret, label, transcript_hash) into `out`.
    fn derive_secret(
        &self,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        out: &mut [u8],
    ) -> Result<(), Error> {
        hkdf_expand_label(self.hash, secret, label, context, out)
    }

    /// Absorb the ECDHE shared secret:
    /// Handshake Secret = HKDF-Extract(Derive-Secret(Early, "derived", ""), ECDHE).
    pub fn derive_handshake_secret(&mut self, shared_secret: &[u8]) -> Result<(), Error> {
        let n = self.hash.digest_size();
        let empty_hash = self.hash.empty_hash();
        let mut salt = [0u8; MAX_DIGEST_SIZE];
        self.derive_secret(
            &self.early_secret[..n],
            b"derived",
            empty_hash.as_slice(),
            &mut salt[..n],
        )?;
        hkdf_extract(
            self.hash,
            &salt[..n],
            shared_secret,
            &mut self.handshake_secret[..n],
        );
        salt.zeroize();
        Ok(())
    }

    /// Client and server handshake traffic secrets; `transcript_hash`
    /// covers ClientHello..ServerHello.
    pub fn handshake_traffic_secrets(
        &self,
        transcript_hash: &HashOutput,
    ) -> Result<(Secret, Secret), Error> {
        let n = self.hash.digest_size();
        let mut client = Secret::zero(self.hash);
        let mut server = Secret::zero(self.hash);
        self.derive_secret(
            &self.handshake_secret[..n],
            b"c hs traffic",
            transcript_hash.as_slice(),
            client.as_mut_slice(),
        )?;
        self.derive_secret(
            &self.handshake_secret[..n],
            b"s hs traffic",
            transcript_hash.as_slice(),
            server.as_mut_slice(),
        )?;
        Ok((client, server))
    }

    /// Master Secret = HKDF-Extract(Derive-Secret(Handshake, "derived", ""), 0).
    ///
    /// The earlier chain links are wiped once the master secret exists.
    pub fn derive_master_secret(&mut self) -> Result<(), Error> {
        let n = self.hash.digest_size();
        let empty_hash = self.hash.empty_hash();
        let mut salt = [0u8; MAX_DIGEST_SIZE];
        self.derive_secret(
            &self.handshake_secret[..n],
            b"derived",
            empty_hash.as_slice(),
            &mut salt[..n],
        )?;
        let zeros = [0u8; MAX_DIGEST_SIZE];
        hkdf_extract(
            self.hash,
            &salt[..n],
            &zeros[..n],
            &mut self.master_secret[..n],
        );
        salt.zeroize();
        self.early_secret.zeroize();
        self.handshake_secret.zeroize();
        Ok(())
    }

    /// Client and server application traffic secrets; `transcript_hash`
    /// covers ClientHello..server Finished.
    pub fn app_traffic_secrets(
        &self,
        transcript_hash: &HashOutput,
    ) -> Result<(Secret, Secret), Error> {
        let n = self.hash.digest_size();
        let mut client = Secret::zero(self.hash);
        let mut server = Secret::zero(self.hash);
        self.derive_secret(
            &self.master_secret[..n],
            b"c ap traffic",
            transcript_hash.as_slice(),
            client.as_mut_slice(),
        )?;
        self.derive_secret(
            &self.master_secret[..n],
            b"s ap traffic",
            transcript_hash.as_slice(),
            server.as_mut_slice(),
        )?;
        Ok((client, server))
    }

    /// finished_key = HKDF-Expand-Label(traffic_secret, "finished", "", Hash.length).
    pub fn finished_key(base: &Secret) -> Result<Secret, Error> {
        let mut key = Secret::zero(base.hash());
        hkdf_expand_label(
            base.hash(),
            base.as_slice(),
            b"finished",
            &[],
            key.as_mut_slice(),
        )?;
        Ok(key)
    }

    /// verify_data = HMAC(finished_key, transcript_hash).
    pub fn finished_verify_data(finished_key: &Secret, transcript_hash: &HashOutput) -> HashOutput {
        hmac(
            finished_key.hash(),
            finished_key.as_slice(),
            transcript_hash.as_slice(),
        )
    }

    #[cfg(test)]
    pub(crate) fn handshake_secret_is_wiped(&self) -> bool {
        self.handshake_secret.iter().all(|&b| b == 0)
    }
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.early_secret.zeroize();
        self.handshake_secret.zeroize();
        self.master_secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sha256_schedule_with_rfc8448_shared() -> KeySchedule {
        let mut ks = KeySchedule::new(HashAlgorithm::Sha256);
        let shared_secret =
            hex!("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d");
        ks.derive_handshake_secret(&shared_secret).unwrap();
        ks
    }

    /// RFC 8448 §3: Early Secret when no PSK is present.
    #[test]
    fn rfc8448_early_secret() {
        let ks = KeySchedule::new(HashAlgorithm::Sha256);
        assert_eq!(
            ks.early_secret[..32],
            hex!("33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a")
        );
    }

    /// RFC 8448 §3: Handshake Secret from the ECDHE shared secret.
    #[test]
    fn rfc8448_handshake_secret() {
        let ks = sha256_schedule_with_rfc8448_shared();
        assert_eq!(
            ks.handshake_secret[..32],
            hex!("1dc826e93606aa6fdc0aadc12f741b01046aa6b99f691ed221a9f0ca043fbeac")
        );
    }

    /// RFC 8448 §3: client and server handshake traffic secrets.
    #[test]
    fn rfc8448_handshake_traffic_secrets() {
        let ks = sha256_schedule_with_rfc8448_shared();
        let transcript = HashOutput::from_slice(&hex!(
            "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8"
        ));
        let (client, server) = ks.handshake_traffic_secrets(&transcript).unwrap();
        assert_eq!(
            client.as_slice(),
            hex!("b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21")
        );
        assert_eq!(
            server.as_slice(),
            hex!("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38")
        );
    }

    /// RFC 8448 §3: Master Secret.
    #[test]
    fn rfc8448_master_secret() {
        let mut ks = sha256_schedule_with_rfc8448_shared();
        ks.derive_master_secret().unwrap();
        assert_eq!(
            ks.master_secret[..32],
            hex!("18df06843d13a08bf2a449844c5f8a478001bc4d4c627984d5a41da8d0402919")
        );
    }

    /// RFC 8448 §3: client and server application traffic secrets.
    #[test]
    fn rfc8448_app_traffic_secrets() {
        let mut ks = sha256_schedule_with_rfc8448_shared();
        ks.derive_master_secret().unwrap();

        let transcript = HashOutput::from_slice(&hex!(
            "9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13"
        ));
        let (client, server) = ks.app_traffic_secrets(&transcript).unwrap();
        assert_eq!(
            client.as_slice(),
            hex!("9e40646ce79a7f9dc05af8889bce6552875afa0b06df0087f792ebb7c17504a5")
        );
        assert_eq!(
            server.as_slice(),
            hex!("a11af9f05531f856ad47116b45a950328204b4f44bfb6b3a4b4f1f3fcb631643")
        );
    }

    /// RFC 8448 §3: server finished key.
    #[test]
    fn rfc8448_server_finished_key() {
        let ks = sha256_schedule_with_rfc8448_shared();
        let transcript = HashOutput::from_slice(&hex!(
            "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8"
        ));
        let (_, server) = ks.handshake_traffic_secrets(&transcript).unwrap();
        let finished_key = KeySchedule::finished_key(&server).unwrap();
        assert_eq!(
            finished_key.as_slice(),
            hex!("008d3b66f816ea559f96b537e885c31fc068bf492c652f01f288a1d8cdc19fc8")
        );
    }

    /// RFC 8448 §3: client finished key and verify_data.
    #[test]
    fn rfc8448_client_finished_verify_data() {
        let ks = sha256_schedule_with_rfc8448_shared();
        let ch_sh_transcript = HashOutput::from_slice(&hex!(
            "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8"
        ));
        let (client, _) = ks.handshake_traffic_secrets(&ch_sh_transcript).unwrap();
        let finished_key = KeySchedule::finished_key(&client).unwrap();
        assert_eq!(
            finished_key.as_slice(),
            hex!("b80ad01015fb2f0bd65ff7d4da5d6bf83f84821d1f87fdc7d3c75b5a7b42d9c4")
        );

        let transcript = HashOutput::from_slice(&hex!(
            "9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13"
        ));
        let verify_data = KeySchedule::finished_verify_data(&finished_key, &transcript);
        assert_eq!(
            verify_data.as_slice(),
            hex!("a8ec436d677634ae525ac1fcebe11a039ec17694fac6e98527b642f2edd5ce61")
        );
    }

    #[test]
    fn sha384_secrets_are_48_bytes() {
        let mut ks = KeySchedule::new(HashAlgorithm::Sha384);
        ks.derive_handshake_secret(&[0x42u8; 48]).unwrap();
        let transcript = HashAlgorithm::Sha384.empty_hash();
        let (client, server) = ks.handshake_traffic_secrets(&transcript).unwrap();
        assert_eq!(client.as_slice().len(), 48);
        assert_eq!(server.as_slice().len(), 48);
        assert_ne!(client.as_slice(), server.as_slice());
    }

    #[test]
    fn chain_links_are_wiped_after_master() {
        let mut ks = sha256_schedule_with_rfc8448_shared();
        assert!(!ks.handshake_secret_is_wiped());
        ks.derive_master_secret().unwrap();
        assert!(ks.handshake_secret_is_wiped());
        assert!(ks.early_secret.iter().all(|&b| b == 0));
    }
}
