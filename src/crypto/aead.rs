//! AEAD capability: in-place seal/open over the closed cipher set.

use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;

use crate::error::Error;

/// AEAD tag length; 16 for every supported cipher.
pub const TAG_SIZE: usize = 16;
/// AEAD nonce length; 12 for every supported cipher.
pub const NONCE_SIZE: usize = 12;

/// AEAD algorithms used by the supported cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    /// Key size in bytes.
    pub fn key_size(self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm | AeadAlgorithm::ChaCha20Poly1305 => 32,
        }
    }

    /// IV size in bytes.
    pub fn iv_size(self) -> usize {
        NONCE_SIZE
    }

    /// Tag size in bytes.
    pub fn tag_size(self) -> usize {
        TAG_SIZE
    }

    /// Instantiate a cipher from raw key bytes.
    pub fn new_cipher(self, key: &[u8]) -> Result<AeadCipher, Error> {
        use aes_gcm::KeyInit;
        if key.len() != self.key_size() {
            return Err(Error::IncompatibleKey);
        }
        let cipher = match self {
            AeadAlgorithm::Aes128Gcm => AeadCipher::Aes128Gcm(
                Aes128Gcm::new_from_slice(key).map_err(|_| Error::IncompatibleKey)?,
            ),
            AeadAlgorithm::Aes256Gcm => AeadCipher::Aes256Gcm(
                Aes256Gcm::new_from_slice(key).map_err(|_| Error::IncompatibleKey)?,
            ),
            AeadAlgorithm::ChaCha20Poly1305 => AeadCipher::ChaCha20Poly1305(
                ChaCha20Poly1305::new_from_slice(key).map_err(|_| Error::IncompatibleKey)?,
            ),
        };
        Ok(cipher)
    }
}

/// An instantiated AEAD cipher. Key material lives inside the backend
/// cipher state and is wiped when the value is dropped.
pub enum AeadCipher {
    Aes128Gcm(Aes128Gcm),
    Aes256Gcm(Aes256Gcm),
    ChaCha20Poly1305(ChaCha20Poly1305),
}

impl core::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            AeadCipher::Aes128Gcm(_) => "Aes128Gcm",
            AeadCipher::Aes256Gcm(_) => "Aes256Gcm",
            AeadCipher::ChaCha20Poly1305(_) => "ChaCha20Poly1305",
        };
        f.debug_tuple(name).field(&"<redacted>").finish()
    }
}

impl AeadCipher {
    pub fn algorithm(&self) -> AeadAlgorithm {
        match self {
            AeadCipher::Aes128Gcm(_) => AeadAlgorithm::Aes128Gcm,
            AeadCipher::Aes256Gcm(_) => AeadAlgorithm::Aes256Gcm,
            AeadCipher::ChaCha20Poly1305(_) => AeadAlgorithm::ChaCha20Poly1305,
        }
    }

    /// Encrypt in place.
    ///
    /// `buf[..payload_len]` holds the plaintext and the buffer must have
    /// room for the tag. Returns the total ciphertext length.
    pub fn seal_in_place(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error> {
        use aes_gcm::aead::AeadInPlace;

        let total = payload_len + TAG_SIZE;
        if buf.len() < total {
            return Err(Error::Library);
        }

        let tag = match self {
            AeadCipher::Aes128Gcm(c) => c
                .encrypt_in_place_detached(nonce.into(), aad, &mut buf[..payload_len])
                .map_err(|_| Error::Library)?,
            AeadCipher::Aes256Gcm(c) => c
                .encrypt_in_place_detached(nonce.into(), aad, &mut buf[..payload_len])
                .map_err(|_| Error::Library)?,
            AeadCipher::ChaCha20Poly1305(c) => c
                .encrypt_in_place_detached(nonce.into(), aad, &mut buf[..payload_len])
                .map_err(|_| Error::Library)?,
        };
        buf[payload_len..total].copy_from_slice(&tag);
        Ok(total)
    }

    /// Decrypt in place.
    ///
    /// `buf[..ciphertext_len]` holds ciphertext plus tag. Returns the
    /// plaintext length; an authentication failure is surfaced as a
    /// bad_record_mac alert.
    pub fn open_in_place(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        buf: &mut [u8],
        ciphertext_len: usize,
    ) -> Result<usize, Error> {
        use aes_gcm::aead::AeadInPlace;
        use aes_gcm::Tag;

        if ciphertext_len < TAG_SIZE || buf.len() < ciphertext_len {
            return Err(Error::SelfAlert(crate::alert::Alert::BadRecordMac));
        }
        let payload_len = ciphertext_len - TAG_SIZE;
        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(&buf[payload_len..ciphertext_len]);

        let result = match self {
            AeadCipher::Aes128Gcm(c) => c.decrypt_in_place_detached(
                nonce.into(),
                aad,
                &mut buf[..payload_len],
                &Tag::from(tag_bytes),
            ),
            AeadCipher::Aes256Gcm(c) => c.decrypt_in_place_detached(
                nonce.into(),
                aad,
                &mut buf[..payload_len],
                &Tag::from(tag_bytes),
            ),
            AeadCipher::ChaCha20Poly1305(c) => c.decrypt_in_place_detached(
                nonce.into(),
                aad,
                &mut buf[..payload_len],
                &chacha20poly1305::Tag::from(tag_bytes),
            ),
        };
        result.map_err(|_| Error::SelfAlert(crate::alert::Alert::BadRecordMac))?;
        Ok(payload_len)
    }
}
