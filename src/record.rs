//! TLS 1.3 record layer (RFC 8446 §5): framing, AEAD protection, and
//! per-direction sequence numbering.
//!
//! A protected record's inner payload is `plaintext ‖ content_type ‖
//! zero-padding`; the outer content type is always application_data and
//! the 5-byte header, exactly as emitted, is the AEAD associated data.

use zeroize::Zeroize;

use crate::alert::Alert;
use crate::buffer::OutputBuffer;
use crate::crypto::kdf::hkdf_expand_label;
use crate::crypto::{AeadCipher, CipherSuite, NONCE_SIZE, TAG_SIZE};
use crate::error::Error;
use crate::key_schedule::Secret;

/// Record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            _ => None,
        }
    }
}

/// Record header size.
pub const RECORD_HEADER_LEN: usize = 5;
/// Maximum plaintext fragment per record (RFC 8446 §5.1).
pub const MAX_PLAINTEXT: usize = 16384;
/// Maximum protected record payload (plaintext + type + padding + tag).
pub const MAX_CIPHERTEXT: usize = 16384 + 256;

/// A decoded 5-byte record header.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub length: usize,
}

/// Encode a record header into a 5-byte array.
pub fn encode_record_header(ct: ContentType, length: usize) -> [u8; RECORD_HEADER_LEN] {
    [
        ct as u8,
        0x03,
        0x03, // legacy_record_version
        (length >> 8) as u8,
        length as u8,
    ]
}

/// Decode and validate a record header.
///
/// An unknown content type is an unexpected_message; a declared length
/// beyond the protected-record ceiling is a decode_error.
pub fn decode_record_header(data: &[u8]) -> Result<RecordHeader, Error> {
    if data.len() < RECORD_HEADER_LEN {
        return Err(Error::SelfAlert(Alert::DecodeError));
    }
    let content_type =
        ContentType::from_u8(data[0]).ok_or(Error::SelfAlert(Alert::UnexpectedMessage))?;
    let length = ((data[3] as usize) << 8) | (data[4] as usize);
    if length > MAX_CIPHERTEXT {
        return Err(Error::SelfAlert(Alert::DecodeError));
    }
    Ok(RecordHeader {
        content_type,
        length,
    })
}

/// One direction of record protection within one key epoch.
///
/// Holds the AEAD state, the static IV derived from the traffic secret,
/// and the 64-bit sequence counter. A cipher is never rekeyed: epoch
/// changes replace the whole value, which restarts the counter at zero.
pub struct RecordCipher {
    cipher: AeadCipher,
    static_iv: [u8; NONCE_SIZE],
    seq: u64,
}

impl RecordCipher {
    /// Instantiate record protection from a traffic secret:
    /// key = HKDF-Expand-Label(secret, "key", "", key_size),
    /// iv  = HKDF-Expand-Label(secret, "iv", "", iv_size).
    pub fn new(suite: CipherSuite, secret: &Secret) -> Result<Self, Error> {
        let hash = suite.hash();
        let aead = suite.aead();

        let mut key = [0u8; 32];
        hkdf_expand_label(
            hash,
            secret.as_slice(),
            b"key",
            &[],
            &mut key[..aead.key_size()],
        )?;
        let mut static_iv = [0u8; NONCE_SIZE];
        hkdf_expand_label(hash, secret.as_slice(), b"iv", &[], &mut static_iv)?;

        let cipher = aead.new_cipher(&key[..aead.key_size()])?;
        key.zeroize();

        Ok(Self {
            cipher,
            static_iv,
            seq: 0,
        })
    }

    /// The next record's sequence number.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Per-record nonce: static IV XOR big-endian sequence, right-aligned.
    fn nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = self.static_iv;
        let seq_bytes = self.seq.to_be_bytes();
        for i in 0..8 {
            nonce[NONCE_SIZE - 8 + i] ^= seq_bytes[i];
        }
        nonce
    }

    /// Seal one record of `payload` (≤ [`MAX_PLAINTEXT`]) with the given
    /// inner content type, appending header and ciphertext to `out`.
    pub fn seal_record(
        &mut self,
        out: &mut OutputBuffer<'_>,
        inner_type: ContentType,
        payload: &[u8],
    ) -> Result<(), Error> {
        if payload.len() > MAX_PLAINTEXT {
            return Err(Error::Library);
        }
        let inner_len = payload.len() + 1;
        let outer_len = inner_len + TAG_SIZE;
        let header = encode_record_header(ContentType::ApplicationData, outer_len);

        out.reserve(RECORD_HEADER_LEN + outer_len)?;
        out.extend_from_slice(&header)?;
        let start = out.len();
        out.extend_from_slice(payload)?;
        out.push(inner_type as u8)?;
        out.extend_from_slice(&[0u8; TAG_SIZE])?;

        let nonce = self.nonce();
        let buf = &mut out.filled_mut()[start..];
        self.cipher.seal_in_place(&nonce, &header, buf, inner_len)?;
        self.seq += 1;
        Ok(())
    }

    /// Open one protected record in place. `payload` is the record body
    /// (ciphertext + tag) and `header` the 5 bytes it arrived under.
    ///
    /// Returns the stripped plaintext length and the inner content type.
    pub fn open_record(
        &mut self,
        header: &[u8; RECORD_HEADER_LEN],
        payload: &mut [u8],
    ) -> Result<(usize, ContentType), Error> {
        let nonce = self.nonce();
        let inner_len = self
            .cipher
            .open_in_place(&nonce, header, payload, payload.len())?;
        self.seq += 1;
        strip_inner_content_type(&payload[..inner_len])
    }
}

impl Drop for RecordCipher {
    fn drop(&mut self) {
        self.static_iv.zeroize();
        self.seq = 0;
    }
}

/// Locate the inner content type of decrypted record plaintext: the last
/// non-zero byte; everything before it is the delivered data. A record of
/// only padding carries no type and is rejected.
pub fn strip_inner_content_type(plaintext: &[u8]) -> Result<(usize, ContentType), Error> {
    let mut pos = plaintext.len();
    while pos > 0 && plaintext[pos - 1] == 0 {
        pos -= 1;
    }
    if pos == 0 {
        return Err(Error::SelfAlert(Alert::UnexpectedMessage));
    }
    let ct = ContentType::from_u8(plaintext[pos - 1])
        .ok_or(Error::SelfAlert(Alert::UnexpectedMessage))?;
    Ok((pos - 1, ct))
}

/// Seal a payload of any size into one or more records, fragmenting at
/// [`MAX_PLAINTEXT`]. An empty payload still produces one record.
pub fn seal_payload(
    cipher: &mut RecordCipher,
    out: &mut OutputBuffer<'_>,
    inner_type: ContentType,
    payload: &[u8],
) -> Result<(), Error> {
    let mut rest = payload;
    loop {
        let take = rest.len().min(MAX_PLAINTEXT);
        cipher.seal_record(out, inner_type, &rest[..take])?;
        rest = &rest[take..];
        if rest.is_empty() {
            return Ok(());
        }
    }
}

/// Write an unprotected record stream, fragmenting at [`MAX_PLAINTEXT`].
/// Only legal before the first handshake traffic secret is installed.
pub fn write_plaintext_records(
    out: &mut OutputBuffer<'_>,
    ct: ContentType,
    payload: &[u8],
) -> Result<(), Error> {
    let mut rest = payload;
    loop {
        let take = rest.len().min(MAX_PLAINTEXT);
        let header = encode_record_header(ct, take);
        out.reserve(RECORD_HEADER_LEN + take)?;
        out.extend_from_slice(&header)?;
        out.extend_from_slice(&rest[..take])?;
        rest = &rest[take..];
        if rest.is_empty() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_schedule::KeySchedule;

    fn test_secret(suite: CipherSuite, fill: u8) -> Secret {
        // Any digest-sized byte string works as a traffic secret.
        let hash = suite.hash();
        let mut ks = KeySchedule::new(hash);
        ks.derive_handshake_secret(&vec![fill; hash.digest_size()])
            .unwrap();
        let (client, _) = ks
            .handshake_traffic_secrets(&hash.empty_hash())
            .unwrap();
        client
    }

    fn cipher_pair(suite: CipherSuite) -> (RecordCipher, RecordCipher) {
        let secret = test_secret(suite, 0x42);
        (
            RecordCipher::new(suite, &secret).unwrap(),
            RecordCipher::new(suite, &secret).unwrap(),
        )
    }

    #[test]
    fn header_roundtrip() {
        let hdr = encode_record_header(ContentType::Handshake, 42);
        let parsed = decode_record_header(&hdr).unwrap();
        assert_eq!(parsed.content_type, ContentType::Handshake);
        assert_eq!(parsed.length, 42);
        assert_eq!(hdr[1], 0x03);
        assert_eq!(hdr[2], 0x03);
    }

    #[test]
    fn oversized_length_is_decode_error() {
        let hdr = encode_record_header(ContentType::ApplicationData, MAX_CIPHERTEXT + 1);
        assert_eq!(
            decode_record_header(&hdr).unwrap_err(),
            Error::SelfAlert(Alert::DecodeError)
        );
    }

    #[test]
    fn unknown_content_type_is_unexpected_message() {
        let data = [0xff, 0x03, 0x03, 0x00, 0x01];
        assert_eq!(
            decode_record_header(&data).unwrap_err(),
            Error::SelfAlert(Alert::UnexpectedMessage)
        );
    }

    #[test]
    fn truncated_header() {
        assert!(decode_record_header(&[0x17, 0x03, 0x03, 0x00]).is_err());
    }

    #[test]
    fn seal_open_roundtrip_all_suites() {
        for suite in [
            CipherSuite::Aes128GcmSha256,
            CipherSuite::Aes256GcmSha384,
            CipherSuite::ChaCha20Poly1305Sha256,
        ] {
            let (mut seal, mut open) = cipher_pair(suite);
            let mut scratch = [0u8; 256];
            let mut out = OutputBuffer::new(&mut scratch);
            seal.seal_record(&mut out, ContentType::ApplicationData, b"hello record")
                .unwrap();

            let wire = out.as_slice().to_vec();
            let hdr = decode_record_header(&wire).unwrap();
            assert_eq!(hdr.content_type, ContentType::ApplicationData);

            let header: [u8; 5] = wire[..5].try_into().unwrap();
            let mut payload = wire[5..].to_vec();
            let (len, ct) = open.open_record(&header, &mut payload).unwrap();
            assert_eq!(ct, ContentType::ApplicationData);
            assert_eq!(&payload[..len], b"hello record");
        }
    }

    #[test]
    fn sequence_numbers_start_at_zero_and_increment() {
        let (mut seal, mut open) = cipher_pair(CipherSuite::Aes128GcmSha256);
        assert_eq!(seal.sequence(), 0);

        for i in 0..5u64 {
            let mut scratch = [0u8; 128];
            let mut out = OutputBuffer::new(&mut scratch);
            seal.seal_record(&mut out, ContentType::ApplicationData, b"x")
                .unwrap();
            assert_eq!(seal.sequence(), i + 1);

            let wire = out.as_slice().to_vec();
            let header: [u8; 5] = wire[..5].try_into().unwrap();
            let mut payload = wire[5..].to_vec();
            open.open_record(&header, &mut payload).unwrap();
            assert_eq!(open.sequence(), i + 1);
        }
    }

    #[test]
    fn fresh_cipher_restarts_sequence() {
        let secret = test_secret(CipherSuite::Aes128GcmSha256, 0x55);
        let mut first = RecordCipher::new(CipherSuite::Aes128GcmSha256, &secret).unwrap();
        let mut scratch = [0u8; 128];
        let mut out = OutputBuffer::new(&mut scratch);
        first
            .seal_record(&mut out, ContentType::ApplicationData, b"a")
            .unwrap();
        assert_eq!(first.sequence(), 1);

        let replacement = RecordCipher::new(CipherSuite::Aes128GcmSha256, &secret).unwrap();
        assert_eq!(replacement.sequence(), 0);
    }

    #[test]
    fn out_of_sequence_open_fails() {
        let (mut seal, mut open) = cipher_pair(CipherSuite::ChaCha20Poly1305Sha256);
        let mut scratch = [0u8; 256];
        let mut out = OutputBuffer::new(&mut scratch);
        seal.seal_record(&mut out, ContentType::ApplicationData, b"one")
            .unwrap();
        seal.seal_record(&mut out, ContentType::ApplicationData, b"two")
            .unwrap();

        let wire = out.as_slice().to_vec();
        let first_len = RECORD_HEADER_LEN + decode_record_header(&wire).unwrap().length;
        // Skip the first record: nonce mismatch must be caught.
        let second = &wire[first_len..];
        let header: [u8; 5] = second[..5].try_into().unwrap();
        let mut payload = second[5..].to_vec();
        assert_eq!(
            open.open_record(&header, &mut payload).unwrap_err(),
            Error::SelfAlert(Alert::BadRecordMac)
        );
    }

    #[test]
    fn tampered_ciphertext_is_bad_record_mac() {
        let (mut seal, mut open) = cipher_pair(CipherSuite::Aes128GcmSha256);
        let mut scratch = [0u8; 128];
        let mut out = OutputBuffer::new(&mut scratch);
        seal.seal_record(&mut out, ContentType::ApplicationData, b"payload")
            .unwrap();

        let wire = out.as_slice().to_vec();
        let header: [u8; 5] = wire[..5].try_into().unwrap();
        let mut payload = wire[5..].to_vec();
        payload[3] ^= 0x40;
        assert_eq!(
            open.open_record(&header, &mut payload).unwrap_err(),
            Error::SelfAlert(Alert::BadRecordMac)
        );
    }

    #[test]
    fn padding_is_stripped() {
        assert_eq!(
            strip_inner_content_type(&[0x41, 0x42, 22, 0, 0, 0]).unwrap(),
            (2, ContentType::Handshake)
        );
        assert_eq!(
            strip_inner_content_type(&[23]).unwrap(),
            (0, ContentType::ApplicationData)
        );
    }

    #[test]
    fn all_padding_is_rejected() {
        assert_eq!(
            strip_inner_content_type(&[0, 0, 0, 0]).unwrap_err(),
            Error::SelfAlert(Alert::UnexpectedMessage)
        );
        assert!(strip_inner_content_type(&[]).is_err());
    }

    #[test]
    fn fragmentation_splits_large_payloads() {
        let (mut seal, mut open) = cipher_pair(CipherSuite::Aes128GcmSha256);
        let payload = vec![0x5Au8; MAX_PLAINTEXT + 100];
        let mut scratch = [0u8; 64];
        let mut out = OutputBuffer::new(&mut scratch);
        seal_payload(&mut seal, &mut out, ContentType::ApplicationData, &payload).unwrap();
        assert_eq!(seal.sequence(), 2);

        let mut wire = out.as_slice().to_vec();
        let mut recovered = Vec::new();
        while !wire.is_empty() {
            let hdr = decode_record_header(&wire).unwrap();
            let header: [u8; 5] = wire[..5].try_into().unwrap();
            let mut payload = wire[5..5 + hdr.length].to_vec();
            let (len, ct) = open.open_record(&header, &mut payload).unwrap();
            assert_eq!(ct, ContentType::ApplicationData);
            recovered.extend_from_slice(&payload[..len]);
            wire.drain(..5 + hdr.length);
        }
        assert_eq!(recovered, payload);
    }

    #[test]
    fn empty_payload_yields_one_record() {
        let (mut seal, mut open) = cipher_pair(CipherSuite::Aes128GcmSha256);
        let mut scratch = [0u8; 64];
        let mut out = OutputBuffer::new(&mut scratch);
        seal_payload(&mut seal, &mut out, ContentType::ApplicationData, &[]).unwrap();
        assert_eq!(seal.sequence(), 1);

        let wire = out.as_slice().to_vec();
        let header: [u8; 5] = wire[..5].try_into().unwrap();
        let mut payload = wire[5..].to_vec();
        let (len, ct) = open.open_record(&header, &mut payload).unwrap();
        assert_eq!(len, 0);
        assert_eq!(ct, ContentType::ApplicationData);
    }

    #[test]
    fn plaintext_records_fragment_too() {
        let payload = vec![1u8; MAX_PLAINTEXT + 1];
        let mut scratch = [0u8; 64];
        let mut out = OutputBuffer::new(&mut scratch);
        write_plaintext_records(&mut out, ContentType::Handshake, &payload).unwrap();

        let wire = out.as_slice();
        let first = decode_record_header(wire).unwrap();
        assert_eq!(first.length, MAX_PLAINTEXT);
        let second = decode_record_header(&wire[5 + first.length..]).unwrap();
        assert_eq!(second.length, 1);
        assert_eq!(wire.len(), 2 * RECORD_HEADER_LEN + MAX_PLAINTEXT + 1);
    }
}
