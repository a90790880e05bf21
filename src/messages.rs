//! Handshake message encoding and decoding.
//!
//! Handshake message format:
//!   HandshakeType (1 byte)
//!   Length (3 bytes, big-endian)
//!   Body (Length bytes)
//!
//! Parsers take the message body (after the 4-byte header), borrow from it,
//! and reject trailing bytes.

use alloc::vec::Vec;

use crate::alert::Alert;
use crate::crypto::CipherSuite;
use crate::error::Error;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    EncryptedExtensions = 8,
    Certificate = 11,
    CertificateRequest = 13,
    CertificateVerify = 15,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            8 => Some(Self::EncryptedExtensions),
            11 => Some(Self::Certificate),
            13 => Some(Self::CertificateRequest),
            15 => Some(Self::CertificateVerify),
            20 => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Handshake header length (type + 24-bit body length).
pub const HANDSHAKE_HEADER_LEN: usize = 4;

fn decode_error() -> Error {
    Error::SelfAlert(Alert::DecodeError)
}

/// Read a handshake header: returns (type byte, body length).
pub fn read_handshake_header(data: &[u8]) -> Result<(u8, usize), Error> {
    if data.len() < HANDSHAKE_HEADER_LEN {
        return Err(decode_error());
    }
    let msg_type = data[0];
    let length = ((data[1] as usize) << 16) | ((data[2] as usize) << 8) | (data[3] as usize);
    Ok((msg_type, length))
}

// ---- encoding helpers ----

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u24(out: &mut Vec<u8>, v: usize) {
    out.push((v >> 16) as u8);
    out.push((v >> 8) as u8);
    out.push(v as u8);
}

/// Append a handshake header with a placeholder length; returns the offset
/// to pass to [`end_message`].
fn begin_message(out: &mut Vec<u8>, msg_type: HandshakeType) -> usize {
    out.push(msg_type as u8);
    out.extend_from_slice(&[0, 0, 0]);
    out.len()
}

/// Patch the 24-bit body length written by [`begin_message`].
fn end_message(out: &mut Vec<u8>, body_start: usize) {
    let body_len = out.len() - body_start;
    out[body_start - 3] = (body_len >> 16) as u8;
    out[body_start - 2] = (body_len >> 8) as u8;
    out[body_start - 1] = body_len as u8;
}

// ---- parsing cursor ----

struct Cursor<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.data.len() - self.off < n {
            return Err(decode_error());
        }
        let s = &self.data[self.off..self.off + n];
        self.off += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<usize, Error> {
        let b = self.take(3)?;
        Ok(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | (b[2] as usize))
    }

    fn vec8(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    fn vec16(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn vec24(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u24()?;
        self.take(len)
    }

    fn finish(&self) -> Result<(), Error> {
        if self.off != self.data.len() {
            return Err(decode_error());
        }
        Ok(())
    }
}

// ---- ClientHello ----

/// Parsed ClientHello body.
#[derive(Debug)]
pub struct ClientHello<'a> {
    pub random: &'a [u8; 32],
    pub session_id: &'a [u8],
    /// Raw cipher suite list: pairs of big-endian bytes.
    pub cipher_suites: &'a [u8],
    pub extensions: &'a [u8],
}

/// Encode a ClientHello (legacy version 0x0303, null compression).
pub fn encode_client_hello(
    out: &mut Vec<u8>,
    random: &[u8; 32],
    session_id: &[u8],
    cipher_suites: &[CipherSuite],
    extensions: &[u8],
) {
    let body = begin_message(out, HandshakeType::ClientHello);
    put_u16(out, 0x0303);
    out.extend_from_slice(random);
    out.push(session_id.len() as u8);
    out.extend_from_slice(session_id);
    put_u16(out, (cipher_suites.len() * 2) as u16);
    for cs in cipher_suites {
        put_u16(out, cs.to_u16());
    }
    // Compression methods: one entry, null.
    out.push(1);
    out.push(0);
    put_u16(out, extensions.len() as u16);
    out.extend_from_slice(extensions);
    end_message(out, body);
}

pub fn parse_client_hello(body: &[u8]) -> Result<ClientHello<'_>, Error> {
    let mut cur = Cursor::new(body);
    let version = cur.u16()?;
    if version != 0x0303 {
        return Err(Error::SelfAlert(Alert::IllegalParameter));
    }
    let random: &[u8; 32] = cur.take(32)?.try_into().map_err(|_| decode_error())?;
    let session_id = cur.vec8()?;
    if session_id.len() > 32 {
        return Err(decode_error());
    }
    let cipher_suites = cur.vec16()?;
    if cipher_suites.is_empty() || cipher_suites.len() % 2 != 0 {
        return Err(decode_error());
    }
    let compression = cur.vec8()?;
    // TLS 1.3 requires exactly the null method.
    if compression != [0] {
        return Err(Error::SelfAlert(Alert::IllegalParameter));
    }
    let extensions = cur.vec16()?;
    cur.finish()?;
    Ok(ClientHello {
        random,
        session_id,
        cipher_suites,
        extensions,
    })
}

/// Iterate the raw cipher-suite list as u16 code points.
pub fn iter_cipher_suites(data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
}

// ---- ServerHello ----

/// Parsed ServerHello body. The cipher suite is kept raw so the caller can
/// distinguish "unknown code point" from "known but not offered".
pub struct ServerHello<'a> {
    pub random: &'a [u8; 32],
    pub session_id: &'a [u8],
    pub cipher_suite: u16,
    pub extensions: &'a [u8],
}

pub fn encode_server_hello(
    out: &mut Vec<u8>,
    random: &[u8; 32],
    session_id: &[u8],
    cipher_suite: CipherSuite,
    extensions: &[u8],
) {
    let body = begin_message(out, HandshakeType::ServerHello);
    put_u16(out, 0x0303);
    out.extend_from_slice(random);
    out.push(session_id.len() as u8);
    out.extend_from_slice(session_id);
    put_u16(out, cipher_suite.to_u16());
    out.push(0); // null compression
    put_u16(out, extensions.len() as u16);
    out.extend_from_slice(extensions);
    end_message(out, body);
}

pub fn parse_server_hello(body: &[u8]) -> Result<ServerHello<'_>, Error> {
    let mut cur = Cursor::new(body);
    let version = cur.u16()?;
    if version != 0x0303 {
        return Err(Error::SelfAlert(Alert::IllegalParameter));
    }
    let random: &[u8; 32] = cur.take(32)?.try_into().map_err(|_| decode_error())?;
    let session_id = cur.vec8()?;
    let cipher_suite = cur.u16()?;
    let compression = cur.u8()?;
    if compression != 0 {
        return Err(Error::SelfAlert(Alert::IllegalParameter));
    }
    let extensions = cur.vec16()?;
    cur.finish()?;
    Ok(ServerHello {
        random,
        session_id,
        cipher_suite,
        extensions,
    })
}

// ---- EncryptedExtensions ----

pub fn encode_encrypted_extensions(out: &mut Vec<u8>, extensions: &[u8]) {
    let body = begin_message(out, HandshakeType::EncryptedExtensions);
    put_u16(out, extensions.len() as u16);
    out.extend_from_slice(extensions);
    end_message(out, body);
}

/// Returns the raw extensions list.
pub fn parse_encrypted_extensions(body: &[u8]) -> Result<&[u8], Error> {
    let mut cur = Cursor::new(body);
    let extensions = cur.vec16()?;
    cur.finish()?;
    Ok(extensions)
}

// ---- Certificate ----

/// Parsed Certificate body.
pub struct CertificatePayload<'a> {
    /// Certificate request context (empty for server certificates).
    pub context: &'a [u8],
    /// Raw CertificateEntry list.
    pub entries: &'a [u8],
}

/// One entry of the certificate list.
pub struct CertificateEntry<'a> {
    /// DER-encoded certificate.
    pub cert_data: &'a [u8],
    pub extensions: &'a [u8],
}

/// Encode a Certificate message carrying the whole chain, end-entity first.
pub fn encode_certificate(out: &mut Vec<u8>, chain: &[Vec<u8>]) {
    let body = begin_message(out, HandshakeType::Certificate);
    out.push(0); // empty certificate_request_context
    let mut list_len = 0;
    for cert in chain {
        list_len += 3 + cert.len() + 2;
    }
    put_u24(out, list_len);
    for cert in chain {
        put_u24(out, cert.len());
        out.extend_from_slice(cert);
        put_u16(out, 0); // no per-entry extensions
    }
    end_message(out, body);
}

pub fn parse_certificate(body: &[u8]) -> Result<CertificatePayload<'_>, Error> {
    let mut cur = Cursor::new(body);
    let context = cur.vec8()?;
    let entries = cur.vec24()?;
    cur.finish()?;
    Ok(CertificatePayload { context, entries })
}

/// Iterate the entries of a certificate list.
pub fn iter_certificate_entries(
    mut data: &[u8],
) -> impl Iterator<Item = Result<CertificateEntry<'_>, Error>> + '_ {
    core::iter::from_fn(move || {
        if data.is_empty() {
            return None;
        }
        let mut cur = Cursor::new(data);
        let entry = (|| {
            let cert_data = cur.vec24()?;
            let extensions = cur.vec16()?;
            Ok(CertificateEntry {
                cert_data,
                extensions,
            })
        })();
        match entry {
            Ok(e) => {
                data = &data[cur.off..];
                Some(Ok(e))
            }
            Err(err) => {
                data = &[];
                Some(Err(err))
            }
        }
    })
}

// ---- CertificateVerify ----

pub struct CertificateVerify<'a> {
    /// Signature scheme code point.
    pub algorithm: u16,
    pub signature: &'a [u8],
}

pub fn encode_certificate_verify(out: &mut Vec<u8>, algorithm: u16, signature: &[u8]) {
    let body = begin_message(out, HandshakeType::CertificateVerify);
    put_u16(out, algorithm);
    put_u16(out, signature.len() as u16);
    out.extend_from_slice(signature);
    end_message(out, body);
}

pub fn parse_certificate_verify(body: &[u8]) -> Result<CertificateVerify<'_>, Error> {
    let mut cur = Cursor::new(body);
    let algorithm = cur.u16()?;
    let signature = cur.vec16()?;
    cur.finish()?;
    Ok(CertificateVerify {
        algorithm,
        signature,
    })
}

// ---- Finished ----

pub fn encode_finished(out: &mut Vec<u8>, verify_data: &[u8]) {
    let body = begin_message(out, HandshakeType::Finished);
    out.extend_from_slice(verify_data);
    end_message(out, body);
}

/// The Finished body is exactly one digest of the negotiated hash.
pub fn parse_finished(body: &[u8], digest_size: usize) -> Result<&[u8], Error> {
    if body.len() != digest_size {
        return Err(decode_error());
    }
    Ok(body)
}
