//! Extension encoding and decoding for ClientHello, ServerHello, and
//! EncryptedExtensions.
//!
//! Extension format: type (2 bytes) + length (2 bytes) + data. Unknown
//! extensions are ignored on parse; a strict endpoint tolerates what it
//! does not understand.

use alloc::vec::Vec;

use crate::alert::Alert;
use crate::crypto::NamedGroup;
use crate::error::Error;

const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
const EXT_KEY_SHARE: u16 = 0x0033;

/// TLS 1.3 on the wire in supported_versions.
pub const TLS13_VERSION: u16 = 0x0304;

/// Signature schemes advertised in signature_algorithms: ECDSA-P256-SHA256,
/// RSA-PSS-SHA256, Ed25519. The core never evaluates signatures itself;
/// the certificate callbacks pick from this list.
pub const SIGNATURE_SCHEMES: &[u16] = &[0x0403, 0x0804, 0x0807];

fn decode_error() -> Error {
    Error::SelfAlert(Alert::DecodeError)
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Append one extension header.
fn put_extension_header(out: &mut Vec<u8>, ext_type: u16, data_len: usize) {
    put_u16(out, ext_type);
    put_u16(out, data_len as u16);
}

// ---- encoding ----

/// Encode the ClientHello extension block.
///
/// `shares` carries one (group, public share) pair per prepared key
/// exchange, in registry preference order.
pub fn encode_client_hello_extensions(
    out: &mut Vec<u8>,
    server_name: Option<&str>,
    groups: &[NamedGroup],
    shares: &[(NamedGroup, Vec<u8>)],
) {
    // server_name: ServerNameList of one host_name entry.
    if let Some(name) = server_name {
        let name = name.as_bytes();
        put_extension_header(out, EXT_SERVER_NAME, 2 + 1 + 2 + name.len());
        put_u16(out, (1 + 2 + name.len()) as u16);
        out.push(0); // name_type = host_name
        put_u16(out, name.len() as u16);
        out.extend_from_slice(name);
    }

    // supported_versions: list of one, TLS 1.3.
    put_extension_header(out, EXT_SUPPORTED_VERSIONS, 3);
    out.push(2);
    put_u16(out, TLS13_VERSION);

    // supported_groups.
    put_extension_header(out, EXT_SUPPORTED_GROUPS, 2 + groups.len() * 2);
    put_u16(out, (groups.len() * 2) as u16);
    for g in groups {
        put_u16(out, g.to_u16());
    }

    // key_share: one KeyShareEntry per prepared group.
    let entries_len: usize = shares.iter().map(|(_, s)| 2 + 2 + s.len()).sum();
    put_extension_header(out, EXT_KEY_SHARE, 2 + entries_len);
    put_u16(out, entries_len as u16);
    for (group, share) in shares {
        put_u16(out, group.to_u16());
        put_u16(out, share.len() as u16);
        out.extend_from_slice(share);
    }

    // signature_algorithms.
    put_extension_header(
        out,
        EXT_SIGNATURE_ALGORITHMS,
        2 + SIGNATURE_SCHEMES.len() * 2,
    );
    put_u16(out, (SIGNATURE_SCHEMES.len() * 2) as u16);
    for &scheme in SIGNATURE_SCHEMES {
        put_u16(out, scheme);
    }
}

/// Encode the ServerHello extension block: the selected version and the
/// server's single key share.
pub fn encode_server_hello_extensions(out: &mut Vec<u8>, group: NamedGroup, share: &[u8]) {
    put_extension_header(out, EXT_SUPPORTED_VERSIONS, 2);
    put_u16(out, TLS13_VERSION);

    put_extension_header(out, EXT_KEY_SHARE, 2 + 2 + share.len());
    put_u16(out, group.to_u16());
    put_u16(out, share.len() as u16);
    out.extend_from_slice(share);
}

// ---- parsing ----

/// Walk an extension block, yielding (type, data) and validating framing.
fn for_each_extension<'a>(
    data: &'a [u8],
    mut f: impl FnMut(u16, &'a [u8]) -> Result<(), Error>,
) -> Result<(), Error> {
    let mut off = 0;
    while off < data.len() {
        if data.len() - off < 4 {
            return Err(decode_error());
        }
        let ext_type = u16::from_be_bytes([data[off], data[off + 1]]);
        let ext_len = u16::from_be_bytes([data[off + 2], data[off + 3]]) as usize;
        off += 4;
        if data.len() - off < ext_len {
            return Err(decode_error());
        }
        f(ext_type, &data[off..off + ext_len])?;
        off += ext_len;
    }
    Ok(())
}

/// Parsed ClientHello extensions.
#[derive(Debug)]
pub struct ClientHelloExtensions<'a> {
    pub server_name: Option<&'a str>,
    pub supports_tls13: bool,
    /// supported_groups code points, client preference order.
    pub groups: Vec<u16>,
    /// key_share entries: (group, public share).
    pub key_shares: Vec<(u16, &'a [u8])>,
    /// signature_algorithms code points.
    pub signature_algorithms: Vec<u16>,
}

pub fn parse_client_hello_extensions(data: &[u8]) -> Result<ClientHelloExtensions<'_>, Error> {
    let mut out = ClientHelloExtensions {
        server_name: None,
        supports_tls13: false,
        groups: Vec::new(),
        key_shares: Vec::new(),
        signature_algorithms: Vec::new(),
    };
    let mut seen_key_share = false;

    for_each_extension(data, |ext_type, ext| {
        match ext_type {
            EXT_SERVER_NAME => {
                if out.server_name.is_some() {
                    return Err(Error::SelfAlert(Alert::IllegalParameter));
                }
                // ServerNameList: length(2), then entries of type(1) + name(2+n).
                if ext.len() < 2 {
                    return Err(decode_error());
                }
                let list_len = u16::from_be_bytes([ext[0], ext[1]]) as usize;
                if 2 + list_len != ext.len() {
                    return Err(decode_error());
                }
                let mut rest = &ext[2..];
                while !rest.is_empty() {
                    if rest.len() < 3 {
                        return Err(decode_error());
                    }
                    let name_type = rest[0];
                    let name_len = u16::from_be_bytes([rest[1], rest[2]]) as usize;
                    if rest.len() - 3 < name_len {
                        return Err(decode_error());
                    }
                    if name_type == 0 {
                        let name = core::str::from_utf8(&rest[3..3 + name_len])
                            .map_err(|_| decode_error())?;
                        out.server_name = Some(name);
                    }
                    rest = &rest[3 + name_len..];
                }
            }
            EXT_SUPPORTED_VERSIONS => {
                // list_length(1) + versions.
                if ext.is_empty() {
                    return Err(decode_error());
                }
                let list_len = ext[0] as usize;
                if 1 + list_len != ext.len() || list_len % 2 != 0 {
                    return Err(decode_error());
                }
                for pair in ext[1..].chunks_exact(2) {
                    if u16::from_be_bytes([pair[0], pair[1]]) == TLS13_VERSION {
                        out.supports_tls13 = true;
                    }
                }
            }
            EXT_SUPPORTED_GROUPS => {
                if ext.len() < 2 {
                    return Err(decode_error());
                }
                let list_len = u16::from_be_bytes([ext[0], ext[1]]) as usize;
                if 2 + list_len != ext.len() || list_len % 2 != 0 {
                    return Err(decode_error());
                }
                for pair in ext[2..].chunks_exact(2) {
                    out.groups.push(u16::from_be_bytes([pair[0], pair[1]]));
                }
            }
            EXT_KEY_SHARE => {
                if seen_key_share {
                    return Err(Error::SelfAlert(Alert::IllegalParameter));
                }
                seen_key_share = true;
                if ext.len() < 2 {
                    return Err(decode_error());
                }
                let list_len = u16::from_be_bytes([ext[0], ext[1]]) as usize;
                if 2 + list_len != ext.len() {
                    return Err(decode_error());
                }
                let mut rest = &ext[2..];
                while !rest.is_empty() {
                    if rest.len() < 4 {
                        return Err(decode_error());
                    }
                    let group = u16::from_be_bytes([rest[0], rest[1]]);
                    let share_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
                    if rest.len() - 4 < share_len {
                        return Err(decode_error());
                    }
                    out.key_shares.push((group, &rest[4..4 + share_len]));
                    rest = &rest[4 + share_len..];
                }
            }
            EXT_SIGNATURE_ALGORITHMS => {
                if ext.len() < 2 {
                    return Err(decode_error());
                }
                let list_len = u16::from_be_bytes([ext[0], ext[1]]) as usize;
                if 2 + list_len != ext.len() || list_len % 2 != 0 {
                    return Err(decode_error());
                }
                for pair in ext[2..].chunks_exact(2) {
                    out.signature_algorithms
                        .push(u16::from_be_bytes([pair[0], pair[1]]));
                }
            }
            _ => {} // ignore unknown extensions
        }
        Ok(())
    })?;

    Ok(out)
}

/// Parsed ServerHello extensions.
pub struct ServerHelloExtensions<'a> {
    /// Selected version from supported_versions; 0 when absent.
    pub selected_version: u16,
    /// The server's key share: (group, public share).
    pub key_share: Option<(u16, &'a [u8])>,
}

pub fn parse_server_hello_extensions(data: &[u8]) -> Result<ServerHelloExtensions<'_>, Error> {
    let mut out = ServerHelloExtensions {
        selected_version: 0,
        key_share: None,
    };

    for_each_extension(data, |ext_type, ext| {
        match ext_type {
            EXT_SUPPORTED_VERSIONS => {
                // ServerHello carries just the selected version.
                if ext.len() != 2 {
                    return Err(decode_error());
                }
                out.selected_version = u16::from_be_bytes([ext[0], ext[1]]);
            }
            EXT_KEY_SHARE => {
                if out.key_share.is_some() {
                    return Err(Error::SelfAlert(Alert::IllegalParameter));
                }
                if ext.len() < 4 {
                    return Err(decode_error());
                }
                let group = u16::from_be_bytes([ext[0], ext[1]]);
                let share_len = u16::from_be_bytes([ext[2], ext[3]]) as usize;
                if 4 + share_len != ext.len() {
                    return Err(decode_error());
                }
                out.key_share = Some((group, &ext[4..]));
            }
            _ => {} // ignore unknown extensions
        }
        Ok(())
    })?;

    Ok(out)
}

/// Validate an EncryptedExtensions block. Nothing in it is consumed by
/// this endpoint; unknown entries are tolerated, malformed framing is not.
pub fn parse_encrypted_extensions_data(data: &[u8]) -> Result<(), Error> {
    for_each_extension(data, |_, _| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_shares() -> Vec<(NamedGroup, Vec<u8>)> {
        vec![
            (NamedGroup::X25519, vec![0xAA; 32]),
            (NamedGroup::Secp256r1, vec![0xBB; 65]),
        ]
    }

    #[test]
    fn client_hello_extensions_roundtrip() {
        let mut out = Vec::new();
        encode_client_hello_extensions(
            &mut out,
            Some("example.com"),
            &[NamedGroup::X25519, NamedGroup::Secp256r1],
            &sample_shares(),
        );

        let parsed = parse_client_hello_extensions(&out).unwrap();
        assert_eq!(parsed.server_name, Some("example.com"));
        assert!(parsed.supports_tls13);
        assert_eq!(parsed.groups, [29, 23]);
        assert_eq!(parsed.key_shares.len(), 2);
        assert_eq!(parsed.key_shares[0].0, 29);
        assert_eq!(parsed.key_shares[0].1, &[0xAA; 32]);
        assert_eq!(parsed.key_shares[1].0, 23);
        assert_eq!(parsed.key_shares[1].1.len(), 65);
        assert_eq!(parsed.signature_algorithms, SIGNATURE_SCHEMES);
    }

    #[test]
    fn client_hello_extensions_without_sni() {
        let mut out = Vec::new();
        encode_client_hello_extensions(&mut out, None, &[NamedGroup::X25519], &sample_shares()[..1]);
        let parsed = parse_client_hello_extensions(&out).unwrap();
        assert_eq!(parsed.server_name, None);
        assert!(parsed.supports_tls13);
    }

    #[test]
    fn unknown_extensions_are_ignored() {
        let mut out = Vec::new();
        // Unknown extension 0xffaa first, then a real block.
        put_extension_header(&mut out, 0xffaa, 3);
        out.extend_from_slice(&[1, 2, 3]);
        encode_client_hello_extensions(&mut out, None, &[NamedGroup::X25519], &sample_shares()[..1]);
        put_extension_header(&mut out, 0x1234, 0);

        let parsed = parse_client_hello_extensions(&out).unwrap();
        assert!(parsed.supports_tls13);
        assert_eq!(parsed.key_shares.len(), 1);
    }

    #[test]
    fn truncated_extension_block_rejected() {
        let mut out = Vec::new();
        encode_client_hello_extensions(&mut out, None, &[NamedGroup::X25519], &sample_shares()[..1]);
        out.truncate(out.len() - 1);
        assert!(parse_client_hello_extensions(&out).is_err());
    }

    #[test]
    fn duplicate_key_share_rejected() {
        let mut out = Vec::new();
        let shares = sample_shares();
        encode_client_hello_extensions(&mut out, None, &[NamedGroup::X25519], &shares[..1]);
        // Append a second key_share extension.
        put_extension_header(&mut out, EXT_KEY_SHARE, 2 + 2 + 2 + 32);
        put_u16(&mut out, (2 + 2 + 32) as u16);
        put_u16(&mut out, 29);
        put_u16(&mut out, 32);
        out.extend_from_slice(&[0xCC; 32]);

        assert_eq!(
            parse_client_hello_extensions(&out).unwrap_err(),
            Error::SelfAlert(Alert::IllegalParameter)
        );
    }

    #[test]
    fn server_hello_extensions_roundtrip() {
        let mut out = Vec::new();
        encode_server_hello_extensions(&mut out, NamedGroup::X25519, &[0x42; 32]);
        let parsed = parse_server_hello_extensions(&out).unwrap();
        assert_eq!(parsed.selected_version, TLS13_VERSION);
        let (group, share) = parsed.key_share.unwrap();
        assert_eq!(group, 29);
        assert_eq!(share, &[0x42; 32]);
    }

    #[test]
    fn server_hello_extensions_missing_fields() {
        let parsed = parse_server_hello_extensions(&[]).unwrap();
        assert_eq!(parsed.selected_version, 0);
        assert!(parsed.key_share.is_none());
    }

    #[test]
    fn server_hello_key_share_length_mismatch() {
        let mut out = Vec::new();
        put_extension_header(&mut out, EXT_KEY_SHARE, 4 + 32);
        put_u16(&mut out, 29);
        put_u16(&mut out, 31); // claims 31, carries 32
        out.extend_from_slice(&[0u8; 32]);
        assert!(parse_server_hello_extensions(&out).is_err());
    }

    #[test]
    fn encrypted_extensions_data_validation() {
        assert!(parse_encrypted_extensions_data(&[]).is_ok());

        let mut out = Vec::new();
        put_extension_header(&mut out, 0xff01, 2);
        out.extend_from_slice(&[0, 1]);
        assert!(parse_encrypted_extensions_data(&out).is_ok());

        assert!(parse_encrypted_extensions_data(&[0x00]).is_err());
        assert!(parse_encrypted_extensions_data(&[0x00, 0x01, 0x00, 0x05, 0x00]).is_err());
    }
}
