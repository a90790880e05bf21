//! HKDF and HMAC over the supported hash algorithms (RFC 5869, RFC 8446 §7.1).
//!
//! These are exposed publicly so the key schedule is recomputable by tests
//! and by callers that need raw derivations.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};

use crate::crypto::hash::{HashAlgorithm, HashOutput};
use crate::error::Error;

/// HKDF-Extract. `prk` must be `hash.digest_size()` bytes.
pub fn hkdf_extract(hash: HashAlgorithm, salt: &[u8], ikm: &[u8], prk: &mut [u8]) {
    debug_assert_eq!(prk.len(), hash.digest_size());
    match hash {
        HashAlgorithm::Sha256 => {
            let (out, _) = hkdf::Hkdf::<Sha256>::extract(Some(salt), ikm);
            prk.copy_from_slice(&out);
        }
        HashAlgorithm::Sha384 => {
            let (out, _) = hkdf::Hkdf::<Sha384>::extract(Some(salt), ikm);
            prk.copy_from_slice(&out);
        }
    }
}

/// HKDF-Expand.
pub fn hkdf_expand(hash: HashAlgorithm, prk: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), Error> {
    match hash {
        HashAlgorithm::Sha256 => {
            let hk = hkdf::Hkdf::<Sha256>::from_prk(prk).map_err(|_| Error::IncompatibleKey)?;
            hk.expand(info, okm).map_err(|_| Error::Library)
        }
        HashAlgorithm::Sha384 => {
            let hk = hkdf::Hkdf::<Sha384>::from_prk(prk).map_err(|_| Error::IncompatibleKey)?;
            hk.expand(info, okm).map_err(|_| Error::Library)
        }
    }
}

/// HKDF-Expand-Label (RFC 8446 §7.1).
///
/// HkdfLabel:
///   uint16 length = out.len()
///   opaque label<7..255> = "tls13 " + label
///   opaque context<0..255> = context
pub fn hkdf_expand_label(
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    out: &mut [u8],
) -> Result<(), Error> {
    const PREFIX: &[u8] = b"tls13 ";
    let full_label_len = PREFIX.len() + label.len();
    let info_len = 2 + 1 + full_label_len + 1 + context.len();

    // Longest case is a 12-byte label with a 64-byte transcript context.
    let mut info = [0u8; 96];
    if info_len > info.len() {
        return Err(Error::Library);
    }

    let out_len = out.len() as u16;
    info[0] = (out_len >> 8) as u8;
    info[1] = out_len as u8;
    info[2] = full_label_len as u8;
    info[3..3 + PREFIX.len()].copy_from_slice(PREFIX);
    info[3 + PREFIX.len()..3 + full_label_len].copy_from_slice(label);
    info[3 + full_label_len] = context.len() as u8;
    info[4 + full_label_len..4 + full_label_len + context.len()].copy_from_slice(context);

    hkdf_expand(hash, secret, &info[..info_len], out)
}

/// HMAC(key, data).
pub fn hmac(hash: HashAlgorithm, key: &[u8], data: &[u8]) -> HashOutput {
    match hash {
        HashAlgorithm::Sha256 => {
            let mut mac =
                <Hmac<Sha256> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
            mac.update(data);
            HashOutput::from_slice(&mac.finalize().into_bytes())
        }
        HashAlgorithm::Sha384 => {
            let mut mac =
                <Hmac<Sha384> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
            mac.update(data);
            HashOutput::from_slice(&mac.finalize().into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    /// RFC 5869 test case 1 (SHA-256).
    #[test]
    fn rfc5869_case1() {
        let ikm = hex!("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let salt = hex!("000102030405060708090a0b0c");
        let info = hex!("f0f1f2f3f4f5f6f7f8f9");

        let mut prk = [0u8; 32];
        hkdf_extract(HashAlgorithm::Sha256, &salt, &ikm, &mut prk);
        assert_eq!(
            prk,
            hex!("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5")
        );

        let mut okm = [0u8; 42];
        hkdf_expand(HashAlgorithm::Sha256, &prk, &info, &mut okm).unwrap();
        assert_eq!(
            okm,
            hex!(
                "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf"
                "34007208d5b887185865"
            )
        );
    }

    /// RFC 4231 test case 2: HMAC-SHA-256 and HMAC-SHA-384 with key "Jefe".
    #[test]
    fn rfc4231_case2() {
        let key = b"Jefe";
        let data = b"what do ya want for nothing?";

        assert_eq!(
            hmac(HashAlgorithm::Sha256, key, data).as_slice(),
            hex!("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
        );
        assert_eq!(
            hmac(HashAlgorithm::Sha384, key, data).as_slice(),
            hex!(
                "af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e"
                "8e2240ca5e69e2c78b3239ecfab21649"
            )
        );
    }

    /// RFC 8448 §3: Derive-Secret(early_secret, "derived", "") for SHA-256.
    #[test]
    fn rfc8448_derived_label() {
        let early_secret =
            hex!("33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a");
        let empty_hash = HashAlgorithm::Sha256.empty_hash();
        let mut out = [0u8; 32];
        hkdf_expand_label(
            HashAlgorithm::Sha256,
            &early_secret,
            b"derived",
            empty_hash.as_slice(),
            &mut out,
        )
        .unwrap();
        assert_eq!(
            out,
            hex!("6f2615a108c702c5678f54fc9dbab69716c076189c48250cebeac3576c3611ba")
        );
    }

    /// RFC 8448 §3: handshake write key/iv from the server traffic secret.
    #[test]
    fn rfc8448_key_iv_expansion() {
        let server_hs_traffic =
            hex!("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38");

        let mut key = [0u8; 16];
        hkdf_expand_label(HashAlgorithm::Sha256, &server_hs_traffic, b"key", &[], &mut key)
            .unwrap();
        assert_eq!(key, hex!("3fce516009c21727d0f2e4e86ee403bc"));

        let mut iv = [0u8; 12];
        hkdf_expand_label(HashAlgorithm::Sha256, &server_hs_traffic, b"iv", &[], &mut iv).unwrap();
        assert_eq!(iv, hex!("5d313eb2671276ee13000b30"));
    }

    #[test]
    fn oversized_label_is_rejected() {
        let mut out = [0u8; 32];
        let long = [0u8; 100];
        assert!(hkdf_expand_label(
            HashAlgorithm::Sha256,
            &[0u8; 32],
            &long,
            &[],
            &mut out
        )
        .is_err());
    }
}
