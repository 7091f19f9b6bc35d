//! Request signing for the Redsys REST contract.
//!
//! The gateway authenticates each request with a per-order MAC key: the merchant secret decrypts
//! from Base64 into a 24-byte 3DES key, the decimal order id is encrypted under it (CBC, zero IV,
//! zero padding), and the ciphertext keys an HMAC-SHA256 over the Base64 parameters string.
//! The zero padding is mandated by the gateway; a PKCS#7 variant produces signatures it rejects.
//!
//! <https://pagosonline.redsys.es/desarrolladores-inicio/documentacion-operativa/autorizacion/>

use base64::{decode, decode_config, encode, URL_SAFE};
use hmac::{Hmac, Mac};
use openssl::symm::{encrypt, Cipher};
use sha2::Sha256;
use thiserror::Error;

/// The only signature scheme the gateway accepts for REST calls.
pub const SIGNATURE_VERSION: &str = "HMAC_SHA256_V1";

const DES_BLOCK_SIZE: usize = 8;
const TRIPLE_DES_KEY_LEN: usize = 24;

#[derive(Debug, Clone, Error)]
pub enum SignerError {
    #[error("merchant secret is not valid Base64: {0}")]
    InvalidSecret(String),
    #[error("merchant secret must decode to 24 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("order id cannot be empty")]
    EmptyOrder,
    #[error("3DES encryption failed: {0}")]
    Encryption(String),
    #[error("signature is not valid Base64: {0}")]
    InvalidSignature(String),
}

/// Computes the `Ds_Signature` value for a request.
///
/// `secret` is the Base64-encoded merchant secret as issued by the gateway, `parameters` the
/// Base64-encoded JSON merchant parameters, `order` the decimal order id. Pure and deterministic.
pub fn sign(secret: &str, parameters: &str, order: &str) -> Result<String, SignerError> {
    let mac = mac_for(secret, parameters, order)?;
    Ok(encode(mac.finalize().into_bytes()))
}

/// Verifies the signature of an inbound notification against the order id it carries.
///
/// Notifies use the URL-safe Base64 alphabet for the signature; direct replies use the standard
/// one. Both are accepted. The comparison is constant-time.
pub fn verify(secret: &str, parameters: &str, order: &str, signature: &str) -> Result<bool, SignerError> {
    let provided = decode_config(signature, URL_SAFE)
        .or_else(|_| decode(signature))
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    let mac = mac_for(secret, parameters, order)?;
    Ok(mac.verify_slice(&provided).is_ok())
}

fn mac_for(secret: &str, parameters: &str, order: &str) -> Result<Hmac<Sha256>, SignerError> {
    if order.is_empty() {
        return Err(SignerError::EmptyOrder);
    }
    let key = decode(secret).map_err(|e| SignerError::InvalidSecret(e.to_string()))?;
    if key.len() != TRIPLE_DES_KEY_LEN {
        return Err(SignerError::InvalidKeyLength(key.len()));
    }
    let derived = encrypt_3des(order.as_bytes(), &key)?;
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&derived).map_err(|e| SignerError::Encryption(e.to_string()))?;
    mac.update(parameters.as_bytes());
    Ok(mac)
}

/// 3DES-CBC with a zero IV and zero padding (append 0x00 to the next block boundary; nothing when
/// already aligned). The ciphertext is used as a MAC key, not for confidentiality.
fn encrypt_3des(plain: &[u8], key: &[u8]) -> Result<Vec<u8>, SignerError> {
    let iv = [0u8; DES_BLOCK_SIZE];
    let mut buffer = plain.to_vec();
    let pad = DES_BLOCK_SIZE - buffer.len() % DES_BLOCK_SIZE;
    if pad != DES_BLOCK_SIZE {
        buffer.resize(buffer.len() + pad, 0u8);
    }
    // openssl appends a PKCS#7 tail block of its own; the ciphertext of the zero-padded input is
    // the prefix, so the tail block is dropped.
    let encrypted = encrypt(Cipher::des_ede3_cbc(), key, Some(&iv), &buffer)
        .map_err(|e| SignerError::Encryption(e.to_string()))?;
    Ok(encrypted[..buffer.len()].to_vec())
}

#[cfg(test)]
mod test {
    use super::*;

    // Base64 of 24 zero bytes.
    const ZERO_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    // The secret published in the Redsys integration samples.
    const SAMPLE_SECRET: &str = "sq7HjrUOBfKmC576ILgskD5srU870gJ7";

    #[test]
    fn zero_key_vector() {
        let signature = sign(ZERO_SECRET, "", "1200").unwrap();
        assert_eq!(signature, "s+qmUMavev8e9WdBrlvk5SjsEzDiTtgwP2md1SS4jOc=");
    }

    #[test]
    fn sample_secret_vector() {
        // Base64 of the MIT parameter blob for order 1202; expected value computed with an
        // independent implementation of the gateway algorithm.
        let parameters = "eyJEU19NRVJDSEFOVF9BTU9VTlQiOiIxMDAwIiwiRFNfTUVSQ0hBTlRfT1JERVIiOiIxMjAyIiwiRFNf\
                          TUVSQ0hBTlRfSURFTlRJRklFUiI6ImExYjJjM2Q0ZTVmNmE3YjgiLCJEU19NRVJDSEFOVF9NRVJDSEFO\
                          VENPREUiOiI5OTkwMDg4ODEiLCJEU19NRVJDSEFOVF9DVVJSRU5DWSI6Ijk3OCIsIkRTX01FUkNIQU5U\
                          X1RSQU5TQUNUSU9OVFlQRSI6IjAiLCJEU19NRVJDSEFOVF9URVJNSU5BTCI6IjAwMSIsIkRTX01FUkNI\
                          QU5UX0RJUkVDVFBBWU1FTlQiOiJ0cnVlIiwiRFNfTUVSQ0hBTlRfRVhDRVBfU0NBIjoiTUlUIiwiRFNf\
                          TUVSQ0hBTlRfQ09GX0lOSSI6Ik4iLCJEU19NRVJDSEFOVF9DT0ZfVFlQRSI6IlIiLCJEU19NRVJDSEFO\
                          VF9DT0ZfVFhOSUQiOiIxMjM0NTY3ODkwMTIzNDU2Nzg5In0=";
        let signature = sign(SAMPLE_SECRET, parameters, "1202").unwrap();
        assert_eq!(signature, "QiSPqhuwinMgOxMCDU7PrUkpyGp5mOfMsjvREg4Mzfg=");
    }

    #[test]
    fn block_aligned_order_needs_no_padding() {
        // An eight-character order id fills the 3DES block exactly.
        let signature = sign(SAMPLE_SECRET, "abc", "12345678").unwrap();
        assert_eq!(signature, "dGjWJKPbthDab4JbBWVKsxnYVDhI69+iBOlyLKLzn0w=");
    }

    #[test]
    fn signing_is_deterministic() {
        let first = sign(SAMPLE_SECRET, "payload", "1234").unwrap();
        let second = sign(SAMPLE_SECRET, "payload", "1234").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_order_is_rejected() {
        assert!(matches!(sign(SAMPLE_SECRET, "abc", ""), Err(SignerError::EmptyOrder)));
    }

    #[test]
    fn invalid_secret_is_rejected() {
        assert!(matches!(sign("not base64 !!", "abc", "1200"), Err(SignerError::InvalidSecret(_))));
    }

    #[test]
    fn short_secret_is_rejected() {
        // "c2hvcnQ=" decodes to 5 bytes.
        assert!(matches!(sign("c2hvcnQ=", "abc", "1200"), Err(SignerError::InvalidKeyLength(5))));
    }

    #[test]
    fn verify_accepts_both_alphabets() {
        let signature = sign(SAMPLE_SECRET, "abc", "12345678").unwrap();
        assert!(verify(SAMPLE_SECRET, "abc", "12345678", &signature).unwrap());
        let url_safe = signature.replace('+', "-").replace('/', "_");
        assert!(verify(SAMPLE_SECRET, "abc", "12345678", &url_safe).unwrap());
    }

    #[test]
    fn verify_rejects_a_tampered_signature() {
        let signature = sign(SAMPLE_SECRET, "abc", "12345678").unwrap();
        assert!(!verify(SAMPLE_SECRET, "abc", "87654321", &signature).unwrap());
        assert!(!verify(SAMPLE_SECRET, "tampered", "12345678", &signature).unwrap());
    }
}
