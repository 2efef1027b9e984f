//! Client-side key tooling: key pair generation and challenge signing.
//!
//! secp256k1 keys use bare PEM blocks (`SECP256K1 PRIVATE KEY` holds the
//! 32-byte scalar, `SECP256K1 PUBLIC KEY` the 65-byte uncompressed point).
//! RSA keys use PKCS#8 / SPKI.

use crate::auth::verify::{KeyFamily, SECP256K1_PUBLIC_LABEL};
use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature as EcdsaSignature, SigningKey};
use pem_rfc7468::LineEnding;
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey},
    rand_core::OsRng,
    Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

pub const SECP256K1_PRIVATE_LABEL: &str = "SECP256K1 PRIVATE KEY";

const RSA_BITS: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Unsupported private key PEM label: {0}")]
    UnsupportedLabel(String),

    #[error("Malformed key: {0}")]
    Malformed(String),

    #[error("Key operation failed: {0}")]
    Crypto(String),
}

/// A freshly generated key pair, both halves PEM-encoded.
pub struct GeneratedKeyPair {
    pub family: KeyFamily,
    pub private_pem: Zeroizing<String>,
    pub public_pem: String,
}

/// A parsed private key.
pub enum SigningKeyPair {
    Rsa(RsaPrivateKey),
    EcdsaSecp256k1(SigningKey),
}

impl SigningKeyPair {
    /// Parse a private key from PEM.
    ///
    /// Accepts `SECP256K1 PRIVATE KEY`, PKCS#8 `PRIVATE KEY` (RSA or
    /// secp256k1), PKCS#1 `RSA PRIVATE KEY`, and SEC1 `EC PRIVATE KEY`.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let (label, der) = pem_rfc7468::decode_vec(pem.trim().as_bytes())
            .map_err(|e| KeyError::Malformed(format!("PEM decode: {}", e)))?;
        let der = Zeroizing::new(der);

        match label {
            SECP256K1_PRIVATE_LABEL => SigningKey::from_slice(&der)
                .map(SigningKeyPair::EcdsaSecp256k1)
                .map_err(|e| KeyError::Malformed(format!("secp256k1 scalar: {}", e))),
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(&der)
                .map(SigningKeyPair::Rsa)
                .map_err(|e| KeyError::Malformed(format!("PKCS#1: {}", e))),
            "EC PRIVATE KEY" => k256::SecretKey::from_sec1_der(&der)
                .map(|secret| SigningKeyPair::EcdsaSecp256k1(SigningKey::from(secret)))
                .map_err(|e| KeyError::Malformed(format!("SEC1: {}", e))),
            "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_der(&der)
                .map(SigningKeyPair::Rsa)
                .or_else(|_| SigningKey::from_pkcs8_der(&der).map(SigningKeyPair::EcdsaSecp256k1))
                .map_err(|e| KeyError::Malformed(format!("PKCS#8: {}", e))),
            other => Err(KeyError::UnsupportedLabel(other.to_string())),
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            SigningKeyPair::Rsa(_) => KeyFamily::Rsa,
            SigningKeyPair::EcdsaSecp256k1(_) => KeyFamily::EcdsaSecp256k1,
        }
    }

    /// Sign `SHA256(nonce_hex)` the way the server verifies it.
    ///
    /// secp256k1 signatures come out as 64 bytes, `r || s`.
    pub fn sign(&self, nonce_hex: &str) -> Result<Vec<u8>, KeyError> {
        let digest = Sha256::digest(nonce_hex.as_bytes());

        match self {
            SigningKeyPair::Rsa(key) => key
                .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                .map_err(|e| KeyError::Crypto(e.to_string())),
            SigningKeyPair::EcdsaSecp256k1(key) => {
                let signature: EcdsaSignature = key
                    .sign_prehash(&digest)
                    .map_err(|e| KeyError::Crypto(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// PEM of the matching public key.
    pub fn public_pem(&self) -> Result<String, KeyError> {
        match self {
            SigningKeyPair::Rsa(key) => RsaPublicKey::from(key)
                .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
                .map_err(|e| KeyError::Crypto(e.to_string())),
            SigningKeyPair::EcdsaSecp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                pem_rfc7468::encode_string(SECP256K1_PUBLIC_LABEL, LineEnding::LF, point.as_bytes())
                    .map_err(|e| KeyError::Crypto(e.to_string()))
            }
        }
    }
}

/// Generate a new key pair.
pub fn generate(family: KeyFamily) -> Result<GeneratedKeyPair, KeyError> {
    let (private_pem, key) = match family {
        KeyFamily::EcdsaSecp256k1 => {
            let key = SigningKey::random(&mut OsRng);
            let scalar = Zeroizing::new(key.to_bytes());
            let pem = pem_rfc7468::encode_string(SECP256K1_PRIVATE_LABEL, LineEnding::LF, &scalar)
                .map_err(|e| KeyError::Crypto(e.to_string()))?;
            (Zeroizing::new(pem), SigningKeyPair::EcdsaSecp256k1(key))
        }
        KeyFamily::Rsa => {
            let key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
                .map_err(|e| KeyError::Crypto(e.to_string()))?;
            let pem = key
                .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
                .map_err(|e| KeyError::Crypto(e.to_string()))?;
            (pem, SigningKeyPair::Rsa(key))
        }
    };

    Ok(GeneratedKeyPair {
        family,
        public_pem: key.public_pem()?,
        private_pem,
    })
}

/// Parse `private_pem` and sign the challenge nonce with it.
pub fn sign_challenge(private_pem: &str, nonce_hex: &str) -> Result<Vec<u8>, KeyError> {
    SigningKeyPair::from_pem(private_pem)?.sign(nonce_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_PRIVATE: &str = include_str!("../tests/fixtures/rsa_private.pem");
    const RSA_PUBLIC: &str = include_str!("../tests/fixtures/rsa_public.pem");

    #[test]
    fn test_generate_secp256k1() {
        let pair = generate(KeyFamily::EcdsaSecp256k1).unwrap();
        assert!(pair
            .private_pem
            .starts_with("-----BEGIN SECP256K1 PRIVATE KEY-----"));
        assert!(pair
            .public_pem
            .starts_with("-----BEGIN SECP256K1 PUBLIC KEY-----"));

        let (_, der) = pem_rfc7468::decode_vec(pair.public_pem.as_bytes()).unwrap();
        assert_eq!(der.len(), 65);
        assert_eq!(der[0], 0x04);

        let parsed = SigningKeyPair::from_pem(&pair.private_pem).unwrap();
        assert_eq!(parsed.family(), KeyFamily::EcdsaSecp256k1);
        assert_eq!(parsed.public_pem().unwrap(), pair.public_pem);
    }

    #[test]
    fn test_rsa_fixture_public_matches() {
        let parsed = SigningKeyPair::from_pem(RSA_PRIVATE).unwrap();
        assert_eq!(parsed.family(), KeyFamily::Rsa);
        assert_eq!(parsed.public_pem().unwrap().trim(), RSA_PUBLIC.trim());
    }

    #[test]
    fn test_secp256k1_signature_shape() {
        let pair = generate(KeyFamily::EcdsaSecp256k1).unwrap();
        let signature = sign_challenge(&pair.private_pem, &"ab".repeat(32)).unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_unsupported_label() {
        let pem = pem_rfc7468::encode_string("OPENSSH PRIVATE KEY", LineEnding::LF, &[0u8; 8])
            .unwrap();
        assert!(matches!(
            SigningKeyPair::from_pem(&pem),
            Err(KeyError::UnsupportedLabel(_))
        ));
    }

    #[test]
    fn test_malformed_pem() {
        assert!(matches!(
            SigningKeyPair::from_pem("garbage"),
            Err(KeyError::Malformed(_))
        ));
    }
}
