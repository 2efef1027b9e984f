//! Challenge signature verification for RSA and secp256k1 keys.
//!
//! The client signs `SHA256(nonce_hex)`, where `nonce_hex` is the 64-char hex
//! string it was handed (its ASCII bytes, not the raw nonce).
//!
//! Key family is read from the PEM label:
//!
//! | Label                  | Contents                    | Family    |
//! |------------------------|-----------------------------|-----------|
//! | `SECP256K1 PUBLIC KEY` | raw SEC1 point              | secp256k1 |
//! | `RSA PUBLIC KEY`       | PKCS#1                      | RSA       |
//! | `PUBLIC KEY`           | SPKI, family from the OID   | either    |

use crate::auth::error::AuthError;
use k256::ecdsa::{
    signature::hazmat::PrehashVerifier, Signature as EcdsaSignature, VerifyingKey as EcdsaKey,
};
use rsa::{pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use spki::{der::Decode, ObjectIdentifier, SubjectPublicKeyInfoRef};

pub const SECP256K1_PUBLIC_LABEL: &str = "SECP256K1 PUBLIC KEY";
pub const RSA_PUBLIC_LABEL: &str = "RSA PUBLIC KEY";
pub const SPKI_PUBLIC_LABEL: &str = "PUBLIC KEY";

/// `r || s`, 32 bytes each, big-endian.
pub const ECDSA_SIGNATURE_LEN: usize = 64;

const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256K1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcdsaSecp256k1,
}

impl KeyFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFamily::Rsa => "rsa",
            KeyFamily::EcdsaSecp256k1 => "secp256k1",
        }
    }
}

impl std::fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for KeyFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rsa" => Ok(KeyFamily::Rsa),
            "secp256k1" | "ecdsa" => Ok(KeyFamily::EcdsaSecp256k1),
            _ => Err(format!("Unknown key family: {}", s)),
        }
    }
}

/// A parsed client public key.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaSecp256k1(EcdsaKey),
}

impl PublicKey {
    /// Parse a PEM-encoded public key.
    ///
    /// Unknown labels and non-RSA/non-secp256k1 SPKI keys are
    /// `UnsupportedKeyType`. Anything that fails to decode is `SignatureInvalid`.
    pub fn from_pem(pem: &str) -> Result<Self, AuthError> {
        let (label, der) = pem_rfc7468::decode_vec(pem.trim().as_bytes())
            .map_err(|_| AuthError::SignatureInvalid)?;

        match label {
            SECP256K1_PUBLIC_LABEL => EcdsaKey::from_sec1_bytes(&der)
                .map(PublicKey::EcdsaSecp256k1)
                .map_err(|_| AuthError::SignatureInvalid),
            RSA_PUBLIC_LABEL => RsaPublicKey::from_pkcs1_der(&der)
                .map(PublicKey::Rsa)
                .map_err(|_| AuthError::SignatureInvalid),
            SPKI_PUBLIC_LABEL => Self::from_spki_der(&der),
            _ => Err(AuthError::UnsupportedKeyType),
        }
    }

    fn from_spki_der(der: &[u8]) -> Result<Self, AuthError> {
        let spki =
            SubjectPublicKeyInfoRef::from_der(der).map_err(|_| AuthError::SignatureInvalid)?;
        let algorithm = spki.algorithm.oid;

        if algorithm == RSA_ENCRYPTION_OID {
            return RsaPublicKey::from_public_key_der(der)
                .map(PublicKey::Rsa)
                .map_err(|_| AuthError::SignatureInvalid);
        }

        if algorithm == EC_PUBLIC_KEY_OID {
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|_| AuthError::SignatureInvalid)?;
            if curve != SECP256K1_OID {
                return Err(AuthError::UnsupportedKeyType);
            }
            return EcdsaKey::from_public_key_der(der)
                .map(PublicKey::EcdsaSecp256k1)
                .map_err(|_| AuthError::SignatureInvalid);
        }

        Err(AuthError::UnsupportedKeyType)
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            PublicKey::Rsa(_) => KeyFamily::Rsa,
            PublicKey::EcdsaSecp256k1(_) => KeyFamily::EcdsaSecp256k1,
        }
    }

    /// Verify `signature` over `SHA256(nonce_hex)`.
    pub fn verify(&self, nonce_hex: &str, signature: &[u8]) -> Result<(), AuthError> {
        let digest = Sha256::digest(nonce_hex.as_bytes());

        match self {
            PublicKey::Rsa(key) => key
                .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                .map_err(|_| AuthError::SignatureInvalid),
            PublicKey::EcdsaSecp256k1(key) => {
                if signature.len() != ECDSA_SIGNATURE_LEN {
                    return Err(AuthError::InvalidSignatureLength(signature.len()));
                }
                // Rejects r == 0 or s == 0 and scalars outside the group order.
                let signature = EcdsaSignature::from_slice(signature)
                    .map_err(|_| AuthError::SignatureInvalid)?;
                // Signers that don't normalize produce high-S half the time.
                let signature = signature.normalize_s().unwrap_or(signature);
                key.verify_prehash(&digest, &signature)
                    .map_err(|_| AuthError::SignatureInvalid)
            }
        }
    }
}

/// Determine the key family of a PEM-encoded public key.
pub fn key_family(public_key_pem: &str) -> Result<KeyFamily, AuthError> {
    PublicKey::from_pem(public_key_pem).map(|key| key.family())
}

/// Verify a challenge signature against a PEM-encoded public key.
///
/// Pure and deterministic: the same inputs always give the same result.
pub fn verify_signature(
    public_key_pem: &str,
    nonce_hex: &str,
    signature: &[u8],
) -> Result<(), AuthError> {
    PublicKey::from_pem(public_key_pem)?.verify(nonce_hex, signature)
}
