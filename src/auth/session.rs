//! Stateless session tokens.
//!
//! Token format: `base64url(payload) "." base64url(SHA256(base64url(payload) || secret))`
//! with `payload = {"pk_hash":"<hex sha256 of the public key PEM>","exp":<unix secs>}`.
//!
//! A token is valid while its digest matches and `now <= exp`. Nothing needs
//! to be looked up to validate one; revocation is a separate store check.

use crate::auth::codec::{self, ServerSecret};
use crate::auth::error::AuthError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const TOKEN_SEPARATOR: char = '.';

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub pk_hash: String,
    pub exp: i64,
}

/// A newly minted token with its claims.
#[derive(Debug, Clone)]
pub struct MintedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// Hex SHA-256 of a public key identity, as embedded in tokens.
pub fn hash_public_key(public_key: &str) -> String {
    hex::encode(Sha256::digest(public_key.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct SessionMinter {
    secret: ServerSecret,
    ttl_secs: u64,
}

impl SessionMinter {
    pub fn new(secret: ServerSecret, ttl_secs: u64) -> Self {
        SessionMinter { secret, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Mint a token for `public_key` expiring `ttl_secs` after `now`.
    pub fn mint(&self, public_key: &str, now: i64) -> MintedSession {
        let claims = SessionClaims {
            pk_hash: hash_public_key(public_key),
            exp: now.saturating_add(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)),
        };

        // Both fields are plain hex and an integer: nothing to escape.
        let payload = format!(r#"{{"pk_hash":"{}","exp":{}}}"#, claims.pk_hash, claims.exp);
        let encoded_payload = codec::encode(payload.as_bytes());
        let encoded_digest = codec::encode(&self.digest(&encoded_payload));

        MintedSession {
            token: format!("{encoded_payload}{TOKEN_SEPARATOR}{encoded_digest}"),
            claims,
        }
    }

    /// Check a token's digest, then its expiry, and return its claims.
    pub fn validate(&self, token: &str, now: i64) -> Result<SessionClaims, AuthError> {
        let (encoded_payload, encoded_digest) = token
            .split_once(TOKEN_SEPARATOR)
            .ok_or(AuthError::TokenTampered)?;

        // Compared in encoded form: the digest text must match exactly, padding included
        let expected = codec::encode(&self.digest(encoded_payload));
        if !bool::from(expected.as_bytes().ct_eq(encoded_digest.as_bytes())) {
            return Err(AuthError::TokenTampered);
        }

        let payload = codec::decode(encoded_payload).map_err(|_| AuthError::TokenTampered)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::TokenTampered)?;

        if now > claims.exp {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    fn digest(&self, encoded_payload: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(encoded_payload.as_bytes());
        hasher.update(self.secret.as_bytes());
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nMFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAE\n-----END PUBLIC KEY-----\n";
    const NOW: i64 = 1_700_000_000;

    fn minter(secret: &str) -> SessionMinter {
        SessionMinter::new(ServerSecret::new(secret).unwrap(), 600)
    }

    #[test]
    fn test_token_shape() {
        let minted = minter("secret").mint(PEM, NOW);
        let (payload, digest) = minted.token.split_once('.').unwrap();

        let payload = codec::decode(payload).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["pk_hash"], hash_public_key(PEM));
        assert_eq!(json["exp"], NOW + 600);

        assert_eq!(codec::decode(digest).unwrap().len(), 32);
        assert_eq!(minted.claims.exp, NOW + 600);
    }

    #[test]
    fn test_payload_field_order() {
        let minted = minter("secret").mint(PEM, NOW);
        let (payload, _) = minted.token.split_once('.').unwrap();
        let payload = String::from_utf8(codec::decode(payload).unwrap()).unwrap();
        assert!(payload.starts_with(r#"{"pk_hash":""#));
        assert!(payload.ends_with(&format!(r#","exp":{}}}"#, NOW + 600)));
    }

    #[test]
    fn test_digest_covers_encoded_payload_and_secret() {
        let minted = minter("secret").mint(PEM, NOW);
        let (payload, digest) = minted.token.split_once('.').unwrap();

        let mut expected = Sha256::new();
        expected.update(format!("{payload}secret").as_bytes());
        assert_eq!(codec::decode(digest).unwrap(), expected.finalize().to_vec());
    }

    #[test]
    fn test_validate_until_expiry_inclusive() {
        let minter = minter("secret");
        let minted = minter.mint(PEM, NOW);

        assert_eq!(minter.validate(&minted.token, NOW).unwrap(), minted.claims);
        assert!(minter.validate(&minted.token, NOW + 600).is_ok());
        assert_eq!(
            minter.validate(&minted.token, NOW + 601).unwrap_err(),
            AuthError::TokenExpired
        );
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let minter = SessionMinter::new(ServerSecret::new("secret").unwrap(), u64::MAX);
        let minted = minter.mint(PEM, NOW);
        assert_eq!(minted.claims.exp, i64::MAX);
        assert!(minter.validate(&minted.token, NOW + 1).is_ok());
    }

    #[test]
    fn test_other_secret_is_tampered() {
        let minted = minter("secret").mint(PEM, NOW);
        assert_eq!(
            minter("other").validate(&minted.token, NOW).unwrap_err(),
            AuthError::TokenTampered
        );
    }

    #[test]
    fn test_every_bit_flip_is_detected() {
        let minter = minter("secret");
        let token = minter.mint(PEM, NOW).token;

        for i in 0..token.len() {
            for bit in 0..7 {
                let mut bytes = token.clone().into_bytes();
                bytes[i] ^= 1 << bit;
                let tampered = String::from_utf8(bytes).unwrap();
                assert_eq!(
                    minter.validate(&tampered, NOW).unwrap_err(),
                    AuthError::TokenTampered,
                    "flip of bit {} at byte {} went undetected",
                    bit,
                    i
                );
            }
        }
    }

    #[test]
    fn test_digest_padding_must_match() {
        let minter = minter("secret");
        let token = minter.mint(PEM, NOW).token;
        assert!(token.ends_with('='));

        for altered in [
            token.trim_end_matches('=').to_string(),
            format!("{}=", token),
        ] {
            assert_eq!(
                minter.validate(&altered, NOW).unwrap_err(),
                AuthError::TokenTampered
            );
        }
    }

    #[test]
    fn test_expired_but_tampered_reports_tampered() {
        let minter = minter("secret");
        let token = minter.mint(PEM, NOW).token;
        let forged = format!("{}x", token);
        assert_eq!(
            minter.validate(&forged, NOW + 10_000).unwrap_err(),
            AuthError::TokenTampered
        );
    }

    #[test]
    fn test_structurally_broken_tokens() {
        let minter = minter("secret");
        for token in ["", ".", "abc", "abc.", ".abc", "a.b.c"] {
            assert_eq!(
                minter.validate(token, NOW).unwrap_err(),
                AuthError::TokenTampered
            );
        }
    }

    #[test]
    fn test_hash_public_key() {
        assert_eq!(
            hash_public_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_public_key(PEM).len(), 64);
    }
}
