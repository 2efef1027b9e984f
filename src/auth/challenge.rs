//! Challenge issuance and recovery.
//!
//! A challenge is never stored server-side. The claimed public key, the
//! nonce, and the issue time travel together inside the sealed blob
//! (`key_data`), and the verify step recovers all three from it.

use crate::auth::codec::{self, ChallengeSealer};
use crate::auth::error::AuthError;
use rand::{rngs::OsRng, TryRngCore};
use std::sync::Arc;

/// Separates the three sealed fields. PEM text never contains it.
pub const DELIMITER: char = '|';

/// Nonce length in bytes before hex rendering.
pub const NONCE_BYTES: usize = 32;

/// Result of issuing a challenge: the nonce the client signs and the opaque
/// blob it hands back on verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub nonce_hex: String,
    pub sealed: String,
    pub issued_at: i64,
}

/// A challenge recovered from its sealed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedChallenge {
    pub public_key: String,
    pub nonce_hex: String,
    pub issued_at: i64,
}

impl OpenedChallenge {
    /// Last second (inclusive) at which the challenge is still accepted.
    pub fn expires_at(&self, ttl_secs: u64) -> i64 {
        self.issued_at
            .saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
    }

    /// Accepts up to and including `issued_at + ttl_secs`.
    pub fn check_fresh(&self, ttl_secs: u64, now: i64) -> Result<(), AuthError> {
        if now > self.expires_at(ttl_secs) {
            return Err(AuthError::ChallengeExpired);
        }
        Ok(())
    }
}

/// Generate a fresh nonce: 32 bytes from the OS CSPRNG as 64 lowercase hex chars.
pub fn generate_nonce() -> Result<String, AuthError> {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Entropy(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Exactly `2 * NONCE_BYTES` lowercase hex chars, as `generate_nonce` renders them.
fn is_nonce_hex(s: &str) -> bool {
    s.len() == NONCE_BYTES * 2 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Seals and opens challenges with an injected sealing strategy.
#[derive(Clone)]
pub struct ChallengeIssuer {
    sealer: Arc<dyn ChallengeSealer>,
}

impl ChallengeIssuer {
    pub fn new(sealer: Arc<dyn ChallengeSealer>) -> Self {
        ChallengeIssuer { sealer }
    }

    /// Issue a challenge for `public_key` at time `now`.
    pub fn issue(&self, public_key: &str, now: i64) -> Result<IssuedChallenge, AuthError> {
        let nonce_hex = generate_nonce()?;
        let sealed = self.seal(public_key, &nonce_hex, now)?;
        Ok(IssuedChallenge {
            nonce_hex,
            sealed,
            issued_at: now,
        })
    }

    /// Join the three fields, seal, and text-encode.
    pub fn seal(&self, public_key: &str, nonce_hex: &str, issued_at: i64) -> Result<String, AuthError> {
        let joined = format!("{public_key}{DELIMITER}{nonce_hex}{DELIMITER}{issued_at}");
        let sealed = self.sealer.seal(joined.as_bytes())?;
        Ok(codec::encode(&sealed))
    }

    /// Recover the challenge from its sealed text form.
    ///
    /// Anything that does not unseal into exactly three delimiter-separated
    /// fields with a well-formed nonce is `MalformedChallenge`; a non-integer
    /// third field is `MalformedTimestamp`. Freshness is checked separately.
    pub fn open(&self, sealed: &str) -> Result<OpenedChallenge, AuthError> {
        let bytes = codec::decode(sealed).map_err(|_| AuthError::MalformedChallenge)?;
        let plain = self.sealer.unseal(&bytes)?;
        let plain = String::from_utf8(plain).map_err(|_| AuthError::MalformedChallenge)?;

        let parts: Vec<&str> = plain.split(DELIMITER).collect();
        let [public_key, nonce_hex, issued_at] = parts.as_slice() else {
            return Err(AuthError::MalformedChallenge);
        };
        if !is_nonce_hex(nonce_hex) {
            return Err(AuthError::MalformedChallenge);
        }

        let issued_at = issued_at
            .parse::<i64>()
            .map_err(|_| AuthError::MalformedTimestamp)?;

        Ok(OpenedChallenge {
            public_key: public_key.to_string(),
            nonce_hex: nonce_hex.to_string(),
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::{ServerSecret, XorSealer};

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nMFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAE\n-----END PUBLIC KEY-----\n";

    fn issuer(secret: &str) -> ChallengeIssuer {
        let secret = ServerSecret::new(secret).unwrap();
        ChallengeIssuer::new(Arc::new(XorSealer::new(secret)))
    }

    #[test]
    fn test_generate_nonce_format() {
        let nonce = generate_nonce().unwrap();
        assert_eq!(nonce.len(), 64);
        assert!(nonce
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_nonces_are_unique() {
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }

    #[test]
    fn test_issue_then_open() {
        let issuer = issuer("server-secret");
        let issued = issuer.issue(PEM, 1_700_000_000).unwrap();

        let opened = issuer.open(&issued.sealed).unwrap();
        assert_eq!(opened.public_key, PEM);
        assert_eq!(opened.nonce_hex, issued.nonce_hex);
        assert_eq!(opened.issued_at, 1_700_000_000);
    }

    #[test]
    fn test_sealed_hides_key_and_nonce() {
        let issuer = issuer("server-secret");
        let issued = issuer.issue(PEM, 1_700_000_000).unwrap();
        let raw = codec::decode(&issued.sealed).unwrap();
        let raw = String::from_utf8_lossy(&raw);
        assert!(!raw.contains("BEGIN PUBLIC KEY"));
        assert!(!raw.contains(&issued.nonce_hex));
    }

    #[test]
    fn test_open_with_other_secret_is_malformed() {
        // Hex secrets differ by small XOR masks, which often leave both
        // delimiters in place; the nonce must still be rejected.
        for _ in 0..500 {
            let ours = issuer(&generate_nonce().unwrap());
            let theirs = issuer(&generate_nonce().unwrap());
            let sealed = theirs.issue(PEM, 1_700_000_000).unwrap().sealed;
            assert_eq!(ours.open(&sealed).unwrap_err(), AuthError::MalformedChallenge);
        }
    }

    #[test]
    fn test_open_rejects_bad_nonce() {
        let issuer = issuer("k");
        let sealer = XorSealer::new(ServerSecret::new("k").unwrap());
        let short = "ab".repeat(31);
        let upper = "AB".repeat(32);
        let long = "ab".repeat(33);

        for nonce in [short.as_str(), upper.as_str(), long.as_str(), "nonce", ""] {
            let plain = format!("pem|{nonce}|1700000000");
            let sealed = codec::encode(&sealer.seal(plain.as_bytes()).unwrap());
            assert_eq!(issuer.open(&sealed).unwrap_err(), AuthError::MalformedChallenge);
        }
    }

    #[test]
    fn test_open_wrong_field_count() {
        let issuer = issuer("k");
        let sealer = XorSealer::new(ServerSecret::new("k").unwrap());

        for plain in ["only-one", "two|fields", "a|b|c|d"] {
            let sealed = codec::encode(&sealer.seal(plain.as_bytes()).unwrap());
            assert_eq!(issuer.open(&sealed).unwrap_err(), AuthError::MalformedChallenge);
        }
    }

    #[test]
    fn test_open_bad_timestamp() {
        let issuer = issuer("k");
        let sealer = XorSealer::new(ServerSecret::new("k").unwrap());
        let plain = format!("pem|{}|yesterday", "0f".repeat(32));
        let sealed = codec::encode(&sealer.seal(plain.as_bytes()).unwrap());
        assert_eq!(issuer.open(&sealed).unwrap_err(), AuthError::MalformedTimestamp);
    }

    #[test]
    fn test_open_bad_encoding() {
        assert_eq!(
            issuer("k").open("%%%not-base64%%%").unwrap_err(),
            AuthError::MalformedChallenge
        );
    }

    #[test]
    fn test_freshness_boundary() {
        let opened = OpenedChallenge {
            public_key: PEM.to_string(),
            nonce_hex: "00".repeat(32),
            issued_at: 1_000,
        };
        assert!(opened.check_fresh(60, 1_000).is_ok());
        assert!(opened.check_fresh(60, 1_060).is_ok());
        assert_eq!(opened.check_fresh(60, 1_061).unwrap_err(), AuthError::ChallengeExpired);
        assert!(opened.check_fresh(u64::MAX, 1_061).is_ok());
    }
}
