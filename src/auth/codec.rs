//! Challenge sealing and the transport text encoding.
//!
//! Sealing is a repeating-keystream XOR with the server secret. It makes the
//! challenge opaque to clients and exactly reversible by the server; it is
//! NOT encryption and carries no integrity. Callers go through the
//! [`ChallengeSealer`] trait so a stronger construction can be dropped in.

use crate::auth::error::AuthError;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use zeroize::Zeroizing;

/// URL-safe base64 that emits padding and accepts input with or without it.
const TEXT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Process-wide symmetric key material. Never empty.
#[derive(Clone)]
pub struct ServerSecret(Zeroizing<Vec<u8>>);

impl ServerSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(ServerSecret(Zeroizing::new(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServerSecret([REDACTED])")
    }
}

/// Strategy for turning a challenge plaintext into an opaque blob and back.
///
/// `unseal(seal(x)) == x` must hold for every byte string `x`.
pub trait ChallengeSealer: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, AuthError>;
    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, AuthError>;
}

/// XOR every byte of `data` with the secret repeated to the same length.
///
/// Self-inverse: applying it twice with the same secret returns `data`.
pub fn xor_keystream(data: &[u8], secret: &[u8]) -> Result<Vec<u8>, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::EmptySecret);
    }
    Ok(data
        .iter()
        .zip(secret.iter().cycle())
        .map(|(d, k)| d ^ k)
        .collect())
}

/// The repeating-key XOR sealer.
#[derive(Debug, Clone)]
pub struct XorSealer {
    secret: ServerSecret,
}

impl XorSealer {
    pub fn new(secret: ServerSecret) -> Self {
        XorSealer { secret }
    }
}

impl ChallengeSealer for XorSealer {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, AuthError> {
        xor_keystream(plaintext, self.secret.as_bytes())
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, AuthError> {
        xor_keystream(sealed, self.secret.as_bytes())
    }
}

/// Encode bytes as URL-safe base64 (padded).
pub fn encode(data: &[u8]) -> String {
    TEXT_ENGINE.encode(data)
}

/// Decode URL-safe base64, padded or not.
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    TEXT_ENGINE.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(ServerSecret::new(Vec::new()).unwrap_err(), AuthError::EmptySecret);
        assert_eq!(xor_keystream(b"data", b"").unwrap_err(), AuthError::EmptySecret);
    }

    #[test]
    fn test_xor_known_vector() {
        // 'a' ^ 'k' = 0x0a, 'b' ^ 'e' = 0x07, 'c' ^ 'k' = 0x08
        let sealed = xor_keystream(b"abc", b"ke").unwrap();
        assert_eq!(sealed, vec![0x0a, 0x07, 0x08]);
    }

    #[test]
    fn test_seal_round_trip() {
        let secret = ServerSecret::new("s3cr3t").unwrap();
        let sealer = XorSealer::new(secret);

        let inputs: [&[u8]; 4] = [
            b"",
            b"x",
            b"-----BEGIN PUBLIC KEY-----\nMFYw\n-----END PUBLIC KEY-----|abcdef|1700000000",
            &[0u8, 255, 1, 254, 0, 0, 7],
        ];
        for input in inputs {
            let sealed = sealer.seal(input).unwrap();
            assert_eq!(sealed.len(), input.len());
            assert_eq!(sealer.unseal(&sealed).unwrap(), input);
        }
    }

    #[test]
    fn test_seal_is_opaque() {
        let sealer = XorSealer::new(ServerSecret::new("key").unwrap());
        let sealed = sealer.seal(b"public-key|nonce|123").unwrap();
        assert_ne!(sealed, b"public-key|nonce|123".to_vec());
    }

    #[test]
    fn test_text_round_trip() {
        let inputs: [&[u8]; 5] = [b"", b"f", b"fo", b"foo", &[0xfb, 0xff, 0x00, 0x3e, 0x3f]];
        for input in inputs {
            assert_eq!(decode(&encode(input)).unwrap(), input);
        }
    }

    #[test]
    fn test_text_encoding_is_url_safe() {
        // 0xfb 0xff encodes to characters that standard base64 renders as '+' and '/'
        let encoded = encode(&[0xfb, 0xff, 0xbf]);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(encoded, "-_-_");
    }

    #[test]
    fn test_decode_tolerates_missing_padding() {
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(decode("Zm8=").unwrap(), b"fo");
        assert_eq!(decode("Zm8").unwrap(), b"fo");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not base64!").is_err());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = ServerSecret::new("hunter2").unwrap();
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }
}
