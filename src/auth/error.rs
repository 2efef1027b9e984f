//! Authentication error types.

/// Errors produced by the challenge/verify/session pipeline.
///
/// Messages are fixed strings: none of them echo secret, nonce, or
/// signature material back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The server secret has zero length.
    #[error("server secret is empty")]
    EmptySecret,

    /// The sealed challenge did not unseal into exactly three fields.
    #[error("malformed challenge data")]
    MalformedChallenge,

    /// The timestamp field of the sealed challenge is not an integer.
    #[error("invalid timestamp format in key data")]
    MalformedTimestamp,

    /// The challenge is older than the configured challenge TTL.
    #[error("authentication challenge expired")]
    ChallengeExpired,

    /// The signed challenge is not valid base64url.
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,

    /// An ECDSA signature was not exactly 64 bytes (`r || s`).
    #[error("invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// The public key is not an RSA or secp256k1 key.
    #[error("unsupported public key type")]
    UnsupportedKeyType,

    /// The signature does not verify against the claimed public key.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// The session token digest does not match its payload.
    #[error("session token tampered")]
    TokenTampered,

    /// The session token is past its expiry.
    #[error("session token expired")]
    TokenExpired,

    /// The token is well-formed and unexpired but no longer active in the
    /// session store (logged out or never recorded).
    #[error("session revoked")]
    SessionRevoked,

    /// The random source failed.
    #[error("random source failure: {0}")]
    Entropy(String),

    /// The identity or session store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl AuthError {
    /// True for malformed client input, as opposed to a failed proof.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidSignatureEncoding | AuthError::InvalidSignatureLength(_)
        )
    }

    /// True for failures that are the server's fault, not the client's.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            AuthError::EmptySecret | AuthError::Entropy(_) | AuthError::Store(_)
        )
    }
}
