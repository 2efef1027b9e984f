//! Challenge-response authentication and session tokens.
//!
//! Leaves first: `codec` seals challenges, `challenge` issues and opens
//! them, `verify` checks RSA and secp256k1 signatures, `session` mints and
//! validates tokens, and `service` sequences them against the stores.

pub mod challenge;
pub mod clock;
pub mod codec;
pub mod error;
pub mod middleware;
pub mod service;
pub mod session;
pub mod verify;

pub use error::AuthError;
pub use middleware::{AppState, AuthSession};
pub use service::{AuthService, AuthSettings};
pub use verify::{verify_signature, KeyFamily};
