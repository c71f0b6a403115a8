use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

pub const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("OS random number generator unavailable: {0}")]
    RngUnavailable(String),
}

/// A client key pair in `wg genkey` / `wg pubkey` encoding (padded base64).
#[derive(Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub private_key: String,
    pub public_key: String,
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerIdentity")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> Result<PeerIdentity, IdentityError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct X25519KeyGenerator;

impl KeyGenerator for X25519KeyGenerator {
    fn generate(&self) -> Result<PeerIdentity, IdentityError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| IdentityError::RngUnavailable(e.to_string()))?;
        Ok(identity_from_secret(bytes))
    }
}

/// Builds an identity from raw secret bytes, clamping them into a valid
/// Curve25519 scalar the way `wg genkey` does.
pub fn identity_from_secret(mut key: [u8; KEY_LEN]) -> PeerIdentity {
    key[0] &= 248;
    key[31] &= 127;
    key[31] |= 64;

    let secret = StaticSecret::from(key);
    let public = PublicKey::from(&secret);

    PeerIdentity {
        private_key: STANDARD.encode(secret.to_bytes()),
        public_key: STANDARD.encode(public.as_bytes()),
    }
}

pub fn is_valid_key(b64: &str) -> bool {
    decode_key(b64).is_some()
}

fn decode_key(b64: &str) -> Option<[u8; KEY_LEN]> {
    let raw = STANDARD.decode(b64.trim()).ok()?;
    raw.try_into().ok()
}
