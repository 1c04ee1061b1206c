//! PKCE verifier/challenge generation (RFC 7636, S256 method).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

const VERIFIER_BYTES: usize = 32;

/// Challenge method sent alongside `code_challenge`.
pub const CHALLENGE_METHOD: &str = "S256";

/// One-shot verifier and its derived challenge.
///
/// `Debug` redacts the verifier so it never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Draw a fresh verifier from the OS entropy source.
    pub fn generate() -> Result<Self, ApiError> {
        let mut buf = [0u8; VERIFIER_BYTES];
        OsRng.try_fill_bytes(&mut buf).map_err(|e| {
            ApiError::InvalidRequest(format!("entropy source unavailable for PKCE verifier: {e}"))
        })?;
        let verifier = URL_SAFE_NO_PAD.encode(buf);
        let challenge = Self::challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// `base64url(SHA256(verifier))` without padding.
    pub fn challenge_for(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Consume the pair, keeping only the verifier for the code exchange.
    pub fn into_verifier(self) -> String {
        self.verifier
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}
