//! PKCE (Proof Key for Code Exchange)
//!
//! Implements RFC 7636 for the authorization code flow. Only the S256
//! method is supported; `plain` is rejected at the authorize endpoint.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Compute the S256 code challenge for a verifier:
/// base64url(SHA-256(verifier)), no padding.
pub fn build_s256_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify a code_verifier against the challenge stored at authorization
/// time. Exact string equality on the recomputed challenge.
pub fn verify_s256(verifier: &str, challenge: &str) -> bool {
    build_s256_code_challenge(verifier) == challenge
}

/// PKCE code verifier and challenge pair, generated client-side.
///
/// The server never generates these in production; this is used by
/// integration tests standing in for an OAuth client.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// The code verifier (kept secret, sent in token exchange)
    pub verifier: String,
    /// The code challenge (sent in authorization request)
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE pair from 32 random bytes.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();

        // Base64-URL encode to create verifier (43-128 characters)
        let verifier = URL_SAFE_NO_PAD.encode(&random_bytes);
        let challenge = build_s256_code_challenge(&verifier);

        Self {
            verifier,
            challenge,
        }
    }
}
