//! PKCE (Proof Key for Code Exchange) generation.
//!
//! Used by all OAuth providers for secure authorization code flows.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// A PKCE verifier/challenge pair.
#[derive(Clone, Debug)]
pub struct PkcePair {
    /// Random verifier string (base64url, no padding).
    pub verifier: String,
    /// SHA-256 challenge of the verifier (base64url, no padding).
    pub challenge: String,
}

/// Generate a new PKCE verifier/challenge pair.
///
/// The verifier is 32 cryptographically-secure random bytes encoded as
/// base64url (no padding). The challenge is the SHA-256 hash of the
/// verifier, also base64url-encoded.
pub fn generate_pkce() -> PkcePair {
    let random_bytes: [u8; 32] = rand::random();
    let verifier = URL_SAFE_NO_PAD.encode(random_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    let challenge = URL_SAFE_NO_PAD.encode(hash);

    PkcePair {
        verifier,
        challenge,
    }
}
