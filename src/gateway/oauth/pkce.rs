//! Usage: PKCE verifier/challenge generation for the authorization-code flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub(crate) struct PkcePair {
    pub(crate) code_verifier: String,
    pub(crate) code_challenge: String,
}

impl PkcePair {
    pub(crate) fn generate() -> Self {
        let mut random = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut random);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(random))
    }

    fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = code_challenge_s256(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

pub(crate) fn code_challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
