//! HMAC-SHA256 signatures for self-served download links.
//!
//! The signature covers `{path}\n{expires}` where `expires` is a Unix
//! timestamp in seconds, and is encoded as unpadded URL-safe base64.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies download links.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    /// Create a signer from a secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: secret.to_vec(),
        }
    }

    /// Create a signer with a random 32-byte secret.
    pub fn random() -> Self {
        let mut key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    fn mac(&self, path: &str, expires: i64) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Some(mac)
    }

    /// Sign a path with its expiry timestamp.
    ///
    /// Returns an empty string, which never verifies, if the key is unusable.
    pub fn sign(&self, path: &str, expires: i64) -> String {
        self.mac(path, expires)
            .map(|mac| URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Check a signature in constant time.
    pub fn verify(&self, path: &str, expires: i64, signature: &str) -> bool {
        let (Ok(raw), Some(mac)) = (URL_SAFE_NO_PAD.decode(signature), self.mac(path, expires))
        else {
            return false;
        };
        !raw.is_empty() && mac.verify_slice(&raw).is_ok()
    }
}
