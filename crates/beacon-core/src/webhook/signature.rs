//! HMAC-SHA256 payload signing and subscription secret generation.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix that marks a value as a webhook signing secret.
pub const SECRET_PREFIX: &str = "whsec_";

/// Prefix of every signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Random bytes behind each generated secret.
const SECRET_BYTES: usize = 24;

/// Sign a body with HMAC-SHA256.
///
/// Returns `sha256=<64 lowercase hex chars>`. The signature covers `body`
/// byte for byte, so callers must sign the exact bytes they send.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let digest = hex::encode(mac.finalize().into_bytes());
    format!("{}{}", SIGNATURE_PREFIX, digest)
}

/// Verify a webhook signature
///
/// Used by webhook receivers to check a payload was sent by the holder of
/// `secret`. The digest comparison is constant-time.
pub fn verify_signature(body: &[u8], secret: &str, signature: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(digest) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&digest).is_ok()
}

/// Generate a fresh subscription secret: `whsec_` followed by 48 hex chars.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", SECRET_PREFIX, hex::encode(bytes))
}
