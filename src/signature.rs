//! HMAC-SHA256 webhook signatures

use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(secret: &str, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    mac
}

/// Lowercase hex HMAC-SHA256 of the raw payload bytes.
pub fn hmac_hex(secret: &str, payload: &[u8]) -> String {
    hex::encode(keyed_mac(secret, payload).finalize().into_bytes())
}

/// Checks a presented signature token against the payload.
///
/// The token must be exactly the lowercase hex digest; uppercase or any
/// other encoding is a mismatch. The digest comparison is constant-time.
pub fn verify_signature(secret: &str, payload: &[u8], token: &str) -> bool {
    if token.len() != 64 || !token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return false;
    }

    match hex::decode(token) {
        Ok(token_bytes) => keyed_mac(secret, payload).verify_slice(&token_bytes).is_ok(),
        Err(_) => false,
    }
}
