//! Gateway webhook signature digest.
//!
//! `signature_key = hex(SHA-512(order_id ‖ status_code ‖ gross_amount ‖ server_key))`

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::domain::ServerKey;

/// Computes the lowercase hex digest the gateway sends as `signature_key`.
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &ServerKey,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.reveal().as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies a provided signature using constant-time comparison.
///
/// The match is exact: an upper-case digest does not verify.
pub fn verify_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &ServerKey,
    provided: &str,
) -> bool {
    let expected = notification_signature(order_id, status_code, gross_amount, server_key);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
