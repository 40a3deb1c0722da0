//! Gateway callback signatures (HMAC-SHA256, hex encoded).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    Some(mac)
}

/// Signs `"{gateway_order_id}|{gateway_payment_id}"` with `secret`.
pub fn sign(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    keyed_mac(secret, gateway_order_id, gateway_payment_id)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Verifies a hex signature in constant time.
pub fn verify(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    keyed_mac(secret, gateway_order_id, gateway_payment_id)
        .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}
