//! HMAC-SHA256 signature engine.
//!
//! # Security
//!
//! - Signatures are compared with `subtle::ConstantTimeEq`, never `==`, so
//!   verification time does not leak where two byte strings first differ.
//! - Malformed hex and a wrong signature resolve to the same
//!   `InvalidSignature` outcome, and the expected MAC is computed before the
//!   provided hex is decoded, so the two failure paths do the same
//!   cryptographic work.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::ProtocolError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the lower-case hex HMAC-SHA256 of `canonical` under `secret`.
///
/// # Example
///
/// ```
/// use zito_protocol::signature;
///
/// let sig = signature::sign(b"sk_test_secret", "POST/api/v1/wallets/quote...");
/// assert_eq!(sig.len(), 64);
/// ```
pub fn sign(secret: &[u8], canonical: &str) -> String {
    hex::encode(mac_bytes(secret, canonical))
}

/// Verify `provided_hex` against the HMAC-SHA256 of `canonical`.
///
/// Accepts upper- or lower-case hex. Any failure (wrong mac, wrong length,
/// non-hex input) is `InvalidSignature`.
pub fn verify(secret: &[u8], canonical: &str, provided_hex: &str) -> Result<(), ProtocolError> {
    let expected = mac_bytes(secret, canonical);

    // Decode after computing the mac; both failure paths pay for the HMAC.
    let provided = hex::decode(provided_hex).map_err(|_| ProtocolError::InvalidSignature)?;
    if provided.len() != expected.len() {
        return Err(ProtocolError::InvalidSignature);
    }

    if bool::from(expected.ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidSignature)
    }
}

fn mac_bytes(secret: &[u8], canonical: &str) -> [u8; 32] {
    // HMAC accepts keys of any length; this cannot fail for SHA-256.
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().into()
}
