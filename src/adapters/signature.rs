use {
    crate::domain::error::CheckoutError,
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Checks a hex HMAC-SHA256 of the raw request body. The comparison is
/// constant-time (`verify_slice`); a signature that is not even hex fails the
/// same way a wrong one does.
pub fn verify_hmac_sha256_hex(
    payload: &[u8],
    secret: &str,
    signature: &str,
) -> Result<(), CheckoutError> {
    let expected = hex::decode(signature.trim().trim_start_matches("sha256="))
        .map_err(|_| CheckoutError::WebhookSignature("signature is not hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CheckoutError::WebhookSignature(format!("bad secret: {e}")))?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| CheckoutError::WebhookSignature("signature mismatch".into()))
}

pub fn sign_hmac_sha256_hex(payload: &[u8], secret: &str) -> Result<String, CheckoutError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CheckoutError::WebhookSignature(format!("bad secret: {e}")))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Wompi's payment-link integrity field: sha256 over
/// `public~private~reference~amount_in_cents~currency`.
pub fn wompi_integrity(
    public_key: &str,
    private_key: &str,
    reference: &str,
    amount_in_cents: i64,
    currency: &str,
) -> String {
    use sha2::Digest;

    let input = format!("{public_key}~{private_key}~{reference}~{amount_in_cents}~{currency}");
    hex::encode(Sha256::digest(input.as_bytes()))
}
