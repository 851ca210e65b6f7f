//! Ethereum wallet signature verification
//!
//! Recovers the signer of an EIP-191 `personal_sign` message and compares it
//! with the address the client claims to own.

use libsecp256k1::{Message, PublicKey, RecoveryId, SecretKey, Signature};
use rand::RngCore;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Errors that can occur during signature verification
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid wallet address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Signer does not match the claimed address")]
    SignerMismatch,
}

/// Validate a `0x`-prefixed 20-byte hex address and return it lower-cased.
pub fn normalize_address(address: &str) -> Result<String, CryptoError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| CryptoError::InvalidAddressFormat("missing 0x prefix".to_string()))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidAddressFormat(
            "expected 40 hex characters".to_string(),
        ));
    }

    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Keccak-256 of the EIP-191 prefixed message
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Lower-cased address for a secp256k1 public key
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    // serialize() yields 0x04 || X || Y
    let uncompressed = public_key.serialize();
    let hash = Keccak256::digest(&uncompressed[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the address that produced a 65-byte `r || s || v` signature over
/// `message`. `v` may be 0/1 or 27/28.
pub fn recover_signer(message: &str, signature_hex: &str) -> Result<String, CryptoError> {
    let raw = signature_hex.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes =
        hex::decode(raw).map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    if bytes.len() != 65 {
        return Err(CryptoError::InvalidSignatureFormat(format!(
            "Expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        27 | 28 => bytes[64] - 27,
        0 | 1 => bytes[64],
        other => {
            return Err(CryptoError::InvalidSignatureFormat(format!(
                "Invalid recovery byte {}",
                other
            )))
        }
    };

    let signature = Signature::parse_standard_slice(&bytes[..64])
        .map_err(|e| CryptoError::InvalidSignatureFormat(format!("{:?}", e)))?;
    let recovery_id = RecoveryId::parse(v)
        .map_err(|e| CryptoError::InvalidSignatureFormat(format!("{:?}", e)))?;
    let digest = Message::parse(&personal_message_hash(message));

    let public_key = libsecp256k1::recover(&digest, &signature, &recovery_id)
        .map_err(|_| CryptoError::VerificationFailed)?;

    Ok(address_from_public_key(&public_key))
}

/// Check that `signature` over `message` was produced by `address`
/// (case-insensitive compare).
pub fn verify_wallet_signature(
    address: &str,
    message: &str,
    signature: &str,
) -> Result<(), CryptoError> {
    let recovered = recover_signer(message, signature)?;
    if !recovered.eq_ignore_ascii_case(address.trim()) {
        return Err(CryptoError::SignerMismatch);
    }
    Ok(())
}

/// Sign `message` the way a wallet's `personal_sign` does. Returns `0x`-hex
/// `r || s || v` with `v` in 27/28. Used by tests and local tooling.
pub fn sign_personal_message(secret_key: &SecretKey, message: &str) -> String {
    let digest = Message::parse(&personal_message_hash(message));
    let (signature, recovery_id) = libsecp256k1::sign(&digest, secret_key);

    let mut bytes = signature.serialize().to_vec();
    bytes.push(recovery_id.serialize() + 27);
    format!("0x{}", hex::encode(bytes))
}

/// 32 random bytes, hex-encoded. Used for nonces and link session ids.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SecretKey {
        SecretKey::parse(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_normalize_address() {
        let addr = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";
        assert_eq!(
            normalize_address(addr).unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert!(normalize_address("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(normalize_address("0x1234").is_err());
        assert!(normalize_address("0xZZcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_known_address_derivation() {
        // private key 0x...01 is the generator point
        let mut sk = [0u8; 32];
        sk[31] = 1;
        let secret = SecretKey::parse(&sk).unwrap();
        let public = PublicKey::from_secret_key(&secret);
        assert_eq!(
            address_from_public_key(&public),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_sign_and_recover() {
        let secret = key(7);
        let address = address_from_public_key(&PublicKey::from_secret_key(&secret));
        let signature = sign_personal_message(&secret, "hello shacker");

        assert_eq!(recover_signer("hello shacker", &signature).unwrap(), address);
        let shouted = address.to_uppercase().replace("0X", "0x");
        assert!(verify_wallet_signature(&shouted, "hello shacker", &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_recovers_other_signer() {
        let secret = key(7);
        let address = address_from_public_key(&PublicKey::from_secret_key(&secret));
        let signature = sign_personal_message(&secret, "hello shacker");

        let result = verify_wallet_signature(&address, "goodbye shacker", &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_recovery_byte_zero_one_accepted() {
        let secret = key(9);
        let address = address_from_public_key(&PublicKey::from_secret_key(&secret));
        let signature = sign_personal_message(&secret, "msg");

        let mut bytes = hex::decode(&signature[2..]).unwrap();
        bytes[64] -= 27;
        let lowered = hex::encode(bytes);
        assert_eq!(recover_signer("msg", &lowered).unwrap(), address);
    }

    #[test]
    fn test_malformed_signatures() {
        assert!(matches!(
            recover_signer("m", "0x1234"),
            Err(CryptoError::InvalidSignatureFormat(_))
        ));
        assert!(matches!(
            recover_signer("m", "not-hex"),
            Err(CryptoError::InvalidSignatureFormat(_))
        ));
        let bad_v = format!("0x{}{}", "11".repeat(64), "05");
        assert!(matches!(
            recover_signer("m", &bad_v),
            Err(CryptoError::InvalidSignatureFormat(_))
        ));
    }

    #[test]
    fn test_secure_tokens_are_unique() {
        let a = generate_secure_token();
        let b = generate_secure_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
