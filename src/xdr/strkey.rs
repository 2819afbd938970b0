//! `G...` account ids

use stellar_strkey::ed25519::PublicKey;

use super::error::XdrError;

/// Length of an encoded account id
pub const ACCOUNT_ID_LEN: usize = 56;

/// Render an ed25519 public key as a `G...` account id
pub fn encode_account_id(key: &[u8; 32]) -> String {
    PublicKey(*key).to_string()
}

/// Parse a `G...` account id into its ed25519 public key
pub fn decode_account_id(address: &str) -> Result<[u8; 32], XdrError> {
    if address.len() != ACCOUNT_ID_LEN {
        return Err(XdrError::InvalidStrKey(format!(
            "account id must be {} characters",
            ACCOUNT_ID_LEN
        )));
    }
    PublicKey::from_string(address)
        .map(|key| key.0)
        .map_err(|_| XdrError::InvalidStrKey(address.to_string()))
}

pub fn is_valid_account_id(address: &str) -> bool {
    decode_account_id(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

    #[test]
    fn test_zero_key_vector() {
        assert_eq!(encode_account_id(&[0u8; 32]), ZERO_ACCOUNT);
        assert_eq!(decode_account_id(ZERO_ACCOUNT).unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_roundtrip_arbitrary_key() {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        let address = encode_account_id(&key);
        assert_eq!(address.len(), ACCOUNT_ID_LEN);
        assert!(address.starts_with('G'));
        assert_eq!(decode_account_id(&address).unwrap(), key);
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let mut tampered = ZERO_ACCOUNT.to_string();
        tampered.replace_range(10..11, "B");
        assert!(!is_valid_account_id(&tampered));
    }

    #[test]
    fn test_malformed_ids_rejected() {
        assert!(!is_valid_account_id("GABC"));
        assert!(!is_valid_account_id(""));
        assert!(!is_valid_account_id(&format!("{}$memo", ZERO_ACCOUNT)));
    }
}
