//! TOTP two-factor support.
//!
//! Secrets are base32 strings. When `MFA_ENCRYPTION_KEY` is configured they
//! are sealed with AES-256-GCM before storage as hex(nonce || ciphertext);
//! otherwise they are stored as-is.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum TwoFactorError {
    #[error("Invalid encryption key length (expected 32 bytes, got {0})")]
    InvalidKeyLength(usize),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid sealed secret format")]
    InvalidFormat,

    #[error("Hex decoding failed: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid TOTP secret: {0}")]
    Secret(String),

    #[error("QR code generation failed: {0}")]
    Qr(String),
}

pub type TwoFactorResult<T> = Result<T, TwoFactorError>;

/// Seals and opens stored TOTP secrets.
#[derive(Clone)]
pub struct SecretVault {
    cipher: Option<Aes256Gcm>,
}

impl SecretVault {
    /// Build from the hex key in configuration. `None` stores secrets unsealed.
    pub fn from_hex_key(hex_key: Option<&str>) -> TwoFactorResult<Self> {
        let cipher = match hex_key {
            None => None,
            Some(hex_key) => {
                let key = hex::decode(hex_key)?;
                if key.len() != 32 {
                    return Err(TwoFactorError::InvalidKeyLength(key.len()));
                }
                Some(
                    Aes256Gcm::new_from_slice(&key)
                        .map_err(|_| TwoFactorError::InvalidKeyLength(key.len()))?,
                )
            }
        };
        Ok(Self { cipher })
    }

    #[must_use]
    pub const fn is_sealing(&self) -> bool {
        self.cipher.is_some()
    }

    /// Prepare a base32 secret for storage.
    pub fn seal(&self, secret: &str) -> TwoFactorResult<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(secret.to_string());
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, secret.as_bytes())
            .map_err(|_| TwoFactorError::EncryptionFailed)?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(hex::encode(combined))
    }

    /// Recover the base32 secret from its stored form.
    pub fn open(&self, stored: &str) -> TwoFactorResult<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(stored.to_string());
        };

        let combined = hex::decode(stored)?;
        if combined.len() <= NONCE_LEN {
            return Err(TwoFactorError::InvalidFormat);
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| TwoFactorError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| TwoFactorError::DecryptionFailed)
    }
}

/// Generate a fresh 160-bit base32 secret.
#[must_use]
pub fn generate_secret() -> String {
    Secret::default().to_encoded().to_string()
}

/// Build the TOTP (SHA1, 6 digits, 30 s step, one step of skew).
pub fn build_totp(secret: &str, issuer: &str, account: &str) -> TwoFactorResult<TOTP> {
    let bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| TwoFactorError::Secret(e.to_string()))?;

    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| TwoFactorError::Secret(e.to_string()))
}

/// Check a submitted code against the current time window.
#[must_use]
pub fn verify_code(totp: &TOTP, code: &str) -> bool {
    let code = code.trim();
    code.len() == 6 && totp.check_current(code).unwrap_or(false)
}

/// PNG QR code of the `otpauth://` URL as a data URL.
pub fn qr_data_url(totp: &TOTP) -> TwoFactorResult<String> {
    let png = totp.get_qr_base64().map_err(TwoFactorError::Qr)?;
    Ok(format!("data:image/png;base64,{png}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_seal_open_roundtrip() {
        let vault = SecretVault::from_hex_key(Some(KEY)).unwrap();
        let secret = generate_secret();

        let sealed = vault.seal(&secret).unwrap();
        assert_ne!(sealed, secret);
        assert_eq!(vault.open(&sealed).unwrap(), secret);
    }

    #[test]
    fn test_sealing_uses_random_nonce() {
        let vault = SecretVault::from_hex_key(Some(KEY)).unwrap();
        let a = vault.seal("JBSWY3DPEHPK3PXP").unwrap();
        let b = vault.seal("JBSWY3DPEHPK3PXP").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let vault = SecretVault::from_hex_key(Some(KEY)).unwrap();
        let other = SecretVault::from_hex_key(Some(&"ff".repeat(32))).unwrap();
        let sealed = vault.seal("JBSWY3DPEHPK3PXP").unwrap();
        assert!(matches!(other.open(&sealed), Err(TwoFactorError::DecryptionFailed)));
    }

    #[test]
    fn test_short_key_rejected() {
        let result = SecretVault::from_hex_key(Some("0011"));
        assert!(matches!(result, Err(TwoFactorError::InvalidKeyLength(2))));
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let vault = SecretVault::from_hex_key(Some(KEY)).unwrap();
        assert!(matches!(vault.open("00112233"), Err(TwoFactorError::InvalidFormat)));
    }

    #[test]
    fn test_without_key_secrets_pass_through() {
        let vault = SecretVault::from_hex_key(None).unwrap();
        assert!(!vault.is_sealing());
        assert_eq!(vault.seal("ABC").unwrap(), "ABC");
        assert_eq!(vault.open("ABC").unwrap(), "ABC");
    }

    #[test]
    fn test_current_code_verifies() {
        let totp = build_totp(&generate_secret(), "Logia", "hermano@example.org").unwrap();
        let code = totp.generate_current().unwrap();
        assert!(verify_code(&totp, &code));
        assert!(!verify_code(&totp, "12345"));
    }

    #[test]
    fn test_qr_is_png_data_url() {
        let totp = build_totp(&generate_secret(), "Logia", "hermano@example.org").unwrap();
        let url = qr_data_url(&totp).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
