//! Credential Cipher
//!
//! Symmetric encryption for passwords stored in the registry. The operator
//! secret is hashed down to an AES-256 key; every encryption draws a fresh
//! nonce and prepends it to the ciphertext, so two encryptions of the same
//! password never match.

use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Nonce length for AES-GCM
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts stored credentials
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Derive the key from an operator-supplied secret
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypt to base64(nonce ‖ ciphertext)
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Cipher(format!("Encryption failed: {}", e)))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    /// Reverse of [`CredentialCipher::encrypt`]
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Cipher(format!("Invalid encoding: {}", e)))?;

        if sealed.len() < NONCE_LEN {
            return Err(Error::Cipher("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| Error::Cipher(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| Error::Cipher(format!("Invalid UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(<redacted>)")
    }
}
