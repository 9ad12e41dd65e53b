use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Decrypts an AES-256-GCM secret using a base64-encoded key
pub fn decrypt_from_base64_key(private_key: &str, cipher_text: &str) -> Result<String> {
    let key = STANDARD
        .decode(private_key.trim())
        .context("Failed to decode base64 private key")?;

    decrypt_with_key(&key, cipher_text)
}

/// Core decryption: `cipher_text` is base64 of nonce || ciphertext || tag
fn decrypt_with_key(key: &[u8], cipher_text: &str) -> Result<String> {
    let encrypted_data = STANDARD
        .decode(cipher_text.trim())
        .context("Failed to decode base64 cipher text")?;

    if encrypted_data.len() < NONCE_LEN + TAG_LEN {
        anyhow::bail!("Encrypted data too short (need at least 28 bytes for nonce + tag)");
    }

    let (nonce_bytes, payload) = encrypted_data.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key).context("Invalid key length for AES-256-GCM")?;
    let nonce = Nonce::from_slice(nonce_bytes);

    // aes-gcm expects the tag appended to the ciphertext, which is how it is stored
    let plaintext = cipher
        .decrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("Decryption failed: {:?}", e))?;

    String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
}
