pub mod aes_gcm;

pub use aes_gcm::decrypt_from_base64_key;
