//! Session token cryptography

pub mod aes;

pub use aes::{decrypt, encrypt, EncryptionError, EncryptionKey};
