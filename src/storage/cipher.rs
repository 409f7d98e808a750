//! AES-256-CTR encryption at rest
//!
//! Encrypted files hold a JSON envelope instead of the plain object:
//!
//! ```text
//! { "iv": "<32 hex chars>", "data": "<hex cipher text>" }
//! ```
//!
//! A fresh random 16-byte IV is drawn for every file write. CTR mode has no
//! authentication tag; a wrong key yields garbage that fails JSON parsing and
//! is then handled by the caller.

use std::fmt;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardError};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Key size for AES-256 (bytes)
pub const KEY_SIZE: usize = 32;

/// Counter block / IV size (bytes)
pub const IV_SIZE: usize = 16;

/// Hex-encoded cipher envelope as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: String,
    pub data: String,
}

/// Table encryption key
#[derive(Clone)]
pub struct Cipher {
    key: [u8; KEY_SIZE],
}

impl Cipher {
    /// Build from raw key bytes (must be exactly 32 bytes)
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| {
            ShardError::Config(format!(
                "security key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Build from a 32-character security key string
    pub fn from_security_key(key: &str) -> Result<Self> {
        Self::new(key.as_bytes())
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        self.encrypt_with_iv(plaintext, &iv)
    }

    pub fn encrypt_with_iv(&self, plaintext: &[u8], iv: &[u8; IV_SIZE]) -> Result<Envelope> {
        let mut data = plaintext.to_vec();
        self.keystream(iv)?.apply_keystream(&mut data);
        Ok(Envelope {
            iv: hex::encode(iv),
            data: hex::encode(data),
        })
    }

    /// Reverse [`encrypt`](Self::encrypt). Fails on malformed hex or a
    /// missing/short IV; never on a wrong key.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let iv = hex::decode(&envelope.iv)
            .map_err(|e| ShardError::Crypto(format!("invalid iv: {}", e)))?;
        if iv.len() != IV_SIZE {
            return Err(ShardError::Crypto(format!(
                "iv must be {} bytes, got {}",
                IV_SIZE,
                iv.len()
            )));
        }
        let mut data = hex::decode(&envelope.data)
            .map_err(|e| ShardError::Crypto(format!("invalid cipher text: {}", e)))?;

        self.keystream(&iv)?.apply_keystream(&mut data);
        Ok(data)
    }

    fn keystream(&self, iv: &[u8]) -> Result<Aes256Ctr> {
        Aes256Ctr::new_from_slices(&self.key, iv)
            .map_err(|e| ShardError::Crypto(format!("cipher init failed: {}", e)))
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").field("key", &"<redacted>").finish()
    }
}
