//! Symmetric encryption of provider tokens and generation of record-scoped API keys.
//!
//! Provider tokens are sealed with AES-256-GCM. Each encryption draws a fresh 96-bit nonce, and the
//! 128-bit authentication tag is stored apart from the ciphertext so the three parts map onto the
//! `nonce`, `token_encrypted` and `tag` columns of `dns_token`.
//!
//! API keys have the shape `dgo_{prefix}_{secret}`. The prefix is stored in clear and used for lookup,
//! the secret only ever exists as an Argon2 hash.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use rand::distr::Alphanumeric;
use rand::prelude::RngExt;
use rand::rng;
use thiserror::Error;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

pub const API_KEY_SCHEME: &str = "dgo";
pub const API_KEY_PREFIX_LEN: usize = 12;
pub const API_KEY_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key, tampered ciphertext or tag, or malformed parts
    #[error("decryption failed")]
    Decrypt,

    #[error("malformed API key")]
    MalformedApiKey,
}

/// The three stored parts of an encrypted provider token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedToken {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// AES-256-GCM cipher built once from the configured key and shared through application state.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "must be {KEY_LEN} bytes (256 bits), got {} bytes",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Build a cipher from the textual key in configuration: 64 hex characters or standard base64.
    pub fn from_encoded_key(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        let bytes = if encoded.len() == KEY_LEN * 2 && encoded.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(encoded).map_err(|e| CryptoError::InvalidKey(format!("bad hex: {e}")))?
        } else {
            general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::InvalidKey(format!("not hex or base64: {e}")))?
        };
        Self::new(&bytes)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedToken, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut sealed = self.cipher.encrypt(nonce, plaintext).map_err(|_| CryptoError::Encrypt)?;
        // aes-gcm appends the tag to the ciphertext
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(EncryptedToken {
            nonce: nonce_bytes.to_vec(),
            ciphertext: sealed,
            tag,
        })
    }

    pub fn decrypt(&self, token: &EncryptedToken) -> Result<Vec<u8>, CryptoError> {
        if token.nonce.len() != NONCE_LEN || token.tag.len() != TAG_LEN {
            return Err(CryptoError::Decrypt);
        }

        let nonce = Nonce::from_slice(&token.nonce);
        let mut sealed = Vec::with_capacity(token.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&token.ciphertext);
        sealed.extend_from_slice(&token.tag);

        self.cipher.decrypt(nonce, sealed.as_slice()).map_err(|_| CryptoError::Decrypt)
    }

    /// Decrypt and interpret the plaintext as UTF-8.
    pub fn decrypt_to_string(&self, token: &EncryptedToken) -> Result<String, CryptoError> {
        String::from_utf8(self.decrypt(token)?).map_err(|_| CryptoError::Decrypt)
    }
}

fn random_string(len: usize) -> String {
    rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// A freshly minted API key. `full` is shown to the user exactly once.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub full: String,
    pub prefix: String,
    pub secret: String,
}

/// Generates an API key of the form `dgo_{12-char prefix}_{32-char secret}`.
pub fn generate_api_key() -> GeneratedApiKey {
    let prefix = random_string(API_KEY_PREFIX_LEN);
    let secret = random_string(API_KEY_SECRET_LEN);
    GeneratedApiKey {
        full: format!("{API_KEY_SCHEME}_{prefix}_{secret}"),
        prefix,
        secret,
    }
}

/// Whether a bearer credential looks like one of our API keys rather than a session JWT.
pub fn looks_like_api_key(token: &str) -> bool {
    token.starts_with(&format!("{API_KEY_SCHEME}_"))
}

/// Split a presented API key into `(prefix, secret)`.
pub fn parse_api_key(key: &str) -> Result<(&str, &str), CryptoError> {
    let rest = key
        .strip_prefix(API_KEY_SCHEME)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(CryptoError::MalformedApiKey)?;
    let (prefix, secret) = rest.split_once('_').ok_or(CryptoError::MalformedApiKey)?;

    let valid = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_alphanumeric());
    if !valid(prefix, API_KEY_PREFIX_LEN) || !valid(secret, API_KEY_SECRET_LEN) {
        return Err(CryptoError::MalformedApiKey);
    }
    Ok((prefix, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> TokenCipher {
        TokenCipher::from_encoded_key(HEX_KEY).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let sealed = cipher.encrypt(b"cf-token-abc123").unwrap();

        assert_eq!(sealed.nonce.len(), NONCE_LEN);
        assert_eq!(sealed.tag.len(), TAG_LEN);
        assert_eq!(sealed.ciphertext.len(), "cf-token-abc123".len());
        assert_eq!(cipher.decrypt_to_string(&sealed).unwrap(), "cf-token-abc123");
    }

    #[test]
    fn test_nonce_is_fresh_per_encryption() {
        let cipher = cipher();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_tampered_tag_fails() {
        let cipher = cipher();
        let mut sealed = cipher.encrypt(b"secret").unwrap();
        sealed.tag[0] ^= 0xff;
        assert!(matches!(cipher.decrypt(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = cipher().encrypt(b"secret").unwrap();
        let other = TokenCipher::new(&[7u8; KEY_LEN]).unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_key_encodings() {
        let from_hex = TokenCipher::from_encoded_key(HEX_KEY).unwrap();
        let bytes: Vec<u8> = (0u8..32).collect();
        let from_b64 = TokenCipher::from_encoded_key(&general_purpose::STANDARD.encode(&bytes)).unwrap();

        let sealed = from_hex.encrypt(b"interop").unwrap();
        assert_eq!(from_b64.decrypt(&sealed).unwrap(), b"interop");

        // Upper-case hex decodes to the same key
        let from_upper = TokenCipher::from_encoded_key(&HEX_KEY.to_uppercase()).unwrap();
        assert_eq!(from_upper.decrypt(&sealed).unwrap(), b"interop");

        assert!(TokenCipher::from_encoded_key("abcd").is_err());
        assert!(TokenCipher::from_encoded_key(&"zz".repeat(KEY_LEN)).is_err());
        assert!(TokenCipher::from_encoded_key("not base64 !!").is_err());
    }

    #[test]
    fn test_generate_and_parse_api_key() {
        let key = generate_api_key();
        assert!(key.full.starts_with("dgo_"));
        assert_eq!(key.full.len(), 4 + API_KEY_PREFIX_LEN + 1 + API_KEY_SECRET_LEN);
        assert!(looks_like_api_key(&key.full));

        let (prefix, secret) = parse_api_key(&key.full).unwrap();
        assert_eq!(prefix, key.prefix);
        assert_eq!(secret, key.secret);

        assert!(key.prefix.bytes().chain(key.secret.bytes()).all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(generate_api_key().full, key.full);
    }

    #[test]
    fn test_parse_api_key_rejects_malformed() {
        assert!(parse_api_key("sk-whatever").is_err());
        assert!(parse_api_key("dgo_short_secret").is_err());
        assert!(parse_api_key("dgo_ABCDEFGHIJKL").is_err());
        assert!(parse_api_key(&format!("dgo_ABCDEFGHIJK!_{}", "a".repeat(API_KEY_SECRET_LEN))).is_err());
        assert!(!looks_like_api_key("eyJhbGciOiJIUzI1NiJ9.e30.sig"));
    }
}
