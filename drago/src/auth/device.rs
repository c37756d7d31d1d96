//! Device and user code generation for the RFC 8628 device authorization grant.
//!
//! The device code is a high-entropy secret held by the polling client; only its SHA-256 digest is
//! stored. The user code is short and typed by a human, so it draws from an alphabet without vowels
//! or look-alike characters and is displayed as `XXXX-XXXX`.

use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;
use sha2::{Digest, Sha256};

pub const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ";
pub const USER_CODE_LEN: usize = 8;

/// Seconds added to the polling interval each time a client polls too fast.
pub const SLOW_DOWN_INCREMENT_SECS: i32 = 5;

/// Generate a 256-bit device code, base64url encoded without padding.
pub fn generate_device_code() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// The form a device code is stored and looked up by.
pub fn hash_device_code(device_code: &str) -> String {
    let digest = Sha256::digest(device_code.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a normalized (undashed) user code.
pub fn generate_user_code() -> String {
    let mut rng = rng();
    (0..USER_CODE_LEN)
        .map(|_| USER_CODE_ALPHABET[rng.random_range(0..USER_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Upper-case and strip dashes and whitespace, so `bcdf-ghjk` and `BCDF GHJK` match `BCDFGHJK`.
pub fn normalize_user_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Display form of a normalized user code.
pub fn format_user_code(code: &str) -> String {
    if code.len() == USER_CODE_LEN && code.is_ascii() {
        format!("{}-{}", &code[..USER_CODE_LEN / 2], &code[USER_CODE_LEN / 2..])
    } else {
        code.to_string()
    }
}

/// Whether a normalized code could have been issued by [`generate_user_code`].
pub fn is_well_formed_user_code(code: &str) -> bool {
    code.len() == USER_CODE_LEN && code.bytes().all(|b| USER_CODE_ALPHABET.contains(&b))
}
