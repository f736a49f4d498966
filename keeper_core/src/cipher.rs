// SPDX-License-Identifier: MIT OR Apache-2.0
//! AES-256-GCM field encryption.
//!
//! Every sensitive field is sealed on its own. The stored form is
//! `hex(nonce || ciphertext || tag)`.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::{Result, VaultError};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// 12-byte nonce for AES-GCM (96 bits is the standard).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Hex-encoded AEAD output as it is persisted.
///
/// Storage only ever sees values of this type, never plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct Sealed(String);

impl Sealed {
    /// Wrap a value previously produced by [`Cipher::encrypt`] and read back
    /// from a storage backend.
    ///
    /// Only storage backends rehydrating persisted rows should call this.
    /// The wrapped string is not checked, so a value that was never sealed
    /// fails later in [`Cipher::decrypt`].
    #[doc(hidden)]
    #[must_use]
    pub fn from_stored(encoded: String) -> Self {
        Self(encoded)
    }

    /// The stored representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the stored representation.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Sealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sealed({} hex chars)", self.0.len())
    }
}

/// Symmetric authenticated cipher built from one shared 32-byte key.
///
/// The key schedule is expanded once and reused for every field and chunk.
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    /// Build a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SecretKeyLen`] unless `key` is exactly
    /// [`KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(VaultError::SecretKeyLen {
                expected: KEY_SIZE,
                actual: key.len(),
            });
        }
        let aead = Aes256Gcm::new_from_slice(key)
            .map_err(|e| VaultError::EncryptionFailed(format!("invalid key: {e}")))?;
        Ok(Self { aead })
    }

    /// Seal `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Sealed> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::EncryptionFailed(format!("seal failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(Sealed(hex::encode(out)))
    }

    /// Seal a UTF-8 string field.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<Sealed> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Authenticate and open a sealed value.
    ///
    /// Bad hex, truncation, and tag mismatch all collapse into
    /// [`VaultError::DecryptionFailed`].
    pub fn decrypt(&self, sealed: &Sealed) -> Result<Vec<u8>> {
        let raw = hex::decode(&sealed.0).map_err(|_| VaultError::DecryptionFailed)?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::DecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        self.aead
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }

    /// Open a sealed UTF-8 string field.
    pub fn decrypt_string(&self, sealed: &Sealed) -> Result<String> {
        let bytes = self.decrypt(sealed)?;
        String::from_utf8(bytes).map_err(|_| VaultError::DecryptionFailed)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const KEY: &[u8; KEY_SIZE] = b"0123456789abcdef0123456789abcdef";

    fn cipher() -> Cipher {
        Cipher::new(KEY).unwrap()
    }

    #[test]
    fn test_string_roundtrip() {
        let cipher = cipher();
        let sealed = cipher.encrypt_str("4111 1111 1111 1111").unwrap();
        assert_eq!(cipher.decrypt_string(&sealed).unwrap(), "4111 1111 1111 1111");
    }

    #[test]
    fn test_stored_form_is_hex_with_nonce_and_tag() {
        let sealed = cipher().encrypt(b"secret").unwrap();
        let raw = hex::decode(sealed.as_str()).unwrap();
        assert_eq!(raw.len(), NONCE_SIZE + b"secret".len() + TAG_SIZE);
        assert!(!sealed.as_str().contains("secret"));
    }

    #[test]
    fn test_each_encryption_unique_nonce() {
        let cipher = cipher();
        let a = cipher.encrypt(b"same text").unwrap();
        let b = cipher.encrypt(b"same text").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.as_str()[..NONCE_SIZE * 2], b.as_str()[..NONCE_SIZE * 2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn test_encrypt_decrypt_roundtrip(
            key in any::<[u8; KEY_SIZE]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..4096),
        ) {
            let cipher = Cipher::new(&key).unwrap();
            let sealed = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
        }

        #[test]
        fn test_any_byte_flip_is_detected(
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
            at in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let cipher = cipher();
            let sealed = cipher.encrypt(&plaintext).unwrap();
            let mut raw = hex::decode(sealed.as_str()).unwrap();

            let i = at.index(raw.len());
            raw[i] ^= mask;
            let tampered = Sealed::from_stored(hex::encode(raw));
            prop_assert_eq!(cipher.decrypt(&tampered), Err(VaultError::DecryptionFailed));
        }

        #[test]
        fn test_key_length_enforced(
            len in (0usize..128).prop_filter("must not be the AES-256 key size", |l| *l != KEY_SIZE),
        ) {
            let err = Cipher::new(&vec![7u8; len]).unwrap_err();
            prop_assert_eq!(
                err,
                VaultError::SecretKeyLen {
                    expected: KEY_SIZE,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn test_exact_key_length_accepted() {
        assert!(Cipher::new(&[7u8; KEY_SIZE]).is_ok());
    }

    #[test]
    fn test_truncated_and_garbage_input() {
        let cipher = cipher();
        let sealed = cipher.encrypt(b"data").unwrap();

        let truncated = Sealed::from_stored(sealed.as_str()[..20].to_string());
        assert_eq!(cipher.decrypt(&truncated), Err(VaultError::DecryptionFailed));

        let not_hex = Sealed::from_stored("zz-not-hex".to_string());
        assert_eq!(cipher.decrypt(&not_hex), Err(VaultError::DecryptionFailed));

        let empty = Sealed::from_stored(String::new());
        assert_eq!(cipher.decrypt(&empty), Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = cipher().encrypt(b"secret").unwrap();
        let other = Cipher::new(&[1u8; KEY_SIZE]).unwrap();
        assert_eq!(other.decrypt(&sealed), Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn test_non_utf8_plaintext_rejected_as_string() {
        let cipher = cipher();
        let sealed = cipher.encrypt(&[0xff, 0xfe, 0xfd]).unwrap();
        assert_eq!(
            cipher.decrypt_string(&sealed),
            Err(VaultError::DecryptionFailed)
        );
    }

    #[test]
    fn test_debug_does_not_leak() {
        let cipher = cipher();
        assert!(!format!("{cipher:?}").contains("0123"));
        let sealed = cipher.encrypt(b"x").unwrap();
        assert!(format!("{sealed:?}").starts_with("Sealed("));
    }
}
