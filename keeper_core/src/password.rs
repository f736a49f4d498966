// SPDX-License-Identifier: MIT OR Apache-2.0
//! Login password hashing with Argon2id.
//!
//! Hashes are self-describing PHC strings with a random per-user salt.
//! An optional server-wide pepper is mixed in as the Argon2 secret input.

use std::fmt;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Hashes and verifies account passwords.
pub struct CredentialHasher {
    pepper: Zeroizing<Vec<u8>>,
    params: Params,
}

impl CredentialHasher {
    /// Hasher with Argon2 default cost parameters and the given pepper
    /// (may be empty).
    #[must_use]
    pub fn new(pepper: impl AsRef<[u8]>) -> Self {
        Self {
            pepper: Zeroizing::new(pepper.as_ref().to_vec()),
            params: Params::default(),
        }
    }

    /// Override the cost parameters.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::PasswordHash`] if Argon2 rejects the parameters.
    pub fn with_params(mut self, memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        self.params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| VaultError::PasswordHash(format!("invalid Argon2 params: {e}")))?;
        Ok(self)
    }

    fn argon2(&self) -> Result<Argon2<'_>> {
        if self.pepper.is_empty() {
            return Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            ));
        }
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| VaultError::PasswordHash(format!("invalid pepper: {e}")))
    }

    /// Produce a PHC-format hash of `password` under a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| VaultError::PasswordHash(e.to_string()))
    }

    /// Check `password` against a hash produced by [`Self::hash`].
    ///
    /// # Errors
    ///
    /// [`VaultError::PasswordMismatch`] when the password is wrong, and
    /// [`VaultError::PasswordHash`] when `stored` cannot be parsed.
    pub fn verify(&self, password: &str, stored: &str) -> Result<()> {
        let parsed =
            PasswordHash::new(stored).map_err(|e| VaultError::PasswordHash(e.to_string()))?;

        self.argon2()?
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|e| match e {
                argon2::password_hash::Error::Password => VaultError::PasswordMismatch,
                other => VaultError::PasswordHash(other.to_string()),
            })
    }
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("peppered", &!self.pepper.is_empty())
            .field("params", &self.params)
            .finish()
    }
}
