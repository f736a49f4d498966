// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signed, expiring identity tokens (HS256 JWT).
//!
//! Tokens are stateless: validity depends only on the signature and the
//! expiry at verification time. There is no revocation list.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Decoded payload of a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Login the token was issued to.
    pub login: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,
}

/// Mints and verifies identity tokens with one shared signing secret.
pub struct TokenAuthority {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl TokenAuthority {
    /// Lifetime applied when none is configured.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

    /// Create an authority signing with `secret`.
    ///
    /// A zero `ttl` falls back to [`Self::DEFAULT_TTL`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptySecretKey`] if `secret` is empty.
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(VaultError::EmptySecretKey);
        }

        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            ttl: if ttl.is_zero() { Self::DEFAULT_TTL } else { ttl },
        })
    }

    /// Configured token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `login` that expires `ttl` from now.
    pub fn issue(&self, login: &str) -> Result<String> {
        self.issue_at(login, unix_now())
    }

    /// Issue a token as if the current time were `now` (seconds since epoch).
    pub fn issue_at(&self, login: &str, now: u64) -> Result<String> {
        let claims = Claims {
            login: login.to_string(),
            exp: now.saturating_add(self.ttl.as_secs()),
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| VaultError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature, algorithm, structure, and expiry.
    ///
    /// # Errors
    ///
    /// [`VaultError::TokenExpired`] once `now > exp`, and
    /// [`VaultError::InvalidToken`] for anything else that is wrong.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VaultError::TokenExpired,
                _ => VaultError::InvalidToken,
            })
    }
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
