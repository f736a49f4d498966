// SPDX-License-Identifier: MIT OR Apache-2.0
//! Vault entities in plaintext and sealed form.
//!
//! Plaintext records cross the API boundary; sealed records cross the
//! storage boundary. Converting between the two goes through [`Seal`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cipher::{Cipher, Sealed};
use crate::error::Result;

/// Identifier of a stored secret or binary.
pub type SecretId = i64;

/// Internal owner key a secret is filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    /// PHC-format Argon2 hash; never the raw password.
    pub password_hash: String,
}

/// A record paired with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub id: SecretId,
    pub secret: T,
}

/// Listing row: id and title, no sensitive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSummary {
    pub id: SecretId,
    pub title: String,
}

/// Website or application credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginPass {
    pub title: String,
    pub login: String,
    pub password: String,
}

/// Free-form note.
#[derive(Clone, PartialEq, Eq)]
pub struct Text {
    pub title: String,
    pub body: String,
}

/// Payment card.
#[derive(Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub number: String,
    pub owner: String,
    pub exp_date: String,
    pub cvc: String,
}

macro_rules! redacted_debug {
    ($ty:ident) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("title", &self.title)
                    .finish_non_exhaustive()
            }
        }
    };
}

redacted_debug!(LoginPass);
redacted_debug!(Text);
redacted_debug!(Card);

/// [`LoginPass`] as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedLoginPass {
    pub title: String,
    pub login: Sealed,
    pub password: Sealed,
}

/// [`Text`] as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedText {
    pub title: String,
    pub body: Sealed,
}

/// [`Card`] as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCard {
    pub title: String,
    pub number: Sealed,
    pub owner: Sealed,
    pub exp_date: Sealed,
    pub cvc: Sealed,
}

/// Binary secret metadata.
///
/// `chunk_count` stays `None` until every chunk of the upload is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRecord {
    pub id: SecretId,
    pub title: String,
    pub chunk_count: Option<u32>,
}

impl BinaryRecord {
    /// Whether the upload finished and the content can be served.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.chunk_count.is_some()
    }
}

/// One encrypted segment of a binary secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedChunk {
    pub binary_id: SecretId,
    /// 1-based position of the segment in the original byte stream.
    pub order_number: u32,
    pub payload: Sealed,
}

/// Outcome of a finished upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub binary_id: SecretId,
    pub chunks: u32,
    pub bytes: u64,
}

/// Field-by-field conversion between a plaintext record and its sealed form.
///
/// Any failing field aborts the whole conversion, so no partial record is
/// ever produced in either direction.
pub trait Seal: Sized {
    type Sealed;

    fn seal(&self, cipher: &Cipher) -> Result<Self::Sealed>;

    fn open(sealed: &Self::Sealed, cipher: &Cipher) -> Result<Self>;
}

impl Seal for LoginPass {
    type Sealed = SealedLoginPass;

    fn seal(&self, cipher: &Cipher) -> Result<SealedLoginPass> {
        Ok(SealedLoginPass {
            title: self.title.clone(),
            login: cipher.encrypt_str(&self.login)?,
            password: cipher.encrypt_str(&self.password)?,
        })
    }

    fn open(sealed: &SealedLoginPass, cipher: &Cipher) -> Result<Self> {
        Ok(Self {
            title: sealed.title.clone(),
            login: cipher.decrypt_string(&sealed.login)?,
            password: cipher.decrypt_string(&sealed.password)?,
        })
    }
}

impl Seal for Text {
    type Sealed = SealedText;

    fn seal(&self, cipher: &Cipher) -> Result<SealedText> {
        Ok(SealedText {
            title: self.title.clone(),
            body: cipher.encrypt_str(&self.body)?,
        })
    }

    fn open(sealed: &SealedText, cipher: &Cipher) -> Result<Self> {
        Ok(Self {
            title: sealed.title.clone(),
            body: cipher.decrypt_string(&sealed.body)?,
        })
    }
}

impl Seal for Card {
    type Sealed = SealedCard;

    fn seal(&self, cipher: &Cipher) -> Result<SealedCard> {
        Ok(SealedCard {
            title: self.title.clone(),
            number: cipher.encrypt_str(&self.number)?,
            owner: cipher.encrypt_str(&self.owner)?,
            exp_date: cipher.encrypt_str(&self.exp_date)?,
            cvc: cipher.encrypt_str(&self.cvc)?,
        })
    }

    fn open(sealed: &SealedCard, cipher: &Cipher) -> Result<Self> {
        Ok(Self {
            title: sealed.title.clone(),
            number: cipher.decrypt_string(&sealed.number)?,
            owner: cipher.decrypt_string(&sealed.owner)?,
            exp_date: cipher.decrypt_string(&sealed.exp_date)?,
            cvc: cipher.decrypt_string(&sealed.cvc)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;

    fn cipher() -> Cipher {
        Cipher::new(&[9u8; 32]).unwrap()
    }

    fn card() -> Card {
        Card {
            title: "visa".to_string(),
            number: "4111111111111111".to_string(),
            owner: "ALICE EXAMPLE".to_string(),
            exp_date: "12/29".to_string(),
            cvc: "123".to_string(),
        }
    }

    #[test]
    fn test_card_seal_open() {
        let cipher = cipher();
        let sealed = card().seal(&cipher).unwrap();

        assert_eq!(sealed.title, "visa");
        assert!(!sealed.number.as_str().contains("4111"));
        assert_eq!(Card::open(&sealed, &cipher).unwrap(), card());
    }

    #[test]
    fn test_one_bad_field_fails_whole_record() {
        let cipher = cipher();
        let mut sealed = card().seal(&cipher).unwrap();
        sealed.cvc = Sealed::from_stored("00".repeat(40));

        assert_eq!(
            Card::open(&sealed, &cipher),
            Err(VaultError::DecryptionFailed)
        );
    }

    #[test]
    fn test_login_pass_and_text() {
        let cipher = cipher();
        let lp = LoginPass {
            title: "site".to_string(),
            login: "u".to_string(),
            password: "p".to_string(),
        };
        let sealed = lp.seal(&cipher).unwrap();
        assert_eq!(LoginPass::open(&sealed, &cipher).unwrap(), lp);

        let text = Text {
            title: "note".to_string(),
            body: String::new(),
        };
        let sealed = text.seal(&cipher).unwrap();
        assert_eq!(Text::open(&sealed, &cipher).unwrap(), text);
    }

    #[test]
    fn test_debug_shows_only_title() {
        let rendered = format!("{:?}", card());
        assert!(rendered.contains("visa"));
        assert!(!rendered.contains("4111"));
        assert!(!rendered.contains("123"));
    }

    #[test]
    fn test_binary_completion() {
        let mut record = BinaryRecord {
            id: 1,
            title: String::new(),
            chunk_count: None,
        };
        assert!(!record.is_complete());
        record.chunk_count = Some(0);
        assert!(record.is_complete());
    }
}
