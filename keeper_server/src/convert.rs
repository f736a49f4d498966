//! Conversion between vault types and protobuf messages.

use keeper_core::{Card, Entry, LoginPass, SecretSummary, Text, UploadSummary};

use crate::proto;

/// Convert summaries to a list response.
#[must_use]
pub fn summaries_to_proto(summaries: Vec<SecretSummary>) -> proto::ListSecretsResponse {
    proto::ListSecretsResponse {
        secrets: summaries
            .into_iter()
            .map(|s| proto::SecretSummary {
                id: s.id,
                title: s.title,
            })
            .collect(),
    }
}

/// Convert an add request to a plaintext login/password record.
#[must_use]
pub fn login_pass_from_proto(req: proto::AddLoginPassRequest) -> LoginPass {
    LoginPass {
        title: req.title,
        login: req.login,
        password: req.password,
    }
}

/// Convert a decrypted login/password entry to its response.
#[must_use]
pub fn login_pass_to_proto(entry: Entry<LoginPass>) -> proto::LoginPassRecord {
    let Entry { id, secret } = entry;
    proto::LoginPassRecord {
        id,
        title: secret.title,
        login: secret.login,
        password: secret.password,
    }
}

/// Convert an add request to a plaintext note.
#[must_use]
pub fn text_from_proto(req: proto::AddTextRequest) -> Text {
    Text {
        title: req.title,
        body: req.body,
    }
}

/// Convert a decrypted note to its response.
#[must_use]
pub fn text_to_proto(entry: Entry<Text>) -> proto::TextRecord {
    let Entry { id, secret } = entry;
    proto::TextRecord {
        id,
        title: secret.title,
        body: secret.body,
    }
}

/// Convert an add request to a plaintext card record.
#[must_use]
pub fn card_from_proto(req: proto::AddCardRequest) -> Card {
    Card {
        title: req.title,
        number: req.number,
        owner: req.owner,
        exp_date: req.exp_date,
        cvc: req.cvc,
    }
}

/// Convert a decrypted card entry to its response.
#[must_use]
pub fn card_to_proto(entry: Entry<Card>) -> proto::CardRecord {
    let Entry { id, secret } = entry;
    proto::CardRecord {
        id,
        title: secret.title,
        number: secret.number,
        owner: secret.owner,
        exp_date: secret.exp_date,
        cvc: secret.cvc,
    }
}

/// Convert an upload summary to the `AddBinary` response.
#[must_use]
pub const fn upload_to_proto(summary: &UploadSummary) -> proto::AddBinaryResponse {
    proto::AddBinaryResponse {
        id: summary.binary_id,
        chunks: summary.chunks,
        size: summary.bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_roundtrip_fields() {
        let card = card_from_proto(proto::AddCardRequest {
            title: "visa".into(),
            number: "4111".into(),
            owner: "A B".into(),
            exp_date: "12/30".into(),
            cvc: "123".into(),
        });
        let record = card_to_proto(Entry { id: 7, secret: card });

        assert_eq!(record.id, 7);
        assert_eq!(record.number, "4111");
        assert_eq!(record.exp_date, "12/30");
        assert_eq!(record.cvc, "123");
    }

    #[test]
    fn test_summaries_keep_order() {
        let list = summaries_to_proto(vec![
            SecretSummary { id: 2, title: "b".into() },
            SecretSummary { id: 5, title: "a".into() },
        ]);
        let ids: Vec<i64> = list.secrets.iter().map(|s| s.id).collect();
        assert_eq!(ids, [2, 5]);
    }

    #[test]
    fn test_upload_summary() {
        let response = upload_to_proto(&UploadSummary {
            binary_id: 3,
            chunks: 3,
            bytes: 2500,
        });
        assert_eq!((response.id, response.chunks, response.size), (3, 3, 2500));
    }
}
