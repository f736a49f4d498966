// SPDX-License-Identifier: MIT OR Apache-2.0
//! gRPC integration tests for keeper_server.
//!
//! These tests start a real server on an ephemeral port and drive it
//! through the generated clients.

use std::time::Duration;

use keeper_core::TokenAuthority;
use keeper_server::proto::account_client::AccountClient;
use keeper_server::proto::health_client::HealthClient;
use keeper_server::proto::vault_client::VaultClient;
use keeper_server::proto::{
    AddCardRequest, AddLoginPassRequest, AddTextRequest, AuthUserRequest, BinaryChunk,
    GetSecretRequest, HealthCheckRequest, ListSecretsRequest, RegisterUserRequest,
    ServingStatus, SetBinaryTitleRequest,
};
use keeper_server::{KeeperServer, ServerConfig, ShutdownConfig, ERROR_KIND_HEADER};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Code, Request, Status};

const TOKEN_SECRET: &str = "integration-token-secret";
const CRYPT_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

struct TestServer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<keeper_server::Result<()>>,
    account: AccountClient<Channel>,
    vault: VaultClient<Channel>,
    health: HealthClient<Channel>,
}

fn base_config() -> ServerConfig {
    ServerConfig::new()
        .with_token_secret(TOKEN_SECRET)
        .with_crypt_key(CRYPT_KEY.to_vec())
        .with_reflection(false)
}

/// Start a server and return its shutdown channel, task handle, and clients.
async fn start_server(config: ServerConfig) -> TestServer {
    // Find an available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server = KeeperServer::new(config.with_bind_addr(addr));
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    let channel = Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();

    TestServer {
        shutdown,
        handle,
        account: AccountClient::new(channel.clone()),
        vault: VaultClient::new(channel.clone()),
        health: HealthClient::new(channel),
    }
}

async fn login(server: &mut TestServer, user: &str, password: &str) -> String {
    server
        .account
        .register_user(RegisterUserRequest {
            login: user.to_string(),
            password: password.to_string(),
        })
        .await
        .unwrap();

    server
        .account
        .auth_user(AuthUserRequest {
            login: user.to_string(),
            password: password.to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .token
}

fn authed<T>(token: &str, message: T) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("auth_token", MetadataValue::try_from(token).unwrap());
    request
}

fn error_kind(status: &Status) -> &str {
    status
        .metadata()
        .get(ERROR_KIND_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_grpc_register_auth_add_get() {
    let mut server = start_server(base_config()).await;
    let token = login(&mut server, "alice", "pw1").await;

    let id = server
        .vault
        .add_login_pass(authed(
            &token,
            AddLoginPassRequest {
                title: "site".to_string(),
                login: "u".to_string(),
                password: "p".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner()
        .id;

    let record = server
        .vault
        .get_login_pass(authed(&token, GetSecretRequest { id }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(record.id, id);
    assert_eq!(record.title, "site");
    assert_eq!(record.login, "u");
    assert_eq!(record.password, "p");

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_text_and_card_listing() {
    let mut server = start_server(base_config()).await;
    let alice = login(&mut server, "alice", "pw").await;
    let bob = login(&mut server, "bob", "pw").await;

    server
        .vault
        .add_text(authed(
            &alice,
            AddTextRequest {
                title: "diary".to_string(),
                body: "dear diary".to_string(),
            },
        ))
        .await
        .unwrap();
    let card_id = server
        .vault
        .add_card(authed(
            &alice,
            AddCardRequest {
                title: "visa".to_string(),
                number: "4111111111111111".to_string(),
                owner: "ALICE".to_string(),
                exp_date: "10/29".to_string(),
                cvc: "321".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner()
        .id;

    let texts = server
        .vault
        .list_text(authed(&alice, ListSecretsRequest {}))
        .await
        .unwrap()
        .into_inner()
        .secrets;
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].title, "diary");

    // Another user's listing is empty, and direct access is refused.
    let bobs = server
        .vault
        .list_card(authed(&bob, ListSecretsRequest {}))
        .await
        .unwrap()
        .into_inner()
        .secrets;
    assert!(bobs.is_empty());

    let err = server
        .vault
        .get_card(authed(&bob, GetSecretRequest { id: card_id }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_account_errors() {
    let mut server = start_server(base_config()).await;
    login(&mut server, "alice", "pw1").await;

    let err = server
        .account
        .register_user(RegisterUserRequest {
            login: "alice".to_string(),
            password: "other".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);

    let err = server
        .account
        .auth_user(AuthUserRequest {
            login: "alice".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
    assert_eq!(error_kind(&err), "password_mismatch");

    let err = server
        .account
        .auth_user(AuthUserRequest {
            login: "nobody".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_token_required() {
    let mut server = start_server(base_config()).await;

    let err = server
        .vault
        .list_login_pass(ListSecretsRequest {})
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);
    assert_eq!(error_kind(&err), "missing_token");

    let err = server
        .vault
        .list_login_pass(authed("definitely-not-a-token", ListSecretsRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    assert_eq!(error_kind(&err), "invalid_token");

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_expired_token_distinguishable() {
    let mut server = start_server(base_config()).await;
    login(&mut server, "alice", "pw").await;

    let authority = TokenAuthority::new(TOKEN_SECRET, Duration::from_secs(60)).unwrap();
    let expired = authority.issue_at("alice", 1_000_000).unwrap();

    let err = server
        .vault
        .list_text(authed(&expired, ListSecretsRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);
    assert_eq!(error_kind(&err), "token_expired");

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_streaming_requires_token() {
    let mut server = start_server(base_config()).await;

    let chunks = tokio_stream::iter(vec![BinaryChunk {
        data: b"payload".to_vec(),
    }]);
    let err = server.vault.add_binary(chunks).await.unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);

    let err = server
        .vault
        .get_binary(GetSecretRequest { id: 1 })
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), Code::Unauthenticated);

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_binary_roundtrip() {
    let mut server = start_server(base_config()).await;
    let token = login(&mut server, "alice", "pw").await;

    let data: Vec<u8> = (0..2500u32).map(|i| (i * 7 % 256) as u8).collect();
    let messages: Vec<BinaryChunk> = data
        .chunks(700)
        .map(|piece| BinaryChunk {
            data: piece.to_vec(),
        })
        .collect();

    let uploaded = server
        .vault
        .add_binary(authed(&token, tokio_stream::iter(messages)))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(uploaded.chunks, 3);
    assert_eq!(uploaded.size, 2500);

    server
        .vault
        .set_binary_title(authed(
            &token,
            SetBinaryTitleRequest {
                id: uploaded.id,
                title: "photo.jpg".to_string(),
            },
        ))
        .await
        .unwrap();

    let listed = server
        .vault
        .list_binary(authed(&token, ListSecretsRequest {}))
        .await
        .unwrap()
        .into_inner()
        .secrets;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, uploaded.id);
    assert_eq!(listed[0].title, "photo.jpg");

    let mut stream = server
        .vault
        .get_binary(authed(&token, GetSecretRequest { id: uploaded.id }))
        .await
        .unwrap()
        .into_inner();

    let mut downloaded = Vec::new();
    while let Some(chunk) = stream.next().await {
        downloaded.extend(chunk.unwrap().data);
    }
    assert_eq!(downloaded, data);

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_upload_too_large() {
    let mut server = start_server(base_config().with_max_upload_size(1000)).await;
    let token = login(&mut server, "alice", "pw").await;

    let messages = vec![
        BinaryChunk {
            data: vec![1u8; 600],
        },
        BinaryChunk {
            data: vec![2u8; 600],
        },
    ];
    let err = server
        .vault
        .add_binary(authed(&token, tokio_stream::iter(messages)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::ResourceExhausted);

    let listed = server
        .vault
        .list_binary(authed(&token, ListSecretsRequest {}))
        .await
        .unwrap()
        .into_inner()
        .secrets;
    assert!(listed.is_empty());

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_custom_auth_header() {
    let mut server = start_server(base_config().with_auth_header("authorization")).await;
    let token = login(&mut server, "alice", "pw").await;

    let mut request = Request::new(ListSecretsRequest {});
    request.metadata_mut().insert(
        "authorization",
        MetadataValue::try_from(format!("Bearer {token}")).unwrap(),
    );
    let listed = server.vault.list_card(request).await.unwrap();
    assert!(listed.into_inner().secrets.is_empty());

    // The default key is no longer consulted.
    let err = server
        .vault
        .list_card(authed(&token, ListSecretsRequest {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_health_check_serving() {
    let mut server = start_server(base_config()).await;

    for service in [None, Some("keeper.v1.Vault"), Some("keeper.v1.Account")] {
        let response = server
            .health
            .check(HealthCheckRequest {
                service: service.map(ToString::to_string),
            })
            .await
            .unwrap();
        assert_eq!(
            response.into_inner().status,
            i32::from(ServingStatus::Serving)
        );
    }

    drop(server.shutdown);
}

#[tokio::test]
async fn test_grpc_graceful_shutdown() {
    let config = base_config().with_shutdown(
        ShutdownConfig::new()
            .with_drain_timeout(Duration::from_millis(200))
            .with_grace_period(Duration::from_millis(10)),
    );
    let TestServer {
        mut health,
        shutdown,
        handle,
        ..
    } = start_server(config).await;

    let before = health
        .check(HealthCheckRequest { service: None })
        .await
        .unwrap();
    assert_eq!(before.into_inner().status, i32::from(ServingStatus::Serving));
    drop(health);

    shutdown.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop after drain")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_grpc_invalid_config_fails_fast() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = base_config().with_crypt_key(b"short".to_vec()).with_bind_addr(addr);
    let result = KeeperServer::new(config)
        .serve_with_shutdown(std::future::pending())
        .await;
    assert!(result.is_err());
}
