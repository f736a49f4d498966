// SPDX-License-Identifier: MIT OR Apache-2.0
//! Server configuration types.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use keeper_core::{PipelineConfig, KEY_SIZE};
use zeroize::Zeroizing;

use crate::error::{Result, ServerError};
use crate::shutdown::ShutdownConfig;

// Environment variable names for configuration.

/// Bind address environment variable.
pub const ENV_BIND_ADDR: &str = "KEEPER_BIND_ADDR";
/// Token signing secret environment variable.
pub const ENV_TOKEN_SECRET_KEY: &str = "KEEPER_TOKEN_SECRET_KEY";
/// Token lifetime environment variable.
pub const ENV_TOKEN_TTL_SECS: &str = "KEEPER_TOKEN_TTL_SECS";
/// Field encryption key environment variable.
pub const ENV_CRYPT_SECRET_KEY: &str = "KEEPER_CRYPT_SECRET_KEY";
/// Password pepper environment variable.
pub const ENV_PASSWORD_PEPPER: &str = "KEEPER_PASSWORD_PEPPER";
/// Token metadata key environment variable.
pub const ENV_AUTH_HEADER: &str = "KEEPER_AUTH_HEADER";
/// Binary chunk size environment variable.
pub const ENV_BINARY_CHUNK_SIZE: &str = "KEEPER_BINARY_CHUNK_SIZE";
/// Upload worker bound environment variable.
pub const ENV_UPLOAD_CONCURRENCY: &str = "KEEPER_UPLOAD_CONCURRENCY";
/// Maximum upload size environment variable.
pub const ENV_MAX_UPLOAD_SIZE: &str = "KEEPER_MAX_UPLOAD_SIZE";
/// Stream channel capacity environment variable.
pub const ENV_STREAM_CHANNEL_CAPACITY: &str = "KEEPER_STREAM_CHANNEL_CAPACITY";
/// Maximum message size environment variable.
pub const ENV_MAX_MESSAGE_SIZE: &str = "KEEPER_MAX_MESSAGE_SIZE";
/// Request timeout seconds environment variable.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "KEEPER_REQUEST_TIMEOUT_SECS";
/// Enable reflection environment variable.
pub const ENV_ENABLE_REFLECTION: &str = "KEEPER_ENABLE_REFLECTION";
/// TLS certificate path environment variable.
pub const ENV_TLS_CERT_PATH: &str = "KEEPER_TLS_CERT_PATH";
/// TLS key path environment variable.
pub const ENV_TLS_KEY_PATH: &str = "KEEPER_TLS_KEY_PATH";
/// TLS CA certificate path environment variable.
pub const ENV_TLS_CA_CERT_PATH: &str = "KEEPER_TLS_CA_CERT_PATH";
/// Shutdown drain timeout seconds environment variable.
pub const ENV_SHUTDOWN_DRAIN_TIMEOUT_SECS: &str = "KEEPER_SHUTDOWN_DRAIN_TIMEOUT_SECS";
/// Shutdown grace period seconds environment variable.
pub const ENV_SHUTDOWN_GRACE_PERIOD_SECS: &str = "KEEPER_SHUTDOWN_GRACE_PERIOD_SECS";

/// Metadata key the token is read from unless configured otherwise.
pub const DEFAULT_AUTH_HEADER: &str = "auth_token";

/// Environment variable parsing helpers.
///
/// Each helper takes a lookup function so tests can feed values without
/// touching the process environment.
mod env_parse {
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::str::FromStr;
    use std::time::Duration;

    use super::{Result, ServerError};

    fn parse<T, L>(lookup: &L, key: &str) -> Option<Result<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
        L: Fn(&str) -> Option<String>,
    {
        lookup(key).map(|val| {
            val.trim()
                .parse()
                .map_err(|e| ServerError::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a socket address.
    pub fn parse_socket_addr<L>(lookup: &L, key: &str) -> Option<Result<SocketAddr>>
    where
        L: Fn(&str) -> Option<String>,
    {
        parse(lookup, key)
    }

    /// Parse a usize.
    pub fn parse_usize<L>(lookup: &L, key: &str) -> Option<Result<usize>>
    where
        L: Fn(&str) -> Option<String>,
    {
        parse(lookup, key)
    }

    /// Parse a u64.
    pub fn parse_u64<L>(lookup: &L, key: &str) -> Option<Result<u64>>
    where
        L: Fn(&str) -> Option<String>,
    {
        parse(lookup, key)
    }

    /// Parse a boolean.
    /// Accepts "true", "1", "yes", "on" as true (case-insensitive).
    /// Accepts "false", "0", "no", "off" as false (case-insensitive).
    pub fn parse_bool<L>(lookup: &L, key: &str) -> Option<Result<bool>>
    where
        L: Fn(&str) -> Option<String>,
    {
        lookup(key).map(|val| match val.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ServerError::Config(format!(
                "invalid {key}: expected boolean (true/false/1/0/yes/no/on/off)"
            ))),
        })
    }

    /// Parse a duration in seconds.
    pub fn parse_duration_secs<L>(lookup: &L, key: &str) -> Option<Result<Duration>>
    where
        L: Fn(&str) -> Option<String>,
    {
        parse::<u64, L>(lookup, key).map(|r| r.map(Duration::from_secs))
    }

    /// Parse a path.
    pub fn parse_path<L>(lookup: &L, key: &str) -> Option<PathBuf>
    where
        L: Fn(&str) -> Option<String>,
    {
        lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from)
    }
}

/// Key material loaded from configuration. Zeroed on drop, never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValue(Zeroizing<Vec<u8>>);

impl SecretValue {
    /// Wrap raw secret bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    /// The secret bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("SecretValue(<empty>)")
        } else {
            f.write_str("SecretValue(<redacted>)")
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// HMAC secret for signing tokens.
    pub token_secret: SecretValue,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    /// 32-byte key for field encryption.
    pub crypt_key: SecretValue,
    /// Server-wide secret mixed into password hashes.
    pub password_pepper: Option<SecretValue>,
    /// Metadata key carrying the token.
    pub auth_header: String,
    /// Plaintext segment size for binary uploads.
    pub binary_chunk_size: usize,
    /// Chunk workers alive at once per upload.
    pub upload_concurrency: usize,
    /// Largest accepted binary, in bytes.
    pub max_upload_size: u64,
    /// Buffered messages per download stream.
    pub stream_channel_capacity: usize,
    /// Maximum gRPC message size in bytes.
    pub max_message_size: usize,
    /// Per-request timeout.
    pub request_timeout: Option<Duration>,
    /// Expose the gRPC reflection service.
    pub enable_reflection: bool,
    /// TLS configuration (optional).
    pub tls: Option<TlsConfig>,
    /// Drain-aware shutdown (optional).
    pub shutdown: Option<ShutdownConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            token_secret: SecretValue::default(),
            token_ttl: Duration::from_secs(10 * 60),
            crypt_key: SecretValue::default(),
            password_pepper: None,
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            binary_chunk_size: keeper_core::DEFAULT_CHUNK_SIZE,
            upload_concurrency: keeper_core::DEFAULT_MAX_IN_FLIGHT,
            max_upload_size: keeper_core::DEFAULT_MAX_UPLOAD_SIZE,
            stream_channel_capacity: keeper_core::DEFAULT_CHANNEL_CAPACITY,
            max_message_size: 4 * 1024 * 1024, // 4MB
            request_timeout: None,
            enable_reflection: true,
            tls: None,
            shutdown: None,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables use defaults. Invalid values return an error.
    /// Secrets are not checked here; see [`Self::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(result) = env_parse::parse_socket_addr(&lookup, ENV_BIND_ADDR) {
            config.bind_addr = result?;
        }

        // Secrets
        if let Some(secret) = lookup(ENV_TOKEN_SECRET_KEY) {
            config.token_secret = SecretValue::new(secret);
        }
        if let Some(result) = env_parse::parse_duration_secs(&lookup, ENV_TOKEN_TTL_SECS) {
            config.token_ttl = result?;
        }
        if let Some(key) = lookup(ENV_CRYPT_SECRET_KEY) {
            config.crypt_key = SecretValue::new(key);
        }
        config.password_pepper = lookup(ENV_PASSWORD_PEPPER)
            .filter(|p| !p.is_empty())
            .map(SecretValue::new);
        if let Some(header) = lookup(ENV_AUTH_HEADER) {
            config.auth_header = header.trim().to_lowercase();
        }

        // Binary pipeline
        if let Some(result) = env_parse::parse_usize(&lookup, ENV_BINARY_CHUNK_SIZE) {
            config.binary_chunk_size = result?;
        }
        if let Some(result) = env_parse::parse_usize(&lookup, ENV_UPLOAD_CONCURRENCY) {
            config.upload_concurrency = result?;
        }
        if let Some(result) = env_parse::parse_u64(&lookup, ENV_MAX_UPLOAD_SIZE) {
            config.max_upload_size = result?;
        }
        if let Some(result) = env_parse::parse_usize(&lookup, ENV_STREAM_CHANNEL_CAPACITY) {
            config.stream_channel_capacity = result?;
        }

        // Transport
        if let Some(result) = env_parse::parse_usize(&lookup, ENV_MAX_MESSAGE_SIZE) {
            config.max_message_size = result?;
        }
        if let Some(result) = env_parse::parse_duration_secs(&lookup, ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = Some(result?);
        }
        if let Some(result) = env_parse::parse_bool(&lookup, ENV_ENABLE_REFLECTION) {
            config.enable_reflection = result?;
        }

        // TLS configuration (requires both cert and key)
        let cert_path = env_parse::parse_path(&lookup, ENV_TLS_CERT_PATH);
        let key_path = env_parse::parse_path(&lookup, ENV_TLS_KEY_PATH);
        if let (Some(cert), Some(key)) = (cert_path, key_path) {
            let mut tls = TlsConfig::new(cert, key);
            if let Some(ca) = env_parse::parse_path(&lookup, ENV_TLS_CA_CERT_PATH) {
                tls = tls.with_ca_cert(ca);
            }
            config.tls = Some(tls);
        }

        // Shutdown configuration
        let drain = env_parse::parse_duration_secs(&lookup, ENV_SHUTDOWN_DRAIN_TIMEOUT_SECS);
        let grace = env_parse::parse_duration_secs(&lookup, ENV_SHUTDOWN_GRACE_PERIOD_SECS);
        if drain.is_some() || grace.is_some() {
            let mut shutdown = ShutdownConfig::default();
            if let Some(result) = drain {
                shutdown.drain_timeout = result?;
            }
            if let Some(result) = grace {
                shutdown.grace_period = result?;
            }
            config.shutdown = Some(shutdown);
        }

        Ok(config)
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the token signing secret.
    #[must_use]
    pub fn with_token_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.token_secret = SecretValue::new(secret);
        self
    }

    /// Set the token lifetime.
    #[must_use]
    pub const fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the field encryption key.
    #[must_use]
    pub fn with_crypt_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.crypt_key = SecretValue::new(key);
        self
    }

    /// Set the password pepper.
    #[must_use]
    pub fn with_password_pepper(mut self, pepper: impl Into<Vec<u8>>) -> Self {
        self.password_pepper = Some(SecretValue::new(pepper));
        self
    }

    /// Set the token metadata key.
    #[must_use]
    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    /// Set the binary chunk size.
    #[must_use]
    pub const fn with_binary_chunk_size(mut self, size: usize) -> Self {
        self.binary_chunk_size = size;
        self
    }

    /// Set the per-upload worker bound.
    #[must_use]
    pub const fn with_upload_concurrency(mut self, workers: usize) -> Self {
        self.upload_concurrency = workers;
        self
    }

    /// Set the maximum upload size.
    #[must_use]
    pub const fn with_max_upload_size(mut self, size: u64) -> Self {
        self.max_upload_size = size;
        self
    }

    /// Set the stream channel capacity.
    #[must_use]
    pub const fn with_stream_channel_capacity(mut self, capacity: usize) -> Self {
        self.stream_channel_capacity = capacity;
        self
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Enable or disable reflection.
    #[must_use]
    pub const fn with_reflection(mut self, enabled: bool) -> Self {
        self.enable_reflection = enabled;
        self
    }

    /// Set TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set shutdown configuration.
    #[must_use]
    pub fn with_shutdown(mut self, config: ShutdownConfig) -> Self {
        self.shutdown = Some(config);
        self
    }

    /// Pipeline settings derived from this configuration.
    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_chunk_size(self.binary_chunk_size)
            .with_max_in_flight(self.upload_concurrency)
            .with_max_upload_size(self.max_upload_size)
            .with_channel_capacity(self.stream_channel_capacity)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.token_secret.is_empty() {
            return Err(ServerError::Config(format!(
                "{ENV_TOKEN_SECRET_KEY} must be set"
            )));
        }

        if self.crypt_key.len() != KEY_SIZE {
            return Err(ServerError::Config(format!(
                "{ENV_CRYPT_SECRET_KEY} must be exactly {KEY_SIZE} bytes, got {}",
                self.crypt_key.len()
            )));
        }

        if self.auth_header.is_empty() {
            return Err(ServerError::Config(
                "auth_header must not be empty".to_string(),
            ));
        }
        if tonic::metadata::MetadataKey::<tonic::metadata::Ascii>::from_bytes(
            self.auth_header.as_bytes(),
        )
        .is_err()
        {
            return Err(ServerError::Config(format!(
                "auth_header {:?} is not a valid metadata key",
                self.auth_header
            )));
        }

        if self.max_message_size == 0 {
            return Err(ServerError::Config(
                "max_message_size must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ServerError::Config(
                "max_upload_size must be greater than 0".to_string(),
            ));
        }

        self.pipeline()
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        if let Some(ref tls) = self.tls {
            tls.validate()?;
        }

        Ok(())
    }
}

/// TLS configuration for secure connections.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the certificate file (PEM format).
    pub cert_path: PathBuf,
    /// Path to the private key file (PEM format).
    pub key_path: PathBuf,
    /// Optional path to CA certificate for client authentication.
    pub ca_cert_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Create a new TLS configuration.
    #[must_use]
    pub fn new(cert_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            cert_path,
            key_path,
            ca_cert_path: None,
        }
    }

    /// Set CA certificate for client authentication.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.ca_cert_path = Some(path);
        self
    }

    /// Validate the TLS configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.cert_path.exists() {
            return Err(ServerError::Config(format!(
                "certificate file not found: {}",
                self.cert_path.display()
            )));
        }

        if !self.key_path.exists() {
            return Err(ServerError::Config(format!(
                "key file not found: {}",
                self.key_path.display()
            )));
        }

        if let Some(ref ca_path) = self.ca_cert_path {
            if !ca_path.exists() {
                return Err(ServerError::Config(format!(
                    "CA certificate file not found: {}",
                    ca_path.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn valid() -> ServerConfig {
        ServerConfig::new()
            .with_token_secret("jwt")
            .with_crypt_key(KEY)
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.auth_header, "auth_token");
        assert_eq!(config.binary_chunk_size, 1024);
        assert_eq!(config.token_ttl, Duration::from_secs(600));
        assert!(config.enable_reflection);
        assert!(config.tls.is_none());
        assert!(config.shutdown.is_none());
    }

    #[test]
    fn test_validation_requires_secrets() {
        assert!(ServerConfig::default().validate().is_err());
        assert!(ServerConfig::new().with_crypt_key(KEY).validate().is_err());

        let err = ServerConfig::new()
            .with_token_secret("jwt")
            .with_crypt_key("too-short")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("32"));

        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        assert!(valid().with_binary_chunk_size(0).validate().is_err());
        assert!(valid().with_upload_concurrency(0).validate().is_err());
        assert!(valid().with_stream_channel_capacity(0).validate().is_err());
        assert!(valid().with_max_message_size(0).validate().is_err());
        assert!(valid().with_max_upload_size(0).validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_header() {
        assert!(valid().with_auth_header("").validate().is_err());
        assert!(valid().with_auth_header("bad header").validate().is_err());
        assert!(valid().with_auth_header("authorization").validate().is_ok());
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let rendered = format!("{:?}", valid().with_password_pepper("pepper!"));
        assert!(!rendered.contains(KEY));
        assert!(!rendered.contains("pepper!"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_pipeline_derived() {
        let pipeline = valid()
            .with_binary_chunk_size(4096)
            .with_upload_concurrency(3)
            .pipeline();
        assert_eq!(pipeline.chunk_size, 4096);
        assert_eq!(pipeline.max_in_flight, 3);
    }

    #[test]
    fn test_tls_validation_missing_files() {
        let tls = TlsConfig::new("/nonexistent/cert.pem".into(), "/nonexistent/key.pem".into());
        assert!(tls.validate().is_err());
    }

    #[test]
    fn test_tls_validation_with_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let tls = TlsConfig::new(cert, key);
        assert!(tls.validate().is_ok());

        let tls = tls.with_ca_cert(dir.path().join("missing-ca.pem"));
        assert!(tls.validate().unwrap_err().to_string().contains("CA"));
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_from_lookup_defaults() {
            let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
            assert_eq!(config.bind_addr.port(), 9000);
            assert!(config.token_secret.is_empty());
            assert!(config.password_pepper.is_none());
        }

        #[test]
        fn test_from_lookup_full() {
            let config = ServerConfig::from_lookup(lookup(&[
                (ENV_BIND_ADDR, "0.0.0.0:7443"),
                (ENV_TOKEN_SECRET_KEY, "jwt"),
                (ENV_TOKEN_TTL_SECS, "120"),
                (ENV_CRYPT_SECRET_KEY, KEY),
                (ENV_PASSWORD_PEPPER, "pep"),
                (ENV_AUTH_HEADER, "Authorization"),
                (ENV_BINARY_CHUNK_SIZE, "2048"),
                (ENV_UPLOAD_CONCURRENCY, "4"),
                (ENV_MAX_UPLOAD_SIZE, "1048576"),
                (ENV_STREAM_CHANNEL_CAPACITY, "8"),
                (ENV_MAX_MESSAGE_SIZE, "65536"),
                (ENV_REQUEST_TIMEOUT_SECS, "30"),
                (ENV_ENABLE_REFLECTION, "off"),
                (ENV_SHUTDOWN_DRAIN_TIMEOUT_SECS, "12"),
            ]))
            .unwrap();

            assert_eq!(config.bind_addr.port(), 7443);
            assert_eq!(config.token_secret.expose(), b"jwt");
            assert_eq!(config.token_ttl, Duration::from_secs(120));
            assert_eq!(config.password_pepper.unwrap().expose(), b"pep");
            assert_eq!(config.auth_header, "authorization");
            assert_eq!(config.binary_chunk_size, 2048);
            assert_eq!(config.upload_concurrency, 4);
            assert_eq!(config.max_upload_size, 1_048_576);
            assert_eq!(config.stream_channel_capacity, 8);
            assert_eq!(config.max_message_size, 65536);
            assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
            assert!(!config.enable_reflection);

            let shutdown = config.shutdown.unwrap();
            assert_eq!(shutdown.drain_timeout, Duration::from_secs(12));
            assert_eq!(shutdown.grace_period, ShutdownConfig::default().grace_period);
        }

        #[test]
        fn test_from_lookup_invalid_values() {
            for (key, value) in [
                (ENV_BIND_ADDR, "not-an-addr"),
                (ENV_TOKEN_TTL_SECS, "-5"),
                (ENV_BINARY_CHUNK_SIZE, "big"),
                (ENV_ENABLE_REFLECTION, "maybe"),
                (ENV_MAX_UPLOAD_SIZE, "1.5"),
            ] {
                let err = ServerConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
                assert!(err.to_string().contains(key), "{key}");
            }
        }

        #[test]
        fn test_from_lookup_tls_requires_both_paths() {
            let config =
                ServerConfig::from_lookup(lookup(&[(ENV_TLS_CERT_PATH, "/tmp/cert.pem")])).unwrap();
            assert!(config.tls.is_none());

            let config = ServerConfig::from_lookup(lookup(&[
                (ENV_TLS_CERT_PATH, "/tmp/cert.pem"),
                (ENV_TLS_KEY_PATH, "/tmp/key.pem"),
                (ENV_TLS_CA_CERT_PATH, "/tmp/ca.pem"),
            ]))
            .unwrap();
            let tls = config.tls.unwrap();
            assert_eq!(tls.ca_cert_path, Some(PathBuf::from("/tmp/ca.pem")));
        }

        #[test]
        fn test_empty_pepper_is_none() {
            let config = ServerConfig::from_lookup(lookup(&[(ENV_PASSWORD_PEPPER, "")])).unwrap();
            assert!(config.password_pepper.is_none());
        }
    }
}
