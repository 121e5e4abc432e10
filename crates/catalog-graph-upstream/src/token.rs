//! Secure token retrieval for authenticated catalog reads.
//!
//! Tokens are looked up per call and never cached here.

use crate::config::UpstreamConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bearer credential. Its value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("secret store error: {0}")]
pub struct SecretStoreError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The store has no value at the path; authenticated reads cannot work.
    #[error("no catalog token found at '{path}'")]
    TokenNotFound { path: String },
    #[error("could not read catalog token at '{path}': {source}")]
    Store {
        path: String,
        #[source]
        source: SecretStoreError,
    },
}

// ============================================================================
// Secret stores
// ============================================================================

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Decrypted value at `path`, `None` when the parameter does not exist.
    async fn get_secret(&self, path: &str) -> Result<Option<String>, SecretStoreError>;
}

/// Fixed in-memory secrets; counts lookups.
#[derive(Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, path: &str, value: &str) -> Self {
        self.secrets.insert(path.to_string(), value.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, path: &str) -> Result<Option<String>, SecretStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.secrets.get(path).cloned())
    }
}

/// Reads the secret from an environment variable named after the path:
/// `/sit/graph-db/token` → `SIT_GRAPH_DB_TOKEN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn variable_name(path: &str) -> String {
        path.trim_start_matches('/')
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, path: &str) -> Result<Option<String>, SecretStoreError> {
        Ok(std::env::var(Self::variable_name(path)).ok())
    }
}

/// AWS SSM Parameter Store, read with decryption.
#[cfg(feature = "aws")]
pub struct SsmSecretStore {
    client: aws_sdk_ssm::Client,
}

#[cfg(feature = "aws")]
impl SsmSecretStore {
    /// Default credential chain; region from the environment, else `us-east-1`.
    pub async fn from_env() -> Self {
        let region = aws_config::meta::region::RegionProviderChain::default_provider()
            .or_else(aws_config::Region::new("us-east-1"));
        let sdk = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        Self {
            client: aws_sdk_ssm::Client::new(&sdk),
        }
    }
}

#[cfg(feature = "aws")]
#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get_secret(&self, path: &str) -> Result<Option<String>, SecretStoreError> {
        match self
            .client
            .get_parameter()
            .name(path)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(str::to_string)),
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_parameter_not_found())
                {
                    return Ok(None);
                }
                Err(SecretStoreError(err.to_string()))
            }
        }
    }
}

// ============================================================================
// Token provider
// ============================================================================

pub struct TokenProvider {
    store: Arc<dyn SecretStore>,
    path: String,
    local_mode: bool,
}

impl TokenProvider {
    pub fn new(store: Arc<dyn SecretStore>, config: &UpstreamConfig) -> Self {
        Self {
            store,
            path: config.token_path(),
            local_mode: config.local_mode,
        }
    }

    /// `Ok(None)` in local mode; otherwise the stored token or a fatal error.
    pub async fn get_token(&self) -> Result<Option<Credential>, TokenError> {
        if self.local_mode {
            tracing::debug!("local mode, skipping catalog token lookup");
            return Ok(None);
        }

        let value = self
            .store
            .get_secret(&self.path)
            .await
            .map_err(|source| TokenError::Store {
                path: self.path.clone(),
                source,
            })?;

        match value {
            Some(token) if !token.trim().is_empty() => Ok(Some(Credential::new(token))),
            _ => {
                tracing::error!(path = %self.path, "catalog token is missing");
                Err(TokenError::TokenNotFound {
                    path: self.path.clone(),
                })
            }
        }
    }
}
