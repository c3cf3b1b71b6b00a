//! Connection resolution.
//!
//! Every tool call carries a [`ConnectionConfig`]. [`resolve`] turns it into an
//! endpoint and credential strategy without touching the network, and a
//! [`ClientFactory`] turns that into a [`CosmosClient`] handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::backend::auth::{Credential, MasterKey, TokenCredential};
use crate::backend::rest::RestClient;
use crate::backend::CosmosClient;

/// Default endpoint of the local Cosmos DB emulator.
pub const DEFAULT_EMULATOR_ENDPOINT: &str = "http://localhost:8081";

/// Well-known key accepted by every Cosmos DB emulator.
pub const EMULATOR_KEY: &str =
    "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// Domain suffix of the managed service.
pub const SERVICE_DOMAIN: &str = "documents.azure.com";

/// Upper bound on cached client handles in [`RestClientFactory`].
pub const MAX_CACHED_CLIENTS: usize = 16;

/// Errors raised while resolving a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Service mode without an account name.
    #[error("account name is required")]
    MissingAccount,

    /// The account name is not a valid Cosmos DB account name.
    #[error("invalid account name '{0}': expected 3 to 44 lowercase letters, digits or '-'")]
    InvalidAccount(String),

    /// The endpoint could not be parsed.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending endpoint
        endpoint: String,
        /// Parser message
        reason: String,
    },

    /// The account key is not valid base64.
    #[error("error creating key credential: {0}")]
    InvalidKey(String),

    /// The HTTP client could not be built.
    #[error("error creating Cosmos client: {0}")]
    Client(String),
}

/// Connection settings shared by every tool input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Cosmos DB account name (required unless `use_emulator`).
    pub account: String,
    /// Target the local emulator instead of the managed service.
    pub use_emulator: bool,
    /// Emulator endpoint override.
    pub emulator_endpoint: String,
}

impl ConnectionConfig {
    /// Service-mode config for an account.
    pub fn account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ..Self::default()
        }
    }

    /// Emulator-mode config at the default endpoint.
    pub fn emulator() -> Self {
        Self {
            use_emulator: true,
            ..Self::default()
        }
    }

    /// Check that this config identifies exactly one target.
    ///
    /// In service mode the account name becomes a DNS label of the endpoint,
    /// so it must have the account-name form.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_emulator {
            return Ok(());
        }
        if self.account.is_empty() {
            return Err(ConfigError::MissingAccount);
        }
        if !is_account_name(&self.account) {
            return Err(ConfigError::InvalidAccount(self.account.clone()));
        }
        Ok(())
    }

    /// The endpoint this config points at.
    pub fn endpoint(&self) -> String {
        if self.use_emulator {
            if self.emulator_endpoint.is_empty() {
                DEFAULT_EMULATOR_ENDPOINT.to_string()
            } else {
                self.emulator_endpoint.clone()
            }
        } else {
            format!("https://{}.{}:443/", self.account, SERVICE_DOMAIN)
        }
    }
}

fn is_account_name(name: &str) -> bool {
    (3..=44).contains(&name.len())
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// How requests against a resolved endpoint are authorized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialStrategy {
    /// The emulator's well-known key.
    EmulatorKey,
    /// An out-of-band account key.
    AccountKey(String),
    /// The ambient identity chain (environment, then managed identity).
    AmbientIdentity,
}

/// Output of [`resolve`]: everything needed to build a client, nothing connected yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedConnection {
    /// Absolute endpoint URL.
    pub endpoint: String,
    /// Credential strategy.
    pub credential: CredentialStrategy,
    /// Skip TLS certificate validation (emulator only).
    pub accept_invalid_certs: bool,
}

/// Decide endpoint and credential for a config. Pure; never touches the network.
///
/// `account_key` is the deployment-level key, used only in service mode.
pub fn resolve(
    config: &ConnectionConfig,
    account_key: Option<&str>,
) -> Result<ResolvedConnection, ConfigError> {
    config.validate()?;

    if config.use_emulator {
        return Ok(ResolvedConnection {
            endpoint: config.endpoint(),
            credential: CredentialStrategy::EmulatorKey,
            accept_invalid_certs: true,
        });
    }

    let endpoint = config.endpoint();
    check_service_host(&endpoint)?;

    let credential = match account_key {
        Some(key) if !key.is_empty() => CredentialStrategy::AccountKey(key.to_string()),
        _ => CredentialStrategy::AmbientIdentity,
    };

    Ok(ResolvedConnection {
        endpoint,
        credential,
        accept_invalid_certs: false,
    })
}

/// Service-mode credentials are only ever sent to hosts under [`SERVICE_DOMAIN`].
fn check_service_host(endpoint: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let url = url::Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    let suffix = format!(".{}", SERVICE_DOMAIN);
    match url.host_str() {
        Some(host) if url.scheme() == "https" && host.ends_with(&suffix) => Ok(()),
        _ => Err(invalid("host is outside the service domain")),
    }
}

/// Produces backend handles for connection configs.
///
/// Passed to [`McpSession`](crate::McpSession) at construction so tests can
/// substitute an in-memory backend.
pub trait ClientFactory: Send + Sync {
    /// Build (or reuse) a handle for `config`. Must not perform network I/O.
    fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn CosmosClient>, ConfigError>;
}

/// Production factory backed by [`RestClient`].
///
/// Handles are cached per resolved identity, so token caches survive across
/// calls without ever being shared between different accounts or credentials.
/// At most [`MAX_CACHED_CLIENTS`] handles are kept; the least recently used
/// one is dropped to make room.
pub struct RestClientFactory {
    account_key: Option<String>,
    clients: Mutex<ClientCache>,
}

#[derive(Default)]
struct ClientCache {
    entries: HashMap<ResolvedConnection, CachedClient>,
    tick: u64,
}

struct CachedClient {
    client: Arc<RestClient>,
    last_used: u64,
}

impl ClientCache {
    fn get(&mut self, key: &ResolvedConnection) -> Option<Arc<RestClient>> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.client.clone()
        })
    }

    fn insert(&mut self, key: ResolvedConnection, client: Arc<RestClient>) {
        if self.entries.len() >= MAX_CACHED_CLIENTS {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(endpoint = %oldest.endpoint, "evicting Cosmos DB client");
                self.entries.remove(&oldest);
            }
        }
        self.tick += 1;
        let last_used = self.tick;
        self.entries.insert(key, CachedClient { client, last_used });
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl RestClientFactory {
    /// Create a factory. `account_key` is the optional deployment-level key.
    pub fn new(account_key: Option<String>) -> Self {
        Self {
            account_key,
            clients: Mutex::new(ClientCache::default()),
        }
    }

    /// Number of cached client handles.
    pub fn cached_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn build(resolved: &ResolvedConnection) -> Result<RestClient, ConfigError> {
        let credential = match &resolved.credential {
            CredentialStrategy::EmulatorKey => Credential::MasterKey(MasterKey::new(EMULATOR_KEY)?),
            CredentialStrategy::AccountKey(key) => Credential::MasterKey(MasterKey::new(key)?),
            CredentialStrategy::AmbientIdentity => {
                Credential::Token(TokenCredential::from_env(&resolved.endpoint)?)
            }
        };
        RestClient::new(&resolved.endpoint, credential, resolved.accept_invalid_certs)
    }
}

impl ClientFactory for RestClientFactory {
    fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn CosmosClient>, ConfigError> {
        let resolved = resolve(config, self.account_key.as_deref())?;

        let mut clients = self.clients.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(client) = clients.get(&resolved) {
            return Ok(client);
        }

        tracing::debug!(endpoint = %resolved.endpoint, "creating Cosmos DB client");
        let client = Arc::new(Self::build(&resolved)?);
        clients.insert(resolved, client.clone());
        Ok(client)
    }
}
