//! Request authorization.
//!
//! Cosmos DB accepts either a master-key HMAC signature or a Microsoft Entra
//! bearer token, both carried in the `authorization` header.

use std::fmt;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::Sha256;
use tokio::sync::Mutex;
use url::Url;

use super::{BackendError, BackendResult};
use crate::connection::ConfigError;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Signs requests with a base64 account key.
#[derive(Clone)]
pub struct MasterKey {
    mac: Hmac<Sha256>,
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    /// Decode a base64 account key.
    pub fn new(key: &str) -> Result<Self, ConfigError> {
        let bytes = BASE64
            .decode(key.trim())
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        let mac = Hmac::<Sha256>::new_from_slice(&bytes)
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// URL-encoded `authorization` header value for one request.
    ///
    /// `resource_link` is case sensitive and must not be percent-encoded.
    pub fn sign(&self, verb: &str, resource_type: &str, resource_link: &str, date: &str) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        url_encode(&format!("type=master&ver=1.0&sig={}", signature))
    }
}

fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Where a bearer token can come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Service principal from `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET`.
    ClientSecret {
        /// Authority host, e.g. `https://login.microsoftonline.com`
        authority: String,
        /// Directory (tenant) id
        tenant_id: String,
        /// Application (client) id
        client_id: String,
        /// Client secret
        client_secret: String,
    },
    /// App Service / Functions identity endpoint.
    AppServiceIdentity {
        /// `IDENTITY_ENDPOINT`
        endpoint: String,
        /// `IDENTITY_HEADER`
        header: String,
        /// Optional user-assigned identity
        client_id: Option<String>,
    },
    /// Instance metadata service on a VM or container host.
    ManagedIdentity {
        /// Optional user-assigned identity
        client_id: Option<String>,
    },
}

/// Longest lifetime trusted from a token endpoint.
const MAX_TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    // IMDS returns this as a string, Entra ID as a number.
    #[serde(default)]
    expires_in: Option<JsonValue>,
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        let secs = match &self.expires_in {
            Some(JsonValue::Number(n)) => n.as_u64(),
            Some(JsonValue::String(s)) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(3600)
        .min(MAX_TOKEN_LIFETIME_SECS);
        let now = Instant::now();
        AccessToken {
            token: self.access_token,
            expires_at: now.checked_add(Duration::from_secs(secs)).unwrap_or(now),
        }
    }
}

/// Ordered chain of token sources with a cached token.
pub struct TokenCredential {
    scope: String,
    resource: String,
    sources: Vec<TokenSource>,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenCredential {
    /// Build a chain for the account at `endpoint` from explicit sources.
    pub fn new(endpoint: &str, sources: Vec<TokenSource>) -> Result<Self, ConfigError> {
        let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let host = url.host_str().ok_or_else(|| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "endpoint has no host".to_string(),
        })?;
        let resource = format!("{}://{}", url.scheme(), host);
        Ok(Self {
            scope: format!("{}/.default", resource),
            resource,
            sources,
            cached: Mutex::new(None),
        })
    }

    /// Build the ambient chain: environment service principal, then managed identity.
    pub fn from_env(endpoint: &str) -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let mut sources = Vec::new();

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            var("AZURE_TENANT_ID"),
            var("AZURE_CLIENT_ID"),
            var("AZURE_CLIENT_SECRET"),
        ) {
            sources.push(TokenSource::ClientSecret {
                authority: var("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
                tenant_id,
                client_id,
                client_secret,
            });
        }

        if let (Some(endpoint), Some(header)) = (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            sources.push(TokenSource::AppServiceIdentity {
                endpoint,
                header,
                client_id: var("AZURE_CLIENT_ID"),
            });
        }

        sources.push(TokenSource::ManagedIdentity {
            client_id: var("AZURE_CLIENT_ID"),
        });

        Self::new(endpoint, sources)
    }

    /// The OAuth scope requested from Entra ID.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Return a cached token or walk the chain for a new one.
    pub async fn token(&self, http: &reqwest::Client) -> BackendResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.token.clone());
            }
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match self.fetch(http, source).await {
                Ok(token) => {
                    let value = token.token.clone();
                    *cached = Some(token);
                    return Ok(value);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "token source unavailable");
                    failures.push(e);
                }
            }
        }

        Err(BackendError::new(
            None,
            Some("CredentialUnavailable".to_string()),
            format!(
                "no credential in the chain produced a token: {}",
                failures.join("; ")
            ),
        ))
    }

    async fn fetch(
        &self,
        http: &reqwest::Client,
        source: &TokenSource,
    ) -> std::result::Result<AccessToken, String> {
        let request = match source {
            TokenSource::ClientSecret {
                authority,
                tenant_id,
                client_id,
                client_secret,
            } => http
                .post(format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority.trim_end_matches('/'),
                    tenant_id
                ))
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", self.scope.as_str()),
                ]),
            TokenSource::AppServiceIdentity {
                endpoint,
                header,
                client_id,
            } => {
                let mut query = vec![
                    ("api-version", "2019-08-01"),
                    ("resource", self.resource.as_str()),
                ];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                http.get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            TokenSource::ManagedIdentity { client_id } => {
                let mut query = vec![
                    ("api-version", "2018-02-01"),
                    ("resource", self.resource.as_str()),
                ];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                http.get(IMDS_ENDPOINT)
                    .header("Metadata", "true")
                    .query(&query)
                    .timeout(Duration::from_secs(5))
            }
        };

        let label = match source {
            TokenSource::ClientSecret { .. } => "environment credential",
            TokenSource::AppServiceIdentity { .. } => "app service identity",
            TokenSource::ManagedIdentity { .. } => "managed identity",
        };

        let response = request
            .send()
            .await
            .map_err(|e| format!("{}: {}", label, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: HTTP {} {}", label, status.as_u16(), body.trim()));
        }
        response
            .json::<TokenResponse>()
            .await
            .map(TokenResponse::into_token)
            .map_err(|e| format!("{}: invalid token response: {}", label, e))
    }
}

/// Credential attached to a [`RestClient`](super::rest::RestClient).
pub enum Credential {
    /// HMAC signature with an account key.
    MasterKey(MasterKey),
    /// Bearer token from the identity chain.
    Token(TokenCredential),
}

impl Credential {
    /// Produce the `authorization` header value for one request.
    pub async fn authorization(
        &self,
        http: &reqwest::Client,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> BackendResult<String> {
        match self {
            Credential::MasterKey(key) => Ok(key.sign(verb, resource_type, resource_link, date)),
            Credential::Token(chain) => {
                let token = chain.token(http).await?;
                Ok(url_encode(&format!("type=aad&ver=1.0&sig={}", token)))
            }
        }
    }
}
