//! HTTP implementation of [`CosmosClient`] against the Cosmos DB REST API.

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use url::Url;

use super::auth::Credential;
use super::{
    BackendError, BackendResult, BatchOperationResult, ContainerProperties, CosmosClient,
    DatabaseProperties, NewContainer, Page, PartitionKey, ThroughputProperties,
};
use crate::connection::ConfigError;
use crate::document::Document;

/// REST API version sent with every request.
pub const API_VERSION: &str = "2020-11-05";

const CONTINUATION: &str = "x-ms-continuation";
const PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const JSON: &str = "application/json";
const QUERY_JSON: &str = "application/query+json";

/// Cosmos DB account reached over HTTPS.
pub struct RestClient {
    http: reqwest::Client,
    endpoint: Url,
    credential: Credential,
}

/// One REST call before signing.
struct Request<'a> {
    method: Method,
    resource_type: &'static str,
    resource_link: String,
    path: Vec<&'a str>,
    headers: Vec<(&'static str, String)>,
    body: Option<(Vec<u8>, &'static str)>,
}

impl<'a> Request<'a> {
    fn new(method: Method, resource_type: &'static str, resource_link: String, path: Vec<&'a str>) -> Self {
        Self {
            method,
            resource_type,
            resource_link,
            path,
            headers: Vec::new(),
            body: None,
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn body(mut self, body: Vec<u8>, content_type: &'static str) -> Self {
        self.body = Some((body, content_type));
        self
    }

    fn continuation(self, token: Option<String>) -> Self {
        match token {
            Some(token) => self.header(CONTINUATION, token),
            None => self,
        }
    }

    fn query(self, query: &QueryBody<'_>) -> BackendResult<Self> {
        let body = serde_json::to_vec(query).map_err(|e| BackendError::transport(e.to_string()))?;
        Ok(self
            .header("x-ms-documentdb-isquery", "True")
            .body(body, QUERY_JSON))
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    parameters: Vec<QueryParameter<'a>>,
}

#[derive(Serialize)]
struct QueryParameter<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct DatabaseList {
    #[serde(rename = "Databases")]
    databases: Vec<DatabaseProperties>,
}

#[derive(Deserialize)]
struct ContainerList {
    #[serde(rename = "DocumentCollections")]
    containers: Vec<ContainerProperties>,
}

#[derive(Deserialize)]
struct DocumentList {
    #[serde(rename = "Documents")]
    documents: Vec<Box<RawValue>>,
}

#[derive(Deserialize)]
struct OfferList {
    #[serde(rename = "Offers")]
    offers: Vec<Offer>,
}

#[derive(Deserialize)]
struct Offer {
    #[serde(default)]
    content: OfferContent,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OfferContent {
    #[serde(default)]
    offer_throughput: Option<u32>,
    #[serde(default)]
    offer_autopilot_settings: Option<AutopilotSettings>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutopilotSettings {
    #[serde(default)]
    max_throughput: Option<u32>,
}

#[derive(Serialize)]
struct BatchOperation<'a> {
    #[serde(rename = "operationType")]
    operation_type: &'static str,
    #[serde(rename = "resourceBody")]
    resource_body: &'a RawValue,
}

impl RestClient {
    /// Create a client. No connection is made until the first call.
    pub fn new(
        endpoint: &str,
        credential: Credential,
        accept_invalid_certs: bool,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };
        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid("endpoint must be an absolute http(s) URL".to_string()));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: url,
            credential,
        })
    }

    fn url(&self, path: &[&str]) -> BackendResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::transport("endpoint cannot carry a path"))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    async fn send(&self, request: Request<'_>) -> BackendResult<Response> {
        let url = self.url(&request.path)?;
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let authorization = self
            .credential
            .authorization(
                &self.http,
                request.method.as_str(),
                request.resource_type,
                &request.resource_link,
                &date,
            )
            .await?;

        tracing::trace!(method = %request.method, %url, "cosmos request");

        let mut builder = self
            .http
            .request(request.method, url)
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("accept", JSON);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some((body, content_type)) = request.body {
            builder = builder.header("content-type", content_type).body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn page<T, L>(&self, request: Request<'_>, items: impl FnOnce(L) -> Vec<T>) -> BackendResult<Page<T>>
    where
        L: DeserializeOwned,
    {
        let response = self.send(request).await?;
        let continuation = response
            .headers()
            .get(CONTINUATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from);
        let list: L = json(response).await?;
        Ok(Page {
            items: items(list),
            continuation,
        })
    }
}

async fn json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| BackendError::transport(e.to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| BackendError::transport(format!("invalid response body: {}", e)))
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.code, body.message.unwrap_or_default()),
        Err(_) => (None, text),
    };
    // Service messages append activity ids and request URIs on later lines.
    let message = message.lines().next().unwrap_or_default().trim().to_string();
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    };
    BackendError::new(
        Some(status.as_u16()),
        code.or_else(|| status.canonical_reason().map(|r| r.replace(' ', ""))),
        message,
    )
}

fn collection_link(database: &str, container: &str) -> String {
    format!("dbs/{}/colls/{}", database, container)
}

#[async_trait]
impl CosmosClient for RestClient {
    async fn query_databases(
        &self,
        continuation: Option<String>,
    ) -> BackendResult<Page<DatabaseProperties>> {
        let request =
            Request::new(Method::GET, "dbs", String::new(), vec!["dbs"]).continuation(continuation);
        self.page(request, |list: DatabaseList| list.databases).await
    }

    async fn create_database(&self, id: &str) -> BackendResult<()> {
        let body = serde_json::json!({ "id": id }).to_string().into_bytes();
        let request = Request::new(Method::POST, "dbs", String::new(), vec!["dbs"]).body(body, JSON);
        self.send(request).await?;
        Ok(())
    }

    async fn query_containers(
        &self,
        database: &str,
        continuation: Option<String>,
    ) -> BackendResult<Page<ContainerProperties>> {
        let request = Request::new(
            Method::GET,
            "colls",
            format!("dbs/{}", database),
            vec!["dbs", database, "colls"],
        )
        .continuation(continuation);
        self.page(request, |list: ContainerList| list.containers).await
    }

    async fn read_container(
        &self,
        database: &str,
        container: &str,
    ) -> BackendResult<ContainerProperties> {
        let request = Request::new(
            Method::GET,
            "colls",
            collection_link(database, container),
            vec!["dbs", database, "colls", container],
        );
        json(self.send(request).await?).await
    }

    async fn read_throughput(
        &self,
        database: &str,
        container: &str,
    ) -> BackendResult<ThroughputProperties> {
        let properties = self.read_container(database, container).await?;
        let rid = properties
            .resource_id
            .ok_or_else(|| BackendError::transport("container response carries no resource id"))?;

        let query = QueryBody {
            query: "SELECT * FROM root WHERE root.offerResourceId = @rid",
            parameters: vec![QueryParameter {
                name: "@rid",
                value: &rid,
            }],
        };
        let request =
            Request::new(Method::POST, "offers", String::new(), vec!["offers"]).query(&query)?;
        let offers: OfferList = json(self.send(request).await?).await?;

        let offer = offers.offers.into_iter().next().ok_or_else(|| {
            BackendError::new(
                Some(404),
                Some("NotFound".to_string()),
                format!("no dedicated throughput offer for container '{}'", container),
            )
        })?;

        let autoscale_max = offer
            .content
            .offer_autopilot_settings
            .and_then(|s| s.max_throughput);
        Ok(ThroughputProperties {
            manual: if autoscale_max.is_some() {
                None
            } else {
                offer.content.offer_throughput
            },
            autoscale_max,
        })
    }

    async fn create_container(
        &self,
        database: &str,
        container: &NewContainer,
        throughput: Option<u32>,
    ) -> BackendResult<()> {
        let body = serde_json::json!({
            "id": container.id,
            "partitionKey": {
                "paths": [container.partition_key_path],
                "kind": "Hash",
                "version": 2
            }
        })
        .to_string()
        .into_bytes();
        let mut request = Request::new(
            Method::POST,
            "colls",
            format!("dbs/{}", database),
            vec!["dbs", database, "colls"],
        )
        .body(body, JSON);
        if let Some(ru) = throughput {
            request = request.header("x-ms-offer-throughput", ru.to_string());
        }
        self.send(request).await?;
        Ok(())
    }

    async fn create_item(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        document: &Document,
    ) -> BackendResult<()> {
        let request = Request::new(
            Method::POST,
            "docs",
            collection_link(database, container),
            vec!["dbs", database, "colls", container, "docs"],
        )
        .header(PARTITION_KEY, partition_key.header_value())
        .body(document.as_str().as_bytes().to_vec(), JSON);
        self.send(request).await?;
        Ok(())
    }

    async fn read_item(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        id: &str,
    ) -> BackendResult<String> {
        let request = Request::new(
            Method::GET,
            "docs",
            format!("{}/docs/{}", collection_link(database, container), id),
            vec!["dbs", database, "colls", container, "docs", id],
        )
        .header(PARTITION_KEY, partition_key.header_value());
        self.send(request)
            .await?
            .text()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))
    }

    async fn query_items(
        &self,
        database: &str,
        container: &str,
        query: &str,
        partition_key: Option<&PartitionKey>,
        continuation: Option<String>,
    ) -> BackendResult<Page<String>> {
        let body = QueryBody {
            query,
            parameters: Vec::new(),
        };
        let request = Request::new(
            Method::POST,
            "docs",
            collection_link(database, container),
            vec!["dbs", database, "colls", container, "docs"],
        )
        .query(&body)?
        .continuation(continuation);
        let request = match partition_key {
            Some(pk) => request.header(PARTITION_KEY, pk.header_value()),
            None => request.header("x-ms-documentdb-query-enablecrosspartition", "True"),
        };
        self.page(request, |list: DocumentList| {
            list.documents
                .into_iter()
                .map(|raw| raw.get().to_string())
                .collect()
        })
        .await
    }

    async fn execute_batch(
        &self,
        database: &str,
        container: &str,
        partition_key: &PartitionKey,
        documents: &[Document],
    ) -> BackendResult<Vec<BatchOperationResult>> {
        let operations: Vec<BatchOperation<'_>> = documents
            .iter()
            .map(|doc| BatchOperation {
                operation_type: "Create",
                resource_body: doc.as_raw(),
            })
            .collect();
        let body =
            serde_json::to_vec(&operations).map_err(|e| BackendError::transport(e.to_string()))?;

        let request = Request::new(
            Method::POST,
            "docs",
            collection_link(database, container),
            vec!["dbs", database, "colls", container, "docs"],
        )
        .header(PARTITION_KEY, partition_key.header_value())
        .header("x-ms-cosmos-is-batch-request", "True")
        .header("x-ms-cosmos-batch-atomic", "True")
        .header("x-ms-cosmos-batch-continue-on-error", "False")
        .body(body, JSON);

        // A rejected batch answers 207 Multi-Status with per-operation codes.
        json(self.send(request).await?).await
    }
}
