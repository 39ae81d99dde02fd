//! Firestore REST API client.
//!
//! - Service-account auth with a cached access token (or the local emulator)
//! - One transparent re-auth when Firestore reports an expired token
//! - Retry with backoff on idempotent reads
//! - A tracing span and request metrics around every call

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::{TokenCache, TokenSource};
use crate::types::{Document, RunQueryRequest, RunQueryResponse, StructuredQuery, Value};

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Firebase / GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration for reads
    pub retry: RetryConfig,
    /// `host:port` of a Firestore emulator; disables service-account auth
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("FIREBASE_PROJECT_ID")
            .or_else(|_| std::env::var("GCP_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error("FIREBASE_PROJECT_ID must be set to access Firestore")
            })?;

        if project_id.trim().is_empty() {
            return Err(FirestoreError::auth_error("FIREBASE_PROJECT_ID cannot be empty"));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
        })
    }

    fn documents_url(&self, origin: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            origin.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }
}

/// Firestore REST API client. Cheap to clone.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Create a client against production Firestore or the configured emulator.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let (origin, source) = match &config.emulator_host {
            Some(host) => (format!("http://{}", host), TokenSource::Static("owner".to_string())),
            None => (
                "https://firestore.googleapis.com".to_string(),
                TokenSource::ServiceAccount(Self::service_account(&config.project_id)?),
            ),
        };
        Self::with_origin(config, &origin, source)
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    /// Create a client against an explicit origin (scheme + host).
    pub fn with_origin(
        config: FirestoreConfig,
        origin: &str,
        source: TokenSource,
    ) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("rotidote-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = config.documents_url(origin);

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(TokenCache::new(source)),
        })
    }

    /// Load service account credentials.
    ///
    /// `GOOGLE_APPLICATION_CREDENTIALS` wins; otherwise the key is assembled from
    /// `FIREBASE_CLIENT_EMAIL` and `FIREBASE_PRIVATE_KEY`.
    fn service_account(project_id: &str) -> FirestoreResult<Arc<dyn TokenProvider>> {
        let from_file = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;
        if let Some(sa) = from_file {
            return Ok(Arc::new(sa));
        }

        let client_email = std::env::var("FIREBASE_CLIENT_EMAIL").map_err(|_| {
            FirestoreError::auth_error(
                "Set GOOGLE_APPLICATION_CREDENTIALS or FIREBASE_CLIENT_EMAIL/FIREBASE_PRIVATE_KEY",
            )
        })?;
        let private_key = std::env::var("FIREBASE_PRIVATE_KEY")
            .map_err(|_| FirestoreError::auth_error("FIREBASE_PRIVATE_KEY not set"))?;

        let key = service_account_json(project_id, &client_email, &private_key);
        let sa = CustomServiceAccount::from_json(&key).map_err(|e| {
            FirestoreError::auth_error(format!("Invalid Firebase service account: {}", e))
        })?;
        Ok(Arc::new(sa))
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send a request with a bearer token, re-authenticating once on token expiry.
    async fn send_authorized<F>(&self, url: &str, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(
                401,
                format!("{} failed: {}", url, body),
            ));
        }

        debug!("Firestore access token expired, refreshing");
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(&token).send().await?)
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Get a document. Missing documents are `Ok(None)`.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);
        let (this, url) = (self, url.as_str());

        self.execute_request("get_document", collection, Some(doc_id), async {
            with_retry(&self.config.retry, "get_document", || async move {
                let response = this
                    .send_authorized(url, |token| this.http.get(url).bearer_auth(token))
                    .await?;
                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(Self::error_from_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Create a document with a caller-chosen ID. Fails if it already exists.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.post(&url).bearer_auth(token).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json::<Document>().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Replace a document's fields, creating it if missing.
    pub async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_url(collection, doc_id);
        let body = Document::new(fields);

        self.execute_request("set_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Document>().await?),
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Merge the masked fields into an existing document.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: &[&str],
    ) -> FirestoreResult<Document> {
        self.patch_document(collection, doc_id, fields, update_mask, None)
            .await
    }

    /// Merge the masked fields only if the document's `updateTime` still matches.
    ///
    /// A concurrent write in between yields `PreconditionFailed`.
    pub async fn update_document_with_precondition(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: &[&str],
        update_time: &str,
    ) -> FirestoreResult<Document> {
        self.patch_document(collection, doc_id, fields, update_mask, Some(update_time))
            .await
    }

    async fn patch_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: &[&str],
        update_time: Option<&str>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = update_mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
            .collect();
        match update_time {
            Some(ts) => params.push(format!("currentDocument.updateTime={}", urlencoding::encode(ts))),
            None => params.push("currentDocument.exists=true".to_string()),
        }
        let url = format!("{}?{}", self.document_url(collection, doc_id), params.join("&"));
        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Document>().await?),
                StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!("{}/{}", collection, doc_id))),
                status @ (StatusCode::BAD_REQUEST
                | StatusCode::CONFLICT
                | StatusCode::PRECONDITION_FAILED) => {
                    let text = response.text().await.unwrap_or_default();
                    if text.contains("FAILED_PRECONDITION") || status != StatusCode::BAD_REQUEST {
                        Err(FirestoreError::PreconditionFailed(format!("{}/{}", collection, doc_id)))
                    } else {
                        Err(FirestoreError::from_http_status(
                            status.as_u16(),
                            format!("{} failed: {}", url, text),
                        ))
                    }
                }
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.delete(&url).bearer_auth(token))
                .await?;
            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Run a structured query.
    ///
    /// `parent_path` is the document containing the queried collection, e.g.
    /// `users/UID` for a subcollection; pass `None` for top-level collections.
    pub async fn run_query(
        &self,
        parent_path: Option<&str>,
        query: StructuredQuery,
    ) -> FirestoreResult<Vec<Document>> {
        let url = match parent_path {
            Some(parent) => format!("{}/{}:runQuery", self.base_url, parent),
            None => format!("{}:runQuery", self.base_url),
        };
        let label = query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();
        let request = RunQueryRequest {
            structured_query: query,
        };
        let (this, url, request) = (self, url.as_str(), &request);

        self.execute_request("run_query", &label, None, async {
            with_retry(&self.config.retry, "run_query", || async move {
                let response = this
                    .send_authorized(url, |token| {
                        this.http.post(url).bearer_auth(token).json(request)
                    })
                    .await?;
                match response.status() {
                    StatusCode::OK => {
                        let body = response.text().await.unwrap_or_default();
                        // runQuery streams a JSON array; result-less entries only carry readTime.
                        let rows: Vec<RunQueryResponse> = serde_json::from_str(&body).map_err(|e| {
                            FirestoreError::InvalidResponse(format!(
                                "Failed to parse runQuery response: {} (body prefix: {})",
                                e,
                                body.chars().take(200).collect::<String>()
                            ))
                        })?;
                        Ok(rows.into_iter().filter_map(|r| r.document).collect())
                    }
                    status => Err(Self::error_from_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            collection = %collection,
            doc_id = doc_id.unwrap_or("-")
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, start.elapsed().as_millis() as f64);

        result
    }

    async fn error_from_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

/// Service-account key JSON in the shape `gcp_auth` expects.
fn service_account_json(project_id: &str, client_email: &str, private_key: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": project_id,
        "client_email": client_email,
        // Keys pasted into .env files carry escaped newlines.
        "private_key": private_key.replace("\\n", "\n"),
        "token_uri": "https://oauth2.googleapis.com/token",
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_requires_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        tokio_test::assert_err!(FirestoreConfig::from_env());
    }

    #[test]
    #[serial]
    fn test_config_defaults_and_emulator() {
        std::env::set_var("FIREBASE_PROJECT_ID", "rotidote-test");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("FIRESTORE_DATABASE_ID");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");

        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.project_id, "rotidote-test");
        assert_eq!(config.database_id, "(default)");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));
        assert_eq!(
            config.documents_url("http://localhost:8080"),
            "http://localhost:8080/v1/projects/rotidote-test/databases/(default)/documents"
        );

        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        std::env::remove_var("FIREBASE_PROJECT_ID");
    }

    #[test]
    fn test_service_account_json_unescapes_newlines() {
        let json = service_account_json("p", "svc@p.iam.gserviceaccount.com", "-----BEGIN-----\\nabc\\n-----END-----");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["private_key"], "-----BEGIN-----\nabc\n-----END-----");
        assert_eq!(parsed["client_email"], "svc@p.iam.gserviceaccount.com");
        assert_eq!(parsed["type"], "service_account");
    }
}
