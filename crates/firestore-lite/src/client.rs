//! Firestore client: configuration, root handle, and REST operations.
//!
//! The root handle fixes the authentication mode for its whole reference
//! tree at construction time:
//! - service-account mode sends cached OAuth bearer tokens,
//! - API-key mode appends `key=` and optionally forwards a Firebase user
//!   ID token as `Authorization: Firebase <token>`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Map;
use tracing::{info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::refs::CollectionReference;
use crate::token_cache::TokenCache;
use crate::types::{self, CommitRequest, Document, Write};

/// Production Firestore REST endpoint.
pub const DEFAULT_HOST: &str = "https://firestore.googleapis.com";

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Endpoint override (emulator/testing); `None` means production.
    pub host: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl FirestoreConfig {
    /// Create a config for the given project with default settings.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            host: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let host = std::env::var("FIRESTORE_EMULATOR_HOST").ok().map(|h| {
            if h.starts_with("http://") || h.starts_with("https://") {
                h
            } else {
                format!("http://{}", h)
            }
        });

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            host,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}

// =============================================================================
// Root Handle
// =============================================================================

/// How requests are authorized. Fixed at root-handle construction.
pub(crate) enum AuthMode {
    /// Privileged access with cached service-account OAuth tokens.
    ServiceAccount { tokens: TokenCache },
    /// Public web API key, optionally with a per-call user ID token.
    ApiKey { api_key: String },
}

/// Firestore root handle.
///
/// Cheap to clone; all derived references share the underlying HTTP client
/// and auth state.
#[derive(Clone)]
pub struct Firestore {
    inner: Arc<ClientInner>,
}

impl Firestore {
    /// Create a handle in service-account (admin) mode.
    ///
    /// Loads the service account from `GOOGLE_APPLICATION_CREDENTIALS`.
    pub async fn with_service_account(config: FirestoreConfig) -> FirestoreResult<Self> {
        let provider = Self::load_service_account()?;
        Self::build(
            config,
            AuthMode::ServiceAccount {
                tokens: TokenCache::new(provider),
            },
        )
    }

    /// Create a handle in API-key mode. No credential provider is
    /// constructed in this mode.
    pub fn with_api_key(
        config: FirestoreConfig,
        api_key: impl Into<String>,
    ) -> FirestoreResult<Self> {
        Self::build(
            config,
            AuthMode::ApiKey {
                api_key: api_key.into(),
            },
        )
    }

    fn load_service_account() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    fn build(config: FirestoreConfig, auth: AuthMode) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("firestore-lite/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let host = config
            .host
            .clone()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let base_path = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );
        let base_url = format!("{}/v1/{}", host.trim_end_matches('/'), base_path);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                auth,
                base_path,
                base_url,
            }),
        })
    }

    /// Get a reference to a top-level collection. No I/O.
    pub fn collection(&self, collection_id: impl Into<String>) -> CollectionReference {
        CollectionReference::new(Arc::clone(&self.inner), vec![collection_id.into()])
    }
}

// =============================================================================
// Shared Client State
// =============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Connection state shared by the root handle and every derived reference.
pub(crate) struct ClientInner {
    http: Client,
    auth: AuthMode,
    /// Resource prefix: `projects/{p}/databases/{d}/documents`
    base_path: String,
    /// `{host}/v1/{base_path}`
    base_url: String,
}

impl ClientInner {
    /// Percent-encode each path segment, keeping the separators.
    fn encode_path(path: &str) -> String {
        path.split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Build a document URL. In API-key mode `key=` goes last, after any
    /// other query parameters.
    fn document_url(&self, path: &str, mut params: Vec<String>) -> String {
        if let AuthMode::ApiKey { api_key } = &self.auth {
            params.push(format!("key={}", api_key));
        }

        let encoded = Self::encode_path(path);
        if params.is_empty() {
            format!("{}/{}", self.base_url, encoded)
        } else {
            format!("{}/{}?{}", self.base_url, encoded, params.join("&"))
        }
    }

    fn commit_url(&self) -> String {
        match &self.auth {
            AuthMode::ApiKey { api_key } => format!("{}:commit?key={}", self.base_url, api_key),
            AuthMode::ServiceAccount { .. } => format!("{}:commit", self.base_url),
        }
    }

    /// Attach the mode's authorization to a request.
    async fn authorize(
        &self,
        request: RequestBuilder,
        token: Option<&str>,
    ) -> FirestoreResult<RequestBuilder> {
        match &self.auth {
            AuthMode::ServiceAccount { tokens } => Ok(request.bearer_auth(tokens.get_token().await?)),
            AuthMode::ApiKey { .. } => Ok(match token {
                Some(t) => request.header(reqwest::header::AUTHORIZATION, format!("Firebase {}", t)),
                None => request,
            }),
        }
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send a request, refreshing the cached service-account token and
    /// resending once if it expired mid-flight.
    async fn send<F>(&self, make: F, token: Option<&str>) -> FirestoreResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = self.authorize(make(), token).await?.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let AuthMode::ServiceAccount { tokens } = &self.auth {
                let body = response.text().await.unwrap_or_default();
                if Self::is_access_token_expired(&body) {
                    tokens.invalidate().await;
                    return Ok(self.authorize(make(), token).await?.send().await?);
                }
                return Err(FirestoreError::from_http_status(401, Self::error_message(&body)));
            }
        }

        Ok(response)
    }

    /// Extract the provider-supplied message from an error body, falling
    /// back to the raw body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.to_string())
    }

    async fn error_from_response(response: Response) -> FirestoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status, Self::error_message(&body))
    }

    /// Execute a request with tracing and metrics.
    async fn instrumented<T, F>(&self, operation: &str, path: &str, fut: F) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!("firestore_request", operation = %operation, path = %path);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    // =========================================================================
    // Terminal Operations
    // =========================================================================

    /// Fetch a document, optionally projecting to the given field paths.
    pub(crate) async fn get_document(
        &self,
        path: &str,
        field_paths: Option<&[&str]>,
        token: Option<&str>,
    ) -> FirestoreResult<Map<String, serde_json::Value>> {
        let mut params = Vec::new();
        if let Some(field_paths) = field_paths {
            params.extend(
                field_paths
                    .iter()
                    .map(|fp| format!("mask.fieldPaths={}", urlencoding::encode(fp))),
            );
        }
        let url = self.document_url(path, params);

        self.instrumented("get", path, async {
            let response = self.send(|| self.http.get(&url), token).await?;

            if response.status().is_success() {
                let doc: Document = response.json().await?;
                Ok(doc
                    .fields
                    .as_ref()
                    .map(types::fields_to_json)
                    .unwrap_or_default())
            } else {
                Err(Self::error_from_response(response).await)
            }
        })
        .await
    }

    /// Overwrite a document via a single set-no-merge write on `:commit`.
    pub(crate) async fn set_document(
        &self,
        path: &str,
        data: &Map<String, serde_json::Value>,
        token: Option<&str>,
    ) -> FirestoreResult<()> {
        let url = self.commit_url();
        let body = CommitRequest {
            writes: vec![Write::set(
                format!("{}/{}", self.base_path, path),
                types::json_to_fields(data),
            )],
        };

        self.instrumented("set", path, async {
            let response = self.send(|| self.http.post(&url).json(&body), token).await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_from_response(response).await)
            }
        })
        .await
    }

    /// Delete a document.
    pub(crate) async fn delete_document(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> FirestoreResult<()> {
        let url = self.document_url(path, Vec::new());

        self.instrumented("delete", path, async {
            let response = self.send(|| self.http.delete(&url), token).await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_from_response(response).await)
            }
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_requires_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        let result = FirestoreConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_rejects_empty_project_id() {
        std::env::set_var("GCP_PROJECT_ID", "");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        let result = FirestoreConfig::from_env();
        assert!(result.is_err());
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_accepts_firebase_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.project_id, "firebase-project");
        std::env::remove_var("FIREBASE_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("FIRESTORE_DATABASE_ID");
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.database_id, "(default)");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.host.is_none());
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_emulator_host_gets_scheme() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.host.as_deref(), Some("http://localhost:8080"));
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_handles_invalid_env_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    fn test_error_message_extracts_provider_detail() {
        let body = r#"{"error":{"code":404,"message":"not found","status":"NOT_FOUND"}}"#;
        assert_eq!(ClientInner::error_message(body), "not found");
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(ClientInner::error_message("upstream blew up"), "upstream blew up");
    }

    #[test]
    fn test_encode_path_preserves_separators() {
        assert_eq!(ClientInner::encode_path("users/a b"), "users/a%20b");
        assert_eq!(ClientInner::encode_path("a/b/c"), "a/b/c");
    }
}
