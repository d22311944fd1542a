//! REST client for the portal backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every outbound call goes through [`ApiClient::request`], which attaches the
//! persisted bearer token, picks the body encoding, and turns failures into a
//! single [`ApiError`]. Typed helpers for auth, documents, and the public
//! viewer sit on top of it.
//!
//! ERROR HANDLING
//! ==============
//! The client never swallows a failure and never retries; it also never
//! writes the token store. Both decisions belong to the caller.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::path::Path;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use super::error::ApiError;
use super::types::{
    Document, DocumentList, SplitUploadParams, SplitUploadResponse, TokenGrant, UploadResponse, User, ViewResponse,
};
use crate::config::PortalConfig;
use crate::token::TokenStore;

const JSON_CONTENT_TYPE: &str = "application/json";
const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_SIGNATURE: &[u8] = b"%PDF-";

pub const DEFAULT_PAGE_SIZE: u32 = 10;

// =============================================================================
// ENDPOINTS
// =============================================================================

fn documents_endpoint(page: u32, page_size: u32) -> String {
    format!("/documents/?page={page}&page_size={page_size}")
}

fn document_endpoint(document_id: i64) -> String {
    format!("/documents/{document_id}")
}

fn split_upload_endpoint(params: &SplitUploadParams) -> String {
    let query: Vec<String> = params
        .query_pairs()
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    if query.is_empty() {
        "/documents/upload-split".to_owned()
    } else {
        format!("/documents/upload-split?{}", query.join("&"))
    }
}

fn view_endpoint(document_uuid: &Uuid) -> String {
    format!("/view/{document_uuid}")
}

fn document_path(document_uuid: &Uuid, filename: &str) -> String {
    format!(
        "/uploads/portal/user_documents/{document_uuid}/{}",
        urlencoding::encode(filename)
    )
}

// =============================================================================
// REQUEST / RESPONSE BODIES
// =============================================================================

/// A file to send as the `file` field of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Wrap in-memory PDF bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUpload`] if `bytes` does not start with a PDF signature.
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ApiError> {
        let file_name = file_name.into();
        if !bytes.starts_with(PDF_SIGNATURE) {
            return Err(ApiError::InvalidUpload(format!("{file_name} is not a PDF document")));
        }
        Ok(Self { file_name, content_type: PDF_CONTENT_TYPE.to_owned(), bytes })
    }

    /// Read a PDF from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUpload`] if the file cannot be read or is not a PDF.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidUpload(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::InvalidUpload(format!("{}: no file name", path.display())))?;
        Self::pdf(file_name, bytes)
    }

    fn into_form(self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.content_type)
            .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
        Ok(Form::new().part("file", part))
    }
}

/// Outgoing request payload.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Multipart upload; the transport chooses the content type and boundary.
    File(UploadFile),
}

/// Decoded success response.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    /// 2xx without a JSON content type.
    Empty,
}

impl ApiResponse {
    /// Decode the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if the response was empty or does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Self::Json(value) => serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string())),
            Self::Empty => Err(ApiError::Decode("expected a JSON response body".to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Credentials {
    Attach,
    Omit,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Single access point for every backend call.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    public_base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Build a client for the configured backend, reading credentials from `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &PortalConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .user_agent(concat!("docportal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            public_base_url: config.public_base_url.clone(),
            tokens,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token store this client reads credentials from.
    #[must_use]
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.tokens)
    }

    /// Execute one call against `endpoint` (a path beginning with `/`).
    ///
    /// Extra headers are applied first; the bearer token and content type
    /// are set on top of them.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] for non-2xx responses, [`ApiError::Transport`]
    /// when no response arrives, and [`ApiError::Decode`] when a JSON body is malformed.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        extra_headers: Option<HeaderMap>,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(method, endpoint, body, extra_headers, Credentials::Attach)
            .await
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        extra_headers: Option<HeaderMap>,
        credentials: Credentials,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{endpoint}", self.base_url);
        let mut headers = extra_headers.unwrap_or_default();
        headers.remove(AUTHORIZATION);

        if credentials == Credentials::Attach {
            if let Some(token) = self.tokens.load()? {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| ApiError::Transport(format!("stored token is not a valid header: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
        }

        let builder = self.http.request(method.clone(), url.as_str());
        let builder = match body {
            RequestBody::File(file) => {
                headers.remove(CONTENT_TYPE);
                builder.headers(headers).multipart(file.into_form()?)
            }
            RequestBody::Json(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                builder.headers(headers).body(value.to_string())
            }
            RequestBody::Empty => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                builder.headers(headers)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        tracing::debug!(%method, endpoint, status = status.as_u16(), "api response");

        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains(JSON_CONTENT_TYPE));
        if !is_json {
            return Ok(ApiResponse::Empty);
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map(ApiResponse::Json)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /auth/register`: create an account.
    ///
    /// # Errors
    ///
    /// Returns the backend's validation message for malformed or duplicate input.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User, ApiError> {
        let body = json!({ "username": username, "email": email, "password": password });
        self.request(Method::POST, "/auth/register", RequestBody::Json(body), None)
            .await?
            .into_json()
    }

    /// `POST /auth/login`: exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns the backend's message when the credentials are rejected.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenGrant, ApiError> {
        let body = json!({ "username": username, "password": password });
        self.request(Method::POST, "/auth/login", RequestBody::Json(body), None)
            .await?
            .into_json()
    }

    /// `GET /auth/me`: identity behind the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing, invalid, or expired.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.request(Method::GET, "/auth/me", RequestBody::Empty, None)
            .await?
            .into_json()
    }

    // =========================================================================
    // DOCUMENTS
    // =========================================================================

    /// `POST /documents/upload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the file.
    pub async fn upload(&self, file: UploadFile) -> Result<UploadResponse, ApiError> {
        self.request(Method::POST, "/documents/upload", RequestBody::File(file), None)
            .await?
            .into_json()
    }

    /// `POST /documents/upload-split`: split, QR-stamp, and merge one PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not a valid document.
    pub async fn upload_split(
        &self,
        file: UploadFile,
        params: &SplitUploadParams,
    ) -> Result<SplitUploadResponse, ApiError> {
        let endpoint = split_upload_endpoint(params);
        self.request(Method::POST, &endpoint, RequestBody::File(file), None)
            .await?
            .into_json()
    }

    /// `GET /documents/?page&page_size`: one page of the caller's documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self, page: u32, page_size: u32) -> Result<DocumentList, ApiError> {
        self.request(Method::GET, &documents_endpoint(page, page_size), RequestBody::Empty, None)
            .await?
            .into_json()
    }

    /// `GET /documents/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist.
    pub async fn get(&self, document_id: i64) -> Result<Document, ApiError> {
        self.request(Method::GET, &document_endpoint(document_id), RequestBody::Empty, None)
            .await?
            .into_json()
    }

    /// `DELETE /documents/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist or belongs to someone else.
    pub async fn delete(&self, document_id: i64) -> Result<(), ApiError> {
        self.request(Method::DELETE, &document_endpoint(document_id), RequestBody::Empty, None)
            .await
            .map(|_| ())
    }

    // =========================================================================
    // PUBLIC
    // =========================================================================

    /// `GET /view/{uuid}`: public metadata; never sends credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is unknown.
    pub async fn view_metadata(&self, document_uuid: &Uuid) -> Result<ViewResponse, ApiError> {
        self.execute(
            Method::GET,
            &view_endpoint(document_uuid),
            RequestBody::Empty,
            None,
            Credentials::Omit,
        )
        .await?
        .into_json()
    }

    /// API URL returning a document's public metadata.
    #[must_use]
    pub fn view_url(&self, document_uuid: &Uuid) -> String {
        format!("{}{}", self.base_url, view_endpoint(document_uuid))
    }

    /// Path of a stored document relative to the public site root.
    #[must_use]
    pub fn document_path(&self, document_uuid: &Uuid, filename: &str) -> String {
        document_path(document_uuid, filename)
    }

    /// Shareable link to a stored document on the public site.
    #[must_use]
    pub fn public_document_url(&self, document_uuid: &Uuid, filename: &str) -> String {
        format!("{}{}", self.public_base_url, document_path(document_uuid, filename))
    }
}
