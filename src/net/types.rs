//! Wire DTOs for the portal REST API.
//!
//! DESIGN
//! ======
//! Documents have exactly one canonical shape. Older backends report
//! `name`/`upload_date` instead of `original_filename`/`upload_timestamp`;
//! that mapping happens here, at deserialization, and nowhere else.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// AUTH
// =============================================================================

/// The authenticated portal user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Token issued by `POST /auth/login`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Metadata for one stored file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct Document {
    pub id: i64,
    pub uuid: Uuid,
    pub original_filename: String,
    pub file_path: String,
    pub storage_url: String,
    pub upload_timestamp: String,
    pub hit_count: u64,
    /// Role of the file in a split upload (e.g. first page, merged), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    /// Source document this one was derived from by a split upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<Uuid>,
    /// Size in bytes; only reported by some backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Every field name any backend revision has used for a document.
#[derive(Deserialize)]
struct RawDocument {
    id: i64,
    uuid: Uuid,
    original_filename: Option<String>,
    name: Option<String>,
    file_path: Option<String>,
    storage_url: Option<String>,
    upload_timestamp: Option<String>,
    upload_date: Option<String>,
    hit_count: Option<u64>,
    document_type: Option<String>,
    parent_uuid: Option<Uuid>,
    file_size: Option<u64>,
}

impl TryFrom<RawDocument> for Document {
    type Error = String;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let original_filename = raw
            .original_filename
            .or(raw.name)
            .ok_or_else(|| format!("document {} has no filename", raw.id))?;
        // A record without any timestamp still lists; the field renders blank.
        let upload_timestamp = raw.upload_timestamp.or(raw.upload_date).unwrap_or_default();
        let file_path = raw.file_path.unwrap_or_default();
        let storage_url = raw.storage_url.unwrap_or_else(|| file_path.clone());

        Ok(Self {
            id: raw.id,
            uuid: raw.uuid,
            original_filename,
            file_path,
            storage_url,
            upload_timestamp,
            hit_count: raw.hit_count.unwrap_or(0),
            document_type: raw.document_type,
            parent_uuid: raw.parent_uuid,
            file_size: raw.file_size,
        })
    }
}

/// One page of `GET /documents/`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub total: u64,
}

impl DocumentList {
    /// `true` when this page carries no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// `true` when the account has no documents at all (drives the empty-state view).
    /// A page past the end is empty without the account being empty.
    #[must_use]
    pub fn has_no_documents(&self) -> bool {
        self.total == 0 && self.documents.is_empty()
    }
}

/// Result of `POST /documents/upload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: i64,
    pub uuid: Uuid,
    #[serde(default)]
    pub message: String,
}

/// The three documents produced by `POST /documents/upload-split`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitUploadResponse {
    pub first_page_document: Document,
    pub remaining_pages_document: Document,
    pub merged_document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SplitUploadResponse {
    /// Documents in creation order: first page, remaining pages, merged.
    #[must_use]
    pub fn documents(&self) -> [&Document; 3] {
        [&self.first_page_document, &self.remaining_pages_document, &self.merged_document]
    }
}

pub const DEFAULT_REMAINING_QR_PAGE: u32 = 2;
pub const DEFAULT_REMAINING_QR_X: u32 = 28;
pub const DEFAULT_REMAINING_QR_Y: u32 = 703;
pub const DEFAULT_REMAINING_QR_SIZE: u32 = 70;

/// QR placement for the remaining-pages document of a split upload.
///
/// Unset fields are left to the backend's defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitUploadParams {
    pub remaining_qr_page: Option<u32>,
    pub remaining_qr_x: Option<u32>,
    pub remaining_qr_y: Option<u32>,
    pub remaining_qr_size: Option<u32>,
}

impl SplitUploadParams {
    /// Placement that fits the portal's standard letterhead.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            remaining_qr_page: Some(DEFAULT_REMAINING_QR_PAGE),
            remaining_qr_x: Some(DEFAULT_REMAINING_QR_X),
            remaining_qr_y: Some(DEFAULT_REMAINING_QR_Y),
            remaining_qr_size: Some(DEFAULT_REMAINING_QR_SIZE),
        }
    }

    /// Set parameters as query pairs, in a stable order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, u32)> {
        [
            ("remaining_qr_page", self.remaining_qr_page),
            ("remaining_qr_x", self.remaining_qr_x),
            ("remaining_qr_y", self.remaining_qr_y),
            ("remaining_qr_size", self.remaining_qr_size),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// Public metadata from `GET /view/{uuid}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewResponse {
    pub uuid: Uuid,
    pub original_filename: String,
    pub upload_timestamp: String,
    pub download_url: String,
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// Usage figures shown on the dashboard, derived from one listing page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    /// Documents the backend reports in total.
    pub total_documents: u64,
    /// Documents included in the sampled page.
    pub page_documents: usize,
    /// Sum of view hits across the page.
    pub total_hits: u64,
    /// Sum of known file sizes across the page, in bytes.
    pub total_bytes: u64,
    /// Most recent upload timestamp on the page.
    pub latest_upload: Option<String>,
}

impl UsageStats {
    #[must_use]
    pub fn from_list(list: &DocumentList) -> Self {
        let documents = &list.documents;
        Self {
            total_documents: list.total,
            page_documents: documents.len(),
            total_hits: documents.iter().fold(0_u64, |acc, d| acc.saturating_add(d.hit_count)),
            total_bytes: documents
                .iter()
                .filter_map(|d| d.file_size)
                .fold(0_u64, u64::saturating_add),
            // ISO-8601 timestamps order lexicographically.
            latest_upload: documents
                .iter()
                .map(|d| d.upload_timestamp.as_str())
                .filter(|ts| !ts.is_empty())
                .max()
                .map(ToOwned::to_owned),
        }
    }

    /// Total size in mebibytes, for display.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_mebibytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}
