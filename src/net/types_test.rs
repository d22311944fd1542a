use super::*;
use serde_json::json;

const UUID_A: &str = "0b7d3c2e-8f0e-4d8f-9d7a-3f3c1a2b4c5d";
const UUID_B: &str = "9a1e6f40-1c55-4e52-8b8e-6b2f0d7c9e11";

fn document_json(id: i64, uuid: &str, hits: u64) -> serde_json::Value {
    json!({
        "id": id,
        "uuid": uuid,
        "original_filename": format!("doc-{id}.pdf"),
        "file_path": format!("uploads/{uuid}/doc-{id}.pdf"),
        "storage_url": format!("https://cdn.example.test/{uuid}/doc-{id}.pdf"),
        "upload_timestamp": format!("2024-05-0{id}T10:00:00"),
        "hit_count": hits,
    })
}

#[test]
fn document_canonical_shape_parses() {
    let doc: Document = serde_json::from_value(document_json(1, UUID_A, 4)).unwrap();
    assert_eq!(doc.id, 1);
    assert_eq!(doc.uuid.to_string(), UUID_A);
    assert_eq!(doc.original_filename, "doc-1.pdf");
    assert_eq!(doc.storage_url, format!("https://cdn.example.test/{UUID_A}/doc-1.pdf"));
    assert_eq!(doc.hit_count, 4);
    assert_eq!(doc.document_type, None);
    assert_eq!(doc.parent_uuid, None);
}

#[test]
fn document_split_fields_parse() {
    let mut value = document_json(2, UUID_B, 0);
    value["document_type"] = json!("first_page");
    value["parent_uuid"] = json!(UUID_A);
    let doc: Document = serde_json::from_value(value).unwrap();
    assert_eq!(doc.document_type.as_deref(), Some("first_page"));
    assert_eq!(doc.parent_uuid.map(|u| u.to_string()).as_deref(), Some(UUID_A));
}

#[test]
fn document_legacy_fields_are_normalized() {
    let doc: Document = serde_json::from_value(json!({
        "id": 7,
        "uuid": UUID_A,
        "name": "legacy.pdf",
        "file_path": "uploads/legacy.pdf",
        "upload_date": "2023-01-02T03:04:05",
        "file_size": 2048,
        "user_id": 3,
    }))
    .unwrap();
    assert_eq!(doc.original_filename, "legacy.pdf");
    assert_eq!(doc.upload_timestamp, "2023-01-02T03:04:05");
    assert_eq!(doc.storage_url, "uploads/legacy.pdf");
    assert_eq!(doc.hit_count, 0);
    assert_eq!(doc.file_size, Some(2048));
}

#[test]
fn document_prefers_current_fields_over_legacy() {
    let mut value = document_json(3, UUID_A, 1);
    value["name"] = json!("old-name.pdf");
    value["upload_date"] = json!("1999-01-01");
    let doc: Document = serde_json::from_value(value).unwrap();
    assert_eq!(doc.original_filename, "doc-3.pdf");
    assert_eq!(doc.upload_timestamp, "2024-05-03T10:00:00");
}

#[test]
fn document_without_filename_is_rejected() {
    let err = serde_json::from_value::<Document>(json!({
        "id": 9,
        "uuid": UUID_A,
        "upload_timestamp": "2024-01-01T00:00:00",
    }))
    .unwrap_err();
    assert!(err.to_string().contains("no filename"));
}

#[test]
fn document_serializes_canonical_names_only() {
    let doc: Document = serde_json::from_value(json!({
        "id": 7,
        "uuid": UUID_A,
        "name": "legacy.pdf",
        "upload_date": "2023-01-02T03:04:05",
    }))
    .unwrap();
    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value["original_filename"], "legacy.pdf");
    assert_eq!(value["upload_timestamp"], "2023-01-02T03:04:05");
    assert!(value.get("name").is_none());
    assert!(value.get("upload_date").is_none());
    assert!(value.get("document_type").is_none());
}

#[test]
fn empty_document_list_is_empty() {
    let list: DocumentList = serde_json::from_value(json!({ "documents": [], "total": 0 })).unwrap();
    assert!(list.is_empty());
    assert_eq!(UsageStats::from_list(&list), UsageStats::default());
}

#[test]
fn document_list_with_entries_is_not_empty() {
    let list: DocumentList = serde_json::from_value(json!({
        "documents": [document_json(1, UUID_A, 2)],
        "total": 1,
    }))
    .unwrap();
    assert!(!list.is_empty());
    assert_eq!(list.documents.len(), 1);
}

#[test]
fn token_grant_defaults_token_type() {
    let grant: TokenGrant = serde_json::from_value(json!({ "access_token": "abc" })).unwrap();
    assert_eq!(grant.access_token, "abc");
    assert_eq!(grant.token_type, "bearer");
}

#[test]
fn split_upload_response_orders_documents() {
    let resp: SplitUploadResponse = serde_json::from_value(json!({
        "first_page_document": document_json(1, UUID_A, 0),
        "remaining_pages_document": document_json(2, UUID_B, 0),
        "merged_document": document_json(3, UUID_A, 0),
        "message": "PDF split successfully",
    }))
    .unwrap();
    let ids: Vec<i64> = resp.documents().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(resp.message.as_deref(), Some("PDF split successfully"));
}

#[test]
fn split_params_only_emit_set_fields() {
    assert!(SplitUploadParams::default().query_pairs().is_empty());

    let params = SplitUploadParams { remaining_qr_x: Some(10), remaining_qr_size: Some(55), ..Default::default() };
    assert_eq!(params.query_pairs(), vec![("remaining_qr_x", 10), ("remaining_qr_size", 55)]);
}

#[test]
fn standard_split_params_match_letterhead() {
    assert_eq!(
        SplitUploadParams::standard().query_pairs(),
        vec![
            ("remaining_qr_page", 2),
            ("remaining_qr_x", 28),
            ("remaining_qr_y", 703),
            ("remaining_qr_size", 70),
        ]
    );
}

#[test]
fn usage_stats_sum_page() {
    let mut first = document_json(1, UUID_A, 3);
    first["file_size"] = json!(1_048_576);
    let mut second = document_json(2, UUID_B, 5);
    second["file_size"] = json!(1_048_576);
    let list: DocumentList = serde_json::from_value(json!({
        "documents": [first, second, document_json(3, UUID_A, 0)],
        "total": 12,
    }))
    .unwrap();

    let stats = UsageStats::from_list(&list);
    assert_eq!(stats.total_documents, 12);
    assert_eq!(stats.page_documents, 3);
    assert_eq!(stats.total_hits, 8);
    assert_eq!(stats.total_bytes, 2_097_152);
    assert!((stats.total_mebibytes() - 2.0).abs() < f64::EPSILON);
    assert_eq!(stats.latest_upload.as_deref(), Some("2024-05-03T10:00:00"));
}

#[test]
fn document_without_timestamp_still_parses() {
    let doc: Document = serde_json::from_value(json!({
        "id": 10,
        "uuid": UUID_A,
        "original_filename": "undated.pdf",
    }))
    .unwrap();
    assert_eq!(doc.upload_timestamp, "");
}

#[test]
fn one_undated_record_does_not_sink_the_list() {
    let list: DocumentList = serde_json::from_value(json!({
        "documents": [
            document_json(1, UUID_A, 1),
            { "id": 2, "uuid": UUID_B, "name": "partial.pdf" },
        ],
        "total": 2,
    }))
    .unwrap();
    assert_eq!(list.documents.len(), 2);
    assert_eq!(list.documents[1].original_filename, "partial.pdf");
    assert_eq!(UsageStats::from_list(&list).latest_upload.as_deref(), Some("2024-05-01T10:00:00"));
}

#[test]
fn page_past_the_end_is_empty_but_account_is_not() {
    let list: DocumentList = serde_json::from_value(json!({ "documents": [], "total": 25 })).unwrap();
    assert!(list.is_empty());
    assert!(!list.has_no_documents());
}

#[test]
fn account_without_documents_has_no_documents() {
    let list: DocumentList = serde_json::from_value(json!({ "documents": [], "total": 0 })).unwrap();
    assert!(list.has_no_documents());
}

#[test]
fn usage_stats_saturate_instead_of_overflowing() {
    let mut first = document_json(1, UUID_A, u64::MAX);
    first["file_size"] = json!(u64::MAX);
    let mut second = document_json(2, UUID_B, 7);
    second["file_size"] = json!(1024);
    let list: DocumentList = serde_json::from_value(json!({
        "documents": [first, second],
        "total": 2,
    }))
    .unwrap();

    let stats = UsageStats::from_list(&list);
    assert_eq!(stats.total_hits, u64::MAX);
    assert_eq!(stats.total_bytes, u64::MAX);
}
