use super::*;
use crate::token::MemoryTokenStore;

const DOC_UUID: &str = "0b7d3c2e-8f0e-4d8f-9d7a-3f3c1a2b4c5d";

fn doc_uuid() -> Uuid {
    Uuid::parse_str(DOC_UUID).unwrap()
}

fn client() -> ApiClient {
    let mut config = PortalConfig::new("https://api.example.test").unwrap();
    config.public_base_url = "https://www.example.test".to_owned();
    ApiClient::new(&config, Arc::new(MemoryTokenStore::default())).unwrap()
}

#[test]
fn documents_endpoint_formats_paging() {
    assert_eq!(documents_endpoint(1, 10), "/documents/?page=1&page_size=10");
    assert_eq!(documents_endpoint(3, 50), "/documents/?page=3&page_size=50");
}

#[test]
fn document_endpoint_formats_id() {
    assert_eq!(document_endpoint(42), "/documents/42");
}

#[test]
fn split_upload_endpoint_omits_empty_query() {
    assert_eq!(split_upload_endpoint(&SplitUploadParams::default()), "/documents/upload-split");
}

#[test]
fn split_upload_endpoint_includes_set_params() {
    let params = SplitUploadParams { remaining_qr_page: Some(3), remaining_qr_y: Some(700), ..Default::default() };
    assert_eq!(
        split_upload_endpoint(&params),
        "/documents/upload-split?remaining_qr_page=3&remaining_qr_y=700"
    );
}

#[test]
fn view_url_uses_api_base() {
    assert_eq!(client().view_url(&doc_uuid()), format!("https://api.example.test/view/{DOC_UUID}"));
}

#[test]
fn document_path_encodes_filename() {
    assert_eq!(
        client().document_path(&doc_uuid(), "Annual Report #1.pdf"),
        format!("/uploads/portal/user_documents/{DOC_UUID}/Annual%20Report%20%231.pdf")
    );
}

#[test]
fn public_document_url_uses_public_base() {
    assert_eq!(
        client().public_document_url(&doc_uuid(), "a.pdf"),
        format!("https://www.example.test/uploads/portal/user_documents/{DOC_UUID}/a.pdf")
    );
}

#[test]
fn upload_file_accepts_pdf_signature() {
    let file = UploadFile::pdf("contract.pdf", b"%PDF-1.7\n...".to_vec()).unwrap();
    assert_eq!(file.file_name, "contract.pdf");
    assert_eq!(file.content_type, "application/pdf");
}

#[test]
fn upload_file_rejects_non_pdf() {
    let err = UploadFile::pdf("notes.txt", b"hello".to_vec()).unwrap_err();
    assert!(matches!(err, ApiError::InvalidUpload(_)));
    assert!(err.to_string().contains("notes.txt is not a PDF document"));
}

#[tokio::test]
async fn upload_file_from_path_reads_name_and_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, b"%PDF-1.4 body").unwrap();

    let file = UploadFile::from_path(&path).await.unwrap();
    assert_eq!(file.file_name, "scan.pdf");
    assert_eq!(file.bytes, b"%PDF-1.4 body");
}

#[tokio::test]
async fn upload_file_from_missing_path_is_invalid_upload() {
    let dir = tempfile::tempdir().unwrap();
    let err = UploadFile::from_path(dir.path().join("missing.pdf")).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidUpload(_)));
}

#[test]
fn empty_response_does_not_decode_as_json() {
    let err = ApiResponse::Empty.into_json::<User>().unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[test]
fn json_response_decodes_into_type() {
    let response = ApiResponse::Json(json!({ "id": 1, "username": "alice", "email": "alice@example.test" }));
    let user: User = response.into_json().unwrap();
    assert_eq!(user.username, "alice");
}

#[test]
fn token_store_is_shared_not_copied() {
    let api = client();
    api.token_store().store("shared").unwrap();
    assert_eq!(api.token_store().load().unwrap().as_deref(), Some("shared"));
}
