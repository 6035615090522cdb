use gdrive_core::{DriveError, FileMetadata, UploadClient};
use serde_json::json;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn start_session_declares_upload_and_returns_location() {
    let server = MockServer::start().await;
    let location = format!("{}/upload/session/abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/json; charset=UTF-8"))
        .and(header("x-upload-content-length", "1000"))
        .and(header("x-upload-content-type", "video/mp4"))
        .and(body_json(json!({ "name": "clip.mp4", "parents": ["folder-1"] })))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", location.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let metadata = FileMetadata::new("clip.mp4").with_parent("folder-1");
    let session = client
        .start_session("test-token", &metadata, 1000, "video/mp4")
        .await
        .unwrap();

    assert_eq!(session.as_str(), location);
}

#[tokio::test]
async fn start_session_without_location_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let err = client
        .start_session("test-token", &FileMetadata::new("a.bin"), 10, "application/octet-stream")
        .await
        .expect_err("expected missing location");

    assert!(matches!(err, DriveError::MissingSessionLocation { .. }));
}

#[tokio::test]
async fn upload_bytes_puts_body_and_returns_response_text() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "text/plain"))
        .and(header("content-length", "7"))
        .and(body_bytes(b"payload".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"file-1"}"#))
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let session = url::Url::parse(&format!("{}/upload/session/abc", server.uri())).unwrap();
    let body = client
        .upload_bytes(&session, "test-token", "payload".into(), 7, "text/plain")
        .await
        .unwrap();

    assert_eq!(body, r#"{"id":"file-1"}"#);
}

#[tokio::test]
async fn upload_bytes_reports_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let session = url::Url::parse(&format!("{}/upload/session/abc", server.uri())).unwrap();
    let err = client
        .upload_bytes(&session, "test-token", "x".into(), 1, "text/plain")
        .await
        .expect_err("expected api error");

    assert!(err.is_retryable());
}

#[tokio::test]
async fn query_offset_parses_range_high_bound() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .and(header("content-length", "0"))
        .and(header("content-range", "bytes */1000"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-399"))
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let session = url::Url::parse(&format!("{}/upload/session/abc", server.uri())).unwrap();
    let offset = client
        .query_offset(&session, "test-token", 1000)
        .await
        .unwrap();

    assert_eq!(offset, Some(399));
}

#[tokio::test]
async fn query_offset_without_range_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .respond_with(ResponseTemplate::new(308))
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let session = url::Url::parse(&format!("{}/upload/session/abc", server.uri())).unwrap();
    let offset = client
        .query_offset(&session, "test-token", 1000)
        .await
        .unwrap();

    assert_eq!(offset, None);
}

#[tokio::test]
async fn query_offset_rejects_garbled_range() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=zero-many"))
        .mount(&server)
        .await;

    let client = UploadClient::with_base_url(&server.uri()).unwrap();
    let session = url::Url::parse(&format!("{}/upload/session/abc", server.uri())).unwrap();
    let err = client
        .query_offset(&session, "test-token", 1000)
        .await
        .expect_err("expected invalid range");

    assert!(matches!(err, DriveError::InvalidRange(_)));
}
