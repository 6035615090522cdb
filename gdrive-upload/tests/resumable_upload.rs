use gdrive_core::{DriveError, FileMetadata, UploadClient};
use gdrive_upload::config::UploadConfig;
use gdrive_upload::upload::backoff::Backoff;
use gdrive_upload::upload::{ResumableUpload, UploadError, UploadEvent, UploadRequest};
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> UploadConfig {
    UploadConfig {
        api_base: server.uri(),
        retry_backoff: Backoff::none(),
        ..UploadConfig::default()
    }
}

fn payload() -> Vec<u8> {
    (0..1_000u32).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn resumes_after_reset_from_probed_offset() {
    let server = MockServer::start().await;
    let session = format!("{}/upload/session/xyz", server.uri());
    let data = payload();

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-upload-content-length", "1000"))
        .and(header("x-upload-content-type", "application/octet-stream"))
        .and(body_json(json!({ "name": "data.bin", "parents": ["folder-1"] })))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/xyz"))
        .and(header("content-length", "1000"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/xyz"))
        .and(header("content-range", "bytes */1000"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-400"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/xyz"))
        .and(header("content-length", "600"))
        .and(body_bytes(data[400..].to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-xyz" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("data.bin");
    std::fs::write(&source, &data).unwrap();

    let request = UploadRequest {
        file_path: source,
        file_size: 1_000,
        mime_type: "application/octet-stream".into(),
        metadata: FileMetadata::new("data.bin").with_parent("folder-1"),
        bearer_token: "test-token".into(),
        retry_budget: 3,
    };
    let transport = UploadClient::with_base_url(&server.uri()).unwrap();
    let mut handle = ResumableUpload::new(transport, request, &config(&server)).spawn();

    let mut errors = 0;
    while let Some(event) = handle.next_event().await {
        if let UploadEvent::Error(_) = event {
            errors += 1;
        }
    }
    let uploaded = handle.outcome().await.expect("upload should finish");

    assert_eq!(errors, 1);
    assert_eq!(uploaded.file_id().as_deref(), Some("file-xyz"));
}

#[tokio::test]
async fn missing_session_location_is_retried_then_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("data.bin");
    std::fs::write(&source, payload()).unwrap();

    let request = UploadRequest {
        file_path: source,
        file_size: 1_000,
        mime_type: "application/octet-stream".into(),
        metadata: FileMetadata::new("data.bin"),
        bearer_token: "test-token".into(),
        retry_budget: 2,
    };
    let transport = UploadClient::with_base_url(&server.uri()).unwrap();
    let mut upload = ResumableUpload::new(transport, request, &config(&server));

    let err = upload.run(None).await.expect_err("expected terminal failure");

    assert!(matches!(err, UploadError::Exhausted { attempts: 3, .. }));
    assert!(upload.session().session_url().is_none());
}

#[tokio::test]
async fn unreadable_source_is_not_retried() {
    let server = MockServer::start().await;
    let session = format!("{}/upload/session/xyz", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let request = UploadRequest {
        file_path: dir.path().join("missing.bin"),
        file_size: 1_000,
        mime_type: "application/octet-stream".into(),
        metadata: FileMetadata::new("missing.bin"),
        bearer_token: "test-token".into(),
        retry_budget: -1,
    };
    let transport = UploadClient::with_base_url(&server.uri()).unwrap();
    let mut upload = ResumableUpload::new(transport, request, &config(&server));

    let err = upload.run(None).await.expect_err("expected local failure");

    assert!(matches!(err, UploadError::LocalIo { .. }));
}

#[tokio::test]
async fn refused_connection_during_initiation_is_retried() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = tempdir().unwrap();
    let source = dir.path().join("data.bin");
    std::fs::write(&source, payload()).unwrap();

    let request = UploadRequest {
        file_path: source,
        file_size: 1_000,
        mime_type: "application/octet-stream".into(),
        metadata: FileMetadata::new("data.bin"),
        bearer_token: "test-token".into(),
        retry_budget: 1,
    };
    let config = UploadConfig {
        api_base: base.clone(),
        retry_backoff: Backoff::none(),
        ..UploadConfig::default()
    };
    let transport = UploadClient::with_base_url(&base).unwrap();
    let mut upload = ResumableUpload::new(transport, request, &config);

    let err = upload.run(None).await.expect_err("nothing is listening");

    match err {
        UploadError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, UploadError::Initiate(DriveError::Request(_))));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
