use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::client_for;
use crate::ideogram::download::{download_with_retry, DownloadError, DownloadSettings};

fn fast_settings(dir: &tempfile::TempDir, max_retries: u32) -> DownloadSettings {
    DownloadSettings {
        timeout: Duration::from_millis(100),
        backoff: Duration::from_millis(10),
        max_retries,
        download_dir: dir.path().to_path_buf(),
    }
}

#[tokio::test]
async fn timeout_is_attempted_exactly_max_retries_plus_one_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/response/slow/image"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_bytes(b"late".to_vec()),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(&dir, 2);

    let err = download_with_retry(&client, &settings, &client.download_url("slow"), "slow")
        .await
        .unwrap_err();

    match err {
        DownloadError::Exhausted { id, attempts, .. } => {
            assert_eq!(id, "slow");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn protocol_errors_are_retried_then_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/response/bad/image"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(&dir, 1);

    let err = download_with_retry(&client, &settings, &client.download_url("bad"), "bad")
        .await
        .unwrap_err();

    match err {
        DownloadError::Exhausted { last_error, .. } => {
            assert!(last_error.contains("500"), "unexpected error: {last_error}");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn success_writes_the_deterministic_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/response/ok/image"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-bytes".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(&dir, 2);

    let saved = download_with_retry(&client, &settings, &client.download_url("ok"), "ok")
        .await
        .unwrap();

    assert_eq!(saved, dir.path().join("downloaded_image_ok.png"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"image-bytes");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn a_transient_failure_recovers_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/response/flaky/image"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download/response/flaky/image"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second try".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(&dir, 2);

    let saved = download_with_retry(&client, &settings, &client.download_url("flaky"), "flaky")
        .await
        .unwrap();

    assert_eq!(std::fs::read(&saved).unwrap(), b"second try");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
