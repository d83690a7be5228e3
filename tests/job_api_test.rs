mod common;

use common::config_for;
use docjob_client::error::{StatusError, TriggerError};
use docjob_client::infrastructure::http::setup_http;
use docjob_client::models::{Artifact, JobId, StorageKey};
use docjob_client::services::job_api::{HttpJobApi, JobApi, JobStatus};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> HttpJobApi {
    let config = config_for(&server.uri());
    HttpJobApi::new(setup_http(&config).unwrap(), &config).unwrap()
}

async fn mount_trigger(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/start"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn key() -> StorageKey {
    StorageKey::new("uploads/1700000000000-a.pdf")
}

#[tokio::test]
async fn test_trigger_double_encoded_body() {
    let server = MockServer::start().await;
    mount_trigger(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"body": "{\"executionArn\":\"abc\"}"})),
    )
    .await;

    let job_id = api_for(&server).start_job("bucket", &key()).await.unwrap();
    assert_eq!(job_id, JobId::new("abc"));
}

#[tokio::test]
async fn test_trigger_string_encoded_root() {
    let server = MockServer::start().await;
    mount_trigger(
        &server,
        ResponseTemplate::new(200).set_body_string("\"{\\\"executionArn\\\":\\\"arn:exec:7\\\"}\""),
    )
    .await;

    let job_id = api_for(&server).start_job("bucket", &key()).await.unwrap();
    assert_eq!(job_id.as_str(), "arn:exec:7");
}

#[tokio::test]
async fn test_trigger_two_body_levels() {
    let server = MockServer::start().await;
    mount_trigger(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "statusCode": 200,
            "body": "{\"body\":{\"executionArn\":\"deep\"}}",
        })),
    )
    .await;

    let job_id = api_for(&server).start_job("bucket", &key()).await.unwrap();
    assert_eq!(job_id.as_str(), "deep");
}

#[tokio::test]
async fn test_trigger_non_success_status() {
    let server = MockServer::start().await;
    mount_trigger(&server, ResponseTemplate::new(502).set_body_string("Bad Gateway")).await;

    let err = api_for(&server).start_job("bucket", &key()).await.unwrap_err();
    match err {
        TriggerError::Status { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "Bad Gateway");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_trigger_without_job_id() {
    let server = MockServer::start().await;
    mount_trigger(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"message": "started"})),
    )
    .await;

    let err = api_for(&server).start_job("bucket", &key()).await.unwrap_err();
    assert!(matches!(err, TriggerError::MissingJobId { ref field } if field == "executionArn"));
}

#[tokio::test]
async fn test_trigger_non_json_body() {
    let server = MockServer::start().await;
    mount_trigger(&server, ResponseTemplate::new(200).set_body_string("<html>ok</html>")).await;

    let err = api_for(&server).start_job("bucket", &key()).await.unwrap_err();
    assert!(matches!(err, TriggerError::MissingJobId { .. }));
}

#[tokio::test]
async fn test_status_sends_job_id_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(query_param("executionArn", "arn:aws:states:exec/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://s3/r"})))
        .expect(1)
        .mount(&server)
        .await;

    let status = api_for(&server)
        .job_status(&JobId::new("arn:aws:states:exec/1"))
        .await
        .unwrap();
    assert_eq!(
        status,
        JobStatus::Completed(Artifact::Reference("https://s3/r".to_string()))
    );
}

#[tokio::test]
async fn test_status_errors_are_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let job = JobId::new("j");

    assert!(matches!(
        api.job_status(&job).await,
        Err(StatusError::Status(503))
    ));
    assert!(matches!(
        api.job_status(&job).await,
        Err(StatusError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_status_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "RUNNING"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server.uri());
    config.request_timeout = Duration::from_millis(100);
    let api = HttpJobApi::new(setup_http(&config).unwrap(), &config).unwrap();

    let err = api.job_status(&JobId::new("j")).await.unwrap_err();
    assert!(matches!(err, StatusError::Timeout));
}
