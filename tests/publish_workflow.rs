//! End-to-end publish runs against mocked SDS, GitHub and Cloud Storage.
//!
//! | Scenario | File | Metadata | Expected |
//! |----------|------|----------|----------|
//! | A | `1.json` (version 1) | 404 | posted |
//! | B | `2.json` (version 1) | - | version mismatch, no POST |
//! | C | `1.json` (version 1) | `[{"schema_version": "1"}]` | duplicate, no POST |

use std::sync::Arc;

use sds_schema_publisher::gcp::{GcsClient, MetadataServer};
use sds_schema_publisher::{
    BucketPublisher, ErrorKind, GithubPublisher, GithubSource, PublisherConfig, Schema,
    SchemaRegistry, SdsClient,
};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn schema_json() -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "survey_id": { "enum": ["123"] },
            "schema_version": { "const": "1" }
        }
    })
}

fn sds_config(server: &MockServer) -> PublisherConfig {
    PublisherConfig {
        sds_url: server.uri(),
        authenticate: false,
        ..PublisherConfig::default()
    }
}

async fn mount_github_file(server: &MockServer, file: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/github/{}", file)))
        .respond_with(ResponseTemplate::new(200).set_body_json(schema_json()))
        .mount(server)
        .await;
}

async fn mount_metadata(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/schema_metadata"))
        .and(query_param("survey_id", "123"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn github_source(server: &MockServer) -> GithubSource {
    GithubSource::new(reqwest::Client::new(), format!("{}/github/", server.uri()))
}

// ── Scenario A ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_survey_schema_is_posted() {
    let server = MockServer::start().await;
    mount_github_file(&server, "1.json").await;
    mount_metadata(&server, ResponseTemplate::new(404)).await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .and(query_param("survey_id", "123"))
        .and(body_json(schema_json()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "guid": "2f4a",
            "survey_id": "123",
            "schema_version": "1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let outcome = GithubPublisher::new(github_source(&server), &sds)
        .publish("1.json")
        .await
        .unwrap();

    assert_eq!(outcome.survey_id, "123");
    assert_eq!(outcome.schema_version, "1");
    assert_eq!(outcome.filepath, "1.json");
    assert_eq!(outcome.response["guid"], "2f4a");
}

// ── Scenario B ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_filename_version_mismatch_stops_before_post() {
    let server = MockServer::start().await;
    mount_github_file(&server, "2.json").await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let err = GithubPublisher::new(github_source(&server), &sds)
        .publish("2.json")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaVersionMismatchError);
    assert_eq!(err.filepath(), "2.json");
}

// ── Scenario C ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_registered_version_is_a_duplicate() {
    let server = MockServer::start().await;
    mount_github_file(&server, "1.json").await;
    mount_metadata(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "schema_version": "1" }])),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let err = GithubPublisher::new(github_source(&server), &sds)
        .publish("1.json")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaDuplicationError);
}

// ── Registry status mapping ──────────────────────────────────────────

#[tokio::test]
async fn test_other_versions_do_not_block_publishing() {
    let server = MockServer::start().await;
    mount_github_file(&server, "1.json").await;
    mount_metadata(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "schema_version": "0", "guid": "a" },
            { "schema_version": "2", "guid": "b" }
        ])),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let outcome = GithubPublisher::new(github_source(&server), &sds)
        .publish("1.json")
        .await
        .unwrap();
    assert_eq!(outcome.response, serde_json::Value::Null);
}

#[tokio::test]
async fn test_metadata_server_error_is_reported() {
    let server = MockServer::start().await;
    mount_metadata(&server, ResponseTemplate::new(500)).await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let err = sds.get_schema_metadata("123").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaMetadataError);
    assert_eq!(err.filepath(), "N/A");
    assert!(err.message().contains("Status code: 500"));
}

#[tokio::test]
async fn test_undecodable_metadata_stops_before_post() {
    let server = MockServer::start().await;
    mount_github_file(&server, "1.json").await;
    mount_metadata(&server, ResponseTemplate::new(200).set_body_string("not json")).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let err = GithubPublisher::new(github_source(&server), &sds)
        .publish("1.json")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaJsonDecodeError);
    assert_eq!(err.filepath(), "N/A");
}

#[tokio::test]
async fn test_post_response_body_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200).set_body_string("created"))
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let schema = Schema::from_json(schema_json(), Some("1.json")).unwrap();

    // A plain-text acknowledgement is not an error
    assert_eq!(sds.post_schema(&schema).await.unwrap(), serde_json::Value::Null);
}

#[tokio::test]
async fn test_rejected_post_is_reported() {
    let server = MockServer::start().await;
    mount_github_file(&server, "1.json").await;
    mount_metadata(&server, ResponseTemplate::new(404)).await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), None).unwrap();
    let err = GithubPublisher::new(github_source(&server), &sds)
        .publish("1.json")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaPostError);
    assert_eq!(err.filepath(), "1.json");
    assert_eq!(err.message(), "Failed to post schema. Status code: 400");
}

#[tokio::test]
async fn test_bearer_token_is_sent_to_sds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/schema_metadata"))
        .and(wiremock::matchers::header("Authorization", "Bearer id-token"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sds = SdsClient::new(&sds_config(&server), Some("id-token")).unwrap();
    assert!(sds.get_schema_metadata("123").await.unwrap().is_none());
}

// ── Bucket variant ───────────────────────────────────────────────────

#[tokio::test]
async fn test_bucket_schema_is_deleted_after_posting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.test",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/intake"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "intake"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/intake/o/1.json"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(schema_json()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/intake/o/1.json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_metadata(&server, ResponseTemplate::new(404)).await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let tokens = Arc::new(MetadataServer::new(http.clone(), server.uri()));
    let storage = GcsClient::new(http, server.uri(), tokens);
    let sds = SdsClient::new(&sds_config(&server), None).unwrap();

    let outcome = BucketPublisher::from_bucket(&storage, "intake", &sds)
        .publish("1.json")
        .await
        .unwrap();
    assert_eq!(outcome.survey_id, "123");
}

#[tokio::test]
async fn test_bucket_schema_is_kept_when_post_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.test",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/intake"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "intake"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/intake/o/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(schema_json()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    mount_metadata(&server, ResponseTemplate::new(404)).await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let tokens = Arc::new(MetadataServer::new(http.clone(), server.uri()));
    let storage = GcsClient::new(http, server.uri(), tokens);
    let sds = SdsClient::new(&sds_config(&server), None).unwrap();

    let err = BucketPublisher::from_bucket(&storage, "intake", &sds)
        .publish("1.json")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaPostError);
}
