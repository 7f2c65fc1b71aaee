//! Integration tests for the ARM client using wiremock
//!
//! These tests verify retry, error decoding and long-running-operation
//! polling against mocked endpoints.

mod common;

use common::{client_for, config_for, mount_sequence, not_found, ok, SUBSCRIPTION, TOKEN};
use serde_json::json;
use std::time::Duration;
use tfarm::azure::auth::ArmCredentials;
use tfarm::azure::error::{is_not_found, ApiError};
use tfarm::azure::AzureClient;
use wiremock::matchers::{bearer_token, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn group_path() -> String {
    format!("/subscriptions/{}/resourceGroups/rg1", SUBSCRIPTION)
}

mod http_client_tests {
    use super::*;

    /// GET sends the bearer token, api-version and a client request id
    #[tokio::test]
    async fn test_get_sends_auth_and_api_version() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(group_path()))
            .and(bearer_token(TOKEN))
            .and(query_param("api-version", "2022-09-01"))
            .and(header_exists("x-ms-client-request-id"))
            .respond_with(ok(json!({"name": "rg1", "location": "westeurope"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client.get(&group_path(), "2022-09-01").await.unwrap();
        assert_eq!(body["location"], "westeurope");
    }

    /// 429 and 503 are retried until the request succeeds
    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = MockServer::start().await;

        mount_sequence(
            &server,
            "GET",
            &group_path(),
            vec![
                ResponseTemplate::new(429).insert_header("Retry-After", "0"),
                ResponseTemplate::new(503),
                ok(json!({"name": "rg1"})),
            ],
        )
        .await;

        let client = client_for(&server);
        let body = client.get(&group_path(), "2022-09-01").await.unwrap();
        assert_eq!(body["name"], "rg1");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    /// Retries stop after max_retries and surface the last status
    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(group_path()))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"code": "InternalServerError", "message": "boom"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get(&group_path(), "2022-09-01").await.unwrap_err();
        let api = err.downcast_ref::<ApiError>().expect("should be an ApiError");
        assert_eq!(api.status(), Some(500));
        // initial attempt + 2 retries
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    /// Client errors are not retried and decode the error envelope
    #[tokio::test]
    async fn test_error_envelope_decoded() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(group_path()))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "LocationNotAvailableForResourceGroup",
                    "message": "The provided location 'mars' is not available"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .put(&group_path(), "2022-09-01", &json!({"location": "mars"}))
            .await
            .unwrap_err();

        match err.downcast_ref::<ApiError>() {
            Some(ApiError::Status { status, code, message }) => {
                assert_eq!(*status, 400);
                assert_eq!(code, "LocationNotAvailableForResourceGroup");
                assert!(message.contains("mars"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_404_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(group_path()))
            .respond_with(not_found())
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get(&group_path(), "2022-09-01").await.unwrap_err();
        assert!(is_not_found(&err));
    }

    /// Empty bodies decode to null
    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/exportTemplate", group_path())))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client
            .post(&format!("{}/exportTemplate", group_path()), "2022-09-01", None)
            .await
            .unwrap();
        assert!(body.is_null());
    }

    /// DELETE of something already gone counts as success
    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(group_path()))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.delete(&group_path(), "2022-09-01").await.unwrap();
    }
}

mod long_running_operation_tests {
    use super::*;

    /// PUT with Azure-AsyncOperation polls the status URL, then re-reads the resource
    #[tokio::test]
    async fn test_async_operation_then_final_get() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/op1", server.uri());

        Mock::given(method("PUT"))
            .and(path(group_path()))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation.as_str())
                    .set_body_json(json!({"properties": {"provisioningState": "Accepted"}})),
            )
            .mount(&server)
            .await;

        mount_sequence(
            &server,
            "GET",
            "/operations/op1",
            vec![
                ok(json!({"status": "InProgress"})),
                ok(json!({"status": "Succeeded"})),
            ],
        )
        .await;

        Mock::given(method("GET"))
            .and(path(group_path()))
            .respond_with(ok(json!({
                "name": "rg1",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client
            .put(&group_path(), "2022-09-01", &json!({"location": "westeurope"}))
            .await
            .unwrap();
        assert_eq!(body["properties"]["provisioningState"], "Succeeded");
    }

    /// DELETE with a Location header polls until the URL stops returning 202
    #[tokio::test]
    async fn test_location_polling_on_delete() {
        let server = MockServer::start().await;
        let location = format!("{}/operationResults/del1", server.uri());

        Mock::given(method("DELETE"))
            .and(path(group_path()))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Location", location.as_str())
                    .insert_header("Retry-After", "0"),
            )
            .mount(&server)
            .await;

        mount_sequence(
            &server,
            "GET",
            "/operationResults/del1",
            vec![ResponseTemplate::new(202), ResponseTemplate::new(200)],
        )
        .await;

        let client = client_for(&server);
        client.delete(&group_path(), "2022-09-01").await.unwrap();

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/operationResults/del1")
            .count();
        assert_eq!(polls, 2);
    }

    /// A failed operation surfaces its error message
    #[tokio::test]
    async fn test_failed_operation() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/op2", server.uri());

        Mock::given(method("PUT"))
            .and(path(group_path()))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", operation.as_str()),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/op2"))
            .respond_with(ok(json!({
                "status": "Failed",
                "error": {"code": "QuotaExceeded", "message": "quota exceeded"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .put(&group_path(), "2022-09-01", &json!({"location": "westeurope"}))
            .await
            .unwrap_err();

        match err.chain().find_map(|e| e.downcast_ref::<ApiError>()) {
            Some(ApiError::OperationFailed { status, message }) => {
                assert_eq!(status, "Failed");
                assert_eq!(message, "quota exceeded");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// A resource reporting a non-terminal provisioningState is polled directly
    #[tokio::test]
    async fn test_provisioning_state_polling() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(group_path()))
            .respond_with(ok(json!({"properties": {"provisioningState": "Creating"}})))
            .mount(&server)
            .await;

        mount_sequence(
            &server,
            "GET",
            &group_path(),
            vec![
                ok(json!({"properties": {"provisioningState": "Creating"}})),
                ok(json!({"name": "rg1", "properties": {"provisioningState": "Succeeded"}})),
            ],
        )
        .await;

        let client = client_for(&server);
        let body = client
            .put(&group_path(), "2022-09-01", &json!({"location": "westeurope"}))
            .await
            .unwrap();
        assert_eq!(body["name"], "rg1");
    }

    /// An operation that never leaves InProgress gives up once the deadline passes
    #[tokio::test]
    async fn test_operation_timeout() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/stuck", server.uri());

        Mock::given(method("PUT"))
            .and(path(group_path()))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", operation.as_str()),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/operations/stuck"))
            .respond_with(ok(json!({"status": "InProgress"})))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.retry.poll_interval_ms = 5;
        config.retry.operation_timeout_ms = 60;
        let client =
            AzureClient::with_credentials(&config, SUBSCRIPTION, ArmCredentials::from_static(TOKEN))
                .unwrap();

        let err = client
            .put(&group_path(), "2022-09-01", &json!({"location": "westeurope"}))
            .await
            .unwrap_err();

        match err.chain().find_map(|e| e.downcast_ref::<ApiError>()) {
            Some(ApiError::OperationTimeout(limit)) => {
                assert_eq!(*limit, Duration::from_millis(60));
            },
            other => panic!("unexpected error: {other:?}"),
        }

        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/operations/stuck")
            .count();
        assert!(polls >= 1);
    }
}
