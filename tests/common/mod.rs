//! Shared harness for the integration tests
//!
//! Stands up a wiremock server playing the ARM endpoint, builds clients
//! pointed at it, and drives handlers through a full lifecycle.

#![allow(dead_code)]

use serde_json::Value;
use tfarm::azure::auth::ArmCredentials;
use tfarm::azure::AzureClient;
use tfarm::config::{Config, RetrySettings};
use tfarm::resource::ResourceHandler;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SUBSCRIPTION: &str = "11111111-2222-3333-4444-555555555555";
pub const TOKEN: &str = "test-token";

/// Configuration pointing at `server` with millisecond retry and poll delays
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.environment.resource_manager_endpoint = server.uri();
    config.retry = RetrySettings {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 10,
        request_timeout_secs: 5,
        poll_interval_ms: 1,
        operation_timeout_ms: 5_000,
    };
    config
}

pub fn client_for(server: &MockServer) -> AzureClient {
    AzureClient::with_credentials(
        &config_for(server),
        SUBSCRIPTION,
        ArmCredentials::from_static(TOKEN),
    )
    .expect("client should build")
}

/// Mount `responses` for `verb path`, each answered exactly once in order;
/// the last one keeps answering
pub async fn mount_sequence(
    server: &MockServer,
    verb: &str,
    resource_path: &str,
    responses: Vec<ResponseTemplate>,
) {
    let last = responses.len().saturating_sub(1);
    for (i, response) in responses.into_iter().enumerate() {
        let mock = Mock::given(method(verb))
            .and(path(resource_path))
            .respond_with(response);
        let mock = if i < last { mock.up_to_n_times(1) } else { mock };
        mock.mount(server).await;
    }
}

pub fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(serde_json::json!({
        "error": {"code": "ResourceNotFound", "message": "The resource was not found."}
    }))
}

pub fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// States observed while driving a handler through its lifecycle
pub struct Lifecycle {
    pub created: Value,
    pub read: Value,
    pub updated: Value,
}

/// create → read → update → delete → read (expecting `None`)
///
/// The mocks on the server must answer in that order.
pub async fn run_lifecycle(
    handler: &dyn ResourceHandler,
    create_config: &Value,
    update_config: &Value,
) -> Lifecycle {
    let created = handler.create(create_config).await.expect("create should succeed");
    let id = created["id"]
        .as_str()
        .expect("state should carry an id")
        .to_string();

    assert_eq!(handler.import(&id).expect("id should be importable"), id);

    let read = handler
        .read(&id)
        .await
        .expect("read should succeed")
        .expect("resource should exist after create");

    let updated = handler
        .update(&id, update_config)
        .await
        .expect("update should succeed");
    assert_eq!(updated["id"], created["id"]);

    handler.delete(&id).await.expect("delete should succeed");
    assert!(
        handler.read(&id).await.expect("read should succeed").is_none(),
        "resource should be gone after delete"
    );

    Lifecycle {
        created,
        read,
        updated,
    }
}
