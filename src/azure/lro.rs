//! Long-running operations
//!
//! ARM acknowledges slow writes with 201/202 and a polling URL in the
//! `Azure-AsyncOperation` or `Location` header. Resources created
//! synchronously may still report a non-terminal `provisioningState`,
//! in which case the resource itself is polled.

use super::error::ApiError;
use super::http::ArmResponse;
use reqwest::Method;
use serde_json::Value;

pub const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
pub const LOCATION_HEADER: &str = "location";

/// How to find out whether the operation finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStrategy {
    /// Status document at the `Azure-AsyncOperation` URL
    AsyncOperation(String),
    /// 202 until done at the `Location` URL
    Location(String),
    /// `properties.provisioningState` of the resource itself
    ProvisioningState(String),
}

impl PollStrategy {
    pub fn url(&self) -> &str {
        match self {
            Self::AsyncOperation(url) | Self::Location(url) | Self::ProvisioningState(url) => url,
        }
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    InProgress,
    Succeeded(Value),
    Failed { status: String, message: String },
}

/// Decide whether the initial response needs polling
pub fn strategy_for(method: &Method, url: &str, response: &ArmResponse) -> Option<PollStrategy> {
    if let Some(async_url) = response.header(ASYNC_OPERATION_HEADER) {
        return Some(PollStrategy::AsyncOperation(async_url.to_string()));
    }

    if response.status == 202 {
        if let Some(location) = response.header(LOCATION_HEADER) {
            return Some(PollStrategy::Location(location.to_string()));
        }
    }

    if (*method == Method::PUT || *method == Method::PATCH)
        && matches!(response.status, 200 | 201)
    {
        if let Some(state) = provisioning_state(&response.body) {
            if !is_terminal(state) {
                return Some(PollStrategy::ProvisioningState(url.to_string()));
            }
        }
    }

    None
}

fn provisioning_state(body: &Value) -> Option<&str> {
    body.get("properties")
        .and_then(|p| p.get("provisioningState"))
        .and_then(|s| s.as_str())
}

fn is_terminal(state: &str) -> bool {
    ["succeeded", "failed", "canceled", "cancelled"]
        .iter()
        .any(|t| state.eq_ignore_ascii_case(t))
}

fn failure(state: &str, body: &Value) -> PollStatus {
    let message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("no error details returned")
        .to_string();
    PollStatus::Failed {
        status: state.to_string(),
        message,
    }
}

fn from_state(state: &str, body: &Value) -> PollStatus {
    if state.eq_ignore_ascii_case("succeeded") {
        PollStatus::Succeeded(body.clone())
    } else if is_terminal(state) {
        failure(state, body)
    } else {
        PollStatus::InProgress
    }
}

/// Interpret a poll response according to the strategy
pub fn interpret(strategy: &PollStrategy, response: &ArmResponse) -> PollStatus {
    match strategy {
        PollStrategy::AsyncOperation(_) => {
            let state = response
                .body
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("InProgress");
            from_state(state, &response.body)
        },
        PollStrategy::Location(_) => match response.status {
            202 => PollStatus::InProgress,
            _ => PollStatus::Succeeded(response.body.clone()),
        },
        PollStrategy::ProvisioningState(_) => {
            let state = provisioning_state(&response.body).unwrap_or("Succeeded");
            from_state(state, &response.body)
        },
    }
}

/// Whether the final resource must be re-read after the operation finishes
pub fn needs_final_get(method: &Method, strategy: &PollStrategy) -> bool {
    (*method == Method::PUT || *method == Method::PATCH)
        && !matches!(strategy, PollStrategy::ProvisioningState(_))
}

impl PollStatus {
    /// `None` while in progress, the final body once succeeded
    pub fn into_result(self) -> Result<Option<Value>, ApiError> {
        match self {
            Self::InProgress => Ok(None),
            Self::Succeeded(body) => Ok(Some(body)),
            Self::Failed { status, message } => Err(ApiError::OperationFailed { status, message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;

    fn response(status: u16, headers: &[(&'static str, &'static str)], body: Value) -> ArmResponse {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        ArmResponse {
            status,
            headers: map,
            body,
        }
    }

    #[test]
    fn test_async_operation_header_wins() {
        let resp = response(
            201,
            &[
                ("azure-asyncoperation", "https://op/1"),
                ("location", "https://loc/1"),
            ],
            Value::Null,
        );
        assert_eq!(
            strategy_for(&Method::PUT, "https://res", &resp),
            Some(PollStrategy::AsyncOperation("https://op/1".to_string()))
        );
    }

    #[test]
    fn test_location_only_on_202() {
        let resp = response(202, &[("location", "https://loc/1")], Value::Null);
        assert_eq!(
            strategy_for(&Method::DELETE, "https://res", &resp),
            Some(PollStrategy::Location("https://loc/1".to_string()))
        );

        let resp = response(201, &[("location", "https://loc/1")], Value::Null);
        assert_eq!(strategy_for(&Method::DELETE, "https://res", &resp), None);
    }

    #[test]
    fn test_provisioning_state_polling() {
        let resp = response(201, &[], json!({"properties": {"provisioningState": "Creating"}}));
        assert_eq!(
            strategy_for(&Method::PUT, "https://res", &resp),
            Some(PollStrategy::ProvisioningState("https://res".to_string()))
        );

        let done = response(200, &[], json!({"properties": {"provisioningState": "Succeeded"}}));
        assert_eq!(strategy_for(&Method::PUT, "https://res", &done), None);
        assert_eq!(strategy_for(&Method::GET, "https://res", &resp), None);
    }

    #[test]
    fn test_interpret_async_operation() {
        let strategy = PollStrategy::AsyncOperation("https://op".to_string());
        assert_eq!(
            interpret(&strategy, &response(200, &[], json!({"status": "InProgress"}))),
            PollStatus::InProgress
        );
        assert!(matches!(
            interpret(&strategy, &response(200, &[], json!({"status": "Succeeded"}))),
            PollStatus::Succeeded(_)
        ));
        assert_eq!(
            interpret(
                &strategy,
                &response(200, &[], json!({"status": "Failed", "error": {"code": "X", "message": "quota exceeded"}}))
            ),
            PollStatus::Failed {
                status: "Failed".to_string(),
                message: "quota exceeded".to_string()
            }
        );
    }

    #[test]
    fn test_interpret_location() {
        let strategy = PollStrategy::Location("https://loc".to_string());
        assert_eq!(interpret(&strategy, &response(202, &[], Value::Null)), PollStatus::InProgress);
        assert_eq!(
            interpret(&strategy, &response(200, &[], json!({"ok": true}))),
            PollStatus::Succeeded(json!({"ok": true}))
        );
    }

    #[test]
    fn test_needs_final_get() {
        let op = PollStrategy::AsyncOperation("x".to_string());
        assert!(needs_final_get(&Method::PUT, &op));
        assert!(!needs_final_get(&Method::DELETE, &op));
        assert!(!needs_final_get(&Method::PUT, &PollStrategy::ProvisioningState("x".to_string())));
    }
}
