//! ARM error envelope and client error type

use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the ARM REST client
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with a non-success status
    #[error("unexpected status {status} with error: {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("sending request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("long-running operation ended with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("long-running operation did not complete within {0:?}")]
    OperationTimeout(std::time::Duration),
}

impl ApiError {
    /// Build a status error from a response body, decoding the ARM envelope when present
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::Status {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => Self::Status {
                status,
                code: "Unknown".to_string(),
                message: body.chars().take(200).collect(),
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// "Not found" is the one condition handlers recover from (the resource is removed from state)
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// True when an `anyhow` error chain carries a 404 from the ARM API
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(ApiError::is_not_found)
}

/// `{"error": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

/// Format an ARM API error for display on the command line
pub fn format_azure_error(error: &anyhow::Error) -> String {
    let api = error.chain().find_map(|e| e.downcast_ref::<ApiError>());

    match api {
        Some(ApiError::Status { status: 401, .. }) => {
            "Authentication failed. Check ARM_CLIENT_ID/ARM_CLIENT_SECRET/ARM_TENANT_ID or ARM_ACCESS_TOKEN.".to_string()
        },
        Some(ApiError::Status { status: 403, code, .. }) => {
            format!("Permission denied ({}). Check the role assignments of the principal.", code)
        },
        Some(ApiError::Status { status: 404, .. }) => "Resource not found.".to_string(),
        Some(ApiError::Status { status: 409, code, .. }) => {
            format!("Resource conflict ({}). The resource may already exist or be in use.", code)
        },
        Some(ApiError::Status { status: 429, .. }) => {
            "Rate limit exceeded. Please try again later.".to_string()
        },
        Some(ApiError::Status { status, code, message }) => {
            let message: String = message.chars().take(160).collect();
            format!("Azure returned {} {}: {}", status, code, message)
        },
        _ => {
            let text = format!("{:#}", error);
            let sanitized: String = text
                .chars()
                .filter(|c| !c.is_control())
                .take(200)
                .collect();
            if sanitized.len() < text.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        },
    }
}
