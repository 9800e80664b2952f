use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{CHECK_IN_PROGRESS, CommandResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// HTTP status for a failed command, keyed by its error code.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        CHECK_IN_PROGRESS => StatusCode::CONFLICT,
        "TRANSIENT_IO" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A command outcome rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiReply {
    status: StatusCode,
    body: ApiResponse<Value>,
}

impl ApiReply {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Upgrades a successful reply to `201 Created`.
    pub fn created(mut self) -> Self {
        if self.status == StatusCode::OK {
            self.status = StatusCode::CREATED;
        }
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        CommandResponse::failure("VALIDATION_ERROR", message).into()
    }
}

impl From<CommandResponse> for ApiReply {
    fn from(response: CommandResponse) -> Self {
        if response.success {
            return Self {
                status: StatusCode::OK,
                body: ApiResponse {
                    success: true,
                    data: response.data,
                    message: response.message,
                    error: None,
                    timestamp: chrono::Utc::now(),
                },
            };
        }

        let code = response.code.unwrap_or_else(|| "INTERNAL_ERROR".to_string());
        Self {
            status: status_for_code(&code),
            body: ApiResponse {
                success: false,
                data: None,
                message: None,
                error: Some(ApiError {
                    code,
                    message: response.message.unwrap_or_default(),
                }),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
