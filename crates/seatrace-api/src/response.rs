//! # Response Envelope
//!
//! Every JSON response, success or failure, uses the same body:
//!
//! ```json
//! { "code": 200, "message": "success", "data": { ... } }
//! ```
//!
//! `code` mirrors the HTTP status of the response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Uniform `{code, message, data}` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    /// Equal to the HTTP status code.
    pub code: u16,
    pub message: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".into(),
            data,
        }
    }

    /// Failure body; `data.error` carries the machine-readable code.
    pub fn failure(status: StatusCode, error: &str, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: status.as_u16(),
            message: message.into(),
            data: serde_json::json!({ "error": error }),
        })
    }
}

/// A successful response carrying `T` as `data`.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    envelope: Envelope,
}

impl ApiResponse {
    /// 200 with `data`.
    pub fn ok<T: Serialize>(data: &T) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: Envelope::success(to_value(data)),
        }
    }

    /// Non-200 success status (e.g. 202) with its own message.
    pub fn with_status<T: Serialize>(status: StatusCode, message: impl Into<String>, data: &T) -> Self {
        Self {
            status,
            envelope: Envelope {
                code: status.as_u16(),
                message: message.into(),
                data: to_value(data),
            },
        }
    }
}

fn to_value<T: Serialize>(data: &T) -> serde_json::Value {
    serde_json::to_value(data).unwrap_or_else(|e| {
        tracing::error!(error = %e, "response data failed to serialize");
        serde_json::Value::Null
    })
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ok_wraps_data() {
        let resp = ApiResponse::ok(&serde_json::json!({"n": 1})).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["code"], 200);
        assert_eq!(body["message"], "success");
        assert_eq!(body["data"]["n"], 1);
    }

    #[tokio::test]
    async fn code_mirrors_custom_status() {
        let resp = ApiResponse::with_status(StatusCode::ACCEPTED, "pending", &vec![1, 2])
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = body_json(resp).await;
        assert_eq!(body["code"], 202);
        assert_eq!(body["message"], "pending");
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn failure_carries_error_code() {
        let Json(env) = Envelope::failure(StatusCode::NOT_FOUND, "NOT_FOUND", "missing");
        assert_eq!(env.code, 404);
        assert_eq!(env.message, "missing");
        assert_eq!(env.data["error"], "NOT_FOUND");
    }
}
