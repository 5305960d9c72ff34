//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`df_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and get a JSON body with a stable code.
//! Only the public message reaches the client; engine diagnostics stay in
//! the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: df_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: df_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<df_core::Error> for AppError {
    fn from(e: df_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.inner.is_conversion_failure() {
            // The engine's own diagnostics only ever reach the log.
            tracing::warn!(
                status = %status,
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Conversion failed"
            );
        } else if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Conversion request failed"
            );
        } else {
            tracing::info!(
                status = %status,
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Conversion request rejected"
            );
        }

        let body = json!({
            "error": self.inner.public_message(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn no_input_produces_400() {
        let response = AppError::new(df_core::Error::NoInputProvided).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn too_large_produces_413() {
        let response =
            AppError::new(df_core::Error::PayloadTooLarge { limit: 10 }).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn engine_output_is_not_leaked() {
        let err = df_core::Error::EngineNonZeroExit {
            code: Some(1),
            output: "Error: /srv/uploads/secret.docx could not be loaded".into(),
        };
        let response = AppError::new(err).with_request_id("req-1".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "The conversion failed.");
        assert_eq!(json["code"], "engine_failed");
        assert_eq!(json["request_id"], "req-1");
        assert!(!json.to_string().contains("secret.docx"));
    }

    #[tokio::test]
    async fn timeout_has_its_own_code() {
        let err = df_core::Error::EngineTimeout {
            timeout: Duration::from_secs(180),
        };
        let json = body_json(AppError::new(err).into_response()).await;
        assert_eq!(json["code"], "engine_timeout");
        assert_eq!(json["error"], "The conversion timed out.");
        assert!(json["request_id"].is_null());
    }
}
