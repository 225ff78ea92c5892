//! Error → HTTP response mapping.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::StorefrontError;

/// Machine-readable code carried in `error` for both stock failures.
const INSUFFICIENT_STOCK: &str = "insufficient_stock";

#[derive(Debug, Default, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_cart: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_id: Option<Uuid>,
}

impl StorefrontError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::QuantityExceeded { .. } | Self::InsufficientStock { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Config(_) | Self::Storage(_) | Self::Migration(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::QuantityExceeded { available, in_cart, .. } => ErrorBody {
                message: self.to_string(),
                error: Some(INSUFFICIENT_STOCK.into()),
                available_quantity: Some(*available),
                in_cart: Some(*in_cart),
                ..Default::default()
            },
            Self::InsufficientStock { line_id, .. } => ErrorBody {
                message: self.to_string(),
                error: Some(INSUFFICIENT_STOCK.into()),
                line_id: Some(*line_id),
                ..Default::default()
            },
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "request failed");
                ErrorBody { message: "Internal server error".into(), ..Default::default() }
            }
            _ => ErrorBody { message: self.to_string(), ..Default::default() },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for StorefrontError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for StorefrontError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for StorefrontError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(err: StorefrontError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_quantity_exceeded_reports_stock() {
        let (status, json) = body(StorefrontError::QuantityExceeded { requested: 3, available: 2, in_cart: 3 }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["available_quantity"], 2);
        assert_eq!(json["in_cart"], 3);
        assert_eq!(json["error"], "insufficient_stock");
    }

    #[tokio::test]
    async fn test_storage_errors_are_not_leaked() {
        let (status, json) = body(StorefrontError::Storage(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(StorefrontError::not_found("Product", 1).status(), StatusCode::NOT_FOUND);
        assert_eq!(StorefrontError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(StorefrontError::Forbidden.status(), StatusCode::FORBIDDEN);
        let (_, json) = body(StorefrontError::not_found("Product", 1)).await;
        assert_eq!(json["message"], "Product not found");
        assert!(json.get("error").is_none());
    }
}
