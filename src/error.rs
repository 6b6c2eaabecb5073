// Domain error taxonomy, mapped to HTTP responses at the surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("out of stock: requested {requested}, available {available}")]
    OutOfStock { requested: i64, available: i64 },

    #[error("insufficient funds: need {needed_cents} cents, have {available_cents}")]
    InsufficientFunds {
        needed_cents: i64,
        available_cents: i64,
    },

    #[error("balance refresh is on cooldown, try again later")]
    CooldownActive,

    #[error("reservation conflict, try again later")]
    ReservationConflict,

    #[error("category {0} not found")]
    CategoryNotFound(i64),

    #[error("category {0} is not a product")]
    NotAProduct(i64),

    #[error("category {0} still has unsold stock")]
    CategoryNotEmpty(i64),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShopError::OutOfStock { .. } => StatusCode::CONFLICT,
            ShopError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            ShopError::CooldownActive => StatusCode::TOO_MANY_REQUESTS,
            ShopError::ReservationConflict => StatusCode::SERVICE_UNAVAILABLE,
            ShopError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
            ShopError::NotAProduct(_) => StatusCode::BAD_REQUEST,
            ShopError::CategoryNotEmpty(_) => StatusCode::CONFLICT,
            ShopError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            ShopError::Database(e) => {
                tracing::error!("database error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
