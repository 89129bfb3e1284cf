//! Error handling for the Trade Ledger platform
//!
//! Every rejected operation names the rule it violated together with the
//! item and quantities involved, so the caller can correct the request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::Pool;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{LedgerError, LockError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger and fulfilment errors
    #[error(
        "Insufficient {pool} quantity for item {item_id} at warehouse {warehouse_id}: requested {requested}, available {available}"
    )]
    InsufficientQuantity {
        warehouse_id: Uuid,
        item_id: Uuid,
        pickup: Option<String>,
        pool: Pool,
        requested: Decimal,
        available: Decimal,
    },

    #[error(
        "Over-purchase on order {order_id} item {item_id}: ordered {ordered}, already purchased {previously_purchased}, requested {requested}"
    )]
    OverPurchase {
        order_id: Uuid,
        item_id: Uuid,
        pickup: Option<String>,
        ordered: Decimal,
        previously_purchased: Decimal,
        requested: Decimal,
    },

    #[error(
        "Over-sale on booking {booking_id} item {item_id}: booked {booked}, already sold {previously_sold}, requested {requested}"
    )]
    OverSale {
        booking_id: Uuid,
        item_id: Uuid,
        pickup: Option<String>,
        booked: Decimal,
        previously_sold: Decimal,
        requested: Decimal,
    },

    #[error("Document is finalized: {0}")]
    AlreadyFinalized(String),

    #[error("Credit note {0} is already settled")]
    AlreadySettled(Uuid),

    #[error("Ledger contention: {0}")]
    Contention(String),

    // External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::ValidationError(_) => "INVALID_INPUT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientQuantity { .. } => "INSUFFICIENT_QUANTITY",
            AppError::OverPurchase { .. } => "OVER_PURCHASE",
            AppError::OverSale { .. } => "OVER_SALE",
            AppError::AlreadyFinalized(_) => "ALREADY_FINALIZED",
            AppError::AlreadySettled(_) => "ALREADY_SETTLED",
            AppError::Contention(_) => "LEDGER_CONTENTION",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Insufficient {
                key,
                pool,
                requested,
                available,
            } => AppError::InsufficientQuantity {
                warehouse_id: key.warehouse_id,
                item_id: key.item_id,
                pickup: key.pickup,
                pool,
                requested,
                available,
            },
        }
    }
}

impl From<LockError> for AppError {
    fn from(err: LockError) -> Self {
        AppError::Contention(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field, details) = match &self {
            AppError::Validation { field, .. } => {
                (StatusCode::BAD_REQUEST, Some(field.clone()), None)
            }
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, None, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None, None),
            AppError::InsufficientQuantity {
                warehouse_id,
                item_id,
                pickup,
                pool,
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                None,
                Some(json!({
                    "warehouse_id": warehouse_id,
                    "item_id": item_id,
                    "pickup": pickup,
                    "pool": pool,
                    "requested": requested,
                    "available": available,
                })),
            ),
            AppError::OverPurchase {
                order_id,
                item_id,
                pickup,
                ordered,
                previously_purchased,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                None,
                Some(json!({
                    "order_id": order_id,
                    "item_id": item_id,
                    "pickup": pickup,
                    "ordered": ordered,
                    "previously_purchased": previously_purchased,
                    "requested": requested,
                })),
            ),
            AppError::OverSale {
                booking_id,
                item_id,
                pickup,
                booked,
                previously_sold,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                None,
                Some(json!({
                    "booking_id": booking_id,
                    "item_id": item_id,
                    "pickup": pickup,
                    "booked": booked,
                    "previously_sold": previously_sold,
                    "requested": requested,
                })),
            ),
            AppError::AlreadyFinalized(_) | AppError::AlreadySettled(_) => {
                (StatusCode::CONFLICT, None, None)
            }
            AppError::Contention(_) => (StatusCode::SERVICE_UNAVAILABLE, None, None),
            AppError::ExternalService(_) => (StatusCode::BAD_GATEWAY, None, None),
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
        };

        // Internal failures keep their cause out of the response body
        let message = match &self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalError(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
