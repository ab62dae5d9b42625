use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::lifecycle::TransitionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Transition(err) => (transition_status(err), err.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

fn transition_status(err: &TransitionError) -> StatusCode {
    match err {
        TransitionError::OrderNotFound(_) | TransitionError::PartnerNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        TransitionError::NotAssignedPartner => StatusCode::FORBIDDEN,
        TransitionError::OtpMismatch | TransitionError::InvalidRating => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TransitionError::AlreadyAssigned
        | TransitionError::PartnerBusy
        | TransitionError::InvalidStatus { .. }
        | TransitionError::OtpNotIssued
        | TransitionError::OtpNotVerified
        | TransitionError::AlreadyRated
        | TransitionError::PaymentNotPending => StatusCode::CONFLICT,
    }
}
