//! API handlers organized by resource type.

mod comments;
mod ops;
mod posts;
mod uploads;

pub use comments::*;
pub use ops::*;
pub use posts::*;
pub use uploads::*;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::application::error::HttpError;

use super::state::ApiState;

/// Unwrap a JSON body, answering malformed payloads with `{"message": ...}`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HttpError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        HttpError::new(
            "infra::http::api::json_body",
            StatusCode::UNPROCESSABLE_ENTITY,
            "The given data was invalid.",
            rejection.body_text(),
        )
    })
}

/// Operational endpoints only exist outside production.
pub(crate) fn ensure_operational(state: &ApiState) -> Result<(), HttpError> {
    if state.environment.allows_operational_endpoints() {
        return Ok(());
    }
    Err(HttpError::new(
        "infra::http::api::ensure_operational",
        StatusCode::FORBIDDEN,
        "Not allowed in production",
        format!("operational endpoint disabled in {:?}", state.environment),
    ))
}
