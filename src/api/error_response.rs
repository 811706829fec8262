//! HTTP error response handling for the API
//!
//! Domain errors become a status code plus a JSON [`ApiError`] body whose message
//! comes from the configured [`MessageCatalog`].

use crate::error::{ApiError, Error, ToHttpStatus};
use crate::messages::MessageCatalog;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Status code for a domain error
pub(crate) fn status_for(error: &Error) -> StatusCode {
    StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Response for `error` with client-facing text from `catalog`
pub(crate) fn localized_response(error: &Error, catalog: &MessageCatalog) -> Response {
    (status_for(error), Json(ApiError::localized(error, catalog))).into_response()
}

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = status_for(&self);
        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status_code, Json(self)).into_response()
    }
}
