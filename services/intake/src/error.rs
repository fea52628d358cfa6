use crate::function_invoker::InvocationError;
use crate::image_store::ImageStoreError;
use crate::record_store::RecordStoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the intake handlers
///
/// Upstream failures keep their source for logging; the response only carries
/// the generic message from [`IntakeError::public_message`].
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("request body exceeds the upload limit")]
    PayloadTooLarge,

    #[error("failed to read items")]
    ListItems(#[source] RecordStoreError),

    #[error("failed to assign item id")]
    AssignId(#[source] RecordStoreError),

    #[error("failed to upload image")]
    UploadImage(#[source] ImageStoreError),

    #[error("failed to save item")]
    SaveItem(#[source] RecordStoreError),

    #[error("failed to update item")]
    UpdateItem(#[source] RecordStoreError),

    #[error("failed to delete item")]
    DeleteItem(#[source] RecordStoreError),

    #[error("processing function failed")]
    Processing(#[source] InvocationError),
}

impl IntakeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
            IntakeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            IntakeError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller
    pub fn public_message(&self) -> String {
        match self {
            IntakeError::Validation(message) => message.clone(),
            IntakeError::MethodNotAllowed => "Method not allowed.".to_string(),
            IntakeError::PayloadTooLarge => "Image too large.".to_string(),
            IntakeError::ListItems(_) => "Failed to fetch items.".to_string(),
            IntakeError::AssignId(_) | IntakeError::SaveItem(_) => {
                "Failed to save item.".to_string()
            }
            IntakeError::UploadImage(_) => "Failed to upload image to S3.".to_string(),
            IntakeError::UpdateItem(_) => "Failed to update item.".to_string(),
            IntakeError::DeleteItem(_) => "Failed to delete item.".to_string(),
            IntakeError::Processing(_) => "Failed to process item.".to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                source = ?std::error::Error::source(&self),
                "Request failed"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
