use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::telemetry;

#[derive(thiserror::Error)]
pub enum RequestError {
    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed { allow: String },

    #[error("Forbidden")]
    Forbidden,

    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        telemetry::error_chain_fmt(self, f)
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, message).into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, message).into_response(),
            Self::MethodNotAllowed { allow } => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, allow)],
                message,
            )
                .into_response(),
            Self::UnexpectedError(e) => {
                // Log unexpected error, the client only gets a generic message
                tracing::error!("{:?}", e);

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
                    .into_response()
            }
        }
    }
}
