use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Rejections produced by the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authenticated user attached to the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The request did not pass through [`authenticate`](super::authenticate).
    #[error("cas: no client associated with request")]
    NoClient,

    /// A CAS operation needed to answer the request failed.
    #[error(transparent)]
    Cas(#[from] crate::error::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::NoClient | Self::Cas(_) => {
                tracing::error!(error = %self, "CAS internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
