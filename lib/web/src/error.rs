use apigraph_common::GatewayError;
use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

#[derive(thiserror::Error, Debug)]
pub enum ApiGraphServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unsupported HTTP method {0}")]
    MethodNotAllowed(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiGraphServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Gateway(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

/// Error responses carry a short text and may be read from any origin.
impl IntoResponse for ApiGraphServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Gateway(e) => e.public_message(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        (status, [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], message).into_response()
    }
}
