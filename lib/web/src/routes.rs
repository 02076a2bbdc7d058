use crate::config::SERVER_NAME;
use crate::error::ApiGraphServerError;
use crate::request::SparqlRequest;
use crate::AppState;
use apigraph_engine::{QueryMode, ServiceRequest};
use apigraph_store::StoreResponse;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, SERVER};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub const UNMATCHED_PATTERNS_HEADER: HeaderName = HeaderName::from_static("x-unmatched-patterns");

/// `/service?service=<name>&querymode=sparql|ld`
pub async fn handle_service(
    State(state): State<AppState>,
    request: SparqlRequest,
) -> Result<GatewayResponse, ApiGraphServerError> {
    let service = request
        .parameter("service")
        .filter(|service| !service.is_empty())
        .ok_or_else(|| {
            ApiGraphServerError::BadRequest("Missing parameter 'service'".to_owned())
        })?;
    let mode = request
        .parameter("querymode")
        .filter(|mode| !mode.is_empty())
        .ok_or_else(|| {
            ApiGraphServerError::BadRequest("Missing parameter 'querymode'".to_owned())
        })?
        .parse::<QueryMode>()?;

    let response = state
        .gateway
        .execute(&ServiceRequest {
            service: service.to_owned(),
            mode,
            query: request.query.clone(),
            accept: request.accept.clone(),
            parameters: request.parameters.clone(),
        })
        .await?;
    Ok(GatewayResponse {
        response,
        unmatched_patterns: None,
    })
}

/// `/compose`: the query is answered by the services matching its triple patterns.
pub async fn handle_compose(
    State(state): State<AppState>,
    request: SparqlRequest,
) -> Result<GatewayResponse, ApiGraphServerError> {
    let query = request
        .query
        .as_deref()
        .filter(|query| !query.trim().is_empty())
        .ok_or_else(|| ApiGraphServerError::BadRequest("No SPARQL query provided".to_owned()))?;

    let composed = state.gateway.compose(query, &request.accept).await?;
    Ok(GatewayResponse {
        response: composed.response,
        unmatched_patterns: Some(composed.unmatched.len()),
    })
}

/// The store's answer, forwarded as is.
pub struct GatewayResponse {
    response: StoreResponse,
    unmatched_patterns: Option<usize>,
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.response.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        let mut response = (
            StatusCode::OK,
            [
                (CONTENT_TYPE, content_type),
                (SERVER, HeaderValue::from_static(SERVER_NAME)),
            ],
            self.response.body,
        )
            .into_response();
        if let Some(count) = self.unmatched_patterns {
            response
                .headers_mut()
                .insert(UNMATCHED_PATTERNS_HEADER, HeaderValue::from(count));
        }
        response
    }
}
