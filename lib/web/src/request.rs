use crate::error::ApiGraphServerError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, Method};
use url::form_urlencoded;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SPARQL_QUERY_CONTENT_TYPE: &str = "application/sparql-query";

/// The parts of a `GET` or `POST` request that the gateway endpoints read.
#[derive(Debug, Clone)]
pub struct SparqlRequest {
    /// The query-string parameters, followed by the form parameters of a `POST`.
    pub parameters: Vec<(String, String)>,
    /// Taken from the `query` parameter, the `query` form field or an
    /// `application/sparql-query` body, in that order.
    pub query: Option<String>,
    pub accept: String,
}

impl SparqlRequest {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        parameter(&self.parameters, name)
    }
}

impl FromRequest<AppState> for SparqlRequest {
    type Rejection = ApiGraphServerError;

    async fn from_request(request: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let method = request.method().clone();
        if method != Method::GET && method != Method::POST {
            return Err(ApiGraphServerError::MethodNotAllowed(method.to_string()));
        }

        let mut parameters = request
            .uri()
            .query()
            .map(|query| parse_pairs(query.as_bytes()))
            .unwrap_or_default();
        let accept = accept(request.headers())
            .unwrap_or_else(|| state.gateway.config().default_mime_type.clone());
        let content_type = media_type(request.headers());
        let mut query = parameter(&parameters, "query").map(ToOwned::to_owned);

        if method == Method::POST {
            let body = Bytes::from_request(request, state)
                .await
                .map_err(|e| ApiGraphServerError::BadRequest(e.body_text()))?;
            match content_type.as_deref() {
                Some(FORM_CONTENT_TYPE) => {
                    let form = parse_pairs(&body);
                    if query.is_none() {
                        query = parameter(&form, "query").map(ToOwned::to_owned);
                    }
                    parameters.extend(form);
                }
                Some(SPARQL_QUERY_CONTENT_TYPE) if query.is_none() => {
                    query = Some(String::from_utf8(body.to_vec()).map_err(|_| {
                        ApiGraphServerError::BadRequest(
                            "The query is not valid UTF-8".to_owned(),
                        )
                    })?);
                }
                other if query.is_none() => {
                    return Err(ApiGraphServerError::BadRequest(format!(
                        "Unsupported content type {}, expected {FORM_CONTENT_TYPE} or {SPARQL_QUERY_CONTENT_TYPE}",
                        other.unwrap_or("(none)")
                    )));
                }
                _ => {}
            }
        }

        Ok(Self {
            parameters,
            query,
            accept,
        })
    }
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input).into_owned().collect()
}

fn parameter<'a>(parameters: &'a [(String, String)], name: &str) -> Option<&'a str> {
    parameters
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// The `Accept` header, unless it is missing or accepts anything.
fn accept(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != "*/*")
        .map(ToOwned::to_owned)
}

/// The media type of the body, without its parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let media_type = value.split(';').next()?.trim().to_ascii_lowercase();
    Some(media_type)
}
