use crate::config::GatewayConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::redirect::Policy;
use reqwest::{Proxy, RequestBuilder};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

pub const USER_AGENT: &str = concat!("ApiGraph/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;

/// One outbound Web API call: the URL and the headers specific to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiQuery {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl ApiQuery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// An error raised by a Web API call. Callers degrade it to an empty result.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InvokeError {
    #[error("Web API call failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Web API answered with status {0}")]
    Status(u16),
    #[error("Invalid HTTP header '{0}'")]
    InvalidHeader(String),
    #[error("The Web API call limiter is closed")]
    Closed,
}

/// Performs the outbound Web API calls.
///
/// The number of calls in flight is bounded across all the requests sharing the invoker.
#[derive(Debug, Clone)]
pub struct ApiInvoker {
    client: reqwest::Client,
    limiter: Arc<Semaphore>,
}

impl ApiInvoker {
    pub fn new(config: &GatewayConfig) -> Result<Self, InvokeError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.api_timeout())
            .redirect(Policy::limited(MAX_REDIRECTS));
        if let Some(proxy) = &config.proxy {
            let mut settings = Proxy::all(&proxy.url)?;
            if let (Some(user), Some(password)) = (&proxy.user, &proxy.password) {
                settings = settings.basic_auth(user, password);
            }
            builder = builder.proxy(settings);
        }
        Ok(Self {
            client: builder.build()?,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_api_calls)),
        })
    }

    /// Executes a GET call and returns the response body.
    ///
    /// An empty body, e.g. a `204 No Content`, is returned as the empty JSON object.
    pub async fn fetch(&self, query: &ApiQuery) -> Result<String, InvokeError> {
        let request = self
            .client
            .get(&query.url)
            .header(ACCEPT, "application/json");
        self.send(request, &query.headers).await
    }

    /// Executes a form-encoded POST call authenticated with HTTP Basic and returns the response
    /// body.
    pub async fn post_form(
        &self,
        url: &str,
        (user, password): (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<String, InvokeError> {
        let request = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .basic_auth(user, Some(password))
            .form(form);
        self.send(request, &[]).await
    }

    async fn send(
        &self,
        request: RequestBuilder,
        headers: &[(String, String)],
    ) -> Result<String, InvokeError> {
        let request = request.headers(header_map(headers)?);
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| InvokeError::Closed)?;
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        debug!("Web API answered with status {status}");
        if !status.is_success() {
            return Err(InvokeError::Status(status.as_u16()));
        }
        let body = response.text().await.map_err(transport)?;
        if body.trim().is_empty() {
            Ok("{}".to_owned())
        } else {
            Ok(body)
        }
    }
}

/// The request URL is left out of the error: it may carry an API key.
fn transport(error: reqwest::Error) -> InvokeError {
    InvokeError::Transport(error.without_url())
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, InvokeError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| InvokeError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| InvokeError::InvalidHeader(name.clone()))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_headers_are_validated() {
        let headers = vec![("Authorization".to_owned(), "Bearer abc".to_owned())];
        assert_eq!(header_map(&headers).unwrap().len(), 1);

        let headers = vec![("Bad Header".to_owned(), "x".to_owned())];
        assert!(matches!(
            header_map(&headers),
            Err(InvokeError::InvalidHeader(_))
        ));
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_the_url() {
        let config = GatewayConfig::new("http://example.org/sparql-ms", "http://localhost/query");
        let invoker = ApiInvoker::new(&config).unwrap();

        let error = invoker
            .fetch(&ApiQuery::new("http://127.0.0.1:1/api?apikey=S3CR3T"))
            .await
            .unwrap_err();

        assert!(matches!(error, InvokeError::Transport(_)));
        let logged = format!("Service 'taxa': {error}");
        assert!(!logged.contains("S3CR3T"), "{logged}");
        assert!(!logged.contains("apikey"), "{logged}");
    }
}
