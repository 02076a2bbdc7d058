use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Longest part of an error body kept in [`StoreError::Rejected`].
const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// The raw answer of the store to a query. It is streamed back to the client unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub content_type: String,
    pub body: Bytes,
}

/// The query/update protocol of the remote graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Evaluates a read query, optionally restricting the default graph to one named graph.
    async fn query(
        &self,
        query: &str,
        accept: &str,
        default_graph: Option<&str>,
    ) -> Result<StoreResponse, StoreError>;

    /// Executes an update (insert, clear, drop, ...).
    async fn update(&self, update: &str) -> Result<(), StoreError>;
}

/// A [`GraphStore`] speaking the SPARQL 1.1 protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGraphStore {
    client: reqwest::Client,
    query_endpoint: String,
    update_endpoint: String,
}

impl HttpGraphStore {
    /// Creates a client for the given endpoints. Every call fails after `timeout`.
    pub fn new(
        query_endpoint: impl Into<String>,
        update_endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            query_endpoint: query_endpoint.into(),
            update_endpoint: update_endpoint.into(),
        })
    }
}

#[async_trait]
impl GraphStore for HttpGraphStore {
    async fn query(
        &self,
        query: &str,
        accept: &str,
        default_graph: Option<&str>,
    ) -> Result<StoreResponse, StoreError> {
        debug!("Querying graph store: {query}");
        let mut form = vec![("query", query)];
        if let Some(graph) = default_graph {
            form.push(("default-graph-uri", graph));
        }
        let response = self
            .client
            .post(&self.query_endpoint)
            .header(ACCEPT, accept)
            .form(&form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_owned();
        Ok(StoreResponse {
            content_type,
            body: response.bytes().await?,
        })
    }

    async fn update(&self, update: &str) -> Result<(), StoreError> {
        debug!("Updating graph store: {update}");
        let response = self
            .client
            .post(&self.update_endpoint)
            .form(&[("update", update)])
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_MESSAGE_LEN {
        let mut end = MAX_ERROR_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}
