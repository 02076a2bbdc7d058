//! Turns one Web API invocation into RDF triples: cache lookup, call, sanitization, expansion.

mod expand;
mod sanitize;

pub use expand::{ContextExpander, ExpansionError, JsonLdExpander};
pub use sanitize::sanitize;

use crate::cache::CacheEntry;
use crate::context::RequestContext;
use crate::invoker::ApiQuery;
use apigraph_common::ServiceDescriptor;
use chrono::{DateTime, Utc};
use oxrdf::Triple;
use tracing::{debug, warn};

/// The stage at which a Web API invocation was given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// The call failed or timed out.
    Fetch,
    /// The response is not JSON.
    Json,
    /// The JSON-LD expansion failed.
    Expansion,
}

/// The triples produced for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Translation {
    pub triples: Vec<Triple>,
    /// When the document was fetched, if it was served from the cache.
    pub cache_hit: Option<DateTime<Utc>>,
    /// Set when the invocation failed and yields no triple.
    pub degradation: Option<Degradation>,
}

impl Translation {
    fn degraded(degradation: Degradation, cache_hit: Option<DateTime<Utc>>) -> Self {
        Self {
            triples: Vec::new(),
            cache_hit,
            degradation: Some(degradation),
        }
    }
}

/// Fetches the document of `query`, from the cache when possible, and expands it with the
/// profile of the service.
///
/// Failures never abort the request: they are logged and yield an empty [`Translation`].
pub async fn fetch_and_translate(
    ctx: &RequestContext,
    descriptor: &ServiceDescriptor,
    query: &ApiQuery,
) -> Translation {
    let cached = match &ctx.cache {
        Some(cache) => cache.read(&query.url).await,
        None => None,
    };
    let cache_hit = cached.as_ref().map(|entry| entry.fetch_date);
    let payload = match cached {
        Some(entry) => {
            debug!("Web API response found in cache for {}", entry.hash);
            entry.payload
        }
        None => match ctx.invoker.fetch(query).await {
            Ok(payload) => {
                if let Some(cache) = &ctx.cache {
                    cache
                        .write(CacheEntry::new(
                            &query.url,
                            Some(&descriptor.name),
                            payload.clone(),
                            descriptor.cache_expires_after,
                        ))
                        .await;
                }
                payload
            }
            Err(e) => {
                warn!("Service '{}': {e}", descriptor.name);
                return Translation::degraded(Degradation::Fetch, None);
            }
        },
    };

    let document = match serde_json::from_str(&sanitize(&payload)) {
        Ok(document) => document,
        Err(e) => {
            warn!(
                "Service '{}': the Web API response is not valid JSON: {e}",
                descriptor.name
            );
            return Translation::degraded(Degradation::Json, cache_hit);
        }
    };
    match ctx.expander.expand(&document, &descriptor.profile) {
        Ok(triples) => {
            debug!(
                "Service '{}': {} triples obtained from the Web API response",
                descriptor.name,
                triples.len()
            );
            Translation {
                triples,
                cache_hit,
                degradation: None,
            }
        }
        Err(e) => {
            warn!("Service '{}': JSON-LD expansion failed: {e}", descriptor.name);
            Translation::degraded(Degradation::Expansion, cache_hit)
        }
    }
}
