use crate::cache::CacheEntry;
use crate::config::{ClientCredentialsConfig, GatewayConfig, LookupConfig};
use crate::context::RequestContext;
use crate::invoker::ApiQuery;
use crate::provenance::redact;
use crate::translator::sanitize;
use apigraph_common::{ArgumentCombination, GatewayError, ServiceDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::iter::once;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the builder used by services that do not name one.
pub const TEMPLATE_BUILDER: &str = "template";

/// Produces the Web API query of one invocation from an argument combination.
///
/// Builders replace the per-service scripts of classic SPARQL micro-service deployments: they
/// may call other APIs, add HTTP headers or decide that an invocation must be skipped.
#[async_trait]
pub trait ArgumentBuilder: Send + Sync {
    /// Returns `None` when the invocation must be skipped.
    async fn build(
        &self,
        ctx: &RequestContext,
        descriptor: &ServiceDescriptor,
        combination: &ArgumentCombination,
    ) -> Result<Option<ApiQuery>, GatewayError>;
}

/// The argument builders known to the gateway, by name.
#[derive(Clone)]
pub struct ArgumentBuilderRegistry {
    builders: HashMap<String, Arc<dyn ArgumentBuilder>>,
}

impl ArgumentBuilderRegistry {
    /// Registers the template builder and the builders declared in the configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut registry = Self {
            builders: HashMap::new(),
        };
        registry.register(TEMPLATE_BUILDER, Arc::new(TemplateBuilder));
        for (name, credentials) in &config.client_credentials {
            registry.register(
                name,
                Arc::new(ClientCredentialsBuilder::new(name, credentials.clone())),
            );
        }
        for (name, lookup) in &config.lookups {
            registry.register(name, Arc::new(LookupBuilder::new(name, lookup.clone())));
        }
        registry
    }

    pub fn register(&mut self, name: &str, builder: Arc<dyn ArgumentBuilder>) {
        self.builders.insert(name.to_owned(), builder);
    }

    /// The builder of a service.
    pub fn for_descriptor(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<Arc<dyn ArgumentBuilder>, GatewayError> {
        let name = descriptor
            .argument_builder
            .as_deref()
            .unwrap_or(TEMPLATE_BUILDER);
        self.builders.get(name).cloned().ok_or_else(|| {
            GatewayError::Internal(format!(
                "Service '{}' refers to the unknown argument builder '{name}'",
                descriptor.name
            ))
        })
    }
}

/// Substitutes the `{name}` placeholders of the service template, values being URL-encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateBuilder;

#[async_trait]
impl ArgumentBuilder for TemplateBuilder {
    async fn build(
        &self,
        _ctx: &RequestContext,
        descriptor: &ServiceDescriptor,
        combination: &ArgumentCombination,
    ) -> Result<Option<ApiQuery>, GatewayError> {
        Ok(Some(template_query(descriptor, combination)))
    }
}

/// Obtains an OAuth2 access token with the client-credentials grant and passes it as a bearer
/// token. The token is kept in the cache until it expires.
pub struct ClientCredentialsBuilder {
    name: String,
    credentials: ClientCredentialsConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl ClientCredentialsBuilder {
    pub fn new(name: &str, credentials: ClientCredentialsConfig) -> Self {
        Self {
            name: name.to_owned(),
            credentials,
        }
    }

    fn cache_key(&self) -> String {
        format!("client_credentials:{}:{}", self.name, self.credentials.client_id)
    }

    async fn access_token(
        &self,
        ctx: &RequestContext,
        descriptor: &ServiceDescriptor,
    ) -> Result<String, GatewayError> {
        let key = self.cache_key();
        if let Some(cache) = &ctx.cache {
            if let Some(entry) = cache.read(&key).await {
                debug!("Valid access token retrieved from cache");
                return Ok(entry.payload);
            }
        }

        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = &self.credentials.scope {
            form.push(("scope", scope.as_str()));
        }
        let body = ctx
            .invoker
            .post_form(
                &self.credentials.token_url,
                (
                    self.credentials.client_id.as_str(),
                    self.credentials.client_secret.as_str(),
                ),
                &form,
            )
            .await
            .map_err(|e| {
                warn!("Authorization request of builder '{}' failed: {e}", self.name);
                GatewayError::UpstreamAuthentication(
                    "Cannot get authorization, no response.".to_owned(),
                )
            })?;
        let token: TokenResponse = serde_json::from_str(&body).map_err(|_| {
            GatewayError::UpstreamAuthentication(
                "Authorization response does not contain either expires_in or access_token."
                    .to_owned(),
            )
        })?;

        if let Some(cache) = &ctx.cache {
            cache
                .write(CacheEntry::new(
                    &key,
                    Some(&descriptor.name),
                    token.access_token.clone(),
                    Some(Duration::from_secs(token.expires_in)),
                ))
                .await;
        }
        Ok(token.access_token)
    }
}

#[async_trait]
impl ArgumentBuilder for ClientCredentialsBuilder {
    async fn build(
        &self,
        ctx: &RequestContext,
        descriptor: &ServiceDescriptor,
        combination: &ArgumentCombination,
    ) -> Result<Option<ApiQuery>, GatewayError> {
        let token = self.access_token(ctx, descriptor).await?;
        Ok(Some(
            template_query(descriptor, combination)
                .with_header("Authorization", format!("Bearer {token}")),
        ))
    }
}

/// Calls a lookup API first and fills one placeholder of the service template with the value
/// found in its response. The invocation is skipped when no value is found.
pub struct LookupBuilder {
    name: String,
    lookup: LookupConfig,
}

impl LookupBuilder {
    pub fn new(name: &str, lookup: LookupConfig) -> Self {
        Self {
            name: name.to_owned(),
            lookup,
        }
    }

    async fn lookup(
        &self,
        ctx: &RequestContext,
        combination: &ArgumentCombination,
    ) -> Option<String> {
        let query = ApiQuery::new(substitute(&self.lookup.query, combination));
        info!("Lookup Web API request: {}", redact(&query.url));
        let body = match ctx.invoker.fetch(&query).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Lookup of builder '{}' failed: {e}", self.name);
                return None;
            }
        };
        let document = serde_json::from_str::<serde_json::Value>(&sanitize(&body)).ok()?;
        let values = match document.pointer(&self.lookup.pointer)? {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(scalar)
                .take(self.lookup.max_values)
                .collect::<Vec<_>>(),
            value => scalar(value).into_iter().collect(),
        };
        if values.is_empty() {
            None
        } else {
            Some(values.join(","))
        }
    }
}

#[async_trait]
impl ArgumentBuilder for LookupBuilder {
    async fn build(
        &self,
        ctx: &RequestContext,
        descriptor: &ServiceDescriptor,
        combination: &ArgumentCombination,
    ) -> Result<Option<ApiQuery>, GatewayError> {
        let Some(value) = self.lookup(ctx, combination).await else {
            info!(
                "No value found by lookup '{}' for {combination}, skipping the invocation",
                self.name
            );
            return Ok(None);
        };
        debug!("Lookup '{}' retrieved: {value}", self.name);
        let combination = combination
            .iter()
            .chain(once((self.lookup.target.as_str(), value.as_str())))
            .collect::<ArgumentCombination>();
        Ok(Some(template_query(descriptor, &combination)))
    }
}

fn scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn template_query(descriptor: &ServiceDescriptor, combination: &ArgumentCombination) -> ApiQuery {
    ApiQuery {
        url: substitute(&descriptor.api_query, combination),
        headers: descriptor.http_headers.clone(),
    }
}

/// Replaces each `{name}` placeholder having a value in `combination` with the URL-encoded
/// value. Other placeholders are left untouched.
pub fn substitute(template: &str, combination: &ArgumentCombination) -> String {
    combination
        .iter()
        .fold(template.to_owned(), |query, (name, value)| {
            query.replace(&format!("{{{name}}}"), &encode(value))
        })
}

/// Form-URL-encodes a value, dots included.
fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('.', "%2E")
}
