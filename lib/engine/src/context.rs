use crate::arguments::ArgumentBuilderRegistry;
use crate::cache::{DocumentCache, MemoryCache};
use crate::catalog::ServiceCatalog;
use crate::composition::{self, CompositionResponse};
use crate::config::GatewayConfig;
use crate::invoker::ApiInvoker;
use crate::pipeline::{self, ServiceRequest};
use crate::translator::{ContextExpander, JsonLdExpander};
use apigraph_common::{GatewayError, GatewayResult};
use apigraph_store::{GraphStore, HttpGraphStore, StoreResponse};
use std::sync::Arc;
use uuid::Uuid;

/// The long-lived components of a gateway, shared by all the requests.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    store: Arc<dyn GraphStore>,
    cache: Option<Arc<dyn DocumentCache>>,
    invoker: ApiInvoker,
    expander: Arc<dyn JsonLdExpander>,
    builders: Arc<ArgumentBuilderRegistry>,
    catalog: Arc<ServiceCatalog>,
}

impl Gateway {
    /// Creates a gateway talking to the graph store of the configuration over HTTP.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let store = HttpGraphStore::new(
            &config.sparql_endpoint,
            config.update_endpoint(),
            config.store_timeout(),
        )
        .map_err(|e| GatewayError::Internal(format!("Unable to create the store client: {e}")))?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: GatewayConfig, store: Arc<dyn GraphStore>) -> GatewayResult<Self> {
        config
            .validate()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let invoker = ApiInvoker::new(&config)
            .map_err(|e| GatewayError::Internal(format!("Unable to create the HTTP client: {e}")))?;
        let cache = config
            .use_cache
            .then(|| Arc::new(MemoryCache::new()) as Arc<dyn DocumentCache>);
        let catalog = ServiceCatalog::new(
            Arc::clone(&store),
            config.root_url(),
            config.services_paths.clone(),
        );
        Ok(Self {
            builders: Arc::new(ArgumentBuilderRegistry::from_config(&config)),
            config: Arc::new(config),
            store,
            cache,
            invoker,
            expander: Arc::new(ContextExpander),
            catalog: Arc::new(catalog),
        })
    }

    /// Replaces the document cache, e.g., to share it between gateways.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<Arc<dyn DocumentCache>>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_expander(mut self, expander: Arc<dyn JsonLdExpander>) -> Self {
        self.expander = expander;
        self
    }

    #[must_use]
    pub fn with_builders(mut self, builders: ArgumentBuilderRegistry) -> Self {
        self.builders = Arc::new(builders);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// The context of a new request.
    pub fn context(&self) -> RequestContext {
        RequestContext {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            invoker: self.invoker.clone(),
            expander: Arc::clone(&self.expander),
            builders: Arc::clone(&self.builders),
            catalog: Arc::clone(&self.catalog),
            request_id: Uuid::new_v4(),
        }
    }

    /// Answers a request to one service.
    pub async fn execute(&self, request: &ServiceRequest) -> GatewayResult<StoreResponse> {
        pipeline::execute(&self.context(), request).await
    }

    /// Answers a query by composing the services of the catalog.
    pub async fn compose(&self, query: &str, accept: &str) -> GatewayResult<CompositionResponse> {
        composition::compose(&self.context(), query, accept).await
    }
}

/// Everything a request needs, passed explicitly to every component.
///
/// A context is immutable: cloning it is cheap and every clone sees the same components.
#[derive(Clone)]
pub struct RequestContext {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<dyn GraphStore>,
    /// `None` when caching is disabled.
    pub cache: Option<Arc<dyn DocumentCache>>,
    pub invoker: ApiInvoker,
    pub expander: Arc<dyn JsonLdExpander>,
    pub builders: Arc<ArgumentBuilderRegistry>,
    pub catalog: Arc<ServiceCatalog>,
    /// Identifies the request in the logs.
    pub request_id: Uuid,
}
