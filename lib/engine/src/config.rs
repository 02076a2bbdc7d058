use crate::composition::CompositionPolicy;
use oxiri::Iri;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

pub const DEFAULT_MIME_TYPE: &str = "application/sparql-results+json";

/// An error raised while reading the gateway configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Unable to read the configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Holds the configuration of a gateway.
///
/// ```toml
/// root_url = "http://example.org/sparql-ms"
/// services_paths = ["services"]
/// sparql_endpoint = "http://localhost:3030/ds/query"
/// sparql_update_endpoint = "http://localhost:3030/ds/update"
/// use_cache = true
///
/// [composition]
/// error_on_unmatched_patterns = false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base of the temporary graph names and of the service URIs.
    pub root_url: String,
    /// Directories holding one sub-directory per service.
    #[serde(default)]
    pub services_paths: Vec<PathBuf>,
    /// SPARQL query endpoint of the graph store.
    pub sparql_endpoint: String,
    /// SPARQL update endpoint of the graph store. Defaults to the query endpoint.
    #[serde(default)]
    pub sparql_update_endpoint: Option<String>,
    /// Result serialization used when the client sends no `Accept` header.
    #[serde(default = "default_mime_type")]
    pub default_mime_type: String,
    #[serde(default)]
    pub use_cache: bool,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
    /// Bound on the Web API calls in flight, across all requests.
    #[serde(default = "default_max_concurrent_api_calls")]
    pub max_concurrent_api_calls: usize,
    /// Bound on the invocations a single service request may unwind to.
    #[serde(default = "default_max_combinations")]
    pub max_combinations: usize,
    #[serde(default)]
    pub composition: CompositionConfig,
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// Client-credentials argument builders, by builder name.
    #[serde(default)]
    pub client_credentials: BTreeMap<String, ClientCredentialsConfig>,
    /// Lookup argument builders, by builder name.
    #[serde(default)]
    pub lookups: BTreeMap<String, LookupConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositionConfig {
    /// Rejects a composed query when one of its triple patterns matches no service.
    #[serde(default)]
    pub error_on_unmatched_patterns: bool,
}

impl CompositionConfig {
    pub fn policy(&self) -> CompositionPolicy {
        if self.error_on_unmatched_patterns {
            CompositionPolicy::Strict
        } else {
            CompositionPolicy::Lenient
        }
    }
}

/// An HTTP proxy for the Web API calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Credentials of an OAuth2 client-credentials grant.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientCredentialsConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"obfuscated")
            .field("scope", &self.scope)
            .finish()
    }
}

/// A preliminary Web API call whose answer fills one placeholder of the service template.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupConfig {
    /// Template of the lookup query, using the service arguments as placeholders.
    pub query: String,
    /// JSON pointer to the value, or array of values, in the lookup response.
    pub pointer: String,
    /// The placeholder of the service template receiving the value.
    pub target: String,
    /// How many values of an array are kept, comma-separated.
    #[serde(default = "default_max_lookup_values")]
    pub max_values: usize,
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_owned()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_store_timeout() -> u64 {
    60
}

fn default_max_concurrent_api_calls() -> usize {
    8
}

fn default_max_combinations() -> usize {
    64
}

fn default_max_lookup_values() -> usize {
    20
}

impl GatewayConfig {
    /// Creates a configuration with default values for everything but the required fields.
    pub fn new(root_url: impl Into<String>, sparql_endpoint: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            services_paths: Vec::new(),
            sparql_endpoint: sparql_endpoint.into(),
            sparql_update_endpoint: None,
            default_mime_type: default_mime_type(),
            use_cache: false,
            api_timeout_secs: default_api_timeout(),
            store_timeout_secs: default_store_timeout(),
            max_concurrent_api_calls: default_max_concurrent_api_calls(),
            max_combinations: default_max_combinations(),
            composition: CompositionConfig::default(),
            log_level: None,
            proxy: None,
            client_credentials: BTreeMap::new(),
            lookups: BTreeMap::new(),
        }
    }

    /// Reads and validates a TOML configuration file.
    ///
    /// Relative `services_paths` are resolved against the directory of the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(dir) = path.parent() {
            for services_path in &mut config.services_paths {
                if services_path.is_relative() {
                    *services_path = dir.join(&*services_path);
                }
            }
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Iri::parse(self.root_url.as_str())
            .map_err(|e| ConfigError::Invalid(format!("root_url '{}': {e}", self.root_url)))?;
        if self.sparql_endpoint.is_empty() {
            return Err(ConfigError::Invalid(
                "sparql_endpoint must not be empty".to_owned(),
            ));
        }
        if self.max_concurrent_api_calls == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_api_calls must be positive".to_owned(),
            ));
        }
        if self.max_combinations == 0 {
            return Err(ConfigError::Invalid(
                "max_combinations must be positive".to_owned(),
            ));
        }
        if let Some(name) = self
            .client_credentials
            .keys()
            .find(|name| self.lookups.contains_key(*name))
        {
            return Err(ConfigError::Invalid(format!(
                "argument builder '{name}' is declared twice"
            )));
        }
        Ok(())
    }

    /// The root URL, without trailing slash.
    pub fn root_url(&self) -> &str {
        self.root_url.trim_end_matches('/')
    }

    pub fn update_endpoint(&self) -> &str {
        self.sparql_update_endpoint
            .as_deref()
            .unwrap_or(&self.sparql_endpoint)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}
