//! The ApiGraph engine: turns Web API responses into RDF graphs and answers SPARQL queries over
//! them, either for one named SPARQL micro-service or by composing several services.
//!
//! Requests go through a [`Gateway`], which owns the long-lived components and hands out one
//! [`RequestContext`] per request.

pub mod arguments;
pub mod cache;
pub mod catalog;
pub mod composition;
pub mod config;
mod context;
pub mod invoker;
pub mod metrology;
pub mod pipeline;
pub mod provenance;
pub mod translator;

pub use catalog::ServiceCatalog;
pub use composition::{CompositionPolicy, CompositionResponse};
pub use config::{ConfigError, GatewayConfig};
pub use context::{Gateway, RequestContext};
pub use pipeline::{QueryMode, ServiceRequest};
