//! Resolution of the service arguments and construction of the Web API queries.

mod builder;
pub(crate) mod graph_pattern;
mod query_string;

pub use builder::{
    substitute, ArgumentBuilder, ArgumentBuilderRegistry, ClientCredentialsBuilder, LookupBuilder,
    TemplateBuilder, TEMPLATE_BUILDER,
};

use crate::context::RequestContext;
use crate::pipeline::{QueryMode, ServiceRequest};
use apigraph_common::{GatewayError, GatewayResult, ResolvedArguments, ServiceDescriptor};
use spargebra::Query;

/// Resolves the arguments of a service invocation.
///
/// Services described by a static file, and any request in Linked Data mode, take their
/// arguments from the HTTP parameters. Other services read them from the graph pattern of the
/// query.
pub async fn resolve(
    ctx: &RequestContext,
    descriptor: &ServiceDescriptor,
    request: &ServiceRequest,
) -> GatewayResult<ResolvedArguments> {
    if request.mode == QueryMode::Ld || !descriptor.reads_arguments_from_graph_pattern() {
        return query_string::resolve(descriptor, &request.parameters);
    }
    let query = request
        .query
        .as_deref()
        .ok_or_else(|| GatewayError::BadRequest("No SPARQL query provided".to_owned()))?;
    let query = parse_query(query)?;
    graph_pattern::resolve(ctx, descriptor, &query).await
}

pub(crate) fn parse_query(query: &str) -> GatewayResult<Query> {
    Query::parse(query, None)
        .map_err(|e| GatewayError::BadRequest(format!("Invalid SPARQL query: {e}")))
}
