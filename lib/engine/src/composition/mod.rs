//! Answers a query with no service named, by selecting the services of the catalog able to
//! answer its triple patterns and combining their response graphs.

mod matchmaking;
mod normalize;
mod rewrite;

pub use matchmaking::{discover, matchmake, MatchmakingResult, PatternGroup, ServiceProfile};
pub use normalize::{normalize, triple_patterns, NormalizedQuery};
pub use rewrite::{prune, FederatedQuery, ServiceClause};

use crate::context::RequestContext;
use crate::metrology::{report_composition, Stopwatch};
use crate::pipeline::{populate, QueryMode};
use apigraph_common::{GatewayError, GatewayResult};
use apigraph_store::{GraphScope, StoreResponse};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happens to the triple patterns no service can answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompositionPolicy {
    /// The request fails before any service is invoked.
    Strict,
    /// The patterns are removed from the client's query.
    #[default]
    Lenient,
}

#[derive(Debug, Clone)]
pub struct CompositionResponse {
    pub response: StoreResponse,
    /// The triple patterns pruned from the query, in lenient mode.
    pub unmatched: Vec<String>,
}

pub async fn compose(
    ctx: &RequestContext,
    query: &str,
    accept: &str,
) -> GatewayResult<CompositionResponse> {
    let stopwatch = Stopwatch::start();
    let normalized = normalize(query)?;
    info!(
        "Request {}: composing services for {} triple patterns",
        ctx.request_id,
        normalized.patterns.len()
    );

    let profiles = discover(load_profiles(ctx).await?, &normalized.patterns);
    debug!(
        "Candidate services: {:?}",
        profiles
            .iter()
            .map(|profile| profile.descriptor.name.as_str())
            .collect::<Vec<_>>()
    );
    let matchmaking = matchmake(&profiles, &normalized.patterns);
    let unmatched = matchmaking
        .unmatched
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if !unmatched.is_empty() {
        match ctx.config.composition.policy() {
            CompositionPolicy::Strict => {
                return Err(GatewayError::CompositionUnmatched {
                    patterns: unmatched,
                })
            }
            CompositionPolicy::Lenient => {
                warn!("No service matches the triple patterns {unmatched:?}, they are ignored")
            }
        }
    }

    let root_url = ctx.config.root_url();
    let federated = FederatedQuery {
        clauses: matchmaking
            .groups
            .iter()
            .map(|group| ServiceClause {
                service: group.profile.descriptor.name.clone(),
                service_uri: group.profile.descriptor.service_uri(root_url),
                arguments: group.profile.arguments(&normalized.patterns),
                patterns: group.patterns.clone(),
            })
            .collect(),
    };
    let client_query = if matchmaking.unmatched.is_empty() {
        query.to_owned()
    } else {
        prune(&normalized.query, &matchmaking.unmatched).to_string()
    };

    let scope = GraphScope::new(Arc::clone(&ctx.store), root_url);
    let result = async {
        let populated = try_join_all(matchmaking.groups.iter().zip(&federated.clauses).map(
            |(group, clause)| {
                populate(
                    ctx,
                    &scope,
                    &group.profile.descriptor,
                    &clause.arguments,
                    QueryMode::Sparql,
                )
            },
        ))
        .await?;
        let federated_graph = scope.new_graph();
        debug!(
            "Federated query:\n{}",
            federated.to_service_query(&federated_graph)
        );
        let graphs = populated
            .into_iter()
            .map(|populated| populated.graph)
            .collect::<Vec<_>>();
        if let Some(update) = federated.to_graph_update(&graphs, &federated_graph)? {
            ctx.store.update(&update).await?;
        }
        debug!("Evaluating the client query against {federated_graph}");
        Ok::<_, GatewayError>(scope.query(&federated_graph, &client_query, accept).await?)
    }
    .await;
    scope.release().await;

    let response = result?;
    report_composition(federated.clauses.len(), unmatched.len(), stopwatch.elapsed());
    Ok(CompositionResponse {
        response,
        unmatched,
    })
}

/// The profiles of every service of the catalog, in name order. Services that cannot be loaded
/// are skipped.
async fn load_profiles(ctx: &RequestContext) -> GatewayResult<Vec<ServiceProfile>> {
    let mut profiles = Vec::new();
    for name in ctx.catalog.list().await? {
        let loaded = match ctx.catalog.load(&name).await {
            Ok(descriptor) => ServiceProfile::load(ctx, descriptor).await,
            Err(e) => Err(e),
        };
        match loaded {
            Ok(profile) => profiles.push(profile),
            Err(e) => warn!("Service '{name}' is left out of the composition: {e}"),
        }
    }
    Ok(profiles)
}
