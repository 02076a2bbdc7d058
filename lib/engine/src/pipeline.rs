//! Execution of one SPARQL micro-service request.

use crate::arguments::{self, ArgumentBuilder};
use crate::context::RequestContext;
use crate::metrology::{report_service, ServiceMeasures, Stopwatch};
use crate::provenance::{activity_triples, redact};
use crate::translator::fetch_and_translate;
use apigraph_common::{
    unwind, ArgumentCombination, GatewayError, GatewayResult, ResolvedArguments,
    ServiceDescriptor,
};
use apigraph_store::{GraphScope, StoreResponse};
use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};
use oxrdf::NamedNode;
use spargebra::algebra::QueryDataset;
use spargebra::term::{GraphNamePattern, QuadPattern};
use spargebra::{GraphUpdateOperation, Query};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Evaluated against the response graph in Linked Data mode.
pub const DEREFERENCE_QUERY: &str = "CONSTRUCT WHERE { ?s ?p ?o }";

/// How the client queries the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// The client sends a SPARQL query, evaluated against the response graph.
    #[default]
    Sparql,
    /// The service is dereferenced as a Linked Data resource: the whole graph is returned.
    Ld,
}

impl FromStr for QueryMode {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sparql" => Ok(Self::Sparql),
            "ld" => Ok(Self::Ld),
            other => Err(GatewayError::BadRequest(format!(
                "Invalid query mode '{other}', expected 'sparql' or 'ld'"
            ))),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sparql => "sparql",
            Self::Ld => "ld",
        })
    }
}

/// A request to one SPARQL micro-service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub service: String,
    pub mode: QueryMode,
    /// The client's SPARQL query. Only used in [`QueryMode::Sparql`].
    pub query: Option<String>,
    /// The result serialization expected by the client.
    pub accept: String,
    /// The HTTP parameters, in query-string order.
    pub parameters: Vec<(String, String)>,
}

/// The graph holding the triples produced by a service for one request.
#[derive(Debug, Clone)]
pub struct PopulatedGraph {
    pub graph: String,
    pub measures: ServiceMeasures,
}

/// Answers a request: resolves the arguments, invokes the Web API for each argument
/// combination, builds the response graph, evaluates the client's query against it and drops
/// the temporary graphs.
pub async fn execute(ctx: &RequestContext, request: &ServiceRequest) -> GatewayResult<StoreResponse> {
    let stopwatch = Stopwatch::start();
    let descriptor = ctx.catalog.load(&request.service).await?;
    let client_query = match request.mode {
        QueryMode::Sparql => request
            .query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
            .ok_or_else(|| GatewayError::BadRequest("No SPARQL query provided".to_owned()))?,
        QueryMode::Ld => DEREFERENCE_QUERY,
    };
    info!(
        "Request {}: service '{}' in {} mode",
        ctx.request_id, descriptor.name, request.mode
    );
    let arguments = arguments::resolve(ctx, &descriptor, request).await?;

    let scope = GraphScope::new(Arc::clone(&ctx.store), ctx.config.root_url());
    let result = async {
        let populated = populate(ctx, &scope, &descriptor, &arguments, request.mode).await?;
        debug!("Evaluating the client query against {}", populated.graph);
        let response = scope
            .query(&populated.graph, client_query, &request.accept)
            .await?;
        Ok::<_, GatewayError>((response, populated.measures))
    }
    .await;
    scope.release().await;

    let (response, measures) = result?;
    report_service(&descriptor.name, stopwatch.elapsed(), &measures);
    Ok(response)
}

/// Builds the response graph of a service in `scope`, without evaluating any query.
///
/// The Web API is not invoked when some argument has no value: the graph is left empty.
pub async fn populate(
    ctx: &RequestContext,
    scope: &GraphScope,
    descriptor: &ServiceDescriptor,
    arguments: &ResolvedArguments,
    mode: QueryMode,
) -> GatewayResult<PopulatedGraph> {
    let response = scope.new_graph();
    let mut measures = ServiceMeasures::default();
    if !arguments.is_complete_for(descriptor) {
        info!(
            "Service '{}': some arguments have no value, the Web API is not invoked",
            descriptor.name
        );
        return Ok(PopulatedGraph {
            graph: response,
            measures,
        });
    }

    let combinations = unwind(arguments, descriptor, ctx.config.max_combinations)?;
    debug!(
        "Service '{}': {} argument combinations",
        descriptor.name,
        combinations.len()
    );
    let builder = ctx.builders.for_descriptor(descriptor)?;
    let invocations = combinations
        .iter()
        .map(|combination| {
            invoke(
                ctx,
                scope,
                descriptor,
                builder.as_ref(),
                combination,
                &response,
                mode,
            )
        })
        .collect::<Vec<_>>();
    let invocations = stream::iter(invocations)
        .buffer_unordered(ctx.config.max_concurrent_api_calls)
        .try_collect::<Vec<_>>()
        .await?;
    for (triples, api_time) in invocations.into_iter().flatten() {
        measures.add(triples, api_time);
    }
    Ok(PopulatedGraph {
        graph: response,
        measures,
    })
}

/// Runs one Web API invocation and adds its triples to the response graph.
///
/// Returns the number of triples obtained and the time spent on the Web API, or `None` when the
/// builder skipped the invocation.
async fn invoke(
    ctx: &RequestContext,
    scope: &GraphScope,
    descriptor: &ServiceDescriptor,
    builder: &dyn ArgumentBuilder,
    combination: &ArgumentCombination,
    response: &str,
    mode: QueryMode,
) -> GatewayResult<Option<(usize, Duration)>> {
    let stopwatch = Stopwatch::start();
    let started_at = Utc::now();
    let Some(query) = builder.build(ctx, descriptor, combination).await? else {
        return Ok(None);
    };
    if query.url.is_empty() {
        return Ok(None);
    }
    info!("Web API request: {}", redact(&query.url));
    let translation = fetch_and_translate(ctx, descriptor, &query).await;
    let api_time = stopwatch.elapsed();

    let scratch = scope.new_graph();
    scope.load_triples(&scratch, &translation.triples).await?;
    if mode == QueryMode::Sparql {
        if let Some(rule) = &descriptor.insert_rule {
            let update = with_graph(&substitute_literals(rule, combination), &scratch);
            debug!("Running the INSERT rule of service '{}'", descriptor.name);
            ctx.store.update(&update).await?;
        }
    }
    match &descriptor.construct_rule {
        Some(rule) => {
            let update = construct_into(&substitute_literals(rule, combination), &scratch, response)?;
            debug!("Running the CONSTRUCT rule of service '{}'", descriptor.name);
            ctx.store.update(&update).await?;
        }
        None => scope.copy_graph(&scratch, response).await?,
    }

    if descriptor.add_provenance {
        let provenance = activity_triples(
            &descriptor.service_uri(ctx.config.root_url()),
            &query.url,
            started_at,
            translation.cache_hit,
        );
        scope.load_triples(response, &provenance).await?;
    }
    Ok(Some((translation.triples.len(), api_time)))
}

/// Replaces the `{name}` placeholders of a rule with the argument values, escaped to be used
/// within a SPARQL string literal.
pub fn substitute_literals(rule: &str, combination: &ArgumentCombination) -> String {
    combination.iter().fold(rule.to_owned(), |rule, (name, value)| {
        rule.replace(&format!("{{{name}}}"), &escape_literal(value))
    })
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Makes `graph` the target of an update by adding a `WITH` clause after its prologue.
fn with_graph(update: &str, graph: &str) -> String {
    let mut prologue = String::new();
    let mut lines = update.lines().peekable();
    while let Some(line) = lines.peek() {
        let trimmed = line.trim_start();
        let upper = trimmed.to_ascii_uppercase();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || upper.starts_with("PREFIX")
            || upper.starts_with("BASE")
        {
            prologue.push_str(line);
            prologue.push('\n');
            lines.next();
        } else {
            break;
        }
    }
    let body = lines.collect::<Vec<_>>().join("\n");
    format!("{prologue}WITH <{graph}>\n{body}")
}

/// Rewrites a CONSTRUCT rule into an update inserting its template into `target`, the pattern
/// being matched against `source`.
fn construct_into(rule: &str, source: &str, target: &str) -> GatewayResult<String> {
    let query = Query::parse(rule, None)
        .map_err(|e| GatewayError::Internal(format!("Invalid CONSTRUCT rule: {e}")))?;
    let Query::Construct {
        template, pattern, ..
    } = query
    else {
        return Err(GatewayError::Internal(
            "The CONSTRUCT rule is not a CONSTRUCT query".to_owned(),
        ));
    };
    let iri = |iri: &str| {
        NamedNode::new(iri).map_err(|e| GatewayError::Internal(format!("Invalid graph name: {e}")))
    };
    let target = iri(target)?;
    let insert = template
        .into_iter()
        .map(|triple| {
            QuadPattern {
                subject: triple.subject,
                predicate: triple.predicate,
                object: triple.object,
                graph_name: GraphNamePattern::NamedNode(target.clone()),
            }
        })
        .collect();
    let operation = GraphUpdateOperation::DeleteInsert {
        delete: Vec::new(),
        insert,
        using: Some(QueryDataset {
            default: vec![iri(source)?],
            named: None,
        }),
        pattern: Box::new(pattern),
    };
    Ok(operation.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spargebra::Update;

    #[test]
    fn query_modes() {
        assert_eq!("sparql".parse::<QueryMode>().unwrap(), QueryMode::Sparql);
        assert_eq!("ld".parse::<QueryMode>().unwrap(), QueryMode::Ld);
        assert!(matches!(
            "describe".parse::<QueryMode>(),
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[test]
    fn rule_values_are_escaped() {
        let combination = [("name", "Delphinus \"delphis\"")]
            .into_iter()
            .collect::<ArgumentCombination>();
        assert_eq!(
            substitute_literals("?t <http://schema.org/name> \"{name}\" .", &combination),
            "?t <http://schema.org/name> \"Delphinus \\\"delphis\\\"\" ."
        );
    }

    #[test]
    fn with_clause_follows_the_prologue() {
        let update = with_graph(
            "PREFIX s: <http://schema.org/>\n\nINSERT { ?x s:b ?y } WHERE { ?x s:a ?y }",
            "http://example.org/tempgraph-1",
        );
        assert_eq!(
            update,
            "PREFIX s: <http://schema.org/>\n\nWITH <http://example.org/tempgraph-1>\nINSERT { ?x s:b ?y } WHERE { ?x s:a ?y }"
        );
        Update::parse(&update, None).unwrap();
    }

    #[test]
    fn construct_rule_becomes_an_insert() {
        let update = construct_into(
            "PREFIX s: <http://schema.org/> CONSTRUCT { ?x s:name ?n } WHERE { ?x s:label ?n }",
            "http://example.org/tempgraph-1",
            "http://example.org/tempgraph-2",
        )
        .unwrap();
        assert!(update.contains("GRAPH <http://example.org/tempgraph-2>"));
        assert!(update.contains("USING <http://example.org/tempgraph-1>"));
        Update::parse(&update, None).unwrap();
    }
}
