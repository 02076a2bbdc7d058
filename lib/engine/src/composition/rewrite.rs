use super::normalize::TriplePatternRewriter;
use crate::arguments::graph_pattern::query_pattern;
use apigraph_common::{GatewayError, GatewayResult, ResolvedArguments};
use oxrdf::NamedNode;
use spargebra::algebra::{GraphPattern, QueryDataset};
use spargebra::term::{GraphNamePattern, QuadPattern, TriplePattern};
use spargebra::{GraphUpdateOperation, Query, Update};
use url::form_urlencoded;

/// The part of a federated query delegated to one service.
#[derive(Debug, Clone)]
pub struct ServiceClause {
    pub service: String,
    pub service_uri: String,
    pub arguments: ResolvedArguments,
    pub patterns: Vec<TriplePattern>,
}

impl ServiceClause {
    /// The URL invoking the service with its arguments, in graph-query mode.
    pub fn endpoint(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("querymode", "sparql");
        for (name, values) in self.arguments.iter() {
            query.append_pair(name, &values.join(","));
        }
        format!("{}?{}", self.service_uri, query.finish())
    }
}

/// Builds the federated graph of a composition out of the triples of each service.
#[derive(Debug, Clone, Default)]
pub struct FederatedQuery {
    pub clauses: Vec<ServiceClause>,
}

impl FederatedQuery {
    /// Renders the composition as a federated update, each service being queried with a
    /// `SERVICE SILENT` clause.
    pub fn to_service_query(&self, federated_graph: &str) -> String {
        let template = self
            .clauses
            .iter()
            .flat_map(|clause| &clause.patterns)
            .map(|pattern| format!("    {pattern} .\n"))
            .collect::<String>();
        let branches = self
            .clauses
            .iter()
            .map(|clause| {
                let block = clause
                    .patterns
                    .iter()
                    .map(|pattern| format!("{pattern} . "))
                    .collect::<String>();
                format!(
                    "  {{ SERVICE SILENT <{}> {{ {block}}} }}",
                    clause.endpoint()
                )
            })
            .collect::<Vec<_>>();
        format!(
            "INSERT {{\n  GRAPH <{federated_graph}> {{\n{template}  }}\n}}\nWHERE {{\n{}\n}}",
            branches.join("\n  UNION\n")
        )
    }

    /// The update copying into the federated graph the triples matching each pattern, read from
    /// the response graph of its service. `graphs` lists these graphs in clause order.
    ///
    /// Returns `None` when no pattern has been assigned to any service.
    pub fn to_graph_update(
        &self,
        graphs: &[String],
        federated_graph: &str,
    ) -> GatewayResult<Option<String>> {
        let federated_graph = graph_name(federated_graph)?;
        let mut operations = Vec::new();
        for (clause, graph) in self.clauses.iter().zip(graphs) {
            let graph = graph_name(graph)?;
            for pattern in &clause.patterns {
                operations.push(GraphUpdateOperation::DeleteInsert {
                    delete: Vec::new(),
                    insert: vec![QuadPattern {
                        subject: pattern.subject.clone(),
                        predicate: pattern.predicate.clone(),
                        object: pattern.object.clone(),
                        graph_name: GraphNamePattern::NamedNode(federated_graph.clone()),
                    }],
                    using: Some(QueryDataset {
                        default: vec![graph.clone()],
                        named: None,
                    }),
                    pattern: Box::new(GraphPattern::Bgp {
                        patterns: vec![pattern.clone()],
                    }),
                });
            }
        }
        if operations.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            Update {
                base_iri: None,
                operations,
            }
            .to_string(),
        ))
    }
}

fn graph_name(iri: &str) -> GatewayResult<NamedNode> {
    NamedNode::new(iri).map_err(|e| GatewayError::Internal(format!("Invalid graph name: {e}")))
}

/// Removes the `removed` triple patterns from the WHERE clause of a query.
pub fn prune(query: &Query, removed: &[TriplePattern]) -> Query {
    let mut rewriter = PruneRewriter { removed };
    let pattern = rewriter.rewrite_graph_pattern(query_pattern(query));
    let mut query = query.clone();
    match &mut query {
        Query::Select { pattern: p, .. }
        | Query::Construct { pattern: p, .. }
        | Query::Describe { pattern: p, .. }
        | Query::Ask { pattern: p, .. } => *p = pattern,
    }
    query
}

struct PruneRewriter<'a> {
    removed: &'a [TriplePattern],
}

impl TriplePatternRewriter for PruneRewriter<'_> {
    fn keep(&self, triple: &TriplePattern) -> bool {
        !self.removed.contains(triple)
    }
}
