use crate::context::RequestContext;
use apigraph_common::{
    ArgumentBinding, GatewayError, GatewayResult, ResolvedArguments, ServiceDescriptor,
};
use apigraph_store::results::{lexical_value, select};
use oxrdf::NamedNode;
use spargebra::algebra::{GraphPattern, PropertyPathExpression};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;
use tracing::debug;

/// Reads the argument values from the triple patterns of the query.
///
/// An argument bound to a predicate takes the object of the triple patterns using that
/// predicate, and must have a single value. An argument bound to a property shape takes the
/// objects of the triple patterns using any of the paths of the shape, and may have several.
/// Arguments with no value are left unresolved.
pub async fn resolve(
    ctx: &RequestContext,
    descriptor: &ServiceDescriptor,
    query: &Query,
) -> GatewayResult<ResolvedArguments> {
    let triples = mandatory_triple_patterns(query_pattern(query));
    let mut arguments = ResolvedArguments::new();
    for argument in &descriptor.arguments {
        match &argument.binding {
            ArgumentBinding::Predicate(predicate) => {
                let mut values = object_values(&triples, predicate);
                values.sort();
                values.dedup();
                if values.len() > 1 {
                    return Err(GatewayError::BadRequest(format!(
                        "Argument '{}' of service '{}' has {} values in the query, only one is allowed",
                        argument.name,
                        descriptor.name,
                        values.len()
                    )));
                }
                for value in values {
                    arguments.push(&argument.name, value);
                }
            }
            ArgumentBinding::Shape(shape) => {
                for path in shape_paths(ctx, descriptor, shape).await? {
                    for value in object_values(&triples, &path) {
                        arguments.push(&argument.name, value);
                    }
                }
            }
        }
    }
    debug!("Arguments read from the graph pattern: {arguments:?}");
    Ok(arguments)
}

pub(crate) fn query_pattern(query: &Query) -> &GraphPattern {
    match query {
        Query::Select { pattern, .. }
        | Query::Construct { pattern, .. }
        | Query::Describe { pattern, .. }
        | Query::Ask { pattern, .. } => pattern,
    }
}

/// The triple patterns that every solution of `pattern` must match.
///
/// The optional side of `OPTIONAL` and `MINUS`, the branches of `UNION` as well as `VALUES` and
/// `SERVICE` blocks are ignored. A property path made of a single IRI counts as a triple pattern.
pub(crate) fn mandatory_triple_patterns(pattern: &GraphPattern) -> Vec<TriplePattern> {
    let mut triples = Vec::new();
    collect_mandatory(pattern, &mut triples);
    triples
}

fn collect_mandatory(pattern: &GraphPattern, triples: &mut Vec<TriplePattern>) {
    match pattern {
        GraphPattern::Bgp { patterns } => triples.extend(patterns.iter().cloned()),
        GraphPattern::Path {
            subject,
            path: PropertyPathExpression::NamedNode(predicate),
            object,
        } => triples.push(TriplePattern {
            subject: subject.clone(),
            predicate: predicate.clone().into(),
            object: object.clone(),
        }),
        GraphPattern::Join { left, right } | GraphPattern::Lateral { left, right } => {
            collect_mandatory(left, triples);
            collect_mandatory(right, triples);
        }
        GraphPattern::LeftJoin { left, .. } | GraphPattern::Minus { left, .. } => {
            collect_mandatory(left, triples);
        }
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Graph { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::Group { inner, .. } => collect_mandatory(inner, triples),
        GraphPattern::Path { .. }
        | GraphPattern::Union { .. }
        | GraphPattern::Values { .. }
        | GraphPattern::Service { .. } => {}
    }
}

/// The constant objects of the triple patterns using `predicate`, in query order.
pub(crate) fn object_values(triples: &[TriplePattern], predicate: &NamedNode) -> Vec<String> {
    triples
        .iter()
        .filter(|t| matches!(&t.predicate, NamedNodePattern::NamedNode(p) if p == predicate))
        .filter_map(|t| match &t.object {
            TermPattern::NamedNode(node) => Some(node.as_str().to_owned()),
            TermPattern::Literal(literal) => Some(literal.value().to_owned()),
            _ => None,
        })
        .collect()
}

/// The IRI paths of a property shape, read from the shapes graph of the service.
pub(crate) async fn shape_paths(
    ctx: &RequestContext,
    descriptor: &ServiceDescriptor,
    shape: &NamedNode,
) -> GatewayResult<Vec<NamedNode>> {
    let query = format!(
        "PREFIX sh: <http://www.w3.org/ns/shacl#>\n\
         SELECT DISTINCT ?path WHERE {{ GRAPH <{}> {{ {shape} sh:path ?path . FILTER(isIRI(?path)) }} }}",
        descriptor.shapes_graph_uri(ctx.config.root_url())
    );
    let solutions = select(ctx.store.as_ref(), &query, None).await?;
    Ok(solutions
        .iter()
        .filter_map(|solution| solution.get("path"))
        .filter_map(|path| NamedNode::new(lexical_value(path)).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(query: &str) -> Vec<String> {
        let query = Query::parse(query, None).unwrap();
        mandatory_triple_patterns(query_pattern(&query))
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn optional_and_union_are_ignored() {
        let found = patterns(
            "PREFIX s: <http://schema.org/>
             SELECT * WHERE {
                ?t s:name \"Delphinus\" .
                OPTIONAL { ?t s:image ?img }
                { ?t s:a ?a } UNION { ?t s:b ?b }
                FILTER(?t != <http://example.org/x>)
             }",
        );
        assert_eq!(found, vec!["?t <http://schema.org/name> \"Delphinus\""]);
    }

    #[test]
    fn complex_paths_are_ignored() {
        let found = patterns(
            "SELECT * WHERE { ?t <http://schema.org/name>|<http://schema.org/x> ?y . ?t <http://schema.org/name> ?n }",
        );
        assert_eq!(found, vec!["?t <http://schema.org/name> ?n"]);
    }

    #[test]
    fn object_values_keep_constants_only() {
        let query = Query::parse(
            "SELECT * WHERE { ?t <http://schema.org/name> \"a\", ?v, <http://example.org/b> }",
            None,
        )
        .unwrap();
        let triples = mandatory_triple_patterns(query_pattern(&query));
        let values = object_values(
            &triples,
            &NamedNode::new_unchecked("http://schema.org/name"),
        );
        assert_eq!(values, vec!["a", "http://example.org/b"]);
    }
}
