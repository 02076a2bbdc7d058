use crate::arguments::parse_query;
use apigraph_common::GatewayResult;
use spargebra::algebra::{Expression, GraphPattern, PropertyPathExpression};
use spargebra::term::{TermPattern, TriplePattern, Variable};
use spargebra::Query;
use std::collections::HashMap;
use uuid::Uuid;

/// A client query whose blank nodes have been replaced by variables.
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    pub query: Query,
    /// Every triple pattern of the WHERE clause, once, in textual order.
    pub patterns: Vec<TriplePattern>,
}

/// Parses a query and replaces each blank node of its WHERE clause with a variable named
/// `bn_<label>_<token>`. The same blank node always gets the same variable, and the token is
/// drawn once per query so the names cannot clash with the client's variables.
pub fn normalize(query: &str) -> GatewayResult<NormalizedQuery> {
    let query = parse_query(query)?;
    let token = Uuid::new_v4().simple().to_string()[..8].to_owned();
    let mut rewriter = BlankNodeRewriter {
        token,
        variables: HashMap::new(),
    };
    let query = match query {
        Query::Select {
            dataset,
            pattern,
            base_iri,
        } => Query::Select {
            dataset,
            pattern: rewriter.rewrite_graph_pattern(&pattern),
            base_iri,
        },
        Query::Construct {
            template,
            dataset,
            pattern,
            base_iri,
        } => Query::Construct {
            template,
            dataset,
            pattern: rewriter.rewrite_graph_pattern(&pattern),
            base_iri,
        },
        Query::Describe {
            dataset,
            pattern,
            base_iri,
        } => Query::Describe {
            dataset,
            pattern: rewriter.rewrite_graph_pattern(&pattern),
            base_iri,
        },
        Query::Ask {
            dataset,
            pattern,
            base_iri,
        } => Query::Ask {
            dataset,
            pattern: rewriter.rewrite_graph_pattern(&pattern),
            base_iri,
        },
    };
    let patterns = triple_patterns(crate::arguments::graph_pattern::query_pattern(&query));
    Ok(NormalizedQuery { query, patterns })
}

/// Every triple pattern of a graph pattern, optional parts included, without duplicates.
///
/// `SERVICE` blocks and the patterns nested in expressions are not part of the result.
pub fn triple_patterns(pattern: &GraphPattern) -> Vec<TriplePattern> {
    let mut result = Vec::new();
    collect(pattern, &mut result);
    result
}

fn collect(pattern: &GraphPattern, result: &mut Vec<TriplePattern>) {
    let mut push = |triple: TriplePattern, result: &mut Vec<TriplePattern>| {
        if !result.contains(&triple) {
            result.push(triple);
        }
    };
    match pattern {
        GraphPattern::Bgp { patterns } => {
            for triple in patterns {
                push(triple.clone(), result);
            }
        }
        GraphPattern::Path {
            subject,
            path: PropertyPathExpression::NamedNode(predicate),
            object,
        } => push(
            TriplePattern {
                subject: subject.clone(),
                predicate: predicate.clone().into(),
                object: object.clone(),
            },
            result,
        ),
        GraphPattern::Join { left, right }
        | GraphPattern::LeftJoin { left, right, .. }
        | GraphPattern::Lateral { left, right }
        | GraphPattern::Union { left, right }
        | GraphPattern::Minus { left, right } => {
            collect(left, result);
            collect(right, result);
        }
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Graph { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::Group { inner, .. } => collect(inner, result),
        GraphPattern::Path { .. } | GraphPattern::Values { .. } | GraphPattern::Service { .. } => {}
    }
}

/// Rebuilds a graph pattern, rewriting its terms and dropping some of its triple patterns.
///
/// The default methods copy the pattern unchanged.
pub(crate) trait TriplePatternRewriter {
    fn rewrite_term(&mut self, term: &TermPattern) -> TermPattern {
        term.clone()
    }

    /// Whether a triple pattern is kept. Removed patterns match the empty solution.
    fn keep(&self, _triple: &TriplePattern) -> bool {
        true
    }

    fn rewrite_triple(&mut self, triple: &TriplePattern) -> TriplePattern {
        TriplePattern {
            subject: self.rewrite_term(&triple.subject),
            predicate: triple.predicate.clone(),
            object: self.rewrite_term(&triple.object),
        }
    }

    fn rewrite_graph_pattern(&mut self, pattern: &GraphPattern) -> GraphPattern {
        match pattern {
            GraphPattern::Bgp { patterns } => GraphPattern::Bgp {
                patterns: {
                    let kept = patterns
                        .iter()
                        .filter(|triple| self.keep(triple))
                        .collect::<Vec<_>>();
                    kept.into_iter()
                        .map(|triple| self.rewrite_triple(triple))
                        .collect()
                },
            },
            GraphPattern::Path {
                subject,
                path,
                object,
            } => {
                if let PropertyPathExpression::NamedNode(predicate) = path {
                    let triple = TriplePattern {
                        subject: subject.clone(),
                        predicate: predicate.clone().into(),
                        object: object.clone(),
                    };
                    if !self.keep(&triple) {
                        return GraphPattern::Bgp {
                            patterns: Vec::new(),
                        };
                    }
                }
                GraphPattern::Path {
                    subject: self.rewrite_term(subject),
                    path: path.clone(),
                    object: self.rewrite_term(object),
                }
            }
            GraphPattern::Join { left, right } => GraphPattern::Join {
                left: self.rewrite_boxed(left),
                right: self.rewrite_boxed(right),
            },
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => GraphPattern::LeftJoin {
                left: self.rewrite_boxed(left),
                right: self.rewrite_boxed(right),
                expression: expression.as_ref().map(|e| self.rewrite_expression(e)),
            },
            GraphPattern::Lateral { left, right } => GraphPattern::Lateral {
                left: self.rewrite_boxed(left),
                right: self.rewrite_boxed(right),
            },
            GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
                expr: self.rewrite_expression(expr),
                inner: self.rewrite_boxed(inner),
            },
            GraphPattern::Union { left, right } => GraphPattern::Union {
                left: self.rewrite_boxed(left),
                right: self.rewrite_boxed(right),
            },
            GraphPattern::Graph { name, inner } => GraphPattern::Graph {
                name: name.clone(),
                inner: self.rewrite_boxed(inner),
            },
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => GraphPattern::Extend {
                inner: self.rewrite_boxed(inner),
                variable: variable.clone(),
                expression: self.rewrite_expression(expression),
            },
            GraphPattern::Minus { left, right } => GraphPattern::Minus {
                left: self.rewrite_boxed(left),
                right: self.rewrite_boxed(right),
            },
            GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
                inner: self.rewrite_boxed(inner),
                expression: expression.clone(),
            },
            GraphPattern::Project { inner, variables } => GraphPattern::Project {
                inner: self.rewrite_boxed(inner),
                variables: variables.clone(),
            },
            GraphPattern::Distinct { inner } => GraphPattern::Distinct {
                inner: self.rewrite_boxed(inner),
            },
            GraphPattern::Reduced { inner } => GraphPattern::Reduced {
                inner: self.rewrite_boxed(inner),
            },
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => GraphPattern::Slice {
                inner: self.rewrite_boxed(inner),
                start: *start,
                length: *length,
            },
            GraphPattern::Group {
                inner,
                variables,
                aggregates,
            } => GraphPattern::Group {
                inner: self.rewrite_boxed(inner),
                variables: variables.clone(),
                aggregates: aggregates.clone(),
            },
            GraphPattern::Values { .. } | GraphPattern::Service { .. } => pattern.clone(),
        }
    }

    fn rewrite_boxed(&mut self, pattern: &GraphPattern) -> Box<GraphPattern> {
        Box::new(self.rewrite_graph_pattern(pattern))
    }

    /// Rewrites the patterns of `EXISTS` filters, possibly combined with `!`, `&&` and `||`.
    fn rewrite_expression(&mut self, expression: &Expression) -> Expression {
        match expression {
            Expression::Exists(pattern) => Expression::Exists(self.rewrite_boxed(pattern)),
            Expression::Not(inner) => Expression::Not(Box::new(self.rewrite_expression(inner))),
            Expression::And(left, right) => Expression::And(
                Box::new(self.rewrite_expression(left)),
                Box::new(self.rewrite_expression(right)),
            ),
            Expression::Or(left, right) => Expression::Or(
                Box::new(self.rewrite_expression(left)),
                Box::new(self.rewrite_expression(right)),
            ),
            other => other.clone(),
        }
    }
}

struct BlankNodeRewriter {
    token: String,
    variables: HashMap<String, Variable>,
}

impl TriplePatternRewriter for BlankNodeRewriter {
    fn rewrite_term(&mut self, term: &TermPattern) -> TermPattern {
        match term {
            TermPattern::BlankNode(node) => {
                let token = &self.token;
                self.variables
                    .entry(node.as_str().to_owned())
                    .or_insert_with(|| {
                        let label = node
                            .as_str()
                            .chars()
                            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                            .collect::<String>();
                        Variable::new_unchecked(format!("bn_{label}_{token}"))
                    })
                    .clone()
                    .into()
            }
            TermPattern::Triple(triple) => TermPattern::Triple(Box::new(self.rewrite_triple(triple))),
            other => other.clone(),
        }
    }
}
