//! Decoding of the SELECT results returned by the store.

use crate::client::{GraphStore, StoreResponse};
use crate::error::StoreError;
use oxrdf::Term;
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};

pub use sparesults::QuerySolution;

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Parses the solutions of a SELECT response. An ASK response has no solution.
pub fn parse_solutions(response: &StoreResponse) -> Result<Vec<QuerySolution>, StoreError> {
    let media_type = response
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    let format = QueryResultsFormat::from_media_type(media_type).unwrap_or(QueryResultsFormat::Json);
    match QueryResultsParser::from_format(format).for_reader(response.body.as_ref())? {
        ReaderQueryResultsParserOutput::Solutions(solutions) => {
            Ok(solutions.collect::<Result<Vec<_>, _>>()?)
        }
        ReaderQueryResultsParserOutput::Boolean(_) => Ok(Vec::new()),
    }
}

/// Runs a SELECT query and returns its solutions.
pub async fn select(
    store: &dyn GraphStore,
    query: &str,
    default_graph: Option<&str>,
) -> Result<Vec<QuerySolution>, StoreError> {
    let response = store.query(query, SPARQL_RESULTS_JSON, default_graph).await?;
    parse_solutions(&response)
}

/// The lexical form of a term: the IRI, the blank node id, or the literal value.
pub fn lexical_value(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_owned(),
        Term::BlankNode(node) => node.as_str().to_owned(),
        Term::Literal(literal) => literal.value().to_owned(),
        Term::Triple(triple) => triple.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_solutions() {
        let response = StoreResponse {
            content_type: "application/sparql-results+json; charset=utf-8".to_owned(),
            body: r#"{"head":{"vars":["name"]},"results":{"bindings":[
                {"name":{"type":"literal","value":"Delphinus delphis"}},
                {"name":{"type":"uri","value":"http://example.org/x"}}]}}"#
                .into(),
        };

        let solutions = parse_solutions(&response).unwrap();

        let names = solutions
            .iter()
            .filter_map(|s| s.get("name"))
            .map(lexical_value)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Delphinus delphis", "http://example.org/x"]);
    }

    #[test]
    fn ask_results_have_no_solution() {
        let response = StoreResponse {
            content_type: SPARQL_RESULTS_JSON.to_owned(),
            body: r#"{"head":{},"boolean":true}"#.into(),
        };
        assert!(parse_solutions(&response).unwrap().is_empty());
    }
}
