use crate::client::{GraphStore, StoreResponse};
use crate::error::StoreError;
use async_trait::async_trait;
use oxigraph::io::RdfFormat;
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode};
use oxigraph::sparql::results::QueryResultsFormat;
use oxigraph::sparql::{Query, QueryResults};
use oxigraph::store::Store;

/// A [`GraphStore`] backed by an in-memory Oxigraph store.
///
/// It lets the pipeline run without a remote store, e.g., in tests.
#[derive(Clone)]
pub struct MemoryGraphStore {
    store: Store,
}

impl MemoryGraphStore {
    pub fn new() -> Result<Self, StoreError> {
        let store = Store::new().map_err(|e| StoreError::Evaluation(e.to_string()))?;
        Ok(Self { store })
    }

    /// The names of the named graphs currently holding at least one triple.
    pub fn named_graphs(&self) -> Result<Vec<String>, StoreError> {
        self.store
            .named_graphs()
            .map(|graph| match graph {
                Ok(NamedOrBlankNode::NamedNode(node)) => Ok(node.into_string()),
                Ok(NamedOrBlankNode::BlankNode(node)) => Ok(node.to_string()),
                Err(e) => Err(StoreError::Evaluation(e.to_string())),
            })
            .collect()
    }

    /// The number of triples in a named graph.
    pub fn graph_len(&self, graph: &str) -> Result<usize, StoreError> {
        let graph = parse_graph_name(graph)?;
        Ok(self
            .store
            .quads_for_pattern(None, None, None, Some(graph.as_ref()))
            .count())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn query(
        &self,
        query: &str,
        accept: &str,
        default_graph: Option<&str>,
    ) -> Result<StoreResponse, StoreError> {
        let mut query =
            Query::parse(query, None).map_err(|e| StoreError::Evaluation(e.to_string()))?;
        if let Some(graph) = default_graph {
            query
                .dataset_mut()
                .set_default_graph(vec![parse_graph_name(graph)?]);
        }
        let results = self
            .store
            .query(query)
            .map_err(|e| StoreError::Evaluation(e.to_string()))?;

        let media_type = accept
            .split(',')
            .next()
            .and_then(|m| m.split(';').next())
            .unwrap_or_default()
            .trim();
        let (content_type, body) = if let QueryResults::Graph(_) = results {
            let format = RdfFormat::from_media_type(media_type).unwrap_or(RdfFormat::NTriples);
            let body = results
                .write_graph(Vec::new(), format)
                .map_err(|e| StoreError::Evaluation(e.to_string()))?;
            (format.media_type(), body)
        } else {
            let format = QueryResultsFormat::from_media_type(media_type)
                .unwrap_or(QueryResultsFormat::Json);
            let body = results
                .write(Vec::new(), format)
                .map_err(|e| StoreError::Evaluation(e.to_string()))?;
            (format.media_type(), body)
        };
        Ok(StoreResponse {
            content_type: content_type.to_owned(),
            body: body.into(),
        })
    }

    async fn update(&self, update: &str) -> Result<(), StoreError> {
        self.store
            .update(update)
            .map_err(|e| StoreError::Evaluation(e.to_string()))
    }
}

fn parse_graph_name(graph: &str) -> Result<GraphName, StoreError> {
    NamedNode::new(graph)
        .map(GraphName::from)
        .map_err(|e| StoreError::Evaluation(format!("Invalid graph name {graph}: {e}")))
}
