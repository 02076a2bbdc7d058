use crate::client::{GraphStore, StoreResponse};
use crate::error::StoreError;
use oxrdf::Triple;
use std::mem::take;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

/// The path segment preceding the unique token of every temporary graph name.
pub const TEMP_GRAPH_PREFIX: &str = "tempgraph-";

/// Owns the temporary graphs created for one request.
///
/// Every graph allocated with [`GraphScope::new_graph`] is dropped by [`GraphScope::release`].
/// A scope that goes out of scope without being released (early return, panic, cancelled
/// request) schedules the drops on the current Tokio runtime instead.
pub struct GraphScope {
    store: Arc<dyn GraphStore>,
    root_url: String,
    graphs: Mutex<Vec<String>>,
}

impl GraphScope {
    pub fn new(store: Arc<dyn GraphStore>, root_url: &str) -> Self {
        Self {
            store,
            root_url: root_url.trim_end_matches('/').to_owned(),
            graphs: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Allocates a new, empty, uniquely named graph owned by this scope.
    pub fn new_graph(&self) -> String {
        let graph = format!("{}/{TEMP_GRAPH_PREFIX}{}", self.root_url, Uuid::new_v4());
        self.lock().push(graph.clone());
        graph
    }

    /// The graphs currently owned by this scope, in allocation order.
    pub fn graphs(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Inserts triples into a graph with a single `INSERT DATA` operation.
    ///
    /// Blank nodes keep their identity as all the triples are sent together.
    pub async fn load_triples(&self, graph: &str, triples: &[Triple]) -> Result<(), StoreError> {
        if triples.is_empty() {
            return Ok(());
        }
        let body = triples
            .iter()
            .map(|triple| format!("{triple} .\n"))
            .collect::<String>();
        self.store
            .update(&format!("INSERT DATA {{ GRAPH <{graph}> {{\n{body}}} }}"))
            .await
    }

    /// Adds all the triples of `from` into `to`.
    pub async fn copy_graph(&self, from: &str, to: &str) -> Result<(), StoreError> {
        self.store
            .update(&format!("ADD SILENT <{from}> TO <{to}>"))
            .await
    }

    /// Evaluates a query with `graph` as the default graph.
    pub async fn query(
        &self,
        graph: &str,
        query: &str,
        accept: &str,
    ) -> Result<StoreResponse, StoreError> {
        self.store.query(query, accept, Some(graph)).await
    }

    /// Drops every graph of the scope. Failures are logged, never returned.
    pub async fn release(self) {
        let graphs = take(&mut *self.lock());
        drop_graphs(self.store.as_ref(), &graphs).await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.graphs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for GraphScope {
    fn drop(&mut self) {
        let graphs = take(self.graphs.get_mut().unwrap_or_else(PoisonError::into_inner));
        if graphs.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Scheduling the drop of {} unreleased graphs", graphs.len());
                handle.spawn(async move { drop_graphs(store.as_ref(), &graphs).await });
            }
            Err(_) => warn!(
                "No runtime available to drop the temporary graphs {}",
                graphs.join(", ")
            ),
        }
    }
}

async fn drop_graphs(store: &dyn GraphStore, graphs: &[String]) {
    for graph in graphs {
        if let Err(e) = store.update(&format!("DROP SILENT GRAPH <{graph}>")).await {
            warn!("Unable to drop temporary graph {graph}: {e}");
        }
    }
}
