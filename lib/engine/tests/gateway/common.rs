use apigraph_engine::{Gateway, GatewayConfig, QueryMode, ServiceRequest};
use apigraph_store::results::{lexical_value, parse_solutions, SPARQL_RESULTS_JSON};
use apigraph_store::{GraphStore, MemoryGraphStore, StoreResponse, TEMP_GRAPH_PREFIX};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

pub type TestResult = Result<(), Box<dyn Error>>;

pub const ROOT_URL: &str = "http://example.org/sparql-ms";

pub const PROFILE: &str = r#"{
  "@context": {
    "@vocab": "http://schema.org/",
    "@base": "http://example.org/taxon/",
    "id": "@id"
  }
}"#;

#[derive(Default)]
struct Calls {
    count: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

/// A Web API answering `/taxa`, `/sounds` and `/broken` on an ephemeral port.
pub struct MockApi {
    pub url: String,
    calls: Arc<Calls>,
}

impl MockApi {
    pub async fn start() -> Result<Self, Box<dyn Error>> {
        let calls = Arc::new(Calls::default());
        let app = Router::new()
            .route("/taxa", get(taxa))
            .route("/sounds", get(sounds))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(Arc::clone(&calls));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move { axum::serve(listener, app).await });
        Ok(Self { url, calls })
    }

    pub fn calls(&self) -> usize {
        self.calls.count.load(Ordering::SeqCst)
    }

    pub fn called_names(&self) -> Vec<String> {
        let mut names = self.calls.urls.lock().unwrap().clone();
        names.sort();
        names
    }
}

fn record(calls: &Calls, name: &str) {
    calls.count.fetch_add(1, Ordering::SeqCst);
    calls.urls.lock().unwrap().push(name.to_owned());
}

async fn taxa(
    State(calls): State<Arc<Calls>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let name = params.get("name").cloned().unwrap_or_default();
    record(&calls, &name);
    let id = name.replace(' ', "_");
    Json(json!({
        "id": id,
        "name": name,
        "image": format!("http://img.example.org/{id}.jpg")
    }))
}

async fn sounds(
    State(calls): State<Arc<Calls>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let name = params.get("name").cloned().unwrap_or_default();
    record(&calls, &name);
    let id = name.replace(' ', "_");
    Json(json!({
        "id": id,
        "name": name,
        "audio": format!("http://audio.example.org/{id}.mp3")
    }))
}

/// A fresh directory holding service directories, removed when dropped.
pub struct ServicesDir {
    pub path: PathBuf,
}

impl ServicesDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("apigraph-services-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    /// Writes a service directory with a `service.toml` and the default profile.
    pub fn add_file_service(&self, name: &str, service_toml: &str) -> PathBuf {
        let dir = self.add_profile(name);
        fs::write(dir.join("service.toml"), service_toml).unwrap();
        dir
    }

    /// Writes a service directory holding only a profile, for services described in the store.
    pub fn add_profile(&self, name: &str) -> PathBuf {
        let dir = self.path.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("profile.jsonld"), PROFILE).unwrap();
        dir
    }
}

impl Drop for ServicesDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// The `service.toml` of a service calling `{api}/{endpoint}?name={name}`.
pub fn service_toml(api: &str, endpoint: &str, produces: &str, extra: &str) -> String {
    format!(
        r#"api_query = "{api}/{endpoint}?name={{name}}"
{extra}

[[arguments]]
name = "name"
predicate = "http://schema.org/name"

[capability]
predicates = ["http://schema.org/{produces}"]
classes = ["http://schema.org/Taxon"]
"#
    )
}

pub fn config(services: &ServicesDir) -> GatewayConfig {
    let mut config = GatewayConfig::new(ROOT_URL, "http://localhost:7878/query");
    config.services_paths = vec![services.path.clone()];
    config
}

pub fn gateway(
    config: GatewayConfig,
    store: &Arc<MemoryGraphStore>,
) -> Result<Gateway, Box<dyn Error>> {
    Ok(Gateway::with_store(
        config,
        Arc::clone(store) as Arc<dyn GraphStore>,
    )?)
}

pub fn sparql_request(service: &str, query: &str, parameters: &[(&str, &str)]) -> ServiceRequest {
    ServiceRequest {
        service: service.to_owned(),
        mode: QueryMode::Sparql,
        query: Some(query.to_owned()),
        accept: SPARQL_RESULTS_JSON.to_owned(),
        parameters: parameters
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect(),
    }
}

/// The sorted values of `variable` in a SPARQL JSON results document.
pub fn values(response: &StoreResponse, variable: &str) -> Vec<String> {
    let mut values = parse_solutions(response)
        .unwrap()
        .iter()
        .filter_map(|solution| solution.get(variable))
        .map(lexical_value)
        .collect::<Vec<_>>();
    values.sort();
    values
}

/// Stores the description and shapes graphs of a service reading its `name` argument from
/// the graph pattern.
pub async fn describe_service(
    store: &MemoryGraphStore,
    name: &str,
    api_query: &str,
    produces: &str,
) -> TestResult {
    let service = format!("{ROOT_URL}/{name}/");
    let update = format!(
        r#"PREFIX sd: <http://www.w3.org/ns/sparql-service-description#>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX schema: <http://schema.org/>
PREFIX hydra: <http://www.w3.org/ns/hydra/core#>
PREFIX shacl: <http://www.w3.org/ns/shacl#>
PREFIX sms: <http://ns.inria.fr/sparql-micro-service#>
INSERT DATA {{
  GRAPH <{service}ServiceDescription> {{
    <{service}> a sd:Service ;
      sms:addProvenance true ;
      dct:source [
        schema:potentialAction [
          schema:target [
            hydra:template "{api_query}" ;
            hydra:mapping [ hydra:variable "name" ; hydra:property schema:name ]
          ]
        ]
      ] .
  }}
  GRAPH <{service}ShapesGraph> {{
    <{service}TaxonShape> shacl:targetClass schema:Taxon ;
      shacl:property [ shacl:path schema:{produces} ] .
  }}
}}"#
    );
    store.update(&update).await?;
    Ok(())
}

pub fn assert_no_temporary_graph(store: &MemoryGraphStore) {
    let graphs = store.named_graphs().unwrap();
    assert!(
        graphs.iter().all(|graph| !graph.contains(TEMP_GRAPH_PREFIX)),
        "temporary graphs left: {graphs:?}"
    );
}
