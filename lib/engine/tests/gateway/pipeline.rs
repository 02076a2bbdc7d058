use crate::common::*;
use apigraph_common::GatewayError;
use apigraph_engine::{QueryMode, ServiceRequest};
use apigraph_store::{GraphStore, MemoryGraphStore, StoreError, StoreResponse};
use async_trait::async_trait;
use std::sync::Arc;

const NAMES_QUERY: &str = "SELECT ?n WHERE { ?t <http://schema.org/name> ?n }";

#[tokio::test]
async fn every_value_combination_is_invoked() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service("taxa/search", &service_toml(&api.url, "taxa", "image", ""));
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let response = gateway
        .execute(&sparql_request(
            "taxa/search",
            NAMES_QUERY,
            &[("name", "Delphinus delphis, Orcinus orca")],
        ))
        .await?;

    assert_eq!(values(&response, "n"), vec!["Delphinus delphis", "Orcinus orca"]);
    assert_eq!(api.called_names(), vec!["Delphinus delphis", "Orcinus orca"]);
    assert_no_temporary_graph(&store);
    Ok(())
}

#[tokio::test]
async fn cached_documents_are_not_fetched_again() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service(
        "taxa/search",
        &service_toml(&api.url, "taxa", "image", "add_provenance = true"),
    );
    let store = Arc::new(MemoryGraphStore::new()?);
    let mut config = config(&services);
    config.use_cache = true;
    let gateway = gateway(config, &store)?;
    let request = sparql_request(
        "taxa/search",
        "SELECT ?hit WHERE { ?a <http://ns.inria.fr/sparql-micro-service#cacheHitTime> ?hit }",
        &[("name", "Delphinus delphis")],
    );

    let first = gateway.execute(&request).await?;
    let second = gateway.execute(&request).await?;

    assert_eq!(api.calls(), 1);
    assert!(values(&first, "hit").is_empty());
    assert_eq!(values(&second, "hit").len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_argument_gives_an_empty_result() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_profile("taxa/graph");
    let store = Arc::new(MemoryGraphStore::new()?);
    describe_service(&store, "taxa/graph", &format!("{}/taxa?name={{name}}", api.url), "image")
        .await?;
    let gateway = gateway(config(&services), &store)?;

    let response = gateway
        .execute(&sparql_request(
            "taxa/graph",
            "SELECT ?img WHERE { ?t <http://schema.org/image> ?img }",
            &[],
        ))
        .await?;

    assert!(values(&response, "img").is_empty());
    assert_eq!(api.calls(), 0);
    assert_no_temporary_graph(&store);
    Ok(())
}

#[tokio::test]
async fn arguments_are_read_from_the_graph_pattern() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_profile("taxa/graph");
    let store = Arc::new(MemoryGraphStore::new()?);
    describe_service(&store, "taxa/graph", &format!("{}/taxa?name={{name}}", api.url), "image")
        .await?;
    let gateway = gateway(config(&services), &store)?;

    let response = gateway
        .execute(&sparql_request(
            "taxa/graph",
            "SELECT ?img WHERE { ?t <http://schema.org/name> \"Delphinus delphis\" ; <http://schema.org/image> ?img }",
            &[],
        ))
        .await?;

    assert_eq!(
        values(&response, "img"),
        vec!["http://img.example.org/Delphinus_delphis.jpg"]
    );
    Ok(())
}

#[tokio::test]
async fn linked_data_mode_returns_the_whole_graph() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service("taxa/search", &service_toml(&api.url, "taxa", "image", ""));
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let response = gateway
        .execute(&ServiceRequest {
            service: "taxa/search".to_owned(),
            mode: QueryMode::Ld,
            query: None,
            accept: "application/n-triples".to_owned(),
            parameters: vec![("name".to_owned(), "Delphinus".to_owned())],
        })
        .await?;

    let body = String::from_utf8(response.body.to_vec())?;
    assert_eq!(body.lines().count(), 2);
    assert!(body.contains("<http://example.org/taxon/Delphinus>"));
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_do_not_see_each_other() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service("taxa/search", &service_toml(&api.url, "taxa", "image", ""));
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let names = ["Delphinus", "Orcinus", "Tursiops", "Phocoena"];
    let responses = futures::future::try_join_all(names.iter().map(|name| {
        let gateway = gateway.clone();
        let request = sparql_request("taxa/search", NAMES_QUERY, &[("name", name)]);
        async move { gateway.execute(&request).await }
    }))
    .await?;

    for (name, response) in names.iter().zip(&responses) {
        assert_eq!(values(response, "n"), vec![(*name).to_owned()]);
    }
    assert_no_temporary_graph(&store);
    Ok(())
}

#[tokio::test]
async fn failing_api_degrades_to_an_empty_result() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service("broken", &service_toml(&api.url, "broken", "image", ""));
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let response = gateway
        .execute(&sparql_request("broken", NAMES_QUERY, &[("name", "x")]))
        .await?;

    assert!(values(&response, "n").is_empty());
    Ok(())
}

#[tokio::test]
async fn api_keys_never_reach_the_provenance() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service(
        "taxa/search",
        &format!(
            "api_query = \"{}/taxa?name={{name}}&api_key=S3CR3T\"\nadd_provenance = true\n\n\
             [[arguments]]\nname = \"name\"\npredicate = \"http://schema.org/name\"\n",
            api.url
        ),
    );
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let response = gateway
        .execute(&sparql_request(
            "taxa/search",
            "SELECT ?q WHERE { ?a <http://ns.inria.fr/sparql-micro-service#apiQuery> ?q }",
            &[("name", "Delphinus")],
        ))
        .await?;

    let queries = values(&response, "q");
    assert_eq!(queries.len(), 1);
    assert!(queries[0].ends_with("api_key=obfuscated"));
    assert!(!String::from_utf8(response.body.to_vec())?.contains("S3CR3T"));
    Ok(())
}

#[tokio::test]
async fn missing_query_string_argument_is_a_bad_request() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service("taxa/search", &service_toml(&api.url, "taxa", "image", ""));
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let result = gateway
        .execute(&sparql_request("taxa/search", NAMES_QUERY, &[]))
        .await;

    assert!(matches!(result, Err(GatewayError::BadRequest(_))));
    assert_eq!(api.calls(), 0);
    Ok(())
}

/// Delegates to an in-memory store but rejects every query.
struct RejectingQueries(Arc<MemoryGraphStore>);

#[async_trait]
impl GraphStore for RejectingQueries {
    async fn query(
        &self,
        _query: &str,
        _accept: &str,
        _default_graph: Option<&str>,
    ) -> Result<StoreResponse, StoreError> {
        Err(StoreError::Evaluation("rejected".to_owned()))
    }

    async fn update(&self, update: &str) -> Result<(), StoreError> {
        self.0.update(update).await
    }
}

#[tokio::test]
async fn graphs_are_dropped_when_the_store_fails() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_file_service("taxa/search", &service_toml(&api.url, "taxa", "image", ""));
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = apigraph_engine::Gateway::with_store(
        config(&services),
        Arc::new(RejectingQueries(Arc::clone(&store))),
    )?;

    let result = gateway
        .execute(&sparql_request("taxa/search", NAMES_QUERY, &[("name", "Delphinus")]))
        .await;

    assert!(matches!(result, Err(GatewayError::UpstreamFatal(_))));
    assert_eq!(api.calls(), 1);
    assert_no_temporary_graph(&store);
    Ok(())
}
