use crate::common::*;
use apigraph_common::GatewayError;
use apigraph_store::results::SPARQL_RESULTS_JSON;
use apigraph_store::MemoryGraphStore;
use std::sync::Arc;

const COMPOSED_QUERY: &str = "PREFIX s: <http://schema.org/>
SELECT ?img ?audio WHERE {
  ?t s:name \"Delphinus delphis\" ;
     s:image ?img ;
     s:audio ?audio .
}";

const PARTLY_MATCHED_QUERY: &str = "PREFIX s: <http://schema.org/>
SELECT ?img WHERE {
  _:taxon s:name \"Delphinus delphis\" ;
     s:image ?img .
  ?img s:author ?who .
}";

fn services(api: &MockApi) -> ServicesDir {
    let services = ServicesDir::new();
    services.add_file_service("sounds", &service_toml(&api.url, "sounds", "audio", ""));
    services.add_file_service("taxa/search", &service_toml(&api.url, "taxa", "image", ""));
    services
}

#[tokio::test]
async fn services_are_combined_in_one_answer() -> TestResult {
    let api = MockApi::start().await?;
    let services = services(&api);
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let composed = gateway.compose(COMPOSED_QUERY, SPARQL_RESULTS_JSON).await?;

    assert!(composed.unmatched.is_empty());
    assert_eq!(
        values(&composed.response, "img"),
        vec!["http://img.example.org/Delphinus_delphis.jpg"]
    );
    assert_eq!(
        values(&composed.response, "audio"),
        vec!["http://audio.example.org/Delphinus_delphis.mp3"]
    );
    assert_eq!(api.calls(), 2);
    assert_no_temporary_graph(&store);
    Ok(())
}

#[tokio::test]
async fn unmatched_patterns_are_pruned_in_lenient_mode() -> TestResult {
    let api = MockApi::start().await?;
    let services = services(&api);
    let store = Arc::new(MemoryGraphStore::new()?);
    let gateway = gateway(config(&services), &store)?;

    let composed = gateway
        .compose(PARTLY_MATCHED_QUERY, SPARQL_RESULTS_JSON)
        .await?;

    assert_eq!(composed.unmatched.len(), 1);
    assert!(composed.unmatched[0].contains("<http://schema.org/author>"));
    assert_eq!(
        values(&composed.response, "img"),
        vec!["http://img.example.org/Delphinus_delphis.jpg"]
    );
    assert_no_temporary_graph(&store);
    Ok(())
}

#[tokio::test]
async fn unmatched_patterns_fail_before_any_call_in_strict_mode() -> TestResult {
    let api = MockApi::start().await?;
    let services = services(&api);
    let store = Arc::new(MemoryGraphStore::new()?);
    let mut config = config(&services);
    config.composition.error_on_unmatched_patterns = true;
    let gateway = gateway(config, &store)?;

    let result = gateway.compose(PARTLY_MATCHED_QUERY, SPARQL_RESULTS_JSON).await;

    match result {
        Err(GatewayError::CompositionUnmatched { patterns }) => assert_eq!(patterns.len(), 1),
        other => panic!("the composition should have been rejected, got {other:?}"),
    }
    assert_eq!(api.calls(), 0);
    assert_no_temporary_graph(&store);
    Ok(())
}

#[tokio::test]
async fn graph_described_services_take_part() -> TestResult {
    let api = MockApi::start().await?;
    let services = ServicesDir::new();
    services.add_profile("taxa/graph");
    let store = Arc::new(MemoryGraphStore::new()?);
    describe_service(&store, "taxa/graph", &format!("{}/taxa?name={{name}}", api.url), "image")
        .await?;
    let gateway = gateway(config(&services), &store)?;

    let composed = gateway
        .compose(
            "SELECT ?img WHERE { ?t <http://schema.org/name> \"Orcinus orca\" ; <http://schema.org/image> ?img }",
            SPARQL_RESULTS_JSON,
        )
        .await?;

    assert_eq!(
        values(&composed.response, "img"),
        vec!["http://img.example.org/Orcinus_orca.jpg"]
    );
    assert_eq!(api.called_names(), vec!["Orcinus orca"]);
    Ok(())
}
