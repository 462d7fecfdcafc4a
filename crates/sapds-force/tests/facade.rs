//! End-to-end facade behavior over an in-memory transport.

use std::sync::Arc;

use sapds_core::config::ForceElementConfig;
use sapds_core::types::{HierarchyType, ReadinessStatus};
use sapds_force::constants::*;
use sapds_force::{ChildrenRequest, ForceElementClient, ForceError, GraphRequest, TreeRequest};
use sapds_odata::mock::{filter_values, results, upstream_error, MockTransport};
use sapds_odata::{ODataError, QueryOptions};
use serde_json::{json, Value};

const EDGES: &[(&str, &str, &str)] = &[
    ("BDE", "BN1", "B002"),
    ("BDE", "BN2", "B002"),
    ("BN1", "CO1", "B002"),
    ("BN1", "BN2", "B005"),
    ("CO1", "PLT", "B002"),
];

const UNITS: &[(&str, &str, Option<u8>, &str)] = &[
    ("BDE", "1st Brigade", Some(90), "SFGPUCI---E----"),
    ("BN1", "1st Battalion", Some(70), "SFGPUCI---D----"),
    ("BN2", "2nd Battalion", None, ""),
    ("CO1", "Alpha Company", Some(40), "SFGPUCI---C----"),
];

fn graph_rows(params: &sapds_odata::QueryParams) -> Value {
    let filter = params.get("$filter").cloned().unwrap_or_default();
    let sources = filter_values(&filter, SRC_FIELD);
    let rows = EDGES
        .iter()
        .filter(|(s, _, _)| sources.iter().any(|x| x == s))
        .map(|(s, d, r)| json!({SRC_FIELD: s, DST_FIELD: d, REL_FIELD: r}))
        .collect();
    results(rows)
}

/// Properties the mock entity set knows; anything else in `$select` is a 400.
const SCHEMA: &[&str] = &[
    ID_FIELD,
    "FrcElmntOrgName",
    "FrcElmntOrgShortName",
    "FrcElmntOrgConcatenatedName",
    MATERIAL_PCT_FIELD,
    PERSONNEL_PCT_FIELD,
    TRAINING_PCT_FIELD,
    SYMBOL_FIELD,
    PARENT_STRUCTURE_FIELD,
    PARENT_PEACETIME_FIELD,
    PARENT_WARTIME_FIELD,
];

fn structure_parent(id: &str) -> Option<&'static str> {
    EDGES
        .iter()
        .find(|(_, d, r)| *d == id && *r == REL_STRUCTURE)
        .map(|(s, ..)| *s)
}

fn entity_rows(params: &sapds_odata::QueryParams) -> Result<Value, ODataError> {
    let select = params.get("$select").cloned().unwrap_or_default();
    if !select.is_empty() && select.split(',').any(|f| !SCHEMA.contains(&f)) {
        return Err(upstream_error(400, "mock://entities"));
    }
    let filter = params.get("$filter").cloned().unwrap_or_default();
    let ids = filter_values(&filter, ID_FIELD);
    let parents = filter_values(&filter, PARENT_STRUCTURE_FIELD);

    let rows = UNITS
        .iter()
        .filter(|(id, ..)| {
            let parent = structure_parent(id);
            filter.is_empty()
                || ids.iter().any(|x| x == id)
                || parents.iter().any(|p| Some(p.as_str()) == parent)
        })
        .map(|(id, name, pct, symbol)| {
            json!({
                ID_FIELD: id,
                "FrcElmntOrgName": name,
                MATERIAL_PCT_FIELD: pct,
                PERSONNEL_PCT_FIELD: pct.map(|p| p.to_string()),
                SYMBOL_FIELD: symbol,
                PARENT_STRUCTURE_FIELD: structure_parent(id),
            })
        })
        .collect();
    Ok(results(rows))
}

fn transport() -> Arc<MockTransport> {
    Arc::new(
        MockTransport::new()
            .with_sap_client("100")
            .on_get(SVC_GRAPH, ES_GRAPH_EDGE, |params| Ok(graph_rows(params)))
            .on_get(SVC_FORCE_ELEMENT, ES_FORCE_ELEMENT_TP, entity_rows),
    )
}

fn client(mock: &Arc<MockTransport>) -> ForceElementClient {
    let config = ForceElementConfig {
        deeplink_host: "fiori.example".to_string(),
        icon_base_url: "https://icons.example/sidc/".to_string(),
        ..Default::default()
    };
    ForceElementClient::new(mock.clone(), config)
}

#[tokio::test]
async fn test_tree_with_enrichment() {
    let mock = transport();
    let client = client(&mock);

    let tree = client
        .get_tree(TreeRequest::new("BDE").with_depth(2).with_readiness(true).with_sidc(true))
        .await
        .unwrap();

    let ids: Vec<_> = tree.nodes.iter().map(|n| n.data.id.as_str()).collect();
    assert_eq!(ids, vec!["BDE", "BN1", "BN2", "CO1"]);
    assert_eq!(tree.meta.depth_reached, 2);
    assert_eq!(tree.meta.edge_count_total, tree.edges.len());
    assert!(tree.node("PLT").is_none());

    let bn1 = tree.node("BN1").unwrap();
    assert_eq!(bn1.data.name, "1st Battalion");
    assert_eq!(bn1.data.readiness.unwrap().status, ReadinessStatus::Pmc);
    assert_eq!(bn1.data.sidc.as_deref(), Some("SFGPUCI---D----"));
    assert_eq!(
        bn1.data.icon_url,
        "https://icons.example/sidc/SFGPUCI---D----.svg"
    );

    let bn2 = tree.node("BN2").unwrap();
    assert_eq!(bn2.data.readiness.unwrap().score, 0);
    assert_eq!(bn2.data.sidc, None);
    assert_eq!(bn2.data.icon_url, DEFAULT_ICON_URL);

    let co1 = &tree.roots[0].children[0].children[0];
    assert_eq!(co1.data.id, "CO1");
    assert_eq!(co1.data.readiness.unwrap().status, ReadinessStatus::Nmc);
    assert_eq!(co1.data.sidc.as_deref(), Some("SFGPUCI---C----"));

    assert!(mock.calls().iter().all(|c| c.sap_client.as_deref() == Some("100")));
}

#[tokio::test]
async fn test_tree_without_enrichment_skips_entity_reads() {
    let mock = transport();
    let tree = client(&mock)
        .get_tree(TreeRequest::new("BDE").with_depth(1))
        .await
        .unwrap();

    assert_eq!(tree.nodes.len(), 3);
    assert!(tree.nodes.iter().all(|n| n.data.readiness.is_none()));
    // one name lookup, no readiness or SIDC queries
    assert_eq!(mock.calls_to(ES_FORCE_ELEMENT_TP), 1);
}

#[tokio::test]
async fn test_tree_fails_when_graph_fails() {
    let mock = Arc::new(MockTransport::new().with_failure(SVC_GRAPH, ES_GRAPH_EDGE, 503));
    let err = client(&mock)
        .get_tree(TreeRequest::new("BDE"))
        .await
        .unwrap_err();
    match err {
        ForceError::OData(e) => assert_eq!(e.status(), Some(503)),
        other => panic!("expected OData error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_graph_filters_relations_and_sorts_nodes() {
    let mock = transport();
    let client = client(&mock);

    let graph = client
        .get_graph(GraphRequest::new("BDE").with_depth(3).with_rel_types(["b005"]))
        .await
        .unwrap();
    assert_eq!(graph.edges.len(), 1);
    let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["BDE", "BN1", "BN2"]);
    assert_eq!(graph.meta.node_count, 3);
    assert_eq!(graph.meta.depth, 3);

    let all = client
        .get_graph(GraphRequest::new("BDE").with_depth(3).with_names(false))
        .await
        .unwrap();
    assert_eq!(all.edges.len(), EDGES.len());
    assert!(all.nodes.iter().all(|n| n.name == n.id));
}

#[tokio::test]
async fn test_names_fall_back_when_entity_service_fails() {
    let mock = Arc::new(
        MockTransport::new()
            .on_get(SVC_GRAPH, ES_GRAPH_EDGE, |params| Ok(graph_rows(params)))
            .with_failure(SVC_FORCE_ELEMENT, ES_FORCE_ELEMENT_TP, 500),
    );
    let client = client(&mock);

    let tree = client
        .get_tree(TreeRequest::new("BDE").with_depth(1).with_readiness(true))
        .await
        .unwrap();
    assert!(tree.nodes.iter().all(|n| n.data.name == n.data.id));
    assert!(tree.nodes.iter().all(|n| n.data.readiness.is_none()));

    let fe = client.get_force_element("BN1").await.unwrap();
    assert_eq!(fe.name, "BN1");
    assert!(fe.url.starts_with("https://fiori.example/"));
}

#[tokio::test]
async fn test_children_and_traverse() {
    let mock = transport();
    let client = client(&mock);

    let children = client.get_children(ChildrenRequest::new(["BDE"])).await;
    let mut ids: Vec<_> = children.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["BN1", "BN2"]);

    let request: ChildrenRequest =
        serde_json::from_str(r#"{"parent_ids": ["BN1"], "hierarchy": "structure"}"#).unwrap();
    let children = client.get_children(request).await;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "CO1");

    let nodes = client
        .traverse("BDE", HierarchyType::Structure, 3)
        .await
        .unwrap();
    assert_eq!(nodes.len(), UNITS.len());
    assert_eq!(nodes["CO1"].parent_structure.as_deref(), Some("BN1"));
}

#[tokio::test]
async fn test_subgraph_from_fetched_graph() {
    let mock = transport();
    let client = client(&mock);

    let graph = client
        .get_graph(GraphRequest::new("BDE").with_depth(3))
        .await
        .unwrap();
    let sub = client.get_subgraph("CO1", &graph.edges, Some(1)).unwrap();
    assert_eq!(sub.node_ids, vec!["BN1", "CO1", "PLT"]);
    assert_eq!(sub.edges.len(), 2);
}

#[tokio::test]
async fn test_probe_sidc_runs_once() {
    let mock = transport();
    let client = client(&mock);

    let field = client.probe_sidc_field().await;
    let again = client.probe_sidc_field().await;
    // only the last candidate exists in the mock schema
    assert_eq!(field.as_deref(), Some(SYMBOL_FIELD));
    assert_eq!(field, again);
    assert_eq!(mock.calls().len(), SIDC_FIELD_CANDIDATES.len());
}

#[tokio::test]
async fn test_generic_query_uses_logical_names() {
    let mock = transport();
    let client = client(&mock);

    let rows = client
        .query(
            "graph_edges",
            QueryOptions::new()
                .filter(format!("{SRC_FIELD} eq 'BN1'"))
                .validation(sapds_odata::FieldValidation::Off),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(mock.calls()[0].service, SVC_GRAPH);
}
