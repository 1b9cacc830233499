use deplink_core::edge_types::{EdgeTypeDef, names};
use deplink_core::graph::{EdgeDraft, NodeDraft, NodeId, kinds};
use deplink_core::identity;
use deplink_core::inference::{
    HierarchicalOptions, InferAllOptions, InferenceEngine, InferenceError, TraversalOptions,
};
use deplink_core::store::GraphStore;

fn file_node(path: &str) -> NodeDraft {
    NodeDraft::new(
        identity::file_id(path, None),
        kinds::FILE,
        identity::basename(path),
    )
    .source_file(path)
    .language("typescript")
}

/// `/src/a.ts -> /src/b.ts -> /src/c.ts` over imports_file, plus one
/// imports_library edge from a.
fn chain_store() -> (GraphStore, NodeId, NodeId, NodeId, NodeId) {
    let mut store = GraphStore::with_default_types();
    let a = store.upsert_node(file_node("/src/a.ts")).unwrap();
    let b = store.upsert_node(file_node("/src/b.ts")).unwrap();
    let c = store.upsert_node(file_node("/src/c.ts")).unwrap();
    let lib = store
        .upsert_node(
            NodeDraft::new(identity::library_id("react"), kinds::LIBRARY, "react")
                .language("typescript"),
        )
        .unwrap();
    store
        .upsert_edge(EdgeDraft::new(a, b, names::IMPORTS_FILE).source_file("/src/a.ts"))
        .unwrap();
    store
        .upsert_edge(EdgeDraft::new(b, c, names::IMPORTS_FILE).source_file("/src/b.ts"))
        .unwrap();
    store
        .upsert_edge(EdgeDraft::new(a, lib, names::IMPORTS_LIBRARY).source_file("/src/a.ts"))
        .unwrap();
    (store, a, b, c, lib)
}

#[test]
fn test_hierarchical_query_includes_children() {
    let (mut store, a, b, _c, _lib) = chain_store();
    // noise outside the imports family
    store.upsert_edge(EdgeDraft::new(b, a, names::CALLS)).unwrap();

    let engine = InferenceEngine::new(&mut store);
    let edges = engine
        .query_hierarchical(names::IMPORTS, HierarchicalOptions::with_children())
        .unwrap();

    assert_eq!(edges.len(), 3);
    assert!(edges.iter().all(|e| {
        e.edge_type == names::IMPORTS_FILE || e.edge_type == names::IMPORTS_LIBRARY
    }));
}

#[test]
fn test_hierarchical_query_includes_parents() {
    let (mut store, a, b, _c, _lib) = chain_store();
    store
        .upsert_edge(EdgeDraft::new(a, b, names::DEPENDS_ON))
        .unwrap();
    let engine = InferenceEngine::new(&mut store);
    let edges = engine
        .query_hierarchical(
            names::IMPORTS,
            HierarchicalOptions {
                include_children: false,
                include_parents: true,
            },
        )
        .unwrap();
    // only the depends_on row qualifies: no plain-imports edges exist
    // and children are excluded
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].edge_type, names::DEPENDS_ON);
}

#[test]
fn test_hierarchical_query_unknown_type() {
    let (mut store, ..) = chain_store();
    let engine = InferenceEngine::new(&mut store);
    assert!(matches!(
        engine.query_hierarchical("bogus", HierarchicalOptions::default()),
        Err(InferenceError::UnknownEdgeType(_))
    ));
}

#[test]
fn test_transitive_chain_reaches_depth_two() {
    let (mut store, a, b, c, lib) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();

    assert!(!result.truncated);
    // depth 1: b and the library; depth 2: c through b
    let to_c = result
        .edges
        .iter()
        .find(|e| e.to == c)
        .expect("a must transitively depend on c");
    assert_eq!(to_c.depth, 2);
    assert_eq!(to_c.from, a);
    assert_eq!(to_c.edge_type, names::DEPENDS_ON);
    assert_eq!(to_c.edge_path.len(), 2);
    assert!(result.edges.iter().any(|e| e.to == b && e.depth == 1));
    assert!(result.edges.iter().any(|e| e.to == lib && e.depth == 1));
}

#[test]
fn test_transitive_ordering_is_deterministic() {
    let (mut store, a, ..) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();
    let mut expected = result.edges.clone();
    expected.sort_by(|x, y| (x.depth, x.to).cmp(&(y.depth, y.to)));
    assert_eq!(result.edges, expected);
}

#[test]
fn test_transitive_rejects_non_transitive_type() {
    let (mut store, a, ..) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    assert_eq!(
        engine
            .query_transitive(a, names::CALLS, &TraversalOptions::default())
            .unwrap_err(),
        InferenceError::NotTransitive(names::CALLS.to_string())
    );
}

#[test]
fn test_transitive_respects_max_depth() {
    let (mut store, a, b, c, _lib) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    let opts = TraversalOptions {
        max_depth: 1,
        ..TraversalOptions::default()
    };
    let result = engine.query_transitive(a, names::DEPENDS_ON, &opts).unwrap();
    assert!(result.truncated);
    assert!(result.edges.iter().any(|e| e.to == b));
    assert!(!result.edges.iter().any(|e| e.to == c));
}

#[test]
fn test_transitive_cycle_terminates() {
    let mut store = GraphStore::with_default_types();
    let a = store.upsert_node(file_node("/src/a.ts")).unwrap();
    let b = store.upsert_node(file_node("/src/b.ts")).unwrap();
    store.upsert_edge(EdgeDraft::new(a, b, names::IMPORTS_FILE)).unwrap();
    store.upsert_edge(EdgeDraft::new(b, a, names::IMPORTS_FILE)).unwrap();

    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].to, b);
}

#[test]
fn test_transitive_cache_hit_matches_recompute() {
    let (mut store, a, ..) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    let first = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();
    // second call is served from the cache
    let second = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();
    assert_eq!(first.edges, second.edges);
    assert_eq!(first.truncated, second.truncated);
}

#[test]
fn test_cache_coherence_after_edge_mutation() {
    let (mut store, a, b, _c, _lib) = chain_store();
    {
        let mut engine = InferenceEngine::new(&mut store);
        engine
            .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
            .unwrap();
    }
    assert!(store.statistics().cache_entries > 0);

    // mutating an edge that touches b must drop every cached row whose
    // path runs through b
    let d = store.upsert_node(file_node("/src/d.ts")).unwrap();
    store.upsert_edge(EdgeDraft::new(b, d, names::IMPORTS_FILE)).unwrap();
    assert_eq!(store.statistics().cache_entries, 0);

    // and the next query sees the new edge
    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();
    assert!(result.edges.iter().any(|e| e.to == d && e.depth == 2));
}

#[test]
fn test_cache_coherence_after_edge_removal() {
    let (mut store, a, b, c, _lib) = chain_store();
    {
        let mut engine = InferenceEngine::new(&mut store);
        engine
            .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
            .unwrap();
    }
    assert!(store.statistics().cache_entries > 0);

    let types = vec![names::IMPORTS_FILE.to_string(), names::IMPORTS_LIBRARY.to_string()];
    store.cleanup_by_source_and_types("/src/b.ts", &types);
    assert_eq!(store.statistics().cache_entries, 0);

    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
        .unwrap();
    assert!(!result.edges.iter().any(|e| e.to == c));
}

#[test]
fn test_redefine_edge_type_clears_cache() {
    let (mut store, a, ..) = chain_store();
    {
        let mut engine = InferenceEngine::new(&mut store);
        engine
            .query_transitive(a, names::DEPENDS_ON, &TraversalOptions::default())
            .unwrap();
    }
    assert!(store.statistics().cache_entries > 0);

    let mut redefined = store.edge_types().get(names::DEPENDS_ON).unwrap().clone();
    redefined.priority = 99;
    store.redefine_edge_type(redefined).unwrap();
    assert_eq!(store.statistics().cache_entries, 0);
}

#[test]
fn test_inheritable_projection() {
    let mut store = GraphStore::with_default_types();
    let file = store.upsert_node(file_node("/src/service.ts")).unwrap();
    let class = store
        .upsert_node(
            NodeDraft::new(
                identity::class_id("/src/service.ts", "UserService", None),
                kinds::CLASS,
                "UserService",
            )
            .source_file("/src/service.ts")
            .language("typescript"),
        )
        .unwrap();
    let target = store.upsert_node(file_node("/src/db.ts")).unwrap();
    store.upsert_edge(EdgeDraft::new(file, class, names::CONTAINS)).unwrap();
    store.upsert_edge(EdgeDraft::new(class, target, names::REFERENCES)).unwrap();

    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_inheritable(file, names::REFERENCES, &TraversalOptions::default())
        .unwrap();

    assert_eq!(result.edges.len(), 1);
    let derived = &result.edges[0];
    assert_eq!(derived.from, file);
    assert_eq!(derived.to, target);
    assert_eq!(derived.edge_type, names::REFERENCES);
    assert_eq!(derived.depth, 2);
    assert_eq!(derived.edge_path.len(), 2);
}

#[test]
fn test_inheritable_through_declares() {
    // declares is a child of contains, so it counts as containment
    let mut store = GraphStore::with_default_types();
    let file = store.upsert_node(file_node("/src/api.ts")).unwrap();
    let class = store
        .upsert_node(
            NodeDraft::new(
                identity::class_id("/src/api.ts", "Api", None),
                kinds::CLASS,
                "Api",
            )
            .source_file("/src/api.ts")
            .language("typescript"),
        )
        .unwrap();
    let target = store.upsert_node(file_node("/src/http.ts")).unwrap();
    store.upsert_edge(EdgeDraft::new(file, class, names::DECLARES)).unwrap();
    store.upsert_edge(EdgeDraft::new(class, target, names::REFERENCES)).unwrap();

    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_inheritable(file, names::REFERENCES, &TraversalOptions::default())
        .unwrap();
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].to, target);
}

#[test]
fn test_inheritable_rejects_plain_type() {
    let (mut store, a, ..) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    assert_eq!(
        engine
            .query_inheritable(a, names::CALLS, &TraversalOptions::default())
            .unwrap_err(),
        InferenceError::NotInheritable(names::CALLS.to_string())
    );
}

#[test]
fn test_infer_all_bundles_and_dedupes() {
    let (mut store, a, b, c, lib) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    let summary = engine.infer_all(a, &InferAllOptions::default()).unwrap();

    // two direct edges leave a
    assert_eq!(summary.direct.len(), 2);
    // derived rows are unique per (from, to, type)
    let mut keys: Vec<(i64, i64, String)> = summary
        .inferred
        .iter()
        .map(|e| (e.from, e.to, e.edge_type.clone()))
        .collect();
    keys.sort();
    let len_before = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), len_before);
    // the transitive reach shows up
    assert!(summary.inferred.iter().any(|e| e.to == c && e.depth == 2));
    assert!(summary.inferred.iter().any(|e| e.to == b));
    assert!(summary.inferred.iter().any(|e| e.to == lib));
}

#[test]
fn test_infer_all_respects_type_filter() {
    let (mut store, a, ..) = chain_store();
    let mut engine = InferenceEngine::new(&mut store);
    let summary = engine
        .infer_all(
            a,
            &InferAllOptions {
                types: Some(vec![names::EXTENDS.to_string()]),
                ..InferAllOptions::default()
            },
        )
        .unwrap();
    assert!(summary.direct.is_empty());
    assert!(summary.inferred.is_empty());
}

#[test]
fn test_traversal_options_from_config() {
    let config = deplink_core::config::TraversalConfig::default();
    let opts = TraversalOptions::from(&config);
    assert_eq!(opts.max_depth, 10);
    assert!(opts.expand_descendants);
    assert_eq!(opts.time_budget, None);
}

#[test]
fn test_custom_transitive_type_via_registration() {
    let mut store = GraphStore::with_default_types();
    store
        .register_edge_type(EdgeTypeDef::new("flows_into", "dataflow step").transitive())
        .unwrap();
    let a = store.upsert_node(file_node("/src/a.ts")).unwrap();
    let b = store.upsert_node(file_node("/src/b.ts")).unwrap();
    let c = store.upsert_node(file_node("/src/c.ts")).unwrap();
    store.upsert_edge(EdgeDraft::new(a, b, "flows_into")).unwrap();
    store.upsert_edge(EdgeDraft::new(b, c, "flows_into")).unwrap();

    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(a, "flows_into", &TraversalOptions::default())
        .unwrap();
    assert!(result.edges.iter().any(|e| e.to == c && e.depth == 2));
}
