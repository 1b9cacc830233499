use deplink_analyzer::analyzer::{FileDependencyAnalyzer, MissingLinkKind};
use deplink_analyzer::import_source::{ImportKind, ImportSource, ImportedSymbol};
use deplink_analyzer::language::Language;
use deplink_core::edge_types::names;
use deplink_core::graph::EdgeFilter;
use deplink_core::identity;
use deplink_core::inference::{HierarchicalOptions, InferenceEngine, TraversalOptions};
use deplink_core::store::GraphStore;
use serde_json::Value;
use std::path::Path;

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn relative(specifier: &str, symbol: &str) -> ImportSource {
    ImportSource::new(ImportKind::Relative, specifier).symbol(ImportedSymbol::named(symbol))
}

/// The three-file chain: App.tsx -> utils/helpers.ts -> lib/math.ts.
fn analyze_chain(root: &Path, store: &mut GraphStore) -> FileDependencyAnalyzer {
    write_file(root, "src/App.tsx", "import { helper } from './utils/helpers'\n");
    write_file(root, "src/utils/helpers.ts", "import { add } from '../lib/math'\n");
    write_file(root, "src/lib/math.ts", "export const add = 0\n");

    let analyzer = FileDependencyAnalyzer::new(root);
    analyzer
        .analyze(
            store,
            "src/App.tsx",
            Language::Tsx,
            &[relative("./utils/helpers", "helper")],
        )
        .unwrap();
    analyzer
        .analyze(
            store,
            "src/utils/helpers.ts",
            Language::Typescript,
            &[relative("../lib/math", "add")],
        )
        .unwrap();
    analyzer
        .analyze(store, "src/lib/math.ts", Language::Typescript, &[])
        .unwrap();
    analyzer
}

#[test]
fn test_three_file_chain_transitive_reach() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = GraphStore::with_default_types();
    analyze_chain(tmp.path(), &mut store);

    let app = store
        .node_by_identifier(&identity::file_id("/src/App.tsx", None))
        .unwrap()
        .id;
    let math = store
        .node_by_identifier(&identity::file_id("/src/lib/math.ts", None))
        .unwrap()
        .id;

    let mut engine = InferenceEngine::new(&mut store);
    let result = engine
        .query_transitive(
            app,
            names::DEPENDS_ON,
            &TraversalOptions {
                max_depth: 10,
                ..TraversalOptions::default()
            },
        )
        .unwrap();

    let reach = result
        .edges
        .iter()
        .find(|e| e.to == math)
        .expect("App.tsx must reach math.ts transitively");
    assert_eq!(reach.depth, 2);
    assert_eq!(reach.edge_path.len(), 2);
}

#[test]
fn test_library_import_classification() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "src/App.tsx", "import React from 'react'\n");

    let mut store = GraphStore::with_default_types();
    let analyzer = FileDependencyAnalyzer::new(tmp.path());
    let result = analyzer
        .analyze(
            &mut store,
            "src/App.tsx",
            Language::Tsx,
            &[ImportSource::new(ImportKind::Library, "react")
                .symbol(ImportedSymbol::named("react"))],
        )
        .unwrap();

    assert!(result.missing_links.is_empty());
    let lib = store.node_by_identifier("library::react").expect("library node");
    assert_eq!(lib.kind, "library");
    assert_eq!(lib.source_file, "");
    assert_eq!(lib.metadata.get("is_builtin"), Some(&Value::Bool(false)));

    let edges = store.find_edges(&EdgeFilter::of_types(vec![names::IMPORTS_LIBRARY.into()]));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, lib.id);
    assert_eq!(edges[0].weight, 1.6);
    assert_eq!(edges[0].source_file.as_deref(), Some("/src/App.tsx"));
}

#[test]
fn test_missing_target_becomes_missing_link() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(
        tmp.path(),
        "src/components/UserProfile.tsx",
        "import Missing from './MissingComponent'\n",
    );

    let mut store = GraphStore::with_default_types();
    let analyzer = FileDependencyAnalyzer::new(tmp.path());
    let result = analyzer
        .analyze(
            &mut store,
            "src/components/UserProfile.tsx",
            Language::Tsx,
            &[ImportSource::new(ImportKind::Relative, "./MissingComponent")
                .symbol(ImportedSymbol::default_export("Missing"))],
        )
        .unwrap();

    assert_eq!(result.missing_links.len(), 1);
    let link = &result.missing_links[0];
    assert_eq!(link.kind, MissingLinkKind::FileNotFound);
    assert_eq!(link.resolved_path, "/src/components/MissingComponent");
    assert_eq!(link.specifier, "./MissingComponent");

    // the target node exists in the graph, marked as not on disk
    let target = store
        .node_by_identifier(&identity::file_id("/src/components/MissingComponent", None))
        .expect("missing target still gets a node");
    assert_eq!(target.metadata.get("exists"), Some(&Value::Bool(false)));

    let edges = store.find_edges(&EdgeFilter::of_types(vec![names::IMPORTS_FILE.into()]));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, target.id);

    // and the store-level view agrees
    let missing = store.missing_links();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, target.id);
}

#[test]
fn test_reanalysis_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = GraphStore::with_default_types();
    let analyzer = analyze_chain(tmp.path(), &mut store);

    let nodes_before = store.node_count();
    let edges_before = store.edge_count();

    // identical inputs: identical edge multisets and node counts
    analyzer
        .analyze(
            &mut store,
            "src/App.tsx",
            Language::Tsx,
            &[relative("./utils/helpers", "helper")],
        )
        .unwrap();
    assert_eq!(store.node_count(), nodes_before);
    assert_eq!(store.edge_count(), edges_before);
}

#[test]
fn test_reanalysis_with_renamed_import() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = GraphStore::with_default_types();
    let analyzer = analyze_chain(tmp.path(), &mut store);
    write_file(tmp.path(), "src/utils/renamed.ts", "export const helper = 0\n");

    let app = store
        .node_by_identifier(&identity::file_id("/src/App.tsx", None))
        .unwrap()
        .id;
    let helpers = store
        .node_by_identifier(&identity::file_id("/src/utils/helpers.ts", None))
        .unwrap()
        .id;
    let helpers_to_math = store.outgoing_edges(helpers)[0].clone();

    analyzer
        .analyze(
            &mut store,
            "src/App.tsx",
            Language::Tsx,
            &[relative("./utils/renamed", "helper")],
        )
        .unwrap();

    let renamed = store
        .node_by_identifier(&identity::file_id("/src/utils/renamed.ts", None))
        .unwrap()
        .id;
    let from_app: Vec<_> = store
        .outgoing_edges(app)
        .into_iter()
        .filter(|e| e.edge_type == names::IMPORTS_FILE)
        .cloned()
        .collect();

    // no edge targets helpers.ts anymore; exactly one targets renamed.ts
    assert_eq!(from_app.len(), 1);
    assert_eq!(from_app[0].to, renamed);
    assert!(!from_app.iter().any(|e| e.to == helpers));

    // edges authored by other files are untouched
    assert_eq!(store.edge(helpers_to_math.id).unwrap(), &helpers_to_math);
}

#[test]
fn test_hierarchical_imports_query_spans_both_leaf_types() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "src/App.tsx", "");
    write_file(tmp.path(), "src/utils/helpers.ts", "");

    let mut store = GraphStore::with_default_types();
    let analyzer = FileDependencyAnalyzer::new(tmp.path());
    analyzer
        .analyze(
            &mut store,
            "src/App.tsx",
            Language::Tsx,
            &[
                relative("./utils/helpers", "helper"),
                ImportSource::new(ImportKind::Library, "react")
                    .symbol(ImportedSymbol::named("react")),
            ],
        )
        .unwrap();

    let engine = InferenceEngine::new(&mut store);
    let edges = engine
        .query_hierarchical(names::IMPORTS, HierarchicalOptions::with_children())
        .unwrap();
    assert_eq!(edges.len(), 2);
    let mut types: Vec<&str> = edges.iter().map(|e| e.edge_type.as_str()).collect();
    types.sort_unstable();
    assert_eq!(types, vec![names::IMPORTS_FILE, names::IMPORTS_LIBRARY]);
}

#[test]
fn test_builtin_import_marks_library_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "src/server.ts", "");

    let mut store = GraphStore::with_default_types();
    let analyzer = FileDependencyAnalyzer::new(tmp.path());
    let result = analyzer
        .analyze(
            &mut store,
            "src/server.ts",
            Language::Typescript,
            &[ImportSource::new(ImportKind::Builtin, "path").symbol(ImportedSymbol {
                name: "path".into(),
                is_namespace: true,
                ..ImportedSymbol::default()
            })],
        )
        .unwrap();

    assert_eq!(result.stats.library_targets, 1);
    let lib = store.node_by_identifier("library::path").unwrap();
    assert_eq!(lib.metadata.get("is_builtin"), Some(&Value::Bool(true)));

    let edges = store.find_edges(&EdgeFilter::of_types(vec![names::IMPORTS_LIBRARY.into()]));
    // 1 + 0.1 (one item) + 0.1 (builtin)
    assert_eq!(edges[0].weight, 1.2);
}

#[test]
fn test_alias_resolution_through_src() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "src/pages/Home.tsx", "");
    write_file(tmp.path(), "src/components/Button.tsx", "");

    let mut store = GraphStore::with_default_types();
    let analyzer = FileDependencyAnalyzer::new(tmp.path());
    let result = analyzer
        .analyze(
            &mut store,
            "src/pages/Home.tsx",
            Language::Tsx,
            &[ImportSource::new(ImportKind::Absolute, "@/components/Button")
                .symbol(ImportedSymbol::default_export("Button"))],
        )
        .unwrap();

    assert!(result.missing_links.is_empty());
    assert!(
        store
            .node_by_identifier(&identity::file_id("/src/components/Button.tsx", None))
            .is_some()
    );
}

#[test]
fn test_edge_metadata_records_import_details() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "src/App.tsx", "");
    write_file(tmp.path(), "src/utils/helpers.ts", "");

    let mut store = GraphStore::with_default_types();
    let analyzer = FileDependencyAnalyzer::new(tmp.path());
    analyzer
        .analyze(
            &mut store,
            "src/App.tsx",
            Language::Tsx,
            &[relative("./utils/helpers", "helper").at(3, 1)],
        )
        .unwrap();

    let edges = store.find_edges(&EdgeFilter::of_types(vec![names::IMPORTS_FILE.into()]));
    let metadata = &edges[0].metadata;
    assert_eq!(metadata.get("import_kind"), Some(&Value::String("relative".into())));
    assert_eq!(metadata.get("line"), Some(&Value::from(3u32)));
    assert_eq!(
        metadata.get("symbols"),
        Some(&Value::Array(vec![Value::String("helper".into())]))
    );
    assert_eq!(edges[0].label, "./utils/helpers");
}

#[test]
fn test_owned_set_comes_from_config() {
    let tmp = tempfile::tempdir().unwrap();
    let config = deplink_core::config::DeplinkConfig::load(tmp.path()).unwrap();
    let analyzer = FileDependencyAnalyzer::new(tmp.path())
        .with_owned_edge_types(config.analyzer.owned_edge_types.clone());
    assert_eq!(
        analyzer.owned_edge_types().to_vec(),
        vec![names::IMPORTS_FILE.to_string(), names::IMPORTS_LIBRARY.to_string()]
    );
}

#[test]
fn test_session_log_records_each_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = GraphStore::with_default_types();
    analyze_chain(tmp.path(), &mut store);
    assert_eq!(store.sessions().len(), 3);
    assert_eq!(store.sessions()[0].source_file, "/src/App.tsx");
    assert_eq!(store.sessions()[0].language, "tsx");
}
