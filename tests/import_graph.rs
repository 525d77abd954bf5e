use callflow::api::dto::{GraphDocument, QueryRequest};
use callflow::application::QueryUsecase;
use callflow::infrastructure::AutoCallGraphBuilder;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn fixture_request() -> QueryRequest {
    QueryRequest {
        module_args: vec!["simple".to_string()],
        dir: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")),
        exclude_std: false,
        exclude_unexported: false,
        max_depth: Some(0),
        format: "json".to_string(),
        ..Default::default()
    }
}

#[test]
fn exported_document_reimports_to_the_same_answers() {
    let exported = QueryUsecase::new(&AutoCallGraphBuilder).run(&fixture_request()).unwrap();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("simple.json"), &exported.body).unwrap();

    let mut direct = fixture_request();
    direct.symbol = Some("hello".to_string());
    direct.direction = "both".to_string();
    direct.exclude_std = true;

    let mut imported = direct.clone();
    imported.algo = "import".to_string();
    imported.module_args = vec!["simple.json".to_string()];
    imported.dir = Some(dir.path().to_path_buf());

    let a = QueryUsecase::new(&AutoCallGraphBuilder).run(&direct).unwrap();
    let b = QueryUsecase::new(&AutoCallGraphBuilder).run(&imported).unwrap();
    assert_eq!(a.body, b.body);
    assert_eq!(a.stats.edge_count, 3);
}

#[test]
fn hand_written_document() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("graph.json"),
        r#"{
            "nodes": [
                {"id": "svc::main", "name": "main", "module_path": "svc", "exported": true},
                {"id": "svc::db::open", "name": "open", "module_path": "svc::db", "exported": true},
                {"id": "svc::db::retry", "name": "retry", "module_path": "svc::db", "exported": false}
            ],
            "edges": [
                {"caller": "svc::main", "callee": "svc::db::open", "file": "main.rs", "line": 4},
                {"caller": "svc::db::open", "callee": "svc::db::retry"},
                {"caller": "svc::main", "callee": "svc::gone"}
            ]
        }"#,
    )
    .unwrap();

    let request = QueryRequest {
        module_args: vec!["graph.json".to_string()],
        dir: Some(dir.path().to_path_buf()),
        algo: "import".to_string(),
        format: "dot".to_string(),
        ..Default::default()
    };
    let resp = QueryUsecase::new(&AutoCallGraphBuilder).run(&request).unwrap();
    assert!(resp.body.starts_with("digraph callgraph {"));
    assert_eq!(resp.stats.edge_count, 1);
    assert!(!resp.body.contains("retry"));

    let doc: GraphDocument = serde_json::from_str(
        &QueryUsecase::new(&AutoCallGraphBuilder)
            .run(&QueryRequest {
                format: "json".to_string(),
                exclude_unexported: false,
                ..request
            })
            .unwrap()
            .body,
    )
    .unwrap();
    assert_eq!(doc.edges.len(), 2);
    assert_eq!(doc.edges.iter().find(|e| e.callee == "svc::db::open").and_then(|e| e.line), Some(4));
}
