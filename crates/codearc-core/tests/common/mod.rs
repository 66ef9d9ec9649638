//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use codearc_core::config::AnalysisConfig;
use codearc_core::graph::call_graph::CallGraph;
use codearc_core::phases::calls::{run_calls_phase, BuildOutcome};
use codearc_core::phases::parsing::{run_parsing_phase, ParseOutcome};
use codearc_core::phases::scan::{resolve_language, run_scan_phase, ScanResult};
use codearc_core::pipeline::{run_pipeline, AnalysisRun, CancelToken};

// ---------------------------------------------------------------------------
// Fixture path resolution
// ---------------------------------------------------------------------------

/// Resolve `tests/fixtures/{name}` relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("../../tests/fixtures")
        .join(name)
        .canonicalize()
        .unwrap_or_else(|_| {
            Path::new(manifest_dir)
                .join("../../tests/fixtures")
                .join(name)
        })
}

pub fn fixture_config(name: &str, language: &str) -> AnalysisConfig {
    AnalysisConfig::new(fixture_path(name), language)
}

/// Write `(relative path, contents)` pairs under `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

// ---------------------------------------------------------------------------
// Phase runners
// ---------------------------------------------------------------------------

pub fn run_scan(config: &AnalysisConfig) -> ScanResult {
    run_scan_phase(config, &CancelToken::new()).expect("scan failed")
}

pub fn run_parse(config: &AnalysisConfig) -> ParseOutcome {
    let scanned = run_scan(config);
    let language = resolve_language(&config.language).unwrap();
    run_parsing_phase(config, language, &scanned.files, &CancelToken::new()).expect("parse failed")
}

pub fn run_build(config: &AnalysisConfig) -> BuildOutcome {
    run_calls_phase(run_parse(config).files)
}

pub fn run_all(config: &AnalysisConfig) -> AnalysisRun {
    run_pipeline(config, None, &CancelToken::new()).expect("pipeline failed")
}

// ---------------------------------------------------------------------------
// Graph extractors
// ---------------------------------------------------------------------------

/// Id of the single node with display name `name`.
pub fn id_of(graph: &CallGraph, name: &str) -> String {
    let ids: Vec<String> = graph
        .nodes()
        .into_iter()
        .filter(|n| n.name == name)
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(ids.len(), 1, "expected exactly one node named {name}, got {ids:?}");
    ids[0].clone()
}

/// Call edges as (caller name, callee name), sorted.
pub fn call_pairs(graph: &CallGraph) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = graph
        .edges()
        .into_iter()
        .map(|(from, to)| {
            (
                graph.node(&from).unwrap().name.clone(),
                graph.node(&to).unwrap().name.clone(),
            )
        })
        .collect();
    pairs.sort();
    pairs
}

pub fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    out.sort();
    out
}

/// Display names of every node, sorted.
pub fn node_names(graph: &CallGraph) -> Vec<String> {
    let mut names: Vec<String> = graph.nodes().into_iter().map(|n| n.name.clone()).collect();
    names.sort();
    names
}
