//! Pipeline orchestration and export tests.

mod common;

use std::collections::BTreeSet;

use codearc_core::config::AnalysisConfig;
use codearc_core::error::AnalysisError;
use codearc_core::output::{build_report, build_snapshot, write_output, AnalysisReport};
use codearc_core::pipeline::{run_pipeline, CancelToken, ProgressCallback};
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn summary_counts_match_the_graph() {
    let run = run_all(&fixture_config("java_simple", "java"));
    assert_eq!(run.summary.file_count, 4);
    assert_eq!(run.summary.node_count, 10);
    assert_eq!(run.summary.edge_count, 8);
    assert_eq!(run.summary.cluster_count, run.clusters.len());
    assert!(run.summary.warnings.is_empty());
    for phase in ["scan", "parsing", "calls", "communities"] {
        assert!(run.summary.phase_timings.contains_key(phase), "missing timing for {phase}");
    }
}

#[test]
fn every_node_file_was_scanned() {
    let config = fixture_config("ts_simple", "typescript");
    let scanned: BTreeSet<String> = run_scan(&config)
        .files
        .into_iter()
        .map(|f| f.rel_path)
        .collect();
    let run = run_all(&config);
    assert_eq!(run.summary.file_count, scanned.len());
    for node in run.graph.nodes() {
        assert!(scanned.contains(&node.file), "{} not among scanned files", node.file);
    }
}

#[test]
fn warnings_are_collected_not_fatal() {
    let run = run_all(&fixture_config("python_simple", "python"));
    assert_eq!(run.summary.node_count, 6);
    assert_eq!(run.summary.warnings.len(), 1);
}

#[test]
fn empty_codebase_completes_with_zero_counts() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_all(&AnalysisConfig::new(dir.path(), "java"));
    assert_eq!(run.summary.file_count, 0);
    assert_eq!(run.summary.node_count, 0);
    assert_eq!(run.summary.cluster_count, 0);
}

#[test]
fn fatal_errors_propagate() {
    let dir = tempfile::tempdir().unwrap();
    let missing = AnalysisConfig::new(dir.path().join("missing"), "java");
    assert!(matches!(
        run_pipeline(&missing, None, &CancelToken::new()),
        Err(AnalysisError::PathNotFound(_))
    ));
    let unknown = AnalysisConfig::new(dir.path(), "klingon");
    assert!(matches!(
        run_pipeline(&unknown, None, &CancelToken::new()),
        Err(AnalysisError::UnsupportedLanguage(_))
    ));
}

#[test]
fn cancelling_mid_run_returns_cancelled() {
    let config = fixture_config("go_simple", "go");
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let progress: ProgressCallback = Box::new(move |phase, _| {
        if phase == "calls" {
            trigger.cancel();
        }
    });
    assert!(matches!(
        run_pipeline(&config, Some(progress), &cancel),
        Err(AnalysisError::Cancelled)
    ));
}

#[test]
fn snapshot_export_is_stable() {
    let run = run_all(&fixture_config("rust_simple", "rust"));
    let first = build_snapshot(&run.graph);
    let second = build_snapshot(&run.graph);
    assert_eq!(first, second);

    let ids: Vec<&str> = first.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(first.links.len(), 5);
}

#[test]
fn report_round_trips_through_json_file() {
    let config = fixture_config("java_simple", "java");
    let run = run_all(&config);
    let report = build_report(&config, &run.graph, &run.clusters, &run.summary);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("java_simple.codearc.json");
    write_output(&report, &path).unwrap();

    let parsed: AnalysisReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed.nodes.len(), 10);
    assert_eq!(parsed.links.len(), 8);
    assert_eq!(parsed.clusters.len(), run.clusters.len());
    assert_eq!(parsed.metadata["language"], serde_json::json!("java"));
    assert_eq!(parsed.stats["functions"], serde_json::json!(10));
    let member_total: usize = parsed.clusters.iter().map(|c| c.node_count).sum();
    assert_eq!(member_total, 10);
}
