//! Graph snapshots and the JSON analysis report.
//!
//! Everything here is a pure projection of a finished run: the same graph and
//! clusters always produce the same nodes, links and clusters in the same order.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, Cluster, FunctionNode};
use crate::graph::call_graph::CallGraph;
use crate::pipeline::AnalysisSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub id: String,
    pub name: String,
    pub file: String,
    pub scope: Option<String>,
    pub signature: String,
    pub start_line: usize,
    pub end_line: usize,
    pub code: String,
    pub cluster: Option<usize>,
}

impl From<&FunctionNode> for NodeOutput {
    fn from(node: &FunctionNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            file: node.file.clone(),
            scope: node.scope.clone(),
            signature: node.signature.clone(),
            start_line: node.start_line,
            end_line: node.end_line,
            code: node.code.clone(),
            cluster: node.cluster,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutput {
    pub source: String,
    pub target: String,
}

/// `{nodes, links}` view of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeOutput>,
    pub links: Vec<LinkOutput>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutput {
    pub id: usize,
    pub label: String,
    pub members: Vec<String>,
    pub node_count: usize,
    pub cohesion: f64,
}

/// Full export: metadata, stats, the graph and its clusters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub version: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub stats: BTreeMap<String, serde_json::Value>,
    pub nodes: Vec<NodeOutput>,
    pub links: Vec<LinkOutput>,
    pub clusters: Vec<ClusterOutput>,
}

/// Project a graph into nodes sorted by id and links sorted by (source, target).
pub fn build_snapshot(graph: &CallGraph) -> GraphSnapshot {
    GraphSnapshot {
        nodes: graph.nodes().into_iter().map(NodeOutput::from).collect(),
        links: graph
            .edges()
            .into_iter()
            .map(|(source, target)| LinkOutput { source, target })
            .collect(),
    }
}

pub fn build_clusters(clusters: &[Cluster]) -> Vec<ClusterOutput> {
    let mut out: Vec<ClusterOutput> = clusters
        .iter()
        .map(|c| {
            let mut members = c.members.clone();
            members.sort();
            ClusterOutput {
                id: c.id,
                label: c.label.clone(),
                node_count: members.len(),
                members,
                cohesion: c.cohesion,
            }
        })
        .collect();
    out.sort_by_key(|c| c.id);
    out
}

/// Try to get the current git commit hash (first 12 chars).
fn get_commit_hash(root: &Path) -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Some(hash[..hash.len().min(12)].to_string())
            } else {
                None
            }
        })
}

/// Build the report for a finished run.
pub fn build_report(
    config: &AnalysisConfig,
    graph: &CallGraph,
    clusters: &[Cluster],
    summary: &AnalysisSummary,
) -> AnalysisReport {
    let root = config
        .root
        .canonicalize()
        .unwrap_or_else(|_| config.root.clone());
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut metadata = BTreeMap::new();
    metadata.insert("root_name".to_string(), serde_json::json!(root_name));
    metadata.insert(
        "root_path".to_string(),
        serde_json::json!(root.to_string_lossy()),
    );
    metadata.insert("language".to_string(), serde_json::json!(config.language));
    metadata.insert(
        "analysed_at".to_string(),
        serde_json::json!(Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "codearc_version".to_string(),
        serde_json::json!(env!("CARGO_PKG_VERSION")),
    );
    metadata.insert(
        "commit_hash".to_string(),
        get_commit_hash(&root).map_or(serde_json::Value::Null, serde_json::Value::String),
    );
    metadata.insert(
        "analysis_duration_ms".to_string(),
        serde_json::json!(summary.duration_ms),
    );
    metadata.insert(
        "phase_timings".to_string(),
        serde_json::to_value(&summary.phase_timings).unwrap_or_default(),
    );

    let mut stats = BTreeMap::new();
    stats.insert("files".to_string(), serde_json::json!(summary.file_count));
    stats.insert("functions".to_string(), serde_json::json!(graph.node_count()));
    stats.insert("calls".to_string(), serde_json::json!(graph.edge_count()));
    stats.insert("clusters".to_string(), serde_json::json!(clusters.len()));
    stats.insert(
        "warnings".to_string(),
        serde_json::json!(summary.warnings.len()),
    );

    let snapshot = build_snapshot(graph);
    AnalysisReport {
        version: "1.0".to_string(),
        metadata,
        stats,
        nodes: snapshot.nodes,
        links: snapshot.links,
        clusters: build_clusters(clusters),
    }
}

/// Write the report as pretty JSON, creating parent directories as needed.
pub fn write_output(report: &AnalysisReport, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Default report location: `<root-name>.codearc.json` in the working directory.
pub fn default_output_path(root: &Path) -> std::path::PathBuf {
    let name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "codearc".to_string());
    std::path::PathBuf::from(format!("{name}.codearc.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: &str, cluster: usize) -> FunctionNode {
        FunctionNode {
            id: id.to_string(),
            name: id.to_string(),
            file: "m.go".to_string(),
            scope: None,
            signature: format!("func {id}()"),
            start_line: 1,
            end_line: 3,
            code: String::new(),
            cluster: Some(cluster),
        }
    }

    fn sample() -> (CallGraph, Vec<Cluster>) {
        let mut g = CallGraph::new();
        for id in ["b", "a", "c"] {
            g.add_function(node(id, 0));
        }
        g.add_call("b", "a");
        g.add_call("a", "c");
        let clusters = vec![Cluster {
            id: 0,
            label: "M".to_string(),
            members: vec!["c".to_string(), "a".to_string(), "b".to_string()],
            cohesion: 1.0,
        }];
        (g, clusters)
    }

    #[test]
    fn snapshot_is_sorted_and_stable() {
        let (g, _) = sample();
        let snap = build_snapshot(&g);
        let ids: Vec<_> = snap.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            snap.links,
            vec![
                LinkOutput {
                    source: "a".to_string(),
                    target: "c".to_string()
                },
                LinkOutput {
                    source: "b".to_string(),
                    target: "a".to_string()
                },
            ]
        );
        assert_eq!(snap, build_snapshot(&g));
    }

    #[test]
    fn empty_graph_gives_empty_snapshot() {
        let snap = build_snapshot(&CallGraph::new());
        assert_eq!(snap, GraphSnapshot::empty());
        assert!(snap.is_empty());
    }

    #[test]
    fn cluster_members_are_sorted_with_counts() {
        let (_, clusters) = sample();
        let out = build_clusters(&clusters);
        assert_eq!(out[0].members, vec!["a", "b", "c"]);
        assert_eq!(out[0].node_count, 3);
    }

    #[test]
    fn report_carries_metadata_and_stats() {
        let (g, clusters) = sample();
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::new(dir.path(), "go");
        let summary = AnalysisSummary {
            file_count: 1,
            node_count: 3,
            edge_count: 2,
            cluster_count: 1,
            ..Default::default()
        };
        let report = build_report(&config, &g, &clusters, &summary);

        for key in ["root_name", "language", "analysed_at", "codearc_version", "phase_timings"] {
            assert!(report.metadata.contains_key(key), "Missing metadata key: {key}");
        }
        assert_eq!(report.stats["functions"], serde_json::json!(3));
        assert_eq!(report.stats["calls"], serde_json::json!(2));
        assert_eq!(report.links.len(), 2);
    }

    #[test]
    fn report_keys_serialise_in_sorted_order() {
        let (g, clusters) = sample();
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::new(dir.path(), "go");
        let report = build_report(&config, &g, &clusters, &AnalysisSummary::default());

        let value = serde_json::to_value(&report).unwrap();
        let stat_keys: Vec<&String> = value["stats"].as_object().unwrap().keys().collect();
        assert_eq!(stat_keys, vec!["calls", "clusters", "files", "functions", "warnings"]);

        let text = serde_json::to_string(&report).unwrap();
        let analysed_at = text.find("\"analysed_at\"").unwrap();
        let root_path = text.find("\"root_path\"").unwrap();
        assert!(analysed_at < root_path);
    }

    #[test]
    fn write_output_creates_parent_dirs() {
        let (g, clusters) = sample();
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::new(dir.path(), "go");
        let report = build_report(&config, &g, &clusters, &AnalysisSummary::default());
        let path = dir.path().join("out").join("report.json");

        write_output(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: AnalysisReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.nodes, report.nodes);
        assert_eq!(parsed.clusters, report.clusters);
    }
}
