//! Sequential phase orchestrator with timing and cooperative cancellation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, Cluster};
use crate::error::{AnalysisError, Result, Warning};
use crate::graph::call_graph::CallGraph;
use crate::phases;

/// Phase labels for progress reporting.
const PHASE_LABELS: &[(&str, &str)] = &[
    ("scan", "Scanning source files"),
    ("parsing", "Parsing source files"),
    ("calls", "Building call graph"),
    ("communities", "Detecting clusters"),
];

/// Progress callback type: (phase_name, label).
pub type ProgressCallback = Box<dyn FnMut(&str, &str) + Send>;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Completion report for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub file_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub cluster_count: usize,
    pub warnings: Vec<Warning>,
    /// Seconds spent per phase.
    pub phase_timings: BTreeMap<String, f64>,
    pub duration_ms: f64,
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub graph: CallGraph,
    pub clusters: Vec<Cluster>,
    pub summary: AnalysisSummary,
}

fn phase_label(name: &str) -> &str {
    PHASE_LABELS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, l)| *l)
        .unwrap_or(name)
}

/// Reports progress for each phase, times it, and checks for cancellation first.
struct PhaseRunner<'a> {
    progress: Option<ProgressCallback>,
    cancel: &'a CancelToken,
    timings: BTreeMap<String, f64>,
}

impl PhaseRunner<'_> {
    fn run<T>(&mut self, name: &str, phase: impl FnOnce() -> Result<T>) -> Result<T> {
        if self.cancel.is_cancelled() {
            info!("Run cancelled before {name}");
            return Err(AnalysisError::Cancelled);
        }
        let label = phase_label(name);
        if let Some(ref mut cb) = self.progress {
            cb(name, label);
        }
        info!("{label}");

        let start = Instant::now();
        let out = phase()?;
        self.timings
            .insert(name.to_string(), start.elapsed().as_secs_f64());
        Ok(out)
    }
}

/// Execute scan, parsing, calls and communities and return the finished run.
pub fn run_pipeline(
    config: &AnalysisConfig,
    progress_callback: Option<ProgressCallback>,
    cancel: &CancelToken,
) -> Result<AnalysisRun> {
    let total_start = Instant::now();
    info!(
        "Analysing {} as {}",
        config.root.display(),
        config.language
    );

    let mut runner = PhaseRunner {
        progress: progress_callback,
        cancel,
        timings: BTreeMap::new(),
    };
    let mut warnings: Vec<Warning> = Vec::new();

    let scanned = runner.run("scan", || phases::scan::run_scan_phase(config, cancel))?;
    let language = phases::scan::resolve_language(&config.language)?;
    warnings.extend(scanned.warnings);
    let file_count = scanned.files.len();

    let parsed = runner.run("parsing", || {
        phases::parsing::run_parsing_phase(config, language, &scanned.files, cancel)
    })?;
    warnings.extend(parsed.warnings);

    let built = runner.run("calls", || Ok(phases::calls::run_calls_phase(parsed.files)))?;
    warnings.extend(built.warnings);
    let mut graph = built.graph;

    let clusters = runner.run("communities", || {
        Ok(phases::communities::run_communities_phase(config, &mut graph))
    })?;

    // Last chance to abandon the run before it is handed out for publishing
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    let duration_ms = total_start.elapsed().as_secs_f64() * 1000.0;
    let summary = AnalysisSummary {
        file_count,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        cluster_count: clusters.len(),
        warnings,
        phase_timings: runner.timings,
        duration_ms: (duration_ms * 10.0).round() / 10.0,
    };
    info!(
        "Finished: {} files, {} functions, {} calls, {} clusters, {} warnings",
        summary.file_count,
        summary.node_count,
        summary.edge_count,
        summary.cluster_count,
        summary.warnings.len()
    );

    Ok(AnalysisRun {
        graph,
        clusters,
        summary,
    })
}
