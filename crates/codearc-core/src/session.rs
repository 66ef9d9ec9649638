//! The analysis session: run state machine plus the published snapshot.
//!
//! One writer at a time (a run publishing, or `update_code`), any number of
//! concurrent readers. Graph and clusters live in one slot and are swapped
//! together, so readers never see a graph from one run next to clusters from
//! another. No method holds two of the locks below at once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, Cluster};
use crate::error::{AnalysisError, Result};
use crate::graph::call_graph::CallGraph;
use crate::output::{self, AnalysisReport, ClusterOutput, GraphSnapshot};
use crate::pipeline::{self, AnalysisSummary, CancelToken, ProgressCallback};
use crate::ripple::{self, RippleReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Idle,
    Processing,
    Ready,
    Error,
}

/// A published run.
#[derive(Debug)]
struct Snapshot {
    config: AnalysisConfig,
    graph: CallGraph,
    clusters: Vec<Cluster>,
    summary: AnalysisSummary,
}

#[derive(Debug)]
pub struct AnalysisSession {
    state: Mutex<RunState>,
    snapshot: RwLock<Option<Snapshot>>,
    active: Mutex<Option<CancelToken>>,
    last_error: Mutex<Option<String>>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Idle),
            snapshot: RwLock::new(None),
            active: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Message of the most recent fatal run error, if the last run failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Run the pipeline on the calling thread and publish the result.
    pub fn begin_analysis(&self, config: AnalysisConfig) -> Result<AnalysisSummary> {
        self.begin_analysis_with_progress(config, None)
    }

    pub fn begin_analysis_with_progress(
        &self,
        config: AnalysisConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<AnalysisSummary> {
        let (token, previous) = self.start()?;
        self.execute(config, progress, token, previous)
    }

    /// Start a run on a background thread.
    ///
    /// The state transition happens before this returns, so a concurrent run is
    /// reported as `AlreadyProcessing` here rather than from the thread.
    pub fn spawn_analysis(
        self: &Arc<Self>,
        config: AnalysisConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<JoinHandle<Result<AnalysisSummary>>> {
        let (token, previous) = self.start()?;
        let session = Arc::clone(self);
        Ok(std::thread::spawn(move || {
            session.execute(config, progress, token, previous)
        }))
    }

    /// Ask the active run to stop. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(token) => {
                info!("Cancelling active run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Enter `Processing`, remembering the state to restore on cancellation.
    fn start(&self) -> Result<(CancelToken, RunState)> {
        let previous = {
            let mut state = self.state.lock();
            if *state == RunState::Processing {
                return Err(AnalysisError::AlreadyProcessing);
            }
            std::mem::replace(&mut *state, RunState::Processing)
        };
        let token = CancelToken::new();
        *self.active.lock() = Some(token.clone());
        Ok((token, previous))
    }

    fn execute(
        &self,
        config: AnalysisConfig,
        progress: Option<ProgressCallback>,
        token: CancelToken,
        previous: RunState,
    ) -> Result<AnalysisSummary> {
        let result = pipeline::run_pipeline(&config, progress, &token);
        *self.active.lock() = None;

        match result {
            Ok(run) => {
                let summary = run.summary.clone();
                *self.snapshot.write() = Some(Snapshot {
                    config,
                    graph: run.graph,
                    clusters: run.clusters,
                    summary: run.summary,
                });
                *self.last_error.lock() = None;
                *self.state.lock() = RunState::Ready;
                Ok(summary)
            }
            Err(AnalysisError::Cancelled) => {
                info!("Run cancelled, keeping previous snapshot");
                *self.state.lock() = previous;
                Err(AnalysisError::Cancelled)
            }
            Err(e) => {
                warn!("Analysis failed: {e}");
                *self.last_error.lock() = Some(e.to_string());
                *self.state.lock() = RunState::Error;
                Err(e)
            }
        }
    }

    /// Nodes and links of the published graph, or an empty snapshot.
    pub fn get_graph_snapshot(&self) -> GraphSnapshot {
        self.snapshot
            .read()
            .as_ref()
            .map(|s| output::build_snapshot(&s.graph))
            .unwrap_or_default()
    }

    pub fn get_clusters(&self) -> Vec<ClusterOutput> {
        self.snapshot
            .read()
            .as_ref()
            .map(|s| output::build_clusters(&s.clusters))
            .unwrap_or_default()
    }

    pub fn last_summary(&self) -> Option<AnalysisSummary> {
        self.snapshot.read().as_ref().map(|s| s.summary.clone())
    }

    /// Full JSON report of the published run, built after the read lock is
    /// released.
    pub fn report(&self) -> Option<AnalysisReport> {
        let (config, graph, clusters, summary) = {
            let guard = self.snapshot.read();
            let s = guard.as_ref()?;
            (
                s.config.clone(),
                s.graph.clone(),
                s.clusters.clone(),
                s.summary.clone(),
            )
        };
        Some(output::build_report(&config, &graph, &clusters, &summary))
    }

    /// Replace a function's code and return its direct callers.
    pub fn update_code(&self, node_id: &str, code: &str) -> Result<RippleReport> {
        let mut guard = self.snapshot.write();
        let snapshot = guard.as_mut().ok_or_else(no_snapshot)?;
        ripple::update_code(&mut snapshot.graph, node_id, code)
    }

    pub fn predecessors(&self, node_id: &str) -> Result<Vec<String>> {
        self.with_graph(|g| ripple::direct_callers(g, node_id))
    }

    pub fn successors(&self, node_id: &str) -> Result<Vec<String>> {
        self.with_graph(|g| ripple::direct_callees(g, node_id))
    }

    pub fn impact_radius(&self, node_id: &str, max_depth: usize) -> Result<BTreeMap<String, usize>> {
        self.with_graph(|g| ripple::impact_radius(g, node_id, max_depth))
    }

    fn with_graph<T>(&self, f: impl FnOnce(&CallGraph) -> Result<T>) -> Result<T> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref().ok_or_else(no_snapshot)?;
        f(&snapshot.graph)
    }
}

fn no_snapshot() -> AnalysisError {
    AnalysisError::InvalidState("no analysis has completed yet".to_string())
}
