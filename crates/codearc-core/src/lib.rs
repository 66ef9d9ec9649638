//! Codearc Core: call-graph analysis engine.
//!
//! This crate holds the whole analysis: directory scanning, tree-sitter parsing,
//! call resolution, Louvain clustering, ripple queries, JSON export, and the
//! session object that owns the published snapshot.

pub mod config;
pub mod error;
pub mod graph;
pub mod languages;
pub mod output;
pub mod phases;
pub mod pipeline;
pub mod ripple;
pub mod session;

pub use config::{AnalysisConfig, Cluster, FunctionNode, Language};
pub use error::{AnalysisError, Result, Warning};
pub use pipeline::{AnalysisSummary, CancelToken};
pub use session::{AnalysisSession, RunState};
