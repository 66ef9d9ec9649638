//! Core data types and configuration for codearc analysis.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Source language selected for a run. One grammar per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
    Rust,
    Go,
    TypeScript,
    JavaScript,
}

impl Language {
    /// Resolve a user-supplied tag (case-insensitive, with short aliases).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "java" => Some(Self::Java),
            "python" | "py" => Some(Self::Python),
            "rust" | "rs" => Some(Self::Rust),
            "go" | "golang" => Some(Self::Go),
            "typescript" | "ts" => Some(Self::TypeScript),
            "javascript" | "js" => Some(Self::JavaScript),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
        }
    }

    /// File extensions (without the dot) scanned for this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Java => &["java"],
            Self::Python => &["py"],
            Self::Rust => &["rs"],
            Self::Go => &["go"],
            Self::TypeScript => &["ts", "tsx"],
            Self::JavaScript => &["js", "jsx", "mjs", "cjs"],
        }
    }

    pub fn all() -> &'static [Language] {
        &[
            Self::Java,
            Self::Python,
            Self::Rust,
            Self::Go,
            Self::TypeScript,
            Self::JavaScript,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw call reference found inside a function body: the callee name plus
/// the qualifier written in front of it, if any (`obj.run()` -> `obj`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallRef {
    pub name: String,
    pub qualifier: Option<String>,
}

impl CallRef {
    pub fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            qualifier: None,
        }
    }

    pub fn qualified(qualifier: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            qualifier: Some(qualifier.to_string()),
        }
    }
}

/// One function or method declaration as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Enclosing containers joined with `.`, e.g. `Outer.Inner`.
    pub scope: Option<String>,
    pub signature: String,
    pub params: String,
    pub start_line: usize,
    pub end_line: usize,
    pub byte_range: (usize, usize),
    pub code: String,
    pub calls: BTreeSet<CallRef>,
    /// Calls whose name is on the language's builtin list. They link only
    /// when a declared function resolves them and are otherwise dropped
    /// without a warning.
    #[serde(default)]
    pub builtin_calls: BTreeSet<CallRef>,
}

/// Parse result for one file. Functions are in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Path relative to the scan root, `/`-separated.
    pub file: String,
    pub functions: Vec<FunctionDecl>,
}

/// Durable graph vertex. Only `code` and `cluster` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
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

impl FunctionNode {
    pub fn from_decl(id: String, file: &str, decl: &FunctionDecl) -> Self {
        Self {
            id,
            name: decl.name.clone(),
            file: file.to_string(),
            scope: decl.scope.clone(),
            signature: decl.signature.clone(),
            start_line: decl.start_line,
            end_line: decl.end_line,
            code: decl.code.clone(),
            cluster: None,
        }
    }
}

/// A detected cluster. Members are sorted node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub label: String,
    pub members: Vec<String>,
    pub cohesion: f64,
}

/// Configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub root: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    #[serde(default = "default_max_cluster_size")]
    pub max_cluster_size: usize,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub tolerate_syntax_errors: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub quiet: bool,
}

fn default_language() -> String {
    "java".to_string()
}

fn default_resolution() -> f64 {
    1.0
}

fn default_max_cluster_size() -> usize {
    50
}

fn default_max_file_size() -> u64 {
    1_000_000
}

impl AnalysisConfig {
    pub fn new(root: impl Into<PathBuf>, language: &str) -> Self {
        Self {
            root: root.into(),
            language: language.to_string(),
            ..Default::default()
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            language: default_language(),
            resolution: default_resolution(),
            max_cluster_size: default_max_cluster_size(),
            exclude_patterns: Vec::new(),
            max_file_size: default_max_file_size(),
            tolerate_syntax_errors: false,
            verbose: false,
            quiet: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tags_are_case_insensitive() {
        assert_eq!(Language::from_tag("Java"), Some(Language::Java));
        assert_eq!(Language::from_tag("PY"), Some(Language::Python));
        assert_eq!(Language::from_tag(" golang "), Some(Language::Go));
        assert_eq!(Language::from_tag("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_tag("cobol"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn every_language_round_trips_through_its_tag() {
        for lang in Language::all() {
            assert_eq!(Language::from_tag(lang.as_str()), Some(*lang));
            assert!(!lang.extensions().is_empty());
        }
    }

    #[test]
    fn analysis_config_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.language, "java");
        assert_eq!(cfg.resolution, 1.0);
        assert_eq!(cfg.max_cluster_size, 50);
        assert_eq!(cfg.max_file_size, 1_000_000);
        assert!(!cfg.tolerate_syntax_errors);
    }

    #[test]
    fn config_deserialises_with_field_defaults() {
        let cfg: AnalysisConfig = serde_json::from_str(r#"{"root": "/tmp/x"}"#).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/tmp/x"));
        assert_eq!(cfg.language, "java");
        assert_eq!(cfg.max_cluster_size, 50);
        assert!(cfg.exclude_patterns.is_empty());
    }

    #[test]
    fn call_refs_order_by_name_then_qualifier() {
        let mut set = BTreeSet::new();
        set.insert(CallRef::qualified("b", "run"));
        set.insert(CallRef::bare("run"));
        set.insert(CallRef::bare("alpha"));
        let names: Vec<_> = set.iter().map(|c| (c.name.as_str(), c.qualifier.as_deref())).collect();
        assert_eq!(
            names,
            vec![("alpha", None), ("run", None), ("run", Some("b"))]
        );
    }

    #[test]
    fn language_serialises_lowercase() {
        let json = serde_json::to_string(&Language::TypeScript).unwrap();
        assert_eq!(json, "\"typescript\"");
    }
}
