//! Phase 1: walk the root and collect source files for the selected language.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::config::{AnalysisConfig, Language};
use crate::error::{AnalysisError, Result, Warning};
use crate::pipeline::CancelToken;

/// A file selected for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated.
    pub rel_path: String,
    pub abs_path: PathBuf,
}

impl SourceFile {
    pub fn extension(&self) -> &str {
        self.abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// Sorted by `rel_path`.
    pub files: Vec<SourceFile>,
    pub warnings: Vec<Warning>,
}

/// Resolve the language tag or fail with `UnsupportedLanguage`.
pub fn resolve_language(tag: &str) -> Result<Language> {
    Language::from_tag(tag).ok_or_else(|| AnalysisError::UnsupportedLanguage(tag.to_string()))
}

/// Run the scan phase.
///
/// The language tag is validated before the root is touched. Every file with a
/// matching extension is collected; only names listed in `exclude_patterns`
/// are skipped.
pub fn run_scan_phase(config: &AnalysisConfig, cancel: &CancelToken) -> Result<ScanResult> {
    let language = resolve_language(&config.language)?;
    let root = config.root.as_path();
    if !root.is_dir() {
        return Err(AnalysisError::PathNotFound(root.to_path_buf()));
    }
    if let Err(e) = std::fs::read_dir(root) {
        warn!("Cannot read root {}: {e}", root.display());
        return Err(AnalysisError::PathNotFound(root.to_path_buf()));
    }

    let extensions = language.extensions();
    let exclude_patterns: Vec<&str> = config.exclude_patterns.iter().map(|s| s.as_str()).collect();

    let mut result = ScanResult::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !exclude_patterns.iter().any(|p| name == *p)
        });

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                warn!("Cannot read root {}: {e}", root.display());
                return Err(AnalysisError::PathNotFound(root.to_path_buf()));
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative_path(root, p))
                    .unwrap_or_default();
                warn!("Skipping unreadable entry {path}: {e}");
                result.warnings.push(Warning::SkippedEntry {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let abs_path = entry.path();
        let ext = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !extensions.contains(&ext) {
            continue;
        }

        let rel_path = relative_path(root, abs_path);
        debug!("Found {rel_path}");
        result.files.push(SourceFile {
            rel_path,
            abs_path: abs_path.to_path_buf(),
        });
    }

    // Directory walk order is per-component; the contract is whole-path order
    result.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(result)
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
