//! Phase 2: parse every scanned file into function declarations and call references.

use log::{debug, warn};
use rayon::prelude::*;

use crate::config::{AnalysisConfig, Language, ParsedFile};
use crate::error::{AnalysisError, Result, Warning};
use crate::languages::{parse_source, AnalyserRegistry};
use crate::phases::scan::SourceFile;
use crate::pipeline::CancelToken;

#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// One entry per successfully parsed file, in scan order.
    pub files: Vec<ParsedFile>,
    pub warnings: Vec<Warning>,
}

enum FileOutcome {
    Parsed(ParsedFile),
    Failed(Warning),
    Skipped,
}

/// Run the parsing phase. Files are parsed in parallel; a bad file only costs a warning.
pub fn run_parsing_phase(
    config: &AnalysisConfig,
    language: Language,
    files: &[SourceFile],
    cancel: &CancelToken,
) -> Result<ParseOutcome> {
    let registry = AnalyserRegistry::new();
    let analyser = registry
        .get(language)
        .ok_or_else(|| AnalysisError::UnsupportedLanguage(language.to_string()))?;

    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|file| {
            if cancel.is_cancelled() {
                return FileOutcome::Skipped;
            }
            let size = std::fs::metadata(&file.abs_path).map(|m| m.len()).unwrap_or(0);
            if size > config.max_file_size {
                return FileOutcome::Failed(Warning::ParseFailure {
                    file: file.rel_path.clone(),
                    reason: format!("file size {size} exceeds {} bytes", config.max_file_size),
                });
            }
            let source = match std::fs::read(&file.abs_path) {
                Ok(s) => s,
                Err(e) => {
                    return FileOutcome::Failed(Warning::ParseFailure {
                        file: file.rel_path.clone(),
                        reason: e.to_string(),
                    })
                }
            };
            match parse_source(
                analyser,
                file.extension(),
                &file.rel_path,
                &source,
                config.tolerate_syntax_errors,
            ) {
                Ok(parsed) => {
                    debug!(
                        "Parsed {} ({} functions)",
                        file.rel_path,
                        parsed.functions.len()
                    );
                    FileOutcome::Parsed(parsed)
                }
                Err(reason) => FileOutcome::Failed(Warning::ParseFailure {
                    file: file.rel_path.clone(),
                    reason,
                }),
            }
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    let mut outcome = ParseOutcome::default();
    for item in outcomes {
        match item {
            FileOutcome::Parsed(parsed) => outcome.files.push(parsed),
            FileOutcome::Failed(warning) => {
                warn!("{warning}");
                outcome.warnings.push(warning);
            }
            FileOutcome::Skipped => {}
        }
    }
    Ok(outcome)
}
