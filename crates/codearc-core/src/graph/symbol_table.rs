//! Function lookup indexes used during call resolution.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Lightweight record of a declared function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub node_id: String,
    pub name: String,
    pub file: String,
    pub scope: Option<String>,
}

impl FunctionDefinition {
    /// Whether a call qualifier such as `repo`, `helpers` or `pkg.Store` names this
    /// function's container (innermost scope, file stem or directory). Case-insensitive,
    /// so a `repo` field matches a `Repo` class.
    pub fn matches_qualifier(&self, qualifier: &str) -> bool {
        let tail = qualifier.rsplit("::").next().unwrap_or(qualifier);
        let tail = tail.rsplit('.').next().unwrap_or(tail);
        if tail.is_empty() {
            return false;
        }
        if let Some(ref scope) = self.scope {
            if scope
                .rsplit('.')
                .next()
                .is_some_and(|s| s.eq_ignore_ascii_case(tail))
            {
                return true;
            }
        }
        let path = Path::new(&self.file);
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case(tail));
        let dir_matches = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|d| d.to_str())
            .is_some_and(|d| d.eq_ignore_ascii_case(tail));
        stem_matches || dir_matches
    }
}

/// Three indexes over the same definitions:
///
/// - `scope_index`: (file, scope) → name → defs
/// - `file_index`: file → name → defs
/// - `global_index`: name → defs
///
/// Definitions within each bucket are kept sorted by node id.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scope_index: HashMap<(String, Option<String>), HashMap<String, Vec<FunctionDefinition>>>,
    file_index: HashMap<String, HashMap<String, Vec<FunctionDefinition>>>,
    global_index: BTreeMap<String, Vec<FunctionDefinition>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: FunctionDefinition) {
        insert_sorted(
            self.scope_index
                .entry((def.file.clone(), def.scope.clone()))
                .or_default()
                .entry(def.name.clone())
                .or_default(),
            def.clone(),
        );
        insert_sorted(
            self.file_index
                .entry(def.file.clone())
                .or_default()
                .entry(def.name.clone())
                .or_default(),
            def.clone(),
        );
        insert_sorted(self.global_index.entry(def.name.clone()).or_default(), def);
    }

    /// Functions named `name` declared in the same file and scope.
    pub fn lookup_scope(&self, file: &str, scope: Option<&str>, name: &str) -> &[FunctionDefinition] {
        self.scope_index
            .get(&(file.to_string(), scope.map(str::to_string)))
            .and_then(|names| names.get(name))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Functions named `name` declared anywhere in `file`.
    pub fn lookup_file(&self, file: &str, name: &str) -> &[FunctionDefinition] {
        self.file_index
            .get(file)
            .and_then(|names| names.get(name))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Every function named `name` in the program.
    pub fn lookup_global(&self, name: &str) -> &[FunctionDefinition] {
        self.global_index
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.global_index.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.global_index.is_empty()
    }
}

fn insert_sorted(bucket: &mut Vec<FunctionDefinition>, def: FunctionDefinition) {
    let pos = bucket
        .binary_search_by(|d| d.node_id.cmp(&def.node_id))
        .unwrap_or_else(|p| p);
    bucket.insert(pos, def);
}
