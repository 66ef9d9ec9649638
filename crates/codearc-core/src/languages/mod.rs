//! Language analyser trait, registry, and the shared declaration walker.

use std::collections::{BTreeSet, HashSet};

use tree_sitter::{Node, Parser, Tree};

use crate::config::{CallRef, FunctionDecl, Language, ParsedFile};

pub mod go_lang;
pub mod java;
pub mod python;
pub mod rust_lang;
pub mod typescript;

/// What an analyser reports about a node that declares a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHeader {
    pub name: String,
    /// Parameter list text as written, including delimiters.
    pub params: String,
    /// Scope contributed by the declaration itself (Go method receivers).
    pub receiver: Option<String>,
    /// Byte offset where the header ends and the body begins.
    pub signature_end: usize,
}

/// Trait that all language analysers implement.
pub trait LanguageAnalyser: Send + Sync {
    fn language(&self) -> Language;

    /// Get the tree-sitter grammar for a specific file extension.
    fn get_language_for_ext(&self, ext: &str) -> tree_sitter::Language;

    /// Names that are never recorded as call references.
    fn builtin_exclusions(&self) -> &HashSet<String>;

    /// If `node` declares a named function or method, describe its header.
    fn function_header(&self, node: &Node, source: &[u8]) -> Option<FunctionHeader>;

    /// If `node` opens a named scope (class, impl block, module), return the name.
    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String>;

    /// If `node` is a call site, return the referenced callee.
    fn call_ref(&self, node: &Node, source: &[u8]) -> Option<CallRef>;
}

/// Registry mapping languages to analysers.
pub struct AnalyserRegistry {
    analysers: Vec<Box<dyn LanguageAnalyser>>,
}

impl AnalyserRegistry {
    pub fn new() -> Self {
        let analysers: Vec<Box<dyn LanguageAnalyser>> = vec![
            Box::new(java::JavaAnalyser::new()),
            Box::new(python::PythonAnalyser::new()),
            Box::new(rust_lang::RustAnalyser::new()),
            Box::new(go_lang::GoAnalyser::new()),
            Box::new(typescript::TypeScriptAnalyser::typescript()),
            Box::new(typescript::TypeScriptAnalyser::javascript()),
        ];
        Self { analysers }
    }

    pub fn get(&self, language: Language) -> Option<&dyn LanguageAnalyser> {
        self.analysers
            .iter()
            .find(|a| a.language() == language)
            .map(|a| a.as_ref())
    }
}

impl Default for AnalyserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one file's text into its declarations.
///
/// Returns `Err(reason)` when the grammar cannot be loaded or the tree contains
/// syntax errors and `tolerate_errors` is false.
pub fn parse_source(
    analyser: &dyn LanguageAnalyser,
    ext: &str,
    file: &str,
    source: &[u8],
    tolerate_errors: bool,
) -> Result<ParsedFile, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&analyser.get_language_for_ext(ext))
        .map_err(|e| format!("grammar unavailable: {e}"))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser produced no tree".to_string())?;

    if tree.root_node().has_error() && !tolerate_errors {
        return Err(first_error_location(&tree));
    }

    Ok(ParsedFile {
        file: file.to_string(),
        functions: extract_functions(analyser, &tree, source),
    })
}

fn first_error_location(tree: &Tree) -> String {
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return format!("syntax error at line {}", node.start_position().row + 1);
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                if child.has_error() || child.is_missing() {
                    stack.push(child);
                }
            }
        }
    }
    "syntax error".to_string()
}

/// Extract every function declaration in source order.
pub fn extract_functions(
    analyser: &dyn LanguageAnalyser,
    tree: &Tree,
    source: &[u8],
) -> Vec<FunctionDecl> {
    let mut functions = Vec::new();
    let mut scope = Vec::new();
    walk_node(analyser, &tree.root_node(), source, &mut scope, &mut functions);
    functions
}

fn walk_node(
    analyser: &dyn LanguageAnalyser,
    node: &Node,
    source: &[u8],
    scope: &mut Vec<String>,
    functions: &mut Vec<FunctionDecl>,
) {
    for i in 0..node.child_count() {
        let child = match node.child(i) {
            Some(c) => c,
            None => continue,
        };

        if let Some(header) = analyser.function_header(&child, source) {
            let mut full_scope = scope.clone();
            if let Some(ref receiver) = header.receiver {
                full_scope.push(receiver.clone());
            }

            let mut calls = CallSets::default();
            find_calls(analyser, &child, source, &mut calls);

            functions.push(FunctionDecl {
                name: header.name.clone(),
                scope: (!full_scope.is_empty()).then(|| full_scope.join(".")),
                signature: signature_text(source, child.start_byte(), header.signature_end),
                params: normalise_whitespace(&header.params),
                start_line: child.start_position().row + 1,
                end_line: child.end_position().row + 1,
                byte_range: (child.start_byte(), child.end_byte()),
                code: node_text(&child, source).to_string(),
                calls: calls.user,
                builtin_calls: calls.builtin,
            });

            // Nested declarations live in the function's own scope
            full_scope.push(header.name);
            walk_node(analyser, &child, source, &mut full_scope, functions);
        } else if let Some(name) = analyser.scope_name(&child, source) {
            scope.push(name);
            walk_node(analyser, &child, source, scope, functions);
            scope.pop();
        } else {
            walk_node(analyser, &child, source, scope, functions);
        }
    }
}

#[derive(Default)]
struct CallSets {
    user: BTreeSet<CallRef>,
    builtin: BTreeSet<CallRef>,
}

/// Collect call references under `node`, stopping at nested declarations.
fn find_calls(analyser: &dyn LanguageAnalyser, node: &Node, source: &[u8], calls: &mut CallSets) {
    let exclusions = analyser.builtin_exclusions();
    for i in 0..node.child_count() {
        let child = match node.child(i) {
            Some(c) => c,
            None => continue,
        };
        if analyser.function_header(&child, source).is_some() {
            continue;
        }
        if let Some(call) = analyser.call_ref(&child, source) {
            match classify(&call, exclusions) {
                Exclusion::Library => {}
                Exclusion::BareName => {
                    calls.builtin.insert(call);
                }
                Exclusion::None => {
                    calls.user.insert(call);
                }
            }
        }
        find_calls(analyser, &child, source, calls);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Exclusion {
    None,
    /// Only the bare name is listed; a declared function may still own it.
    BareName,
    /// `qualifier.name` is listed, so the call is always a library call.
    Library,
}

fn classify(call: &CallRef, exclusions: &HashSet<String>) -> Exclusion {
    if let Some(ref q) = call.qualifier {
        if exclusions.contains(&format!("{q}.{}", call.name))
            || exclusions.contains(&format!("{q}::{}", call.name))
        {
            return Exclusion::Library;
        }
    }
    if exclusions.contains(&call.name) {
        Exclusion::BareName
    } else {
        Exclusion::None
    }
}

fn signature_text(source: &[u8], start: usize, end: usize) -> String {
    let end = end.clamp(start, source.len());
    let raw = String::from_utf8_lossy(&source[start..end]);
    let text = normalise_whitespace(&raw);
    let text = text.trim_end_matches(|c: char| c == '{' || c == ':' || c.is_whitespace());
    text.strip_suffix("=>").unwrap_or(text).trim_end().to_string()
}

/// Collapse runs of whitespace into single spaces.
pub fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, source).to_string())
}

/// Byte offset where the `body` field starts, or the node end when bodiless.
pub(crate) fn body_start(node: &Node) -> usize {
    node.child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or_else(|| node.end_byte())
}

/// Last dotted or `::`-separated segment of a qualifier expression.
pub(crate) fn last_segment(text: &str) -> String {
    let tail = text.rsplit("::").next().unwrap_or(text);
    let tail = tail.rsplit('.').next().unwrap_or(tail);
    tail.trim().to_string()
}

/// Strip generic arguments and pointer/reference sigils from a type name.
pub(crate) fn bare_type_name(text: &str) -> String {
    let text = text.trim_start_matches(['*', '&']).trim();
    let text = text.strip_prefix("mut ").unwrap_or(text);
    let end = text.find(['<', '[']).unwrap_or(text.len());
    last_segment(&text[..end])
}
