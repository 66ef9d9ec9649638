//! Phase 3: merge parse results into one call graph and resolve call references.
//!
//! Resolution precedence, first match wins:
//!   1. functions with that name in the caller's file and scope
//!   2. functions with that name anywhere in the caller's file
//!   3. exactly one function with that name in the whole program
//!
//! Anything else is dropped with an `UnresolvedReference` warning, except
//! calls on the language's builtin list, which are dropped silently.

use std::collections::HashMap;

use log::debug;

use crate::config::{CallRef, FunctionDecl, FunctionNode, ParsedFile};
use crate::error::Warning;
use crate::graph::call_graph::CallGraph;
use crate::graph::symbol_table::{FunctionDefinition, SymbolTable};

/// Qualifiers that refer to the caller's own type or module.
const SELF_QUALIFIERS: &[&str] = &["this", "self", "Self", "cls", "super"];

#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub graph: CallGraph,
    pub warnings: Vec<Warning>,
}

/// Build a node id: `<file>::<scope.>name<params>`.
pub fn function_id(file: &str, decl: &FunctionDecl) -> String {
    match decl.scope {
        Some(ref scope) => format!("{file}::{scope}.{}{}", decl.name, decl.params),
        None => format!("{file}::{}{}", decl.name, decl.params),
    }
}

/// Run the calls phase. The result does not depend on the order of `parsed`.
pub fn run_calls_phase(mut parsed: Vec<ParsedFile>) -> BuildOutcome {
    parsed.sort_by(|a, b| a.file.cmp(&b.file));

    // Assign ids per file in source order; collisions get a `#n` suffix
    let mut entries: Vec<(String, &str, &FunctionDecl)> = Vec::new();
    for file in &parsed {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for decl in &file.functions {
            let base = function_id(&file.file, decl);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let id = if *count == 1 {
                base
            } else {
                format!("{base}#{count}")
            };
            entries.push((id, file.file.as_str(), decl));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut graph = CallGraph::new();
    let mut st = SymbolTable::new();
    for (id, file, decl) in &entries {
        graph.add_function(FunctionNode::from_decl(id.clone(), file, decl));
        st.add(FunctionDefinition {
            node_id: id.clone(),
            name: decl.name.clone(),
            file: file.to_string(),
            scope: decl.scope.clone(),
        });
    }

    let mut warnings = Vec::new();
    for (id, file, decl) in &entries {
        for call in &decl.calls {
            match resolve_call(&st, file, decl.scope.as_deref(), call) {
                Ok(targets) => {
                    for target in &targets {
                        graph.add_call(id, target);
                    }
                }
                Err(candidates) => {
                    debug!("Unresolved call {} from {id} ({candidates} candidates)", call.name);
                    warnings.push(Warning::UnresolvedReference {
                        caller: id.clone(),
                        callee: display_call(call),
                        candidates,
                    });
                }
            }
        }
        for call in &decl.builtin_calls {
            match resolve_call(&st, file, decl.scope.as_deref(), call) {
                Ok(targets) => {
                    for target in &targets {
                        graph.add_call(id, target);
                    }
                }
                Err(_) => debug!("Dropped builtin call {} from {id}", display_call(call)),
            }
        }
    }

    BuildOutcome { graph, warnings }
}

/// Resolve one call reference to target node ids.
///
/// `Err(n)` carries the number of same-named functions in the program, so
/// zero means "no such function" and more than one means "ambiguous".
pub fn resolve_call(
    st: &SymbolTable,
    file: &str,
    scope: Option<&str>,
    call: &CallRef,
) -> Result<Vec<String>, usize> {
    let qualifier = call
        .qualifier
        .as_deref()
        .filter(|q| !SELF_QUALIFIERS.contains(q));

    // A real qualifier first narrows every tier; if it names nothing we know,
    // it is most likely a variable and the plain chain applies
    if let Some(q) = qualifier {
        if let Ok(ids) = resolve_tiers(st, file, scope, &call.name, Some(q)) {
            return Ok(ids);
        }
    }
    resolve_tiers(st, file, scope, &call.name, None)
}

fn resolve_tiers(
    st: &SymbolTable,
    file: &str,
    scope: Option<&str>,
    name: &str,
    qualifier: Option<&str>,
) -> Result<Vec<String>, usize> {
    let keep = |d: &&FunctionDefinition| qualifier.map_or(true, |q| d.matches_qualifier(q));

    let same_scope: Vec<String> = st
        .lookup_scope(file, scope, name)
        .iter()
        .filter(keep)
        .map(|d| d.node_id.clone())
        .collect();
    if !same_scope.is_empty() {
        return Ok(same_scope);
    }

    let same_file: Vec<String> = st
        .lookup_file(file, name)
        .iter()
        .filter(keep)
        .map(|d| d.node_id.clone())
        .collect();
    if !same_file.is_empty() {
        return Ok(same_file);
    }

    let global: Vec<&FunctionDefinition> = st.lookup_global(name).iter().filter(keep).collect();
    match global.as_slice() {
        [only] => Ok(vec![only.node_id.clone()]),
        _ => Err(st.lookup_global(name).len()),
    }
}

fn display_call(call: &CallRef) -> String {
    match call.qualifier {
        Some(ref q) => format!("{q}.{}", call.name),
        None => call.name.clone(),
    }
}
