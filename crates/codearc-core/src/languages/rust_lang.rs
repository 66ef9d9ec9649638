//! Rust language analyser.

use std::collections::HashSet;
use std::sync::LazyLock;

use tree_sitter::Node;

use super::{bare_type_name, body_start, field_text, node_text, FunctionHeader, LanguageAnalyser};
use crate::config::{CallRef, Language};

static BUILTIN_EXCLUSIONS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        "Some",
        "Ok",
        "Err",
        "Box::new",
        "Vec::new",
        "Vec::with_capacity",
        "String::new",
        "String::from",
        "HashMap::new",
        "HashSet::new",
        "Arc::new",
        "Rc::new",
        "unwrap",
        "expect",
        "unwrap_or",
        "unwrap_or_default",
        "clone",
        "to_string",
        "to_owned",
        "into",
        "iter",
        "into_iter",
        "collect",
        "push",
        "len",
        "is_empty",
        "as_str",
        "as_ref",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub struct RustAnalyser;

impl Default for RustAnalyser {
    fn default() -> Self {
        Self
    }
}

impl RustAnalyser {
    pub fn new() -> Self {
        Self
    }

    fn callee(function: &Node, source: &[u8]) -> Option<CallRef> {
        match function.kind() {
            "identifier" => Some(CallRef::bare(node_text(function, source))),
            // a::b::c() -> qualifier "a::b"
            "scoped_identifier" => {
                let name = field_text(function, "name", source)?;
                let qualifier = field_text(function, "path", source);
                Some(CallRef { name, qualifier })
            }
            // recv.method() -> qualifier when the receiver is a plain path
            "field_expression" => {
                let name = field_text(function, "field", source)?;
                let qualifier = function
                    .child_by_field_name("value")
                    .filter(|v| {
                        matches!(
                            v.kind(),
                            "identifier" | "self" | "field_expression" | "scoped_identifier"
                        )
                    })
                    .map(|v| node_text(&v, source).to_string());
                Some(CallRef { name, qualifier })
            }
            // turbofish: parse::<T>()
            "generic_function" => {
                let inner = function.child_by_field_name("function")?;
                Self::callee(&inner, source)
            }
            _ => None,
        }
    }
}

impl LanguageAnalyser for RustAnalyser {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn get_language_for_ext(&self, _ext: &str) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }

    fn function_header(&self, node: &Node, source: &[u8]) -> Option<FunctionHeader> {
        if node.kind() != "function_item" && node.kind() != "function_signature_item" {
            return None;
        }
        Some(FunctionHeader {
            name: field_text(node, "name", source)?,
            params: field_text(node, "parameters", source).unwrap_or_else(|| "()".to_string()),
            receiver: None,
            signature_end: body_start(node),
        })
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "impl_item" => field_text(node, "type", source).map(|t| bare_type_name(&t)),
            "trait_item" | "mod_item" => field_text(node, "name", source),
            _ => None,
        }
    }

    fn call_ref(&self, node: &Node, source: &[u8]) -> Option<CallRef> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        Self::callee(&function, source)
    }
}
