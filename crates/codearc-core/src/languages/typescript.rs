//! TypeScript and JavaScript analyser. One struct serves both grammars.

use std::collections::HashSet;
use std::sync::LazyLock;

use tree_sitter::Node;

use super::{body_start, field_text, node_text, FunctionHeader, LanguageAnalyser};
use crate::config::{CallRef, Language};

static BUILTIN_EXCLUSIONS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        "console.log",
        "console.error",
        "console.warn",
        "console.info",
        "JSON.stringify",
        "JSON.parse",
        "Object.keys",
        "Object.values",
        "Object.entries",
        "Object.assign",
        "Array.isArray",
        "Array.from",
        "Promise.resolve",
        "Promise.reject",
        "Promise.all",
        "Math.max",
        "Math.min",
        "Math.floor",
        "parseInt",
        "parseFloat",
        "setTimeout",
        "setInterval",
        "clearTimeout",
        "require",
        "push",
        "map",
        "filter",
        "forEach",
        "reduce",
        "then",
        "catch",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Node kinds whose value makes a variable declarator a named function.
fn is_function_value(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

pub struct TypeScriptAnalyser {
    language: Language,
}

impl TypeScriptAnalyser {
    pub fn typescript() -> Self {
        Self {
            language: Language::TypeScript,
        }
    }

    pub fn javascript() -> Self {
        Self {
            language: Language::JavaScript,
        }
    }

    /// `const add = (a, b) => ...` style declarations.
    fn declarator_header(node: &Node, source: &[u8]) -> Option<FunctionHeader> {
        let value = node.child_by_field_name("value")?;
        if !is_function_value(value.kind()) {
            return None;
        }
        let name_node = node.child_by_field_name("name")?;
        if name_node.kind() != "identifier" {
            return None;
        }
        let params = field_text(&value, "parameters", source)
            .or_else(|| field_text(&value, "parameter", source).map(|p| format!("({p})")))
            .unwrap_or_else(|| "()".to_string());
        Some(FunctionHeader {
            name: node_text(&name_node, source).to_string(),
            params,
            receiver: None,
            signature_end: body_start(&value),
        })
    }
}

impl LanguageAnalyser for TypeScriptAnalyser {
    fn language(&self) -> Language {
        self.language
    }

    fn get_language_for_ext(&self, ext: &str) -> tree_sitter::Language {
        match (self.language, ext) {
            (Language::TypeScript, "tsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
            (Language::TypeScript, _) => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }

    fn function_header(&self, node: &Node, source: &[u8]) -> Option<FunctionHeader> {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                Some(FunctionHeader {
                    name: field_text(node, "name", source)?,
                    params: field_text(node, "parameters", source)
                        .unwrap_or_else(|| "()".to_string()),
                    receiver: None,
                    signature_end: body_start(node),
                })
            }
            "variable_declarator" => Self::declarator_header(node, source),
            _ => None,
        }
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => {
                field_text(node, "name", source)
            }
            _ => None,
        }
    }

    fn call_ref(&self, node: &Node, source: &[u8]) -> Option<CallRef> {
        match node.kind() {
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                match function.kind() {
                    "identifier" => Some(CallRef::bare(node_text(&function, source))),
                    "member_expression" => {
                        let name = field_text(&function, "property", source)?;
                        let qualifier = function
                            .child_by_field_name("object")
                            .filter(|o| {
                                matches!(
                                    o.kind(),
                                    "identifier" | "this" | "super" | "member_expression"
                                )
                            })
                            .map(|o| node_text(&o, source).to_string());
                        Some(CallRef { name, qualifier })
                    }
                    _ => None,
                }
            }
            // `new Foo()` targets Foo's constructor method
            "new_expression" => {
                let ctor = node.child_by_field_name("constructor")?;
                (ctor.kind() == "identifier")
                    .then(|| CallRef::qualified(node_text(&ctor, source), "constructor"))
            }
            _ => None,
        }
    }
}
