//! Java language analyser.

use std::collections::HashSet;
use std::sync::LazyLock;

use tree_sitter::Node;

use super::{body_start, field_text, node_text, FunctionHeader, LanguageAnalyser};
use crate::config::{CallRef, Language};

static BUILTIN_EXCLUSIONS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        "System.out.println",
        "System.out.print",
        "System.out.printf",
        "System.err.println",
        "System.exit",
        "System.currentTimeMillis",
        "System.nanoTime",
        "System.arraycopy",
        "String.valueOf",
        "String.format",
        "String.join",
        "Integer.parseInt",
        "Integer.valueOf",
        "Long.parseLong",
        "Double.parseDouble",
        "Math.max",
        "Math.min",
        "Math.abs",
        "Arrays.asList",
        "Collections.sort",
        "Collections.emptyList",
        "Objects.requireNonNull",
        "Objects.equals",
        "Objects.hash",
        "Optional.of",
        "Optional.ofNullable",
        "Optional.empty",
        "Thread.sleep",
        "toString",
        "equals",
        "hashCode",
        "getClass",
        "println",
        "printf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

fn is_container(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
    )
}

/// Qualifier text for a call receiver, when it is a plain name or dotted path.
fn receiver_text(object: &Node, source: &[u8]) -> Option<String> {
    match object.kind() {
        "identifier" | "this" | "super" | "field_access" | "scoped_identifier" => {
            Some(node_text(object, source).to_string())
        }
        _ => None,
    }
}

/// Nearest enclosing type declaration of `node`.
fn enclosing_type<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if is_container(n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Constructor targeted by `this(..)` or `super(..)`.
fn chained_constructor(node: &Node, source: &[u8]) -> Option<CallRef> {
    let owner = enclosing_type(node)?;
    let target = node.child_by_field_name("constructor")?;
    let name = match target.kind() {
        "this" => field_text(&owner, "name", source)?,
        "super" => {
            let superclass = owner.child_by_field_name("superclass")?;
            let ty = superclass.named_child(0)?;
            super::bare_type_name(node_text(&ty, source))
        }
        _ => return None,
    };
    (!name.is_empty()).then(|| CallRef::qualified(&name, &name))
}

pub struct JavaAnalyser;

impl Default for JavaAnalyser {
    fn default() -> Self {
        Self
    }
}

impl JavaAnalyser {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageAnalyser for JavaAnalyser {
    fn language(&self) -> Language {
        Language::Java
    }

    fn get_language_for_ext(&self, _ext: &str) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }

    fn function_header(&self, node: &Node, source: &[u8]) -> Option<FunctionHeader> {
        if node.kind() != "method_declaration" && node.kind() != "constructor_declaration" {
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
        if is_container(node.kind()) {
            field_text(node, "name", source)
        } else {
            None
        }
    }

    fn call_ref(&self, node: &Node, source: &[u8]) -> Option<CallRef> {
        match node.kind() {
            // method_invocation: [object '.'] name argument_list
            "method_invocation" => {
                let name = field_text(node, "name", source)?;
                let qualifier = node
                    .child_by_field_name("object")
                    .and_then(|o| receiver_text(&o, source));
                Some(CallRef { name, qualifier })
            }
            // `new Foo(..)` resolves against Foo's constructors
            "object_creation_expression" => {
                let ty = node.child_by_field_name("type")?;
                let name = super::bare_type_name(node_text(&ty, source));
                (!name.is_empty()).then(|| CallRef::qualified(&name, &name))
            }
            // `this(..)` and `super(..)` inside a constructor
            "explicit_constructor_invocation" => chained_constructor(node, source),
            _ => None,
        }
    }
}
