//! Go language analyser.

use std::collections::HashSet;
use std::sync::LazyLock;

use tree_sitter::Node;

use super::{bare_type_name, body_start, field_text, node_text, FunctionHeader, LanguageAnalyser};
use crate::config::{CallRef, Language};

static BUILTIN_EXCLUSIONS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        "make",
        "len",
        "cap",
        "append",
        "copy",
        "delete",
        "panic",
        "recover",
        "new",
        "close",
        "fmt.Println",
        "fmt.Printf",
        "fmt.Sprintf",
        "fmt.Errorf",
        "errors.New",
        "log.Printf",
        "log.Println",
        "log.Fatal",
        "strings.Join",
        "strconv.Itoa",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub struct GoAnalyser;

impl Default for GoAnalyser {
    fn default() -> Self {
        Self
    }
}

impl GoAnalyser {
    pub fn new() -> Self {
        Self
    }

    /// Receiver type of a method: `func (s *Server) Run()` -> `Server`.
    fn receiver_type(node: &Node, source: &[u8]) -> Option<String> {
        let receiver = node.child_by_field_name("receiver")?;
        for i in 0..receiver.named_child_count() {
            if let Some(param) = receiver.named_child(i) {
                if let Some(ty) = param.child_by_field_name("type") {
                    return Some(bare_type_name(node_text(&ty, source)));
                }
            }
        }
        None
    }
}

impl LanguageAnalyser for GoAnalyser {
    fn language(&self) -> Language {
        Language::Go
    }

    fn get_language_for_ext(&self, _ext: &str) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }

    fn function_header(&self, node: &Node, source: &[u8]) -> Option<FunctionHeader> {
        let receiver = match node.kind() {
            "function_declaration" => None,
            "method_declaration" => Self::receiver_type(node, source),
            _ => return None,
        };
        Some(FunctionHeader {
            name: field_text(node, "name", source)?,
            params: field_text(node, "parameters", source).unwrap_or_else(|| "()".to_string()),
            receiver,
            signature_end: body_start(node),
        })
    }

    fn scope_name(&self, _node: &Node, _source: &[u8]) -> Option<String> {
        None
    }

    fn call_ref(&self, node: &Node, source: &[u8]) -> Option<CallRef> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(CallRef::bare(node_text(&function, source))),
            "selector_expression" => {
                let name = field_text(&function, "field", source)?;
                let qualifier = function
                    .child_by_field_name("operand")
                    .filter(|o| matches!(o.kind(), "identifier" | "selector_expression"))
                    .map(|o| node_text(&o, source).to_string());
                Some(CallRef { name, qualifier })
            }
            _ => None,
        }
    }
}
