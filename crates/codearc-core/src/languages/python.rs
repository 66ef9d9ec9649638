//! Python language analyser.

use std::collections::HashSet;
use std::sync::LazyLock;

use tree_sitter::Node;

use super::{body_start, field_text, node_text, FunctionHeader, LanguageAnalyser};
use crate::config::{CallRef, Language};

static BUILTIN_EXCLUSIONS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        "print",
        "len",
        "range",
        "enumerate",
        "zip",
        "sorted",
        "reversed",
        "list",
        "dict",
        "set",
        "tuple",
        "str",
        "int",
        "float",
        "bool",
        "bytes",
        "isinstance",
        "issubclass",
        "getattr",
        "setattr",
        "hasattr",
        "super",
        "open",
        "min",
        "max",
        "sum",
        "any",
        "all",
        "repr",
        "iter",
        "next",
        "append",
        "extend",
        "join",
        "format",
        "os.path.join",
        "os.path.exists",
        "json.dumps",
        "json.loads",
        "logging.getLogger",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub struct PythonAnalyser;

impl Default for PythonAnalyser {
    fn default() -> Self {
        Self
    }
}

impl PythonAnalyser {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageAnalyser for PythonAnalyser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn get_language_for_ext(&self, _ext: &str) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn builtin_exclusions(&self) -> &HashSet<String> {
        &BUILTIN_EXCLUSIONS
    }

    fn function_header(&self, node: &Node, source: &[u8]) -> Option<FunctionHeader> {
        if node.kind() != "function_definition" {
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
        if node.kind() == "class_definition" {
            field_text(node, "name", source)
        } else {
            None
        }
    }

    fn call_ref(&self, node: &Node, source: &[u8]) -> Option<CallRef> {
        if node.kind() != "call" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(CallRef::bare(node_text(&function, source))),
            "attribute" => {
                let name = field_text(&function, "attribute", source)?;
                let qualifier = function
                    .child_by_field_name("object")
                    .filter(|o| matches!(o.kind(), "identifier" | "attribute"))
                    .map(|o| node_text(&o, source).to_string());
                Some(CallRef { name, qualifier })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::parse_source;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
import os

def load(path):
    if os.path.exists(path):
        return parse(read(path))
    return None

def parse(text):
    def helper(line):
        return line.strip()
    return [helper(l) for l in text]

class Store:
    @staticmethod
    def build(cfg):
        return Store()

    def get(self, key):
        print(key)
        return self.lookup(key)
"#;

    fn parse_fixture() -> crate::config::ParsedFile {
        parse_source(&PythonAnalyser::new(), "py", "pkg/store.py", SOURCE.as_bytes(), false).unwrap()
    }

    #[test]
    fn nested_and_decorated_functions_are_found() {
        let parsed = parse_fixture();
        let names: Vec<_> = parsed
            .functions
            .iter()
            .map(|f| format!("{}:{}", f.scope.clone().unwrap_or_default(), f.name))
            .collect();
        assert_eq!(
            names,
            vec![":load", ":parse", "parse:helper", "Store:build", "Store:get"]
        );
    }

    #[test]
    fn nested_calls_belong_to_the_inner_function() {
        let parsed = parse_fixture();
        let parse_fn = &parsed.functions[1];
        let helper = &parsed.functions[2];
        assert_eq!(
            parse_fn.calls.iter().cloned().collect::<Vec<_>>(),
            vec![CallRef::bare("helper")]
        );
        assert_eq!(
            helper.calls.iter().cloned().collect::<Vec<_>>(),
            vec![CallRef::qualified("line", "strip")]
        );
    }

    #[test]
    fn builtins_and_module_helpers_are_excluded() {
        let parsed = parse_fixture();
        let load = &parsed.functions[0];
        assert_eq!(
            load.calls.iter().cloned().collect::<Vec<_>>(),
            vec![CallRef::bare("parse"), CallRef::bare("read")]
        );
        let get = &parsed.functions[4];
        assert_eq!(
            get.calls.iter().cloned().collect::<Vec<_>>(),
            vec![CallRef::qualified("self", "lookup")]
        );
    }

    #[test]
    fn signature_drops_the_colon() {
        let parsed = parse_fixture();
        assert_eq!(parsed.functions[4].signature, "def get(self, key)");
        assert_eq!(parsed.functions[4].params, "(self, key)");
    }
}
