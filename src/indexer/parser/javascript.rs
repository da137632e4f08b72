use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{brace_body, child_texts, field_text, node_text};
use super::walk::{walk, Visit};
use super::{enclosing_names, parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

const CLASS_KINDS: &[&str] = &["class_declaration", "class"];
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

pub struct JavaScriptExtractor;

impl Extractor for JavaScriptExtractor {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::JavaScript, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "import_statement" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            "export_statement" => {
                builder.add_export(node_text(node, source));
                Visit::Descend
            }
            kind if CLASS_KINDS.contains(&kind) => {
                if let Some(name) = field_text(node, "name", source) {
                    builder.add_class(name);
                }
                Visit::Descend
            }
            "variable_declarator" | "field_definition" => {
                let holds_function = node
                    .child_by_field_name("value")
                    .map_or(false, |v| FUNCTION_VALUES.contains(&v.kind()));
                if !holds_function {
                    builder.add_property(node_text(node, source));
                }
                Visit::Descend
            }
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                builder.add_function(function(node, source).into_record());
                Visit::Skip
            }
            kind if FUNCTION_VALUES.contains(&kind) => {
                builder.add_function(function(node, source).into_record());
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

fn function(node: Node<'_>, source: &str) -> FunctionParts {
    let parameters = match node.child_by_field_name("parameters") {
        Some(params) => child_texts(params, source),
        None => field_text(node, "parameter", source)
            .map(|p| vec![p.to_string()])
            .unwrap_or_default(),
    };

    let body = node.child_by_field_name("body").map(|b| {
        let text = node_text(b, source);
        if b.kind() == "statement_block" {
            brace_body(text).unwrap_or("").to_string()
        } else {
            text.trim().to_string()
        }
    });

    FunctionParts {
        name: function_name(node, source),
        parameters,
        return_type: "n/a".to_string(),
        body,
        class_name: enclosing_names(node, CLASS_KINDS, |n| {
            field_text(n, "name", source).map(str::to_string)
        }),
        abstract_hint: false,
        annotations: Vec::new(),
    }
}

/// Declared name, or the binding an anonymous function is assigned to
fn function_name(node: Node<'_>, source: &str) -> String {
    if let Some(name) = field_text(node, "name", source) {
        return name.to_string();
    }

    let bound = node.parent().and_then(|parent| match parent.kind() {
        "variable_declarator" => field_text(parent, "name", source),
        "pair" => field_text(parent, "key", source),
        "field_definition" => field_text(parent, "property", source),
        "assignment_expression" => field_text(parent, "left", source),
        _ => None,
    });

    bound
        .map(|n| n.trim_matches(|c| c == '"' || c == '\'').to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}
