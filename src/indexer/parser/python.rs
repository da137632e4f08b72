use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{child_texts, field_text, node_text};
use super::walk::{walk, Visit};
use super::{enclosing_names, parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

pub struct PythonExtractor;

impl Extractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::Python, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "import_statement" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            "import_from_statement" => {
                builder.add_import(&from_import(node, source));
                Visit::Skip
            }
            "class_definition" => {
                if let Some(name) = field_text(node, "name", source) {
                    builder.add_class(name);
                }
                Visit::Descend
            }
            "function_definition" => {
                builder.add_function(function(node, source).into_record());
                Visit::Skip
            }
            "assignment" => {
                // Module-level constants only: nothing defined yet
                if !builder.has_functions() && !builder.has_classes() {
                    builder.add_property(node_text(node, source));
                }
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

/// `from pkg.mod import (a, b as c)` -> `from pkg.mod import a, b as c`
fn from_import(node: Node<'_>, source: &str) -> String {
    let module = field_text(node, "module_name", source).unwrap_or("");

    let mut cursor = node.walk();
    let mut names: Vec<&str> = node
        .children_by_field_name("name", &mut cursor)
        .map(|n| node_text(n, source))
        .collect();

    if names.is_empty() {
        let mut cursor = node.walk();
        let wildcard = node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import");
        if wildcard {
            names.push("*");
        }
    }

    format!("from {} import {}", module, names.join(", "))
}

fn function(node: Node<'_>, source: &str) -> FunctionParts {
    let annotations: Vec<String> = node
        .parent()
        .filter(|p| p.kind() == "decorated_definition")
        .map(|p| {
            let mut cursor = p.walk();
            p.named_children(&mut cursor)
                .filter(|c| c.kind() == "decorator")
                .map(|c| node_text(c, source).trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let body = node
        .child_by_field_name("body")
        .map(|b| node_text(b, source).trim().to_string());

    FunctionParts {
        name: field_text(node, "name", source).unwrap_or("anonymous").to_string(),
        parameters: node
            .child_by_field_name("parameters")
            .map(|p| child_texts(p, source))
            .unwrap_or_default(),
        return_type: field_text(node, "return_type", source)
            .unwrap_or("None")
            .to_string(),
        body,
        class_name: enclosing_names(node, &["class_definition"], |n| {
            field_text(n, "name", source).map(str::to_string)
        }),
        abstract_hint: annotations.iter().any(|a| a.contains("abstractmethod")),
        annotations,
    }
}
