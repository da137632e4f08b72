use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{brace_body, child_texts, field_text, node_text, squash};
use super::walk::{walk, Visit};
use super::{parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

pub struct CExtractor;

impl Extractor for CExtractor {
    fn language(&self) -> &'static str {
        "c"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::C, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "preproc_include" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            "struct_specifier" | "union_specifier" => {
                if node.child_by_field_name("body").is_some() {
                    if let Some(name) = field_text(node, "name", source) {
                        builder.add_class(name);
                    }
                }
                Visit::Skip
            }
            "declaration" => {
                // Globals only: a declaration after the first function is treated as local
                if !builder.has_functions() {
                    builder.add_property(node_text(node, source));
                }
                Visit::Descend
            }
            "function_definition" => {
                let parts = function(node, source, "int");
                builder.add_function(parts.into_record());
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

/// The `function_declarator` under a definition's pointer/reference wrappers
pub(super) fn function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if current.kind() == "function_declarator" {
            return Some(current);
        }
        current = match current.child_by_field_name("declarator") {
            Some(next) => next,
            None => current.named_child(0)?,
        };
    }
}

/// Shared C/C++ function refinement. The return type is the header text
/// before the declarator, or `default_return` when there is none.
pub(super) fn function(node: Node<'_>, source: &str, default_return: &str) -> FunctionParts {
    let declarator = function_declarator(node);

    let name = declarator
        .and_then(|d| field_text(d, "declarator", source))
        .unwrap_or("anonymous")
        .trim()
        .to_string();

    let parameters = declarator
        .and_then(|d| d.child_by_field_name("parameters"))
        .map(|p| child_texts(p, source))
        .unwrap_or_default();

    let mut return_type = node
        .child_by_field_name("declarator")
        .and_then(|d| source.get(node.start_byte()..d.start_byte()))
        .map(squash)
        .unwrap_or_default();
    if let Some(outer) = node.child_by_field_name("declarator") {
        if outer.kind() == "pointer_declarator" {
            return_type.push('*');
        }
    }
    if return_type.is_empty() {
        return_type = default_return.to_string();
    }

    FunctionParts {
        name,
        parameters,
        return_type,
        body: node
            .child_by_field_name("body")
            .map(|b| brace_body(node_text(b, source)).unwrap_or("").to_string()),
        class_name: String::new(),
        abstract_hint: false,
        annotations: Vec::new(),
    }
}
