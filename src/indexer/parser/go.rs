use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{brace_body, child_texts, field_text, node_text, strip_keyword};
use super::walk::{walk, Visit};
use super::{parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

pub struct GoExtractor;

impl Extractor for GoExtractor {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::Go, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "package_clause" => {
                builder.set_package(strip_keyword(node_text(node, source), "package"));
                Visit::Skip
            }
            "import_declaration" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            "type_spec" => {
                let is_class = node
                    .child_by_field_name("type")
                    .map_or(false, |t| matches!(t.kind(), "struct_type" | "interface_type"));
                if is_class {
                    if let Some(name) = field_text(node, "name", source) {
                        builder.add_class(name);
                    }
                }
                Visit::Skip
            }
            "var_declaration" | "const_declaration" => {
                builder.add_property(node_text(node, source));
                Visit::Skip
            }
            "function_declaration" | "method_declaration" => {
                builder.add_function(function(node, source).into_record());
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

fn function(node: Node<'_>, source: &str) -> FunctionParts {
    FunctionParts {
        name: field_text(node, "name", source).unwrap_or("anonymous").to_string(),
        parameters: node
            .child_by_field_name("parameters")
            .map(|p| child_texts(p, source))
            .unwrap_or_default(),
        return_type: field_text(node, "result", source)
            .unwrap_or("undefined")
            .to_string(),
        body: node
            .child_by_field_name("body")
            .map(|b| brace_body(node_text(b, source)).unwrap_or("").to_string()),
        class_name: receiver_type(node, source).unwrap_or_default(),
        abstract_hint: false,
        annotations: Vec::new(),
    }
}

/// `func (s *Server) Run()` -> `Server`
fn receiver_type(node: Node<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    let ty = field_text(param, "type", source)?;
    let ty = ty.trim_start_matches('*');
    Some(ty.split('[').next().unwrap_or(ty).trim().to_string())
}
