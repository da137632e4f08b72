use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{brace_body, child_texts, field_text, node_text, strip_keyword};
use super::walk::{walk, Visit};
use super::{enclosing_names, parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

const CLASS_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

pub struct JavaExtractor;

impl Extractor for JavaExtractor {
    fn language(&self) -> &'static str {
        "java"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::Java, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "package_declaration" => {
                builder.set_package(strip_keyword(node_text(node, source), "package"));
                Visit::Skip
            }
            "import_declaration" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            kind if CLASS_KINDS.contains(&kind) => {
                if let Some(name) = field_text(node, "name", source) {
                    builder.add_class(name);
                }
                Visit::Descend
            }
            "field_declaration" | "constant_declaration" => {
                builder.add_property(node_text(node, source));
                Visit::Skip
            }
            "method_declaration" | "constructor_declaration" => {
                builder.add_function(method(node, source).into_record());
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

fn method(node: Node<'_>, source: &str) -> FunctionParts {
    let modifiers = modifiers(node);

    let annotations = modifiers
        .map(|m| {
            let mut cursor = m.walk();
            m.named_children(&mut cursor)
                .filter(|c| c.kind().ends_with("annotation"))
                .map(|c| node_text(c, source).trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let abstract_hint = modifiers
        .map(|m| node_text(m, source).split_whitespace().any(|w| w == "abstract"))
        .unwrap_or(false);

    FunctionParts {
        name: field_text(node, "name", source).unwrap_or("anonymous").to_string(),
        parameters: node
            .child_by_field_name("parameters")
            .map(|p| child_texts(p, source))
            .unwrap_or_default(),
        return_type: field_text(node, "type", source).unwrap_or("void").to_string(),
        body: node
            .child_by_field_name("body")
            .map(|b| brace_body(node_text(b, source)).unwrap_or("").to_string()),
        class_name: enclosing_names(node, CLASS_KINDS, |n| {
            field_text(n, "name", source).map(str::to_string)
        }),
        abstract_hint,
        annotations,
    }
}

fn modifiers(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "modifiers");
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
package com.acme.orders;

import java.util.List;
import com.acme.billing.Invoice;

@Service
public class OrderService {
    private final List<Order> orders;
    public static int LIMIT = 10;

    public OrderService(List<Order> orders) {
        this.orders = orders;
    }

    @Override
    @Transactional
    public Invoice place(Order order, int qty) {
        return new Invoice(order, qty);
    }

    public Invoice place(Order order, int qty) {
        return null;
    }

    protected abstract void audit();

    static class Helper {
        void help() { }
    }
}

interface Auditable {
    void audit(String who);
}
"#;

    fn extract() -> SymbolRecord {
        JavaExtractor.extract(SOURCE, "/r/OrderService.java").unwrap()
    }

    #[test]
    fn test_package_imports_classes() {
        let record = extract();
        assert_eq!(record.package.as_deref(), Some("com.acme.orders"));
        assert_eq!(
            record.imports,
            vec!["import java.util.List;", "import com.acme.billing.Invoice;"]
        );
        assert_eq!(record.class_names, vec!["OrderService", "Helper", "Auditable"]);
        assert_eq!(record.property_declarations.len(), 2);
        assert!(record.property_declarations[0].contains("orders"));
    }

    #[test]
    fn test_methods() {
        let record = extract();
        let names: Vec<_> = record.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["OrderService", "place", "audit", "help", "audit"]);

        let place = record.function("place").unwrap();
        assert_eq!(place.return_type, "Invoice");
        assert_eq!(place.parameters, vec!["Order order", "int qty"]);
        assert_eq!(place.body, "return new Invoice(order, qty);");
        assert_eq!(place.annotations, vec!["@Override", "@Transactional"]);
        assert_eq!(place.class_name, "OrderService");
        assert!(!place.is_abstract);

        let helper = record.function("help").unwrap();
        assert_eq!(helper.class_name, "OrderService Helper");
        assert_eq!(helper.return_type, "void");
    }

    #[test]
    fn test_abstract_and_interface_methods() {
        let record = extract();
        let audits: Vec<_> = record.functions.iter().filter(|f| f.name == "audit").collect();
        assert_eq!(audits.len(), 2);
        assert!(audits.iter().all(|f| f.is_abstract));
        assert_eq!(audits[1].class_name, "Auditable");
        assert_eq!(audits[1].parameters, vec!["String who"]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        assert_eq!(extract(), extract());
    }
}
