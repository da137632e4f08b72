use tree_sitter::Node;

use super::builder::RecordBuilder;
use super::c::function;
use super::text::{field_text, node_text};
use super::walk::{walk, Visit};
use super::{enclosing_names, parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

const CLASS_KINDS: &[&str] = &["class_specifier", "struct_specifier", "union_specifier"];

pub struct CppExtractor;

impl Extractor for CppExtractor {
    fn language(&self) -> &'static str {
        "cpp"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::Cpp, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "preproc_include" | "using_declaration" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            "namespace_definition" => {
                if let Some(name) = field_text(node, "name", source) {
                    builder.set_package(name);
                }
                Visit::Descend
            }
            kind if CLASS_KINDS.contains(&kind) => {
                if node.child_by_field_name("body").is_none() {
                    return Visit::Skip;
                }
                if let Some(name) = field_text(node, "name", source) {
                    builder.add_class(name);
                }
                Visit::Descend
            }
            "declaration" => {
                let file_scope = node
                    .parent()
                    .map_or(false, |p| matches!(p.kind(), "translation_unit" | "declaration_list"));
                if file_scope && !builder.has_functions() {
                    builder.add_property(node_text(node, source));
                }
                Visit::Descend
            }
            "function_definition" => {
                let mut parts = function(node, source, "void");
                match parts.name.rsplit_once("::") {
                    Some((owner, name)) => {
                        parts.class_name = owner.to_string();
                        parts.name = name.to_string();
                    }
                    None => parts.class_name = owning_classes(node, source),
                }
                builder.add_function(parts.into_record());
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

fn owning_classes(node: Node<'_>, source: &str) -> String {
    enclosing_names(node, CLASS_KINDS, |n| {
        field_text(n, "name", source).map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"#include <vector>
#include "engine/render.hpp"

namespace gfx {

int frame_count = 0;

class Renderer {
public:
    Renderer();
    int frames() const {
        return count_;
    }
private:
    int count_;
};

Renderer::Renderer() {
    count_ = 0;
}

void Renderer::draw(const std::vector<int>& items, float scale) {
    for (int i : items) {
        paint(i * scale);
    }
}

struct Forward;

}
"#;

    #[test]
    fn test_free_function_has_no_owner() {
        let source = "#include <cstdio>\nusing namespace std;\n\nint main(int argc, char** argv) {\n    return 0;\n}\n";
        let record = CppExtractor.extract(source, "/r/main.cpp").unwrap();
        assert_eq!(record.imports.len(), 2);
        assert_eq!(record.package, None);

        let main = record.function("main").unwrap();
        assert_eq!(main.class_name, "");
        assert_eq!(main.parameters, vec!["int argc", "char** argv"]);
        assert_eq!(main.body, "return 0;");
    }

    fn extract() -> SymbolRecord {
        CppExtractor.extract(SOURCE, "/r/gfx/src/renderer.cpp").unwrap()
    }

    #[test]
    fn test_includes_namespace_classes() {
        let record = extract();
        assert_eq!(record.imports.len(), 2);
        assert_eq!(record.package.as_deref(), Some("gfx"));
        assert_eq!(record.class_names, vec!["Renderer"]);
        assert_eq!(record.property_declarations, vec!["int frame_count = 0;"]);
    }

    #[test]
    fn test_methods_and_qualified_definitions() {
        let record = extract();
        let names: Vec<_> = record.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["frames", "Renderer", "draw"]);

        let frames = record.function("frames").unwrap();
        assert_eq!(frames.class_name, "Renderer");
        assert_eq!(frames.return_type, "int");
        assert_eq!(frames.body, "return count_;");

        let ctor = record.function("Renderer").unwrap();
        assert_eq!(ctor.class_name, "Renderer");
        assert_eq!(ctor.return_type, "void");

        let draw = record.function("draw").unwrap();
        assert_eq!(draw.class_name, "Renderer");
        assert_eq!(draw.parameters, vec!["const std::vector<int>& items", "float scale"]);
    }
}
