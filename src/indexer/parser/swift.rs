use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{balanced_group, header, node_text, params_after, split_params};
use super::walk::{walk, Visit};
use super::{enclosing_names, parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

static TYPE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|struct|actor|extension|enum|protocol)\s+([A-Za-z_][\w.]*)").unwrap()
});
static FUNC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunc\s+([^\s(<]+)|\binit\b[?!]?").unwrap());
static RETURN_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"->\s*([^{]+)").unwrap());
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+(?:\([^)]*\))?").unwrap());

const TYPE_KINDS: &[&str] = &["class_declaration", "protocol_declaration"];

pub struct SwiftExtractor;

impl Extractor for SwiftExtractor {
    fn language(&self) -> &'static str {
        "swift"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::Swift, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);

        walk(tree.root_node(), |node| match node.kind() {
            "import_declaration" => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            kind if TYPE_KINDS.contains(&kind) => {
                if let Some(name) = type_name(node, source) {
                    builder.add_class(&name);
                }
                Visit::Descend
            }
            "property_declaration" => {
                builder.add_property(node_text(node, source));
                Visit::Skip
            }
            "function_declaration" | "init_declaration" | "protocol_function_declaration" => {
                if let Some(parts) = function(node, source) {
                    builder.add_function(parts.into_record());
                }
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        Ok(builder.finish())
    }
}

fn type_name(node: Node<'_>, source: &str) -> Option<String> {
    TYPE_NAME
        .captures(header(node_text(node, source)))
        .map(|c| c[1].to_string())
}

fn function(node: Node<'_>, source: &str) -> Option<FunctionParts> {
    let text = node_text(node, source);
    let found = FUNC_NAME.captures(text)?;
    let whole = found.get(0)?;
    let name = found
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or("init")
        .to_string();

    let (params, params_end) = params_after(text, whole.end())?;
    let rest = &text[params_end..];

    let (signature, body) = match rest.find('{') {
        Some(open) => (
            &rest[..open],
            Some(
                balanced_group(rest, open)
                    .map(|(inner, _)| inner.trim().to_string())
                    .unwrap_or_default(),
            ),
        ),
        None => (rest, None),
    };

    let return_type = RETURN_TYPE
        .captures(signature)
        .map(|c| c[1].split(" where ").next().unwrap_or("").trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Void".to_string());

    let preamble = &text[..whole.start()];
    let annotations = ATTRIBUTE
        .find_iter(preamble)
        .map(|m| m.as_str().to_string())
        .collect();

    Some(FunctionParts {
        name,
        parameters: split_params(params),
        return_type,
        body,
        class_name: enclosing_names(node, TYPE_KINDS, |n| type_name(n, source)),
        abstract_hint: false,
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"import SwiftUI
import Combine

protocol Loading {
    func load(id: String) async throws -> Profile
}

struct ProfileView: View {
    @ObservedObject var viewModel: ProfileViewModel
    @State private var expanded = false

    var body: some View {
        Text(viewModel.name)
    }

    @MainActor
    func toggle(animated: Bool, duration: Double = 0.3) {
        expanded.toggle()
    }
}

final class ProfileViewModel: ObservableObject {
    init(service: Service) {
        self.service = service
    }

    func name(for user: User) -> String {
        return user.displayName
    }
}

extension ProfileViewModel {
    func reset() {}
}
"#;

    fn extract() -> SymbolRecord {
        SwiftExtractor.extract(SOURCE, "/r/ios/Profile.swift").unwrap()
    }

    #[test]
    fn test_imports_and_types() {
        let record = extract();
        assert_eq!(record.imports, vec!["import SwiftUI", "import Combine"]);
        assert_eq!(record.class_names, vec!["Loading", "ProfileView", "ProfileViewModel"]);
    }

    #[test]
    fn test_properties_keep_wrappers() {
        let record = extract();
        assert!(record
            .property_declarations
            .iter()
            .any(|p| p.starts_with("@ObservedObject var viewModel: ProfileViewModel")));
        assert!(record.property_declarations.iter().any(|p| p.contains("expanded")));
    }

    #[test]
    fn test_functions() {
        let record = extract();

        let load = record.function("load").unwrap();
        assert!(load.is_abstract);
        assert_eq!(load.return_type, "Profile");
        assert_eq!(load.class_name, "Loading");

        let toggle = record.function("toggle").unwrap();
        assert_eq!(toggle.parameters, vec!["animated: Bool", "duration: Double = 0.3"]);
        assert_eq!(toggle.return_type, "Void");
        assert_eq!(toggle.body, "expanded.toggle()");
        assert_eq!(toggle.annotations, vec!["@MainActor"]);
        assert_eq!(toggle.class_name, "ProfileView");

        let init = record.function("init").unwrap();
        assert_eq!(init.parameters, vec!["service: Service"]);
        assert_eq!(init.class_name, "ProfileViewModel");

        let name = record.function("name").unwrap();
        assert_eq!(name.return_type, "String");
        assert_eq!(name.body, "return user.displayName");

        assert_eq!(record.function("reset").unwrap().body, "");
    }
}
