use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use super::builder::{FunctionParts, RecordBuilder};
use super::text::{balanced_group, field_text, header, node_text, params_after, split_params, strip_keyword};
use super::walk::{walk, Visit};
use super::{enclosing_names, parse_source, Language};
use crate::index::{ExtractError, Extractor, SymbolRecord};

static CLASS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|interface|object)\s+([A-Za-z_]\w*)").unwrap()
});
static DATA_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdata\s+class\b").unwrap());
static FUN_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfun\b").unwrap());
static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[\w.:]+(?:\([^)]*\))?").unwrap());
static PROPERTY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:val|var)\s+([A-Za-z_]\w*)").unwrap());

const CLASS_KINDS: &[&str] = &["class_declaration", "object_declaration", "companion_object"];

pub struct KotlinExtractor;

impl Extractor for KotlinExtractor {
    fn language(&self) -> &'static str {
        "kotlin"
    }

    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError> {
        let tree = parse_source(Language::Kotlin, source, file_path)?;
        let mut builder = RecordBuilder::new(file_path);
        let mut data_classes: Vec<Range<usize>> = Vec::new();

        walk(tree.root_node(), |node| match node.kind() {
            "package_header" => {
                builder.set_package(strip_keyword(node_text(node, source), "package"));
                Visit::Skip
            }
            "import_list" => {
                for line in node_text(node, source).lines() {
                    builder.add_import(line);
                }
                Visit::Skip
            }
            kind if kind.starts_with("import") => {
                builder.add_import(node_text(node, source));
                Visit::Skip
            }
            "class_declaration" | "object_declaration" | "companion_object" => {
                let text = node_text(node, source);
                if let Some(name) = class_name(node, source) {
                    builder.add_class(&name);
                }
                if node.kind() == "class_declaration" && DATA_CLASS.is_match(header(text)) {
                    for property in constructor_properties(text) {
                        builder.add_property(&property);
                    }
                    data_classes.push(node.byte_range());
                }
                Visit::Descend
            }
            "property_declaration" => {
                let start = node.start_byte();
                if !data_classes.iter().any(|r| r.contains(&start)) {
                    builder.add_property(node_text(node, source));
                }
                Visit::Skip
            }
            "function_declaration" => {
                if let Some(parts) = function(node, source) {
                    builder.add_function(parts.into_record());
                }
                Visit::Skip
            }
            _ => Visit::Descend,
        });

        builder.index_package_paths(|p| {
            PROPERTY_NAME.captures(p).map(|c| c[1].to_string())
        });
        Ok(builder.finish())
    }
}

fn class_name(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "companion_object" {
        return Some(
            field_text(node, "name", source)
                .unwrap_or("Companion")
                .to_string(),
        );
    }
    field_text(node, "name", source)
        .map(str::to_string)
        .or_else(|| {
            CLASS_NAME
                .captures(header(node_text(node, source)))
                .map(|c| c[1].to_string())
        })
}

/// `val`/`var` parameters of a data class primary constructor, defaults dropped
fn constructor_properties(class_text: &str) -> Vec<String> {
    let Some(name) = CLASS_NAME.find(class_text) else {
        return Vec::new();
    };
    let Some((inner, _)) = params_after(class_text, name.end()) else {
        return Vec::new();
    };

    split_params(inner)
        .into_iter()
        .filter_map(|param| {
            let start = PROPERTY_NAME.find(&param)?.start();
            let declared = param[start..].split('=').next().unwrap_or("").trim();
            Some(declared.to_string())
        })
        .collect()
}

/// Byte offset of the value parameter list within the declaration text
fn parameter_list_start(node: Node<'_>, text: &str, after_keyword: usize) -> Option<usize> {
    let mut cursor = node.walk();
    let list = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "function_value_parameters");
    match list {
        Some(list) => Some(list.start_byte() - node.start_byte()),
        None => text[after_keyword..].find('(').map(|i| i + after_keyword),
    }
}

/// Last identifier before the parameter list, past any type parameters and receiver
fn declared_name(head: &str) -> Option<String> {
    head.trim_end()
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_' || c == '`'))
        .next()
        .map(|name| name.trim_matches('`'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn function(node: Node<'_>, source: &str) -> Option<FunctionParts> {
    let text = node_text(node, source);
    let keyword = FUN_KEYWORD.find(text)?;
    let params_start = parameter_list_start(node, text, keyword.end())?;
    let name = field_text(node, "name", source)
        .map(str::to_string)
        .or_else(|| declared_name(&text[keyword.end()..params_start]))
        .unwrap_or_else(|| "anonymous".to_string());

    let (params, params_end) = balanced_group(text, params_start)?;
    let rest = &text[params_end..];

    let (signature, body) = match rest.find(|c| c == '{' || c == '=') {
        Some(i) if rest.as_bytes()[i] == b'{' => {
            let body = balanced_group(rest, i).map(|(inner, _)| inner.trim().to_string());
            (&rest[..i], Some(body.unwrap_or_default()))
        }
        Some(i) => (&rest[..i], Some(rest[i + 1..].trim().to_string())),
        None => (rest, None),
    };

    let return_type = signature
        .trim()
        .strip_prefix(':')
        .map(|t| t.split(" where ").next().unwrap_or(t).trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unit".to_string());

    let preamble = &text[..keyword.start()];
    let annotations = ANNOTATION
        .find_iter(preamble)
        .map(|m| m.as_str().to_string())
        .collect();

    Some(FunctionParts {
        name,
        parameters: split_params(params),
        return_type,
        body,
        class_name: enclosing_names(node, CLASS_KINDS, |n| class_name(n, source)),
        abstract_hint: preamble.split_whitespace().any(|w| w == "abstract"),
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package com.acme.profile

import com.acme.core.Repository
import kotlinx.coroutines.flow.Flow

data class Profile(val id: String, var name: String = "anon", val tags: List<String>) {
    val display: String = name
}

class ProfileRepository(private val api: Api) : Repository {
    private val cache = mutableMapOf<String, Profile>()

    @Deprecated("use load")
    @Throws(IOException::class)
    fun fetch(id: String, force: Boolean): Profile? {
        return cache[id]
    }

    fun size() = cache.size

    fun fetch(id: String, force: Boolean): Profile? {
        return null
    }

    companion object {
        fun create(): ProfileRepository {
            return ProfileRepository(Api())
        }
    }
}

interface Api {
    fun ping(): Boolean
}

object Registry

val VERSION = 3

fun topLevel(x: Int) {
    println(x)
}
"#;

    fn extract() -> SymbolRecord {
        KotlinExtractor.extract(SOURCE, "/r/app/src/Profile.kt").unwrap()
    }

    #[test]
    fn test_package_and_imports() {
        let record = extract();
        assert_eq!(record.package.as_deref(), Some("com.acme.profile"));
        assert_eq!(record.imports.len(), 2);
        assert!(record.imports[0].contains("com.acme.core.Repository"));
    }

    #[test]
    fn test_classes_and_objects() {
        let record = extract();
        for name in ["Profile", "ProfileRepository", "Api", "Registry"] {
            assert!(record.class_names.iter().any(|c| c == name), "{}", name);
        }
    }

    #[test]
    fn test_data_class_properties_come_from_constructor() {
        let record = extract();
        let props = &record.property_declarations;
        assert!(props.contains(&"val id: String".to_string()));
        assert!(props.contains(&"var name: String".to_string()));
        assert!(props.contains(&"val tags: List<String>".to_string()));
        assert!(!props.iter().any(|p| p.contains("display")));
        assert!(props.iter().any(|p| p.contains("cache")));
        assert!(props.iter().any(|p| p.contains("VERSION")));
    }

    #[test]
    fn test_functions() {
        let record = extract();
        let fetches: Vec<_> = record.functions.iter().filter(|f| f.name == "fetch").collect();
        assert_eq!(fetches.len(), 1);

        let fetch = fetches[0];
        assert_eq!(fetch.parameters, vec!["id: String", "force: Boolean"]);
        assert_eq!(fetch.return_type, "Profile?");
        assert_eq!(fetch.body, "return cache[id]");
        assert_eq!(fetch.annotations.len(), 2);
        assert!(fetch.annotations[0].starts_with("@Deprecated"));
        assert_eq!(fetch.class_name, "ProfileRepository");

        let size = record.function("size").unwrap();
        assert_eq!(size.return_type, "Unit");
        assert_eq!(size.body, "cache.size");

        let ping = record.function("ping").unwrap();
        assert!(ping.is_abstract);
        assert_eq!(ping.return_type, "Boolean");

        let top = record.function("topLevel").unwrap();
        assert_eq!(top.class_name, "");
        assert_eq!(top.body, "println(x)");

        assert!(record.function("create").is_some());
    }

    #[test]
    fn test_generic_extension_functions() {
        let source = "package util\n\nfun <T> List<T>.second(): T { return this[1] }\n\nfun plain(): Int { return 1 }\n";
        let record = KotlinExtractor.extract(source, "/r/app/src/Util.kt").unwrap();

        let second = record.function("second").unwrap();
        assert_eq!(second.return_type, "T");
        assert_eq!(second.body, "return this[1]");
        assert!(second.parameters.is_empty());

        let plain = record.function("plain").unwrap();
        assert_eq!(plain.return_type, "Int");
        assert_eq!(plain.body, "return 1");
    }

    #[test]
    fn test_package_import_paths() {
        let record = extract();
        let paths = &record.package_import_paths;
        assert_eq!(paths["com.acme.profile.ProfileRepository"], "ProfileRepository");
        assert_eq!(paths["com.acme.profile.topLevel"], "topLevel");
        assert_eq!(paths["com.acme.profile.VERSION"], "VERSION");
    }
}
