use crate::index::{FunctionRecord, SymbolRecord};

/// Accumulates one file's symbol record while a walker visits captures.
///
/// Class names keep first-seen order without repeats. A function whose
/// (name, return type, parameters) triple was already recorded is dropped,
/// so the first definition's body is the one kept.
#[derive(Debug)]
pub struct RecordBuilder {
    record: SymbolRecord,
}

impl RecordBuilder {
    pub fn new(file_path: &str) -> Self {
        Self {
            record: SymbolRecord::new(file_path),
        }
    }

    pub fn add_import(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.record.imports.push(text.to_string());
        }
    }

    pub fn add_export(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.record.exports.push(text.to_string());
        }
    }

    pub fn add_class(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.record.class_names.iter().any(|c| c == name) {
            self.record.class_names.push(name.to_string());
        }
    }

    pub fn set_package(&mut self, package: &str) {
        let package = package.trim();
        if !package.is_empty() {
            self.record.package = Some(package.to_string());
        }
    }

    pub fn add_property(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.record.property_declarations.push(text.to_string());
        }
    }

    /// Record a function; returns false when it duplicates an earlier one.
    pub fn add_function(&mut self, function: FunctionRecord) -> bool {
        if self.record.functions.iter().any(|f| f.same_signature(&function)) {
            return false;
        }
        self.record.functions.push(function);
        true
    }

    pub fn has_functions(&self) -> bool {
        !self.record.functions.is_empty()
    }

    pub fn has_classes(&self) -> bool {
        !self.record.class_names.is_empty()
    }

    pub fn record(&self) -> &SymbolRecord {
        &self.record
    }

    /// Register `package.name -> name` for every declared symbol.
    pub fn index_package_paths<F>(&mut self, property_name: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(package) = self.record.package.clone() else {
            return;
        };

        let mut names: Vec<String> = self.record.class_names.clone();
        names.extend(self.record.functions.iter().map(|f| f.name.clone()));
        names.extend(
            self.record
                .property_declarations
                .iter()
                .filter_map(|p| property_name(p)),
        );

        for name in names {
            self.record
                .package_import_paths
                .insert(format!("{}.{}", package, name), name);
        }
    }

    pub fn finish(self) -> SymbolRecord {
        self.record
    }
}

/// Parts of a function recovered from its captured span
#[derive(Debug, Clone, Default)]
pub struct FunctionParts {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_type: String,
    pub body: Option<String>,
    pub class_name: String,
    pub abstract_hint: bool,
    pub annotations: Vec<String>,
}

impl FunctionParts {
    pub fn into_record(self) -> FunctionRecord {
        let is_abstract = self.abstract_hint || self.body.is_none();
        FunctionRecord {
            name: self.name,
            parameters: self.parameters,
            return_type: self.return_type,
            body: self.body.unwrap_or_default(),
            is_abstract,
            class_name: self.class_name,
            annotations: self.annotations,
        }
    }
}
