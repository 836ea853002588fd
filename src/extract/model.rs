//! Structural model of one source file
//!
//! These records are what snapshots persist and what the diff primitive
//! compares, so their serialized field names are stable (camelCase).

use super::code::Language;
use crate::syntax::{TypeRef, Visibility};
use serde::{Deserialize, Serialize};

/// A function or method parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    /// Declared type, when annotated
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Parameter {
    fn render(&self) -> String {
        let mut out = self.name.clone();
        if self.optional && self.default_value.is_none() {
            out.push('?');
        }
        if let Some(ty) = &self.type_ref {
            out.push_str(&format!(": {}", ty));
        }
        if let Some(default) = &self.default_value {
            out.push_str(&format!(" = {}", default));
        }
        out
    }
}

/// Signature and metrics of one function or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeRef>,
    pub is_async: bool,
    pub is_exported: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    /// Cyclomatic complexity, always at least 1
    pub complexity: u32,
    /// Distinct callee names in source order
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl FunctionSignature {
    /// Placeholder signature for a call that could not be resolved
    pub fn placeholder(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
            return_type: None,
            is_async: false,
            is_exported: false,
            visibility: Visibility::Public,
            doc_comment: None,
            start_line: line,
            end_line: line,
            complexity: 1,
            dependencies: Vec::new(),
        }
    }

    /// Language-neutral rendering, e.g. `async fetch(url: string, retries = 3): Response`
    pub fn signature_text(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(Parameter::render)
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::new();
        if self.is_async {
            out.push_str("async ");
        }
        out.push_str(&format!("{}({})", self.name, params));
        if let Some(ret) = &self.return_type {
            out.push_str(&format!(": {}", ret));
        }
        out
    }

    /// Whether the externally visible shape differs (body changes are ignored)
    pub fn shape_differs(&self, other: &FunctionSignature) -> bool {
        self.parameters != other.parameters
            || self.return_type != other.return_type
            || self.is_async != other.is_async
            || self.is_exported != other.is_exported
            || self.visibility != other.visibility
    }
}

/// A class field or interface property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub name: String,
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    pub methods: Vec<FunctionSignature>,
    #[serde(default)]
    pub properties: Vec<PropertyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

impl ClassInfo {
    pub fn method(&self, name: &str) -> Option<&FunctionSignature> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub name: String,
    pub is_exported: bool,
    #[serde(default)]
    pub extends: Vec<String>,
    pub methods: Vec<FunctionSignature>,
    #[serde(default)]
    pub properties: Vec<PropertyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

/// A type alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    pub name: String,
    pub definition: String,
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportInfo {
    /// Module specifier as written
    pub source: String,
    #[serde(default)]
    pub specifiers: Vec<ImportBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_import: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub line: usize,
}

impl ImportInfo {
    /// Whether this import binds `local` in the importing file
    pub fn binds(&self, local: &str) -> bool {
        self.default_import.as_deref() == Some(local)
            || self.namespace.as_deref() == Some(local)
            || self.specifiers.iter().any(|s| s.local == local)
    }

    /// Name to look up in the target module for a local binding
    pub fn imported_name<'a>(&'a self, local: &'a str) -> &'a str {
        self.specifiers
            .iter()
            .find(|s| s.local == local)
            .map(|s| s.imported.as_str())
            .unwrap_or(local)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInfo {
    pub name: String,
    /// Re-export source module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub line: usize,
}

/// Everything the extractor knows about one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStructure {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// SHA-256 of the file content
    pub hash: String,
    pub line_count: usize,
    pub functions: Vec<FunctionSignature>,
    pub classes: Vec<ClassInfo>,
    pub interfaces: Vec<InterfaceInfo>,
    pub types: Vec<TypeInfo>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    /// Set when the file could not be parsed; all lists are then empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl FileStructure {
    /// Empty model carrying a parse warning
    pub fn empty(file_path: &str, hash: String, line_count: usize, error: impl Into<String>) -> Self {
        Self {
            file_path: file_path.to_string(),
            language: None,
            hash,
            line_count,
            functions: Vec::new(),
            classes: Vec::new(),
            interfaces: Vec::new(),
            types: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            parse_error: Some(error.into()),
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// First class method with the given name
    pub fn method(&self, name: &str) -> Option<(&ClassInfo, &FunctionSignature)> {
        self.classes
            .iter()
            .find_map(|c| c.method(name).map(|m| (c, m)))
    }

    /// Whether a top-level declaration of any category has this name
    pub fn declares(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
            || self.classes.iter().any(|c| c.name == name)
            || self.interfaces.iter().any(|i| i.name == name)
            || self.types.iter().any(|t| t.name == name)
    }
}
