//! Structural extraction using tree-sitter
//!
//! Parses one file, lowers it into the language-neutral syntax union and
//! flattens that into a [`FileStructure`]:
//! - Functions (declarations and variable-bound anonymous functions)
//! - Classes with methods and properties
//! - Interfaces, type aliases, imports, exports
//! - Per-function cyclomatic complexity and dependencies

use super::content_hash;
use super::model::*;
use crate::syntax::{self, BranchArm, ConditionalKind, FunctionDecl, NodeKind, SyntaxNode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Rust,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" | "pyi" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter language for this language
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Translate a parsed tree into the syntax union
    fn lower(&self, root: tree_sitter::Node, source: &str) -> SyntaxNode {
        match self {
            Language::TypeScript | Language::Tsx | Language::JavaScript => {
                syntax::lower_typescript(root, source)
            }
            Language::Python => syntax::lower_python(root, source),
            Language::Rust => syntax::lower_rust(root, source),
        }
    }

    const ALL: [Language; 5] = [
        Language::TypeScript,
        Language::Tsx,
        Language::JavaScript,
        Language::Python,
        Language::Rust,
    ];
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::TypeScript => write!(f, "typescript"),
            Language::Tsx => write!(f, "tsx"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Python => write!(f, "python"),
            Language::Rust => write!(f, "rust"),
        }
    }
}

/// A file's structural model together with its lowered tree
///
/// The call graph builder needs the tree to scan function bodies.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub structure: FileStructure,
    pub tree: SyntaxNode,
}

impl ParsedFile {
    /// Syntax node of a function or method recorded in `structure`
    pub fn function_node(&self, signature: &FunctionSignature) -> Option<&SyntaxNode> {
        let name = signature.name.as_str();
        let line = signature.start_line;
        self.tree.find(&|n| {
            n.start_line == line && matches!(&n.kind, NodeKind::Function(decl) if decl.name == name)
        })
    }
}

/// Extracts structural models from source files
pub struct CodeExtractor {
    parsers: HashMap<Language, tree_sitter::Parser>,
}

impl CodeExtractor {
    /// Create a new code extractor with one parser per language
    pub fn new() -> Result<Self> {
        let mut parsers = HashMap::new();
        for language in Language::ALL {
            let mut parser = tree_sitter::Parser::new();
            parser
                .set_language(&language.tree_sitter_language())
                .with_context(|| format!("Failed to set {} language", language))?;
            parsers.insert(language, parser);
        }
        Ok(Self { parsers })
    }

    /// Extract the structural model of a file
    ///
    /// Never fails: unsupported or unparseable files yield an empty model
    /// with `parse_error` set.
    pub fn extract_file(&mut self, path: &Path, content: &str) -> FileStructure {
        self.parse_file(path, content).structure
    }

    /// Parse a file, keeping the lowered tree alongside the model
    pub fn parse_file(&mut self, path: &Path, content: &str) -> ParsedFile {
        let file_path = path.to_string_lossy().to_string();
        let hash = content_hash(content);
        let line_count = content.lines().count();

        let Some(language) = Language::from_path(path) else {
            debug!("Unsupported file type: {}", file_path);
            return ParsedFile {
                structure: FileStructure::empty(&file_path, hash, line_count, "unsupported file type"),
                tree: SyntaxNode::empty_module(),
            };
        };

        let tree = self
            .parsers
            .get_mut(&language)
            .and_then(|parser| parser.parse(content, None));

        let Some(tree) = tree else {
            warn!("Failed to parse {}; recording an empty model", file_path);
            let mut structure =
                FileStructure::empty(&file_path, hash, line_count, format!("failed to parse {} source", language));
            structure.language = Some(language);
            return ParsedFile {
                structure,
                tree: SyntaxNode::empty_module(),
            };
        };

        if tree.root_node().has_error() {
            warn!("Syntax errors in {}; extraction may be partial", file_path);
        }

        let lowered = language.lower(tree.root_node(), content);
        let mut structure = FileStructure {
            file_path,
            language: Some(language),
            hash,
            line_count,
            functions: Vec::new(),
            classes: Vec::new(),
            interfaces: Vec::new(),
            types: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            parse_error: None,
        };

        let mut walker = StructureWalker::default();
        walker.walk(&lowered, false, &mut structure);
        walker.finish(&mut structure);

        ParsedFile {
            structure,
            tree: lowered,
        }
    }

    /// Read and extract a file from disk
    pub fn extract_path(&mut self, path: &Path) -> Result<FileStructure> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.extract_file(path, &content))
    }
}

// ==================== Tree walking ====================

/// Flattens a lowered tree into a file structure
#[derive(Default)]
struct StructureWalker {
    /// `impl` blocks merged into their class once the walk is done
    partials: Vec<ClassInfo>,
}

impl StructureWalker {
    /// `in_export` holds only for direct children of an export wrapper
    fn walk(&mut self, node: &SyntaxNode, in_export: bool, out: &mut FileStructure) {
        match &node.kind {
            NodeKind::Export(decl) => {
                for name in &decl.names {
                    out.exports.push(ExportInfo {
                        name: name.clone(),
                        source: decl.source.clone(),
                        is_default: decl.is_default,
                        line: node.start_line,
                    });
                }
                for child in &node.children {
                    if let Some(name) = declared_name(child) {
                        out.exports.push(ExportInfo {
                            name: name.to_string(),
                            source: None,
                            is_default: decl.is_default,
                            line: child.start_line,
                        });
                    }
                    self.walk(child, true, out);
                }
            }
            NodeKind::Function(decl) => {
                out.functions.push(function_signature(decl, node, in_export));
                self.walk_children(node, out);
            }
            NodeKind::Class(decl) => {
                let methods: Vec<FunctionSignature> = node
                    .children
                    .iter()
                    .filter_map(|child| {
                        child
                            .as_function()
                            .map(|m| function_signature(m, child, decl.exported || in_export))
                    })
                    .collect();

                let info = ClassInfo {
                    name: decl.name.clone(),
                    is_exported: decl.exported || in_export,
                    superclass: decl.superclass.clone(),
                    implements: decl.implements.clone(),
                    methods,
                    properties: decl.properties.iter().map(property_info).collect(),
                    doc_comment: decl.doc_comment.clone(),
                    start_line: node.start_line,
                    end_line: node.end_line,
                };
                if decl.partial {
                    self.partials.push(info);
                } else {
                    out.classes.push(info);
                }

                // Functions nested in method bodies are still functions
                for method in &node.children {
                    self.walk_children(method, out);
                }
            }
            NodeKind::Interface(decl) => {
                out.interfaces.push(InterfaceInfo {
                    name: decl.name.clone(),
                    is_exported: decl.exported || in_export,
                    extends: decl.extends.clone(),
                    methods: node
                        .children
                        .iter()
                        .filter_map(|child| {
                            child
                                .as_function()
                                .map(|m| function_signature(m, child, decl.exported || in_export))
                        })
                        .collect(),
                    properties: decl.properties.iter().map(property_info).collect(),
                    doc_comment: decl.doc_comment.clone(),
                    start_line: node.start_line,
                    end_line: node.end_line,
                });
                for method in &node.children {
                    self.walk_children(method, out);
                }
            }
            NodeKind::TypeAlias(decl) => out.types.push(TypeInfo {
                name: decl.name.clone(),
                definition: decl.definition.clone(),
                is_exported: decl.exported || in_export,
                doc_comment: decl.doc_comment.clone(),
                start_line: node.start_line,
                end_line: node.end_line,
            }),
            NodeKind::Import(decl) => out.imports.push(ImportInfo {
                source: decl.source.clone(),
                specifiers: decl
                    .specifiers
                    .iter()
                    .map(|s| ImportBinding {
                        imported: s.imported.clone(),
                        local: s.local.clone(),
                    })
                    .collect(),
                default_import: decl.default_import.clone(),
                namespace: decl.namespace.clone(),
                line: node.start_line,
            }),
            _ => self.walk_children(node, out),
        }
    }

    fn walk_children(&mut self, node: &SyntaxNode, out: &mut FileStructure) {
        for child in &node.children {
            self.walk(child, false, out);
        }
    }

    /// Merge partial classes and apply local export clauses
    fn finish(self, out: &mut FileStructure) {
        for partial in self.partials {
            match out.classes.iter_mut().find(|c| c.name == partial.name) {
                Some(class) => {
                    class.methods.extend(partial.methods.into_iter().map(|mut m| {
                        m.is_exported = m.is_exported && class.is_exported;
                        m
                    }));
                    class.implements.extend(partial.implements);
                }
                None => out.classes.push(partial),
            }
        }

        // `export { a, b }` marks earlier local declarations exported
        let clause_names: Vec<String> = out
            .exports
            .iter()
            .filter(|e| e.source.is_none())
            .map(|e| e.name.clone())
            .collect();
        for name in &clause_names {
            for f in out.functions.iter_mut().filter(|f| &f.name == name) {
                f.is_exported = true;
            }
            for c in out.classes.iter_mut().filter(|c| &c.name == name) {
                c.is_exported = true;
            }
            for i in out.interfaces.iter_mut().filter(|i| &i.name == name) {
                i.is_exported = true;
            }
            for t in out.types.iter_mut().filter(|t| &t.name == name) {
                t.is_exported = true;
            }
        }
    }
}

fn declared_name(node: &SyntaxNode) -> Option<&str> {
    match &node.kind {
        NodeKind::Function(decl) => Some(&decl.name),
        NodeKind::Class(decl) => Some(&decl.name),
        NodeKind::Interface(decl) => Some(&decl.name),
        NodeKind::TypeAlias(decl) => Some(&decl.name),
        _ => None,
    }
}

fn function_signature(decl: &FunctionDecl, node: &SyntaxNode, in_export: bool) -> FunctionSignature {
    FunctionSignature {
        name: decl.name.clone(),
        parameters: decl
            .params
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                type_ref: p.type_ref.clone(),
                optional: p.optional,
                default_value: p.default_value.clone(),
            })
            .collect(),
        return_type: decl.return_type.clone(),
        is_async: decl.is_async,
        is_exported: decl.exported || in_export,
        visibility: decl.visibility,
        doc_comment: decl.doc_comment.clone(),
        start_line: node.start_line,
        end_line: node.end_line,
        complexity: cyclomatic_complexity(node),
        dependencies: dependencies(node),
    }
}

fn property_info(prop: &syntax::PropertyDecl) -> PropertyInfo {
    PropertyInfo {
        name: prop.name.clone(),
        type_ref: prop.type_ref.clone(),
        optional: prop.optional,
        visibility: prop.visibility,
    }
}

/// Cyclomatic complexity of a function subtree: 1 plus one per branching construct
pub fn cyclomatic_complexity(function: &SyntaxNode) -> u32 {
    fn count(node: &SyntaxNode) -> u32 {
        let own = match &node.kind {
            NodeKind::Conditional(c) if c.kind != ConditionalKind::Switch => 1,
            NodeKind::Branch(BranchArm::Case(_)) => 1,
            NodeKind::Loop | NodeKind::Catch => 1,
            _ => 0,
        };
        own + node.children.iter().map(count).sum::<u32>()
    }

    1 + function.children.iter().map(count).sum::<u32>()
}

/// Distinct callee names in source order
fn dependencies(function: &SyntaxNode) -> Vec<String> {
    fn collect(node: &SyntaxNode, out: &mut Vec<String>) {
        if let NodeKind::Call(call) = &node.kind {
            if !out.contains(&call.name) {
                out.push(call.name.clone());
            }
        }
        for child in &node.children {
            collect(child, out);
        }
    }

    let mut names = Vec::new();
    for child in &function.children {
        collect(child, &mut names);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::TypeRef;

    fn extract(path: &str, source: &str) -> FileStructure {
        let mut extractor = CodeExtractor::new().unwrap();
        extractor.extract_file(Path::new(path), source)
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_extension("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("TSX"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("md"), None);
    }

    #[test]
    fn test_export_flag_applies_to_direct_children_only() {
        let source = r#"
export function outer(a: string): void {
    function inner() {}
    inner();
}
function local() {}
"#;
        let structure = extract("mod.ts", source);

        assert!(structure.function("outer").unwrap().is_exported);
        assert!(!structure.function("inner").unwrap().is_exported);
        assert!(!structure.function("local").unwrap().is_exported);
        assert_eq!(structure.exports.len(), 1);
    }

    #[test]
    fn test_export_clause_marks_local_declarations() {
        let source = "function a() {}\nconst b = () => 1;\nexport { a, b };\n";
        let structure = extract("mod.js", source);

        assert!(structure.function("a").unwrap().is_exported);
        assert!(structure.function("b").unwrap().is_exported);
    }

    #[test]
    fn test_complexity_counts_each_branching_construct() {
        let source = r#"
function classify(x: number): string {
    if (x > 0) {
        for (const i of [1, 2]) {
            while (i < x) { x--; }
        }
    } else if (x < 0) {
        return x > -5 ? "small" : "large";
    }
    switch (x) {
        case 0: return "zero";
        case 1: return "one";
        default: return "other";
    }
    try { risky(); } catch (e) { return "err"; }
}
"#;
        let structure = extract("c.ts", source);
        let f = structure.function("classify").unwrap();
        // 1 + if + for + while + else-if + ternary + 2 cases + catch
        assert_eq!(f.complexity, 9);
        assert_eq!(f.dependencies, vec!["risky"]);
    }

    #[test]
    fn test_complexity_is_at_least_one() {
        let structure = extract("s.py", "def noop():\n    pass\n\nasync def fetch(url: str) -> str:\n    return url\n");

        assert!(structure.functions.iter().all(|f| f.complexity >= 1));
        let fetch = structure.function("fetch").unwrap();
        assert!(fetch.is_async);
        assert!(fetch.is_exported);
        assert_eq!(fetch.parameters[0].type_ref, Some(TypeRef::String));
    }

    #[test]
    fn test_class_methods_are_not_top_level_functions() {
        let source = r#"
export class Repo extends Base implements Store {
    private cache: Map<string, string>;
    async save(item: Item): Promise<void> { this.write(item); }
}
"#;
        let structure = extract("repo.ts", source);

        assert!(structure.functions.is_empty());
        let class = &structure.classes[0];
        assert!(class.is_exported);
        assert_eq!(class.superclass.as_deref(), Some("Base"));
        assert_eq!(class.implements, vec!["Store"]);
        assert_eq!(class.methods[0].name, "save");
        assert!(class.methods[0].is_async);
        assert_eq!(class.properties[0].name, "cache");
    }

    #[test]
    fn test_rust_impl_merges_into_struct() {
        let source = r#"
impl Counter {
    pub fn bump(&mut self) { self.n += 1; }
}

pub struct Counter { n: u32 }

pub trait Reset { fn reset(&mut self); }
"#;
        let structure = extract("lib.rs", source);

        assert_eq!(structure.classes.len(), 1);
        let class = &structure.classes[0];
        assert_eq!(class.name, "Counter");
        assert!(class.is_exported);
        assert_eq!(class.methods[0].name, "bump");
        assert_eq!(structure.interfaces[0].name, "Reset");
        assert_eq!(structure.interfaces[0].methods[0].name, "reset");
    }

    #[test]
    fn test_unsupported_file_yields_empty_model() {
        let structure = extract("notes.txt", "hello");

        assert!(structure.functions.is_empty());
        assert!(structure.parse_error.is_some());
        assert_eq!(structure.line_count, 1);
        assert_eq!(structure.hash, content_hash("hello"));
    }

    #[test]
    fn test_function_node_lookup() {
        let mut extractor = CodeExtractor::new().unwrap();
        let parsed = extractor.parse_file(
            Path::new("a.ts"),
            "function a() { b(); }\nfunction b() {}\n",
        );

        let sig = parsed.structure.function("b").unwrap();
        let node = parsed.function_node(sig).unwrap();
        assert_eq!(node.start_line, 2);
    }
}
