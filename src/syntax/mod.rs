//! Language-neutral syntax tree
//!
//! Every supported grammar is lowered into the small closed set of node shapes
//! the extractor and call graph builder actually consume. Grammar-specific
//! knowledge (tree-sitter node kinds and field names) lives only in the
//! per-language adapters below.

mod python;
mod rust;
mod typescript;

pub use python::lower_python;
pub use rust::lower_rust;
pub use typescript::lower_typescript;

use serde::{Deserialize, Serialize};

/// A lowered syntax node
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    /// Shape of the node
    pub kind: NodeKind,
    /// 1-indexed first line
    pub start_line: usize,
    /// 1-indexed last line
    pub end_line: usize,
    /// Child nodes in source order
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, start_line: usize, end_line: usize) -> Self {
        Self {
            kind,
            start_line,
            end_line,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<SyntaxNode>) -> Self {
        self.children = children;
        self
    }

    /// Build a node spanning a tree-sitter node
    pub(crate) fn spanning(kind: NodeKind, node: tree_sitter::Node) -> Self {
        Self::new(
            kind,
            node.start_position().row + 1,
            node.end_position().row + 1,
        )
    }

    /// Empty module node, used when a file cannot be parsed
    pub fn empty_module() -> Self {
        Self::new(NodeKind::Module, 1, 1)
    }

    /// Function declaration data, if this is a function-like node
    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            NodeKind::Function(decl) => Some(decl),
            _ => None,
        }
    }

    /// Depth-first search for the first node matching the predicate
    pub fn find(&self, predicate: &dyn Fn(&SyntaxNode) -> bool) -> Option<&SyntaxNode> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(predicate))
    }
}

/// The closed set of node shapes
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// File root
    Module,
    /// `export ...` wrapper; exported status applies to direct children only
    Export(ExportDecl),
    /// Named function, method, or variable-bound anonymous function
    Function(FunctionDecl),
    /// Class-like declaration (class, struct, enum, impl block)
    Class(ClassDecl),
    /// Interface-like declaration (interface, trait)
    Interface(InterfaceDecl),
    /// Type alias
    TypeAlias(TypeAliasDecl),
    /// Import / use declaration
    Import(ImportDecl),
    /// Call expression; children are the argument subtrees
    Call(CallExpr),
    /// if / ternary / switch; children are `Branch` arms
    Conditional(ConditionalExpr),
    /// One side of a conditional
    Branch(BranchArm),
    /// Any loop construct
    Loop,
    /// try statement; children are the guarded body plus `Catch` / `Finally`
    Try,
    /// catch / except clause
    Catch,
    /// finally clause
    Finally,
    /// throw / raise / panic
    Throw(ThrowExpr),
    /// Anything else that may contain interesting descendants
    Block,
}

/// Declared visibility of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Declared type, mapped onto a small closed set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum TypeRef {
    String,
    Number,
    Boolean,
    Any,
    Void,
    Reference(String),
    Unknown,
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::String => write!(f, "string"),
            TypeRef::Number => write!(f, "number"),
            TypeRef::Boolean => write!(f, "boolean"),
            TypeRef::Any => write!(f, "any"),
            TypeRef::Void => write!(f, "void"),
            TypeRef::Reference(name) => write!(f, "{}", name),
            TypeRef::Unknown => write!(f, "unknown"),
        }
    }
}

/// A lowered parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub type_ref: Option<TypeRef>,
    pub optional: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub return_type: Option<TypeRef>,
    pub is_async: bool,
    /// Exported by the language's own rules (`pub`, module-level public name)
    pub exported: bool,
    pub visibility: Visibility,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub type_ref: Option<TypeRef>,
    pub optional: bool,
    pub visibility: Visibility,
}

/// Class-like declaration; methods are `Function` children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub implements: Vec<String>,
    pub properties: Vec<PropertyDecl>,
    pub exported: bool,
    pub doc_comment: Option<String>,
    /// Adds members to a class declared elsewhere in the file (Rust `impl`)
    pub partial: bool,
}

/// Interface-like declaration; method signatures are `Function` children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceDecl {
    pub name: String,
    pub extends: Vec<String>,
    pub properties: Vec<PropertyDecl>,
    pub exported: bool,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeAliasDecl {
    pub name: String,
    pub definition: String,
    pub exported: bool,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Name in the source module
    pub imported: String,
    /// Local binding name
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportDecl {
    /// Module specifier as written (`./utils`, `.models`, `crate::util`)
    pub source: String,
    pub specifiers: Vec<ImportSpecifier>,
    pub default_import: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportDecl {
    /// Names listed in an export clause (`export { a, b as c }` → `c`)
    pub names: Vec<String>,
    /// Re-export source module
    pub source: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    /// Called name (`helper` for `helper()`, `save` for `repo.save()`)
    pub name: String,
    /// Receiver text for member calls (`this`, `repo`, `utils`)
    pub receiver: Option<String>,
}

impl CallExpr {
    pub fn is_method_call(&self) -> bool {
        self.receiver.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    If,
    Ternary,
    Switch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalExpr {
    pub kind: ConditionalKind,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchArm {
    Then,
    Else,
    /// Switch case / match arm with its label text
    Case(String),
    Default,
}

impl std::fmt::Display for BranchArm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchArm::Then => write!(f, "then"),
            BranchArm::Else => write!(f, "else"),
            BranchArm::Case(label) => write!(f, "case {}", label),
            BranchArm::Default => write!(f, "default"),
        }
    }
}

/// Apparent shape of a thrown value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrownValue {
    /// `throw new ValidationError(...)`
    Constructor(String),
    /// `throw err`
    Identifier(String),
    /// `throw makeError(...)`
    Call(String),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowExpr {
    pub value: ThrownValue,
    pub text: String,
}

impl ThrowExpr {
    /// Classified exception type, defaulting to `Error`
    pub fn exception_type(&self) -> String {
        match &self.value {
            ThrownValue::Constructor(name)
            | ThrownValue::Identifier(name)
            | ThrownValue::Call(name) => name.clone(),
            ThrownValue::Other => "Error".to_string(),
        }
    }
}

// ==================== Adapter helpers ====================

/// Text of a tree-sitter node
pub(crate) fn node_text<'a>(node: tree_sitter::Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Text of a named field, if present
pub(crate) fn field_text(node: tree_sitter::Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
}

/// Whether a node has an anonymous keyword child (`async`, `static`)
pub(crate) fn has_keyword(node: tree_sitter::Node, keyword: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == keyword);
    found
}

/// Trim quotes from a string literal
pub(crate) fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// Collapse whitespace so multi-line conditions read as one line
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
