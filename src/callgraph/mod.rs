//! Cross-file call graph
//!
//! Starting from one entry symbol, the builder discovers callees recursively:
//! - same-file functions first, then same-file class methods for method-style calls
//! - then through import declarations into other files
//! - cycles are cut and recorded, depth is bounded, unknown names are recorded
//!
//! The result is a tree; back-edges live in `circular_references`.

mod builder;
mod resolve;

pub use builder::CallGraphBuilder;
pub use resolve::{is_builtin, ModuleResolver};

use crate::extract::FunctionSignature;
use crate::repo::RepoConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for one call graph build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphOptions {
    /// Nodes at this depth are returned truncated
    pub max_depth: usize,
    /// Follow import declarations into other files
    pub resolve_imports: bool,
    /// Record per-branch calls of conditionals
    pub extract_conditionals: bool,
    /// Record throw-like statements
    pub track_exceptions: bool,
    /// File extensions tried when resolving import specifiers (without dot)
    pub extensions: Vec<String>,
    /// Import specifier prefixes mapped to project-relative directories
    pub path_aliases: BTreeMap<String, String>,
}

impl Default for CallGraphOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            resolve_imports: true,
            extract_conditionals: true,
            track_exceptions: true,
            extensions: ["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            path_aliases: BTreeMap::from([("@/".to_string(), "src/".to_string())]),
        }
    }
}

impl CallGraphOptions {
    /// Options seeded from the project configuration
    pub fn from_config(config: &RepoConfig) -> Self {
        Self {
            max_depth: config.call_graph.max_depth,
            resolve_imports: config.call_graph.resolve_imports,
            extract_conditionals: config.call_graph.extract_conditionals,
            track_exceptions: config.call_graph.track_exceptions,
            extensions: config.extensions.clone(),
            path_aliases: config.path_aliases.clone(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// One call site in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphNode {
    /// Target function, or a placeholder when unresolved
    pub function: FunctionSignature,
    /// File defining the function (the calling file for unresolved calls)
    pub file_path: String,
    /// Line of the call site; `None` for the entry node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_line: Option<usize>,
    pub calls: Vec<CallGraphNode>,
    pub conditional_paths: Vec<ConditionalPath>,
    pub exception_paths: Vec<ExceptionPath>,
    pub depth: usize,
    /// Expansion stopped at the depth limit, at a cycle, or on cancellation
    pub truncated: bool,
    pub is_external: bool,
}

impl CallGraphNode {
    pub(crate) fn new(function: FunctionSignature, file_path: &str, depth: usize) -> Self {
        Self {
            function,
            file_path: file_path.to_string(),
            call_line: None,
            calls: Vec::new(),
            conditional_paths: Vec::new(),
            exception_paths: Vec::new(),
            depth,
            truncated: false,
            is_external: false,
        }
    }

    /// Placeholder for a call that could not be resolved
    pub(crate) fn external(name: &str, file_path: &str, line: usize, depth: usize) -> Self {
        let mut node = Self::new(FunctionSignature::placeholder(name, line), file_path, depth);
        node.call_line = Some(line);
        node.truncated = true;
        node.is_external = true;
        node
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Depth-first iterator over this node and all descendants (calls only)
    pub fn walk(&self) -> Vec<&CallGraphNode> {
        let mut out = vec![self];
        for child in &self.calls {
            out.extend(child.walk());
        }
        out
    }
}

/// Calls made on one side of a conditional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalPath {
    /// `if`, `ternary` or `switch`
    pub kind: String,
    pub condition: String,
    /// `then`, `else`, `case <label>` or `default`
    pub branch: String,
    pub line: usize,
    pub calls: Vec<CallGraphNode>,
}

/// A throw-like statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionPath {
    pub exception_type: String,
    pub line: usize,
    /// Lexically inside a try body; says nothing about whether it is caught
    pub in_try_block: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedCall {
    pub file_path: String,
    pub line: usize,
    pub name: String,
}

/// A back-edge cut during the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircularReference {
    /// Calling function
    pub from: String,
    /// Function already on the active path
    pub to: String,
    /// File defining `to`
    pub file_path: String,
}

/// Result of one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraph {
    pub root: CallGraphNode,
    /// Every distinct function reached, keyed by name; later discoveries overwrite
    #[serde(with = "function_pairs")]
    pub all_functions: BTreeMap<String, FunctionSignature>,
    pub circular_references: Vec<CircularReference>,
    pub unresolved_calls: Vec<UnresolvedCall>,
    pub max_depth_reached: usize,
    pub analyzed_files: Vec<String>,
}

impl CallGraph {
    /// Total number of nodes reachable through `calls`
    pub fn node_count(&self) -> usize {
        self.root.walk().len()
    }

    /// Render as an indented tree
    pub fn render_tree(&self) -> String {
        fn render(node: &CallGraphNode, indent: usize, out: &mut String) {
            let mut marks = Vec::new();
            if node.is_external {
                marks.push("external");
            }
            if node.truncated && !node.is_external {
                marks.push("truncated");
            }
            let suffix = if marks.is_empty() {
                String::new()
            } else {
                format!(" [{}]", marks.join(", "))
            };
            out.push_str(&format!(
                "{}{} ({}:{}){}\n",
                "  ".repeat(indent),
                node.function.signature_text(),
                node.file_path,
                node.function.start_line,
                suffix
            ));
            for child in &node.calls {
                render(child, indent + 1, out);
            }
        }

        let mut out = String::new();
        render(&self.root, 0, &mut out);
        out
    }
}

/// `allFunctions` persists as a list of `[name, signature]` pairs
mod function_pairs {
    use crate::extract::FunctionSignature;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, FunctionSignature>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&String, &FunctionSignature)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, FunctionSignature>, D::Error> {
        let pairs: Vec<(String, FunctionSignature)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
