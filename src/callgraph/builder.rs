//! Call graph construction
//!
//! All mutable build state (parse cache, active path, collected metadata)
//! lives in one [`BuildContext`] owned by a single `build` call, so two
//! builds never share a cache or a cycle-detection set.

use super::resolve::{is_builtin, ModuleResolver};
use super::*;
use crate::extract::{CodeExtractor, Language, ParsedFile};
use crate::syntax::{CallExpr, ConditionalKind, NodeKind, SyntaxNode};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Builds call graphs rooted at one entry symbol
pub struct CallGraphBuilder {
    root: PathBuf,
    options: CallGraphOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl CallGraphBuilder {
    /// Create a builder searching under `root`
    pub fn new<P: Into<PathBuf>>(root: P, options: CallGraphOptions) -> Self {
        Self {
            root: root.into(),
            options,
            cancel: None,
        }
    }

    /// Once the flag is set, nodes not yet expanded are returned truncated
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Build the graph for `entry` (`name`, `Class.method` or `Type::method`)
    ///
    /// An entry that cannot be found yields a well-formed graph with an
    /// external root and one unresolved call.
    pub fn build(&self, entry: &str) -> Result<CallGraph> {
        let mut ctx = BuildContext::new(&self.root, &self.options, self.cancel.clone())?;

        let root = match ctx.find_entry(entry) {
            Some((file, signature)) => ctx.build_node(file, signature, 0, None),
            None => {
                warn!("Entry symbol '{}' not found under {:?}", entry, self.root);
                let file_path = self.root.to_string_lossy().to_string();
                ctx.record_unresolved(&file_path, 0, entry);
                let mut node = CallGraphNode::external(entry, &file_path, 0, 0);
                node.call_line = None;
                node
            }
        };

        let graph = ctx.into_graph(root);
        info!(
            "Built call graph for '{}': {} nodes, depth {}, {} files",
            entry,
            graph.node_count(),
            graph.max_depth_reached,
            graph.analyzed_files.len()
        );
        Ok(graph)
    }
}

/// A resolved call target
type Target = (Rc<ParsedFile>, FunctionSignature);

/// State of one build
struct BuildContext<'a> {
    root: &'a Path,
    options: &'a CallGraphOptions,
    extractor: CodeExtractor,
    /// Parsed files by absolute path; `None` records an unreadable file
    cache: HashMap<PathBuf, Option<Rc<ParsedFile>>>,
    /// `file:name` and `file:Owner.name` keys on the current recursion path
    active: HashSet<String>,
    all_functions: BTreeMap<String, FunctionSignature>,
    circular: Vec<CircularReference>,
    unresolved: Vec<UnresolvedCall>,
    analyzed: Vec<String>,
    max_depth_reached: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> BuildContext<'a> {
    fn new(
        root: &'a Path,
        options: &'a CallGraphOptions,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Self> {
        Ok(Self {
            root,
            options,
            extractor: CodeExtractor::new()?,
            cache: HashMap::new(),
            active: HashSet::new(),
            all_functions: BTreeMap::new(),
            circular: Vec::new(),
            unresolved: Vec::new(),
            analyzed: Vec::new(),
            max_depth_reached: 0,
            cancel,
        })
    }

    fn into_graph(self, root: CallGraphNode) -> CallGraph {
        CallGraph {
            root,
            all_functions: self.all_functions,
            circular_references: self.circular,
            unresolved_calls: self.unresolved,
            max_depth_reached: self.max_depth_reached,
            analyzed_files: self.analyzed,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Parse a file at most once per build
    fn load(&mut self, path: &Path) -> Option<Rc<ParsedFile>> {
        if let Some(cached) = self.cache.get(path) {
            return cached.clone();
        }

        let parsed = match std::fs::read_to_string(path) {
            Ok(content) => Some(Rc::new(self.extractor.parse_file(path, &content))),
            Err(e) => {
                warn!("Skipping unreadable file {:?}: {}", path, e);
                None
            }
        };
        self.cache.insert(path.to_path_buf(), parsed.clone());
        parsed
    }

    /// Candidate files for the entry search, in sorted order
    fn source_files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_str().unwrap_or("");
                !name.starts_with('.') && name != "node_modules" && name != "target"
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| self.options.extensions.iter().any(|x| x == ext))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn find_entry(&mut self, entry: &str) -> Option<Target> {
        let (owner, name) = match entry.rsplit_once("::").or_else(|| entry.rsplit_once('.')) {
            Some((owner, name)) => (Some(owner), name),
            None => (None, entry),
        };

        for path in self.source_files() {
            let Some(file) = self.load(&path) else {
                continue;
            };
            let structure = &file.structure;
            let found = match owner {
                Some(owner) => structure
                    .classes
                    .iter()
                    .filter(|c| c.name == owner)
                    .find_map(|c| c.method(name))
                    .cloned(),
                None => structure
                    .function(name)
                    .or_else(|| structure.method(name).map(|(_, m)| m))
                    .cloned(),
            };
            if let Some(signature) = found {
                debug!("Entry '{}' found in {:?}", entry, path);
                return Some((file, signature));
            }
        }
        None
    }

    // ==================== Node construction ====================

    fn build_node(
        &mut self,
        file: Rc<ParsedFile>,
        signature: FunctionSignature,
        depth: usize,
        call_line: Option<usize>,
    ) -> CallGraphNode {
        let file_path = file.structure.file_path.clone();
        self.max_depth_reached = self.max_depth_reached.max(depth);
        self.all_functions
            .insert(signature.name.clone(), signature.clone());
        if !self.analyzed.contains(&file_path) {
            self.analyzed.push(file_path.clone());
        }

        let mut node = CallGraphNode::new(signature.clone(), &file_path, depth);
        node.call_line = call_line;

        if depth >= self.options.max_depth || self.is_cancelled() {
            node.truncated = true;
            return node;
        }

        let key = active_key(&file, &signature);
        self.active.insert(key.clone());

        if let Some(body) = file.function_node(&signature) {
            for (call, line) in collect_calls(body) {
                if let Some(child) = self.resolve_call(&file, &signature.name, call, line, depth + 1) {
                    node.calls.push(child);
                }
            }
            if self.options.extract_conditionals {
                node.conditional_paths =
                    self.conditional_paths(&file, &signature.name, body, depth + 1);
            }
            if self.options.track_exceptions {
                node.exception_paths = exception_paths(body);
            }
        } else {
            debug!("No body found for {} in {}", signature.name, file_path);
        }

        // Leaving the active path lets sibling branches expand this function again
        self.active.remove(&key);
        node
    }

    fn resolve_call(
        &mut self,
        file: &Rc<ParsedFile>,
        caller: &str,
        call: &CallExpr,
        line: usize,
        depth: usize,
    ) -> Option<CallGraphNode> {
        match self.resolve_target(file, call) {
            Some((target_file, signature)) => {
                let target_path = target_file.structure.file_path.clone();
                if self.active.contains(&active_key(&target_file, &signature)) {
                    self.record_circular(caller, &signature.name, &target_path);
                    self.max_depth_reached = self.max_depth_reached.max(depth);
                    let mut node = CallGraphNode::new(signature, &target_path, depth);
                    node.call_line = Some(line);
                    node.truncated = true;
                    return Some(node);
                }
                Some(self.build_node(target_file, signature, depth, Some(line)))
            }
            None if is_builtin(call) && !self.imported_from_project(file, call) => None,
            None => {
                let file_path = file.structure.file_path.clone();
                self.record_unresolved(&file_path, line, &call.name);
                self.max_depth_reached = self.max_depth_reached.max(depth);
                Some(CallGraphNode::external(&call.name, &file_path, line, depth))
            }
        }
    }

    fn conditional_paths(
        &mut self,
        file: &Rc<ParsedFile>,
        caller: &str,
        body: &SyntaxNode,
        depth: usize,
    ) -> Vec<ConditionalPath> {
        let mut conditionals = Vec::new();
        for child in &body.children {
            collect_conditionals(child, &mut conditionals);
        }

        let mut paths = Vec::new();
        for conditional in conditionals {
            let NodeKind::Conditional(expr) = &conditional.kind else {
                continue;
            };
            let kind = match expr.kind {
                ConditionalKind::If => "if",
                ConditionalKind::Ternary => "ternary",
                ConditionalKind::Switch => "switch",
            };

            for branch in &conditional.children {
                let NodeKind::Branch(arm) = &branch.kind else {
                    continue;
                };
                let mut calls = Vec::new();
                for (call, line) in collect_calls(branch) {
                    if let Some(node) = self.resolve_call(file, caller, call, line, depth) {
                        calls.push(node);
                    }
                }
                paths.push(ConditionalPath {
                    kind: kind.to_string(),
                    condition: expr.condition.clone(),
                    branch: arm.to_string(),
                    line: branch.start_line,
                    calls,
                });
            }
        }
        paths
    }

    // ==================== Resolution ====================

    /// Same-file function, then same-file method for method calls, then imports
    fn resolve_target(&mut self, file: &Rc<ParsedFile>, call: &CallExpr) -> Option<Target> {
        let structure = &file.structure;

        if let Some(function) = structure.function(&call.name) {
            return Some((file.clone(), function.clone()));
        }

        if call.is_method_call() {
            let receiver = call.receiver.as_deref().unwrap_or_default();
            let preferred = structure
                .classes
                .iter()
                .find(|c| c.name == receiver)
                .and_then(|c| c.method(&call.name));
            if let Some(method) = preferred.or_else(|| structure.method(&call.name).map(|(_, m)| m)) {
                return Some((file.clone(), method.clone()));
            }
        }

        if !self.options.resolve_imports {
            return None;
        }

        let importer = PathBuf::from(&structure.file_path);
        let language = structure.language;
        for (specifier, name) in import_candidates(file, call) {
            if let Some(target) = self.lookup_in_module(&importer, &specifier, name.as_deref()) {
                return Some(target);
            }
        }

        // Rust paths need no `use`: `util::helper()`, `super::helper()`
        if language == Some(Language::Rust) {
            if let Some(receiver) = call.receiver.as_deref() {
                if receiver.starts_with(|c: char| c.is_ascii_lowercase()) && !receiver.contains('.') {
                    return self.lookup_in_module(&importer, receiver, Some(&call.name));
                }
            }
        }
        None
    }

    /// Whether the call's receiver head (or bare name) is bound by a project import
    fn imported_from_project(&self, file: &ParsedFile, call: &CallExpr) -> bool {
        let head = match call.receiver.as_deref() {
            Some(receiver) => receiver
                .split(|c| c == '.' || c == ':')
                .next()
                .unwrap_or(receiver),
            None => call.name.as_str(),
        };
        let importer = PathBuf::from(&file.structure.file_path);
        let resolver = ModuleResolver::new(self.root, self.options);
        file.structure
            .imports
            .iter()
            .any(|i| i.binds(head) && resolver.is_project_specifier(&importer, &i.source))
    }

    /// Find `name` (or the default export when `None`) in the module behind `specifier`
    fn lookup_in_module(
        &mut self,
        importer: &Path,
        specifier: &str,
        name: Option<&str>,
    ) -> Option<Target> {
        let resolver = ModuleResolver::new(self.root, self.options);
        let Some(path) = resolver.resolve(importer, specifier) else {
            debug!("Import '{}' does not resolve to a project file", specifier);
            return None;
        };
        let target = self.load(&path)?;

        let name = match name {
            Some(name) => name.to_string(),
            None => target
                .structure
                .exports
                .iter()
                .find(|e| e.is_default)
                .map(|e| e.name.clone())?,
        };

        let found = target
            .structure
            .function(&name)
            .or_else(|| target.structure.method(&name).map(|(_, m)| m))
            .cloned();
        match found {
            Some(signature) => Some((target, signature)),
            None => {
                warn!("'{}' not found in {:?} imported as '{}'", name, path, specifier);
                None
            }
        }
    }

    // ==================== Metadata ====================

    fn record_circular(&mut self, from: &str, to: &str, file_path: &str) {
        let exists = self
            .circular
            .iter()
            .any(|c| c.from == from && c.to == to && c.file_path == file_path);
        if !exists {
            debug!("Circular reference {} -> {}", from, to);
            self.circular.push(CircularReference {
                from: from.to_string(),
                to: to.to_string(),
                file_path: file_path.to_string(),
            });
        }
    }

    fn record_unresolved(&mut self, file_path: &str, line: usize, name: &str) {
        let exists = self
            .unresolved
            .iter()
            .any(|u| u.file_path == file_path && u.line == line && u.name == name);
        if !exists {
            self.unresolved.push(UnresolvedCall {
                file_path: file_path.to_string(),
                line,
                name: name.to_string(),
            });
        }
    }
}

/// Active-path key; methods are qualified by their class
fn active_key(file: &ParsedFile, signature: &FunctionSignature) -> String {
    let owner = file.structure.classes.iter().find(|c| {
        c.methods
            .iter()
            .any(|m| m.name == signature.name && m.start_line == signature.start_line)
    });
    match owner {
        Some(class) => format!("{}:{}.{}", file.structure.file_path, class.name, signature.name),
        None => format!("{}:{}", file.structure.file_path, signature.name),
    }
}

/// Module specifiers (and names to look up there) through which a call may resolve
fn import_candidates(file: &ParsedFile, call: &CallExpr) -> Vec<(String, Option<String>)> {
    let language = file.structure.language;
    let join = |source: &str, member: &str| -> String {
        match language {
            Some(Language::Rust) if source.is_empty() => member.to_string(),
            Some(Language::Rust) => format!("{}::{}", source, member),
            Some(Language::Python) if source.ends_with('.') => format!("{}{}", source, member),
            Some(Language::Python) => format!("{}.{}", source, member),
            _ => format!("{}/{}", source.trim_end_matches('/'), member),
        }
    };

    let mut candidates = Vec::new();
    for import in &file.structure.imports {
        match call.receiver.as_deref() {
            None => {
                if import.specifiers.iter().any(|s| s.local == call.name) {
                    let imported = import.imported_name(&call.name);
                    candidates.push((import.source.clone(), Some(imported.to_string())));
                }
                if import.default_import.as_deref() == Some(call.name.as_str()) {
                    candidates.push((import.source.clone(), None));
                }
            }
            Some(receiver) => {
                let head = receiver.split('.').next().unwrap_or(receiver);
                if import.namespace.as_deref() == Some(receiver)
                    || import.default_import.as_deref() == Some(head)
                {
                    candidates.push((import.source.clone(), Some(call.name.clone())));
                }
                if import.specifiers.iter().any(|s| s.local == receiver) {
                    // the binding is a submodule, or an object exported by the module
                    let imported = import.imported_name(receiver);
                    candidates.push((join(&import.source, imported), Some(call.name.clone())));
                    candidates.push((import.source.clone(), Some(call.name.clone())));
                }
            }
        }
    }
    candidates
}

/// Call expressions in a subtree, in source order, with their lines
fn collect_calls(node: &SyntaxNode) -> Vec<(&CallExpr, usize)> {
    fn walk<'n>(node: &'n SyntaxNode, out: &mut Vec<(&'n CallExpr, usize)>) {
        for child in &node.children {
            if let NodeKind::Call(call) = &child.kind {
                out.push((call, child.start_line));
            }
            walk(child, out);
        }
    }

    let mut calls = Vec::new();
    walk(node, &mut calls);
    calls
}

fn collect_conditionals<'n>(node: &'n SyntaxNode, out: &mut Vec<&'n SyntaxNode>) {
    if matches!(node.kind, NodeKind::Conditional(_)) {
        out.push(node);
    }
    for child in &node.children {
        collect_conditionals(child, out);
    }
}

/// Throw-like statements with their lexical try-block status
fn exception_paths(body: &SyntaxNode) -> Vec<ExceptionPath> {
    fn walk(node: &SyntaxNode, in_try: bool, out: &mut Vec<ExceptionPath>) {
        match &node.kind {
            NodeKind::Throw(throw) => {
                out.push(ExceptionPath {
                    exception_type: throw.exception_type(),
                    line: node.start_line,
                    in_try_block: in_try,
                    text: throw.text.clone(),
                });
                for child in &node.children {
                    walk(child, in_try, out);
                }
            }
            NodeKind::Try => {
                for child in &node.children {
                    let guarded = !matches!(child.kind, NodeKind::Catch | NodeKind::Finally);
                    walk(child, in_try || guarded, out);
                }
            }
            _ => {
                for child in &node.children {
                    walk(child, in_try, out);
                }
            }
        }
    }

    let mut paths = Vec::new();
    for child in &body.children {
        walk(child, false, &mut paths);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    fn build(dir: &tempfile::TempDir, entry: &str, options: CallGraphOptions) -> CallGraph {
        CallGraphBuilder::new(dir.path(), options).build(entry).unwrap()
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let dir = project(&[(
            "src/app.ts",
            "export function main() {\n  helper();\n}\n\nfunction helper() {\n  main();\n}\n",
        )]);

        let graph = build(&dir, "main", CallGraphOptions::default());

        assert_eq!(graph.circular_references.len(), 1);
        assert_eq!(graph.circular_references[0].from, "helper");
        assert_eq!(graph.circular_references[0].to, "main");
        assert!(graph.max_depth_reached <= 3);

        let helper = &graph.root.calls[0];
        assert_eq!(helper.name(), "helper");
        let back_edge = &helper.calls[0];
        assert_eq!(back_edge.name(), "main");
        assert!(back_edge.truncated);
        assert!(back_edge.calls.is_empty());
    }

    #[test]
    fn test_self_recursion_reports_one_cycle() {
        let dir = project(&[(
            "src/math.ts",
            "function fact(n: number): number {\n  if (n <= 1) { return 1; }\n  return n * fact(n - 1);\n}\n",
        )]);

        let graph = build(&dir, "fact", CallGraphOptions::default());

        assert_eq!(graph.circular_references.len(), 1);
        assert_eq!(graph.circular_references[0].from, "fact");
        assert_eq!(graph.circular_references[0].to, "fact");
        assert!(graph.root.calls[0].truncated);
        assert_eq!(graph.root.calls[0].depth, 1);
    }

    #[test]
    fn test_unresolved_call_recorded_once() {
        let dir = project(&[(
            "src/app.ts",
            "function main(flag: boolean) {\n  if (flag) {\n    mystery();\n  }\n  console.log('done');\n}\n",
        )]);

        let graph = build(&dir, "main", CallGraphOptions::default());

        assert_eq!(graph.unresolved_calls.len(), 1);
        let unresolved = &graph.unresolved_calls[0];
        assert_eq!(unresolved.name, "mystery");
        assert_eq!(unresolved.line, 3);
        assert!(unresolved.file_path.ends_with("app.ts"));

        let external = &graph.root.calls[0];
        assert!(external.is_external);
        assert!(external.truncated);
        assert_eq!(graph.root.conditional_paths[0].calls.len(), 1);
    }

    #[test]
    fn test_depth_limit_truncates() {
        let dir = project(&[(
            "src/chain.ts",
            "function a() { b(); }\nfunction b() { c(); }\nfunction c() { d(); }\nfunction d() { e(); }\nfunction e() {}\n",
        )]);

        let graph = build(&dir, "a", CallGraphOptions::default().with_max_depth(2));

        assert_eq!(graph.max_depth_reached, 2);
        for node in graph.root.walk() {
            assert!(node.depth <= 2);
            if node.depth == 2 {
                assert!(node.truncated);
                assert!(node.calls.is_empty());
            }
        }
        assert!(!graph.all_functions.contains_key("d"));
    }

    #[test]
    fn test_max_depth_reached_can_be_shallower() {
        let dir = project(&[("src/a.ts", "function a() { b(); }\nfunction b() {}\n")]);

        let graph = build(&dir, "a", CallGraphOptions::default().with_max_depth(5));
        assert_eq!(graph.max_depth_reached, 1);
    }

    #[test]
    fn test_build_is_idempotent() {
        let dir = project(&[
            ("src/main.ts", "import { helper } from './util';\nexport function main() { helper(); run(); }\nfunction run() { helper(); }\n"),
            ("src/util.ts", "export function helper() { return 1; }\n"),
        ]);

        let first = build(&dir, "main", CallGraphOptions::default());
        let second = build(&dir, "main", CallGraphOptions::default());

        assert_eq!(
            first.all_functions.keys().collect::<Vec<_>>(),
            second.all_functions.keys().collect::<Vec<_>>()
        );
        assert_eq!(first.max_depth_reached, second.max_depth_reached);
    }

    #[test]
    fn test_sibling_branches_repeat_shared_callee() {
        let dir = project(&[(
            "src/app.ts",
            "function main() { left(); right(); }\nfunction left() { shared(); }\nfunction right() { shared(); }\nfunction shared() {}\n",
        )]);

        let graph = build(&dir, "main", CallGraphOptions::default());

        let shared: Vec<&CallGraphNode> = graph
            .root
            .walk()
            .into_iter()
            .filter(|n| n.name() == "shared")
            .collect();
        assert_eq!(shared.len(), 2);
        assert!(shared.iter().all(|n| !n.truncated));
        assert!(graph.circular_references.is_empty());
    }

    #[test]
    fn test_cross_file_import_resolution() {
        let dir = project(&[
            ("src/main.ts", "import { format as fmt } from './lib/format';\nimport * as math from '@/lib/math';\nexport function main() {\n  fmt(math.add(1, 2));\n}\n"),
            ("src/lib/format.ts", "export function format(value: number): string { return String(value); }\n"),
            ("src/lib/math.ts", "export function add(a: number, b: number): number { return a + b; }\n"),
        ]);

        let graph = build(&dir, "main", CallGraphOptions::default());

        let names: Vec<&str> = graph.root.calls.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["format", "add"]);
        assert!(graph.root.calls[0].file_path.ends_with("format.ts"));
        assert_eq!(graph.analyzed_files.len(), 3);
        assert!(graph.unresolved_calls.is_empty());

        let options = CallGraphOptions {
            resolve_imports: false,
            ..Default::default()
        };
        let graph = build(&dir, "main", options);
        assert_eq!(graph.unresolved_calls.len(), 2);
    }

    #[test]
    fn test_missing_entry_yields_empty_graph() {
        let dir = project(&[("src/a.ts", "function a() {}\n")]);

        let graph = build(&dir, "nowhere", CallGraphOptions::default());

        assert!(graph.root.is_external);
        assert!(graph.root.truncated);
        assert!(graph.root.calls.is_empty());
        assert_eq!(graph.unresolved_calls.len(), 1);
        assert_eq!(graph.unresolved_calls[0].name, "nowhere");
        assert!(graph.all_functions.is_empty());
    }

    #[test]
    fn test_conditional_and_exception_paths() {
        let dir = project(&[(
            "src/svc.ts",
            "function save(x) {\n  if (x.valid) {\n    store(x);\n  } else {\n    reject(x);\n  }\n  try {\n    throw new ValidationError('bad');\n  } catch (e) {\n    throw e;\n  }\n}\nfunction store(x) {}\nfunction reject(x) {}\n",
        )]);

        let graph = build(&dir, "save", CallGraphOptions::default());

        let paths = &graph.root.conditional_paths;
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].branch, "then");
        assert_eq!(paths[0].condition, "x.valid");
        assert_eq!(paths[0].calls[0].name(), "store");
        assert_eq!(paths[1].branch, "else");
        assert_eq!(paths[1].calls[0].name(), "reject");

        let throws = &graph.root.exception_paths;
        assert_eq!(throws.len(), 2);
        assert_eq!(throws[0].exception_type, "ValidationError");
        assert!(throws[0].in_try_block);
        assert_eq!(throws[1].exception_type, "e");
        assert!(!throws[1].in_try_block);

        let options = CallGraphOptions {
            extract_conditionals: false,
            track_exceptions: false,
            ..Default::default()
        };
        let graph = build(&dir, "save", options);
        assert!(graph.root.conditional_paths.is_empty());
        assert!(graph.root.exception_paths.is_empty());
    }

    #[test]
    fn test_cancel_flag_truncates() {
        let dir = project(&[("src/a.ts", "function a() { b(); }\nfunction b() {}\n")]);
        let flag = Arc::new(AtomicBool::new(true));

        let graph = CallGraphBuilder::new(dir.path(), CallGraphOptions::default())
            .with_cancel_flag(flag)
            .build("a")
            .unwrap();

        assert!(graph.root.truncated);
        assert!(graph.root.calls.is_empty());
    }

    #[test]
    fn test_python_relative_import_and_method_entry() {
        let dir = project(&[
            ("app/service.py", "from .repo import load\n\nclass Service:\n    def run(self, key):\n        return self.fetch(key)\n\n    def fetch(self, key):\n        return load(key)\n"),
            ("app/repo.py", "def load(key):\n    raise KeyError(key)\n"),
        ]);

        let graph = build(&dir, "Service.run", CallGraphOptions::default());

        let fetch = &graph.root.calls[0];
        assert_eq!(fetch.name(), "fetch");
        let load = &fetch.calls[0];
        assert_eq!(load.name(), "load");
        assert!(load.file_path.ends_with("repo.py"));
        assert_eq!(load.exception_paths[0].exception_type, "KeyError");
    }

    #[test]
    fn test_rust_crate_paths() {
        let dir = project(&[
            ("src/lib.rs", "mod util;\nuse crate::util::normalize;\n\npub fn entry(s: &str) -> String {\n    let t = normalize(s);\n    util::finish(t)\n}\n"),
            ("src/util.rs", "pub fn normalize(s: &str) -> String { s.trim().to_string() }\npub fn finish(s: String) -> String { s }\n"),
        ]);

        let graph = build(&dir, "entry", CallGraphOptions::default());

        let names: Vec<&str> = graph.root.calls.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["normalize", "finish"]);
        assert!(graph.unresolved_calls.is_empty());
    }

    #[test]
    fn test_imported_namespace_is_not_builtin() {
        let dir = project(&[(
            "src/main.ts",
            "import * as math from './nope';\nexport function main() {\n  math.add(1, 2);\n  Math.max(1, 2);\n}\n",
        )]);

        let graph = build(&dir, "main", CallGraphOptions::default());

        assert_eq!(graph.unresolved_calls.len(), 1);
        assert_eq!(graph.unresolved_calls[0].name, "add");
        assert_eq!(graph.unresolved_calls[0].line, 3);
        assert_eq!(graph.root.calls.len(), 1);
        assert!(graph.root.calls[0].is_external);
    }

    #[test]
    fn test_unreadable_import_target_is_unresolved() {
        let dir = project(&[(
            "src/main.ts",
            "import { helper } from './util';\nexport function main() {\n  helper();\n}\n",
        )]);
        fs::write(dir.path().join("src/util.ts"), [0xff, 0xfe, 0x00]).unwrap();

        let graph = CallGraphBuilder::new(dir.path(), CallGraphOptions::default())
            .build("main")
            .unwrap();

        assert_eq!(graph.unresolved_calls.len(), 1);
        assert_eq!(graph.unresolved_calls[0].name, "helper");
        assert!(graph.root.calls[0].is_external);
        assert_eq!(graph.analyzed_files.len(), 1);
    }

    #[test]
    fn test_method_and_function_with_same_name_are_not_circular() {
        let dir = project(&[(
            "src/store.ts",
            "export class Store {\n  save(x) {\n    save(x);\n  }\n}\nexport function save(x) {\n  persist(x);\n}\nfunction persist(x) {}\n",
        )]);

        let graph = build(&dir, "Store.save", CallGraphOptions::default());

        assert!(graph.circular_references.is_empty());
        let save = &graph.root.calls[0];
        assert_eq!(save.name(), "save");
        assert!(!save.truncated);
        assert_eq!(save.calls[0].name(), "persist");
    }
}
