//! Import specifier resolution and the built-in name list

use super::CallGraphOptions;
use crate::extract::Language;
use crate::syntax::CallExpr;
use std::path::{Component, Path, PathBuf};

/// Free functions provided by the language runtimes
const BUILTIN_FUNCTIONS: &[&str] = &[
    // JavaScript / TypeScript
    "require", "setTimeout", "setInterval", "clearTimeout", "clearInterval", "parseInt",
    "parseFloat", "isNaN", "isFinite", "encodeURIComponent", "decodeURIComponent", "fetch",
    "String", "Number", "Boolean", "Symbol", "BigInt", "Array", "Object", "Date", "Error",
    "Promise", "Map", "Set", "RegExp", "structuredClone", "queueMicrotask",
    // Python
    "print", "len", "range", "str", "int", "float", "bool", "list", "dict", "set", "tuple",
    "isinstance", "issubclass", "hasattr", "getattr", "setattr", "super", "open", "enumerate",
    "zip", "map", "filter", "sorted", "reversed", "min", "max", "sum", "any", "all", "abs",
    "round", "repr", "type", "id", "iter", "next", "format", "input", "vars", "dir",
    "ValueError", "TypeError", "KeyError", "RuntimeError", "Exception",
    // Rust prelude
    "Some", "Ok", "Err", "Box", "Vec", "drop",
];

/// Receivers whose methods are runtime library calls
const BUILTIN_RECEIVERS: &[&str] = &[
    "console", "Math", "JSON", "Object", "Array", "Promise", "Number", "String", "Date",
    "Reflect", "process", "window", "document", "globalThis", "Symbol", "Buffer", "os", "sys",
    "re", "json", "math", "logging", "logger", "log", "asyncio", "std", "Vec",
    "HashMap", "HashSet", "BTreeMap", "Box", "Rc", "Arc", "Path", "PathBuf", "fs", "path",
];

/// Common methods of built-in collections and strings
const BUILTIN_METHODS: &[&str] = &[
    // JavaScript / TypeScript
    "push", "pop", "shift", "unshift", "slice", "splice", "map", "filter", "reduce", "forEach",
    "find", "findIndex", "some", "every", "includes", "indexOf", "join", "split", "concat",
    "sort", "reverse", "keys", "values", "entries", "then", "catch", "finally", "toString",
    "trim", "replace", "toLowerCase", "toUpperCase", "startsWith", "endsWith", "has", "get",
    "set", "delete", "add", "clear", "apply", "call", "bind",
    // Python
    "append", "extend", "insert", "remove", "items", "update", "strip", "lower", "upper",
    "format", "encode", "decode", "startswith", "endswith", "setdefault",
    // Rust
    "iter", "iter_mut", "into_iter", "collect", "clone", "unwrap", "expect", "unwrap_or",
    "unwrap_or_default", "unwrap_or_else", "ok", "ok_or", "ok_or_else", "map_err", "and_then",
    "to_string", "to_owned", "as_str", "as_ref", "len", "is_empty", "contains", "insert",
    "push_str", "trim", "lines", "chars", "context", "with_context", "is_some", "is_none",
];

/// Whether a call targets a well-known platform or library built-in
pub fn is_builtin(call: &CallExpr) -> bool {
    match call.receiver.as_deref() {
        None => BUILTIN_FUNCTIONS.contains(&call.name.as_str()),
        Some(receiver) => {
            let head = receiver
                .split(|c| c == '.' || c == ':')
                .next()
                .unwrap_or(receiver);
            BUILTIN_RECEIVERS.contains(&head) || BUILTIN_METHODS.contains(&call.name.as_str())
        }
    }
}

/// Maps import specifiers to files on disk
pub struct ModuleResolver<'a> {
    root: &'a Path,
    options: &'a CallGraphOptions,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(root: &'a Path, options: &'a CallGraphOptions) -> Self {
        Self { root, options }
    }

    /// Resolve `specifier` as imported from `importer`
    ///
    /// Bare package names (`react`, `numpy`, `serde`) resolve to nothing.
    pub fn resolve(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        match Language::from_path(importer)? {
            Language::TypeScript | Language::Tsx | Language::JavaScript => {
                self.resolve_script(importer, specifier)
            }
            Language::Python => self.resolve_python(importer, specifier),
            Language::Rust => self.resolve_rust(importer, specifier),
        }
    }

    /// Whether `specifier` names project code rather than a package,
    /// even when the target file is missing
    pub fn is_project_specifier(&self, importer: &Path, specifier: &str) -> bool {
        specifier.starts_with('.')
            || ["crate", "super", "self"]
                .iter()
                .any(|p| specifier == *p || specifier.starts_with(&format!("{}::", p)))
            || self
                .options
                .path_aliases
                .iter()
                .any(|(prefix, _)| specifier.starts_with(prefix.as_str()))
            || self.resolve(importer, specifier).is_some()
    }

    fn resolve_script(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        let base = if specifier.starts_with('.') {
            importer.parent()?.join(specifier)
        } else {
            let (prefix, target) = self
                .options
                .path_aliases
                .iter()
                .find(|(prefix, _)| specifier.starts_with(prefix.as_str()))?;
            self.root.join(target).join(&specifier[prefix.len()..])
        };
        let base = normalize(&base);

        if base.is_file() {
            return Some(base);
        }

        for ext in &self.options.extensions {
            let candidate = append_extension(&base, ext);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        // `./util.js` written for a `util.ts` source
        if base.extension().is_some() {
            let stem = base.with_extension("");
            for ext in &self.options.extensions {
                let candidate = append_extension(&stem, ext);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        if base.is_dir() {
            for ext in &self.options.extensions {
                let candidate = base.join(format!("index.{}", ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }

    fn resolve_python(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        let dots = specifier.chars().take_while(|c| *c == '.').count();
        let rest = &specifier[dots..];
        let parts: Vec<&str> = rest.split('.').filter(|p| !p.is_empty()).collect();

        let bases: Vec<PathBuf> = if dots > 0 {
            let mut dir = importer.parent()?.to_path_buf();
            for _ in 1..dots {
                dir = dir.parent()?.to_path_buf();
            }
            vec![dir]
        } else {
            vec![self.root.to_path_buf(), self.root.join("src"), importer.parent()?.to_path_buf()]
        };

        for base in bases {
            let module = parts.iter().fold(base, |path, part| path.join(part));
            let file = module.with_extension("py");
            if !parts.is_empty() && file.is_file() {
                return Some(file);
            }
            let package = module.join("__init__.py");
            if package.is_file() {
                return Some(package);
            }
        }
        None
    }

    fn resolve_rust(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        let mut segments = specifier.split("::").filter(|s| !s.is_empty()).peekable();

        let mut dir = match segments.peek().copied() {
            Some("crate") => {
                segments.next();
                crate_src_dir(importer).unwrap_or_else(|| self.root.join("src"))
            }
            Some("super") => {
                let mut dir = module_dir(importer)?;
                while segments.peek() == Some(&"super") {
                    segments.next();
                    dir = dir.parent()?.to_path_buf();
                }
                dir
            }
            Some("self") => {
                segments.next();
                module_dir(importer)?
            }
            // sibling module declared with `mod name;`
            Some(_) => module_dir(importer)?,
            None => return None,
        };

        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return rust_module_file(&dir);
        }
        for segment in &rest {
            dir = dir.join(segment);
        }
        rust_module_file(&dir)
    }
}

/// Directory holding the children of the module defined by `file`
fn module_dir(file: &Path) -> Option<PathBuf> {
    let parent = file.parent()?;
    let stem = file.file_stem()?.to_str()?;
    if matches!(stem, "mod" | "lib" | "main") {
        Some(parent.to_path_buf())
    } else {
        Some(parent.join(stem))
    }
}

/// Nearest ancestor `src` directory, the crate root for `crate::` paths
fn crate_src_dir(file: &Path) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .find(|dir| dir.join("lib.rs").is_file() || dir.join("main.rs").is_file())
        .map(Path::to_path_buf)
}

/// `a/b` → `a/b.rs`, `a/b/mod.rs`, or the crate root file for a crate directory
fn rust_module_file(path: &Path) -> Option<PathBuf> {
    let file = path.with_extension("rs");
    if path.file_name().is_some() && file.is_file() {
        return Some(file);
    }
    ["mod.rs", "lib.rs", "main.rs"]
        .iter()
        .map(|name| path.join(name))
        .find(|candidate| candidate.is_file())
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Lexically resolve `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn call(name: &str, receiver: Option<&str>) -> CallExpr {
        CallExpr {
            name: name.to_string(),
            receiver: receiver.map(str::to_string),
        }
    }

    #[test]
    fn test_builtins() {
        assert!(is_builtin(&call("log", Some("console"))));
        assert!(is_builtin(&call("push", Some("items"))));
        assert!(is_builtin(&call("print", None)));
        assert!(!is_builtin(&call("helper", None)));
        assert!(!is_builtin(&call("save", Some("this.repo"))));
    }

    #[test]
    fn test_resolve_script_specifiers() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/lib/models")).unwrap();
        fs::write(root.join("src/main.ts"), "").unwrap();
        fs::write(root.join("src/lib/util.ts"), "").unwrap();
        fs::write(root.join("src/lib/models/index.ts"), "").unwrap();

        let options = CallGraphOptions::default();
        let resolver = ModuleResolver::new(root, &options);
        let importer = root.join("src/main.ts");

        assert_eq!(
            resolver.resolve(&importer, "./lib/util"),
            Some(root.join("src/lib/util.ts"))
        );
        assert_eq!(
            resolver.resolve(&importer, "./lib/util.js"),
            Some(root.join("src/lib/util.ts"))
        );
        assert_eq!(
            resolver.resolve(&importer, "./lib/models"),
            Some(root.join("src/lib/models/index.ts"))
        );
        assert_eq!(
            resolver.resolve(&importer, "@/lib/util"),
            Some(root.join("src/lib/util.ts"))
        );
        assert_eq!(resolver.resolve(&importer, "react"), None);
    }

    #[test]
    fn test_resolve_python_modules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/services")).unwrap();
        fs::write(root.join("app/main.py"), "").unwrap();
        fs::write(root.join("app/utils.py"), "").unwrap();
        fs::write(root.join("app/services/__init__.py"), "").unwrap();

        let options = CallGraphOptions::default();
        let resolver = ModuleResolver::new(root, &options);
        let importer = root.join("app/main.py");

        assert_eq!(resolver.resolve(&importer, ".utils"), Some(root.join("app/utils.py")));
        assert_eq!(
            resolver.resolve(&importer, "app.services"),
            Some(root.join("app/services/__init__.py"))
        );
        assert_eq!(resolver.resolve(&importer, "numpy"), None);
    }

    #[test]
    fn test_resolve_rust_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/store")).unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("src/util.rs"), "").unwrap();
        fs::write(root.join("src/store/mod.rs"), "").unwrap();
        fs::write(root.join("src/store/cache.rs"), "").unwrap();

        let options = CallGraphOptions::default();
        let resolver = ModuleResolver::new(root, &options);

        assert_eq!(
            resolver.resolve(&root.join("src/store/cache.rs"), "crate::util"),
            Some(root.join("src/util.rs"))
        );
        assert_eq!(
            resolver.resolve(&root.join("src/store/cache.rs"), "super"),
            Some(root.join("src/store/mod.rs"))
        );
        assert_eq!(
            resolver.resolve(&root.join("src/lib.rs"), "store::cache"),
            Some(root.join("src/store/cache.rs"))
        );
        assert_eq!(resolver.resolve(&root.join("src/lib.rs"), "crate"), Some(root.join("src/lib.rs")));
    }
}
