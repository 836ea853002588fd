//! Structural diff between two models of the same file
//!
//! Symbols are matched by name within each category. Only the externally
//! visible shape is compared: a function whose body changed but whose
//! signature, async-ness and export status did not produces no diff.

use super::model::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happened to a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl std::fmt::Display for DiffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffKind::Added => write!(f, "added"),
            DiffKind::Removed => write!(f, "removed"),
            DiffKind::Modified => write!(f, "modified"),
            DiffKind::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Symbol category a diff is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffCategory {
    Function,
    Class,
    Interface,
    Type,
    Import,
    Export,
}

impl std::fmt::Display for DiffCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffCategory::Function => write!(f, "function"),
            DiffCategory::Class => write!(f, "class"),
            DiffCategory::Interface => write!(f, "interface"),
            DiffCategory::Type => write!(f, "type"),
            DiffCategory::Import => write!(f, "import"),
            DiffCategory::Export => write!(f, "export"),
        }
    }
}

/// How much a change matters to consumers of the symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Patch,
    Minor,
    Major,
    Breaking,
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactLevel::Patch => write!(f, "patch"),
            ImpactLevel::Minor => write!(f, "minor"),
            ImpactLevel::Major => write!(f, "major"),
            ImpactLevel::Breaking => write!(f, "breaking"),
        }
    }
}

/// One structural change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDiff {
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub category: DiffCategory,
    pub symbol_name: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_signature: Option<String>,
    pub impact_level: ImpactLevel,
}

impl CodeDiff {
    fn new(
        kind: DiffKind,
        category: DiffCategory,
        symbol_name: &str,
        details: impl Into<String>,
        impact_level: ImpactLevel,
    ) -> Self {
        Self {
            kind,
            category,
            symbol_name: symbol_name.to_string(),
            details: details.into(),
            old_signature: None,
            new_signature: None,
            impact_level,
        }
    }

    fn with_signatures(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_signature = old;
        self.new_signature = new;
        self
    }
}

/// Compare two models of the same file
pub fn diff_structures(old: &FileStructure, new: &FileStructure) -> Vec<CodeDiff> {
    let mut diffs = Vec::new();
    diff_functions(&old.functions, &new.functions, &mut diffs);
    diff_classes(&old.classes, &new.classes, &mut diffs);
    diff_interfaces(&old.interfaces, &new.interfaces, &mut diffs);
    diff_types(&old.types, &new.types, &mut diffs);
    diff_imports(&old.imports, &new.imports, &mut diffs);
    diff_exports(old, new, &mut diffs);
    diffs
}

/// First declaration wins when a name repeats
fn by_name<'a, T>(items: &'a [T], name: impl Fn(&T) -> &str) -> BTreeMap<&'a str, &'a T> {
    let mut map = BTreeMap::new();
    for item in items {
        map.entry(name(item)).or_insert(item);
    }
    map
}

fn removal_impact(exported: bool) -> ImpactLevel {
    if exported {
        ImpactLevel::Breaking
    } else {
        ImpactLevel::Minor
    }
}

fn addition_impact(exported: bool) -> ImpactLevel {
    if exported {
        ImpactLevel::Minor
    } else {
        ImpactLevel::Patch
    }
}

fn describe_params(sig: &FunctionSignature) -> String {
    sig.parameters
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ==================== Functions ====================

/// Impact of a function whose shape changed
pub fn function_change_impact(old: &FunctionSignature, new: &FunctionSignature) -> ImpactLevel {
    let params_changed = old.parameters.len() != new.parameters.len();
    let return_changed = old.return_type != new.return_type;

    if old.is_exported && (params_changed || return_changed) {
        ImpactLevel::Breaking
    } else if old.is_async != new.is_async {
        ImpactLevel::Major
    } else if !old.is_exported && new.is_exported {
        ImpactLevel::Minor
    } else {
        ImpactLevel::Patch
    }
}

fn function_change_details(old: &FunctionSignature, new: &FunctionSignature) -> String {
    let mut parts = Vec::new();
    if old.parameters != new.parameters {
        parts.push(format!(
            "parameters changed from ({}) to ({})",
            describe_params(old),
            describe_params(new)
        ));
    }
    if old.return_type != new.return_type {
        let render = |t: &Option<crate::syntax::TypeRef>| {
            t.as_ref().map(|t| t.to_string()).unwrap_or_else(|| "none".to_string())
        };
        parts.push(format!(
            "return type changed from {} to {}",
            render(&old.return_type),
            render(&new.return_type)
        ));
    }
    if old.is_async != new.is_async {
        parts.push(if new.is_async {
            "became async".to_string()
        } else {
            "is no longer async".to_string()
        });
    }
    if old.is_exported != new.is_exported {
        parts.push(if new.is_exported {
            "is now exported".to_string()
        } else {
            "is no longer exported".to_string()
        });
    }
    if old.visibility != new.visibility {
        parts.push(format!("visibility changed from {} to {}", old.visibility, new.visibility));
    }
    parts.join("; ")
}

fn diff_functions(old: &[FunctionSignature], new: &[FunctionSignature], diffs: &mut Vec<CodeDiff>) {
    let old_map = by_name(old, |f| &f.name);
    let new_map = by_name(new, |f| &f.name);

    for (name, old_fn) in &old_map {
        match new_map.get(name) {
            None => diffs.push(
                CodeDiff::new(
                    DiffKind::Removed,
                    DiffCategory::Function,
                    name,
                    format!("Function '{}' was removed", name),
                    removal_impact(old_fn.is_exported),
                )
                .with_signatures(Some(old_fn.signature_text()), None),
            ),
            Some(new_fn) if old_fn.shape_differs(new_fn) => diffs.push(
                CodeDiff::new(
                    DiffKind::Modified,
                    DiffCategory::Function,
                    name,
                    format!("Function '{}' {}", name, function_change_details(old_fn, new_fn)),
                    function_change_impact(old_fn, new_fn),
                )
                .with_signatures(Some(old_fn.signature_text()), Some(new_fn.signature_text())),
            ),
            Some(_) => {}
        }
    }

    for (name, new_fn) in &new_map {
        if !old_map.contains_key(name) {
            diffs.push(
                CodeDiff::new(
                    DiffKind::Added,
                    DiffCategory::Function,
                    name,
                    format!("Function '{}' was added", name),
                    addition_impact(new_fn.is_exported),
                )
                .with_signatures(None, Some(new_fn.signature_text())),
            );
        }
    }
}

// ==================== Classes and interfaces ====================

fn class_change(old: &ClassInfo, new: &ClassInfo) -> Option<(ImpactLevel, String)> {
    let mut impact = ImpactLevel::Patch;
    let mut notes = Vec::new();
    let mut raise = |level: ImpactLevel, note: String, impact: &mut ImpactLevel| {
        *impact = (*impact).max(level);
        notes.push(note);
    };

    for method in &old.methods {
        match new.method(&method.name) {
            None => raise(
                if old.is_exported { ImpactLevel::Breaking } else { ImpactLevel::Patch },
                format!("method '{}' removed", method.name),
                &mut impact,
            ),
            Some(updated) if method.shape_differs(updated) => {
                let level = if old.is_exported
                    && (method.parameters.len() != updated.parameters.len()
                        || method.return_type != updated.return_type)
                {
                    ImpactLevel::Breaking
                } else if method.is_async != updated.is_async {
                    ImpactLevel::Major
                } else {
                    ImpactLevel::Patch
                };
                raise(
                    level,
                    format!("method '{}' {}", method.name, function_change_details(method, updated)),
                    &mut impact,
                );
            }
            Some(_) => {}
        }
    }
    for method in &new.methods {
        if old.method(&method.name).is_none() {
            raise(ImpactLevel::Patch, format!("method '{}' added", method.name), &mut impact);
        }
    }
    if old.superclass != new.superclass {
        raise(ImpactLevel::Patch, "superclass changed".to_string(), &mut impact);
    }
    if old.implements != new.implements {
        raise(ImpactLevel::Patch, "implemented interfaces changed".to_string(), &mut impact);
    }
    if old.properties != new.properties {
        raise(ImpactLevel::Patch, "properties changed".to_string(), &mut impact);
    }
    if old.is_exported != new.is_exported {
        let level = if new.is_exported { ImpactLevel::Minor } else { ImpactLevel::Patch };
        let note = if new.is_exported { "is now exported" } else { "is no longer exported" };
        raise(level, note.to_string(), &mut impact);
    }

    (!notes.is_empty()).then(|| (impact, notes.join("; ")))
}

fn diff_classes(old: &[ClassInfo], new: &[ClassInfo], diffs: &mut Vec<CodeDiff>) {
    let old_map = by_name(old, |c| &c.name);
    let new_map = by_name(new, |c| &c.name);

    for (name, old_class) in &old_map {
        match new_map.get(name) {
            None => diffs.push(CodeDiff::new(
                DiffKind::Removed,
                DiffCategory::Class,
                name,
                format!("Class '{}' was removed", name),
                removal_impact(old_class.is_exported),
            )),
            Some(new_class) => {
                if let Some((impact, details)) = class_change(old_class, new_class) {
                    diffs.push(CodeDiff::new(
                        DiffKind::Modified,
                        DiffCategory::Class,
                        name,
                        format!("Class '{}': {}", name, details),
                        impact,
                    ));
                }
            }
        }
    }
    for (name, new_class) in &new_map {
        if !old_map.contains_key(name) {
            diffs.push(CodeDiff::new(
                DiffKind::Added,
                DiffCategory::Class,
                name,
                format!("Class '{}' was added", name),
                addition_impact(new_class.is_exported),
            ));
        }
    }
}

fn interface_change(old: &InterfaceInfo, new: &InterfaceInfo) -> Option<(ImpactLevel, String)> {
    let mut impact = ImpactLevel::Patch;
    let mut notes = Vec::new();

    for prop in &old.properties {
        match new.properties.iter().find(|p| p.name == prop.name) {
            None => {
                notes.push(format!("member '{}' removed", prop.name));
                if old.is_exported {
                    impact = ImpactLevel::Breaking;
                }
            }
            Some(updated) if updated != prop => {
                notes.push(format!("member '{}' changed", prop.name));
                if old.is_exported && updated.type_ref != prop.type_ref {
                    impact = ImpactLevel::Breaking;
                }
            }
            Some(_) => {}
        }
    }
    for method in &old.methods {
        match new.methods.iter().find(|m| m.name == method.name) {
            None => {
                notes.push(format!("member '{}' removed", method.name));
                if old.is_exported {
                    impact = ImpactLevel::Breaking;
                }
            }
            Some(updated) if updated.shape_differs(method) => {
                notes.push(format!("member '{}' changed", method.name));
                if old.is_exported
                    && (updated.parameters != method.parameters
                        || updated.return_type != method.return_type)
                {
                    impact = ImpactLevel::Breaking;
                }
            }
            Some(_) => {}
        }
    }

    let old_names: Vec<&str> = old
        .properties
        .iter()
        .map(|p| p.name.as_str())
        .chain(old.methods.iter().map(|m| m.name.as_str()))
        .collect();
    for name in new
        .properties
        .iter()
        .map(|p| p.name.as_str())
        .chain(new.methods.iter().map(|m| m.name.as_str()))
    {
        if !old_names.contains(&name) {
            notes.push(format!("member '{}' added", name));
        }
    }
    if old.extends != new.extends {
        notes.push("extended interfaces changed".to_string());
    }
    if !old.is_exported && new.is_exported {
        notes.push("is now exported".to_string());
        impact = impact.max(ImpactLevel::Minor);
    } else if old.is_exported && !new.is_exported {
        notes.push("is no longer exported".to_string());
    }

    (!notes.is_empty()).then(|| (impact, notes.join("; ")))
}

fn diff_interfaces(old: &[InterfaceInfo], new: &[InterfaceInfo], diffs: &mut Vec<CodeDiff>) {
    let old_map = by_name(old, |i| &i.name);
    let new_map = by_name(new, |i| &i.name);

    for (name, old_iface) in &old_map {
        match new_map.get(name) {
            None => diffs.push(CodeDiff::new(
                DiffKind::Removed,
                DiffCategory::Interface,
                name,
                format!("Interface '{}' was removed", name),
                removal_impact(old_iface.is_exported),
            )),
            Some(new_iface) => {
                if let Some((impact, details)) = interface_change(old_iface, new_iface) {
                    diffs.push(CodeDiff::new(
                        DiffKind::Modified,
                        DiffCategory::Interface,
                        name,
                        format!("Interface '{}': {}", name, details),
                        impact,
                    ));
                }
            }
        }
    }
    for (name, new_iface) in &new_map {
        if !old_map.contains_key(name) {
            diffs.push(CodeDiff::new(
                DiffKind::Added,
                DiffCategory::Interface,
                name,
                format!("Interface '{}' was added", name),
                addition_impact(new_iface.is_exported),
            ));
        }
    }
}

// ==================== Types, imports, exports ====================

fn diff_types(old: &[TypeInfo], new: &[TypeInfo], diffs: &mut Vec<CodeDiff>) {
    let old_map = by_name(old, |t| &t.name);
    let new_map = by_name(new, |t| &t.name);

    for (name, old_type) in &old_map {
        match new_map.get(name) {
            None => diffs.push(
                CodeDiff::new(
                    DiffKind::Removed,
                    DiffCategory::Type,
                    name,
                    format!("Type '{}' was removed", name),
                    removal_impact(old_type.is_exported),
                )
                .with_signatures(Some(old_type.definition.clone()), None),
            ),
            Some(new_type)
                if new_type.definition != old_type.definition
                    || new_type.is_exported != old_type.is_exported =>
            {
                let impact = if old_type.is_exported && new_type.definition != old_type.definition {
                    ImpactLevel::Major
                } else if !old_type.is_exported && new_type.is_exported {
                    ImpactLevel::Minor
                } else {
                    ImpactLevel::Patch
                };
                diffs.push(
                    CodeDiff::new(
                        DiffKind::Modified,
                        DiffCategory::Type,
                        name,
                        format!(
                            "Type '{}' changed from `{}` to `{}`",
                            name, old_type.definition, new_type.definition
                        ),
                        impact,
                    )
                    .with_signatures(
                        Some(old_type.definition.clone()),
                        Some(new_type.definition.clone()),
                    ),
                );
            }
            Some(_) => {}
        }
    }
    for (name, new_type) in &new_map {
        if !old_map.contains_key(name) {
            diffs.push(
                CodeDiff::new(
                    DiffKind::Added,
                    DiffCategory::Type,
                    name,
                    format!("Type '{}' was added", name),
                    addition_impact(new_type.is_exported),
                )
                .with_signatures(None, Some(new_type.definition.clone())),
            );
        }
    }
}

fn diff_imports(old: &[ImportInfo], new: &[ImportInfo], diffs: &mut Vec<CodeDiff>) {
    let old_map = by_name(old, |i| &i.source);
    let new_map = by_name(new, |i| &i.source);

    for name in old_map.keys().filter(|k| !new_map.contains_key(*k)) {
        diffs.push(CodeDiff::new(
            DiffKind::Removed,
            DiffCategory::Import,
            name,
            format!("Import of '{}' was removed", name),
            ImpactLevel::Patch,
        ));
    }
    for name in new_map.keys().filter(|k| !old_map.contains_key(*k)) {
        diffs.push(CodeDiff::new(
            DiffKind::Added,
            DiffCategory::Import,
            name,
            format!("Import of '{}' was added", name),
            ImpactLevel::Patch,
        ));
    }
}

/// Only exports that are not local declarations; those are covered by their own category
fn diff_exports(old: &FileStructure, new: &FileStructure, diffs: &mut Vec<CodeDiff>) {
    let old_exports: Vec<&ExportInfo> = old.exports.iter().filter(|e| !old.declares(&e.name)).collect();
    let new_exports: Vec<&ExportInfo> = new.exports.iter().filter(|e| !new.declares(&e.name)).collect();
    let old_map = by_name(&old_exports, |e| &e.name);
    let new_map = by_name(&new_exports, |e| &e.name);

    for name in old_map.keys().filter(|k| !new_map.contains_key(*k)) {
        diffs.push(CodeDiff::new(
            DiffKind::Removed,
            DiffCategory::Export,
            name,
            format!("Export '{}' was removed", name),
            ImpactLevel::Breaking,
        ));
    }
    for name in new_map.keys().filter(|k| !old_map.contains_key(*k)) {
        diffs.push(CodeDiff::new(
            DiffKind::Added,
            DiffCategory::Export,
            name,
            format!("Export '{}' was added", name),
            ImpactLevel::Minor,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CodeExtractor;
    use std::path::Path;

    fn structure(source: &str) -> FileStructure {
        let mut extractor = CodeExtractor::new().unwrap();
        extractor.extract_file(Path::new("math.ts"), source)
    }

    #[test]
    fn test_exported_param_count_change_is_breaking() {
        let old = structure("export function add(a, b) { return a + b; }");
        let new = structure("export function add(a, b, c) { return a + b + c; }");

        let diffs = diff_structures(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].category, DiffCategory::Function);
        assert_eq!(diffs[0].kind, DiffKind::Modified);
        assert_eq!(diffs[0].impact_level, ImpactLevel::Breaking);
        assert_eq!(diffs[0].old_signature.as_deref(), Some("add(a, b)"));
        assert_eq!(diffs[0].new_signature.as_deref(), Some("add(a, b, c)"));
    }

    #[test]
    fn test_private_removal_is_minor() {
        let old = structure("function helper() {}\nexport function main() { helper(); }");
        let new = structure("export function main() {}");

        let diffs = diff_structures(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Removed);
        assert_eq!(diffs[0].symbol_name, "helper");
        assert_eq!(diffs[0].impact_level, ImpactLevel::Minor);
    }

    #[test]
    fn test_exported_removal_is_breaking() {
        let old = structure("export function gone() {}");
        let new = structure("");

        let diffs = diff_structures(&old, &new);
        assert_eq!(diffs[0].impact_level, ImpactLevel::Breaking);
    }

    #[test]
    fn test_body_only_change_produces_no_diff() {
        let old = structure("export function f(x: number): number { return x; }");
        let new = structure("export function f(x: number): number {\n  if (x) { return x * 2; }\n  return x;\n}");

        assert!(diff_structures(&old, &new).is_empty());
    }

    #[test]
    fn test_async_change_is_major() {
        let old = structure("export function load(id: string) {}");
        let new = structure("export async function load(id: string) {}");

        let diffs = diff_structures(&old, &new);
        assert_eq!(diffs[0].impact_level, ImpactLevel::Major);
    }

    #[test]
    fn test_newly_exported_is_minor() {
        let old = structure("function util(a) {}");
        let new = structure("export function util(a) {}");

        let diffs = diff_structures(&old, &new);
        assert_eq!(diffs[0].impact_level, ImpactLevel::Minor);
    }

    #[test]
    fn test_type_and_interface_changes() {
        let old = structure(
            "export type Id = string;\nexport interface User { id: Id; name: string; }",
        );
        let new = structure(
            "export type Id = number;\nexport interface User { id: Id; }",
        );

        let diffs = diff_structures(&old, &new);
        let ty = diffs.iter().find(|d| d.category == DiffCategory::Type).unwrap();
        assert_eq!(ty.impact_level, ImpactLevel::Major);
        let iface = diffs
            .iter()
            .find(|d| d.category == DiffCategory::Interface)
            .unwrap();
        assert_eq!(iface.impact_level, ImpactLevel::Breaking);
    }

    #[test]
    fn test_identical_structures_have_no_diff() {
        let source = "import { a } from './a';\nexport class C { m(x) { a(x); } }\nexport { a as b } from './a';";
        let s = structure(source);
        assert!(diff_structures(&s, &s).is_empty());
    }

    #[test]
    fn test_reexport_removal_is_breaking() {
        let old = structure("export { parse } from './parser';");
        let new = structure("");

        let diffs = diff_structures(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].category, DiffCategory::Export);
        assert_eq!(diffs[0].impact_level, ImpactLevel::Breaking);
    }
}
