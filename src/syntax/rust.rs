//! Rust adapter
//!
//! - `struct` / `enum` become classes, `impl` blocks partial classes
//! - traits become interfaces
//! - `panic!`-family macros are throw-like; there is no try construct

use super::*;
use tree_sitter::Node;

const PANIC_MACROS: &[&str] = &["panic", "unreachable", "unimplemented", "todo"];

/// Lower a Rust tree
pub fn lower_rust(root: Node, source: &str) -> SyntaxNode {
    let lowerer = RsLowerer { source };
    SyntaxNode::spanning(NodeKind::Module, root).with_children(lowerer.lower_children(root))
}

struct RsLowerer<'s> {
    source: &'s str,
}

impl<'s> RsLowerer<'s> {
    fn text(&self, node: Node) -> &'s str {
        node_text(node, self.source)
    }

    fn lower_children(&self, node: Node) -> Vec<SyntaxNode> {
        let mut lowered = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            lowered.extend(self.lower(child));
        }
        lowered
    }

    fn lower_field(&self, node: Node, field: &str) -> Vec<SyntaxNode> {
        node.child_by_field_name(field)
            .map(|child| self.lower(child))
            .unwrap_or_default()
    }

    fn lower(&self, node: Node) -> Vec<SyntaxNode> {
        match node.kind() {
            "line_comment" | "block_comment" | "attribute_item" | "inner_attribute_item" => {
                Vec::new()
            }
            "function_item" | "function_signature_item" => {
                self.lower_function(node).into_iter().collect()
            }
            "struct_item" | "enum_item" | "union_item" => self.lower_struct(node).into_iter().collect(),
            "impl_item" => self.lower_impl(node).into_iter().collect(),
            "trait_item" => self.lower_trait(node).into_iter().collect(),
            "type_item" => self.lower_type_alias(node).into_iter().collect(),
            "use_declaration" => self.lower_use(node),
            "call_expression" => self.lower_call(node),
            "macro_invocation" => self.lower_macro(node),
            "if_expression" => vec![self.lower_if(node)],
            "match_expression" => vec![self.lower_match(node)],
            "loop_expression" | "while_expression" | "for_expression" => {
                vec![SyntaxNode::spanning(NodeKind::Loop, node).with_children(self.lower_children(node))]
            }
            _ => self.lower_children(node),
        }
    }

    // ==================== Items ====================

    fn lower_function(&self, node: Node) -> Option<SyntaxNode> {
        let name = field_text(node, "name", self.source)?;
        let visibility = self.visibility(node);

        let mut is_async = false;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "function_modifiers" && has_keyword(child, "async") {
                is_async = true;
            }
        }

        let decl = FunctionDecl {
            name,
            params: node
                .child_by_field_name("parameters")
                .map(|p| self.lower_params(p))
                .unwrap_or_default(),
            return_type: node
                .child_by_field_name("return_type")
                .map(|t| rust_type(self.text(t))),
            is_async,
            exported: self.is_pub(node),
            visibility,
            doc_comment: self.doc_comment(node),
        };

        Some(
            SyntaxNode::spanning(NodeKind::Function(decl), node)
                .with_children(self.lower_field(node, "body")),
        )
    }

    fn lower_struct(&self, node: Node) -> Option<SyntaxNode> {
        let mut decl = ClassDecl {
            name: field_text(node, "name", self.source)?,
            exported: self.is_pub(node),
            doc_comment: self.doc_comment(node),
            ..Default::default()
        };

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                match member.kind() {
                    "field_declaration" => {
                        let Some(name) = field_text(member, "name", self.source) else {
                            continue;
                        };
                        let type_ref = member
                            .child_by_field_name("type")
                            .map(|t| rust_type(self.text(t)));
                        decl.properties.push(PropertyDecl {
                            optional: matches!(&type_ref, Some(TypeRef::Reference(t)) if t.starts_with("Option<")),
                            visibility: self.visibility(member),
                            type_ref,
                            name,
                        });
                    }
                    "enum_variant" => {
                        if let Some(name) = field_text(member, "name", self.source) {
                            decl.properties.push(PropertyDecl {
                                name,
                                type_ref: None,
                                optional: false,
                                visibility: Visibility::Public,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(SyntaxNode::spanning(NodeKind::Class(decl), node))
    }

    fn lower_impl(&self, node: Node) -> Option<SyntaxNode> {
        let type_name = node
            .child_by_field_name("type")
            .map(|t| strip_generics(self.text(t)))?;

        let decl = ClassDecl {
            name: type_name,
            implements: node
                .child_by_field_name("trait")
                .map(|t| vec![strip_generics(self.text(t))])
                .unwrap_or_default(),
            partial: true,
            ..Default::default()
        };

        let methods = self.lower_declarations(node);
        Some(SyntaxNode::spanning(NodeKind::Class(decl), node).with_children(methods))
    }

    fn lower_trait(&self, node: Node) -> Option<SyntaxNode> {
        let mut decl = InterfaceDecl {
            name: field_text(node, "name", self.source)?,
            exported: self.is_pub(node),
            doc_comment: self.doc_comment(node),
            ..Default::default()
        };

        if let Some(bounds) = node.child_by_field_name("bounds") {
            let mut cursor = bounds.walk();
            decl.extends.extend(
                bounds
                    .named_children(&mut cursor)
                    .map(|b| strip_generics(self.text(b))),
            );
        }

        let methods = self.lower_declarations(node);
        Some(SyntaxNode::spanning(NodeKind::Interface(decl), node).with_children(methods))
    }

    /// Function members of an `impl` / `trait` body
    fn lower_declarations(&self, node: Node) -> Vec<SyntaxNode> {
        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                if matches!(member.kind(), "function_item" | "function_signature_item") {
                    methods.extend(self.lower_function(member));
                }
            }
        }
        methods
    }

    fn lower_type_alias(&self, node: Node) -> Option<SyntaxNode> {
        let decl = TypeAliasDecl {
            name: field_text(node, "name", self.source)?,
            definition: node
                .child_by_field_name("type")
                .map(|t| squash(self.text(t)))
                .unwrap_or_default(),
            exported: self.is_pub(node),
            doc_comment: self.doc_comment(node),
        };
        Some(SyntaxNode::spanning(NodeKind::TypeAlias(decl), node))
    }

    fn lower_use(&self, node: Node) -> Vec<SyntaxNode> {
        let Some(argument) = node.child_by_field_name("argument") else {
            return Vec::new();
        };

        let mut imports = Vec::new();
        self.collect_use(argument, "", &mut imports);
        imports
            .into_iter()
            .map(|decl| SyntaxNode::spanning(NodeKind::Import(decl), node))
            .collect()
    }

    /// Flatten a use tree into one import per source path
    fn collect_use(&self, node: Node, prefix: &str, out: &mut Vec<ImportDecl>) {
        let join = |path: &str| -> String {
            match (prefix.is_empty(), path.is_empty()) {
                (true, _) => path.to_string(),
                (_, true) => prefix.to_string(),
                _ => format!("{}::{}", prefix, path),
            }
        };

        match node.kind() {
            "scoped_identifier" | "identifier" | "crate" | "self" | "super" => {
                let full = join(self.text(node));
                let (source, name) = match full.rsplit_once("::") {
                    Some((source, name)) => (source.to_string(), name.to_string()),
                    None => (String::new(), full.clone()),
                };
                push_specifier(
                    out,
                    source,
                    ImportSpecifier {
                        imported: name.clone(),
                        local: name,
                    },
                );
            }
            "use_as_clause" => {
                let path = field_text(node, "path", self.source).unwrap_or_default();
                let full = join(&path);
                let alias = field_text(node, "alias", self.source).unwrap_or_default();
                let (source, name) = match full.rsplit_once("::") {
                    Some((source, name)) => (source.to_string(), name.to_string()),
                    None => (String::new(), full.clone()),
                };
                push_specifier(
                    out,
                    source,
                    ImportSpecifier {
                        imported: name,
                        local: alias,
                    },
                );
            }
            "scoped_use_list" => {
                let path = join(&field_text(node, "path", self.source).unwrap_or_default());
                if let Some(list) = node.child_by_field_name("list") {
                    self.collect_use(list, &path, out);
                }
            }
            "use_list" => {
                let mut cursor = node.walk();
                for item in node.named_children(&mut cursor) {
                    self.collect_use(item, prefix, out);
                }
            }
            "use_wildcard" => {
                let path = self.text(node).trim_end_matches("::*").trim_end_matches('*');
                let source = join(path);
                let namespace = source.rsplit("::").next().unwrap_or_default().to_string();
                out.push(ImportDecl {
                    source,
                    namespace: Some(namespace),
                    ..Default::default()
                });
            }
            _ => {}
        }
    }

    // ==================== Expressions ====================

    fn lower_call(&self, node: Node) -> Vec<SyntaxNode> {
        let function = node.child_by_field_name("function");
        let mut children = function.map(|f| self.lower(f)).unwrap_or_default();
        children.extend(self.lower_field(node, "arguments"));

        let target = function.map(|f| {
            if f.kind() == "generic_function" {
                f.child_by_field_name("function").unwrap_or(f)
            } else {
                f
            }
        });

        let call = target.and_then(|f| match f.kind() {
            "identifier" => Some(CallExpr {
                name: self.text(f).to_string(),
                receiver: None,
            }),
            "scoped_identifier" => Some(CallExpr {
                name: field_text(f, "name", self.source)?,
                receiver: field_text(f, "path", self.source),
            }),
            "field_expression" => Some(CallExpr {
                name: field_text(f, "field", self.source)?,
                receiver: field_text(f, "value", self.source).map(|v| squash(&v)),
            }),
            _ => None,
        });

        match call {
            Some(call) => {
                vec![SyntaxNode::spanning(NodeKind::Call(call), node).with_children(children)]
            }
            None => children,
        }
    }

    fn lower_macro(&self, node: Node) -> Vec<SyntaxNode> {
        let name = field_text(node, "macro", self.source).unwrap_or_default();
        let short = name.rsplit("::").next().unwrap_or(&name);
        if !PANIC_MACROS.contains(&short) {
            return Vec::new();
        }

        vec![SyntaxNode::spanning(
            NodeKind::Throw(ThrowExpr {
                value: ThrownValue::Call(format!("{}!", short)),
                text: squash(self.text(node)),
            }),
            node,
        )]
    }

    fn lower_if(&self, node: Node) -> SyntaxNode {
        let mut children = self.lower_field(node, "condition");

        if let Some(consequence) = node.child_by_field_name("consequence") {
            children.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Then), consequence)
                    .with_children(self.lower(consequence)),
            );
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            // else_clause wraps a block or a nested if
            children.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Else), alternative)
                    .with_children(self.lower_children(alternative)),
            );
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::If,
                condition: field_text(node, "condition", self.source)
                    .map(|c| squash(&c))
                    .unwrap_or_default(),
            }),
            node,
        )
        .with_children(children)
    }

    fn lower_match(&self, node: Node) -> SyntaxNode {
        let mut children = self.lower_field(node, "value");

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for arm in body.named_children(&mut cursor) {
                if arm.kind() != "match_arm" {
                    continue;
                }
                let pattern = field_text(arm, "pattern", self.source)
                    .map(|p| squash(&p))
                    .unwrap_or_default();
                let label = if pattern == "_" {
                    BranchArm::Default
                } else {
                    BranchArm::Case(pattern)
                };
                children.push(
                    SyntaxNode::spanning(NodeKind::Branch(label), arm)
                        .with_children(self.lower_field(arm, "value")),
                );
            }
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::Switch,
                condition: field_text(node, "value", self.source)
                    .map(|v| squash(&v))
                    .unwrap_or_default(),
            }),
            node,
        )
        .with_children(children)
    }

    // ==================== Parts ====================

    fn lower_params(&self, params: Node) -> Vec<ParamDecl> {
        let mut lowered = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if param.kind() != "parameter" {
                continue;
            }
            let type_ref = param
                .child_by_field_name("type")
                .map(|t| rust_type(self.text(t)));
            lowered.push(ParamDecl {
                name: field_text(param, "pattern", self.source)
                    .map(|p| p.trim_start_matches("mut ").to_string())
                    .unwrap_or_default(),
                optional: matches!(&type_ref, Some(TypeRef::Reference(t)) if t.starts_with("Option<")),
                type_ref,
                default_value: None,
            });
        }
        lowered
    }

    fn visibility_modifier(&self, node: Node) -> Option<&'s str> {
        let mut cursor = node.walk();
        let modifier = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "visibility_modifier")
            .map(|c| self.text(c));
        modifier
    }

    fn is_pub(&self, node: Node) -> bool {
        self.visibility_modifier(node) == Some("pub")
    }

    fn visibility(&self, node: Node) -> Visibility {
        match self.visibility_modifier(node) {
            Some("pub") => Visibility::Public,
            Some(_) => Visibility::Protected,
            None => Visibility::Private,
        }
    }

    /// Consecutive `///` lines above the item, skipping attributes
    fn doc_comment(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut current = node.prev_sibling();
        while let Some(prev) = current {
            match prev.kind() {
                "attribute_item" => {}
                "line_comment" if self.text(prev).starts_with("///") => {
                    lines.push(self.text(prev).trim_start_matches("///").trim().to_string());
                }
                _ => break,
            }
            current = prev.prev_sibling();
        }

        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }
}

fn push_specifier(out: &mut Vec<ImportDecl>, source: String, spec: ImportSpecifier) {
    match out.iter_mut().find(|d| d.source == source && d.namespace.is_none()) {
        Some(decl) => decl.specifiers.push(spec),
        None => out.push(ImportDecl {
            source,
            specifiers: vec![spec],
            ..Default::default()
        }),
    }
}

fn strip_generics(text: &str) -> String {
    let base = text.split('<').next().unwrap_or(text);
    squash(base)
}

fn rust_type(text: &str) -> TypeRef {
    let text = squash(text);
    let bare = text.trim_start_matches('&').trim_start_matches("'static ").trim_start_matches("mut ");
    match bare {
        "String" | "str" | "char" => TypeRef::String,
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" | "f32" | "f64" => TypeRef::Number,
        "bool" => TypeRef::Boolean,
        "()" => TypeRef::Void,
        "_" => TypeRef::Unknown,
        _ => TypeRef::Reference(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> SyntaxNode {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        lower_rust(tree.root_node(), source)
    }

    #[test]
    fn test_pub_function_is_exported() {
        let tree = lower(
            "/// Adds two numbers\npub async fn add(a: i32, b: &str) -> String { format!(\"{}\", a) }\nfn helper() {}\n",
        );

        let add = tree.children[0].as_function().unwrap();
        assert_eq!(add.name, "add");
        assert!(add.exported);
        assert!(add.is_async);
        assert_eq!(add.params[0].type_ref, Some(TypeRef::Number));
        assert_eq!(add.params[1].type_ref, Some(TypeRef::String));
        assert_eq!(add.return_type, Some(TypeRef::String));
        assert_eq!(add.doc_comment.as_deref(), Some("Adds two numbers"));

        let helper = tree.children[1].as_function().unwrap();
        assert!(!helper.exported);
        assert_eq!(helper.visibility, Visibility::Private);
    }

    #[test]
    fn test_impl_block_is_partial_class() {
        let tree = lower(
            "pub struct Store { pub items: Vec<String> }\nimpl Store {\n    pub fn get(&self, idx: usize) -> Option<String> {\n        if idx > 10 { panic!(\"too far\"); }\n        self.lookup(idx)\n    }\n}\n",
        );

        match &tree.children[0].kind {
            NodeKind::Class(decl) => {
                assert!(decl.exported);
                assert!(!decl.partial);
                assert_eq!(decl.properties[0].name, "items");
            }
            other => panic!("expected struct, got {:?}", other),
        }

        let imp = &tree.children[1];
        match &imp.kind {
            NodeKind::Class(decl) => {
                assert_eq!(decl.name, "Store");
                assert!(decl.partial);
            }
            other => panic!("expected impl, got {:?}", other),
        }

        let method = imp.children[0].as_function().unwrap();
        assert_eq!(method.name, "get");
        assert_eq!(method.params.len(), 1);

        let throw = imp.children[0]
            .find(&|n| matches!(n.kind, NodeKind::Throw(_)))
            .unwrap();
        assert!(matches!(&throw.kind, NodeKind::Throw(t) if t.exception_type() == "panic!"));

        let call = imp.children[0]
            .find(&|n| matches!(n.kind, NodeKind::Call(_)))
            .unwrap();
        assert!(matches!(
            &call.kind,
            NodeKind::Call(c) if c.name == "lookup" && c.receiver.as_deref() == Some("self")
        ));
    }

    #[test]
    fn test_use_tree_is_flattened() {
        let tree = lower("use crate::util::{helper, fmt as f};\nuse super::model;\n");

        let imports: Vec<&ImportDecl> = tree
            .children
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Import(i) => Some(i),
                _ => None,
            })
            .collect();

        assert_eq!(imports[0].source, "crate::util");
        assert_eq!(imports[0].specifiers.len(), 2);
        assert_eq!(imports[0].specifiers[1].local, "f");
        assert_eq!(imports[1].source, "super");
        assert_eq!(imports[1].specifiers[0].imported, "model");
    }
}
