//! Python adapter

use super::*;
use tree_sitter::Node;

/// Lower a Python tree
pub fn lower_python(root: Node, source: &str) -> SyntaxNode {
    let lowerer = PyLowerer { source };
    SyntaxNode::spanning(NodeKind::Module, root).with_children(lowerer.lower_children(root, Scope::Module))
}

/// Where a definition sits; only module-level names are exported
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Class,
    Nested,
}

struct PyLowerer<'s> {
    source: &'s str,
}

impl<'s> PyLowerer<'s> {
    fn text(&self, node: Node) -> &'s str {
        node_text(node, self.source)
    }

    fn lower_children(&self, node: Node, scope: Scope) -> Vec<SyntaxNode> {
        let mut lowered = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            lowered.extend(self.lower(child, scope));
        }
        lowered
    }

    fn lower_field(&self, node: Node, field: &str, scope: Scope) -> Vec<SyntaxNode> {
        node.child_by_field_name(field)
            .map(|child| self.lower(child, scope))
            .unwrap_or_default()
    }

    fn lower(&self, node: Node, scope: Scope) -> Vec<SyntaxNode> {
        // Statements nested in blocks keep the scope of the enclosing definition
        match node.kind() {
            "comment" => Vec::new(),
            "decorated_definition" => self.lower_field(node, "definition", scope),
            "function_definition" => self.lower_function(node, scope).into_iter().collect(),
            "class_definition" => self.lower_class(node, scope).into_iter().collect(),
            "import_statement" | "import_from_statement" => vec![self.lower_import(node)],
            "assignment" => self.lower_assignment(node, scope),
            "call" => self.lower_call(node, scope),
            "if_statement" => vec![self.lower_if(node, scope)],
            "conditional_expression" => vec![self.lower_ternary(node, scope)],
            "match_statement" => vec![self.lower_match(node, scope)],
            "for_statement" | "while_statement" => {
                vec![SyntaxNode::spanning(NodeKind::Loop, node)
                    .with_children(self.lower_children(node, scope))]
            }
            "try_statement" => vec![self.lower_try(node, scope)],
            "raise_statement" => vec![self.lower_raise(node, scope)],
            _ => self.lower_children(node, scope),
        }
    }

    fn lower_function(&self, node: Node, scope: Scope) -> Option<SyntaxNode> {
        let name = field_text(node, "name", self.source)?;
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.lower_params(p))
            .unwrap_or_default();
        let decl = FunctionDecl {
            exported: scope == Scope::Module && !name.starts_with('_'),
            visibility: python_visibility(&name),
            params,
            return_type: node
                .child_by_field_name("return_type")
                .map(|t| python_type(self.text(t))),
            is_async: has_keyword(node, "async"),
            doc_comment: self.docstring(node),
            name,
        };

        Some(
            SyntaxNode::spanning(NodeKind::Function(decl), node)
                .with_children(self.lower_field(node, "body", Scope::Nested)),
        )
    }

    fn lower_class(&self, node: Node, scope: Scope) -> Option<SyntaxNode> {
        let name = field_text(node, "name", self.source)?;
        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if base.kind() != "keyword_argument" {
                    bases.push(self.text(base).to_string());
                }
            }
        }

        let mut decl = ClassDecl {
            exported: scope == Scope::Module && !name.starts_with('_'),
            doc_comment: self.docstring(node),
            superclass: bases.first().cloned(),
            implements: bases.iter().skip(1).cloned().collect(),
            name,
            ..Default::default()
        };

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for stmt in body.named_children(&mut cursor) {
                match stmt.kind() {
                    "function_definition" | "decorated_definition" => {
                        methods.extend(self.lower(stmt, Scope::Class));
                    }
                    "expression_statement" => {
                        let mut inner = stmt.walk();
                        for expr in stmt.named_children(&mut inner) {
                            if expr.kind() != "assignment" {
                                continue;
                            }
                            let Some(left) = expr.child_by_field_name("left") else {
                                continue;
                            };
                            if left.kind() != "identifier" {
                                continue;
                            }
                            let name = self.text(left).to_string();
                            decl.properties.push(PropertyDecl {
                                visibility: python_visibility(&name),
                                type_ref: expr
                                    .child_by_field_name("type")
                                    .map(|t| python_type(self.text(t))),
                                optional: expr.child_by_field_name("right").is_some(),
                                name,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(SyntaxNode::spanning(NodeKind::Class(decl), node).with_children(methods))
    }

    /// `name = lambda ...` binds an anonymous function
    fn lower_assignment(&self, node: Node, scope: Scope) -> Vec<SyntaxNode> {
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");

        match (left, right) {
            (Some(left), Some(right)) if left.kind() == "identifier" && right.kind() == "lambda" => {
                let name = self.text(left).to_string();
                let decl = FunctionDecl {
                    exported: scope == Scope::Module && !name.starts_with('_'),
                    visibility: python_visibility(&name),
                    params: right
                        .child_by_field_name("parameters")
                        .map(|p| self.lower_params(p))
                        .unwrap_or_default(),
                    name,
                    ..Default::default()
                };
                vec![SyntaxNode::spanning(NodeKind::Function(decl), node)
                    .with_children(self.lower_field(right, "body", Scope::Nested))]
            }
            (_, Some(right)) => self.lower(right, scope),
            _ => Vec::new(),
        }
    }

    fn lower_import(&self, node: Node) -> SyntaxNode {
        let mut decl = ImportDecl::default();

        if node.kind() == "import_from_statement" {
            decl.source = field_text(node, "module_name", self.source).unwrap_or_default();
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                decl.specifiers.push(self.import_specifier(name));
            }
        } else {
            // `import pkg.mod as m` binds a namespace
            let mut cursor = node.walk();
            let first = node.children_by_field_name("name", &mut cursor).next();
            if let Some(name) = first {
                let spec = self.import_specifier(name);
                decl.source = spec.imported;
                decl.namespace = Some(spec.local);
            }
        }

        SyntaxNode::spanning(NodeKind::Import(decl), node)
    }

    fn import_specifier(&self, node: Node) -> ImportSpecifier {
        if node.kind() == "aliased_import" {
            let imported = field_text(node, "name", self.source).unwrap_or_default();
            let local = field_text(node, "alias", self.source).unwrap_or_else(|| imported.clone());
            ImportSpecifier { imported, local }
        } else {
            let imported = self.text(node).to_string();
            ImportSpecifier {
                local: imported.clone(),
                imported,
            }
        }
    }

    fn lower_call(&self, node: Node, scope: Scope) -> Vec<SyntaxNode> {
        let function = node.child_by_field_name("function");
        let mut children = function.map(|f| self.lower(f, scope)).unwrap_or_default();
        children.extend(self.lower_field(node, "arguments", scope));

        let call = function.and_then(|f| match f.kind() {
            "identifier" => Some(CallExpr {
                name: self.text(f).to_string(),
                receiver: None,
            }),
            "attribute" => Some(CallExpr {
                name: field_text(f, "attribute", self.source)?,
                receiver: field_text(f, "object", self.source).map(|o| squash(&o)),
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

    fn lower_if(&self, node: Node, scope: Scope) -> SyntaxNode {
        let mut arms = Vec::new();
        if let Some(consequence) = node.child_by_field_name("consequence") {
            arms.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Then), consequence)
                    .with_children(self.lower(consequence, scope)),
            );
        }

        // `elif` chains nest as conditionals inside the else side
        let mut cursor = node.walk();
        let alternatives: Vec<Node> = node.children_by_field_name("alternative", &mut cursor).collect();
        if let Some(else_arm) = self.lower_alternatives(&alternatives, scope) {
            arms.push(else_arm);
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
        .with_children(arms)
    }

    fn lower_alternatives(&self, alternatives: &[Node], scope: Scope) -> Option<SyntaxNode> {
        let (first, rest) = alternatives.split_first()?;
        let body = match first.kind() {
            "elif_clause" => {
                let mut arms = Vec::new();
                if let Some(consequence) = first.child_by_field_name("consequence") {
                    arms.push(
                        SyntaxNode::spanning(NodeKind::Branch(BranchArm::Then), consequence)
                            .with_children(self.lower(consequence, scope)),
                    );
                }
                arms.extend(self.lower_alternatives(rest, scope));
                vec![SyntaxNode::spanning(
                    NodeKind::Conditional(ConditionalExpr {
                        kind: ConditionalKind::If,
                        condition: field_text(*first, "condition", self.source)
                            .map(|c| squash(&c))
                            .unwrap_or_default(),
                    }),
                    *first,
                )
                .with_children(arms)]
            }
            _ => self.lower_field(*first, "body", scope),
        };
        Some(SyntaxNode::spanning(NodeKind::Branch(BranchArm::Else), *first).with_children(body))
    }

    fn lower_ternary(&self, node: Node, scope: Scope) -> SyntaxNode {
        // `a if cond else b`: children are [a, cond, b]
        let mut cursor = node.walk();
        let parts: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();

        let mut children = Vec::new();
        let mut condition = String::new();
        if let [then_expr, cond, else_expr] = parts.as_slice() {
            condition = squash(self.text(*cond));
            children.extend(self.lower(*cond, scope));
            children.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Then), *then_expr)
                    .with_children(self.lower(*then_expr, scope)),
            );
            children.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Else), *else_expr)
                    .with_children(self.lower(*else_expr, scope)),
            );
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::Ternary,
                condition,
            }),
            node,
        )
        .with_children(children)
    }

    fn lower_match(&self, node: Node, scope: Scope) -> SyntaxNode {
        let mut arms = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for case in body.named_children(&mut cursor) {
                if case.kind() != "case_clause" {
                    continue;
                }
                let mut inner = case.walk();
                let pattern = case
                    .named_children(&mut inner)
                    .find(|n| n.kind() == "case_pattern")
                    .map(|p| squash(self.text(p)))
                    .unwrap_or_default();
                let arm = if pattern == "_" {
                    BranchArm::Default
                } else {
                    BranchArm::Case(pattern)
                };
                arms.push(
                    SyntaxNode::spanning(NodeKind::Branch(arm), case)
                        .with_children(self.lower_field(case, "consequence", scope)),
                );
            }
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::Switch,
                condition: field_text(node, "subject", self.source)
                    .map(|s| squash(&s))
                    .unwrap_or_default(),
            }),
            node,
        )
        .with_children(arms)
    }

    fn lower_try(&self, node: Node, scope: Scope) -> SyntaxNode {
        let mut children = self.lower_field(node, "body", scope);
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            match clause.kind() {
                "except_clause" | "except_group_clause" => children.push(
                    SyntaxNode::spanning(NodeKind::Catch, clause)
                        .with_children(self.lower_children(clause, scope)),
                ),
                "finally_clause" => children.push(
                    SyntaxNode::spanning(NodeKind::Finally, clause)
                        .with_children(self.lower_children(clause, scope)),
                ),
                // `else` runs only when the body did not raise
                "else_clause" => children.extend(self.lower_children(clause, scope)),
                _ => {}
            }
        }
        SyntaxNode::spanning(NodeKind::Try, node).with_children(children)
    }

    fn lower_raise(&self, node: Node, scope: Scope) -> SyntaxNode {
        let mut cursor = node.walk();
        let raised = node
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment");

        let value = match raised {
            Some(expr) if expr.kind() == "call" => {
                let callee = field_text(expr, "function", self.source).unwrap_or_default();
                let last = callee.rsplit('.').next().unwrap_or(&callee);
                if last.starts_with(char::is_uppercase) {
                    ThrownValue::Constructor(callee.clone())
                } else {
                    ThrownValue::Call(callee.clone())
                }
            }
            Some(expr) if matches!(expr.kind(), "identifier" | "attribute") => {
                ThrownValue::Identifier(self.text(expr).to_string())
            }
            _ => ThrownValue::Other,
        };

        SyntaxNode::spanning(
            NodeKind::Throw(ThrowExpr {
                value,
                text: squash(self.text(node)),
            }),
            node,
        )
        .with_children(raised.map(|r| self.lower(r, scope)).unwrap_or_default())
    }

    fn lower_params(&self, params: Node) -> Vec<ParamDecl> {
        let mut lowered = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let decl = match param.kind() {
                "identifier" => ParamDecl {
                    name: self.text(param).to_string(),
                    type_ref: None,
                    optional: false,
                    default_value: None,
                },
                "typed_parameter" => {
                    let mut inner = param.walk();
                    let name = param
                        .named_children(&mut inner)
                        .find(|n| n.kind() != "type")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    ParamDecl {
                        name,
                        type_ref: param
                            .child_by_field_name("type")
                            .map(|t| python_type(self.text(t))),
                        optional: false,
                        default_value: None,
                    }
                }
                "default_parameter" | "typed_default_parameter" => ParamDecl {
                    name: field_text(param, "name", self.source).unwrap_or_default(),
                    type_ref: param
                        .child_by_field_name("type")
                        .map(|t| python_type(self.text(t))),
                    optional: true,
                    default_value: param
                        .child_by_field_name("value")
                        .filter(|v| {
                            matches!(
                                v.kind(),
                                "string" | "integer" | "float" | "true" | "false" | "none"
                                    | "identifier"
                            )
                        })
                        .map(|v| self.text(v).to_string()),
                },
                "list_splat_pattern" | "dictionary_splat_pattern" => ParamDecl {
                    name: self.text(param).to_string(),
                    type_ref: None,
                    optional: true,
                    default_value: None,
                },
                _ => continue,
            };
            if decl.name == "self" || decl.name == "cls" {
                continue;
            }
            lowered.push(decl);
        }
        lowered
    }

    /// Docstring: first statement of the body when it is a string
    fn docstring(&self, node: Node) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0).filter(|n| n.kind() == "string")?;
        let trimmed = self
            .text(string)
            .trim_start_matches("\"\"\"")
            .trim_start_matches("'''")
            .trim_end_matches("\"\"\"")
            .trim_end_matches("'''")
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        Some(trimmed.to_string())
    }
}

fn python_visibility(name: &str) -> Visibility {
    if name.starts_with("__") && name.ends_with("__") {
        Visibility::Public
    } else if name.starts_with("__") {
        Visibility::Private
    } else if name.starts_with('_') {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn python_type(text: &str) -> TypeRef {
    let text = text.trim();
    match text {
        "str" => TypeRef::String,
        "int" | "float" | "complex" => TypeRef::Number,
        "bool" => TypeRef::Boolean,
        "Any" | "typing.Any" => TypeRef::Any,
        "None" => TypeRef::Void,
        _ if text.contains('|') => TypeRef::Unknown,
        _ => TypeRef::Reference(squash(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> SyntaxNode {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        lower_python(tree.root_node(), source)
    }

    #[test]
    fn test_module_level_functions_are_exported() {
        let tree = lower("def public(a: int, b='x') -> str:\n    return str(a)\n\ndef _private():\n    pass\n");

        let public = tree.children[0].as_function().unwrap();
        assert!(public.exported);
        assert_eq!(public.params.len(), 2);
        assert_eq!(public.params[0].type_ref, Some(TypeRef::Number));
        assert_eq!(public.params[1].default_value.as_deref(), Some("'x'"));
        assert_eq!(public.return_type, Some(TypeRef::String));

        let private = tree.children[1].as_function().unwrap();
        assert!(!private.exported);
    }

    #[test]
    fn test_class_methods_and_raise() {
        let tree = lower(
            "class Repo(Base):\n    \"\"\"Stores things.\"\"\"\n    def save(self, item):\n        if not item:\n            raise ValueError('empty')\n        self.write(item)\n",
        );

        let class = &tree.children[0];
        match &class.kind {
            NodeKind::Class(decl) => {
                assert_eq!(decl.name, "Repo");
                assert_eq!(decl.superclass.as_deref(), Some("Base"));
                assert_eq!(decl.doc_comment.as_deref(), Some("Stores things."));
            }
            other => panic!("expected class, got {:?}", other),
        }

        let method = class.children[0].as_function().unwrap();
        assert_eq!(method.name, "save");
        assert_eq!(method.params.len(), 1);
        assert!(!method.exported);

        let raise = class.children[0]
            .find(&|n| matches!(n.kind, NodeKind::Throw(_)))
            .unwrap();
        match &raise.kind {
            NodeKind::Throw(t) => assert_eq!(t.exception_type(), "ValueError"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_from_import() {
        let tree = lower("from .utils import helper, fmt as f\n");
        match &tree.children[0].kind {
            NodeKind::Import(import) => {
                assert_eq!(import.source, ".utils");
                assert_eq!(import.specifiers[1].imported, "fmt");
                assert_eq!(import.specifiers[1].local, "f");
            }
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_import_binds_namespace() {
        let tree = lower("import pkg.mod as m\nimport os\n");
        let namespaces: Vec<(String, Option<String>)> = tree
            .children
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Import(import) => Some((import.source.clone(), import.namespace.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(
            namespaces,
            vec![
                ("pkg.mod".to_string(), Some("m".to_string())),
                ("os".to_string(), Some("os".to_string())),
            ]
        );
    }
}
