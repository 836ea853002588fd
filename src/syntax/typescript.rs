//! TypeScript / JavaScript adapter
//!
//! Handles both the TypeScript and JavaScript grammars; the JavaScript grammar
//! is a subset for every node shape consumed here.

use super::*;
use tree_sitter::Node;

/// Lower a TypeScript or JavaScript tree
pub fn lower_typescript(root: Node, source: &str) -> SyntaxNode {
    let lowerer = TsLowerer { source };
    SyntaxNode::spanning(NodeKind::Module, root).with_children(lowerer.lower_children(root))
}

struct TsLowerer<'s> {
    source: &'s str,
}

impl<'s> TsLowerer<'s> {
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
            "comment" | "function_signature" => Vec::new(),
            "export_statement" => vec![self.lower_export(node)],
            "function_declaration" | "generator_function_declaration" => {
                self.lower_named_function(node).into_iter().collect()
            }
            "lexical_declaration" | "variable_declaration" => self.lower_variables(node),
            "class_declaration" | "abstract_class_declaration" | "class" => {
                self.lower_class(node).into_iter().collect()
            }
            "interface_declaration" => self.lower_interface(node).into_iter().collect(),
            "type_alias_declaration" => self.lower_type_alias(node).into_iter().collect(),
            "import_statement" => vec![self.lower_import(node)],
            "call_expression" => self.lower_call(node),
            "if_statement" => vec![self.lower_if(node)],
            "ternary_expression" => vec![self.lower_ternary(node)],
            "switch_statement" => vec![self.lower_switch(node)],
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                vec![SyntaxNode::spanning(NodeKind::Loop, node).with_children(self.lower_children(node))]
            }
            "try_statement" => vec![self.lower_try(node)],
            "throw_statement" => vec![self.lower_throw(node)],
            _ => self.lower_children(node),
        }
    }

    // ==================== Declarations ====================

    fn lower_export(&self, node: Node) -> SyntaxNode {
        let mut decl = ExportDecl {
            is_default: has_keyword(node, "default"),
            source: node
                .child_by_field_name("source")
                .map(|s| unquote(self.text(s))),
            ..Default::default()
        };
        let mut children = Vec::new();

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "export_clause" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() != "export_specifier" {
                            continue;
                        }
                        let exported = spec
                            .child_by_field_name("alias")
                            .or_else(|| spec.child_by_field_name("name"));
                        if let Some(name) = exported {
                            decl.names.push(unquote(self.text(name)));
                        }
                    }
                }
                "namespace_export" => {
                    if let Some(alias) = child.named_child(0) {
                        decl.names.push(self.text(alias).to_string());
                    }
                }
                "identifier" if decl.is_default => {
                    decl.names.push(self.text(child).to_string());
                }
                "string" | "comment" => {}
                _ => children.extend(self.lower(child)),
            }
        }

        SyntaxNode::spanning(NodeKind::Export(decl), node).with_children(children)
    }

    fn lower_named_function(&self, node: Node) -> Option<SyntaxNode> {
        let name = field_text(node, "name", self.source)?;
        Some(self.lower_function_like(node, node, name))
    }

    /// Build a function node; `span` is the node whose lines and doc comment apply
    fn lower_function_like(&self, span: Node, func: Node, name: String) -> SyntaxNode {
        let params = match func.child_by_field_name("parameters") {
            Some(params) => self.lower_params(params),
            None => func
                .child_by_field_name("parameter")
                .map(|p| {
                    vec![ParamDecl {
                        name: self.text(p).to_string(),
                        type_ref: None,
                        optional: false,
                        default_value: None,
                    }]
                })
                .unwrap_or_default(),
        };

        let visibility = if name.starts_with('#') {
            Visibility::Private
        } else {
            self.accessibility(span)
        };

        let decl = FunctionDecl {
            name,
            params,
            return_type: func
                .child_by_field_name("return_type")
                .map(|t| self.type_ref(t)),
            is_async: has_keyword(func, "async"),
            exported: false,
            visibility,
            doc_comment: self.doc_comment(span),
        };

        SyntaxNode::spanning(NodeKind::Function(decl), span)
            .with_children(self.lower_field(func, "body"))
    }

    fn lower_variables(&self, node: Node) -> Vec<SyntaxNode> {
        let mut lowered = Vec::new();
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                lowered.extend(self.lower(declarator));
                continue;
            }

            let name = declarator.child_by_field_name("name");
            let value = declarator.child_by_field_name("value");

            match (name, value) {
                (Some(name), Some(value))
                    if name.kind() == "identifier" && is_function_value(value) =>
                {
                    let name = self.text(name).to_string();
                    lowered.push(self.lower_function_like(declarator, value, name));
                }
                (_, Some(value)) => lowered.extend(self.lower(value)),
                _ => {}
            }
        }
        lowered
    }

    fn lower_class(&self, node: Node) -> Option<SyntaxNode> {
        let name = field_text(node, "name", self.source)?;
        let mut decl = ClassDecl {
            name,
            doc_comment: self.doc_comment(node),
            ..Default::default()
        };

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "class_heritage" {
                continue;
            }
            let mut inner = child.walk();
            for clause in child.named_children(&mut inner) {
                match clause.kind() {
                    "extends_clause" => {
                        decl.superclass = clause
                            .child_by_field_name("value")
                            .map(|v| self.text(v).to_string());
                    }
                    "implements_clause" => {
                        let mut types = clause.walk();
                        decl.implements.extend(
                            clause
                                .named_children(&mut types)
                                .map(|t| self.text(t).to_string()),
                        );
                    }
                    // JavaScript: `class A extends B` has the expression directly
                    _ => decl.superclass = Some(self.text(clause).to_string()),
                }
            }
        }

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut inner = body.walk();
            for member in body.named_children(&mut inner) {
                match member.kind() {
                    "method_definition" | "method_signature" | "abstract_method_signature" => {
                        if let Some(name) = field_text(member, "name", self.source) {
                            methods.push(self.lower_function_like(member, member, name));
                        }
                    }
                    "public_field_definition" | "field_definition" => {
                        let name_node = member
                            .child_by_field_name("name")
                            .or_else(|| member.child_by_field_name("property"));
                        let Some(name_node) = name_node else { continue };
                        let name = self.text(name_node).to_string();

                        match member.child_by_field_name("value") {
                            Some(value) if is_function_value(value) => {
                                methods.push(self.lower_function_like(member, value, name));
                            }
                            _ => decl.properties.push(PropertyDecl {
                                visibility: if name.starts_with('#') {
                                    Visibility::Private
                                } else {
                                    self.accessibility(member)
                                },
                                type_ref: member
                                    .child_by_field_name("type")
                                    .map(|t| self.type_ref(t)),
                                optional: has_keyword(member, "?"),
                                name,
                            }),
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(SyntaxNode::spanning(NodeKind::Class(decl), node).with_children(methods))
    }

    fn lower_interface(&self, node: Node) -> Option<SyntaxNode> {
        let name = field_text(node, "name", self.source)?;
        let mut decl = InterfaceDecl {
            name,
            doc_comment: self.doc_comment(node),
            ..Default::default()
        };

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "extends_type_clause" {
                let mut inner = child.walk();
                decl.extends.extend(
                    child
                        .named_children(&mut inner)
                        .map(|t| self.text(t).to_string()),
                );
            }
        }

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut inner = body.walk();
            for member in body.named_children(&mut inner) {
                let Some(name) = field_text(member, "name", self.source) else {
                    continue;
                };
                match member.kind() {
                    "method_signature" => {
                        methods.push(self.lower_function_like(member, member, name));
                    }
                    "property_signature" => decl.properties.push(PropertyDecl {
                        name,
                        type_ref: member
                            .child_by_field_name("type")
                            .map(|t| self.type_ref(t)),
                        optional: has_keyword(member, "?"),
                        visibility: Visibility::Public,
                    }),
                    _ => {}
                }
            }
        }

        Some(SyntaxNode::spanning(NodeKind::Interface(decl), node).with_children(methods))
    }

    fn lower_type_alias(&self, node: Node) -> Option<SyntaxNode> {
        let decl = TypeAliasDecl {
            name: field_text(node, "name", self.source)?,
            definition: node
                .child_by_field_name("value")
                .map(|v| squash(self.text(v)))
                .unwrap_or_default(),
            exported: false,
            doc_comment: self.doc_comment(node),
        };
        Some(SyntaxNode::spanning(NodeKind::TypeAlias(decl), node))
    }

    fn lower_import(&self, node: Node) -> SyntaxNode {
        let mut decl = ImportDecl {
            source: node
                .child_by_field_name("source")
                .map(|s| unquote(self.text(s)))
                .unwrap_or_default(),
            ..Default::default()
        };

        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if clause.kind() != "import_clause" {
                continue;
            }
            let mut inner = clause.walk();
            for part in clause.named_children(&mut inner) {
                match part.kind() {
                    "identifier" => decl.default_import = Some(self.text(part).to_string()),
                    "namespace_import" => {
                        let mut ns = part.walk();
                        decl.namespace = part
                            .named_children(&mut ns)
                            .find(|n| n.kind() == "identifier")
                            .map(|n| self.text(n).to_string());
                    }
                    "named_imports" => {
                        let mut specs = part.walk();
                        for spec in part.named_children(&mut specs) {
                            let Some(imported) = field_text(spec, "name", self.source) else {
                                continue;
                            };
                            let local = field_text(spec, "alias", self.source)
                                .unwrap_or_else(|| imported.clone());
                            decl.specifiers.push(ImportSpecifier { imported, local });
                        }
                    }
                    _ => {}
                }
            }
        }

        SyntaxNode::spanning(NodeKind::Import(decl), node)
    }

    // ==================== Expressions and statements ====================

    fn lower_call(&self, node: Node) -> Vec<SyntaxNode> {
        let function = node.child_by_field_name("function");
        let mut children = function.map(|f| self.lower(f)).unwrap_or_default();
        children.extend(self.lower_field(node, "arguments"));

        let call = function.and_then(|f| match f.kind() {
            "identifier" => Some(CallExpr {
                name: self.text(f).to_string(),
                receiver: None,
            }),
            "member_expression" => {
                let property = f.child_by_field_name("property")?;
                Some(CallExpr {
                    name: self.text(property).to_string(),
                    receiver: f.child_by_field_name("object").map(|o| squash(self.text(o))),
                })
            }
            _ => None,
        });

        match call {
            Some(call) => {
                vec![SyntaxNode::spanning(NodeKind::Call(call), node).with_children(children)]
            }
            None => children,
        }
    }

    fn lower_if(&self, node: Node) -> SyntaxNode {
        let condition = node
            .child_by_field_name("condition")
            .map(|c| strip_parens(self.text(c)))
            .unwrap_or_default();

        let mut arms = Vec::new();
        if let Some(consequence) = node.child_by_field_name("consequence") {
            arms.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Then), consequence)
                    .with_children(self.lower(consequence)),
            );
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            arms.push(
                SyntaxNode::spanning(NodeKind::Branch(BranchArm::Else), alternative)
                    .with_children(self.lower_children(alternative)),
            );
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::If,
                condition,
            }),
            node,
        )
        .with_children(arms)
    }

    fn lower_ternary(&self, node: Node) -> SyntaxNode {
        let mut children = self.lower_field(node, "condition");
        for (field, arm) in [("consequence", BranchArm::Then), ("alternative", BranchArm::Else)] {
            if let Some(side) = node.child_by_field_name(field) {
                children.push(
                    SyntaxNode::spanning(NodeKind::Branch(arm), side).with_children(self.lower(side)),
                );
            }
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::Ternary,
                condition: field_text(node, "condition", self.source)
                    .map(|c| squash(&c))
                    .unwrap_or_default(),
            }),
            node,
        )
        .with_children(children)
    }

    fn lower_switch(&self, node: Node) -> SyntaxNode {
        let condition = node
            .child_by_field_name("value")
            .map(|v| strip_parens(self.text(v)))
            .unwrap_or_default();

        let mut arms = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for case in body.named_children(&mut cursor) {
                let value = case.child_by_field_name("value");
                let arm = match (case.kind(), value) {
                    ("switch_case", Some(value)) => BranchArm::Case(squash(self.text(value))),
                    ("switch_default", _) => BranchArm::Default,
                    _ => continue,
                };

                let mut children = Vec::new();
                let mut inner = case.walk();
                for stmt in case.named_children(&mut inner) {
                    if Some(stmt) != value {
                        children.extend(self.lower(stmt));
                    }
                }
                arms.push(SyntaxNode::spanning(NodeKind::Branch(arm), case).with_children(children));
            }
        }

        SyntaxNode::spanning(
            NodeKind::Conditional(ConditionalExpr {
                kind: ConditionalKind::Switch,
                condition,
            }),
            node,
        )
        .with_children(arms)
    }

    fn lower_try(&self, node: Node) -> SyntaxNode {
        let mut children = self.lower_field(node, "body");
        if let Some(handler) = node.child_by_field_name("handler") {
            children.push(
                SyntaxNode::spanning(NodeKind::Catch, handler)
                    .with_children(self.lower_field(handler, "body")),
            );
        }
        if let Some(finalizer) = node.child_by_field_name("finalizer") {
            children.push(
                SyntaxNode::spanning(NodeKind::Finally, finalizer)
                    .with_children(self.lower_field(finalizer, "body")),
            );
        }
        SyntaxNode::spanning(NodeKind::Try, node).with_children(children)
    }

    fn lower_throw(&self, node: Node) -> SyntaxNode {
        let mut cursor = node.walk();
        let thrown = node
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment");

        let value = match thrown {
            Some(expr) if expr.kind() == "new_expression" => expr
                .child_by_field_name("constructor")
                .map(|c| ThrownValue::Constructor(self.text(c).to_string()))
                .unwrap_or(ThrownValue::Other),
            Some(expr) if expr.kind() == "identifier" => {
                ThrownValue::Identifier(self.text(expr).to_string())
            }
            Some(expr) if expr.kind() == "call_expression" => expr
                .child_by_field_name("function")
                .map(|f| ThrownValue::Call(self.text(f).to_string()))
                .unwrap_or(ThrownValue::Other),
            _ => ThrownValue::Other,
        };

        let children = thrown.map(|expr| self.lower(expr)).unwrap_or_default();
        SyntaxNode::spanning(
            NodeKind::Throw(ThrowExpr {
                value,
                text: squash(self.text(node)),
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
            let decl = match param.kind() {
                "required_parameter" | "optional_parameter" => {
                    let Some(pattern) = param.child_by_field_name("pattern") else {
                        continue;
                    };
                    let name = self.text(pattern).to_string();
                    if name == "this" {
                        continue;
                    }
                    let default_value = param
                        .child_by_field_name("value")
                        .and_then(|v| self.default_literal(v));
                    ParamDecl {
                        optional: param.kind() == "optional_parameter"
                            || param.child_by_field_name("value").is_some(),
                        type_ref: param.child_by_field_name("type").map(|t| self.type_ref(t)),
                        default_value,
                        name,
                    }
                }
                "assignment_pattern" => ParamDecl {
                    name: field_text(param, "left", self.source).unwrap_or_default(),
                    type_ref: None,
                    optional: true,
                    default_value: param
                        .child_by_field_name("right")
                        .and_then(|v| self.default_literal(v)),
                },
                "comment" => continue,
                _ => ParamDecl {
                    name: self.text(param).to_string(),
                    type_ref: None,
                    optional: false,
                    default_value: None,
                },
            };
            lowered.push(decl);
        }
        lowered
    }

    fn default_literal(&self, value: Node) -> Option<String> {
        match value.kind() {
            "string" | "number" | "true" | "false" | "null" | "undefined" | "identifier"
            | "template_string" => Some(self.text(value).to_string()),
            _ => None,
        }
    }

    /// Map a type annotation onto the closed type set
    fn type_ref(&self, annotation: Node) -> TypeRef {
        let ty = if annotation.kind() == "type_annotation" {
            match annotation.named_child(0) {
                Some(inner) => inner,
                None => return TypeRef::Unknown,
            }
        } else {
            annotation
        };

        match ty.kind() {
            "predefined_type" => match self.text(ty) {
                "string" => TypeRef::String,
                "number" | "bigint" => TypeRef::Number,
                "boolean" => TypeRef::Boolean,
                "any" => TypeRef::Any,
                "void" | "undefined" => TypeRef::Void,
                "unknown" | "never" => TypeRef::Unknown,
                other => TypeRef::Reference(other.to_string()),
            },
            "type_identifier" | "generic_type" | "nested_type_identifier" | "array_type"
            | "tuple_type" => TypeRef::Reference(squash(self.text(ty))),
            _ => TypeRef::Unknown,
        }
    }

    fn accessibility(&self, node: Node) -> Visibility {
        let mut cursor = node.walk();
        let modifier = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "accessibility_modifier")
            .map(|c| self.text(c));
        match modifier {
            Some("private") => Visibility::Private,
            Some("protected") => Visibility::Protected,
            _ => Visibility::Public,
        }
    }

    /// JSDoc block immediately preceding the declaration or its wrappers
    fn doc_comment(&self, node: Node) -> Option<String> {
        let mut target = node;
        loop {
            if let Some(prev) = target.prev_sibling() {
                if prev.kind() == "comment" {
                    let text = self.text(prev);
                    return text.starts_with("/**").then(|| clean_jsdoc(text));
                }
            }
            match target.parent() {
                Some(parent)
                    if matches!(
                        parent.kind(),
                        "export_statement" | "lexical_declaration" | "variable_declaration"
                    ) =>
                {
                    target = parent;
                }
                _ => return None,
            }
        }
    }
}

fn is_function_value(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn strip_parens(text: &str) -> String {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(trimmed);
    squash(inner)
}

fn clean_jsdoc(text: &str) -> String {
    text.trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> SyntaxNode {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        lower_typescript(tree.root_node(), source)
    }

    #[test]
    fn test_export_wraps_function() {
        let tree = lower("/** Adds */\nexport async function add(a: number, b = 2): Promise<number> { return a + b; }");

        let export = &tree.children[0];
        assert!(matches!(export.kind, NodeKind::Export(_)));

        let func = export.children[0].as_function().unwrap();
        assert_eq!(func.name, "add");
        assert!(func.is_async);
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].type_ref, Some(TypeRef::Number));
        assert_eq!(func.params[1].default_value.as_deref(), Some("2"));
        assert!(func.params[1].optional);
        assert_eq!(
            func.return_type,
            Some(TypeRef::Reference("Promise<number>".to_string()))
        );
        assert_eq!(func.doc_comment.as_deref(), Some("Adds"));
    }

    #[test]
    fn test_arrow_function_bound_to_const() {
        let tree = lower("export const greet = (name: string): string => format(name);");

        let export = &tree.children[0];
        let func = export.children[0].as_function().unwrap();
        assert_eq!(func.name, "greet");
        assert_eq!(func.return_type, Some(TypeRef::String));
        assert!(matches!(
            &export.children[0].children[0].kind,
            NodeKind::Call(call) if call.name == "format"
        ));
    }

    #[test]
    fn test_member_call_and_throw() {
        let tree = lower(
            "function run() {\n  try {\n    this.repo.save();\n    throw new NotFound('x');\n  } catch (e) {\n    throw e;\n  }\n}",
        );

        let func = &tree.children[0];
        let try_node = &func.children[0];
        assert!(matches!(try_node.kind, NodeKind::Try));

        let call = try_node.find(&|n| matches!(n.kind, NodeKind::Call(_))).unwrap();
        if let NodeKind::Call(call) = &call.kind {
            assert_eq!(call.name, "save");
            assert_eq!(call.receiver.as_deref(), Some("this.repo"));
        }

        let throws: Vec<_> = try_node
            .children
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Throw(t) => Some(t.exception_type()),
                _ => None,
            })
            .collect();
        assert_eq!(throws, vec!["NotFound"]);
    }

    #[test]
    fn test_import_clause() {
        let tree = lower("import def, { a, b as c } from './util';\nimport * as ns from '../ns';");

        match &tree.children[0].kind {
            NodeKind::Import(import) => {
                assert_eq!(import.source, "./util");
                assert_eq!(import.default_import.as_deref(), Some("def"));
                assert_eq!(import.specifiers.len(), 2);
                assert_eq!(import.specifiers[1].imported, "b");
                assert_eq!(import.specifiers[1].local, "c");
            }
            other => panic!("expected import, got {:?}", other),
        }
        match &tree.children[1].kind {
            NodeKind::Import(import) => assert_eq!(import.namespace.as_deref(), Some("ns")),
            other => panic!("expected import, got {:?}", other),
        }
    }
}
