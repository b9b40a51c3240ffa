//! Arena-owned AST consumed and rewritten by the lowering phases
//!
//! Every node of a compilation unit lives in one [`AstArena`] and is
//! addressed by [`NodeId`]. A node owns its children by id and points back to
//! its parent with a non-owning id; the [`verifier`](crate::verifier) checks
//! that the two agree.

pub mod arena;
pub mod flags;
pub mod from_syntax;
pub mod printer;

use smallvec::SmallVec;

pub use arena::{AstArena, AstNode};
pub use flags::{BoxingUnboxingFlags, ModifierFlags};
pub use parser::{AssignOp, BinaryOp, MethodKind, Span, UnaryOp, UpdateOp, VarKind};

use crate::id_types::NodeId;

/// Children of one node in source order
pub type ChildList = SmallVec<[NodeId; 8]>;

/// `object.name` versus `object[expr]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Element,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root of a compilation unit
    Program { statements: Vec<NodeId> },

    // Expressions
    Identifier { name: String },
    /// Kept as written
    NumberLiteral { value: String },
    /// Digits without the `n` suffix
    BigIntLiteral { digits: String },
    StringLiteral { value: String },
    BooleanLiteral { value: bool },
    UndefinedLiteral,
    NullLiteral,
    ThisExpression,
    /// For [`MemberKind::Property`] the property is an `Identifier`
    MemberExpression {
        kind: MemberKind,
        object: NodeId,
        property: NodeId,
    },
    CallExpression { callee: NodeId, arguments: Vec<NodeId> },
    NewExpression { class: NodeId, arguments: Vec<NodeId> },
    ArrayExpression { elements: Vec<NodeId> },
    BinaryExpression { op: BinaryOp, left: NodeId, right: NodeId },
    UnaryExpression { op: UnaryOp, operand: NodeId },
    UpdateExpression { op: UpdateOp, prefix: bool, operand: NodeId },
    AssignmentExpression { op: AssignOp, target: NodeId, value: NodeId },
    ConditionalExpression {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    AsExpression { expr: NodeId, ty: NodeId },
    /// `({ ... })`, valued by its last expression statement
    BlockExpression { statements: Vec<NodeId> },

    // Statements
    ExpressionStatement { expr: NodeId },
    VariableDeclaration {
        kind: VarKind,
        name: NodeId,
        ty: Option<NodeId>,
        init: Option<NodeId>,
    },
    BlockStatement { statements: Vec<NodeId> },
    IfStatement {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    WhileStatement { test: NodeId, body: NodeId },
    ReturnStatement { argument: Option<NodeId> },
    EmptyStatement,

    // Declarations
    FunctionDeclaration { name: NodeId, function: NodeId },
    /// Signature plus optional body of a function, method or accessor
    ScriptFunction {
        params: Vec<NodeId>,
        return_type: Option<NodeId>,
        body: Option<NodeId>,
    },
    Parameter { name: NodeId, ty: NodeId },
    ClassDeclaration {
        modifiers: ModifierFlags,
        name: NodeId,
        extends: Option<NodeId>,
        implements: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    InterfaceDeclaration {
        name: NodeId,
        extends: Vec<NodeId>,
        body: NodeId,
    },
    InterfaceBody { members: Vec<NodeId> },
    ClassProperty {
        modifiers: ModifierFlags,
        name: NodeId,
        ty: NodeId,
        init: Option<NodeId>,
    },
    /// Further signatures sharing the name live in `overloads`
    MethodDefinition {
        kind: MethodKind,
        modifiers: ModifierFlags,
        name: NodeId,
        function: NodeId,
        overloads: Vec<NodeId>,
    },

    // Types
    TypeReference { name: String },
    UnionType { types: Vec<NodeId> },
    ArrayType { element: NodeId },
}

impl NodeKind {
    /// Direct children in source order
    pub fn children(&self) -> ChildList {
        let mut out = ChildList::new();
        match self {
            NodeKind::Program { statements }
            | NodeKind::BlockExpression { statements }
            | NodeKind::BlockStatement { statements } => out.extend(statements.iter().copied()),
            NodeKind::Identifier { .. }
            | NodeKind::NumberLiteral { .. }
            | NodeKind::BigIntLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::UndefinedLiteral
            | NodeKind::NullLiteral
            | NodeKind::ThisExpression
            | NodeKind::EmptyStatement
            | NodeKind::TypeReference { .. } => {}
            NodeKind::MemberExpression { object, property, .. } => {
                out.push(*object);
                out.push(*property);
            }
            NodeKind::CallExpression { callee, arguments } => {
                out.push(*callee);
                out.extend(arguments.iter().copied());
            }
            NodeKind::NewExpression { class, arguments } => {
                out.push(*class);
                out.extend(arguments.iter().copied());
            }
            NodeKind::ArrayExpression { elements } => out.extend(elements.iter().copied()),
            NodeKind::BinaryExpression { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            NodeKind::UnaryExpression { operand, .. } | NodeKind::UpdateExpression { operand, .. } => {
                out.push(*operand)
            }
            NodeKind::AssignmentExpression { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                out.push(*test);
                out.push(*consequent);
                out.push(*alternate);
            }
            NodeKind::AsExpression { expr, ty } => {
                out.push(*expr);
                out.push(*ty);
            }
            NodeKind::ExpressionStatement { expr } => out.push(*expr),
            NodeKind::VariableDeclaration { name, ty, init, .. } => {
                out.push(*name);
                out.extend(*ty);
                out.extend(*init);
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                out.push(*test);
                out.push(*consequent);
                out.extend(*alternate);
            }
            NodeKind::WhileStatement { test, body } => {
                out.push(*test);
                out.push(*body);
            }
            NodeKind::ReturnStatement { argument } => out.extend(*argument),
            NodeKind::FunctionDeclaration { name, function } => {
                out.push(*name);
                out.push(*function);
            }
            NodeKind::ScriptFunction {
                params,
                return_type,
                body,
            } => {
                out.extend(params.iter().copied());
                out.extend(*return_type);
                out.extend(*body);
            }
            NodeKind::Parameter { name, ty } => {
                out.push(*name);
                out.push(*ty);
            }
            NodeKind::ClassDeclaration {
                name,
                extends,
                implements,
                body,
                ..
            } => {
                out.push(*name);
                out.extend(*extends);
                out.extend(implements.iter().copied());
                out.extend(body.iter().copied());
            }
            NodeKind::InterfaceDeclaration { name, extends, body } => {
                out.push(*name);
                out.extend(extends.iter().copied());
                out.push(*body);
            }
            NodeKind::InterfaceBody { members } => out.extend(members.iter().copied()),
            NodeKind::ClassProperty { name, ty, init, .. } => {
                out.push(*name);
                out.push(*ty);
                out.extend(*init);
            }
            NodeKind::MethodDefinition {
                name,
                function,
                overloads,
                ..
            } => {
                out.push(*name);
                out.push(*function);
                out.extend(overloads.iter().copied());
            }
            NodeKind::UnionType { types } => out.extend(types.iter().copied()),
            NodeKind::ArrayType { element } => out.push(*element),
        }
        out
    }

    /// Mutable slots of the direct children, in the order of [`NodeKind::children`]
    pub fn child_slots_mut(&mut self) -> SmallVec<[&mut NodeId; 8]> {
        let mut out = SmallVec::new();
        match self {
            NodeKind::Program { statements }
            | NodeKind::BlockExpression { statements }
            | NodeKind::BlockStatement { statements } => out.extend(statements.iter_mut()),
            NodeKind::Identifier { .. }
            | NodeKind::NumberLiteral { .. }
            | NodeKind::BigIntLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::UndefinedLiteral
            | NodeKind::NullLiteral
            | NodeKind::ThisExpression
            | NodeKind::EmptyStatement
            | NodeKind::TypeReference { .. } => {}
            NodeKind::MemberExpression { object, property, .. } => {
                out.push(object);
                out.push(property);
            }
            NodeKind::CallExpression { callee, arguments } => {
                out.push(callee);
                out.extend(arguments.iter_mut());
            }
            NodeKind::NewExpression { class, arguments } => {
                out.push(class);
                out.extend(arguments.iter_mut());
            }
            NodeKind::ArrayExpression { elements } => out.extend(elements.iter_mut()),
            NodeKind::BinaryExpression { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            NodeKind::UnaryExpression { operand, .. } | NodeKind::UpdateExpression { operand, .. } => {
                out.push(operand)
            }
            NodeKind::AssignmentExpression { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                out.push(test);
                out.push(consequent);
                out.push(alternate);
            }
            NodeKind::AsExpression { expr, ty } => {
                out.push(expr);
                out.push(ty);
            }
            NodeKind::ExpressionStatement { expr } => out.push(expr),
            NodeKind::VariableDeclaration { name, ty, init, .. } => {
                out.push(name);
                out.extend(ty.as_mut());
                out.extend(init.as_mut());
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                out.push(test);
                out.push(consequent);
                out.extend(alternate.as_mut());
            }
            NodeKind::WhileStatement { test, body } => {
                out.push(test);
                out.push(body);
            }
            NodeKind::ReturnStatement { argument } => out.extend(argument.as_mut()),
            NodeKind::FunctionDeclaration { name, function } => {
                out.push(name);
                out.push(function);
            }
            NodeKind::ScriptFunction {
                params,
                return_type,
                body,
            } => {
                out.extend(params.iter_mut());
                out.extend(return_type.as_mut());
                out.extend(body.as_mut());
            }
            NodeKind::Parameter { name, ty } => {
                out.push(name);
                out.push(ty);
            }
            NodeKind::ClassDeclaration {
                name,
                extends,
                implements,
                body,
                ..
            } => {
                out.push(name);
                out.extend(extends.as_mut());
                out.extend(implements.iter_mut());
                out.extend(body.iter_mut());
            }
            NodeKind::InterfaceDeclaration { name, extends, body } => {
                out.push(name);
                out.extend(extends.iter_mut());
                out.push(body);
            }
            NodeKind::InterfaceBody { members } => out.extend(members.iter_mut()),
            NodeKind::ClassProperty { name, ty, init, .. } => {
                out.push(name);
                out.push(ty);
                out.extend(init.as_mut());
            }
            NodeKind::MethodDefinition {
                name,
                function,
                overloads,
                ..
            } => {
                out.push(name);
                out.push(function);
                out.extend(overloads.iter_mut());
            }
            NodeKind::UnionType { types } => out.extend(types.iter_mut()),
            NodeKind::ArrayType { element } => out.push(element),
        }
        out
    }

    /// The growable child list of list-owning nodes: statement lists,
    /// interface members and class members
    pub fn list_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            NodeKind::Program { statements }
            | NodeKind::BlockExpression { statements }
            | NodeKind::BlockStatement { statements } => Some(statements),
            NodeKind::InterfaceBody { members } => Some(members),
            NodeKind::ClassDeclaration { body, .. } => Some(body),
            NodeKind::MethodDefinition { overloads, .. } => Some(overloads),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::NumberLiteral { .. } => "NumberLiteral",
            NodeKind::BigIntLiteral { .. } => "BigIntLiteral",
            NodeKind::StringLiteral { .. } => "StringLiteral",
            NodeKind::BooleanLiteral { .. } => "BooleanLiteral",
            NodeKind::UndefinedLiteral => "UndefinedLiteral",
            NodeKind::NullLiteral => "NullLiteral",
            NodeKind::ThisExpression => "ThisExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::ArrayExpression { .. } => "ArrayExpression",
            NodeKind::BinaryExpression { .. } => "BinaryExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::UpdateExpression { .. } => "UpdateExpression",
            NodeKind::AssignmentExpression { .. } => "AssignmentExpression",
            NodeKind::ConditionalExpression { .. } => "ConditionalExpression",
            NodeKind::AsExpression { .. } => "AsExpression",
            NodeKind::BlockExpression { .. } => "BlockExpression",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::BlockStatement { .. } => "BlockStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::EmptyStatement => "EmptyStatement",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::ScriptFunction { .. } => "ScriptFunction",
            NodeKind::Parameter { .. } => "Parameter",
            NodeKind::ClassDeclaration { .. } => "ClassDeclaration",
            NodeKind::InterfaceDeclaration { .. } => "InterfaceDeclaration",
            NodeKind::InterfaceBody { .. } => "InterfaceBody",
            NodeKind::ClassProperty { .. } => "ClassProperty",
            NodeKind::MethodDefinition { .. } => "MethodDefinition",
            NodeKind::TypeReference { .. } => "TypeReference",
            NodeKind::UnionType { .. } => "UnionType",
            NodeKind::ArrayType { .. } => "ArrayType",
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Identifier { .. }
                | NodeKind::NumberLiteral { .. }
                | NodeKind::BigIntLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::BooleanLiteral { .. }
                | NodeKind::UndefinedLiteral
                | NodeKind::NullLiteral
                | NodeKind::ThisExpression
                | NodeKind::MemberExpression { .. }
                | NodeKind::CallExpression { .. }
                | NodeKind::NewExpression { .. }
                | NodeKind::ArrayExpression { .. }
                | NodeKind::BinaryExpression { .. }
                | NodeKind::UnaryExpression { .. }
                | NodeKind::UpdateExpression { .. }
                | NodeKind::AssignmentExpression { .. }
                | NodeKind::ConditionalExpression { .. }
                | NodeKind::AsExpression { .. }
                | NodeKind::BlockExpression { .. }
        )
    }

    /// Anything that may stand in a statement list
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::ExpressionStatement { .. }
                | NodeKind::VariableDeclaration { .. }
                | NodeKind::BlockStatement { .. }
                | NodeKind::IfStatement { .. }
                | NodeKind::WhileStatement { .. }
                | NodeKind::ReturnStatement { .. }
                | NodeKind::EmptyStatement
                | NodeKind::FunctionDeclaration { .. }
                | NodeKind::ClassDeclaration { .. }
                | NodeKind::InterfaceDeclaration { .. }
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::TypeReference { .. } | NodeKind::UnionType { .. } | NodeKind::ArrayType { .. }
        )
    }

    pub fn is_class_element(&self) -> bool {
        matches!(self, NodeKind::ClassProperty { .. } | NodeKind::MethodDefinition { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            NodeKind::NumberLiteral { .. }
                | NodeKind::BigIntLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::BooleanLiteral { .. }
                | NodeKind::UndefinedLiteral
                | NodeKind::NullLiteral
        )
    }

    /// Nodes the binder gives a scope of their own
    pub fn bears_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Program { .. }
                | NodeKind::BlockStatement { .. }
                | NodeKind::BlockExpression { .. }
                | NodeKind::ScriptFunction { .. }
                | NodeKind::ClassDeclaration { .. }
                | NodeKind::InterfaceDeclaration { .. }
        )
    }

    /// Name of an `Identifier` node
    pub fn identifier_name(&self) -> Option<&str> {
        match self {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_and_slots_agree() {
        let mut kind = NodeKind::VariableDeclaration {
            kind: VarKind::Let,
            name: NodeId::from_raw(1),
            ty: None,
            init: Some(NodeId::from_raw(2)),
        };
        assert_eq!(kind.children().as_slice(), &[NodeId::from_raw(1), NodeId::from_raw(2)]);
        for slot in kind.child_slots_mut() {
            *slot = NodeId::from_raw(slot.as_raw() + 10);
        }
        assert_eq!(kind.children().as_slice(), &[NodeId::from_raw(11), NodeId::from_raw(12)]);
    }

    #[test]
    fn test_categories() {
        assert!(NodeKind::ThisExpression.is_expression());
        assert!(NodeKind::EmptyStatement.is_statement());
        assert!(!NodeKind::EmptyStatement.is_expression());
        assert!(NodeKind::TypeReference { name: "int".into() }.is_type());
        assert!(NodeKind::BlockExpression { statements: vec![] }.bears_scope());
    }
}
