//! Compound assignment and update lowering
//!
//! `target op= value` becomes `target = (target op (value)) as T` where `T`
//! is the target's type, and `x++`/`--x` become plain assignments through a
//! temporary. Parts of the target that have side effects or may change
//! between the read and the write (non-trivial objects, computed keys) are
//! first stored in `gensym$N` temporaries, so each runs exactly once:
//!
//! ```text
//! a()[i] += v   =>   ({ let gensym$1 = a(); let gensym$2 = i;
//!                       gensym$1[gensym$2] = (gensym$1[gensym$2] + (v)) as T; })
//! ```

use log::debug;

use crate::ast::from_syntax::Insertion;
use crate::ast::{AstArena, MemberKind, NodeKind, Span};
use crate::checker::Type;
use crate::error::{LoweringError, LoweringResult};
use crate::id_types::{NodeId, ScopeId, TypeId};
use crate::lowering::{LoweringContext, LoweringPhase, Module};
use crate::snippet::SnippetBuilder;

#[derive(Debug, Default)]
pub struct OpAssignmentLowering;

impl OpAssignmentLowering {
    pub fn new() -> Self {
        Self
    }
}

impl LoweringPhase for OpAssignmentLowering {
    fn name(&self) -> &'static str {
        "OpAssignmentLowering"
    }

    fn perform_for_module(&mut self, ctx: &mut LoweringContext, module: &mut Module) -> LoweringResult<bool> {
        let mut lowered = 0usize;
        let root = module.root;
        module
            .arena
            .transform_children_recursively(root, self.name(), &mut |arena, node| {
                let replacement = match arena.kind(node) {
                    NodeKind::AssignmentExpression { op, .. } if op.is_compound() => {
                        lower_assignment(ctx, arena, node)?
                    }
                    NodeKind::UpdateExpression { .. } => lower_update(ctx, arena, node)?,
                    _ => return Ok(node),
                };
                lowered += 1;
                Ok(replacement)
            })?;
        debug!("lowered {} compound assignment(s) and update(s)", lowered);
        ctx.record_rewrites(lowered);
        Ok(lowered > 0)
    }

    fn postcondition_for_module(&self, _ctx: &LoweringContext, module: &Module) -> bool {
        let arena = &module.arena;
        arena.subtree(module.root).into_iter().all(|node| {
            let lowerable = match arena.kind(node) {
                NodeKind::AssignmentExpression { op, .. } => op.is_compound(),
                NodeKind::UpdateExpression { .. } => true,
                _ => false,
            };
            !lowerable || arena.get(node).ty.is_none()
        })
    }
}

/// One rewrite in progress: template insertions plus what is needed to
/// synthesize temporaries next to the rewritten node
struct Rewrite<'c> {
    ctx: &'c mut LoweringContext,
    insertions: Vec<Insertion>,
    scope: Option<ScopeId>,
    span: Span,
}

/// The access chain of an assignment target, rendered to template text
struct Target {
    /// Text reading or writing the target; valid on both sides of `=`
    access: String,
    /// `let` statements that must run first
    prologue: Vec<NodeId>,
}

enum Step {
    Property(String),
    Element(NodeId),
}

impl<'c> Rewrite<'c> {
    fn new(ctx: &'c mut LoweringContext, arena: &AstArena, node: NodeId) -> Self {
        Self {
            ctx,
            insertions: Vec::new(),
            scope: arena.enclosing_scope(node),
            span: arena.span(node),
        }
    }

    /// Register a fragment and return the placeholder naming it. Using the
    /// returned text twice splices a clone the second time.
    fn slot(&mut self, kind: &str, insertion: impl Into<Insertion>) -> String {
        self.insertions.push(insertion.into());
        format!("@@{}{}", kind, self.insertions.len())
    }

    fn type_slot(&mut self, arena: &mut AstArena, ty: TypeId) -> LoweringResult<String> {
        let text = self.ctx.checker().types().type_to_string(ty);
        let node = SnippetBuilder::new(arena).create_type_annotation(&text)?;
        Ok(self.slot("T", node))
    }

    /// Fresh temporary name, declared in the rewrite's scope
    fn temporary(&mut self) -> LoweringResult<String> {
        let name = self.ctx.gensym_in(self.scope);
        if let Some(scope) = self.scope {
            self.ctx.declare_temporary(scope, &name, self.span)?;
        }
        Ok(name)
    }

    /// `let gensym$N = expr;` appended to `prologue`; returns the name
    fn hoist(&mut self, arena: &mut AstArena, prologue: &mut Vec<NodeId>, expr: NodeId) -> LoweringResult<String> {
        let name = self.temporary()?;
        let statement =
            SnippetBuilder::new(arena).create_formatted_statement(&format!("let {} = @@E1;", name), &[expr.into()])?;
        prologue.push(statement);
        Ok(name)
    }

    /// Break a member or element target into its access chain, hoisting
    /// every part that must not be evaluated twice
    fn split_target(&mut self, arena: &mut AstArena, target: NodeId) -> LoweringResult<Target> {
        let mut steps = Vec::new();
        let mut base = target;
        while let NodeKind::MemberExpression { kind, object, property } = arena.kind(base) {
            let step = match kind {
                MemberKind::Property => {
                    Step::Property(arena.identifier_name(*property).unwrap_or_default().to_string())
                }
                MemberKind::Element => Step::Element(*property),
            };
            steps.push(step);
            base = *object;
        }
        if steps.is_empty() {
            return Err(LoweringError::internal(
                format!("cannot lower assignment to {}", arena.kind(target).name()),
                self.span,
            ));
        }
        steps.reverse();

        let mut prologue = Vec::new();
        let mut access = if is_stable(arena, base) {
            self.slot("E", base)
        } else {
            self.hoist(arena, &mut prologue, base)?
        };
        for step in steps {
            match step {
                Step::Property(name) => {
                    access.push('.');
                    access.push_str(&name);
                }
                Step::Element(key) => {
                    let key = if arena.kind(key).is_literal() {
                        self.slot("E", key)
                    } else {
                        self.hoist(arena, &mut prologue, key)?
                    };
                    access.push('[');
                    access.push_str(&key);
                    access.push(']');
                }
            }
        }
        Ok(Target { access, prologue })
    }

    /// A block expression running `prologue` and then `statements`, valued
    /// by the last statement. With nothing to run first and one statement
    /// the statement itself is the expression.
    fn wrap(&mut self, prologue: Vec<NodeId>, statements: &[String]) -> String {
        if prologue.is_empty() && statements.len() == 1 {
            return statements[0].clone();
        }
        let mut text = String::from("({ ");
        if !prologue.is_empty() {
            text.push_str(&self.slot("S", prologue));
            text.push(' ');
        }
        for statement in statements {
            text.push_str(statement);
            text.push_str("; ");
        }
        text.push_str("})");
        text
    }

    /// Build the replacement from `text` and splice it in for `node`
    fn finish(self, arena: &mut AstArena, node: NodeId, text: &str) -> LoweringResult<NodeId> {
        debug!("lowering {} with `{}`", arena.kind(node).name(), text);
        let replacement = SnippetBuilder::new(arena).create_formatted_expression(text, &self.insertions)?;
        self.ctx.integrate(arena, node, replacement)?;
        Ok(replacement)
    }
}

fn lower_assignment(ctx: &mut LoweringContext, arena: &mut AstArena, node: NodeId) -> LoweringResult<NodeId> {
    let NodeKind::AssignmentExpression { op, target, value } = arena.kind(node).clone() else {
        return Ok(node);
    };
    let binary = op.binary_op().ok_or_else(|| {
        LoweringError::internal(format!("'{}' has no arithmetic operator", op.as_str()), arena.span(node))
    })?;
    let ty = ctx.type_of(arena, node)?;

    let mut rewrite = Rewrite::new(ctx, arena, node);
    let text = if matches!(arena.kind(target), NodeKind::Identifier { .. }) {
        // the original carries the checker's unboxing flags, so it stays the read
        let copy = arena.clone_subtree(target, None);
        let write = rewrite.slot("I", copy);
        let read = rewrite.slot("I", target);
        let value = rewrite.slot("E", value);
        let ty = rewrite.type_slot(arena, ty)?;
        format!("{} = ({} {} ({})) as {}", write, read, binary.as_str(), value, ty)
    } else {
        let target = rewrite.split_target(arena, target)?;
        let value = rewrite.slot("E", value);
        let ty = rewrite.type_slot(arena, ty)?;
        let access = &target.access;
        let assignment = format!("{} = ({} {} ({})) as {}", access, access, binary.as_str(), value, ty);
        rewrite.wrap(target.prologue, &[assignment])
    };
    rewrite.finish(arena, node, &text)
}

fn lower_update(ctx: &mut LoweringContext, arena: &mut AstArena, node: NodeId) -> LoweringResult<NodeId> {
    let NodeKind::UpdateExpression { op, prefix, operand } = arena.kind(node).clone() else {
        return Ok(node);
    };
    let ty = ctx.type_of(arena, node)?;
    // only bigint operands need a suffixed literal
    let one = match ctx.checker().types().get(ty) {
        Type::BigInt => "1n",
        _ => "1",
    };
    let binary = op.binary_op().as_str();

    let mut rewrite = Rewrite::new(ctx, arena, node);
    let (read, write, prologue) = if matches!(arena.kind(operand), NodeKind::Identifier { .. }) {
        let copy = arena.clone_subtree(operand, None);
        let read = rewrite.slot("I", operand);
        (read, rewrite.slot("I", copy), Vec::new())
    } else {
        let target = rewrite.split_target(arena, operand)?;
        (target.access.clone(), target.access, target.prologue)
    };
    let ty = rewrite.type_slot(arena, ty)?;

    let statements = if prefix {
        vec![format!("{} = ({} {} {}) as {}", write, read, binary, one, ty)]
    } else {
        let old = rewrite.temporary()?;
        vec![
            format!("const {} = {}", old, read),
            format!("{} = ({} {} {}) as {}", write, old, binary, one, ty),
            old,
        ]
    };
    let text = rewrite.wrap(prologue, &statements);
    rewrite.finish(arena, node, &text)
}

/// Objects that read the same value twice without side effects
fn is_stable(arena: &AstArena, node: NodeId) -> bool {
    let kind = arena.kind(node);
    matches!(kind, NodeKind::Identifier { .. } | NodeKind::ThisExpression) || kind.is_literal()
}
