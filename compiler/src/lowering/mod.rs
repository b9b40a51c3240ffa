//! Lowering phases and the per-unit context they share
//!
//! A phase rewrites one surface construct into already-lowered ones. Every
//! replacement subtree goes through [`LoweringContext::integrate`], which
//! links it into the tree, binds its names and type-checks it before the
//! next rewrite looks at it.

pub mod interface_properties;
pub mod op_assignment;
pub mod phase_manager;

use diagnostics::SourceFile;
use log::debug;

use crate::ast::{AstArena, BoxingUnboxingFlags, NodeKind, Span};
use crate::binder::{Binder, VariableKind};
use crate::checker::{CheckError, Checker, CheckerStatus, SavedCheckerContext, ScopeContext};
use crate::error::{LoweringError, LoweringResult};
use crate::id_types::{NodeId, ScopeId, TypeId};
use crate::pipeline::PipelineConfig;

pub use interface_properties::InterfacePropertyDeclarationsPhase;
pub use op_assignment::OpAssignmentLowering;
pub use phase_manager::{PhaseManager, PhaseOutcome, PhaseReport};

/// One compilation unit: the arena and the `Program` node rooted in it
#[derive(Debug, Clone)]
pub struct Module {
    pub arena: AstArena,
    pub root: NodeId,
}

impl Module {
    pub fn new(arena: AstArena, root: NodeId) -> Self {
        Self { arena, root }
    }
}

pub trait LoweringPhase: Send {
    fn name(&self) -> &'static str;

    /// Rewrite the module; returns whether anything changed
    fn perform_for_module(&mut self, ctx: &mut LoweringContext, module: &mut Module) -> LoweringResult<bool>;

    /// Holds once the phase's construct is gone from the module
    fn postcondition_for_module(&self, _ctx: &LoweringContext, _module: &Module) -> bool {
        true
    }
}

/// State shared by the phases of one compilation unit
pub struct LoweringContext {
    binder: Binder,
    checker: Checker,
    gensym_counter: u32,
    /// Constructs rewritten by the running phase
    rewrites: usize,
    phase: Option<&'static str>,
    config: PipelineConfig,
    source: Option<SourceFile>,
}

impl LoweringContext {
    /// `binder` and `checker` must already have processed the module
    pub fn new(binder: Binder, checker: Checker, config: PipelineConfig) -> Self {
        Self {
            binder,
            checker,
            gensym_counter: 0,
            rewrites: 0,
            phase: None,
            config,
            source: None,
        }
    }

    pub fn with_source(mut self, source: SourceFile) -> Self {
        self.source = Some(source);
        self
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    pub fn checker_mut(&mut self) -> &mut Checker {
        &mut self.checker
    }

    /// Split borrow for running the checker against the binder
    pub fn checker_and_binder(&mut self) -> (&mut Checker, &Binder) {
        (&mut self.checker, &self.binder)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn current_phase(&self) -> Option<&'static str> {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Option<&'static str>) {
        self.phase = phase;
        self.rewrites = 0;
    }

    /// Count constructs the running phase rewrote; the phase manager
    /// reports the total in the phase's outcome
    pub fn record_rewrites(&mut self, count: usize) {
        self.rewrites += count;
    }

    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    /// Fresh name for a synthesized temporary, unique within the unit
    pub fn gensym(&mut self) -> String {
        self.gensym_counter += 1;
        format!("gensym${}", self.gensym_counter)
    }

    /// Like [`gensym`](Self::gensym), skipping names a user declaration
    /// already makes visible from `scope`
    pub fn gensym_in(&mut self, scope: Option<ScopeId>) -> String {
        loop {
            let name = self.gensym();
            match scope {
                Some(scope) if self.binder.find_decl_from(scope, &name).is_some() => {
                    debug!("temporary name '{}' is taken, trying the next one", name);
                }
                _ => return name,
            }
        }
    }

    /// Type of a node, checking it if it has none yet
    pub fn type_of(&mut self, arena: &mut AstArena, node: NodeId) -> LoweringResult<TypeId> {
        self.checker.check(arena, &self.binder, node)
    }

    /// Splice contract for a replacement that is about to take the place of
    /// `original`: link it under the original's parent, move the original's
    /// span onto it, bind it, check it and carry over the boxing metadata.
    ///
    /// The caller still puts `replacement` into the parent's child slot.
    pub fn integrate(&mut self, arena: &mut AstArena, original: NodeId, replacement: NodeId) -> LoweringResult<TypeId> {
        let parent = arena.parent(original);
        arena.set_parent(replacement, parent);
        arena.set_span_recursively(replacement, arena.span(original));

        let ty = self.bind_and_check(arena, replacement)?;

        let original_flags = arena.get(original).boxing_flags;
        let keep = if self.checker.types().is_primitive(ty) {
            BoxingUnboxingFlags::BOXING_FLAG
        } else {
            BoxingUnboxingFlags::UNBOXING_FLAG
        };
        arena
            .get_mut(replacement)
            .boxing_flags
            .insert(original_flags.masked(keep));

        if let Some(parent) = parent {
            arena.invalidate_types_upward(parent);
        }
        debug!(
            "{}: {} replaced by {}",
            self.phase.unwrap_or("lowering"),
            arena.kind(original).name(),
            arena.kind(replacement).name()
        );
        Ok(ty)
    }

    /// Rebind and recheck a class or interface whose body was rewritten in
    /// place
    pub fn refresh_declaration(&mut self, arena: &mut AstArena, decl: NodeId) -> LoweringResult<TypeId> {
        self.checker.invalidate_declaration(decl);
        arena.clear_types_recursively(decl);
        if let Some(parent) = arena.parent(decl) {
            arena.invalidate_types_upward(parent);
        }
        self.bind_and_check(arena, decl)
    }

    /// Drop every cached type and check the module from scratch
    pub fn retype_module(&mut self, module: &mut Module) -> LoweringResult<()> {
        module.arena.clear_types_recursively(module.root);
        self.check_module(module)
    }

    /// Fill in the types missing after a phase; new errors abort the unit
    pub fn check_module(&mut self, module: &mut Module) -> LoweringResult<()> {
        let before = self.checker.error_count();
        self.checker.check(&mut module.arena, &self.binder, module.root)?;
        self.errors_since(before, module.arena.span(module.root))
    }

    fn bind_and_check(&mut self, arena: &mut AstArena, node: NodeId) -> LoweringResult<TypeId> {
        let scope = self.enclosing_scope(arena, node)?;
        self.binder.resolve_references_for_subtree(arena, node, Some(scope))?;

        let class = arena.find_ancestor(node, |kind| matches!(kind, NodeKind::ClassDeclaration { .. }));
        let before = self.checker.error_count();
        let ty = {
            let mut saved = SavedCheckerContext::new(&mut self.checker, CheckerStatus::IGNORE_VISIBILITY, class);
            let mut scoped = ScopeContext::new(&mut saved, Some(scope));
            scoped.check(arena, &self.binder, node)?
        };
        self.errors_since(before, arena.span(node))?;
        Ok(ty)
    }

    fn enclosing_scope(&self, arena: &AstArena, node: NodeId) -> LoweringResult<ScopeId> {
        arena.enclosing_scope(node).ok_or_else(|| {
            LoweringError::internal(
                format!("{} is not attached below any scope", arena.kind(node).name()),
                arena.span(node),
            )
        })
    }

    fn errors_since(&mut self, before: usize, fallback: Span) -> LoweringResult<()> {
        if self.checker.error_count() == before {
            return Ok(());
        }
        let errors = self.checker.take_errors();
        let first = errors
            .into_iter()
            .nth(before)
            .unwrap_or_else(|| CheckError {
                message: "type check failed".into(),
                span: fallback,
            });
        Err(LoweringError::Type {
            message: first.message,
            span: first.span,
        })
    }

    /// Declare a synthesized name in `scope`, rejecting collisions
    pub fn declare_temporary(&mut self, scope: ScopeId, name: &str, span: Span) -> LoweringResult<()> {
        let guard = self.binder.enter_scope(scope);
        guard.throw_on_redeclaration(span, name, VariableKind::Const)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::from_syntax::SyntaxConverter;
    use crate::ast::printer::print;
    use crate::snippet::SnippetBuilder;

    fn context_for(src: &str) -> (LoweringContext, Module) {
        let parsed = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &parsed).unwrap();
        let mut binder = Binder::new();
        binder.bind_program(&mut arena, root).unwrap();
        let mut checker = Checker::new();
        checker.check_program(&mut arena, &binder, root).unwrap();
        assert!(checker.errors().is_empty());
        (
            LoweringContext::new(binder, checker, PipelineConfig::default()),
            Module::new(arena, root),
        )
    }

    fn first_expression(module: &Module) -> NodeId {
        module
            .arena
            .subtree(module.root)
            .into_iter()
            .find(|&n| matches!(module.arena.kind(n), NodeKind::ExpressionStatement { .. }))
            .map(|statement| module.arena.children(statement)[0])
            .unwrap()
    }

    #[test]
    fn test_gensym_is_unique() {
        let (mut ctx, _) = context_for("");
        assert_eq!(ctx.gensym(), "gensym$1");
        assert_eq!(ctx.gensym(), "gensym$2");
    }

    #[test]
    fn test_gensym_skips_visible_user_names() {
        let (mut ctx, module) = context_for("let gensym$1: int = 0; let gensym$2: int = 0; { let gensym$4: int = 0; }");
        let scope = module.arena.get(module.root).scope;
        assert_eq!(ctx.gensym_in(scope), "gensym$3");
        assert_eq!(ctx.gensym_in(scope), "gensym$4");
        assert_eq!(ctx.gensym_in(None), "gensym$5");
    }

    #[test]
    fn test_integrate_binds_checks_and_spans() {
        let (mut ctx, mut module) = context_for("let a: int = 1; a + 1;");
        let original = first_expression(&module);
        let original_span = module.arena.span(original);
        let replacement = SnippetBuilder::new(&mut module.arena)
            .create_expression("a * 2", parser::ParserStatus::NONE)
            .unwrap();

        let ty = ctx.integrate(&mut module.arena, original, replacement).unwrap();
        let parent = module.arena.parent(original).unwrap();
        assert!(module.arena.replace_child(parent, original, replacement));

        assert_eq!(ctx.checker().types().type_to_string(ty), "int");
        for node in module.arena.subtree(replacement) {
            assert_eq!(module.arena.span(node), original_span);
        }
        let a = module.arena.children(replacement)[0];
        assert!(module.arena.get(a).variable.is_some());
        assert_eq!(print(&module.arena, parent).trim(), "a * 2;");
        ctx.check_module(&mut module).unwrap();
    }

    #[test]
    fn test_integrate_after_growing_a_spliced_list() {
        let (mut ctx, mut module) = context_for("let a: int = 1; a + 1;");
        let original = first_expression(&module);
        let hoisted = SnippetBuilder::new(&mut module.arena)
            .create_statements("let t: int = 2;")
            .unwrap();
        let value = SnippetBuilder::new(&mut module.arena)
            .create_expression("a + t", parser::ParserStatus::NONE)
            .unwrap();
        let replacement = SnippetBuilder::new(&mut module.arena)
            .create_formatted_expression("({ @@S1 @@E2; })", &[hoisted.into(), value.into()])
            .unwrap();
        let late = SnippetBuilder::new(&mut module.arena)
            .create_statement("let u: int = t * 2;")
            .unwrap();
        assert!(module.arena.insert_child(replacement, 1, late));

        let ty = ctx.integrate(&mut module.arena, original, replacement).unwrap();
        let parent = module.arena.parent(original).unwrap();
        assert!(module.arena.replace_child(parent, original, replacement));
        ctx.check_module(&mut module).unwrap();

        assert_eq!(ctx.checker().types().type_to_string(ty), "int");
        assert_eq!(
            crate::ast::printer::print_compact(&module.arena, module.root),
            "let a: int = 1; ({ let t: int = 2; let u: int = t * 2; a + t; });"
        );
        let messages = crate::verifier::AstVerifier::with_default_checks().verify(&module.arena, module.root, None);
        assert!(
            messages
                .iter()
                .all(|m| m.tag != crate::verifier::NULL_PARENT && m.tag != crate::verifier::INVALID_PARENT),
            "{:?}",
            messages
        );
        assert!(messages.is_empty(), "{:?}", messages);
    }

    #[test]
    fn test_integrate_reports_type_errors() {
        let (mut ctx, mut module) = context_for("let a: int = 1; a + 1;");
        let original = first_expression(&module);
        let replacement = SnippetBuilder::new(&mut module.arena)
            .create_expression("a - \"text\"", parser::ParserStatus::NONE)
            .unwrap();
        let err = ctx.integrate(&mut module.arena, original, replacement).unwrap_err();
        assert!(matches!(err, LoweringError::Type { .. }));
    }

    #[test]
    fn test_integrate_keeps_boxing_bits_for_primitive_results() {
        let (mut ctx, mut module) = context_for("let a: int = 1; a + 1;");
        let original = first_expression(&module);
        module.arena.get_mut(original).boxing_flags.insert(
            BoxingUnboxingFlags::BOX_TO_INT.union(BoxingUnboxingFlags::UNBOX_TO_INT),
        );
        let replacement = SnippetBuilder::new(&mut module.arena)
            .create_expression("a - 1", parser::ParserStatus::NONE)
            .unwrap();
        ctx.integrate(&mut module.arena, original, replacement).unwrap();
        let flags = module.arena.get(replacement).boxing_flags;
        assert!(flags.contains(BoxingUnboxingFlags::BOX_TO_INT));
        assert!(!flags.has_unboxing());
    }

    #[test]
    fn test_declare_temporary_rejects_collisions() {
        let (mut ctx, module) = context_for("let taken: int = 1;");
        let scope = module.arena.get(module.root).scope.unwrap();
        assert!(ctx.declare_temporary(scope, "fresh", Span::default()).is_ok());
        let err = ctx.declare_temporary(scope, "taken", Span::default()).unwrap_err();
        assert!(matches!(err, LoweringError::Redeclaration { .. }));
    }
}
