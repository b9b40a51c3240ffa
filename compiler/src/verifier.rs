//! Read-only structural checks over an arena AST
//!
//! The verifier walks a tree once and asks every registered
//! [`InvariantCheck`] about every node. Checks only report; they never
//! change the tree and a violation never stops compilation.

use std::fmt;

use diagnostics::lowering::LoweringDiagnostics;
use diagnostics::{Diagnostic, FileId, SourceFile, SourceMap, SourcePosition};
use log::{debug, trace};

use crate::ast::{AstArena, NodeKind, Span};
use crate::id_types::NodeId;
use crate::pipeline::PipelineConfig;

pub const NULL_PARENT: &str = "NULL_PARENT";
pub const INVALID_PARENT: &str = "INVALID_PARENT";
pub const MISSING_VARIABLE: &str = "MISSING_VARIABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDecision {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAction {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    pub decision: CheckDecision,
    pub action: CheckAction,
}

impl CheckResult {
    pub const CORRECT: Self = Self {
        decision: CheckDecision::Correct,
        action: CheckAction::Continue,
    };
    pub const INCORRECT: Self = Self {
        decision: CheckDecision::Incorrect,
        action: CheckAction::Continue,
    };

    pub fn from_bool(ok: bool) -> Self {
        if ok {
            Self::CORRECT
        } else {
            Self::INCORRECT
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckMessage {
    pub tag: String,
    /// Name of the check that reported it
    pub check: &'static str,
    pub node: NodeId,
    pub span: Span,
    pub position: SourcePosition,
}

impl CheckMessage {
    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId) -> Diagnostic {
        let span = source_map.span_or_unknown(file_id, self.span.start, self.span.end);
        LoweringDiagnostics::invariant_violation(span, &self.tag, self.check)
    }
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.position.is_known() {
            write!(
                f,
                "{} at {}:{} ({} in {})",
                self.tag, self.position.line, self.position.column, self.node, self.check
            )
        } else {
            write!(f, "{} at offset {} ({} in {})", self.tag, self.span.start, self.node, self.check)
        }
    }
}

/// Message sink shared by all checks of one walk
pub struct CheckContext<'s> {
    messages: Vec<CheckMessage>,
    source: Option<&'s SourceFile>,
    root: NodeId,
}

impl<'s> CheckContext<'s> {
    pub fn new(root: NodeId, source: Option<&'s SourceFile>) -> Self {
        Self {
            messages: Vec::new(),
            source,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn add_check_message(&mut self, tag: &str, check: &'static str, arena: &AstArena, node: NodeId) {
        let span = arena.span(node);
        let position = match self.source {
            Some(source) => source.position(span.start),
            None => SourcePosition::unknown(span.start),
        };
        trace!("{} reported {} on {} {}", check, tag, arena.kind(node).name(), node);
        self.messages.push(CheckMessage {
            tag: tag.to_string(),
            check,
            node,
            span,
            position,
        });
    }

    pub fn messages(&self) -> &[CheckMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<CheckMessage> {
        self.messages
    }
}

pub trait InvariantCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, ctx: &mut CheckContext<'_>, arena: &AstArena, node: NodeId) -> CheckResult;
}

/// Every node but the root has a parent
pub struct NodeHasParent;

impl InvariantCheck for NodeHasParent {
    fn name(&self) -> &'static str {
        "NodeHasParent"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, arena: &AstArena, node: NodeId) -> CheckResult {
        let is_program = node == ctx.root() && matches!(arena.kind(node), NodeKind::Program { .. });
        if arena.parent(node).is_some() || node == ctx.root() || is_program {
            return CheckResult::CORRECT;
        }
        ctx.add_check_message(NULL_PARENT, self.name(), arena, node);
        CheckResult::INCORRECT
    }
}

/// Children point back at the node that lists them
pub struct EveryChildHasValidParent;

impl InvariantCheck for EveryChildHasValidParent {
    fn name(&self) -> &'static str {
        "EveryChildHasValidParent"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, arena: &AstArena, node: NodeId) -> CheckResult {
        let mut result = CheckResult::CORRECT;
        for child in arena.children(node) {
            // a missing parent is NodeHasParent's to report
            match arena.parent(child) {
                Some(parent) if parent != node => {
                    ctx.add_check_message(INVALID_PARENT, self.name(), arena, child);
                    result = CheckResult::INCORRECT;
                }
                _ => {}
            }
        }
        result
    }
}

/// References are bound after binding
pub struct IdentifierHasVariable;

impl InvariantCheck for IdentifierHasVariable {
    fn name(&self) -> &'static str {
        "IdentifierHasVariable"
    }

    fn check(&self, ctx: &mut CheckContext<'_>, arena: &AstArena, node: NodeId) -> CheckResult {
        if !arena.is_reference_identifier(node) || arena.get(node).variable.is_some() {
            return CheckResult::CORRECT;
        }
        ctx.add_check_message(MISSING_VARIABLE, self.name(), arena, node);
        CheckResult::INCORRECT
    }
}

#[derive(Default)]
pub struct AstVerifier {
    checks: Vec<Box<dyn InvariantCheck>>,
}

impl AstVerifier {
    /// A verifier with no checks
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_checks() -> Self {
        let mut verifier = Self::new();
        verifier.add_check(NodeHasParent);
        verifier.add_check(EveryChildHasValidParent);
        verifier
    }

    pub fn for_config(config: &PipelineConfig) -> Self {
        let mut verifier = Self::with_default_checks();
        if config.verify_identifier_bindings {
            verifier.add_check(IdentifierHasVariable);
        }
        verifier
    }

    pub fn add_check<C: InvariantCheck + 'static>(&mut self, check: C) {
        self.checks.push(Box::new(check));
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    /// Walk `root` once in pre-order, running every check on every node
    pub fn verify(&self, arena: &AstArena, root: NodeId, source: Option<&SourceFile>) -> Vec<CheckMessage> {
        let _span = tracing::debug_span!("verify", checks = self.checks.len()).entered();
        let mut ctx = CheckContext::new(root, source);
        let mut visited = 0usize;
        'walk: for node in arena.subtree(root) {
            visited += 1;
            for check in &self.checks {
                if check.check(&mut ctx, arena, node).action == CheckAction::Stop {
                    break 'walk;
                }
            }
        }
        debug!(
            "verified {} node(s): {} message(s)",
            visited,
            ctx.messages().len()
        );
        ctx.into_messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::from_syntax::SyntaxConverter;

    fn convert(src: &str) -> (AstArena, NodeId) {
        let module = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &module).unwrap();
        (arena, root)
    }

    #[test]
    fn test_converted_tree_is_clean() {
        let (arena, root) = convert("class C { x: int = 1; m(): void { this.x += 1; } }");
        let messages = AstVerifier::with_default_checks().verify(&arena, root, None);
        assert!(messages.is_empty(), "{:?}", messages);
    }

    #[test]
    fn test_null_parent_carries_position() {
        let src = "let a: int = 1;\na + 1;";
        let (mut arena, root) = convert(src);
        let statement = arena
            .subtree(root)
            .into_iter()
            .find(|&n| matches!(arena.kind(n), NodeKind::ExpressionStatement { .. }))
            .unwrap();
        let expr = arena.children(statement)[0];
        arena.set_parent(expr, None);

        let source = SourceFile::new("t.ets", src);
        let messages = AstVerifier::with_default_checks().verify(&arena, root, Some(&source));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, NULL_PARENT);
        assert_eq!(messages[0].node, expr);
        assert_eq!(messages[0].position.line, 2);
    }

    #[test]
    fn test_invalid_parent() {
        let (mut arena, root) = convert("let a: int = 1; let b: int = 2;");
        let statements = arena.children(root);
        let init = arena.children(statements[1])[2];
        arena.set_parent(init, Some(statements[0]));
        let messages = AstVerifier::with_default_checks().verify(&arena, root, None);
        let tags: Vec<&str> = messages.iter().map(|m| m.tag.as_str()).collect();
        assert_eq!(tags, vec![INVALID_PARENT]);
    }

    #[test]
    fn test_identifier_binding_check_is_opt_in() {
        let (arena, root) = convert("let a: int = b;");
        assert!(AstVerifier::with_default_checks().verify(&arena, root, None).is_empty());

        let mut config = PipelineConfig::default();
        config.verify_identifier_bindings = true;
        let verifier = AstVerifier::for_config(&config);
        assert_eq!(
            verifier.check_names(),
            vec!["NodeHasParent", "EveryChildHasValidParent", "IdentifierHasVariable"]
        );
        let messages = verifier.verify(&arena, root, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, MISSING_VARIABLE);
    }

    struct StopAtFirst;

    impl InvariantCheck for StopAtFirst {
        fn name(&self) -> &'static str {
            "StopAtFirst"
        }

        fn check(&self, ctx: &mut CheckContext<'_>, arena: &AstArena, node: NodeId) -> CheckResult {
            ctx.add_check_message("SEEN", self.name(), arena, node);
            CheckResult {
                decision: CheckDecision::Correct,
                action: CheckAction::Stop,
            }
        }
    }

    #[test]
    fn test_stop_ends_walk() {
        let (arena, root) = convert("let a: int = 1; let b: int = 2;");
        let mut verifier = AstVerifier::new();
        verifier.add_check(StopAtFirst);
        let messages = verifier.verify(&arena, root, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].node, root);
    }

    #[test]
    fn test_to_diagnostic() {
        let src = "a;";
        let mut map = SourceMap::new();
        let file = map.add_file("t.ets", src);
        let message = CheckMessage {
            tag: NULL_PARENT.into(),
            check: "NodeHasParent",
            node: NodeId::from_raw(1),
            span: Span::new(0, 1),
            position: SourcePosition::new(1, 1, 0),
        };
        let diagnostic = message.to_diagnostic(&map, file);
        assert_eq!(diagnostic.code.as_deref(), Some("E9101"));
        assert!(!diagnostic.is_error());
        assert!(message.to_string().starts_with("NULL_PARENT at 1:1"));
    }
}
