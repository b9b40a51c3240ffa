//! Runs lowering phases over a module in a fixed order

use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;

use crate::error::{LoweringError, LoweringResult};
use crate::lowering::{
    InterfacePropertyDeclarationsPhase, LoweringContext, LoweringPhase, Module, OpAssignmentLowering,
};
use crate::pipeline::PipelineConfig;
use crate::verifier::{AstVerifier, CheckMessage};

/// What one phase did to the module
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    pub phase: &'static str,
    pub modified: bool,
    /// Constructs the phase rewrote
    pub rewrites: usize,
    /// Nodes in the arena after the phase, reachable or not
    pub arena_len: usize,
    #[serde(serialize_with = "serialize_micros")]
    pub elapsed: Duration,
    #[serde(serialize_with = "serialize_messages")]
    pub verifier_messages: Vec<CheckMessage>,
}

fn serialize_micros<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_micros())
}

fn serialize_messages<S: serde::Serializer>(messages: &[CheckMessage], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(messages.iter().map(ToString::to_string))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseReport {
    pub outcomes: Vec<PhaseOutcome>,
}

impl PhaseReport {
    pub fn modified(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.modified)
    }

    pub fn verifier_messages(&self) -> impl Iterator<Item = &CheckMessage> {
        self.outcomes.iter().flat_map(|outcome| outcome.verifier_messages.iter())
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.outcomes.iter().map(|outcome| outcome.phase).collect()
    }

    pub fn rewrites_of(&self, phase: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.phase == phase)
            .map(|outcome| outcome.rewrites)
            .sum()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

pub struct PhaseManager {
    phases: Vec<Box<dyn LoweringPhase>>,
}

impl Default for PhaseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseManager {
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    pub fn add_phase<P: LoweringPhase + 'static>(&mut self, phase: P) {
        self.phases.push(Box::new(phase));
    }

    /// Phases enabled in `config`, in their required order
    pub fn for_config(config: &PipelineConfig) -> Self {
        let mut manager = Self::new();
        if config.enable_interface_properties {
            manager.add_phase(InterfacePropertyDeclarationsPhase::new());
        }
        if config.enable_op_assignment {
            manager.add_phase(OpAssignmentLowering::new());
        }
        manager
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|phase| phase.name()).collect()
    }

    /// Run every phase once, in insertion order. The first failing phase
    /// aborts the unit; `ctx.current_phase()` still names it afterwards.
    pub fn run(&mut self, ctx: &mut LoweringContext, module: &mut Module) -> LoweringResult<PhaseReport> {
        let mut report = PhaseReport::default();
        for phase in &mut self.phases {
            let name = phase.name();
            let _span = tracing::info_span!("lowering_phase", phase = name).entered();
            ctx.set_phase(Some(name));
            info!("running lowering phase {}", name);
            let started = Instant::now();

            let modified = phase.perform_for_module(ctx, module)?;
            if ctx.config().check_postconditions && !phase.postcondition_for_module(ctx, module) {
                return Err(LoweringError::internal(
                    format!("postcondition of {} does not hold", name),
                    module.arena.span(module.root),
                ));
            }
            ctx.check_module(module)?;

            let verifier_messages = if ctx.config().verify_after_each_phase {
                let verifier = AstVerifier::for_config(ctx.config());
                verifier.verify(&module.arena, module.root, ctx.source())
            } else {
                Vec::new()
            };
            let elapsed = started.elapsed();
            debug!(
                "{} finished in {:?}: modified={}, {} rewrite(s), {} verifier message(s)",
                name,
                elapsed,
                modified,
                ctx.rewrites(),
                verifier_messages.len()
            );
            report.outcomes.push(PhaseOutcome {
                phase: name,
                modified,
                rewrites: ctx.rewrites(),
                arena_len: module.arena.len(),
                elapsed,
                verifier_messages,
            });
        }
        ctx.set_phase(None);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::from_syntax::SyntaxConverter;
    use crate::ast::{AstArena, NodeKind};
    use crate::binder::Binder;
    use crate::checker::Checker;
    use crate::id_types::NodeId;

    fn setup(src: &str, config: PipelineConfig) -> (LoweringContext, Module) {
        let parsed = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &parsed).unwrap();
        let mut binder = Binder::new();
        binder.bind_program(&mut arena, root).unwrap();
        let mut checker = Checker::new();
        checker.check_program(&mut arena, &binder, root).unwrap();
        (LoweringContext::new(binder, checker, config), Module::new(arena, root))
    }

    struct Noop;

    impl LoweringPhase for Noop {
        fn name(&self) -> &'static str {
            "Noop"
        }

        fn perform_for_module(&mut self, _ctx: &mut LoweringContext, _module: &mut Module) -> LoweringResult<bool> {
            Ok(false)
        }
    }

    struct NeverDone;

    impl LoweringPhase for NeverDone {
        fn name(&self) -> &'static str {
            "NeverDone"
        }

        fn perform_for_module(&mut self, _ctx: &mut LoweringContext, _module: &mut Module) -> LoweringResult<bool> {
            Ok(false)
        }

        fn postcondition_for_module(&self, _ctx: &LoweringContext, _module: &Module) -> bool {
            false
        }
    }

    /// Detaches the first statement's expression without re-parenting it
    struct Careless;

    impl LoweringPhase for Careless {
        fn name(&self) -> &'static str {
            "Careless"
        }

        fn perform_for_module(&mut self, _ctx: &mut LoweringContext, module: &mut Module) -> LoweringResult<bool> {
            let statement: NodeId = module
                .arena
                .subtree(module.root)
                .into_iter()
                .find(|&n| matches!(module.arena.kind(n), NodeKind::ExpressionStatement { .. }))
                .unwrap();
            let expr = module.arena.children(statement)[0];
            module.arena.set_parent(expr, None);
            Ok(true)
        }
    }

    #[test]
    fn test_default_order() {
        let manager = PhaseManager::for_config(&PipelineConfig::default());
        assert_eq!(
            manager.phase_names(),
            vec!["InterfacePropertyDeclarationsPhase", "OpAssignmentLowering"]
        );
        let mut config = PipelineConfig::default();
        config.enable_interface_properties = false;
        assert_eq!(PhaseManager::for_config(&config).phase_names(), vec!["OpAssignmentLowering"]);
    }

    #[test]
    fn test_report_records_each_phase() {
        let (mut ctx, mut module) = setup("let a: int = 1;", PipelineConfig::default());
        let mut manager = PhaseManager::new();
        manager.add_phase(Noop);
        manager.add_phase(Noop);
        let report = manager.run(&mut ctx, &mut module).unwrap();
        assert_eq!(report.phase_names(), vec!["Noop", "Noop"]);
        assert!(!report.modified());
        assert!(ctx.current_phase().is_none());
        assert!(report.to_json().contains("\"phase\": \"Noop\""));
        assert_eq!(report.rewrites_of("Noop"), 0);
    }

    #[test]
    fn test_rewrite_counts_are_per_module() {
        let mut manager = PhaseManager::new();
        manager.add_phase(OpAssignmentLowering::new());

        let (mut ctx, mut module) = setup("let a: int = 1; a += 1; a++;", PipelineConfig::default());
        let report = manager.run(&mut ctx, &mut module).unwrap();
        assert_eq!(report.rewrites_of("OpAssignmentLowering"), 2);
        assert!(report.to_json().contains("\"rewrites\": 2"));

        let (mut ctx, mut module) = setup("let b: int = 1; b -= 1;", PipelineConfig::default());
        let report = manager.run(&mut ctx, &mut module).unwrap();
        assert_eq!(report.rewrites_of("OpAssignmentLowering"), 1);
    }

    #[test]
    fn test_failed_postcondition_is_internal() {
        let (mut ctx, mut module) = setup("let a: int = 1;", PipelineConfig::default());
        let mut manager = PhaseManager::new();
        manager.add_phase(NeverDone);
        let err = manager.run(&mut ctx, &mut module).unwrap_err();
        assert!(matches!(err, LoweringError::Internal { .. }));
        assert_eq!(ctx.current_phase(), Some("NeverDone"));

        let mut relaxed = PipelineConfig::default();
        relaxed.check_postconditions = false;
        let (mut ctx, mut module) = setup("let a: int = 1;", relaxed);
        assert!(manager.run(&mut ctx, &mut module).is_ok());
    }

    #[test]
    fn test_verifier_runs_after_each_phase() {
        let mut config = PipelineConfig::default();
        config.verify_after_each_phase = true;
        let (mut ctx, mut module) = setup("let a: int = 1; a + 1;", config);
        let mut manager = PhaseManager::new();
        manager.add_phase(Careless);
        let report = manager.run(&mut ctx, &mut module).unwrap();
        let tags: Vec<&str> = report.verifier_messages().map(|m| m.tag.as_str()).collect();
        assert!(tags.contains(&"NULL_PARENT"), "{:?}", tags);
    }
}
