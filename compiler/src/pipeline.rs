//! Lowering pipeline for one compilation unit: Source -> AST -> lowered AST
//!
//! 1. Parse the source with the surface grammar
//! 2. Convert the syntax tree into the arena AST
//! 3. Bind names, widen class fields that implement optional interface
//!    properties, and type-check the whole unit
//! 4. Run the enabled lowering phases, verifying the tree between phases
//!
//! Every failure becomes a [`Diagnostic`] positioned in the user's source.
//! Independent units can be lowered in parallel with
//! [`lower_sources_parallel`]; each one owns its arena, binder and checker.

use std::fmt;
use std::time::Instant;

use diagnostics::lowering::LoweringDiagnostics;
use diagnostics::{Diagnostics, FileId, SourceFile, SourceMap};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ast::from_syntax::SyntaxConverter;
use crate::ast::printer::print;
use crate::ast::AstArena;
use crate::binder::Binder;
use crate::checker::Checker;
use crate::error::LoweringError;
use crate::error_codes;
use crate::lowering::interface_properties::widen_implementing_fields;
use crate::lowering::{LoweringContext, Module, PhaseManager, PhaseReport};
use crate::verifier::CheckMessage;

/// Configuration for the lowering pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fail the unit when a phase leaves its construct behind
    pub check_postconditions: bool,

    /// Run the AST verifier after every phase
    pub verify_after_each_phase: bool,

    /// Also require every reference identifier to be bound
    pub verify_identifier_bindings: bool,

    /// Rewrite interface properties into accessors
    pub enable_interface_properties: bool,

    /// Rewrite compound assignments and updates
    pub enable_op_assignment: bool,

    /// Maximum number of type errors reported per unit
    pub max_errors: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            check_postconditions: true,
            verify_after_each_phase: cfg!(debug_assertions),
            verify_identifier_bindings: false,
            enable_interface_properties: true,
            enable_op_assignment: true,
            max_errors: 100,
        }
    }
}

/// Shape of a configuration file; only the `[lowering]` table is read
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    lowering: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pipeline configuration: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl PipelineConfig {
    /// Configuration for development builds: every check on
    pub fn debug() -> Self {
        Self {
            check_postconditions: true,
            verify_after_each_phase: true,
            verify_identifier_bindings: true,
            ..Self::default()
        }
    }

    /// Configuration for shipping builds: no verifier walks
    pub fn release() -> Self {
        Self {
            check_postconditions: true,
            verify_after_each_phase: false,
            verify_identifier_bindings: false,
            ..Self::default()
        }
    }

    /// Read the `[lowering]` table of a TOML document. Missing keys keep
    /// their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text).map_err(|err| ConfigError {
            message: err.to_string(),
        })?;
        Ok(file.lowering)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        #[derive(Serialize)]
        struct Out<'a> {
            lowering: &'a PipelineConfig,
        }
        toml::to_string(&Out { lowering: self }).map_err(|err| ConfigError {
            message: err.to_string(),
        })
    }
}

/// Statistics collected while lowering one unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Parse time in microseconds
    pub parse_time_us: u64,

    /// Conversion and binding time in microseconds
    pub binding_time_us: u64,

    /// Initial type checking time in microseconds
    pub type_checking_time_us: u64,

    /// Time spent in lowering phases in microseconds
    pub lowering_time_us: u64,

    /// Total time in microseconds
    pub total_time_us: u64,

    /// Arena size after the last stage that ran
    pub node_count: usize,

    pub error_count: usize,

    pub warning_count: usize,
}

/// Result of lowering one unit
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The lowered module; `None` when the unit was aborted
    pub module: Option<Module>,

    pub diagnostics: Diagnostics,

    /// Verifier findings of every phase, in phase order
    pub verifier_messages: Vec<CheckMessage>,

    pub source_map: SourceMap,

    pub file_id: FileId,

    pub report: PhaseReport,

    pub stats: PipelineStats,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.module.is_some() && !self.diagnostics.has_errors()
    }

    /// Source text of the lowered module
    pub fn lowered_source(&self) -> Option<String> {
        self.module.as_ref().map(|module| print(&module.arena, module.root))
    }
}

/// Drives the stages of one unit with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct LoweringPipeline {
    config: PipelineConfig,
    stats: PipelineStats,
}

impl LoweringPipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            stats: PipelineStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Statistics of the last unit compiled
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn compile_source(&mut self, file_name: &str, text: &str) -> PipelineResult {
        let _span = tracing::info_span!("compile_source", file = file_name).entered();
        info!("lowering {}", file_name);
        let start_time = Instant::now();
        self.stats = PipelineStats::default();

        let mut source_map = SourceMap::new();
        let file_id = source_map.add_file(file_name, text);
        let mut result = PipelineResult {
            module: None,
            diagnostics: Diagnostics::new(),
            verifier_messages: Vec::new(),
            source_map,
            file_id,
            report: PhaseReport::default(),
            stats: PipelineStats::default(),
        };

        self.run_stages(file_name, text, &mut result);

        self.stats.total_time_us = start_time.elapsed().as_micros() as u64;
        self.stats.error_count = result.diagnostics.errors().count();
        self.stats.warning_count = result.diagnostics.warnings().count();
        debug!(
            "{}: {} error(s), {} warning(s) in {}us",
            file_name, self.stats.error_count, self.stats.warning_count, self.stats.total_time_us
        );
        result.stats = self.stats.clone();
        result
    }

    fn run_stages(&mut self, file_name: &str, text: &str, result: &mut PipelineResult) {
        // Stage 1: parse
        let parse_start = Instant::now();
        let parsed = parser::parse_module(text);
        self.stats.parse_time_us = parse_start.elapsed().as_micros() as u64;
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                self.abort(result, LoweringError::from(err), None);
                return;
            }
        };

        // Stage 2: convert and bind
        let binding_start = Instant::now();
        let mut arena = AstArena::new();
        let root = match SyntaxConverter::convert_module(&mut arena, &parsed) {
            Ok(root) => root,
            Err(err) => {
                self.abort(result, err, None);
                return;
            }
        };
        let mut binder = Binder::new();
        if let Err(err) = binder.bind_program(&mut arena, root) {
            self.abort(result, err, None);
            return;
        }
        // fields implementing optional properties are checked at their
        // widened type, so misuse is an ordinary user type error
        if self.config.enable_interface_properties {
            match widen_implementing_fields(&binder, &mut arena, root) {
                Ok(0) => {}
                Ok(widened) => debug!("{}: widened {} implementing field(s)", file_name, widened),
                Err(err) => {
                    self.abort(result, err, None);
                    return;
                }
            }
        }
        self.stats.binding_time_us = binding_start.elapsed().as_micros() as u64;

        // Stage 3: check
        let checking_start = Instant::now();
        let mut checker = Checker::new();
        if let Err(err) = checker.check_program(&mut arena, &binder, root) {
            self.abort(result, err, None);
            return;
        }
        self.stats.type_checking_time_us = checking_start.elapsed().as_micros() as u64;
        self.stats.node_count = arena.len();
        if !checker.errors().is_empty() {
            for error in checker.errors().iter().take(self.config.max_errors) {
                let span = result
                    .source_map
                    .span_or_unknown(result.file_id, error.span.start, error.span.end);
                let mut diagnostic = LoweringDiagnostics::type_error(span, &error.message);
                error_codes::annotate(&mut diagnostic);
                result.diagnostics.push(diagnostic);
            }
            warn!(
                "{}: {} type error(s), lowering skipped",
                file_name,
                checker.errors().len()
            );
            return;
        }

        // Stage 4: lowering phases
        let lowering_start = Instant::now();
        let mut ctx =
            LoweringContext::new(binder, checker, self.config.clone()).with_source(SourceFile::new(file_name, text));
        let mut module = Module::new(arena, root);
        let mut manager = PhaseManager::for_config(&self.config);
        let outcome = manager.run(&mut ctx, &mut module);
        self.stats.lowering_time_us = lowering_start.elapsed().as_micros() as u64;
        match outcome {
            Ok(report) => {
                for message in report.verifier_messages() {
                    result
                        .diagnostics
                        .push(message.to_diagnostic(&result.source_map, result.file_id));
                }
                result.verifier_messages = report.verifier_messages().cloned().collect();
                result.report = report;
                self.stats.node_count = module.arena.len();
                result.module = Some(module);
            }
            // the partially rewritten module is dropped with the unit
            Err(err) => self.abort(result, err, ctx.current_phase()),
        }
    }

    fn abort(&self, result: &mut PipelineResult, err: LoweringError, phase: Option<&str>) {
        warn!("unit aborted{}: {}", phase.map(|p| format!(" in {}", p)).unwrap_or_default(), err);
        result
            .diagnostics
            .push(err.to_diagnostic(&result.source_map, result.file_id, phase));
    }
}

/// Lower independent units on the rayon thread pool. Results keep the order
/// of `sources`.
pub fn lower_sources_parallel<N, T>(config: &PipelineConfig, sources: &[(N, T)]) -> Vec<PipelineResult>
where
    N: AsRef<str> + Sync,
    T: AsRef<str> + Sync,
{
    let _span = tracing::info_span!("lower_sources_parallel", units = sources.len()).entered();
    sources
        .par_iter()
        .map(|(name, text)| LoweringPipeline::with_config(config.clone()).compile_source(name.as_ref(), text.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.check_postconditions);
        assert!(!config.verify_identifier_bindings);
        assert!(config.enable_interface_properties && config.enable_op_assignment);
        assert_eq!(config.max_errors, 100);
        assert!(PipelineConfig::debug().verify_identifier_bindings);
        assert!(!PipelineConfig::release().verify_after_each_phase);
    }

    #[test]
    fn test_config_from_toml() {
        let config = PipelineConfig::from_toml_str(
            "[lowering]\nenable_op_assignment = false\nmax_errors = 5\n\n[other]\nignored = 1\n",
        )
        .unwrap();
        assert!(!config.enable_op_assignment);
        assert_eq!(config.max_errors, 5);
        assert!(config.enable_interface_properties);

        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), PipelineConfig::default());
        assert!(PipelineConfig::from_toml_str("[lowering]\nmax_errors = \"many\"").is_err());

        let release = PipelineConfig::release();
        let text = release.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), release);
    }

    #[test]
    fn test_compile_source() {
        let mut pipeline = LoweringPipeline::with_config(PipelineConfig::debug());
        let result = pipeline.compile_source("main.ets", "let a: int = 1;\na += 2;\n");
        assert!(result.is_success(), "{:?}", result.diagnostics);
        assert!(result.verifier_messages.is_empty());
        assert_eq!(
            result.report.phase_names(),
            vec!["InterfacePropertyDeclarationsPhase", "OpAssignmentLowering"]
        );
        let lowered = result.lowered_source().unwrap();
        assert!(lowered.contains("a = (a + 2) as int;"), "{}", lowered);
        assert!(pipeline.stats().node_count > 0);
    }

    #[test]
    fn test_syntax_error_is_positioned() {
        let result = LoweringPipeline::new().compile_source("bad.ets", "let a: int = 1;\nlet = ;\n");
        assert!(result.module.is_none());
        let errors: Vec<_> = result.diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code.as_deref(), Some("E0001"));
        assert_eq!(errors[0].span.start.line, 2);
    }

    #[test]
    fn test_type_errors_stop_before_lowering() {
        let mut config = PipelineConfig::default();
        config.max_errors = 1;
        let result = LoweringPipeline::with_config(config)
            .compile_source("t.ets", "let a: int = \"x\"; let b: int = \"y\"; a += 1;");
        assert!(result.module.is_none());
        assert!(result.report.outcomes.is_empty());
        assert_eq!(result.diagnostics.errors().count(), 1);
        assert_eq!(result.stats.error_count, 1);
    }

    #[test]
    fn test_widened_field_misuse_is_a_user_type_error() {
        let result = LoweringPipeline::new().compile_source(
            "t.ets",
            "interface P { n?: int; }\nclass Q implements P { n: int = 0; bump(): void { this.n += 1; } }",
        );
        assert!(result.module.is_none());
        assert!(result.report.outcomes.is_empty());
        let errors: Vec<_> = result.diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code.as_deref(), Some("E1001"));
        assert!(errors[0].message.contains("int | undefined"), "{}", errors[0].message);
        assert_eq!(errors[0].span.start.line, 2);
        assert!(errors[0].notes.iter().all(|note| !note.contains("lowering phase")));
        assert!(!errors[0].help.is_empty());
    }

    #[test]
    fn test_user_names_shaped_like_temporaries() {
        let result = LoweringPipeline::new()
            .compile_source("t.ets", "let gensym$1: int = 0; let a: int = 1; let b: int = a++;");
        assert!(result.is_success(), "{:?}", result.diagnostics);
        let text = result.lowered_source().unwrap();
        assert!(text.contains("const gensym$2 = a;"), "{}", text);
        assert!(text.contains("let gensym$1: int = 0;"), "{}", text);
    }

    #[test]
    fn test_parallel_keeps_order() {
        let sources = vec![
            ("a.ets", "let a: int = 1; a += 1;"),
            ("b.ets", "let = ;"),
            ("c.ets", "interface I { x?: number; }"),
        ];
        let results = lower_sources_parallel(&PipelineConfig::default(), &sources);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].lowered_source().unwrap().contains("get x(): number | undefined;"));
    }
}
