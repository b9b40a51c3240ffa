//! Lowering middle-end
//!
//! Converts parsed source into an arena AST, binds and type-checks it, then
//! runs lowering phases that rewrite surface constructs into simpler ones.
//! Phases build replacement code from source-text templates with the
//! [`snippet::SnippetBuilder`] and splice it in through
//! [`lowering::LoweringContext::integrate`].

pub mod ast;
pub mod binder;
pub mod checker;
pub mod error;
pub mod error_codes;
pub mod id_types;
pub mod logging;
pub mod lowering;
pub mod pipeline;
pub mod snippet;
pub mod verifier;

pub use error::{LoweringError, LoweringResult};
pub use lowering::{LoweringContext, LoweringPhase, Module, PhaseManager, PhaseReport};
pub use pipeline::{lower_sources_parallel, LoweringPipeline, PipelineConfig, PipelineResult};
pub use snippet::SnippetBuilder;
pub use verifier::{AstVerifier, CheckMessage};
