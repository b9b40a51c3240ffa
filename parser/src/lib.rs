//! Grammar parser for the surface language
//!
//! Produces an owned syntax tree ([`ast`]) with byte spans. In format mode
//! the parser also accepts `@@` placeholder tokens, which the compiler's
//! snippet builder later fills with prebuilt fragments.

pub mod ast;
pub mod custom_error;
pub mod error;
pub mod parser_core;
pub mod parser_decls;
pub mod parser_expr;
pub mod parser_types;

pub use ast::*;
pub use error::{FormatErrorCode, ParseError, ParseResult};
pub use parser_core::{
    parse_module, parse_snippet, parse_snippet_with_status, ParserContext, ParserStatus, Snippet, SnippetKind,
};
pub use parser_types::includes_undefined;

// Re-export diagnostics from the diagnostics crate
pub use diagnostics::lowering::LoweringDiagnostics;
pub use diagnostics::{Diagnostic, Diagnostics, FileId, SourceMap};

impl ParseError {
    /// Report this error against the file it was raised for
    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId) -> Diagnostic {
        let span = source_map.span_or_unknown(file_id, self.span.start, self.span.end);
        LoweringDiagnostics::syntax_error(span, self.code.map(FormatErrorCode::error_code), &self.message)
    }
}

/// Parse a file and turn a failure into a positioned diagnostic
pub fn parse_module_with_diagnostics(file_name: &str, input: &str) -> Result<Module, (Diagnostics, SourceMap)> {
    parse_module(input).map_err(|err| {
        let mut source_map = SourceMap::new();
        let file_id = source_map.add_file(file_name, input);
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(err.to_diagnostic(&source_map, file_id));
        (diagnostics, source_map)
    })
}
