//! Diagnostic constructors for the errors raised while building and
//! lowering a compilation unit.

use crate::{Diagnostic, DiagnosticBuilder, SourceSpan};

/// Common diagnostics reported by the lowering pipeline
pub struct LoweringDiagnostics;

impl LoweringDiagnostics {
    /// Grammar error in user source or in a snippet template.
    ///
    /// `code` is the numbered code of a placeholder failure (`E0101`..`E0104`);
    /// plain grammar errors use `E0001`.
    pub fn syntax_error(span: SourceSpan, code: Option<&str>, message: &str) -> Diagnostic {
        DiagnosticBuilder::error(format!("syntax error: {}", message), span.clone())
            .code(code.unwrap_or("E0001"))
            .label(span, message)
            .build()
    }

    pub fn redeclaration(span: SourceSpan, name: &str, kind: &str) -> Diagnostic {
        DiagnosticBuilder::error(
            format!("{} '{}' is already declared in this scope", kind, name),
            span.clone(),
        )
        .code("E2001")
        .label(span, "redeclared here")
        .help(format!("rename or remove one of the declarations of '{}'", name))
        .build()
    }

    pub fn type_error(span: SourceSpan, message: &str) -> Diagnostic {
        DiagnosticBuilder::error(message.to_string(), span.clone())
            .code("E1001")
            .label(span, "type error")
            .build()
    }

    /// Failed assertion inside the compiler itself, never caused by user input
    pub fn internal_error(span: SourceSpan, phase: Option<&str>, message: &str) -> Diagnostic {
        let mut builder = DiagnosticBuilder::error(
            format!("internal compiler error: {}", message),
            span,
        )
        .code("E9001");
        if let Some(phase) = phase {
            builder = builder.note(format!("raised while running lowering phase '{}'", phase));
        }
        builder.help("this is a compiler bug").build()
    }

    /// Developer-facing report from the AST verifier
    pub fn invariant_violation(span: SourceSpan, tag: &str, check: &str) -> Diagnostic {
        DiagnosticBuilder::warning(format!("AST invariant violated: {}", tag), span.clone())
            .code("E9101")
            .label(span, format!("reported by check '{}'", check))
            .build()
    }
}
