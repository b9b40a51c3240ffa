//! Errors that abort the lowering of one compilation unit

use std::fmt;

use diagnostics::lowering::LoweringDiagnostics;
use diagnostics::{Diagnostic, FileId, SourceMap};
use parser::{FormatErrorCode, ParseError, Span};

use crate::error_codes;

#[derive(Debug, Clone, PartialEq)]
pub enum LoweringError {
    /// Grammar error in source or snippet text, or a placeholder failure
    Syntax {
        code: Option<FormatErrorCode>,
        message: String,
        span: Span,
    },
    /// A declaration collides with an existing binding of the same scope
    Redeclaration {
        name: String,
        kind: &'static str,
        span: Span,
    },
    /// The checker rejected a tree
    Type { message: String, span: Span },
    /// A broken assumption inside the compiler
    Internal { message: String, span: Span },
}

pub type LoweringResult<T> = Result<T, LoweringError>;

impl LoweringError {
    pub fn format(code: FormatErrorCode, message: impl Into<String>, span: Span) -> Self {
        LoweringError::Syntax {
            code: Some(code),
            message: message.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>, span: Span) -> Self {
        LoweringError::Internal {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LoweringError::Syntax { span, .. }
            | LoweringError::Redeclaration { span, .. }
            | LoweringError::Type { span, .. }
            | LoweringError::Internal { span, .. } => *span,
        }
    }

    /// Same error moved to `span`
    pub fn with_span(mut self, new_span: Span) -> Self {
        match &mut self {
            LoweringError::Syntax { span, .. }
            | LoweringError::Redeclaration { span, .. }
            | LoweringError::Type { span, .. }
            | LoweringError::Internal { span, .. } => *span = new_span,
        }
        self
    }

    /// Placeholder failure code, if this is one
    pub fn format_code(&self) -> Option<FormatErrorCode> {
        match self {
            LoweringError::Syntax { code, .. } => *code,
            _ => None,
        }
    }

    /// Numeric code in the [`error_codes`] registry
    pub fn code(&self) -> u16 {
        match self {
            LoweringError::Syntax { code: None, .. } => error_codes::SYNTAX_ERROR,
            LoweringError::Syntax { code: Some(code), .. } => match code {
                FormatErrorCode::InvalidFormatNode => error_codes::INVALID_FORMAT_NODE,
                FormatErrorCode::InvalidNumberNode => error_codes::INVALID_NUMBER_NODE,
                FormatErrorCode::InsertNodeAbsent => error_codes::INSERT_NODE_ABSENT,
                FormatErrorCode::InvalidInsertNode => error_codes::INVALID_INSERT_NODE,
            },
            LoweringError::Redeclaration { .. } => error_codes::REDECLARATION,
            LoweringError::Type { .. } => error_codes::TYPE_MISMATCH,
            LoweringError::Internal { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    /// Positioned diagnostic in `file_id`; `phase` names the lowering phase
    /// that was running, if any
    pub fn to_diagnostic(&self, source_map: &SourceMap, file_id: FileId, phase: Option<&str>) -> Diagnostic {
        let span = self.span();
        let source_span = source_map.span_or_unknown(file_id, span.start, span.end);
        let mut diagnostic = match self {
            LoweringError::Syntax { code, message, .. } => {
                LoweringDiagnostics::syntax_error(source_span, code.map(FormatErrorCode::error_code), message)
            }
            LoweringError::Redeclaration { name, kind, .. } => {
                LoweringDiagnostics::redeclaration(source_span, name, kind)
            }
            LoweringError::Type { message, .. } => LoweringDiagnostics::type_error(source_span, message),
            LoweringError::Internal { message, .. } => {
                LoweringDiagnostics::internal_error(source_span, phase, message)
            }
        };
        if let (Some(phase), false) = (phase, matches!(self, LoweringError::Internal { .. })) {
            diagnostic
                .notes
                .push(format!("reported while running lowering phase '{}'", phase));
        }
        error_codes::annotate(&mut diagnostic);
        diagnostic
    }
}

impl fmt::Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweringError::Syntax {
                code: Some(code),
                message,
                ..
            } => write!(f, "syntax error ({}): {}", code, message),
            LoweringError::Syntax { message, .. } => write!(f, "syntax error: {}", message),
            LoweringError::Redeclaration { name, kind, .. } => {
                write!(f, "{} '{}' is already declared in this scope", kind, name)
            }
            LoweringError::Type { message, .. } => write!(f, "type error: {}", message),
            LoweringError::Internal { message, .. } => write!(f, "internal compiler error: {}", message),
        }
    }
}

impl std::error::Error for LoweringError {}

impl From<ParseError> for LoweringError {
    fn from(err: ParseError) -> Self {
        LoweringError::Syntax {
            code: err.code,
            message: err.message,
            span: err.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_conversion_keeps_code() {
        let err: LoweringError = ParseError::format(
            FormatErrorCode::InvalidNumberNode,
            "placeholder indices start at 1",
            Span::new(0, 4),
        )
        .into();
        assert_eq!(err.format_code(), Some(FormatErrorCode::InvalidNumberNode));
        assert_eq!(err.code(), error_codes::INVALID_NUMBER_NODE);
        assert_eq!(err.span(), Span::new(0, 4));
    }

    #[test]
    fn test_diagnostic_codes() {
        let mut map = SourceMap::new();
        let file = map.add_file("t.ets", "let a: int = 1;\nlet a: int = 2;\n");
        let err = LoweringError::Redeclaration {
            name: "a".into(),
            kind: "variable",
            span: Span::new(20, 21),
        };
        let diagnostic = err.to_diagnostic(&map, file, None);
        assert_eq!(diagnostic.code.as_deref(), Some("E2001"));
        assert_eq!(diagnostic.span.start.line, 2);
        assert_eq!(diagnostic.help.len(), 1);

        let internal = LoweringError::internal("postcondition failed", Span::new(0, 1));
        let diagnostic = internal.to_diagnostic(&map, file, Some("OpAssignmentLowering"));
        assert_eq!(diagnostic.code.as_deref(), Some("E9001"));
        assert_eq!(diagnostic.notes.len(), 2);
        assert!(diagnostic.notes.contains(&"E9001: Internal compiler error".to_string()));
    }

    #[test]
    fn test_with_span() {
        let err = LoweringError::Type {
            message: "x".into(),
            span: Span::new(1, 2),
        };
        assert_eq!(err.with_span(Span::new(5, 9)).span(), Span::new(5, 9));
    }
}
