//! Parse errors reported to callers of the grammar parser

use std::fmt;

use crate::ast::Span;
use crate::custom_error::ContextualError;

/// Failures specific to format templates.
///
/// The first two are raised by the parser; the last two by the code that
/// splices fragments into the parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatErrorCode {
    /// Unknown kind code, or a kind that is illegal at its position
    InvalidFormatNode,
    /// Missing, zero or overflowing placeholder index
    InvalidNumberNode,
    /// Index past the end of the insertion list
    InsertNodeAbsent,
    /// Fragment whose kind does not match the placeholder
    InvalidInsertNode,
}

impl FormatErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatErrorCode::InvalidFormatNode => "INVALID_FORMAT_NODE",
            FormatErrorCode::InvalidNumberNode => "INVALID_NUMBER_NODE",
            FormatErrorCode::InsertNodeAbsent => "INSERT_NODE_ABSENT",
            FormatErrorCode::InvalidInsertNode => "INVALID_INSERT_NODE",
        }
    }

    /// Numbered diagnostic code
    pub fn error_code(self) -> &'static str {
        match self {
            FormatErrorCode::InvalidFormatNode => "E0101",
            FormatErrorCode::InvalidNumberNode => "E0102",
            FormatErrorCode::InsertNodeAbsent => "E0103",
            FormatErrorCode::InvalidInsertNode => "E0104",
        }
    }
}

impl fmt::Display for FormatErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub code: Option<FormatErrorCode>,
    pub message: String,
    /// Byte range in the parsed text
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            code: None,
            message: message.into(),
            span,
        }
    }

    pub fn format(code: FormatErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            span,
        }
    }

    /// Build from a nom error raised while parsing `full`
    pub fn from_nom(full: &str, err: nom::Err<ContextualError<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => {
                ParseError::new("unexpected end of input", Span::new(full.len(), full.len()))
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                if let Some(hard) = &e.hard {
                    let start = full.len().saturating_sub(hard.remaining);
                    return ParseError {
                        code: hard.code,
                        message: hard.message.clone(),
                        span: Span::new(start, (start + hard.len).min(full.len())),
                    };
                }
                let start = full.len().saturating_sub(e.deepest_remaining());
                let end = (start + 1).min(full.len()).max(start);
                ParseError::new(e.to_string(), Span::new(start, end))
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}: {} at byte {}", code, self.message, self.span.start),
            None => write!(f, "{} at byte {}", self.message, self.span.start),
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;
