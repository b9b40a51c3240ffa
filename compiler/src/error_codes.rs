//! Numbered error codes reported by the lowering pipeline
//!
//! # Error Code Ranges
//!
//! - E0001-E0999: Syntax errors, in user source and in snippet templates
//! - E1000-E1999: Type errors found by the checker
//! - E2000-E2999: Binding and scope errors
//! - E9000-E9999: Internal compiler errors and AST invariant reports
//!
//! Within the syntax range, E01xx are placeholder failures of format
//! templates.

use std::collections::HashMap;
use std::fmt;

use diagnostics::Diagnostic;

pub const SYNTAX_ERROR: u16 = 1;
pub const INVALID_FORMAT_NODE: u16 = 101;
pub const INVALID_NUMBER_NODE: u16 = 102;
pub const INSERT_NODE_ABSENT: u16 = 103;
pub const INVALID_INSERT_NODE: u16 = 104;
pub const TYPE_MISMATCH: u16 = 1001;
pub const REDECLARATION: u16 = 2001;
pub const INTERNAL_ERROR: u16 = 9001;
pub const INVARIANT_VIOLATION: u16 = 9101;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    pub code: u16,
    pub category: &'static str,
    pub description: &'static str,
    pub help: Option<&'static str>,
}

impl ErrorCode {
    pub const fn new(
        code: u16,
        category: &'static str,
        description: &'static str,
        help: Option<&'static str>,
    ) -> Self {
        Self {
            code,
            category,
            description,
            help,
        }
    }

    /// `E{code:04}`, e.g. `E0103`
    pub fn format_code(&self) -> String {
        format_error_code(self.code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.format_code(),
            self.category,
            self.description
        )
    }
}

pub struct ErrorCodeRegistry {
    codes: HashMap<u16, ErrorCode>,
}

impl ErrorCodeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            codes: HashMap::new(),
        };
        registry.register_all_codes();
        registry
    }

    pub fn get(&self, code: u16) -> Option<&ErrorCode> {
        self.codes.get(&code)
    }

    /// Look up `E1001` style strings
    pub fn get_by_string(&self, code_str: &str) -> Option<&ErrorCode> {
        parse_error_code(code_str).and_then(|code| self.get(code))
    }

    fn register(&mut self, error_code: ErrorCode) {
        self.codes.insert(error_code.code, error_code);
    }

    fn register_all_codes(&mut self) {
        // Syntax
        self.register(ErrorCode::new(
            SYNTAX_ERROR,
            "Syntax",
            "Grammar error",
            Some("Check for missing punctuation or keywords"),
        ));
        self.register(ErrorCode::new(
            INVALID_FORMAT_NODE,
            "Syntax",
            "Unknown placeholder kind, or a kind that is not allowed at its position",
            Some("Use E, I, T, S or N placeholders where the grammar accepts them"),
        ));
        self.register(ErrorCode::new(
            INVALID_NUMBER_NODE,
            "Syntax",
            "Missing, zero or overflowing placeholder index",
            Some("Placeholder indices are 1-based decimal numbers"),
        ));
        self.register(ErrorCode::new(
            INSERT_NODE_ABSENT,
            "Syntax",
            "Placeholder index has no matching insertion",
            Some("Pass one insertion per placeholder index"),
        ));
        self.register(ErrorCode::new(
            INVALID_INSERT_NODE,
            "Syntax",
            "Insertion does not match the placeholder kind",
            None,
        ));

        // Types
        self.register(ErrorCode::new(
            TYPE_MISMATCH,
            "Type",
            "Type mismatch",
            Some("Check the declared types of the values involved"),
        ));

        // Binding
        self.register(ErrorCode::new(
            REDECLARATION,
            "Binding",
            "Name is already declared in this scope",
            Some("Rename or remove one of the declarations"),
        ));

        // Internal
        self.register(ErrorCode::new(
            INTERNAL_ERROR,
            "Internal",
            "Internal compiler error",
            Some("This is a compiler bug, not a problem with the input"),
        ));
        self.register(ErrorCode::new(
            INVARIANT_VIOLATION,
            "Internal",
            "AST invariant violated",
            None,
        ));
    }
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: std::sync::OnceLock<ErrorCodeRegistry> = std::sync::OnceLock::new();

/// Process-wide read-only registry
pub fn error_registry() -> &'static ErrorCodeRegistry {
    REGISTRY.get_or_init(ErrorCodeRegistry::new)
}

pub fn get_error_code(code: u16) -> Option<&'static ErrorCode> {
    error_registry().get(code)
}

pub fn format_error_code(code: u16) -> String {
    format!("E{:04}", code)
}

pub fn parse_error_code(code_str: &str) -> Option<u16> {
    code_str.strip_prefix('E')?.parse().ok()
}

/// Add the registered description and help of the diagnostic's code. Help
/// already written for the specific case is kept in place of the generic one.
pub fn annotate(diagnostic: &mut Diagnostic) {
    let Some(entry) = diagnostic.code.as_deref().and_then(|code| error_registry().get_by_string(code)) else {
        return;
    };
    diagnostic.notes.push(format!("{}: {}", entry.format_code(), entry.description));
    if let (Some(help), true) = (entry.help, diagnostic.help.is_empty()) {
        diagnostic.help.push(help.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::FormatErrorCode;

    #[test]
    fn test_lookup() {
        let registry = ErrorCodeRegistry::new();
        let code = registry.get(INSERT_NODE_ABSENT).unwrap();
        assert_eq!(code.format_code(), "E0103");
        assert_eq!(registry.get_by_string("E2001").unwrap().code, REDECLARATION);
        assert!(registry.get_by_string("2001").is_none());
        assert!(registry.get(65535).is_none());
    }

    #[test]
    fn test_placeholder_codes_match_parser() {
        let registry = error_registry();
        for code in [
            FormatErrorCode::InvalidFormatNode,
            FormatErrorCode::InvalidNumberNode,
            FormatErrorCode::InsertNodeAbsent,
            FormatErrorCode::InvalidInsertNode,
        ] {
            assert!(
                registry.get_by_string(code.error_code()).is_some(),
                "{} is not registered",
                code
            );
        }
    }

    #[test]
    fn test_annotate_adds_description_and_help() {
        let span = diagnostics::SourceSpan::point(diagnostics::SourcePosition::unknown(0), diagnostics::FileId::new(0));
        let mut diagnostic = diagnostics::lowering::LoweringDiagnostics::type_error(span.clone(), "bad operands");
        annotate(&mut diagnostic);
        assert!(diagnostic.notes.contains(&"E1001: Type mismatch".to_string()), "{:?}", diagnostic.notes);
        assert_eq!(diagnostic.help, vec!["Check the declared types of the values involved".to_string()]);

        let mut redeclared = diagnostics::lowering::LoweringDiagnostics::redeclaration(span, "x", "let");
        let specific = redeclared.help.clone();
        annotate(&mut redeclared);
        assert_eq!(redeclared.help, specific);
        assert!(redeclared.notes.iter().any(|note| note.starts_with("E2001")));
    }

    #[test]
    fn test_display() {
        let code = get_error_code(INVARIANT_VIOLATION).unwrap();
        assert_eq!(code.to_string(), "E9101 [Internal]: AST invariant violated");
    }
}
