//! Custom error type that captures context strings from nom's context() combinator

use nom::error::{ContextError, ErrorKind, FromExternalError, ParseError};

use crate::error::FormatErrorCode;

/// A context together with how much input was left when it failed.
/// Less remaining input means the failure happened further into the text.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWithLocation {
    pub context: &'static str,
    pub remaining: usize,
}

/// An error that must not be backtracked over, e.g. a malformed placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct HardError {
    pub code: Option<FormatErrorCode>,
    pub message: String,
    pub remaining: usize,
    pub len: usize,
}

/// Custom error type that captures context strings
#[derive(Debug, Clone, PartialEq)]
pub struct ContextualError<I> {
    pub input: I,
    pub code: ErrorKind,
    /// Context strings with their locations
    pub contexts: Vec<ContextWithLocation>,
    pub hard: Option<HardError>,
}

impl<I: AsRef<str>> ContextualError<I> {
    pub fn new(input: I, code: ErrorKind) -> Self {
        Self {
            input,
            code,
            contexts: Vec::new(),
            hard: None,
        }
    }

    /// Error carrying its own message; raise it through `nom::Err::Failure`
    pub fn hard(input: I, code: Option<FormatErrorCode>, message: impl Into<String>, len: usize) -> Self {
        let remaining = input.as_ref().len();
        Self {
            input,
            code: ErrorKind::Verify,
            contexts: Vec::new(),
            hard: Some(HardError {
                code,
                message: message.into(),
                remaining,
                len,
            }),
        }
    }

    /// Smallest remaining input seen by this error
    pub fn deepest_remaining(&self) -> usize {
        let own = self.input.as_ref().len();
        self.contexts
            .iter()
            .map(|c| c.remaining)
            .chain(self.hard.as_ref().map(|h| h.remaining))
            .fold(own, usize::min)
    }

    /// The innermost context message, if any context was recorded
    pub fn deepest_context(&self) -> Option<&'static str> {
        self.contexts
            .iter()
            .min_by_key(|c| c.remaining)
            .map(|c| c.context)
    }
}

impl<I: AsRef<str>> ParseError<I> for ContextualError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        Self::new(input, kind)
    }

    fn append(input: I, kind: ErrorKind, other: Self) -> Self {
        // Keep whichever error made more progress
        if other.hard.is_some() || other.deepest_remaining() <= input.as_ref().len() {
            other
        } else {
            Self::new(input, kind)
        }
    }

    fn or(self, other: Self) -> Self {
        // Called by alt() to combine errors from different branches
        if self.hard.is_some() {
            return self;
        }
        if other.hard.is_some() {
            return other;
        }
        let self_deepest = self.deepest_remaining();
        let other_deepest = other.deepest_remaining();
        if self_deepest < other_deepest {
            self
        } else if other_deepest < self_deepest {
            other
        } else if self.contexts.len() >= other.contexts.len() {
            self
        } else {
            other
        }
    }
}

impl<I: AsRef<str>> ContextError<I> for ContextualError<I> {
    fn add_context(input: I, ctx: &'static str, mut other: Self) -> Self {
        let remaining = other.input.as_ref().len().min(input.as_ref().len());
        other.contexts.push(ContextWithLocation {
            context: ctx,
            remaining,
        });
        other
    }
}

impl<I: AsRef<str>, E> FromExternalError<I, E> for ContextualError<I> {
    fn from_external_error(input: I, kind: ErrorKind, _e: E) -> Self {
        Self::new(input, kind)
    }
}

impl<I: AsRef<str>> std::fmt::Display for ContextualError<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(hard) = &self.hard {
            write!(f, "{}", hard.message)
        } else if let Some(context) = self.deepest_context() {
            write!(f, "{}", context)
        } else {
            let near: String = self.input.as_ref().chars().take(12).collect();
            write!(f, "unexpected input near '{}'", near)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::{branch::alt, bytes::complete::tag, error::context, IResult, Parser};

    type TestResult<'a, T> = IResult<&'a str, T, ContextualError<&'a str>>;

    fn hello(input: &str) -> TestResult<'_, &str> {
        context("expected 'hello'", tag("hello")).parse(input)
    }

    #[test]
    fn test_context_capture() {
        match hello("world") {
            Err(nom::Err::Error(e)) => {
                assert_eq!(e.contexts.len(), 1);
                assert_eq!(e.contexts[0].context, "expected 'hello'");
                assert_eq!(e.to_string(), "expected 'hello'");
            }
            other => panic!("expected error with context, got {:?}", other),
        }
    }

    #[test]
    fn test_or_keeps_deeper_branch() {
        fn deep(input: &str) -> TestResult<'_, &str> {
            let (input, _) = tag("ab").parse(input)?;
            context("expected 'c' after 'ab'", tag("c")).parse(input)
        }
        fn shallow(input: &str) -> TestResult<'_, &str> {
            context("expected 'x'", tag("x")).parse(input)
        }

        match alt((shallow, deep)).parse("abz") {
            Err(nom::Err::Error(e)) => assert_eq!(e.to_string(), "expected 'c' after 'ab'"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
