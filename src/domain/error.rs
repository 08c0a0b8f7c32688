//! Domain error types.

/// What went wrong while parsing an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("{0}")]
    Syntax(String),

    #[error("unresolved identifier '{0}'")]
    UnknownFunction(String),

    #[error("unknown field '{0}' (expected open, high, low, close or volume)")]
    UnknownField(String),

    #[error("{function} expects {expected} argument(s), found {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("{function}: argument {argument} must be a non-negative integer literal")]
    WindowLiteral { function: String, argument: usize },
}

/// A parse error with position information for expression parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self {
            kind: ParseErrorKind::Syntax(message.into()),
            position,
        }
    }

    /// Unknown names and arity mismatches, as opposed to malformed text.
    pub fn is_semantic(&self) -> bool {
        !matches!(self.kind, ParseErrorKind::Syntax(_))
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let column = input
            .get(..self.position)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(self.position);
        let caret = " ".repeat(column) + "^";
        format!("{input}\n{caret}\n{err}", err = self)
    }
}

/// Coarse classification used for exit codes and API status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Semantic,
    Parameter,
    NotFound,
    Storage,
    Config,
    Io,
}

/// Top-level error type for factorlab.
#[derive(Debug, thiserror::Error)]
pub enum FactorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid window for {function}: {reason}")]
    InvalidWindow { function: String, reason: String },

    #[error("invalid quantile count {0} (expected 3, 5 or 10)")]
    InvalidQuantile(usize),

    #[error("invalid forward periods {0} (must be at least 1)")]
    InvalidPeriods(usize),

    #[error("invalid weight {weight} for factor '{expression}'")]
    InvalidWeight { expression: String, weight: f64 },

    #[error("combination requires at least one factor")]
    EmptyCombination,

    #[error("invalid panel for {symbol}: {reason}")]
    InvalidPanel { symbol: String, reason: String },

    #[error("no data for {symbol} at interval {interval}")]
    NoData { symbol: String, interval: String },

    #[error("report {id} not found")]
    ReportNotFound { id: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FactorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FactorError::Parse(e) if e.is_semantic() => ErrorCategory::Semantic,
            FactorError::Parse(_) => ErrorCategory::Syntax,
            FactorError::InvalidWindow { .. }
            | FactorError::InvalidQuantile(_)
            | FactorError::InvalidPeriods(_)
            | FactorError::InvalidWeight { .. }
            | FactorError::EmptyCombination
            | FactorError::InvalidPanel { .. } => ErrorCategory::Parameter,
            FactorError::NoData { .. } | FactorError::ReportNotFound { .. } => {
                ErrorCategory::NotFound
            }
            FactorError::Database { .. }
            | FactorError::DatabaseQuery { .. }
            | FactorError::Serialization { .. } => ErrorCategory::Storage,
            FactorError::ConfigParse { .. }
            | FactorError::ConfigMissing { .. }
            | FactorError::ConfigInvalid { .. } => ErrorCategory::Config,
            FactorError::Io(_) => ErrorCategory::Io,
        }
    }
}

impl From<serde_json::Error> for FactorError {
    fn from(err: serde_json::Error) -> Self {
        FactorError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<&FactorError> for std::process::ExitCode {
    fn from(err: &FactorError) -> Self {
        let code: u8 = match err.category() {
            ErrorCategory::Io => 1,
            ErrorCategory::Config => 2,
            ErrorCategory::Storage => 3,
            ErrorCategory::Syntax | ErrorCategory::Semantic => 4,
            ErrorCategory::Parameter => 5,
            ErrorCategory::NotFound => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context_points_at_position() {
        let err = ParseError::syntax("expected ')'", 6);
        let ctx = err.display_with_context("abs(x ");
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines[0], "abs(x ");
        assert_eq!(lines[1], "      ^");
        assert!(lines[2].contains("position 6"));
    }

    #[test]
    fn semantic_classification() {
        let syntax = ParseError::syntax("unexpected ')'", 0);
        assert!(!syntax.is_semantic());

        let unknown = ParseError {
            kind: ParseErrorKind::UnknownFunction("foo".into()),
            position: 0,
        };
        assert!(unknown.is_semantic());
        assert_eq!(
            FactorError::from(unknown).category(),
            ErrorCategory::Semantic
        );
    }

    #[test]
    fn arity_message_names_counts() {
        let err = ParseError {
            kind: ParseErrorKind::Arity {
                function: "ts_mean".into(),
                expected: 2,
                actual: 3,
            },
            position: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("ts_mean"));
        assert!(msg.contains("expects 2"));
        assert!(msg.contains("found 3"));
    }

    #[test]
    fn categories() {
        assert_eq!(
            FactorError::InvalidQuantile(4).category(),
            ErrorCategory::Parameter
        );
        assert_eq!(
            FactorError::ReportNotFound { id: "x".into() }.category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            FactorError::ConfigMissing {
                section: "data".into(),
                key: "dir".into()
            }
            .category(),
            ErrorCategory::Config
        );
    }
}
