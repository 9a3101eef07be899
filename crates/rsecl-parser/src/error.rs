use thiserror::Error;

/// Errors that can occur while parsing rule expressions and policy documents.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed rule text. `offset` is the byte offset of the offending
    /// token, `line`/`column` are 1-based.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        offset: usize,
        line: usize,
        column: usize,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Byte offset of a syntax error, `None` for the other variants.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
