// ============================================================
// Layer 3 - Pipeline Errors
// ============================================================
// Every failure is fatal for the run. The variant tells the
// operator which stage broke and the payload names the input
// line or candidate that triggered it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad dictionary, tokenizer, checkpoint or CLI configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input line. `line` is 1-based.
    #[error("input error at line {line}: {reason}")]
    Input { line: usize, reason: String },

    /// Internal invariant violation while building features.
    #[error("encoding error{}: {reason}", candidate_label(.unique_id))]
    Encoding {
        unique_id: Option<usize>,
        reason: String,
    },

    /// Scorer unavailable or returned a malformed result.
    #[error("scorer error: {0}")]
    Scorer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn encoding(unique_id: usize, reason: impl Into<String>) -> Self {
        Self::Encoding { unique_id: Some(unique_id), reason: reason.into() }
    }

    pub fn scorer(msg: impl Into<String>) -> Self {
        Self::Scorer(msg.into())
    }
}

fn candidate_label(unique_id: &Option<usize>) -> String {
    unique_id.map_or_else(String::new, |id| format!(" for candidate {id}"))
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_names_the_line() {
        let e = PipelineError::Input { line: 7, reason: "invalid UTF-8".into() };
        assert_eq!(e.to_string(), "input error at line 7: invalid UTF-8");
    }

    #[test]
    fn test_encoding_error_names_the_candidate() {
        let e = PipelineError::encoding(42, "length mismatch");
        assert_eq!(e.to_string(), "encoding error for candidate 42: length mismatch");
    }

    #[test]
    fn test_encoding_error_without_candidate_omits_the_id() {
        let e = PipelineError::Encoding { unique_id: None, reason: "tokenizer failed".into() };
        assert_eq!(e.to_string(), "encoding error: tokenizer failed");
    }
}
