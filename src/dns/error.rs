use std::io;

/// Errors produced while reading or writing DNS wire format.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("invalid or truncated DNS header")]
    InvalidHeader,
    #[error("invalid label in domain name")]
    InvalidLabel,
    #[error("invalid question section")]
    InvalidQuestionSection,
    #[error("invalid answer/authority/additional section")]
    InvalidAnswerSection,
    #[error("bitstream error: {0}")]
    InvalidBitStream(String),
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}
