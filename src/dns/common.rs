use thiserror::Error;

/// Wire-format parse failures. Kept separate from `crate::error::HsknsError`
/// so the DNS codec has no dependency on the rest of the crate; the
/// resolver folds these into `HsknsError::CacheCorrupt` or `BadProof`
/// depending on where the bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid DNS header")]
    InvalidHeader,
    #[error("invalid question section")]
    InvalidQuestionSection,
    #[error("invalid answer section")]
    InvalidAnswerSection,
    #[error("invalid authority section")]
    InvalidAuthoritySection,
    #[error("invalid additional section")]
    InvalidAdditionalSection,
}
