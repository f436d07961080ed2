use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Conversation for {sender_id} was modified concurrently")]
    Conflict { sender_id: String },

    #[error("Conversation store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Step of the extraction pipeline that failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtractionStage {
    Download,
    UnsupportedMedia,
    Recognition,
    Archive,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Download => "media download",
            Self::UnsupportedMedia => "media type check",
            Self::Recognition => "text recognition",
            Self::Archive => "media archive",
        };
        f.write_str(stage)
    }
}

/// Anything that prevented turning an inbound image into OCR text.
/// The detail is for operators only.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{stage} failed: {detail}")]
pub struct ExtractionFailure {
    pub stage: ExtractionStage,
    pub detail: String,
}

impl ExtractionFailure {
    pub fn new(stage: ExtractionStage, detail: impl ToString) -> Self {
        Self {
            stage,
            detail: detail.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LookupFailure {
    #[error("Label lookup request failed: {0}")]
    Transport(String),

    #[error("Unexpected label lookup response: {0}")]
    Response(String),
}
