//! Prescription Intake Domain

/// OCR text to prescription record
pub mod prescriptions;

/// Per-sender quantity dialog
pub mod conversations;

/// External collaborators
pub mod ports;

/// Domain errors
pub mod errors;

pub use errors::{Error, ExtractionFailure, ExtractionStage, LookupFailure};
