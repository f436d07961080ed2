/// Record types
pub mod model;

/// OCR clean-up rules
pub mod normalize;

/// Active-ingredient list
pub mod vocabulary;

/// Medication mentions
pub mod identify;

/// Posology arithmetic
pub mod quantity;

/// Field extraction
pub mod builder;

/// Media to record pipeline
pub mod extract;

pub use builder::PrescriptionBuilder;
pub use extract::PrescriptionExtractor;
pub use identify::find_medications;
pub use model::{Medication, Prescription, NOT_IDENTIFIED};
pub use normalize::normalize;
pub use quantity::resolve_quantity;
pub use vocabulary::Vocabulary;
