//! Collaborators the engine talks to. Implementations live with the
//! deployable that wires them.

use async_trait::async_trait;

use crate::errors::{ExtractionFailure, LookupFailure};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MediaKind {
    Image { extension: String },
    Pdf,
}

impl MediaKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        if let Some(subtype) = content_type.strip_prefix("image/") {
            return Some(Self::Image {
                extension: subtype.to_string(),
            });
        }
        content_type.contains("pdf").then_some(Self::Pdf)
    }

    pub fn extension(&self) -> &str {
        match self {
            Self::Image { extension } => extension,
            Self::Pdf => "pdf",
        }
    }
}

/// Downloaded prescription file.
#[derive(Clone, Debug)]
pub struct Media {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub kind: MediaKind,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media_url: &str, sender_id: &str) -> Result<Media, ExtractionFailure>;
}

/// OCR: one entry per recognized line, top to bottom.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, media: &Media) -> Result<Vec<String>, ExtractionFailure>;
}

/// Keeps a copy of every received file. Returns the stored object location.
#[async_trait]
pub trait MediaArchive: Send + Sync {
    async fn store(&self, sender_id: &str, media: &Media) -> Result<String, ExtractionFailure>;
}

/// Brand name lookup for a generic drug name.
#[async_trait]
pub trait LabelLookup: Send + Sync {
    async fn brand_name(&self, generic_name: &str) -> Result<Option<String>, LookupFailure>;
}
