use std::sync::Arc;

use crate::{
    errors::ExtractionFailure,
    ports::{LabelLookup, Media, MediaArchive, MediaFetcher, TextRecognizer},
};

use super::{builder::PrescriptionBuilder, model::Prescription, normalize::normalize};

/// Media URL in, [`Prescription`] out.
///
/// Every collaborator failure comes back as an [`ExtractionFailure`]; the
/// archive and the label lookup are best-effort and never fail extraction.
pub struct PrescriptionExtractor {
    fetcher: Arc<dyn MediaFetcher>,
    recognizer: Arc<dyn TextRecognizer>,
    archive: Option<Arc<dyn MediaArchive>>,
    labels: Option<Arc<dyn LabelLookup>>,
    builder: PrescriptionBuilder,
}

impl PrescriptionExtractor {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        recognizer: Arc<dyn TextRecognizer>,
        builder: PrescriptionBuilder,
    ) -> Self {
        Self {
            fetcher,
            recognizer,
            archive: None,
            labels: None,
            builder,
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn MediaArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_label_lookup(mut self, labels: Arc<dyn LabelLookup>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub async fn extract(
        &self,
        media_url: &str,
        sender_id: &str,
    ) -> Result<Prescription, ExtractionFailure> {
        let media = self.fetcher.fetch(media_url, sender_id).await?;
        tracing::info!(
            "Received {} ({} bytes) from {}",
            media.content_type,
            media.bytes.len(),
            sender_id
        );

        self.archive(sender_id, &media).await;

        let lines = self.recognizer.recognize(&media).await?;
        let text = normalize(&lines.join("\n"));
        tracing::debug!("Normalized prescription text:\n{}", text);

        let mut prescription = self.builder.build(&text);
        self.add_brand_names(&mut prescription).await;

        tracing::info!(
            "Extracted {} medications for {} ({} unresolved)",
            prescription.medications.len(),
            sender_id,
            prescription
                .medications
                .iter()
                .filter(|m| m.is_unresolved())
                .count()
        );
        Ok(prescription)
    }

    async fn archive(&self, sender_id: &str, media: &Media) {
        let Some(archive) = &self.archive else {
            return;
        };
        match archive.store(sender_id, media).await {
            Ok(location) => tracing::info!("Archived prescription at {}", location),
            Err(e) => tracing::warn!("Archiving prescription failed: {}", e),
        }
    }

    async fn add_brand_names(&self, prescription: &mut Prescription) {
        let Some(labels) = &self.labels else {
            return;
        };
        for medication in prescription.medications.iter_mut() {
            let generic = generic_name(&medication.name);
            if generic.is_empty() {
                continue;
            }
            match labels.brand_name(&generic).await {
                Ok(brand) => medication.brand_name = brand,
                Err(e) => tracing::debug!("No label for {}: {}", generic, e),
            }
        }
    }
}

/// Name words before the dose: "Losartana Potássica 50Mg" -> "Losartana Potássica".
fn generic_name(medication_name: &str) -> String {
    medication_name
        .split_whitespace()
        .take_while(|word| !word.starts_with(|c: char| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::{ExtractionStage, LookupFailure},
        ports::MediaKind,
        prescriptions::{Vocabulary, NOT_IDENTIFIED},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticFetcher;

    #[async_trait]
    impl MediaFetcher for StaticFetcher {
        async fn fetch(
            &self,
            _media_url: &str,
            _sender_id: &str,
        ) -> Result<Media, ExtractionFailure> {
            Ok(Media {
                bytes: vec![0xff, 0xd8],
                content_type: "image/jpeg".into(),
                kind: MediaKind::Image { extension: "jpeg".into() },
            })
        }
    }

    struct StaticRecognizer(Result<Vec<String>, ExtractionFailure>);

    #[async_trait]
    impl TextRecognizer for StaticRecognizer {
        async fn recognize(&self, _media: &Media) -> Result<Vec<String>, ExtractionFailure> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingArchive {
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaArchive for RecordingArchive {
        async fn store(&self, sender_id: &str, media: &Media) -> Result<String, ExtractionFailure> {
            let key = format!("prescriptions/{}.{}", sender_id, media.kind.extension());
            self.stored.lock().unwrap().push(key.clone());
            Ok(key)
        }
    }

    struct FailingArchive;

    #[async_trait]
    impl MediaArchive for FailingArchive {
        async fn store(
            &self,
            _sender_id: &str,
            _media: &Media,
        ) -> Result<String, ExtractionFailure> {
            Err(ExtractionFailure::new(ExtractionStage::Archive, "bucket missing"))
        }
    }

    struct Labels;

    #[async_trait]
    impl LabelLookup for Labels {
        async fn brand_name(&self, generic_name: &str) -> Result<Option<String>, LookupFailure> {
            match generic_name {
                "Dipirona" => Ok(Some("Novalgina".into())),
                _ => Err(LookupFailure::Transport("timeout".into())),
            }
        }
    }

    fn extractor(lines: Result<Vec<String>, ExtractionFailure>) -> PrescriptionExtractor {
        PrescriptionExtractor::new(
            Arc::new(StaticFetcher),
            Arc::new(StaticRecognizer(lines)),
            PrescriptionBuilder::new(Arc::new(Vocabulary::new(["dipirona"]))),
        )
    }

    fn ocr_lines() -> Vec<String> {
        vec![
            "PAC'ENTE: Mana Silva".into(),
            "Diplrona 500mg - 1 comprimldo, lx ao dia por 5 enas".into(),
            "Ibuprofeno 600mg se dor".into(),
        ]
    }

    #[tokio::test]
    async fn joins_lines_normalizes_and_builds() {
        let prescription = extractor(Ok(ocr_lines()))
            .extract("https://media/1", "whatsapp:+5511")
            .await
            .unwrap();

        assert_eq!(prescription.patient_name, "Maria Silva");
        assert_eq!(prescription.medications[0].name, "Dipirona 500Mg");
        assert_eq!(prescription.medications[0].quantity, "5 comprimidos");
        assert_eq!(prescription.medications[1].name, "Ibuprofeno 600Mg");
        assert_eq!(prescription.medications[1].quantity, NOT_IDENTIFIED);
    }

    #[tokio::test]
    async fn recognition_failure_is_returned_as_is() {
        let failure = ExtractionFailure::new(ExtractionStage::Recognition, "401 Unauthorized");
        let result = extractor(Err(failure.clone())).extract("https://media/1", "s").await;
        assert_eq!(result.unwrap_err(), failure);
    }

    #[tokio::test]
    async fn archives_received_media() {
        let archive = Arc::new(RecordingArchive::default());
        let extractor = extractor(Ok(ocr_lines())).with_archive(archive.clone());

        extractor.extract("https://media/1", "whatsapp_5511").await.unwrap();
        assert_eq!(
            *archive.stored.lock().unwrap(),
            vec!["prescriptions/whatsapp_5511.jpeg".to_string()]
        );
    }

    #[tokio::test]
    async fn archive_and_lookup_failures_are_ignored() {
        let extractor = extractor(Ok(ocr_lines()))
            .with_archive(Arc::new(FailingArchive))
            .with_label_lookup(Arc::new(Labels));

        let prescription = extractor.extract("https://media/1", "s").await.unwrap();
        assert_eq!(prescription.medications[0].brand_name.as_deref(), Some("Novalgina"));
        assert_eq!(prescription.medications[1].brand_name, None);
    }

    #[test]
    fn generic_name_drops_the_dose() {
        assert_eq!(generic_name("Losartana Potássica 50Mg"), "Losartana Potássica");
        assert_eq!(generic_name("500Mg"), "");
    }
}
