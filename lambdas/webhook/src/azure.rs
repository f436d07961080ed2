//! Azure Computer Vision OCR.
//!
//! Images go to the synchronous `ocr` endpoint. PDFs go to the asynchronous
//! `read` endpoint, first page only, which is polled until it finishes.

use std::time::Duration;

use async_trait::async_trait;
use domain::{
    ports::{Media, MediaKind, TextRecognizer},
    ExtractionFailure, ExtractionStage,
};
use serde::Deserialize;

const READ_POLL_INTERVAL: Duration = Duration::from_secs(1);
const READ_POLL_ATTEMPTS: usize = 30;

pub struct AzureVisionRecognizer {
    client: reqwest::Client,
    endpoint: String,
    key: String,
}

#[derive(Debug, Default, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    regions: Vec<OcrRegion>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrRegion {
    #[serde(default)]
    lines: Vec<OcrLine>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrLine {
    #[serde(default)]
    words: Vec<OcrWord>,
}

#[derive(Debug, Deserialize)]
struct OcrWord {
    text: String,
}

impl OcrResponse {
    fn into_lines(self) -> Vec<String> {
        self.regions
            .into_iter()
            .flat_map(|region| region.lines)
            .map(|line| {
                line.words
                    .into_iter()
                    .map(|word| word.text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadPage>,
}

#[derive(Debug, Deserialize)]
struct ReadPage {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
}

impl AnalyzeResult {
    fn into_lines(self) -> Vec<String> {
        self.read_results
            .into_iter()
            .flat_map(|page| page.lines)
            .map(|line| line.text)
            .collect()
    }
}

fn recognition(detail: impl ToString) -> ExtractionFailure {
    ExtractionFailure::new(ExtractionStage::Recognition, detail)
}

impl AzureVisionRecognizer {
    pub fn new(client: reqwest::Client, endpoint: &str, key: String) -> Self {
        let endpoint = format!("{}/", endpoint.trim_end_matches('/'));
        Self {
            client,
            endpoint,
            key,
        }
    }

    async fn recognize_image(&self, media: &Media) -> Result<Vec<String>, ExtractionFailure> {
        let url = format!(
            "{}vision/v3.2/ocr?language=pt&detectOrientation=true",
            self.endpoint
        );
        let response: OcrResponse = self
            .client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(media.bytes.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(recognition)?
            .json()
            .await
            .map_err(recognition)?;

        Ok(response.into_lines())
    }

    async fn recognize_document(&self, media: &Media) -> Result<Vec<String>, ExtractionFailure> {
        let url = format!(
            "{}vision/v3.2/read/analyze?language=pt&pages=1",
            self.endpoint
        );
        let response = self
            .client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(media.bytes.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(recognition)?;

        let operation_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| recognition("read request returned no Operation-Location"))?
            .to_string();

        for _ in 0..READ_POLL_ATTEMPTS {
            tokio::time::sleep(READ_POLL_INTERVAL).await;

            let operation: ReadOperation = self
                .client
                .get(&operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(recognition)?
                .json()
                .await
                .map_err(recognition)?;

            match operation.status.as_str() {
                "succeeded" => {
                    return Ok(operation
                        .analyze_result
                        .map(AnalyzeResult::into_lines)
                        .unwrap_or_default())
                }
                "failed" => return Err(recognition("read operation failed")),
                _ => continue,
            }
        }

        Err(recognition(format!(
            "read operation still running after {} polls",
            READ_POLL_ATTEMPTS
        )))
    }
}

#[async_trait]
impl TextRecognizer for AzureVisionRecognizer {
    async fn recognize(&self, media: &Media) -> Result<Vec<String>, ExtractionFailure> {
        let lines = match media.kind {
            MediaKind::Image { .. } => self.recognize_image(media).await?,
            MediaKind::Pdf => self.recognize_document(media).await?,
        };
        tracing::info!("Recognized {} lines", lines.len());
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_words_are_joined_per_line() {
        let response: OcrResponse = serde_json::from_str(
            r#"{
                "language": "pt",
                "regions": [
                    {"lines": [
                        {"words": [{"text": "Paciente:"}, {"text": "Maria"}, {"text": "Silva"}]},
                        {"words": [{"text": "CRM-SP"}, {"text": "12345"}]}
                    ]},
                    {"lines": [{"words": [{"text": "Dipirona"}, {"text": "500mg"}]}]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            response.into_lines(),
            vec!["Paciente: Maria Silva", "CRM-SP 12345", "Dipirona 500mg"]
        );
    }

    #[test]
    fn empty_ocr_response_has_no_lines() {
        let response: OcrResponse = serde_json::from_str(r#"{"language": "pt"}"#).unwrap();
        assert!(response.into_lines().is_empty());
    }

    #[test]
    fn read_result_lines_are_flattened() {
        let operation: ReadOperation = serde_json::from_str(
            r#"{
                "status": "succeeded",
                "analyzeResult": {"readResults": [
                    {"page": 1, "lines": [
                        {"text": "Paciente: João"},
                        {"text": "Amoxicilina 500mg"}
                    ]}
                ]}
            }"#,
        )
        .unwrap();

        assert_eq!(operation.status, "succeeded");
        assert_eq!(
            operation.analyze_result.unwrap().into_lines(),
            vec!["Paciente: João", "Amoxicilina 500mg"]
        );
    }

    #[test]
    fn endpoint_gets_a_single_trailing_slash() {
        let client = reqwest::Client::new();
        let recognizer =
            AzureVisionRecognizer::new(client.clone(), "https://x.example.com//", "k".into());
        assert_eq!(recognizer.endpoint, "https://x.example.com/");
        let recognizer = AzureVisionRecognizer::new(client, "https://x.example.com", "k".into());
        assert_eq!(recognizer.endpoint, "https://x.example.com/");
    }
}
