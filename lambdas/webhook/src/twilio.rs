//! Twilio WhatsApp channel: inbound form, media download and TwiML replies.

use async_trait::async_trait;
use domain::{
    conversations::InboundMessage,
    ports::{Media, MediaFetcher, MediaKind},
    ExtractionFailure, ExtractionStage,
};
use quick_xml::escape::escape;
use serde::Deserialize;

/// Form fields Twilio posts for an incoming WhatsApp message.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TwilioMessage {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url: Option<String>,
    #[serde(rename = "MediaContentType0", default)]
    pub media_content_type: Option<String>,
}

impl From<TwilioMessage> for InboundMessage {
    fn from(message: TwilioMessage) -> Self {
        InboundMessage::new(
            message.from,
            message.body.trim().to_string(),
            message.media_url.filter(|url| !url.trim().is_empty()),
        )
    }
}

/// Downloads media attached to a message with the account credentials.
pub struct TwilioMediaFetcher {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
}

impl TwilioMediaFetcher {
    pub fn new(client: reqwest::Client, account_sid: String, auth_token: String) -> Self {
        Self {
            client,
            account_sid,
            auth_token,
        }
    }
}

#[async_trait]
impl MediaFetcher for TwilioMediaFetcher {
    async fn fetch(&self, media_url: &str, sender_id: &str) -> Result<Media, ExtractionFailure> {
        let download = |e: reqwest::Error| ExtractionFailure::new(ExtractionStage::Download, e);

        let response = self
            .client
            .get(media_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(download)?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        tracing::info!("Media type from {}: {}", sender_id, content_type);

        let kind = MediaKind::from_content_type(&content_type).ok_or_else(|| {
            ExtractionFailure::new(
                ExtractionStage::UnsupportedMedia,
                format!("unsupported content type {:?}", content_type),
            )
        })?;

        let bytes = response.bytes().await.map_err(download)?;
        Ok(Media {
            bytes: bytes.to_vec(),
            content_type,
            kind,
        })
    }
}

/// TwiML document answering the message with `body`.
pub fn twiml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape(body)
    )
}
