use std::sync::Arc;

use dashmap::DashMap;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{errors::Error, prescriptions::PrescriptionExtractor};

use super::{
    replies, Command, Conversation, ConversationStatus, ConversationStore, Event, Services,
};

/// One message delivered by the messaging channel.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct InboundMessage {
    pub sender_id: String,
    pub body: String,
    pub media_url: Option<String>,
}

/// Plain-text answer for the messaging channel to deliver.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct Reply {
    pub to: String,
    pub body: String,
}

/// Drives one conversation per sender.
///
/// Messages from the same sender are handled one at a time, from the store
/// read to the store write. Different senders never wait on each other.
pub struct ConversationEngine {
    store: Arc<dyn ConversationStore>,
    extractor: Arc<PrescriptionExtractor>,
    services: Services,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

enum Origin {
    Image,
    Answer,
}

impl ConversationEngine {
    pub fn new(store: Arc<dyn ConversationStore>, extractor: Arc<PrescriptionExtractor>) -> Self {
        Self {
            store,
            extractor,
            services: Services::default(),
            locks: DashMap::new(),
        }
    }

    pub async fn handle(&self, message: InboundMessage) -> Reply {
        let lock = self
            .locks
            .entry(message.sender_id.clone())
            .or_default()
            .clone();

        let body = {
            let _guard = lock.lock().await;
            self.dispatch(&message).await
        };

        drop(lock);
        self.locks
            .remove_if(&message.sender_id, |_, lock| Arc::strong_count(lock) == 1);

        Reply::new(message.sender_id, body)
    }

    async fn dispatch(&self, message: &InboundMessage) -> String {
        let held = match self.store.get(&message.sender_id).await {
            Ok(held) => held,
            Err(e) => {
                tracing::error!("Loading conversation for {} failed: {}", message.sender_id, e);
                return replies::UNAVAILABLE.to_string();
            }
        };

        let result = match (message.media_url.as_deref(), held) {
            (Some(media_url), held) => {
                let expected_version = held.map_or(0, |conversation| {
                    tracing::info!(
                        "Discarding open conversation for {} in favour of a new image",
                        message.sender_id
                    );
                    conversation.version
                });
                self.open(&message.sender_id, media_url, expected_version).await
            }
            (None, Some(conversation)) => self.answer(conversation, &message.body).await,
            (None, None) => Ok(replies::greeting_or_help(&message.body)),
        };

        result.unwrap_or_else(|e| {
            tracing::error!("Conversation for {} failed: {}", message.sender_id, e);
            match e {
                Error::Conflict { .. } => replies::BUSY.to_string(),
                _ => replies::UNAVAILABLE.to_string(),
            }
        })
    }

    async fn open(
        &self,
        sender_id: &str,
        media_url: &str,
        expected_version: u64,
    ) -> Result<String, Error> {
        let prescription = match self.extractor.extract(media_url, sender_id).await {
            Ok(prescription) => prescription,
            Err(failure) => {
                tracing::error!("Prescription extraction for {} failed: {}", sender_id, failure);
                if expected_version > 0 {
                    self.store.delete(sender_id, expected_version).await?;
                }
                return Ok(replies::EXTRACTION_FAILED.to_string());
            }
        };

        let mut conversation = Conversation {
            version: expected_version,
            ..Default::default()
        };
        let command = Command::OpenPrescription {
            sender_id: sender_id.to_string(),
            prescription,
        };
        let events = conversation.execute(command, &self.services).await?;
        self.commit(conversation, &events, expected_version, Origin::Image)
            .await
    }

    async fn answer(&self, mut conversation: Conversation, answer: &str) -> Result<String, Error> {
        let expected_version = conversation.version;
        let command = Command::AnswerQuantity {
            answer: answer.to_string(),
        };
        let events = conversation.execute(command, &self.services).await?;

        if events
            .iter()
            .any(|e| matches!(e, Event::PendingMedicationMissing { .. }))
        {
            tracing::warn!(
                "Pending medication {:?} missing from record held for {}",
                conversation.pending_medication_name,
                conversation.sender_id
            );
        }

        self.commit(conversation, &events, expected_version, Origin::Answer)
            .await
    }

    /// Persists or drops the conversation and renders the reply.
    async fn commit(
        &self,
        mut conversation: Conversation,
        events: &[Event],
        expected_version: u64,
        origin: Origin,
    ) -> Result<String, Error> {
        if conversation.status == ConversationStatus::Resolved {
            self.store
                .delete(&conversation.sender_id, expected_version)
                .await?;
            tracing::info!("Prescription for {} resolved", conversation.sender_id);

            return Ok(match origin {
                Origin::Image => replies::received(&conversation.prescription),
                Origin::Answer => replies::finalized(&conversation.prescription),
            });
        }

        conversation.version = expected_version + 1;
        self.store.put(&conversation, expected_version).await?;

        match events.last() {
            Some(Event::QuantityRequested { medication, .. }) => {
                tracing::info!(
                    "Asking {} for the quantity of {}",
                    conversation.sender_id,
                    medication
                );
                Ok(replies::ask_quantity(medication))
            }
            _ => Err(Error::InvalidStateTransition {
                from: conversation.status.to_string(),
                to: ConversationStatus::AwaitingQuantity.to_string(),
            }),
        }
    }
}
