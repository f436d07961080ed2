use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

use crate::{errors::Error, prescriptions::Prescription};

use super::{Command, Event};

/// Conversation workflow status
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Nothing held for the sender
    #[default]
    New,
    /// Waiting for the user to type a quantity
    AwaitingQuantity,
    /// Every quantity known; the conversation is dropped
    Resolved,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::New => "new",
            Self::AwaitingQuantity => "awaiting_quantity",
            Self::Resolved => "resolved",
        };
        f.write_str(status)
    }
}

/// Conversation aggregate, one per sender.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Conversation {
    pub sender_id: String,
    pub status: ConversationStatus,
    pub prescription: Prescription,
    pub pending_medication_name: Option<String>,

    /// Store revision, 0 until first persisted
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

pub const AGGREGATE_TYPE: &str = "Conversation";

#[derive(Clone, Default)]
pub struct Services {}

#[async_trait]
impl Aggregate for Conversation {
    type Command = Command;
    type Event = Event;
    type Error = Error;
    type Services = Services;

    fn aggregate_type() -> String {
        AGGREGATE_TYPE.to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        _services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            Command::OpenPrescription {
                sender_id,
                prescription,
            } => {
                self.validate_status(
                    ConversationStatus::New,
                    ConversationStatus::AwaitingQuantity,
                )?;
                let now = Utc::now();

                let next = next_step(&prescription, now);
                Ok(vec![
                    Event::PrescriptionReceived {
                        sender_id,
                        prescription,
                        received_at: now,
                    },
                    next,
                ])
            }

            Command::AnswerQuantity { answer } => {
                self.validate_status(
                    ConversationStatus::AwaitingQuantity,
                    ConversationStatus::AwaitingQuantity,
                )?;
                let now = Utc::now();
                let pending = self.pending_medication_name.clone().unwrap_or_default();

                let mut prescription = self.prescription.clone();
                if !prescription.set_quantity(&pending, &answer) {
                    return Ok(vec![
                        Event::PendingMedicationMissing {
                            medication: pending.clone(),
                            updated_at: now,
                        },
                        Event::QuantityRequested {
                            medication: pending,
                            updated_at: now,
                        },
                    ]);
                }

                Ok(vec![
                    Event::QuantityAnswered {
                        medication: pending,
                        answer,
                        updated_at: now,
                    },
                    next_step(&prescription, now),
                ])
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            Event::PrescriptionReceived {
                sender_id,
                prescription,
                received_at,
            } => {
                self.sender_id = sender_id;
                self.prescription = prescription;
                self.updated_at = received_at;
            }

            Event::QuantityRequested {
                medication,
                updated_at,
            } => {
                self.pending_medication_name = Some(medication);
                self.status = ConversationStatus::AwaitingQuantity;
                self.updated_at = updated_at;
            }

            Event::QuantityAnswered {
                medication,
                answer,
                updated_at,
            } => {
                self.prescription.set_quantity(&medication, &answer);
                self.updated_at = updated_at;
            }

            Event::PendingMedicationMissing { updated_at, .. } => {
                self.updated_at = updated_at;
            }

            Event::PrescriptionResolved { resolved_at } => {
                self.pending_medication_name = None;
                self.status = ConversationStatus::Resolved;
                self.updated_at = resolved_at;
            }
        }
    }
}

impl Conversation {
    fn validate_status(
        &self,
        expected: ConversationStatus,
        to: ConversationStatus,
    ) -> Result<(), Error> {
        if self.status != expected {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Handles `command` and applies the resulting events in place.
    pub async fn execute(
        &mut self,
        command: Command,
        services: &Services,
    ) -> Result<Vec<Event>, Error> {
        let events = self.handle(command, services).await?;
        for event in events.iter().cloned() {
            self.apply(event);
        }
        Ok(events)
    }
}

/// Ask for the first unresolved medication in sequence order, or finish.
fn next_step(prescription: &Prescription, now: DateTime<Utc>) -> Event {
    match prescription.first_unresolved() {
        Some(medication) => Event::QuantityRequested {
            medication: medication.name.clone(),
            updated_at: now,
        },
        None => Event::PrescriptionResolved { resolved_at: now },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescriptions::{Medication, NOT_IDENTIFIED};

    fn prescription() -> Prescription {
        Prescription {
            patient_name: "Maria Silva".into(),
            medications: vec![
                Medication::new("A".into(), NOT_IDENTIFIED.into()),
                Medication::new("B".into(), "30 comprimidos".into()),
                Medication::new("C".into(), NOT_IDENTIFIED.into()),
            ],
            ..Default::default()
        }
    }

    fn open() -> Command {
        Command::OpenPrescription {
            sender_id: "whatsapp:+5511999990000".into(),
            prescription: prescription(),
        }
    }

    fn answer(text: &str) -> Command {
        Command::AnswerQuantity {
            answer: text.into(),
        }
    }

    #[tokio::test]
    async fn asks_in_sequence_order_then_resolves() {
        let services = Services::default();
        let mut conversation = Conversation::default();

        conversation.execute(open(), &services).await.unwrap();
        assert_eq!(conversation.status, ConversationStatus::AwaitingQuantity);
        assert_eq!(conversation.pending_medication_name.as_deref(), Some("A"));

        conversation.execute(answer("2 caixas"), &services).await.unwrap();
        assert_eq!(conversation.pending_medication_name.as_deref(), Some("C"));

        let events = conversation.execute(answer("10"), &services).await.unwrap();
        assert!(matches!(events.last(), Some(Event::PrescriptionResolved { .. })));
        assert_eq!(conversation.status, ConversationStatus::Resolved);
        assert_eq!(conversation.pending_medication_name, None);

        let quantities: Vec<&str> = conversation
            .prescription
            .medications
            .iter()
            .map(|m| m.quantity.as_str())
            .collect();
        assert_eq!(quantities, vec!["2 caixas", "30 comprimidos", "10"]);
    }

    #[tokio::test]
    async fn complete_prescription_resolves_on_open() {
        let mut complete = prescription();
        complete.medications.retain(|m| m.name == "B");

        let events = Conversation::default()
            .handle(
                Command::OpenPrescription {
                    sender_id: "s".into(),
                    prescription: complete,
                },
                &Services::default(),
            )
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::PrescriptionResolved { .. }));
    }

    #[tokio::test]
    async fn answering_the_sentinel_asks_again() {
        let services = Services::default();
        let mut conversation = Conversation::default();
        conversation.execute(open(), &services).await.unwrap();

        conversation.execute(answer(NOT_IDENTIFIED), &services).await.unwrap();
        assert_eq!(conversation.pending_medication_name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn missing_pending_medication_re_asks_without_update() {
        let services = Services::default();
        let mut conversation = Conversation::default();
        conversation.execute(open(), &services).await.unwrap();
        conversation.pending_medication_name = Some("Z".into());
        let before = conversation.prescription.clone();

        let events = conversation.execute(answer("5"), &services).await.unwrap();

        assert!(matches!(events[0], Event::PendingMedicationMissing { .. }));
        assert!(matches!(
            &events[1],
            Event::QuantityRequested { medication, .. } if medication == "Z"
        ));
        assert_eq!(conversation.prescription, before);
        assert_eq!(conversation.status, ConversationStatus::AwaitingQuantity);
    }

    #[tokio::test]
    async fn answer_without_open_conversation_is_rejected() {
        let result = Conversation::default()
            .handle(answer("10"), &Services::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn open_twice_is_rejected() {
        let services = Services::default();
        let mut conversation = Conversation::default();
        conversation.execute(open(), &services).await.unwrap();

        let result = conversation.handle(open(), &services).await;
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));
    }
}
