use chrono::{DateTime, Utc};
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::prescriptions::Prescription;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    PrescriptionReceived {
        sender_id: String,
        prescription: Prescription,
        received_at: DateTime<Utc>,
    },

    QuantityRequested {
        medication: String,
        updated_at: DateTime<Utc>,
    },

    QuantityAnswered {
        medication: String,
        answer: String,
        updated_at: DateTime<Utc>,
    },

    /// The medication being asked about is no longer in the record
    PendingMedicationMissing {
        medication: String,
        updated_at: DateTime<Utc>,
    },

    PrescriptionResolved {
        resolved_at: DateTime<Utc>,
    },
}

impl DomainEvent for Event {
    fn event_type(&self) -> String {
        match self {
            Event::PrescriptionReceived { .. } => "Conversation:PrescriptionReceived".to_string(),
            Event::QuantityRequested { .. } => "Conversation:QuantityRequested".to_string(),
            Event::QuantityAnswered { .. } => "Conversation:QuantityAnswered".to_string(),
            Event::PendingMedicationMissing { .. } => {
                "Conversation:PendingMedicationMissing".to_string()
            }
            Event::PrescriptionResolved { .. } => "Conversation:PrescriptionResolved".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}
