use serde::{Deserialize, Serialize};

use crate::prescriptions::Prescription;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command {
    /// Start a conversation around a freshly extracted prescription
    OpenPrescription {
        sender_id: String,
        prescription: Prescription,
    },

    /// User's free-text answer for the medication being asked about
    AnswerQuantity { answer: String },
}
