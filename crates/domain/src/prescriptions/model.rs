use derive_new::new;
use serde::{Deserialize, Serialize};

/// Marker for a value the extractor could not determine.
pub const NOT_IDENTIFIED: &str = "Não identificado";

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct Medication {
    pub name: String,
    pub quantity: String,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
}

impl Medication {
    pub fn is_unresolved(&self) -> bool {
        self.quantity == NOT_IDENTIFIED
    }
}

/// Structured record recovered from one prescription image.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Prescription {
    pub patient_name: String,
    pub document_id: Option<String>,
    pub physician_id: Option<String>,
    pub issue_date: Option<String>,
    pub medications: Vec<Medication>,
}

impl Default for Prescription {
    fn default() -> Self {
        Self {
            patient_name: NOT_IDENTIFIED.to_string(),
            document_id: None,
            physician_id: None,
            issue_date: None,
            medications: Vec::new(),
        }
    }
}

impl Prescription {
    /// First medication, in sequence order, still waiting for a quantity.
    pub fn first_unresolved(&self) -> Option<&Medication> {
        self.medications.iter().find(|m| m.is_unresolved())
    }

    pub fn is_complete(&self) -> bool {
        self.first_unresolved().is_none()
    }

    /// Overwrites the quantity of the medication named exactly `name`.
    /// Returns false when no such medication exists.
    pub fn set_quantity(&mut self, name: &str, quantity: &str) -> bool {
        match self.medications.iter_mut().find(|m| m.name == name) {
            Some(medication) => {
                medication.quantity = quantity.to_string();
                true
            }
            None => false,
        }
    }

    /// Indented JSON with non-ASCII text kept as is.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Prescription {
        Prescription {
            medications: vec![
                Medication::new("A".into(), NOT_IDENTIFIED.into()),
                Medication::new("B".into(), "30 comprimidos".into()),
                Medication::new("C".into(), NOT_IDENTIFIED.into()),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn first_unresolved_follows_sequence_order() {
        let mut prescription = sample();
        assert_eq!(prescription.first_unresolved().unwrap().name, "A");

        assert!(prescription.set_quantity("A", "10"));
        assert_eq!(prescription.first_unresolved().unwrap().name, "C");

        assert!(prescription.set_quantity("C", "uma caixa"));
        assert!(prescription.is_complete());
    }

    #[test]
    fn set_quantity_on_unknown_name_is_a_no_op() {
        let mut prescription = sample();
        assert!(!prescription.set_quantity("a", "10"));
        assert_eq!(prescription, sample());
    }

    #[test]
    fn json_keeps_accents_and_omits_missing_brand() {
        let json = sample().to_pretty_json();
        assert!(json.contains("\"quantity\": \"Não identificado\""));
        assert!(json.contains("\n  \"patient_name\""));
        assert!(!json.contains("brand_name"));
    }
}
