use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    identify::find_medications,
    model::{Medication, Prescription, NOT_IDENTIFIED},
    quantity::resolve_quantity,
    vocabulary::Vocabulary,
};

static PATIENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)paciente[:\s\-]*([^\n]+)").expect("patient pattern"));

static DOCUMENT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{3}[.\s_]?[0-9]{3}[.\s_]?[0-9]{3}[-\s_]?[0-9]{2}")
        .expect("document id pattern")
});

static PHYSICIAN_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)CRM[-\s:]*([A-Z]{2}-?\s*\d+)").expect("physician id pattern")
});

static ISSUE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d{1,2}\s+de\s+\w+\s+de\s+\d{4}").expect("issue date pattern")
});

/// Assembles a [`Prescription`] from normalized OCR text.
#[derive(Clone, Debug, Default)]
pub struct PrescriptionBuilder {
    vocabulary: Arc<Vocabulary>,
}

impl PrescriptionBuilder {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn build(&self, normalized_text: &str) -> Prescription {
        let medications = find_medications(normalized_text, &self.vocabulary)
            .into_iter()
            .map(|name| {
                let quantity = resolve_quantity(&name, normalized_text);
                Medication::new(name, quantity)
            })
            .collect();

        Prescription {
            patient_name: patient_name(normalized_text)
                .unwrap_or_else(|| NOT_IDENTIFIED.to_string()),
            document_id: document_id(normalized_text),
            physician_id: physician_id(normalized_text),
            issue_date: issue_date(normalized_text),
            medications,
        }
    }
}

fn patient_name(text: &str) -> Option<String> {
    let name = PATIENT.captures(text)?.get(1)?.as_str().trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// CPF rendered as `000.000.000-00` whatever separators the OCR produced.
fn document_id(text: &str) -> Option<String> {
    let found = DOCUMENT_ID.find(text)?;
    let digits: String = found.as_str().chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 11 {
        return None;
    }
    Some(format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    ))
}

fn physician_id(text: &str) -> Option<String> {
    let raw = PHYSICIAN_ID.captures(text)?.get(1)?.as_str();
    Some(
        raw.chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_uppercase(),
    )
}

fn issue_date(text: &str) -> Option<String> {
    ISSUE_DATE.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescriptions::normalize;

    fn builder() -> PrescriptionBuilder {
        PrescriptionBuilder::new(Arc::new(Vocabulary::new(["dipirona", "amoxicilina"])))
    }

    #[test]
    fn builds_complete_record_from_ocr_text() {
        let text = "Paciente: Maria Silva\nCRM-SP 12345\n\
... Dipirona 500mg - 1 comprimido, 3x ao dia, por 5 dias ...";
        let prescription = builder().build(&normalize(text));

        assert_eq!(prescription.patient_name, "Maria Silva");
        assert_eq!(prescription.physician_id.as_deref(), Some("SP12345"));
        assert_eq!(prescription.document_id, None);
        assert_eq!(prescription.issue_date, None);
        assert_eq!(
            prescription.medications,
            vec![Medication::new("Dipirona 500Mg".into(), "15 comprimidos".into())]
        );
        assert!(prescription.is_complete());
    }

    #[test]
    fn same_result_without_vocabulary() {
        let text = "Paciente: Maria Silva\nDipirona 500mg - 1 comprimido, 3x ao dia, por 5 dias";
        let prescription = PrescriptionBuilder::default().build(&normalize(text));
        assert_eq!(prescription.medications[0].name, "Dipirona 500Mg");
        assert_eq!(prescription.medications[0].quantity, "15 comprimidos");
    }

    #[test]
    fn extracts_every_header_field() {
        let text = normalize(
            "PACIENTE - João Pereira \nCPF: 123 456 789_09\ncrm: rj-98765\n\
São Paulo, 12 de março de 2024",
        );
        let prescription = builder().build(&text);

        assert_eq!(prescription.patient_name, "João Pereira");
        assert_eq!(prescription.document_id.as_deref(), Some("123.456.789-09"));
        assert_eq!(prescription.physician_id.as_deref(), Some("RJ98765"));
        assert_eq!(prescription.issue_date.as_deref(), Some("12 de março de 2024"));
        assert!(prescription.medications.is_empty());
    }

    #[test]
    fn non_ascii_digits_are_not_a_document_id() {
        let builder = PrescriptionBuilder::default();
        assert_eq!(builder.build("CPF: ٣23.456.789-09").document_id, None);
        assert_eq!(builder.build("CPF: １２３.４５６.７８９-０９").document_id, None);
        assert_eq!(
            builder.build("CPF: ٣ 123.456.789-09").document_id.as_deref(),
            Some("123.456.789-09")
        );
    }

    #[test]
    fn missing_fields_become_sentinel_or_null() {
        let prescription = builder().build("texto ilegível");
        assert_eq!(prescription, Prescription::default());
        assert_eq!(prescription.patient_name, NOT_IDENTIFIED);
    }

    #[test]
    fn keeps_discovery_order_and_unresolved_quantities() {
        let text = normalize(
            "Amoxicilina 500mg 1 cápsula 3x ao dia por 7 dias\n\
Dipirona 1g 1 comprimido por 3 dias\nNimesulida 100mg se dor",
        );
        let prescription = builder().build(&text);
        let summary: Vec<(&str, &str)> = prescription
            .medications
            .iter()
            .map(|m| (m.name.as_str(), m.quantity.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Amoxicilina 500Mg", "21 cápsulas"),
                ("Dipirona 1G", "3 comprimidos"),
                ("Nimesulida 100Mg", NOT_IDENTIFIED),
            ]
        );
    }
}
