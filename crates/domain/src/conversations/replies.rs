//! Texts sent back to the user.

use crate::prescriptions::Prescription;

const GREETING_TRIGGERS: &[&str] = &["oi", "olá", "receita"];

pub const SEND_PHOTO: &str = "👋 Olá! Por favor, envie uma *foto da receita médica*.";

pub const HELP: &str = "Envie *Oi* ou *Receita* para começar.";

pub const EXTRACTION_FAILED: &str = "Desculpe, não consegui ler as informações da sua receita. \
Por favor, tente enviar uma foto mais nítida e bem iluminada.";

pub const BUSY: &str =
    "⏳ Ainda estou processando sua mensagem anterior. Tente novamente em instantes.";

pub const UNAVAILABLE: &str =
    "❌ Desculpe, tive um problema ao processar sua mensagem. Tente novamente.";

/// Reply to a text message when no conversation is open.
pub fn greeting_or_help(body: &str) -> String {
    let body = body.to_lowercase();
    if GREETING_TRIGGERS.iter().any(|trigger| body.contains(trigger)) {
        SEND_PHOTO.to_string()
    } else {
        HELP.to_string()
    }
}

pub fn ask_quantity(medication: &str) -> String {
    format!(
        "⚠️ Não identificamos a quantidade para o medicamento: *{}*. \
Por favor, informe a quantidade (ex: 30 comprimidos).",
        medication
    )
}

/// Record complete straight from the image.
pub fn received(prescription: &Prescription) -> String {
    with_record("✅ Receita recebida com sucesso:", prescription)
}

/// Record completed through the conversation.
pub fn finalized(prescription: &Prescription) -> String {
    with_record("✅ Receita finalizada:", prescription)
}

fn with_record(heading: &str, prescription: &Prescription) -> String {
    format!("{}\n```json\n{}\n```", heading, prescription.to_pretty_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Olá", SEND_PHOTO)]
    #[case("OI, tudo bem?", SEND_PHOTO)]
    #[case("quero enviar uma RECEITA", SEND_PHOTO)]
    #[case("bom dia", HELP)]
    #[case("", HELP)]
    fn routes_greetings(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(greeting_or_help(body), expected);
    }

    #[test]
    fn record_is_embedded_as_json_block() {
        let body = finalized(&Prescription::default());
        assert!(body.starts_with("✅ Receita finalizada:\n```json\n{\n"));
        assert!(body.ends_with("}\n```"));
        assert!(body.contains("\"patient_name\": \"Não identificado\""));
    }
}
