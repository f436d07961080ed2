use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};

const DEFAULT_ACTIVE_INGREDIENTS_CSV: &str = "data/principios_ativos.csv";
const DEFAULT_CONVERSATION_TTL_SECS: u64 = 3600;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct Config {
    pub twilio_sid: String,
    pub twilio_auth: String,
    pub azure_endpoint: String,
    pub azure_key: String,
    pub active_ingredients_csv: PathBuf,
    /// Archive received files to S3 when set
    pub prescriptions_bucket: Option<String>,
    /// Keep conversations in DynamoDB when set, in memory otherwise
    pub conversations_table: Option<String>,
    pub conversation_ttl: Duration,
    pub openfda_enabled: bool,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("{} must be set", key))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let conversation_ttl = match optional("CONVERSATION_TTL_SECS") {
            Some(secs) => secs
                .parse()
                .with_context(|| format!("CONVERSATION_TTL_SECS is not a number: {}", secs))?,
            None => DEFAULT_CONVERSATION_TTL_SECS,
        };

        let openfda_enabled = optional("OPENFDA_ENABLED")
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            twilio_sid: required("TWILIO_SID")?,
            twilio_auth: required("TWILIO_AUTH")?,
            azure_endpoint: required("AZURE_ENDPOINT")?,
            azure_key: required("AZURE_KEY")?,
            active_ingredients_csv: optional("ACTIVE_INGREDIENTS_CSV")
                .unwrap_or(DEFAULT_ACTIVE_INGREDIENTS_CSV.to_string())
                .into(),
            prescriptions_bucket: optional("PRESCRIPTIONS_BUCKET"),
            conversations_table: optional("DYNAMODB_CONVERSATIONS_TABLE"),
            conversation_ttl: Duration::from_secs(conversation_ttl),
            openfda_enabled,
            bind_addr: optional("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.to_string()),
        })
    }
}
