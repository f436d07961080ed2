use async_trait::async_trait;
use domain::{ports::LabelLookup, LookupFailure};
use serde_json::Value;

const OPENFDA_LABEL_URL: &str = "https://api.fda.gov/drug/label.json";

/// Brand names from the openFDA drug label API.
pub struct OpenFdaLookup {
    client: reqwest::Client,
}

impl OpenFdaLookup {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LabelLookup for OpenFdaLookup {
    async fn brand_name(&self, generic_name: &str) -> Result<Option<String>, LookupFailure> {
        let response = self
            .client
            .get(OPENFDA_LABEL_URL)
            .query(&label_query(generic_name))
            .send()
            .await
            .map_err(|e| LookupFailure::Transport(e.to_string()))?;

        // openFDA answers 404 when nothing matches.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response
            .error_for_status()
            .map_err(|e| LookupFailure::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| LookupFailure::Response(e.to_string()))?;

        Ok(brand_from_label(&body))
    }
}

fn label_query(generic_name: &str) -> [(&'static str, String); 2] {
    [
        ("search", format!("generic_name:{}", generic_name.trim())),
        ("limit", "1".to_string()),
    ]
}

fn brand_from_label(body: &Value) -> Option<String> {
    let label = body.get("results")?.get(0)?;
    label
        .pointer("/openfda/brand_name/0")
        .or_else(|| label.pointer("/generic_name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_is_encoded_by_the_client() {
        let request = reqwest::Client::new()
            .get(OPENFDA_LABEL_URL)
            .query(&label_query(" ácido fólico&x "))
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.fda.gov/drug/label.json\
?search=generic_name%3A%C3%A1cido+f%C3%B3lico%26x&limit=1"
        );
    }

    #[test]
    fn prefers_brand_name() {
        let body = json!({"results": [{
            "openfda": {"brand_name": ["Tylenol"]},
            "generic_name": "acetaminophen"
        }]});
        assert_eq!(brand_from_label(&body).as_deref(), Some("Tylenol"));
    }

    #[test]
    fn falls_back_to_generic_name() {
        let body = json!({"results": [{"openfda": {}, "generic_name": "dipyrone"}]});
        assert_eq!(brand_from_label(&body).as_deref(), Some("dipyrone"));
    }

    #[test]
    fn empty_results_have_no_brand() {
        assert_eq!(brand_from_label(&json!({"results": []})), None);
        assert_eq!(brand_from_label(&json!({})), None);
    }
}
