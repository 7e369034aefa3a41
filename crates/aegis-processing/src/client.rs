//! Blocking client for the remote treatment-generation endpoint.
//!
//! The endpoint takes a prose patient description (the `input` half of a
//! training pair) and answers with a generated plan. Plans produced by the
//! fine-tuned model echo the prompt, so the text after the first `Output:`
//! marker is what callers want.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ProcessingError, Result};

/// Marker separating the echoed prompt from the generated plan.
pub const OUTPUT_MARKER: &str = "Output:";

#[derive(Debug, Serialize)]
struct TreatmentRequest<'a> {
    patient: &'a str,
}

#[derive(Debug, Deserialize)]
struct TreatmentResponse {
    treatment_plan: Option<String>,
}

/// Text between the first `Output:` marker and the next one, trimmed.
/// Plans without a marker are returned unchanged.
pub fn strip_output_marker(plan: &str) -> &str {
    plan.split(OUTPUT_MARKER).nth(1).map_or(plan, str::trim)
}

/// Client for the treatment endpoint.
#[derive(Debug)]
pub struct TreatmentClient {
    config: ClientConfig,
    client: Client,
}

static_assertions::assert_impl_all!(TreatmentClient: Send, Sync);

impl TreatmentClient {
    /// Create a client with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST a patient description and return the raw plan text.
    pub fn request_plan(&self, patient: &str) -> Result<String> {
        debug!("Requesting treatment plan from {}", self.config.endpoint);
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&TreatmentRequest { patient })
            .send()?;

        if !response.status().is_success() {
            return Err(ProcessingError::Client(format!(
                "Endpoint returned {}: {}",
                response.status(),
                response.text()?
            )));
        }

        let body: TreatmentResponse = response.json()?;
        body.treatment_plan
            .ok_or_else(|| ProcessingError::Client("Response has no 'treatment_plan'".to_string()))
    }

    /// Request a plan and strip the echoed prompt.
    pub fn consult(&self, patient: &str) -> Result<String> {
        let plan = self.request_plan(patient)?;
        Ok(strip_output_marker(&plan).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_output_marker() {
        assert_eq!(
            strip_output_marker("Input: patient ... Output:  Treatment: A, Dosage: 10 mg/day "),
            "Treatment: A, Dosage: 10 mg/day"
        );
        assert_eq!(strip_output_marker("a Output: first Output: second"), "first");
        assert_eq!(strip_output_marker("no marker here"), "no marker here");
        assert_eq!(strip_output_marker("Output:"), "");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(TreatmentRequest { patient: "Patient is 38" }).unwrap();
        assert_eq!(body, serde_json::json!({"patient": "Patient is 38"}));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig {
            endpoint: "localhost:5000".to_string(),
            ..Default::default()
        };
        let err = TreatmentClient::new(config).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
