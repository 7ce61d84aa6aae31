//! OpenAI-compatible chat-completions backend.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::core::state::TokenUsage;
use crate::llm::{GenerateRequest, Generator, GeneratorReply, OutputSchema, parse_output};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const TEMPERATURE: f64 = 0.2;

/// Per-1K-token prices in USD, (prompt, completion). Unknown models cost 0.
fn pricing(model: &str) -> (f64, f64) {
    match model {
        "gpt-4o" => (0.0025, 0.01),
        "gpt-4o-mini" => (0.000_15, 0.0006),
        _ => (0.0, 0.0),
    }
}

pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read the API key from OPENAI_API_KEY.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key =
            std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        Ok(Self::new(api_key, model))
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl Generator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model, schema = ?request.schema))]
    fn generate(&self, request: &GenerateRequest) -> Result<GeneratorReply> {
        let system = format!(
            "{}\n\n{}",
            request.system,
            schema_instructions(request.schema)
        );
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": request.prompt},
            ],
            "response_format": {"type": "json_object"},
            "temperature": TEMPERATURE,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("send chat completion request")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(anyhow!("chat completion failed with {status}: {detail}"));
        }
        let parsed: ChatResponse = response.json().context("decode chat completion")?;

        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
        let output = parse_output(request.schema, content)?;

        let api_usage = parsed.usage.unwrap_or_default();
        let (prompt_rate, completion_rate) = pricing(&self.model);
        let cost_usd = api_usage.prompt_tokens as f64 / 1000.0 * prompt_rate
            + api_usage.completion_tokens as f64 / 1000.0 * completion_rate;
        let usage = TokenUsage {
            prompt_tokens: api_usage.prompt_tokens,
            completion_tokens: api_usage.completion_tokens,
            total_tokens: api_usage.total_tokens,
            cost_usd,
        };
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = usage.cost_usd,
            "chat completion finished"
        );
        Ok(GeneratorReply { output, usage })
    }
}

/// Appended to the system message so the model replies with the JSON object
/// the schema's parser expects.
fn schema_instructions(schema: OutputSchema) -> &'static str {
    match schema {
        OutputSchema::Planning => {
            "Respond with a JSON object with exactly these string fields: \
             \"problem_understanding\" (what the task asks for) and \
             \"approach\" (how the solution will work)."
        }
        OutputSchema::Code => {
            "Respond with a JSON object with these fields: \"filename\" (a .py file name), \
             \"code\" (the complete raw Python source, no markdown fences), and \
             \"explanation\" (a short description of the solution)."
        }
        OutputSchema::TestInference => {
            "Respond with a JSON object with these fields: \"test_cases\" (an array of objects \
             each with \"description\", \"inputs\" as an object of named arguments, and \
             \"expected_output\") and \"reasoning\" (why these cases cover the task)."
        }
        OutputSchema::ErrorAnalysis => {
            "Respond with a JSON object with these fields: \"root_cause\" (why the code failed), \
             \"failed_test_details\" (an array of strings, one per failed test), and \
             \"suggested_fix\" (a concrete change to make)."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_covers_known_models_and_defaults_to_zero() {
        assert_eq!(pricing("gpt-4o"), (0.0025, 0.01));
        assert_eq!(pricing("gpt-4o-mini"), (0.000_15, 0.0006));
        assert_eq!(pricing("some-local-model"), (0.0, 0.0));
    }

    #[test]
    fn schema_instructions_name_the_required_fields() {
        assert!(schema_instructions(OutputSchema::Planning).contains("problem_understanding"));
        assert!(schema_instructions(OutputSchema::Code).contains("filename"));
        assert!(schema_instructions(OutputSchema::TestInference).contains("test_cases"));
        assert!(schema_instructions(OutputSchema::ErrorAnalysis).contains("root_cause"));
    }

    #[test]
    fn unreachable_base_url_is_a_transport_error() {
        let generator = OpenAiGenerator::new("test-key", "gpt-4o-mini")
            .with_base_url("http://127.0.0.1:1/v1");
        let err = generator
            .generate(&GenerateRequest {
                system: "s".to_string(),
                prompt: "p".to_string(),
                schema: OutputSchema::Planning,
            })
            .unwrap_err();
        assert!(err.downcast_ref::<crate::llm::MalformedOutputError>().is_none());
    }
}
