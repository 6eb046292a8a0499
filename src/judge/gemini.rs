//! Judge backed by the Gemini REST API.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CaseDetails, JudgmentService, build_prompt, prompt::SYSTEM_INSTRUCTION};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f32 = 0.7;

#[derive(Clone)]
pub struct GeminiJudge {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiJudge {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_owned(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request(case: &CaseDetails) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: build_prompt(case),
                }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION.to_owned(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        }
    }
}

#[async_trait]
impl JudgmentService for GeminiJudge {
    async fn judge(&self, case: &CaseDetails) -> anyhow::Result<String> {
        let url = format!("{BASE_URL}/{}:generateContent", self.model);

        let response = self
            .client
            .post(url)
            .query(&[("key", &self.api_key)])
            .json(&Self::request(case))
            .send()
            .await
            .context("Gemini API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API returned {status}: {body}"));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("failed to parse Gemini response")?;
        Ok(parsed.text())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl GenerateContentResponse {
    /// Text of the first candidate; empty when there is none.
    fn text(&self) -> String {
        self.candidates
            .iter()
            .find_map(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}
