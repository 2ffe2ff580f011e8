//! Code generation through an OpenAI-compatible chat-completions API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ArtifactKind;

const SYSTEM_MESSAGE: &str = "You are an expert MQL5 developer creating MetaTrader 5 Expert Advisors and Indicators.";

/// What the user asked for.
#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    pub kind: ArtifactKind,
    pub description: String,
    pub strategy_details: Option<String>,
}

impl GenerationPrompt {
    pub fn render(&self) -> String {
        let kind = match self.kind {
            ArtifactKind::Ea => "EA",
            ArtifactKind::Indicator => "INDICATOR",
        };
        let details = self
            .strategy_details
            .as_deref()
            .map(|d| format!("Strategy Details: {}\n", d))
            .unwrap_or_default();

        format!(
            "Generate a MetaTrader 5 {kind} with the following requirements:\n\n\
             Description: {description}\n\
             {details}\n\
             Provide complete, production-ready MQL5 code with:\n\
             - Proper error handling\n\
             - Input parameters\n\
             - Trading logic\n\
             - Risk management\n\
             - Comments explaining the code\n\n\
             Respond ONLY with the MQL5 code, no explanations.",
            description = self.description,
        )
    }
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce MQL5 source for the prompt. Failures are not retried.
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("eaforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl CodeGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("OPENAI_API_KEY is not set, cannot generate code");
            return Err(AppError::ExternalService(
                "Code generation is not configured".into(),
            ));
        };

        let user_prompt = prompt.render();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach code generation API");
                AppError::ExternalService("Failed to generate EA".into())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Code generation API returned error");
            return Err(AppError::ExternalService("Failed to generate EA".into()));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse code generation response");
            AppError::ExternalService("Failed to generate EA".into())
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                tracing::error!("Code generation API returned no content");
                AppError::ExternalService("Failed to generate EA".into())
            })?;

        Ok(strip_code_fence(&content))
    }
}

/// Remove a single markdown fence (```mql5 ... ```) wrapping the whole reply.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line
    match body.split_once('\n') {
        Some((_, code)) => code.trim().to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```mql5\nint x;\n```"), "int x;");
        assert_eq!(strip_code_fence("```\nint x;\n```\n"), "int x;");
        assert_eq!(strip_code_fence("int x;"), "int x;");
        assert_eq!(strip_code_fence("```mql5\nunterminated"), "```mql5\nunterminated");
    }

    #[test]
    fn test_prompt_includes_details_only_when_present() {
        let mut prompt = GenerationPrompt {
            kind: ArtifactKind::Ea,
            description: "Moving average crossover".into(),
            strategy_details: None,
        };
        let rendered = prompt.render();
        assert!(rendered.starts_with("Generate a MetaTrader 5 EA"));
        assert!(rendered.contains("Description: Moving average crossover"));
        assert!(!rendered.contains("Strategy Details"));

        prompt.strategy_details = Some("Fast 10, slow 50".into());
        prompt.kind = ArtifactKind::Indicator;
        let rendered = prompt.render();
        assert!(rendered.contains("MetaTrader 5 INDICATOR"));
        assert!(rendered.contains("Strategy Details: Fast 10, slow 50"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_external_failure() {
        let generator =
            OpenAiGenerator::new(None, "http://localhost".into(), "gpt-4o".into(), 5).unwrap();
        let prompt = GenerationPrompt {
            kind: ArtifactKind::Ea,
            description: "x".into(),
            strategy_details: None,
        };
        assert!(matches!(
            generator.generate(&prompt).await,
            Err(AppError::ExternalService(_))
        ));
    }
}
