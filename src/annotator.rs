//! Annotation service: per-email summary, key points, action items and sentiment

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{GmailError, Result};
use crate::models::{Annotation, Sentiment};

/// External text-understanding capability producing an [`Annotation`]
///
/// Implementations may fail intermittently; callers substitute
/// [`Annotation::fallback`] rather than propagating the error.
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, content: &str, subject: &str) -> Result<Annotation>;
}

/// Shape of the JSON object the model is asked to return
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnnotation {
    summary: String,
    key_points: Vec<String>,
    action_items: Vec<String>,
    sentiment: String,
}

/// Parse a model response into an annotation
///
/// Accepts bare JSON or JSON wrapped in a Markdown code fence. Missing fields
/// default to empty; the sentiment string is validated against the enum with
/// unknown values mapped to neutral.
pub fn parse_annotation_response(text: &str) -> Result<Annotation> {
    let text = text.trim();

    let json_text = if let Some(rest) = text.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = text.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        text
    };

    let raw: RawAnnotation = serde_json::from_str(json_text).map_err(|e| {
        GmailError::AnnotationError(format!("Failed to parse model response as JSON: {}", e))
    })?;

    Ok(Annotation {
        summary: raw.summary,
        key_points: raw.key_points,
        action_items: raw.action_items,
        sentiment: Sentiment::from_label(&raw.sentiment),
    })
}

/// Build the annotation prompt, limiting the content to `max_chars` characters
pub fn build_prompt(content: &str, subject: &str, max_chars: usize) -> String {
    let content: String = content.chars().take(max_chars).collect();
    format!(
        r#"Please analyze this email and provide:
1. A concise summary (2-3 sentences)
2. Key points (bullet points)
3. Action items if any
4. Sentiment (positive/negative/neutral)

Subject: {subject}
Content: {content}

Format your response as JSON:
{{
    "summary": "brief summary",
    "key_points": ["point1", "point2"],
    "action_items": ["action1", "action2"],
    "sentiment": "positive/negative/neutral"
}}"#
    )
}

#[cfg(feature = "ml")]
pub use self::openai::OpenAiAnnotator;

#[cfg(feature = "ml")]
mod openai {
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    };
    use async_openai::Client;
    use async_trait::async_trait;
    use std::time::Duration;
    use tracing::debug;

    use super::{build_prompt, parse_annotation_response, Annotator};
    use crate::config::AnnotationConfig;
    use crate::error::{GmailError, Result};
    use crate::models::Annotation;

    /// Annotator backed by the OpenAI chat completions API
    pub struct OpenAiAnnotator {
        client: Client<OpenAIConfig>,
        model: String,
        max_tokens: u16,
        temperature: f32,
        max_content_chars: usize,
        timeout: Duration,
    }

    impl OpenAiAnnotator {
        pub fn new(api_key: &str, config: &AnnotationConfig) -> Self {
            Self {
                client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
                model: config.model.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                max_content_chars: config.max_content_chars,
                timeout: Duration::from_secs(config.timeout_secs),
            }
        }

        /// Create an annotator reading the API key from the configured
        /// environment variable
        pub fn from_env(config: &AnnotationConfig) -> Result<Self> {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                GmailError::ConfigError(format!(
                    "{} not set. Export it or add it to a .env file",
                    config.api_key_env
                ))
            })?;
            Ok(Self::new(&api_key, config))
        }

        async fn complete(&self, prompt: String) -> Result<String> {
            let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| GmailError::AnnotationError(e.to_string()))?
                .into();

            let request = CreateChatCompletionRequestArgs::default()
                .model(self.model.as_str())
                .messages(vec![message])
                .max_tokens(self.max_tokens)
                .temperature(self.temperature)
                .build()
                .map_err(|e| GmailError::AnnotationError(e.to_string()))?;

            let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
                .await
                .map_err(|_| {
                    GmailError::AnnotationError(format!(
                        "annotation request timed out after {:?}",
                        self.timeout
                    ))
                })?
                .map_err(|e| GmailError::AnnotationError(e.to_string()))?;

            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| GmailError::AnnotationError("model returned no content".to_string()))
        }
    }

    #[async_trait]
    impl Annotator for OpenAiAnnotator {
        async fn annotate(&self, content: &str, subject: &str) -> Result<Annotation> {
            let prompt = build_prompt(content, subject, self.max_content_chars);
            debug!(model = %self.model, subject, "Requesting annotation");
            let text = self.complete(prompt).await?;
            parse_annotation_response(&text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let annotation = parse_annotation_response(
            r#"{"summary": "Meeting moved", "key_points": ["Tuesday"], "action_items": ["Reply"], "sentiment": "positive"}"#,
        )
        .unwrap();

        assert_eq!(annotation.summary, "Meeting moved");
        assert_eq!(annotation.key_points, vec!["Tuesday"]);
        assert_eq!(annotation.action_items, vec!["Reply"]);
        assert_eq!(annotation.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"summary\": \"s\", \"sentiment\": \"Negative\"}\n```";
        let annotation = parse_annotation_response(text).unwrap();
        assert_eq!(annotation.summary, "s");
        assert!(annotation.key_points.is_empty());
        assert_eq!(annotation.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_parse_unknown_sentiment_is_neutral() {
        let annotation =
            parse_annotation_response(r#"{"summary": "s", "sentiment": "ecstatic"}"#).unwrap();
        assert_eq!(annotation.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_parse_malformed_output_is_an_error() {
        let err = parse_annotation_response("Sure! Here is the summary you asked for.").unwrap_err();
        assert!(matches!(err, GmailError::AnnotationError(_)));
    }

    #[test]
    fn test_prompt_truncates_content_by_chars() {
        let content = "é".repeat(5000);
        let prompt = build_prompt(&content, "Subject line", 3000);
        assert!(prompt.contains("Subject: Subject line"));
        assert_eq!(prompt.matches('é').count(), 3000);
    }

    #[cfg(feature = "ml")]
    mod openai_env {
        use crate::annotator::OpenAiAnnotator;
        use crate::config::AnnotationConfig;
        use crate::error::GmailError;
        use serial_test::serial;

        const KEY_VAR: &str = "GMAIL_DIGEST_TEST_OPENAI_KEY";

        fn config() -> AnnotationConfig {
            AnnotationConfig {
                api_key_env: KEY_VAR.to_string(),
                ..Default::default()
            }
        }

        #[test]
        #[serial]
        fn test_from_env_reads_configured_variable() {
            std::env::set_var(KEY_VAR, "sk-test");
            let result = OpenAiAnnotator::from_env(&config());
            std::env::remove_var(KEY_VAR);
            assert!(result.is_ok());
        }

        #[test]
        #[serial]
        fn test_from_env_missing_variable_is_config_error() {
            std::env::remove_var(KEY_VAR);
            match OpenAiAnnotator::from_env(&config()) {
                Err(GmailError::ConfigError(msg)) => assert!(msg.contains(KEY_VAR)),
                Err(other) => panic!("unexpected error: {}", other),
                Ok(_) => panic!("expected a missing-key error"),
            }
        }
    }
}
