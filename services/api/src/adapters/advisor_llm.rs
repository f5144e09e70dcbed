//! services/api/src/adapters/advisor_llm.rs
//!
//! The adapter behind the advisory bridge. It implements the
//! `LanguageModelService` port with OpenAI chat completions and routes each
//! request to the model configured for its kind.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;
use vet_consult_core::ports::{LanguageModelService, ModelKind, PortError, PortResult};

/// Model names per request kind.
#[derive(Clone, Debug)]
pub struct AdvisorModels {
    pub summary: String,
    pub suggestion: String,
    pub medical_record: String,
}

impl AdvisorModels {
    fn for_kind(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Summary => &self.summary,
            ModelKind::Suggestion => &self.suggestion,
            ModelKind::MedicalRecord => &self.medical_record,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Without a client (no API key configured) every request fails, which the
/// advisory callers treat like any other provider outage.
#[derive(Clone)]
pub struct OpenAiAdvisorAdapter {
    client: Option<Client<OpenAIConfig>>,
    models: AdvisorModels,
}

impl OpenAiAdvisorAdapter {
    pub fn new(client: Client<OpenAIConfig>, models: AdvisorModels) -> Self {
        Self {
            client: Some(client),
            models,
        }
    }

    pub fn disabled(models: AdvisorModels) -> Self {
        Self {
            client: None,
            models,
        }
    }
}

//=========================================================================================
// `LanguageModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModelService for OpenAiAdvisorAdapter {
    async fn ask(
        &self,
        kind: ModelKind,
        system_instruction: &str,
        user_message: &str,
        expect_json: bool,
    ) -> PortResult<String> {
        let client = self.client.as_ref().ok_or_else(|| {
            PortError::Unexpected("AI assistant is not configured (OPENAI_API_KEY missing)".to_string())
        })?;

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_instruction)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let model = self.models.for_kind(kind);
        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(model).messages(messages).n(1);
        if expect_json {
            request.response_format(ResponseFormat::JsonObject);
        }
        let request = request
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(?kind, model, "Sending advisory request.");
        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Advisory model returned no text content.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> AdvisorModels {
        AdvisorModels {
            summary: "summary-model".to_string(),
            suggestion: "suggestion-model".to_string(),
            medical_record: "record-model".to_string(),
        }
    }

    #[test]
    fn routes_each_kind_to_its_model() {
        let models = models();
        assert_eq!(models.for_kind(ModelKind::Summary), "summary-model");
        assert_eq!(models.for_kind(ModelKind::Suggestion), "suggestion-model");
        assert_eq!(models.for_kind(ModelKind::MedicalRecord), "record-model");
    }

    #[tokio::test]
    async fn disabled_adapter_fails_without_calling_out() {
        let adapter = OpenAiAdvisorAdapter::disabled(models());
        let result = adapter.ask(ModelKind::Summary, "sys", "user", true).await;
        assert!(matches!(result, Err(PortError::Unexpected(_))));
    }
}
