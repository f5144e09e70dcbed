//! crates/vet_consult_core/src/advisory.rs
//!
//! The AI advisory bridge: summaries, reply suggestions and medical-record
//! drafts, all built on one "answer in this JSON shape" request to the
//! language model. None of these are required for messaging to work, and the
//! callers decide whether a failure is surfaced or swallowed.

const SUMMARY_INSTRUCTIONS: &str = r#"You are part of an online veterinary consultation.
Your job is to summarize the consultation so far.
Answer ONLY with a JSON object of the form {"title": "A short title for the chat", "summary": "Your summary"}."#;

const SUGGESTION_INSTRUCTIONS: &str = r#"You are part of an online veterinary consultation.
Your job is to assist the veterinarian by suggesting the next message in the consultation.
Every suggestion is reviewed by the veterinarian before it is sent to the farmer, so keep each one short.
Answer ONLY with a JSON object of the form {"answers": ["answer 1", "answer 2"]}."#;

const RECORD_INSTRUCTIONS: &str = r#"You are part of an online veterinary consultation.
Your job is to fill out the medical record for the animal discussed in the consultation.
Use the provided JSON structure. The assessment, treatment and plan must be descriptive.
"sex" is either "Male" or "Female". "dob" is a date string. "weight" is a number in kg.
Follow the format strictly. If a value cannot be found in the consultation, leave it as an empty string."#;

const RECORD_TEMPLATE: &str = r#"{
  "animalId": "Given animal ID",
  "species": "Species Name",
  "breed": "Breed Name",
  "sex": "Male",
  "dob": "2020-10-23",
  "color": "Color",
  "weight": 500,
  "assessment": "Assessment description",
  "treatment": "Recommended treatments",
  "plan": "Future checkups or future assessments"
}"#;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{error, info};

use crate::domain::{Chat, ChatSummary, MedicalRecordDraft};
use crate::ports::{LanguageModelService, ModelKind, PortError, PortResult, ProfileDirectory};
use crate::view::{render_transcript, ParticipantNames};

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("fence pattern is valid")
});

#[derive(Deserialize)]
struct AnswerSuggestions {
    answers: Vec<String>,
}

//=========================================================================================
// The Bridge
//=========================================================================================

#[derive(Clone)]
pub struct AdvisoryBridge {
    llm: Arc<dyn LanguageModelService>,
    profiles: Arc<dyn ProfileDirectory>,
}

impl AdvisoryBridge {
    pub fn new(llm: Arc<dyn LanguageModelService>, profiles: Arc<dyn ProfileDirectory>) -> Self {
        Self { llm, profiles }
    }

    /// Produces a title and summary for the consultation so far.
    pub async fn summarize(&self, chat: &Chat) -> PortResult<ChatSummary> {
        let transcript = self.transcript_of(chat).await;
        let user_message = format!(
            "Here is the consultation so far. Please provide a summary of the chat.\n\n{}",
            transcript
        );
        self.ask_json(ModelKind::Summary, SUMMARY_INSTRUCTIONS, &user_message)
            .await
    }

    /// Suggests short candidate replies for the responder.
    pub async fn suggest_replies(&self, chat: &Chat) -> PortResult<Vec<String>> {
        let transcript = self.transcript_of(chat).await;
        let user_message = format!(
            "Here is the consultation so far. Please provide suggestions for the next message.\n\n{}",
            transcript
        );
        let suggestions: AnswerSuggestions = self
            .ask_json(ModelKind::Suggestion, SUGGESTION_INSTRUCTIONS, &user_message)
            .await?;
        Ok(suggestions
            .answers
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect())
    }

    /// Extracts a medical-record draft. Any failure yields `None`; the caller
    /// falls back to a blank form.
    pub async fn draft_medical_record(&self, chat: &Chat) -> Option<MedicalRecordDraft> {
        let transcript = self.transcript_of(chat).await;
        let user_message = format!(
            "Here is the consultation so far. Please fill out the medical record for the animal strictly following the format. \
             If any information is unavailable, leave the corresponding field as an empty string:\n\n{}\n\n{}",
            RECORD_TEMPLATE, transcript
        );
        match self
            .ask_json::<serde_json::Value>(ModelKind::MedicalRecord, RECORD_INSTRUCTIONS, &user_message)
            .await
        {
            Ok(value) => {
                info!(chat_id = %chat.id, "Medical record draft generated.");
                Some(MedicalRecordDraft::from_json(&value))
            }
            Err(e) => {
                error!(chat_id = %chat.id, "Failed to draft medical record: {}", e);
                None
            }
        }
    }

    async fn transcript_of(&self, chat: &Chat) -> String {
        let names = ParticipantNames::resolve(self.profiles.as_ref(), &chat.participants).await;
        render_transcript(chat, &names).to_text()
    }

    async fn ask_json<T: DeserializeOwned>(
        &self,
        kind: ModelKind,
        instructions: &str,
        user_message: &str,
    ) -> PortResult<T> {
        let raw = self.llm.ask(kind, instructions, user_message, true).await?;
        parse_json_reply(&raw)
    }
}

/// Parses a model reply as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> PortResult<T> {
    let body = match JSON_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    };
    serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("Model reply was not the expected JSON: {}", e)))
}
