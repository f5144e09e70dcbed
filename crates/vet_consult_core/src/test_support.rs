//! Test doubles for the language model and broadcaster ports.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ports::{Broadcaster, LanguageModelService, ModelKind, PortError, PortResult};
use crate::view::{ChatView, MessageView};

#[derive(Debug, Clone)]
pub struct ModelCall {
    pub kind: ModelKind,
    pub system_instruction: String,
    pub user_message: String,
    pub expect_json: bool,
}

/// Answers every request with the same canned reply, or fails when it has none.
pub struct ScriptedModel {
    reply: Option<String>,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LanguageModelService for ScriptedModel {
    async fn ask(
        &self,
        kind: ModelKind,
        system_instruction: &str,
        user_message: &str,
        expect_json: bool,
    ) -> PortResult<String> {
        self.calls.lock().await.push(ModelCall {
            kind,
            system_instruction: system_instruction.to_string(),
            user_message: user_message.to_string(),
            expect_json,
        });
        self.reply
            .clone()
            .ok_or_else(|| PortError::Unexpected("model unavailable".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Broadcast {
    pub chat_id: Uuid,
    pub message: MessageView,
    pub chat: Option<ChatView>,
    pub except: Option<Uuid>,
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<Broadcast>>,
}

impl RecordingBroadcaster {
    pub async fn sent(&self) -> Vec<Broadcast> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn broadcast_message(
        &self,
        chat_id: Uuid,
        message: MessageView,
        chat: Option<ChatView>,
        except: Option<Uuid>,
    ) {
        self.sent.lock().await.push(Broadcast {
            chat_id,
            message,
            chat,
            except,
        });
    }
}
