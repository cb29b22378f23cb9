// Typed facade over the worker's chat commands.
//
// Each method builds the tagged request payload, runs one exchange through
// the supervisor's call lock, and hands back the response `data`. Callers
// never touch raw command tags.

use crate::protocol::{CommandMessage, cmd};
use crate::services::compat;
use crate::services::worker::{SupervisorError, WorkerSupervisor};
use serde_json::{Value, json};
use std::sync::Arc;

/// Flashcard flavor requested from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Basic,
    Cloze,
}

impl CardType {
    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Basic => "basic",
            CardType::Cloze => "cloze",
        }
    }
}

/// Typed client for the chat worker.
///
/// Cheap to clone; every clone funnels through the same supervisor, so
/// concurrent calls still queue on the pipe's call lock.
#[derive(Clone)]
pub struct ChatAdapter {
    supervisor: Arc<WorkerSupervisor>,
}

impl ChatAdapter {
    pub fn new(supervisor: Arc<WorkerSupervisor>) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Arc<WorkerSupervisor> {
        &self.supervisor
    }

    /// Run one exchange and unwrap the response payload.
    async fn call(&self, tag: &str, data: Option<Value>) -> Result<Value, SupervisorError> {
        let request = match data {
            Some(data) => CommandMessage::with_data(tag, data),
            None => CommandMessage::new(tag),
        };
        let response = self.supervisor.call(request).await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// Ask a question against the loaded document collection.
    pub async fn ask_with_documents(&self, query: &str) -> Result<Value, SupervisorError> {
        self.call(
            cmd::ASK_CONVERSATION_DOCUMENTS,
            Some(json!({ "query": query })),
        )
        .await
    }

    /// Ask a plain conversational question.
    pub async fn ask(&self, query: &str) -> Result<Value, SupervisorError> {
        self.call(
            cmd::ASK_CONVERSATION_NO_DOCUMENTS,
            Some(json!({ "query": query })),
        )
        .await
    }

    /// Ingest previously split documents into the worker's collection.
    pub async fn add_documents(&self, documents: Vec<Value>) -> Result<Value, SupervisorError> {
        self.call(cmd::ADD_DOCUMENTS, Some(json!({ "documents": documents })))
            .await
    }

    /// Split one document into chunks on the worker side.
    pub async fn split_document(&self, path: &str) -> Result<Value, SupervisorError> {
        self.call(cmd::SPLIT_DOCUMENT, Some(json!({ "path": path })))
            .await
    }

    pub async fn explain_topic(
        &self,
        topic: &str,
        options: Value,
    ) -> Result<Value, SupervisorError> {
        self.call(
            cmd::EXPLAIN_TOPIC,
            Some(json!({ "topic": topic, "options": options })),
        )
        .await
    }

    /// Generate flashcards from source text.
    pub async fn generate_cards(
        &self,
        text: &str,
        custom_prompt: &str,
        card_type: CardType,
        language: &str,
    ) -> Result<Value, SupervisorError> {
        self.call(
            cmd::GENERATE_CARDS,
            Some(json!({
                "text": text,
                "customPrompt": custom_prompt,
                "type": card_type.as_str(),
                "language": language,
            })),
        )
        .await
    }

    pub async fn clear_conversation(&self) -> Result<Value, SupervisorError> {
        self.call(cmd::CLEAR_CONVERSATION, None).await
    }

    pub async fn delete_all_documents(&self) -> Result<Value, SupervisorError> {
        self.call(cmd::DELETE_ALL_DOCUMENTS, None).await
    }

    pub async fn set_api_key(&self, key: &str) -> Result<Value, SupervisorError> {
        self.call(cmd::SET_OPENAI_API_KEY, Some(json!({ "key": key })))
            .await
    }

    /// Select the inference model, mapping unsupported names to a
    /// compatible equivalent first.
    pub async fn set_model(&self, model: &str) -> Result<Value, SupervisorError> {
        let resolved = compat::compatible_model_name(model);
        self.call(cmd::SET_MODEL, Some(json!({ "model": resolved })))
            .await
    }
}
