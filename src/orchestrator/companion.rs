use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

use super::context_assembly::ContextAssembler;
use super::prompt_builder::{build_prompt, estimate_tokens, SessionState};
use super::OrchestratorError;
use crate::models::internal::{
    ChatTurn, Conversation, Message, NewConversation, Role, SessionType,
};
use crate::services::completion_client::{complete_with_timeout, CompletionService};
use crate::storage::repository::{ConversationStore, EntryStore};

/// One user turn in a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendMessage {
    /// Continue this conversation; a new one is started when absent.
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub session_type: SessionType,
    /// Entry under discussion, only read when starting a conversation.
    pub entry_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub conversation: Conversation,
    pub user_message: Message,
    pub assistant_message: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationThread {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

pub struct Companion {
    entries: Arc<dyn EntryStore>,
    conversations: Arc<dyn ConversationStore>,
    completion: Arc<dyn CompletionService>,
    assembler: Arc<ContextAssembler>,
    timeout: Duration,
    max_history: usize,
}

impl Companion {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        conversations: Arc<dyn ConversationStore>,
        completion: Arc<dyn CompletionService>,
        assembler: Arc<ContextAssembler>,
        timeout: Duration,
        max_history: usize,
    ) -> Self {
        Self {
            entries,
            conversations,
            completion,
            assembler,
            timeout,
            max_history: max_history.max(1),
        }
    }

    /// Persists the user's message, asks the completion service for a reply
    /// grounded in the assembled context, and persists the reply. A failed
    /// completion leaves the user message in place and nothing else.
    pub async fn send_message(
        &self,
        user_id: &str,
        request: SendMessage,
    ) -> Result<ChatReply, OrchestratorError> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(OrchestratorError::Validation(
                "message content must not be empty".to_string(),
            ));
        }

        let conversation = self.resolve_conversation(user_id, &request).await?;

        let user_message = self
            .conversations
            .append_message(conversation.id, Role::User, content)
            .await?;

        let current_entry = match conversation.entry_id {
            Some(entry_id) => self
                .entries
                .get_entry(user_id, entry_id)
                .await?
                .map(|e| e.content),
            None => None,
        };

        let payload = self
            .assembler
            .assemble(user_id, current_entry.as_deref())
            .await?;
        let system_prompt = build_prompt(
            &payload,
            &SessionState {
                session_type: conversation.session_type,
                current_entry,
            },
        );

        let messages = self.conversations.list_messages(conversation.id).await?;
        let skip = messages.len().saturating_sub(self.max_history);
        let history: Vec<ChatTurn> = messages[skip..].iter().map(ChatTurn::from).collect();

        tracing::debug!(
            "Prompt for conversation {}: ~{} tokens, {} history turns",
            conversation.id,
            estimate_tokens(&system_prompt),
            history.len()
        );

        let reply = complete_with_timeout(
            self.completion.as_ref(),
            self.timeout,
            &system_prompt,
            &history,
        )
        .await?;

        let assistant_message = self
            .conversations
            .append_message(conversation.id, Role::Assistant, &reply)
            .await?;

        // append_message bumped updated_at; hand back the fresh row.
        let conversation = self
            .conversations
            .get_conversation(user_id, conversation.id)
            .await?
            .unwrap_or(conversation);

        Ok(ChatReply {
            conversation,
            user_message,
            assistant_message,
        })
    }

    async fn resolve_conversation(
        &self,
        user_id: &str,
        request: &SendMessage,
    ) -> Result<Conversation, OrchestratorError> {
        if let Some(id) = request.conversation_id {
            return self
                .conversations
                .get_conversation(user_id, id)
                .await?
                .ok_or_else(|| OrchestratorError::NotFound(format!("conversation {}", id)));
        }

        if let Some(entry_id) = request.entry_id {
            if self.entries.get_entry(user_id, entry_id).await?.is_none() {
                return Err(OrchestratorError::NotFound(format!("entry {}", entry_id)));
            }
        }

        let conversation = self
            .conversations
            .create_conversation(
                user_id,
                NewConversation {
                    entry_id: request.entry_id,
                    session_type: request.session_type,
                },
            )
            .await?;
        tracing::info!(
            "Started {} conversation {} for {}",
            conversation.session_type.as_str(),
            conversation.id,
            user_id
        );
        Ok(conversation)
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Conversation>, OrchestratorError> {
        Ok(self
            .conversations
            .list_conversations(user_id, limit, offset)
            .await?)
    }

    pub async fn get_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<ConversationThread, OrchestratorError> {
        let conversation = self
            .conversations
            .get_conversation(user_id, id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("conversation {}", id)))?;
        let messages = self.conversations.list_messages(id).await?;
        Ok(ConversationThread {
            conversation,
            messages,
        })
    }

    pub async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<(), OrchestratorError> {
        if self.conversations.soft_delete_conversation(user_id, id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::NotFound(format!("conversation {}", id)))
        }
    }
}
