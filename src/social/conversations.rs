//! Direct conversations between two users.
//!
//! Only participants may read or post; everyone else gets `Forbidden`.

use log::{debug, info};
use serde::Deserialize;
use uuid::Uuid;

use super::store::{ConversationStore, StoreError, UserDirectory, UserLookup};
use super::types::{ConversationRecord, ConversationSummary, MessageRecord, NewMessage};
use super::{normalize_text, SocialError, MAX_MESSAGE_CHARS};

#[derive(Debug, Clone, Deserialize)]
pub struct StartConversationRequest {
    pub recipient_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ConversationService<D, C> {
    directory: D,
    store: C,
}

impl<D, C> ConversationService<D, C>
where
    D: UserDirectory,
    C: ConversationStore,
{
    pub fn new(directory: D, store: C) -> Self {
        Self { directory, store }
    }

    /// Returns the pair's conversation, creating it on first contact.
    pub async fn start_or_get(
        &self,
        current_user_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<ConversationRecord, SocialError> {
        if current_user_id == recipient_id {
            return Err(SocialError::Validation(
                "You cannot start a conversation with yourself".to_string(),
            ));
        }
        if self
            .directory
            .find_user(&UserLookup::Id(recipient_id))
            .await?
            .is_none()
        {
            return Err(SocialError::NotFound("Recipient not found".to_string()));
        }

        if let Some(existing) = self
            .store
            .find_conversation_between(current_user_id, recipient_id)
            .await?
        {
            return Ok(existing);
        }

        match self
            .store
            .create_conversation(current_user_id, recipient_id)
            .await
        {
            Ok(created) => {
                info!("Conversation {} started by {current_user_id}", created.id);
                Ok(created)
            }
            // A concurrent start for the same pair won; hand back its row.
            Err(StoreError::Constraint(detail)) => {
                debug!("Conversation insert rejected: {detail}");
                self.store
                    .find_conversation_between(current_user_id, recipient_id)
                    .await?
                    .ok_or_else(|| {
                        SocialError::Conflict("Conversation could not be created".to_string())
                    })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// The user's inbox, most recently active first, each entry showing the
    /// other participant.
    pub async fn list_for_user(
        &self,
        current_user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, SocialError> {
        let listings = self.store.conversations_for_user(current_user_id).await?;
        Ok(listings
            .into_iter()
            .map(|listing| {
                let participant = listing
                    .conversation
                    .participants
                    .iter()
                    .find(|p| p.id != current_user_id)
                    .cloned();
                ConversationSummary {
                    id: listing.conversation.id,
                    updated_at: listing.conversation.updated_at,
                    participant,
                    last_message: listing.last_message,
                }
            })
            .collect())
    }

    pub async fn messages(
        &self,
        current_user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageRecord>, SocialError> {
        self.membership(current_user_id, conversation_id).await?;
        Ok(self.store.messages(conversation_id).await?)
    }

    pub async fn send_message(
        &self,
        current_user_id: Uuid,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<MessageRecord, SocialError> {
        self.membership(current_user_id, conversation_id).await?;
        let content = normalize_text(content, "Message", MAX_MESSAGE_CHARS)?;
        let message = self
            .store
            .create_message(NewMessage {
                conversation_id,
                author_id: current_user_id,
                content,
            })
            .await
            .map_err(SocialError::not_found_on_missing("Conversation not found"))?;
        debug!("Message {} sent in {conversation_id}", message.id);
        Ok(message)
    }

    async fn membership(
        &self,
        current_user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<ConversationRecord, SocialError> {
        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| SocialError::NotFound("Conversation not found".to_string()))?;
        if !conversation.includes(current_user_id) {
            return Err(SocialError::Forbidden(
                "You are not a participant in this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }
}
