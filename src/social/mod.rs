pub mod api;
pub mod comments;
pub mod conversations;
pub mod extract;
pub mod feed;
pub mod interactions;
pub mod memory;
pub mod password;
pub mod pg_store;
pub mod store;
pub mod types;
pub mod users;

use axum::{http::StatusCode, response::IntoResponse, Json};
use log::{debug, error};

pub use comments::build_comment_tree;
pub use conversations::ConversationService;
pub use feed::FeedComposer;
pub use interactions::{InteractionService, NewCommentRequest};
pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use store::{
    ConversationStore, InteractionStore, PostStore, SocialBackend, StoreError, StoreResult,
    UserDirectory, UserLookup,
};
pub use types::*;
pub use users::{CreateUserRequest, UpdateUserRequest, UserService};

/// Upper bound on post and comment length, in Unicode code points.
pub const MAX_CONTENT_CHARS: usize = 280;

/// Upper bound on direct message length, in Unicode code points.
pub const MAX_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for SocialError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg) => {
                debug!("Rejected request ({status}): {msg}");
                msg.clone()
            }
            Self::Internal(msg) => {
                error!("Internal failure: {msg}");
                "Internal server error".to_string()
            }
            Self::Store(e) => {
                error!("Store failure: {e}");
                "Internal storage error".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl SocialError {
    /// Store failure from a write that an identical concurrent write can
    /// beat. The losing side sees the uniqueness violation as a conflict.
    pub(crate) fn conflict_on_constraint(message: &'static str) -> impl Fn(StoreError) -> Self {
        move |err| match err {
            StoreError::Constraint(detail) => {
                debug!("Write rejected by constraint: {detail}");
                Self::Conflict(message.to_string())
            }
            other => Self::Store(other),
        }
    }

    /// Store failure from a write whose target a concurrent delete removed.
    pub(crate) fn not_found_on_missing(message: &'static str) -> impl Fn(StoreError) -> Self {
        move |err| match err {
            StoreError::Missing(detail) => {
                debug!("Write target vanished: {detail}");
                Self::NotFound(message.to_string())
            }
            other => Self::Store(other),
        }
    }
}

/// Trims `raw` and checks it is non-empty and at most [`MAX_CONTENT_CHARS`]
/// code points. `what` names the content in error messages.
pub fn normalize_content(raw: &str, what: &str) -> Result<String, SocialError> {
    normalize_text(raw, what, MAX_CONTENT_CHARS)
}

pub fn normalize_text(raw: &str, what: &str, max_chars: usize) -> Result<String, SocialError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SocialError::Validation(format!("{what} cannot be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(SocialError::Validation(format!(
            "{what} must be at most {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}
