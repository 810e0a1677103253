//! Capability interfaces the social core reads and writes through.
//!
//! Implementations own persisted data and decide read consistency; callers
//! never cache or retry around them.

use std::future::Future;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use super::types::{
    Comment, CommentRecord, ConversationListing, ConversationRecord, Follow, Like, LikeRecord,
    MessageRecord, NewComment, NewMessage, NewPost, NewUser, Post, PostRecord, Repost,
    RepostRecord, User, UserChanges,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Blocking task failed: {0}")]
    Task(String),
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Row missing: {0}")]
    Missing(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a user is addressed: internal id, email or username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(Uuid),
    Email(String),
    Username(String),
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

/// Loose shape check: something, an `@`, a domain with a dot.
pub fn is_valid_email(candidate: &str) -> bool {
    email_regex().is_match(candidate)
}

impl UserLookup {
    pub fn classify(identifier: &str) -> Self {
        let identifier = identifier.trim();
        if let Ok(id) = Uuid::parse_str(identifier) {
            Self::Id(id)
        } else if is_valid_email(identifier) {
            Self::Email(identifier.to_string())
        } else {
            Self::Username(identifier.to_string())
        }
    }
}

impl From<Uuid> for UserLookup {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

pub trait UserDirectory: Send + Sync {
    fn find_user(
        &self,
        lookup: &UserLookup,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Ids of the accounts `user_id` follows.
    fn list_following(&self, user_id: Uuid) -> impl Future<Output = StoreResult<Vec<Uuid>>> + Send;

    /// Fails with [`StoreError::Constraint`] when the email or username is taken.
    fn create_user(&self, new_user: NewUser) -> impl Future<Output = StoreResult<User>> + Send;

    fn update_user(
        &self,
        user_id: Uuid,
        changes: UserChanges,
    ) -> impl Future<Output = StoreResult<User>> + Send;

    /// Removes the account and everything it authored.
    fn delete_user(&self, user_id: Uuid) -> impl Future<Output = StoreResult<User>> + Send;

    /// Case-insensitive substring match on username or name.
    fn search_users(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    /// Accounts following `user_id`, most recent follow first.
    fn followers_of(&self, user_id: Uuid) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    /// Accounts `user_id` follows, most recent follow first.
    fn followed_by(&self, user_id: Uuid) -> impl Future<Output = StoreResult<Vec<User>>> + Send;
}

pub trait PostStore: Send + Sync {
    fn find_post(&self, post_id: Uuid) -> impl Future<Output = StoreResult<Option<Post>>> + Send;

    fn create_post(&self, new_post: NewPost) -> impl Future<Output = StoreResult<Post>> + Send;

    /// Removes the post together with its likes, reposts and comments.
    fn delete_post(&self, post_id: Uuid) -> impl Future<Output = StoreResult<Post>> + Send;

    fn posts_by_authors(
        &self,
        author_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> impl Future<Output = StoreResult<Vec<PostRecord>>> + Send;

    fn reposts_by_users(
        &self,
        user_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> impl Future<Output = StoreResult<Vec<RepostRecord>>> + Send;

    fn liked_posts(
        &self,
        user_id: Uuid,
        viewer: Option<Uuid>,
    ) -> impl Future<Output = StoreResult<Vec<LikeRecord>>> + Send;

    /// Case-insensitive substring match on content, newest first.
    fn search_posts(
        &self,
        query: &str,
        limit: usize,
        viewer: Option<Uuid>,
    ) -> impl Future<Output = StoreResult<Vec<PostRecord>>> + Send;

    fn post_record(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> impl Future<Output = StoreResult<Option<PostRecord>>> + Send;

    fn comments_for_post(
        &self,
        post_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<CommentRecord>>> + Send;

    fn is_available(&self) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

pub trait InteractionStore: Send + Sync {
    fn find_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<Follow>>> + Send;
    fn create_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> impl Future<Output = StoreResult<Follow>> + Send;
    fn delete_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<Like>>> + Send;
    fn create_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> impl Future<Output = StoreResult<Like>> + Send;
    fn delete_like(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_repost(
        &self,
        repost_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<Repost>>> + Send;
    fn find_repost_by_user_and_post(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<Repost>>> + Send;
    fn create_repost(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> impl Future<Output = StoreResult<Repost>> + Send;
    fn delete_repost(&self, repost_id: Uuid) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_comment(
        &self,
        comment_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<Comment>>> + Send;
    fn create_comment(
        &self,
        new_comment: NewComment,
    ) -> impl Future<Output = StoreResult<Comment>> + Send;
    fn delete_comment(&self, comment_id: Uuid) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Direct conversations between two users and their messages.
pub trait ConversationStore: Send + Sync {
    fn find_conversation(
        &self,
        conversation_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<ConversationRecord>>> + Send;

    /// The conversation whose participants are exactly `user_id` and `other_id`.
    fn find_conversation_between(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<ConversationRecord>>> + Send;

    /// Fails with [`StoreError::Constraint`] when the pair already has one.
    fn create_conversation(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> impl Future<Output = StoreResult<ConversationRecord>> + Send;

    /// Conversations `user_id` takes part in, most recently active first.
    fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<ConversationListing>>> + Send;

    /// Messages oldest first.
    fn messages(
        &self,
        conversation_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<MessageRecord>>> + Send;

    /// Appends a message and marks the conversation as updated.
    fn create_message(
        &self,
        new_message: NewMessage,
    ) -> impl Future<Output = StoreResult<MessageRecord>> + Send;
}

/// Everything the HTTP layer needs from one backing store.
pub trait SocialBackend:
    UserDirectory + PostStore + InteractionStore + ConversationStore + Clone + Send + Sync + 'static
{
}

impl<T> SocialBackend for T where
    T: UserDirectory
        + PostStore
        + InteractionStore
        + ConversationStore
        + Clone
        + Send
        + Sync
        + 'static
{
}
