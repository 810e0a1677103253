use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::core::shared::state::AppState;
use crate::social::{
    Comment, CommentRecord, ConversationListing, ConversationRecord, ConversationStore, Follow,
    InteractionStore, Like, LikeRecord, MemoryStore, MessageRecord, NewComment, NewMessage,
    NewPost, NewUser, Post, PostRecord, PostStore, Repost, RepostRecord, StoreError, StoreResult,
    User, UserChanges, UserDirectory, UserLookup,
};

/// A backend whose every call fails, for checking error propagation.
#[derive(Debug, Clone, Default)]
pub struct FailingStore;

fn unavailable<T>() -> StoreResult<T> {
    Err(StoreError::Task("store offline".to_string()))
}

impl UserDirectory for FailingStore {
    async fn find_user(&self, _lookup: &UserLookup) -> StoreResult<Option<User>> {
        unavailable()
    }

    async fn list_following(&self, _user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        unavailable()
    }

    async fn create_user(&self, _new_user: NewUser) -> StoreResult<User> {
        unavailable()
    }

    async fn update_user(&self, _user_id: Uuid, _changes: UserChanges) -> StoreResult<User> {
        unavailable()
    }

    async fn delete_user(&self, _user_id: Uuid) -> StoreResult<User> {
        unavailable()
    }

    async fn search_users(&self, _query: &str, _limit: usize) -> StoreResult<Vec<User>> {
        unavailable()
    }

    async fn followers_of(&self, _user_id: Uuid) -> StoreResult<Vec<User>> {
        unavailable()
    }

    async fn followed_by(&self, _user_id: Uuid) -> StoreResult<Vec<User>> {
        unavailable()
    }
}

impl PostStore for FailingStore {
    async fn find_post(&self, _post_id: Uuid) -> StoreResult<Option<Post>> {
        unavailable()
    }

    async fn create_post(&self, _new_post: NewPost) -> StoreResult<Post> {
        unavailable()
    }

    async fn delete_post(&self, _post_id: Uuid) -> StoreResult<Post> {
        unavailable()
    }

    async fn posts_by_authors(
        &self,
        _author_ids: &[Uuid],
        _viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        unavailable()
    }

    async fn reposts_by_users(
        &self,
        _user_ids: &[Uuid],
        _viewer: Option<Uuid>,
    ) -> StoreResult<Vec<RepostRecord>> {
        unavailable()
    }

    async fn liked_posts(
        &self,
        _user_id: Uuid,
        _viewer: Option<Uuid>,
    ) -> StoreResult<Vec<LikeRecord>> {
        unavailable()
    }

    async fn search_posts(
        &self,
        _query: &str,
        _limit: usize,
        _viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        unavailable()
    }

    async fn post_record(
        &self,
        _post_id: Uuid,
        _viewer: Option<Uuid>,
    ) -> StoreResult<Option<PostRecord>> {
        unavailable()
    }

    async fn comments_for_post(&self, _post_id: Uuid) -> StoreResult<Vec<CommentRecord>> {
        unavailable()
    }

    async fn is_available(&self) -> bool {
        false
    }
}

impl InteractionStore for FailingStore {
    async fn find_follow(
        &self,
        _follower_id: Uuid,
        _following_id: Uuid,
    ) -> StoreResult<Option<Follow>> {
        unavailable()
    }

    async fn create_follow(&self, _follower_id: Uuid, _following_id: Uuid) -> StoreResult<Follow> {
        unavailable()
    }

    async fn delete_follow(&self, _follower_id: Uuid, _following_id: Uuid) -> StoreResult<()> {
        unavailable()
    }

    async fn find_like(&self, _user_id: Uuid, _post_id: Uuid) -> StoreResult<Option<Like>> {
        unavailable()
    }

    async fn create_like(&self, _user_id: Uuid, _post_id: Uuid) -> StoreResult<Like> {
        unavailable()
    }

    async fn delete_like(&self, _user_id: Uuid, _post_id: Uuid) -> StoreResult<()> {
        unavailable()
    }

    async fn find_repost(&self, _repost_id: Uuid) -> StoreResult<Option<Repost>> {
        unavailable()
    }

    async fn find_repost_by_user_and_post(
        &self,
        _user_id: Uuid,
        _post_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        unavailable()
    }

    async fn create_repost(&self, _user_id: Uuid, _post_id: Uuid) -> StoreResult<Repost> {
        unavailable()
    }

    async fn delete_repost(&self, _repost_id: Uuid) -> StoreResult<()> {
        unavailable()
    }

    async fn find_comment(&self, _comment_id: Uuid) -> StoreResult<Option<Comment>> {
        unavailable()
    }

    async fn create_comment(&self, _new_comment: NewComment) -> StoreResult<Comment> {
        unavailable()
    }

    async fn delete_comment(&self, _comment_id: Uuid) -> StoreResult<()> {
        unavailable()
    }
}

impl ConversationStore for FailingStore {
    async fn find_conversation(&self, _id: Uuid) -> StoreResult<Option<ConversationRecord>> {
        unavailable()
    }

    async fn find_conversation_between(
        &self,
        _user_id: Uuid,
        _other_id: Uuid,
    ) -> StoreResult<Option<ConversationRecord>> {
        unavailable()
    }

    async fn create_conversation(
        &self,
        _user_id: Uuid,
        _other_id: Uuid,
    ) -> StoreResult<ConversationRecord> {
        unavailable()
    }

    async fn conversations_for_user(
        &self,
        _user_id: Uuid,
    ) -> StoreResult<Vec<ConversationListing>> {
        unavailable()
    }

    async fn messages(&self, _conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        unavailable()
    }

    async fn create_message(&self, _new_message: NewMessage) -> StoreResult<MessageRecord> {
        unavailable()
    }
}

/// A [`MemoryStore`] whose existence checks run before a concurrent request
/// commits the same write. Duplicate lookups by email, username, follow,
/// like and repost always miss; the first pair lookup for a conversation
/// misses; deleting a post finds it already gone.
#[derive(Debug, Clone)]
pub struct RacingStore {
    inner: MemoryStore,
    stale_conversation_read: Arc<AtomicBool>,
}

impl RacingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            stale_conversation_read: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl UserDirectory for RacingStore {
    async fn find_user(&self, lookup: &UserLookup) -> StoreResult<Option<User>> {
        match lookup {
            UserLookup::Id(_) => self.inner.find_user(lookup).await,
            UserLookup::Email(_) | UserLookup::Username(_) => Ok(None),
        }
    }

    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.inner.list_following(user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        self.inner.create_user(new_user).await
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> StoreResult<User> {
        self.inner.update_user(user_id, changes).await
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<User> {
        self.inner.delete_user(user_id).await
    }

    async fn search_users(&self, query: &str, limit: usize) -> StoreResult<Vec<User>> {
        self.inner.search_users(query, limit).await
    }

    async fn followers_of(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.inner.followers_of(user_id).await
    }

    async fn followed_by(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.inner.followed_by(user_id).await
    }
}

impl PostStore for RacingStore {
    async fn find_post(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        self.inner.find_post(post_id).await
    }

    async fn create_post(&self, new_post: NewPost) -> StoreResult<Post> {
        self.inner.create_post(new_post).await
    }

    async fn delete_post(&self, post_id: Uuid) -> StoreResult<Post> {
        Err(StoreError::Missing(format!("post {post_id}")))
    }

    async fn posts_by_authors(
        &self,
        author_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        self.inner.posts_by_authors(author_ids, viewer).await
    }

    async fn reposts_by_users(
        &self,
        user_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<RepostRecord>> {
        self.inner.reposts_by_users(user_ids, viewer).await
    }

    async fn liked_posts(
        &self,
        user_id: Uuid,
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<LikeRecord>> {
        self.inner.liked_posts(user_id, viewer).await
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: usize,
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        self.inner.search_posts(query, limit, viewer).await
    }

    async fn post_record(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> StoreResult<Option<PostRecord>> {
        self.inner.post_record(post_id, viewer).await
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<CommentRecord>> {
        self.inner.comments_for_post(post_id).await
    }
}

impl InteractionStore for RacingStore {
    async fn find_follow(
        &self,
        _follower_id: Uuid,
        _following_id: Uuid,
    ) -> StoreResult<Option<Follow>> {
        Ok(None)
    }

    async fn create_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Follow> {
        self.inner.create_follow(follower_id, following_id).await
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<()> {
        self.inner.delete_follow(follower_id, following_id).await
    }

    async fn find_like(&self, _user_id: Uuid, _post_id: Uuid) -> StoreResult<Option<Like>> {
        Ok(None)
    }

    async fn create_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Like> {
        self.inner.create_like(user_id, post_id).await
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<()> {
        self.inner.delete_like(user_id, post_id).await
    }

    async fn find_repost(&self, repost_id: Uuid) -> StoreResult<Option<Repost>> {
        self.inner.find_repost(repost_id).await
    }

    async fn find_repost_by_user_and_post(
        &self,
        _user_id: Uuid,
        _post_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        Ok(None)
    }

    async fn create_repost(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Repost> {
        self.inner.create_repost(user_id, post_id).await
    }

    async fn delete_repost(&self, repost_id: Uuid) -> StoreResult<()> {
        self.inner.delete_repost(repost_id).await
    }

    async fn find_comment(&self, comment_id: Uuid) -> StoreResult<Option<Comment>> {
        self.inner.find_comment(comment_id).await
    }

    async fn create_comment(&self, new_comment: NewComment) -> StoreResult<Comment> {
        self.inner.create_comment(new_comment).await
    }

    async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<()> {
        self.inner.delete_comment(comment_id).await
    }
}

impl ConversationStore for RacingStore {
    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<ConversationRecord>> {
        self.inner.find_conversation(id).await
    }

    async fn find_conversation_between(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> StoreResult<Option<ConversationRecord>> {
        if self.stale_conversation_read.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_conversation_between(user_id, other_id).await
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> StoreResult<ConversationRecord> {
        self.inner.create_conversation(user_id, other_id).await
    }

    async fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<ConversationListing>> {
        self.inner.conversations_for_user(user_id).await
    }

    async fn messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        self.inner.messages(conversation_id).await
    }

    async fn create_message(&self, new_message: NewMessage) -> StoreResult<MessageRecord> {
        self.inner.create_message(new_message).await
    }
}

pub fn create_test_app_state(store: MemoryStore) -> Arc<AppState<MemoryStore>> {
    Arc::new(AppState::new(None, store))
}

pub fn create_failing_app_state() -> Arc<AppState<FailingStore>> {
    Arc::new(AppState::new(None, FailingStore))
}
