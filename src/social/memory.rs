use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{
    ConversationStore, InteractionStore, PostStore, StoreError, StoreResult, UserDirectory,
    UserLookup,
};
use super::types::{
    AuthorSummary, Comment, CommentRecord, ConversationListing, ConversationRecord, Follow, Like,
    LikeRecord, MessageRecord, NewComment, NewMessage, NewPost, NewUser, Post, PostCounts,
    PostRecord, Repost, RepostRecord, User, UserChanges, ViewerState,
};

/// Participants are kept in id order so a pair has one canonical row.
#[derive(Debug, Clone)]
struct StoredConversation {
    id: Uuid,
    first_user_id: Uuid,
    second_user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: Uuid,
    conversation_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    password_hashes: HashMap<Uuid, String>,
    follows: Vec<Follow>,
    posts: HashMap<Uuid, Post>,
    likes: Vec<Like>,
    reposts: Vec<Repost>,
    comments: Vec<Comment>,
    conversations: Vec<StoredConversation>,
    messages: Vec<StoredMessage>,
}

impl Tables {
    fn author(&self, user_id: Uuid) -> StoreResult<AuthorSummary> {
        self.users
            .get(&user_id)
            .map(User::summary)
            .ok_or_else(|| StoreError::Missing(format!("user {user_id}")))
    }

    fn record(&self, post: &Post, viewer: Option<Uuid>) -> StoreResult<PostRecord> {
        let counts = PostCounts {
            likes: self.likes.iter().filter(|l| l.post_id == post.id).count() as i64,
            comments: self.comments.iter().filter(|c| c.post_id == post.id).count() as i64,
            reposts: self.reposts.iter().filter(|r| r.post_id == post.id).count() as i64,
        };
        let viewer = viewer
            .map(|v| ViewerState {
                liked: self.likes.iter().any(|l| l.post_id == post.id && l.user_id == v),
                reposted: self
                    .reposts
                    .iter()
                    .any(|r| r.post_id == post.id && r.user_id == v),
            })
            .unwrap_or_default();
        Ok(PostRecord {
            post: post.clone(),
            author: self.author(post.author_id)?,
            counts,
            viewer,
        })
    }

    fn post(&self, post_id: Uuid) -> StoreResult<&Post> {
        self.posts
            .get(&post_id)
            .ok_or_else(|| StoreError::Missing(format!("post {post_id}")))
    }

    fn identity_taken(&self, email: &str, username: &str, except: Option<Uuid>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except && (u.email == email || u.username == username)
        })
    }

    fn conversation(&self, stored: &StoredConversation) -> StoreResult<ConversationRecord> {
        Ok(ConversationRecord {
            id: stored.id,
            participants: vec![
                self.author(stored.first_user_id)?,
                self.author(stored.second_user_id)?,
            ],
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn message(&self, stored: &StoredMessage) -> StoreResult<MessageRecord> {
        Ok(MessageRecord {
            id: stored.id,
            conversation_id: stored.conversation_id,
            content: stored.content.clone(),
            created_at: stored.created_at,
            author: self.author(stored.author_id)?,
        })
    }

    fn users_in_follow_order<F>(&self, select: F) -> Vec<User>
    where
        F: Fn(&Follow) -> Option<Uuid>,
    {
        let mut follows: Vec<&Follow> = self.follows.iter().collect();
        follows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        follows
            .into_iter()
            .filter_map(|f| select(f))
            .filter_map(|id| self.users.get(&id).cloned())
            .collect()
    }
}

/// Process-local store for tests and local runs.
///
/// Seeding helpers take explicit timestamps so ordering can be asserted
/// exactly; trait writes stamp rows with the current time.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored hash for `user_id`, if the account was created with one.
    pub async fn password_hash(&self, user_id: Uuid) -> Option<String> {
        self.tables
            .read()
            .await
            .password_hashes
            .get(&user_id)
            .cloned()
    }

    pub async fn seed_user(&self, username: &str, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.dev"),
            username: username.to_string(),
            name: name.to_string(),
            bio: None,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .users
            .insert(user.id, user.clone());
        user
    }

    pub async fn seed_follow(&self, follower_id: Uuid, following_id: Uuid) {
        self.tables.write().await.follows.push(Follow {
            follower_id,
            following_id,
            created_at: Utc::now(),
        });
    }

    pub async fn seed_post(&self, author_id: Uuid, content: &str, at: DateTime<Utc>) -> Post {
        let post = Post {
            id: Uuid::new_v4(),
            content: content.to_string(),
            author_id,
            created_at: at,
        };
        self.tables
            .write()
            .await
            .posts
            .insert(post.id, post.clone());
        post
    }

    pub async fn seed_like(&self, user_id: Uuid, post_id: Uuid, at: DateTime<Utc>) {
        self.tables.write().await.likes.push(Like {
            user_id,
            post_id,
            created_at: at,
        });
    }

    pub async fn seed_repost(&self, user_id: Uuid, post_id: Uuid, at: DateTime<Utc>) -> Repost {
        let repost = Repost {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            created_at: at,
        };
        self.tables.write().await.reposts.push(repost.clone());
        repost
    }

    pub async fn seed_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        parent_id: Option<Uuid>,
        content: &str,
        at: DateTime<Utc>,
    ) -> Comment {
        let comment = Comment {
            id: Uuid::new_v4(),
            content: content.to_string(),
            post_id,
            author_id,
            parent_id,
            created_at: at,
        };
        self.tables.write().await.comments.push(comment.clone());
        comment
    }
}

impl UserDirectory for MemoryStore {
    async fn find_user(&self, lookup: &UserLookup) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        let user = match lookup {
            UserLookup::Id(id) => tables.users.get(id),
            UserLookup::Email(email) => tables.users.values().find(|u| &u.email == email),
            UserLookup::Username(username) => {
                tables.users.values().find(|u| &u.username == username)
            }
        };
        Ok(user.cloned())
    }

    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.following_id)
            .collect())
    }

    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.identity_taken(&new_user.email, &new_user.username, None) {
            return Err(StoreError::Constraint(
                "email or username already registered".to_string(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            name: new_user.name,
            bio: new_user.bio,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        tables.password_hashes.insert(user.id, new_user.password_hash);
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let mut user = tables
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| StoreError::Missing(format!("user {user_id}")))?;
        changes.apply_to(&mut user);
        if tables.identity_taken(&user.email, &user.username, Some(user_id)) {
            return Err(StoreError::Constraint(
                "email or username already registered".to_string(),
            ));
        }
        if let Some(hash) = changes.password_hash {
            tables.password_hashes.insert(user_id, hash);
        }
        tables.users.insert(user_id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .remove(&user_id)
            .ok_or_else(|| StoreError::Missing(format!("user {user_id}")))?;
        tables.password_hashes.remove(&user_id);

        let authored: HashSet<Uuid> = tables
            .posts
            .values()
            .filter(|p| p.author_id == user_id)
            .map(|p| p.id)
            .collect();
        tables.posts.retain(|id, _| !authored.contains(id));
        tables
            .follows
            .retain(|f| f.follower_id != user_id && f.following_id != user_id);
        tables
            .likes
            .retain(|l| l.user_id != user_id && !authored.contains(&l.post_id));
        tables
            .reposts
            .retain(|r| r.user_id != user_id && !authored.contains(&r.post_id));
        tables
            .comments
            .retain(|c| c.author_id != user_id && !authored.contains(&c.post_id));

        let conversations: HashSet<Uuid> = tables
            .conversations
            .iter()
            .filter(|c| c.first_user_id == user_id || c.second_user_id == user_id)
            .map(|c| c.id)
            .collect();
        tables
            .conversations
            .retain(|c| !conversations.contains(&c.id));
        tables.messages.retain(|m| {
            m.author_id != user_id && !conversations.contains(&m.conversation_id)
        });
        Ok(user)
    }

    async fn search_users(&self, query: &str, limit: usize) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let needle = query.to_lowercase();
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users.truncate(limit);
        Ok(users)
    }

    async fn followers_of(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users_in_follow_order(|f| {
            (f.following_id == user_id).then_some(f.follower_id)
        }))
    }

    async fn followed_by(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users_in_follow_order(|f| {
            (f.follower_id == user_id).then_some(f.following_id)
        }))
    }
}

impl PostStore for MemoryStore {
    async fn find_post(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&post_id).cloned())
    }

    async fn create_post(&self, new_post: NewPost) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new_post.author_id) {
            return Err(StoreError::Constraint(format!(
                "author {} does not exist",
                new_post.author_id
            )));
        }
        let post = Post {
            id: Uuid::new_v4(),
            content: new_post.content,
            author_id: new_post.author_id,
            created_at: Utc::now(),
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        let post = tables
            .posts
            .remove(&post_id)
            .ok_or_else(|| StoreError::Missing(format!("post {post_id}")))?;
        tables.likes.retain(|l| l.post_id != post_id);
        tables.reposts.retain(|r| r.post_id != post_id);
        tables.comments.retain(|c| c.post_id != post_id);
        Ok(post)
    }

    async fn posts_by_authors(
        &self,
        author_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        let tables = self.tables.read().await;
        let authors: HashSet<&Uuid> = author_ids.iter().collect();
        let mut records = tables
            .posts
            .values()
            .filter(|p| authors.contains(&p.author_id))
            .map(|p| tables.record(p, viewer))
            .collect::<StoreResult<Vec<_>>>()?;
        records.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at));
        Ok(records)
    }

    async fn reposts_by_users(
        &self,
        user_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<RepostRecord>> {
        let tables = self.tables.read().await;
        let users: HashSet<&Uuid> = user_ids.iter().collect();
        let mut records = tables
            .reposts
            .iter()
            .filter(|r| users.contains(&r.user_id))
            .map(|r| {
                Ok(RepostRecord {
                    id: r.id,
                    reposted_by: tables.author(r.user_id)?,
                    created_at: r.created_at,
                    post: tables.record(tables.post(r.post_id)?, viewer)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn liked_posts(
        &self,
        user_id: Uuid,
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<LikeRecord>> {
        let tables = self.tables.read().await;
        let mut records = tables
            .likes
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| {
                Ok(LikeRecord {
                    liked_at: l.created_at,
                    post: tables.record(tables.post(l.post_id)?, viewer)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        records.sort_by(|a, b| b.liked_at.cmp(&a.liked_at));
        Ok(records)
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: usize,
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        let tables = self.tables.read().await;
        let needle = query.to_lowercase();
        let mut records = tables
            .posts
            .values()
            .filter(|p| p.content.to_lowercase().contains(&needle))
            .map(|p| tables.record(p, viewer))
            .collect::<StoreResult<Vec<_>>>()?;
        records.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn post_record(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> StoreResult<Option<PostRecord>> {
        let tables = self.tables.read().await;
        tables
            .posts
            .get(&post_id)
            .map(|p| tables.record(p, viewer))
            .transpose()
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<CommentRecord>> {
        let tables = self.tables.read().await;
        let mut records = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| {
                Ok(CommentRecord {
                    comment: c.clone(),
                    author: tables.author(c.author_id)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        records.sort_by(|a, b| a.comment.created_at.cmp(&b.comment.created_at));
        Ok(records)
    }
}

impl InteractionStore for MemoryStore {
    async fn find_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> StoreResult<Option<Follow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
            .cloned())
    }

    async fn create_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Follow> {
        let mut tables = self.tables.write().await;
        if tables
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id)
        {
            return Err(StoreError::Constraint("duplicate follow".to_string()));
        }
        let follow = Follow {
            follower_id,
            following_id,
            created_at: Utc::now(),
        };
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(())
    }

    async fn find_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Option<Like>> {
        let tables = self.tables.read().await;
        Ok(tables
            .likes
            .iter()
            .find(|l| l.user_id == user_id && l.post_id == post_id)
            .cloned())
    }

    async fn create_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Like> {
        let mut tables = self.tables.write().await;
        tables.post(post_id)?;
        if tables
            .likes
            .iter()
            .any(|l| l.user_id == user_id && l.post_id == post_id)
        {
            return Err(StoreError::Constraint("duplicate like".to_string()));
        }
        let like = Like {
            user_id,
            post_id,
            created_at: Utc::now(),
        };
        tables.likes.push(like.clone());
        Ok(like)
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .likes
            .retain(|l| !(l.user_id == user_id && l.post_id == post_id));
        Ok(())
    }

    async fn find_repost(&self, repost_id: Uuid) -> StoreResult<Option<Repost>> {
        let tables = self.tables.read().await;
        Ok(tables.reposts.iter().find(|r| r.id == repost_id).cloned())
    }

    async fn find_repost_by_user_and_post(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reposts
            .iter()
            .find(|r| r.user_id == user_id && r.post_id == post_id)
            .cloned())
    }

    async fn create_repost(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Repost> {
        let mut tables = self.tables.write().await;
        tables.post(post_id)?;
        if tables
            .reposts
            .iter()
            .any(|r| r.user_id == user_id && r.post_id == post_id)
        {
            return Err(StoreError::Constraint("duplicate repost".to_string()));
        }
        let repost = Repost {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            created_at: Utc::now(),
        };
        tables.reposts.push(repost.clone());
        Ok(repost)
    }

    async fn delete_repost(&self, repost_id: Uuid) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .reposts
            .retain(|r| r.id != repost_id);
        Ok(())
    }

    async fn find_comment(&self, comment_id: Uuid) -> StoreResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == comment_id).cloned())
    }

    async fn create_comment(&self, new_comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        tables.post(new_comment.post_id)?;
        let comment = Comment {
            id: Uuid::new_v4(),
            content: new_comment.content,
            post_id: new_comment.post_id,
            author_id: new_comment.author_id,
            parent_id: new_comment.parent_id,
            created_at: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .comments
            .retain(|c| c.id != comment_id);
        Ok(())
    }
}

impl ConversationStore for MemoryStore {
    async fn find_conversation(
        &self,
        conversation_id: Uuid,
    ) -> StoreResult<Option<ConversationRecord>> {
        let tables = self.tables.read().await;
        tables
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .map(|c| tables.conversation(c))
            .transpose()
    }

    async fn find_conversation_between(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> StoreResult<Option<ConversationRecord>> {
        let (first, second) = ordered_pair(user_id, other_id);
        let tables = self.tables.read().await;
        tables
            .conversations
            .iter()
            .find(|c| c.first_user_id == first && c.second_user_id == second)
            .map(|c| tables.conversation(c))
            .transpose()
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> StoreResult<ConversationRecord> {
        let (first, second) = ordered_pair(user_id, other_id);
        let mut tables = self.tables.write().await;
        if tables
            .conversations
            .iter()
            .any(|c| c.first_user_id == first && c.second_user_id == second)
        {
            return Err(StoreError::Constraint("duplicate conversation".to_string()));
        }
        if !tables.users.contains_key(&first) || !tables.users.contains_key(&second) {
            return Err(StoreError::Constraint(
                "conversation participant does not exist".to_string(),
            ));
        }
        let now = Utc::now();
        let stored = StoredConversation {
            id: Uuid::new_v4(),
            first_user_id: first,
            second_user_id: second,
            created_at: now,
            updated_at: now,
        };
        let record = tables.conversation(&stored)?;
        tables.conversations.push(stored);
        Ok(record)
    }

    async fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<ConversationListing>> {
        let tables = self.tables.read().await;
        let mut mine: Vec<&StoredConversation> = tables
            .conversations
            .iter()
            .filter(|c| c.first_user_id == user_id || c.second_user_id == user_id)
            .collect();
        mine.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        mine.into_iter()
            .map(|c| {
                let last_message = tables
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == c.id)
                    .max_by(|a, b| a.created_at.cmp(&b.created_at))
                    .map(|m| tables.message(m))
                    .transpose()?;
                Ok(ConversationListing {
                    conversation: tables.conversation(c)?,
                    last_message,
                })
            })
            .collect()
    }

    async fn messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        let tables = self.tables.read().await;
        let mut stored: Vec<&StoredMessage> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        stored.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        stored.into_iter().map(|m| tables.message(m)).collect()
    }

    async fn create_message(&self, new_message: NewMessage) -> StoreResult<MessageRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let conversation = tables
            .conversations
            .iter_mut()
            .find(|c| c.id == new_message.conversation_id)
            .ok_or_else(|| {
                StoreError::Missing(format!("conversation {}", new_message.conversation_id))
            })?;
        conversation.updated_at = now;
        let stored = StoredMessage {
            id: Uuid::new_v4(),
            conversation_id: new_message.conversation_id,
            author_id: new_message.author_id,
            content: new_message.content,
            created_at: now,
        };
        let record = tables.message(&stored)?;
        tables.messages.push(stored);
        Ok(record)
    }
}
