use chrono::{DateTime, Utc};
use serde::ser::{SerializeSeq, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            username: self.username.clone(),
            name: self.name.clone(),
        }
    }
}

/// Account fields for an insert. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub password_hash: String,
}

/// A partial profile update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    /// `Some(None)` clears the bio.
    pub bio: Option<Option<String>>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(bio) = &self.bio {
            user.bio = bio.clone();
        }
    }
}

/// The public face of a user attached to posts and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounts {
    pub likes: i64,
    pub comments: i64,
    pub reposts: i64,
}

/// Relation of the requesting viewer to a post. All false when the read had
/// no viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerState {
    pub liked: bool,
    pub reposted: bool,
}

/// A post as the store hands it out: joined with its author and counts.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub post: Post,
    pub author: AuthorSummary,
    pub counts: PostCounts,
    pub viewer: ViewerState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepostRecord {
    pub id: Uuid,
    pub reposted_by: AuthorSummary,
    pub created_at: DateTime<Utc>,
    pub post: PostRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LikeRecord {
    pub liked_at: DateTime<Utc>,
    pub post: PostRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: AuthorSummary,
}

/// A direct conversation between two users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub participants: Vec<AuthorSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn includes(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

/// A conversation together with its newest message, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationListing {
    pub conversation: ConversationRecord,
    pub last_message: Option<MessageRecord>,
}

/// One row of a user's inbox, seen from that user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub participant: Option<AuthorSummary>,
    pub last_message: Option<MessageRecord>,
}

/// Why an entry shows up in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Direct,
    Reposted {
        repost_id: Uuid,
        reposted_by: AuthorSummary,
        reposted_at: DateTime<Utc>,
    },
    Liked {
        liked_at: DateTime<Utc>,
    },
}

/// A display-ready post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
    pub like_count: i64,
    pub comment_count: i64,
    pub repost_count: i64,
    pub is_liked: bool,
    pub is_reposted: bool,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl FeedPost {
    pub fn from_record(record: PostRecord, provenance: Provenance) -> Self {
        let PostRecord {
            post,
            author,
            counts,
            viewer,
        } = record;
        Self {
            id: post.id,
            content: post.content,
            created_at: post.created_at,
            author,
            like_count: counts.likes,
            comment_count: counts.comments,
            repost_count: counts.reposts,
            is_liked: viewer.liked,
            is_reposted: viewer.reposted,
            provenance,
        }
    }

    /// Repost or like time when the entry came from one, else creation time.
    pub fn effective_at(&self) -> DateTime<Utc> {
        match &self.provenance {
            Provenance::Direct => self.created_at,
            Provenance::Reposted { reposted_at, .. } => *reposted_at,
            Provenance::Liked { liked_at } => *liked_at,
        }
    }

    pub fn reposted_by(&self) -> Option<&AuthorSummary> {
        match &self.provenance {
            Provenance::Reposted { reposted_by, .. } => Some(reposted_by),
            _ => None,
        }
    }
}

/// Nesting levels rendered as nested `replies` before a thread is flattened.
pub const MAX_RENDERED_DEPTH: usize = 32;

/// One comment with its replies, newest first.
///
/// Serializes nested up to [`MAX_RENDERED_DEPTH`] levels. Below that, a
/// node's `replies` holds every remaining descendant in thread order, each
/// with a `parent_id` and empty `replies`.
#[derive(Debug, PartialEq)]
pub struct CommentNode {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn from_record(record: CommentRecord, replies: Vec<CommentNode>) -> Self {
        let CommentRecord { comment, author } = record;
        Self {
            id: comment.id,
            content: comment.content,
            created_at: comment.created_at,
            author,
            replies,
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.replies);
        }
        count
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.replies);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.replies);
        }
    }
}

impl Serialize for CommentNode {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        NestedView {
            node: self,
            depth: 0,
        }
        .serialize(serializer)
    }
}

struct NestedView<'a> {
    node: &'a CommentNode,
    depth: usize,
}

impl Serialize for NestedView<'_> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let node = self.node;
        let mut state = serializer.serialize_struct("CommentNode", 5)?;
        state.serialize_field("id", &node.id)?;
        state.serialize_field("content", &node.content)?;
        state.serialize_field("created_at", &node.created_at)?;
        state.serialize_field("author", &node.author)?;
        if self.depth + 1 < MAX_RENDERED_DEPTH {
            let replies: Vec<NestedView<'_>> = node
                .replies
                .iter()
                .map(|reply| NestedView {
                    node: reply,
                    depth: self.depth + 1,
                })
                .collect();
            state.serialize_field("replies", &replies)?;
        } else {
            state.serialize_field("replies", &FlattenedThread(node))?;
        }
        state.end()
    }
}

/// All descendants of a node in pre-order, without nesting.
struct FlattenedThread<'a>(&'a CommentNode);

impl Serialize for FlattenedThread<'_> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        let mut stack: Vec<(Uuid, &CommentNode)> = self
            .0
            .replies
            .iter()
            .rev()
            .map(|reply| (self.0.id, reply))
            .collect();
        while let Some((parent_id, node)) = stack.pop() {
            seq.serialize_element(&FlatComment { parent_id, node })?;
            stack.extend(node.replies.iter().rev().map(|reply| (node.id, reply)));
        }
        seq.end()
    }
}

struct FlatComment<'a> {
    parent_id: Uuid,
    node: &'a CommentNode,
}

impl Serialize for FlatComment<'_> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let node = self.node;
        let mut state = serializer.serialize_struct("CommentNode", 6)?;
        state.serialize_field("id", &node.id)?;
        state.serialize_field("parent_id", &self.parent_id)?;
        state.serialize_field("content", &node.content)?;
        state.serialize_field("created_at", &node.created_at)?;
        state.serialize_field("author", &node.author)?;
        state.serialize_field("replies", &[(); 0])?;
        state.end()
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct PostDetails {
    #[serde(flatten)]
    pub post: FeedPost,
    pub comments: Vec<CommentNode>,
}
