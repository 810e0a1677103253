//! Postgres implementation of the social store traits.
//!
//! Each call checks a connection out of the r2d2 pool and runs on the
//! blocking thread pool. Multi-statement reads run in a read-only
//! repeatable-read transaction so counts and joins see one snapshot.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::PgConnection;
use uuid::Uuid;

use crate::core::shared::schema::{
    comments, conversations, follows, likes, messages, posts, reposts, users,
};
use crate::core::shared::utils::DbPool;

use super::store::{
    ConversationStore, InteractionStore, PostStore, StoreError, StoreResult, UserDirectory,
    UserLookup,
};
use super::types::{
    AuthorSummary, Comment, CommentRecord, ConversationListing, ConversationRecord, Follow, Like,
    LikeRecord, MessageRecord, NewComment, NewMessage, NewPost, NewUser, Post, PostCounts,
    PostRecord, Repost, RepostRecord, User, UserChanges, ViewerState,
};

#[derive(Debug, Clone, Queryable)]
struct DbUser {
    id: Uuid,
    email: String,
    username: String,
    name: String,
    bio: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
struct DbNewUser {
    id: Uuid,
    email: String,
    username: String,
    name: String,
    bio: Option<String>,
    created_at: DateTime<Utc>,
    password_hash: String,
}

/// `None` fields are left out of the UPDATE; `bio: Some(None)` writes NULL.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
struct DbUserChanges {
    email: Option<String>,
    username: Option<String>,
    name: Option<String>,
    bio: Option<Option<String>>,
    password_hash: Option<String>,
}

impl DbUserChanges {
    fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.name.is_none()
            && self.bio.is_none()
            && self.password_hash.is_none()
    }
}

impl From<UserChanges> for DbUserChanges {
    fn from(changes: UserChanges) -> Self {
        Self {
            email: changes.email,
            username: changes.username,
            name: changes.name,
            bio: changes.bio,
            password_hash: changes.password_hash,
        }
    }
}

#[derive(Debug, Clone, Queryable)]
struct DbAuthor {
    id: Uuid,
    username: String,
    name: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = posts)]
struct DbPost {
    id: Uuid,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = follows)]
struct DbFollow {
    follower_id: Uuid,
    following_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = likes)]
struct DbLike {
    user_id: Uuid,
    post_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = reposts)]
struct DbRepost {
    id: Uuid,
    user_id: Uuid,
    post_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = comments)]
struct DbComment {
    id: Uuid,
    content: String,
    post_id: Uuid,
    author_id: Uuid,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = conversations)]
struct DbConversation {
    id: Uuid,
    first_user_id: Uuid,
    second_user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = messages)]
struct DbMessage {
    id: Uuid,
    conversation_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

const USER_COLUMNS: (
    users::id,
    users::email,
    users::username,
    users::name,
    users::bio,
    users::created_at,
) = (
    users::id,
    users::email,
    users::username,
    users::name,
    users::bio,
    users::created_at,
);

const MESSAGE_COLUMNS: (
    messages::id,
    messages::conversation_id,
    messages::author_id,
    messages::content,
    messages::created_at,
) = (
    messages::id,
    messages::conversation_id,
    messages::author_id,
    messages::content,
    messages::created_at,
);

const POST_COLUMNS: (posts::id, posts::content, posts::author_id, posts::created_at) =
    (posts::id, posts::content, posts::author_id, posts::created_at);

const AUTHOR_COLUMNS: (users::id, users::username, users::name) =
    (users::id, users::username, users::name);

const COMMENT_COLUMNS: (
    comments::id,
    comments::content,
    comments::post_id,
    comments::author_id,
    comments::parent_id,
    comments::created_at,
) = (
    comments::id,
    comments::content,
    comments::post_id,
    comments::author_id,
    comments::parent_id,
    comments::created_at,
);

impl From<DbUser> for User {
    fn from(db: DbUser) -> Self {
        User {
            id: db.id,
            email: db.email,
            username: db.username,
            name: db.name,
            bio: db.bio,
            created_at: db.created_at,
        }
    }
}

impl From<DbAuthor> for AuthorSummary {
    fn from(db: DbAuthor) -> Self {
        AuthorSummary {
            id: db.id,
            username: db.username,
            name: db.name,
        }
    }
}

impl From<DbPost> for Post {
    fn from(db: DbPost) -> Self {
        Post {
            id: db.id,
            content: db.content,
            author_id: db.author_id,
            created_at: db.created_at,
        }
    }
}

impl From<DbFollow> for Follow {
    fn from(db: DbFollow) -> Self {
        Follow {
            follower_id: db.follower_id,
            following_id: db.following_id,
            created_at: db.created_at,
        }
    }
}

impl From<DbLike> for Like {
    fn from(db: DbLike) -> Self {
        Like {
            user_id: db.user_id,
            post_id: db.post_id,
            created_at: db.created_at,
        }
    }
}

impl From<DbRepost> for Repost {
    fn from(db: DbRepost) -> Self {
        Repost {
            id: db.id,
            user_id: db.user_id,
            post_id: db.post_id,
            created_at: db.created_at,
        }
    }
}

impl From<DbComment> for Comment {
    fn from(db: DbComment) -> Self {
        Comment {
            id: db.id,
            content: db.content,
            post_id: db.post_id,
            author_id: db.author_id,
            parent_id: db.parent_id,
            created_at: db.created_at,
        }
    }
}

fn message_record(message: DbMessage, author: DbAuthor) -> MessageRecord {
    MessageRecord {
        id: message.id,
        conversation_id: message.conversation_id,
        content: message.content,
        created_at: message.created_at,
        author: author.into(),
    }
}

fn write_error(e: DieselError) -> StoreError {
    match e {
        DieselError::DatabaseError(
            kind @ (DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation),
            info,
        ) => StoreError::Constraint(format!("{kind:?}: {}", info.message())),
        other => StoreError::Database(other),
    }
}

/// Escapes LIKE metacharacters so user input matches literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn count_map(rows: Vec<(Uuid, i64)>) -> HashMap<Uuid, i64> {
    rows.into_iter().collect()
}

/// Attaches counts and viewer flags to joined post/author rows, keeping
/// row order.
fn decorate(
    conn: &mut PgConnection,
    rows: Vec<(DbPost, DbAuthor)>,
    viewer: Option<Uuid>,
) -> StoreResult<Vec<PostRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|(p, _)| p.id).collect();

    let like_counts = count_map(
        likes::table
            .filter(likes::post_id.eq_any(&ids))
            .group_by(likes::post_id)
            .select((likes::post_id, count_star()))
            .load(conn)?,
    );
    let comment_counts = count_map(
        comments::table
            .filter(comments::post_id.eq_any(&ids))
            .group_by(comments::post_id)
            .select((comments::post_id, count_star()))
            .load(conn)?,
    );
    let repost_counts = count_map(
        reposts::table
            .filter(reposts::post_id.eq_any(&ids))
            .group_by(reposts::post_id)
            .select((reposts::post_id, count_star()))
            .load(conn)?,
    );

    let (liked, reposted): (HashSet<Uuid>, HashSet<Uuid>) = match viewer {
        Some(viewer_id) => (
            likes::table
                .filter(likes::user_id.eq(viewer_id))
                .filter(likes::post_id.eq_any(&ids))
                .select(likes::post_id)
                .load::<Uuid>(conn)?
                .into_iter()
                .collect(),
            reposts::table
                .filter(reposts::user_id.eq(viewer_id))
                .filter(reposts::post_id.eq_any(&ids))
                .select(reposts::post_id)
                .load::<Uuid>(conn)?
                .into_iter()
                .collect(),
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    Ok(rows
        .into_iter()
        .map(|(post, author)| {
            let id = post.id;
            PostRecord {
                post: post.into(),
                author: author.into(),
                counts: PostCounts {
                    likes: like_counts.get(&id).copied().unwrap_or(0),
                    comments: comment_counts.get(&id).copied().unwrap_or(0),
                    reposts: repost_counts.get(&id).copied().unwrap_or(0),
                },
                viewer: ViewerState {
                    liked: liked.contains(&id),
                    reposted: reposted.contains(&id),
                },
            }
        })
        .collect())
}

/// Decorated records for `post_ids`, keyed by post id.
fn records_by_id(
    conn: &mut PgConnection,
    post_ids: &[Uuid],
    viewer: Option<Uuid>,
) -> StoreResult<HashMap<Uuid, PostRecord>> {
    let rows = posts::table
        .inner_join(users::table)
        .filter(posts::id.eq_any(post_ids))
        .select((POST_COLUMNS, AUTHOR_COLUMNS))
        .load::<(DbPost, DbAuthor)>(conn)?;
    Ok(decorate(conn, rows, viewer)?
        .into_iter()
        .map(|r| (r.post.id, r))
        .collect())
}

/// Attaches participant summaries, keeping row order.
fn conversation_records(
    conn: &mut PgConnection,
    rows: Vec<DbConversation>,
) -> StoreResult<Vec<ConversationRecord>> {
    let user_ids: Vec<Uuid> = rows
        .iter()
        .flat_map(|c| [c.first_user_id, c.second_user_id])
        .collect();
    let authors: HashMap<Uuid, AuthorSummary> = users::table
        .filter(users::id.eq_any(&user_ids))
        .select(AUTHOR_COLUMNS)
        .load::<DbAuthor>(conn)?
        .into_iter()
        .map(|a| (a.id, a.into()))
        .collect();
    let author = |id: Uuid| {
        authors
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::Missing(format!("user {id}")))
    };

    rows.into_iter()
        .map(|c| {
            Ok(ConversationRecord {
                id: c.id,
                participants: vec![author(c.first_user_id)?, author(c.second_user_id)?],
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
        })
        .collect()
}

fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn read_snapshot<T, F>(conn: &mut PgConnection, f: F) -> StoreResult<T>
where
    F: FnOnce(&mut PgConnection) -> StoreResult<T>,
{
    conn.build_transaction().read_only().repeatable_read().run(f)
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

impl UserDirectory for PgStore {
    async fn find_user(&self, lookup: &UserLookup) -> StoreResult<Option<User>> {
        let lookup = lookup.clone();
        self.run(move |conn| {
            let query = users::table.select(USER_COLUMNS).into_boxed();
            let query = match lookup {
                UserLookup::Id(id) => query.filter(users::id.eq(id)),
                UserLookup::Email(email) => query.filter(users::email.eq(email)),
                UserLookup::Username(username) => query.filter(users::username.eq(username)),
            };
            Ok(query.first::<DbUser>(conn).optional()?.map(User::from))
        })
        .await
    }

    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.run(move |conn| {
            Ok(follows::table
                .filter(follows::follower_id.eq(user_id))
                .select(follows::following_id)
                .load::<Uuid>(conn)?)
        })
        .await
    }

    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        self.run(move |conn| {
            let row = DbNewUser {
                id: Uuid::new_v4(),
                email: new_user.email,
                username: new_user.username,
                name: new_user.name,
                bio: new_user.bio,
                created_at: Utc::now(),
                password_hash: new_user.password_hash,
            };
            diesel::insert_into(users::table)
                .values(&row)
                .execute(conn)
                .map_err(write_error)?;
            Ok(User {
                id: row.id,
                email: row.email,
                username: row.username,
                name: row.name,
                bio: row.bio,
                created_at: row.created_at,
            })
        })
        .await
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let changes = DbUserChanges::from(changes);
        self.run(move |conn| {
            let row = if changes.is_empty() {
                users::table
                    .find(user_id)
                    .select(USER_COLUMNS)
                    .first::<DbUser>(conn)
                    .optional()?
            } else {
                diesel::update(users::table.find(user_id))
                    .set(&changes)
                    .returning(USER_COLUMNS)
                    .get_result::<DbUser>(conn)
                    .optional()
                    .map_err(write_error)?
            };
            row.map(User::from)
                .ok_or_else(|| StoreError::Missing(format!("user {user_id}")))
        })
        .await
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<User> {
        self.run(move |conn| {
            diesel::delete(users::table.find(user_id))
                .returning(USER_COLUMNS)
                .get_result::<DbUser>(conn)
                .optional()?
                .map(User::from)
                .ok_or_else(|| StoreError::Missing(format!("user {user_id}")))
        })
        .await
    }

    async fn search_users(&self, query: &str, limit: usize) -> StoreResult<Vec<User>> {
        let pattern = like_pattern(query);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            Ok(users::table
                .filter(
                    users::username
                        .ilike(pattern.clone())
                        .or(users::name.ilike(pattern)),
                )
                .order(users::username.asc())
                .limit(limit)
                .select(USER_COLUMNS)
                .load::<DbUser>(conn)?
                .into_iter()
                .map(User::from)
                .collect())
        })
        .await
    }

    async fn followers_of(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.run(move |conn| {
            Ok(follows::table
                .inner_join(users::table.on(users::id.eq(follows::follower_id)))
                .filter(follows::following_id.eq(user_id))
                .order(follows::created_at.desc())
                .select(USER_COLUMNS)
                .load::<DbUser>(conn)?
                .into_iter()
                .map(User::from)
                .collect())
        })
        .await
    }

    async fn followed_by(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.run(move |conn| {
            Ok(follows::table
                .inner_join(users::table.on(users::id.eq(follows::following_id)))
                .filter(follows::follower_id.eq(user_id))
                .order(follows::created_at.desc())
                .select(USER_COLUMNS)
                .load::<DbUser>(conn)?
                .into_iter()
                .map(User::from)
                .collect())
        })
        .await
    }
}

impl PostStore for PgStore {
    async fn find_post(&self, post_id: Uuid) -> StoreResult<Option<Post>> {
        self.run(move |conn| {
            Ok(posts::table
                .find(post_id)
                .first::<DbPost>(conn)
                .optional()?
                .map(Post::from))
        })
        .await
    }

    async fn create_post(&self, new_post: NewPost) -> StoreResult<Post> {
        self.run(move |conn| {
            let db_post = DbPost {
                id: Uuid::new_v4(),
                content: new_post.content,
                author_id: new_post.author_id,
                created_at: Utc::now(),
            };
            diesel::insert_into(posts::table)
                .values(&db_post)
                .execute(conn)
                .map_err(write_error)?;
            Ok(db_post.into())
        })
        .await
    }

    async fn delete_post(&self, post_id: Uuid) -> StoreResult<Post> {
        self.run(move |conn| {
            diesel::delete(posts::table.find(post_id))
                .get_result::<DbPost>(conn)
                .optional()?
                .map(Post::from)
                .ok_or_else(|| StoreError::Missing(format!("post {post_id}")))
        })
        .await
    }

    async fn posts_by_authors(
        &self,
        author_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let author_ids = author_ids.to_vec();
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let rows = posts::table
                    .inner_join(users::table)
                    .filter(posts::author_id.eq_any(&author_ids))
                    .order((posts::created_at.desc(), posts::id.asc()))
                    .select((POST_COLUMNS, AUTHOR_COLUMNS))
                    .load::<(DbPost, DbAuthor)>(conn)?;
                decorate(conn, rows, viewer)
            })
        })
        .await
    }

    async fn reposts_by_users(
        &self,
        user_ids: &[Uuid],
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<RepostRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let user_ids = user_ids.to_vec();
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let rows = reposts::table
                    .filter(reposts::user_id.eq_any(&user_ids))
                    .order((reposts::created_at.desc(), reposts::id.asc()))
                    .load::<DbRepost>(conn)?;
                if rows.is_empty() {
                    return Ok(Vec::new());
                }

                let post_ids: Vec<Uuid> = rows.iter().map(|r| r.post_id).collect();
                let records = records_by_id(conn, &post_ids, viewer)?;
                let reposters: HashMap<Uuid, AuthorSummary> = users::table
                    .filter(users::id.eq_any(&user_ids))
                    .select(AUTHOR_COLUMNS)
                    .load::<DbAuthor>(conn)?
                    .into_iter()
                    .map(|a| (a.id, a.into()))
                    .collect();

                rows.into_iter()
                    .map(|r| {
                        let post = records
                            .get(&r.post_id)
                            .cloned()
                            .ok_or_else(|| StoreError::Missing(format!("post {}", r.post_id)))?;
                        let reposted_by = reposters
                            .get(&r.user_id)
                            .cloned()
                            .ok_or_else(|| StoreError::Missing(format!("user {}", r.user_id)))?;
                        Ok(RepostRecord {
                            id: r.id,
                            reposted_by,
                            created_at: r.created_at,
                            post,
                        })
                    })
                    .collect::<StoreResult<Vec<_>>>()
            })
        })
        .await
    }

    async fn liked_posts(
        &self,
        user_id: Uuid,
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<LikeRecord>> {
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let rows = likes::table
                    .filter(likes::user_id.eq(user_id))
                    .order((likes::created_at.desc(), likes::post_id.asc()))
                    .select((likes::post_id, likes::created_at))
                    .load::<(Uuid, DateTime<Utc>)>(conn)?;
                let post_ids: Vec<Uuid> = rows.iter().map(|(id, _)| *id).collect();
                let mut records = records_by_id(conn, &post_ids, viewer)?;

                rows.into_iter()
                    .map(|(post_id, liked_at)| {
                        let post = records
                            .remove(&post_id)
                            .ok_or_else(|| StoreError::Missing(format!("post {post_id}")))?;
                        Ok(LikeRecord { liked_at, post })
                    })
                    .collect::<StoreResult<Vec<_>>>()
            })
        })
        .await
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: usize,
        viewer: Option<Uuid>,
    ) -> StoreResult<Vec<PostRecord>> {
        let pattern = like_pattern(query);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let rows = posts::table
                    .inner_join(users::table)
                    .filter(posts::content.ilike(pattern))
                    .order((posts::created_at.desc(), posts::id.asc()))
                    .limit(limit)
                    .select((POST_COLUMNS, AUTHOR_COLUMNS))
                    .load::<(DbPost, DbAuthor)>(conn)?;
                decorate(conn, rows, viewer)
            })
        })
        .await
    }

    async fn post_record(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> StoreResult<Option<PostRecord>> {
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let row = posts::table
                    .inner_join(users::table)
                    .filter(posts::id.eq(post_id))
                    .select((POST_COLUMNS, AUTHOR_COLUMNS))
                    .first::<(DbPost, DbAuthor)>(conn)
                    .optional()?;
                match row {
                    Some(row) => Ok(decorate(conn, vec![row], viewer)?.pop()),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<CommentRecord>> {
        self.run(move |conn| {
            Ok(comments::table
                .inner_join(users::table)
                .filter(comments::post_id.eq(post_id))
                .order((comments::created_at.asc(), comments::id.asc()))
                .select((COMMENT_COLUMNS, AUTHOR_COLUMNS))
                .load::<(DbComment, DbAuthor)>(conn)?
                .into_iter()
                .map(|(comment, author)| CommentRecord {
                    comment: comment.into(),
                    author: author.into(),
                })
                .collect())
        })
        .await
    }

    async fn is_available(&self) -> bool {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.get().is_ok())
            .await
            .unwrap_or(false)
    }
}

impl InteractionStore for PgStore {
    async fn find_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> StoreResult<Option<Follow>> {
        self.run(move |conn| {
            Ok(follows::table
                .find((follower_id, following_id))
                .first::<DbFollow>(conn)
                .optional()?
                .map(Follow::from))
        })
        .await
    }

    async fn create_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Follow> {
        self.run(move |conn| {
            let row = DbFollow {
                follower_id,
                following_id,
                created_at: Utc::now(),
            };
            diesel::insert_into(follows::table)
                .values(&row)
                .execute(conn)
                .map_err(write_error)?;
            Ok(row.into())
        })
        .await
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::delete(follows::table.find((follower_id, following_id))).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Option<Like>> {
        self.run(move |conn| {
            Ok(likes::table
                .find((user_id, post_id))
                .first::<DbLike>(conn)
                .optional()?
                .map(Like::from))
        })
        .await
    }

    async fn create_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Like> {
        self.run(move |conn| {
            let row = DbLike {
                user_id,
                post_id,
                created_at: Utc::now(),
            };
            diesel::insert_into(likes::table)
                .values(&row)
                .execute(conn)
                .map_err(write_error)?;
            Ok(row.into())
        })
        .await
    }

    async fn delete_like(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::delete(likes::table.find((user_id, post_id))).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_repost(&self, repost_id: Uuid) -> StoreResult<Option<Repost>> {
        self.run(move |conn| {
            Ok(reposts::table
                .find(repost_id)
                .first::<DbRepost>(conn)
                .optional()?
                .map(Repost::from))
        })
        .await
    }

    async fn find_repost_by_user_and_post(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        self.run(move |conn| {
            Ok(reposts::table
                .filter(reposts::user_id.eq(user_id))
                .filter(reposts::post_id.eq(post_id))
                .first::<DbRepost>(conn)
                .optional()?
                .map(Repost::from))
        })
        .await
    }

    async fn create_repost(&self, user_id: Uuid, post_id: Uuid) -> StoreResult<Repost> {
        self.run(move |conn| {
            let row = DbRepost {
                id: Uuid::new_v4(),
                user_id,
                post_id,
                created_at: Utc::now(),
            };
            diesel::insert_into(reposts::table)
                .values(&row)
                .execute(conn)
                .map_err(write_error)?;
            Ok(row.into())
        })
        .await
    }

    async fn delete_repost(&self, repost_id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::delete(reposts::table.find(repost_id)).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_comment(&self, comment_id: Uuid) -> StoreResult<Option<Comment>> {
        self.run(move |conn| {
            Ok(comments::table
                .find(comment_id)
                .select(COMMENT_COLUMNS)
                .first::<DbComment>(conn)
                .optional()?
                .map(Comment::from))
        })
        .await
    }

    async fn create_comment(&self, new_comment: NewComment) -> StoreResult<Comment> {
        self.run(move |conn| {
            let row = DbComment {
                id: Uuid::new_v4(),
                content: new_comment.content,
                post_id: new_comment.post_id,
                author_id: new_comment.author_id,
                parent_id: new_comment.parent_id,
                created_at: Utc::now(),
            };
            diesel::insert_into(comments::table)
                .values(&row)
                .execute(conn)
                .map_err(write_error)?;
            Ok(row.into())
        })
        .await
    }

    async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::delete(comments::table.find(comment_id)).execute(conn)?;
            Ok(())
        })
        .await
    }
}

impl ConversationStore for PgStore {
    async fn find_conversation(
        &self,
        conversation_id: Uuid,
    ) -> StoreResult<Option<ConversationRecord>> {
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let row = conversations::table
                    .find(conversation_id)
                    .first::<DbConversation>(conn)
                    .optional()?;
                match row {
                    Some(row) => Ok(conversation_records(conn, vec![row])?.pop()),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn find_conversation_between(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> StoreResult<Option<ConversationRecord>> {
        let (first, second) = ordered_pair(user_id, other_id);
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let row = conversations::table
                    .filter(conversations::first_user_id.eq(first))
                    .filter(conversations::second_user_id.eq(second))
                    .first::<DbConversation>(conn)
                    .optional()?;
                match row {
                    Some(row) => Ok(conversation_records(conn, vec![row])?.pop()),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> StoreResult<ConversationRecord> {
        let (first, second) = ordered_pair(user_id, other_id);
        self.run(move |conn| {
            let now = Utc::now();
            let row = DbConversation {
                id: Uuid::new_v4(),
                first_user_id: first,
                second_user_id: second,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(conversations::table)
                .values(&row)
                .execute(conn)
                .map_err(write_error)?;
            let id = row.id;
            conversation_records(conn, vec![row])?
                .pop()
                .ok_or_else(|| StoreError::Missing(format!("conversation {id}")))
        })
        .await
    }

    async fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<ConversationListing>> {
        self.run(move |conn| {
            read_snapshot(conn, |conn| {
                let rows = conversations::table
                    .filter(
                        conversations::first_user_id
                            .eq(user_id)
                            .or(conversations::second_user_id.eq(user_id)),
                    )
                    .order((conversations::updated_at.desc(), conversations::id.asc()))
                    .load::<DbConversation>(conn)?;
                if rows.is_empty() {
                    return Ok(Vec::new());
                }

                let ids: Vec<Uuid> = rows.iter().map(|c| c.id).collect();
                let mut latest: HashMap<Uuid, MessageRecord> = messages::table
                    .inner_join(users::table)
                    .filter(messages::conversation_id.eq_any(&ids))
                    .distinct_on(messages::conversation_id)
                    .order((messages::conversation_id, messages::created_at.desc()))
                    .select((MESSAGE_COLUMNS, AUTHOR_COLUMNS))
                    .load::<(DbMessage, DbAuthor)>(conn)?
                    .into_iter()
                    .map(|(message, author)| {
                        (message.conversation_id, message_record(message, author))
                    })
                    .collect();

                Ok(conversation_records(conn, rows)?
                    .into_iter()
                    .map(|conversation| ConversationListing {
                        last_message: latest.remove(&conversation.id),
                        conversation,
                    })
                    .collect())
            })
        })
        .await
    }

    async fn messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        self.run(move |conn| {
            Ok(messages::table
                .inner_join(users::table)
                .filter(messages::conversation_id.eq(conversation_id))
                .order((messages::created_at.asc(), messages::id.asc()))
                .select((MESSAGE_COLUMNS, AUTHOR_COLUMNS))
                .load::<(DbMessage, DbAuthor)>(conn)?
                .into_iter()
                .map(|(message, author)| message_record(message, author))
                .collect())
        })
        .await
    }

    async fn create_message(&self, new_message: NewMessage) -> StoreResult<MessageRecord> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let now = Utc::now();
                let touched = diesel::update(conversations::table.find(new_message.conversation_id))
                    .set(conversations::updated_at.eq(now))
                    .execute(conn)?;
                if touched == 0 {
                    return Err(StoreError::Missing(format!(
                        "conversation {}",
                        new_message.conversation_id
                    )));
                }

                let row = DbMessage {
                    id: Uuid::new_v4(),
                    conversation_id: new_message.conversation_id,
                    author_id: new_message.author_id,
                    content: new_message.content,
                    created_at: now,
                };
                diesel::insert_into(messages::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(write_error)?;
                let author = users::table
                    .find(row.author_id)
                    .select(AUTHOR_COLUMNS)
                    .first::<DbAuthor>(conn)?;
                Ok(message_record(row, author))
            })
        })
        .await
    }
}
