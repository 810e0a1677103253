//! Timeline and post-listing composition.
//!
//! Every listing is built from store records and decorated the same way:
//! author summary, counts, and the viewer's own like/repost flags.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::{debug, info};
use uuid::Uuid;

use super::comments::build_comment_tree;
use super::store::{PostStore, UserDirectory, UserLookup};
use super::types::{FeedPost, NewPost, Post, PostDetails, Provenance};
use super::{normalize_content, SocialError};

/// Maximum number of results returned by a content search.
pub const SEARCH_PAGE_SIZE: usize = 50;

/// Effective time descending, then post id, then direct entries before
/// reposts, then reposter id.
fn timeline_order(a: &FeedPost, b: &FeedPost) -> Ordering {
    b.effective_at()
        .cmp(&a.effective_at())
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| {
            let reposter = |p: &FeedPost| p.reposted_by().map(|r| r.id);
            reposter(a).cmp(&reposter(b))
        })
}

/// Composes feeds over an injected user directory and post store. Holds no
/// state between calls.
#[derive(Debug, Clone)]
pub struct FeedComposer<D, S> {
    directory: D,
    store: S,
}

impl<D: UserDirectory, S: PostStore> FeedComposer<D, S> {
    pub fn new(directory: D, store: S) -> Self {
        Self { directory, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The viewer's own posts and those of followed accounts, plus reposts
    /// made by followed accounts. One entry per qualifying post or repost.
    pub async fn get_timeline(&self, viewer_id: Uuid) -> Result<Vec<FeedPost>, SocialError> {
        let following: HashSet<Uuid> = self
            .directory
            .list_following(viewer_id)
            .await?
            .into_iter()
            .filter(|id| *id != viewer_id)
            .collect();

        let mut authors: Vec<Uuid> = following.iter().copied().collect();
        authors.push(viewer_id);
        let reposters: Vec<Uuid> = following.iter().copied().collect();

        let posts = self
            .store
            .posts_by_authors(&authors, Some(viewer_id))
            .await?;
        let reposts = if reposters.is_empty() {
            Vec::new()
        } else {
            self.store
                .reposts_by_users(&reposters, Some(viewer_id))
                .await?
        };

        let mut entries: Vec<FeedPost> = posts
            .into_iter()
            .filter(|r| r.post.author_id == viewer_id || following.contains(&r.post.author_id))
            .map(|r| FeedPost::from_record(r, Provenance::Direct))
            .collect();
        entries.extend(
            reposts
                .into_iter()
                .filter(|r| following.contains(&r.reposted_by.id))
                .map(|r| {
                    FeedPost::from_record(
                        r.post,
                        Provenance::Reposted {
                            repost_id: r.id,
                            reposted_by: r.reposted_by,
                            reposted_at: r.created_at,
                        },
                    )
                }),
        );
        entries.sort_by(timeline_order);

        debug!(
            "Timeline for {viewer_id}: {} entries from {} followed accounts",
            entries.len(),
            following.len()
        );
        Ok(entries)
    }

    pub async fn get_posts_by_user(
        &self,
        user_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<FeedPost>, SocialError> {
        self.ensure_user_exists(user_id).await?;

        let mut posts: Vec<FeedPost> = self
            .store
            .posts_by_authors(&[user_id], Some(viewer_id))
            .await?
            .into_iter()
            .filter(|r| r.post.author_id == user_id)
            .map(|r| FeedPost::from_record(r, Provenance::Direct))
            .collect();
        posts.sort_by(timeline_order);
        Ok(posts)
    }

    /// Posts reposted by `user_id`, ordered by the repost's own time.
    pub async fn get_reposts_by_user(
        &self,
        user_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<FeedPost>, SocialError> {
        self.ensure_user_exists(user_id).await?;

        let mut posts: Vec<FeedPost> = self
            .store
            .reposts_by_users(&[user_id], Some(viewer_id))
            .await?
            .into_iter()
            .filter(|r| r.reposted_by.id == user_id)
            .map(|r| {
                FeedPost::from_record(
                    r.post,
                    Provenance::Reposted {
                        repost_id: r.id,
                        reposted_by: r.reposted_by,
                        reposted_at: r.created_at,
                    },
                )
            })
            .collect();
        posts.sort_by(timeline_order);
        Ok(posts)
    }

    /// Posts liked by `user_id`, ordered by when the like happened.
    pub async fn get_liked_posts_by_user(
        &self,
        user_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<FeedPost>, SocialError> {
        self.ensure_user_exists(user_id).await?;

        let mut posts: Vec<FeedPost> = self
            .store
            .liked_posts(user_id, Some(viewer_id))
            .await?
            .into_iter()
            .map(|r| FeedPost::from_record(r.post, Provenance::Liked { liked_at: r.liked_at }))
            .collect();
        posts.sort_by(timeline_order);
        Ok(posts)
    }

    pub async fn search_posts(
        &self,
        query: &str,
        viewer_id: Uuid,
    ) -> Result<Vec<FeedPost>, SocialError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut posts: Vec<FeedPost> = self
            .store
            .search_posts(query, SEARCH_PAGE_SIZE, Some(viewer_id))
            .await?
            .into_iter()
            .map(|r| FeedPost::from_record(r, Provenance::Direct))
            .collect();
        posts.sort_by(timeline_order);
        posts.truncate(SEARCH_PAGE_SIZE);
        Ok(posts)
    }

    pub async fn create_post(&self, content: &str, author_id: Uuid) -> Result<Post, SocialError> {
        let content = normalize_content(content, "Post content")?;
        let post = self
            .store
            .create_post(NewPost { author_id, content })
            .await?;
        info!("Post {} created by {author_id}", post.id);
        Ok(post)
    }

    /// Deletes a post owned by `current_user_id` and returns its prior state.
    pub async fn delete_post(
        &self,
        post_id: Uuid,
        current_user_id: Uuid,
    ) -> Result<Post, SocialError> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or_else(|| SocialError::NotFound("Post not found".to_string()))?;

        if post.author_id != current_user_id {
            return Err(SocialError::Forbidden(
                "You are not allowed to delete this post".to_string(),
            ));
        }

        let deleted = self
            .store
            .delete_post(post_id)
            .await
            .map_err(SocialError::not_found_on_missing("Post not found"))?;
        info!("Post {post_id} deleted by {current_user_id}");
        Ok(deleted)
    }

    pub async fn get_post_details(
        &self,
        post_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<PostDetails, SocialError> {
        let record = self
            .store
            .post_record(post_id, Some(viewer_id))
            .await?
            .ok_or_else(|| SocialError::NotFound("Post not found".to_string()))?;
        let comments = self.store.comments_for_post(post_id).await?;

        Ok(PostDetails {
            post: FeedPost::from_record(record, Provenance::Direct),
            comments: build_comment_tree(comments),
        })
    }

    async fn ensure_user_exists(&self, user_id: Uuid) -> Result<(), SocialError> {
        match self.directory.find_user(&UserLookup::Id(user_id)).await? {
            Some(_) => Ok(()),
            None => Err(SocialError::NotFound("User not found".to_string())),
        }
    }
}
