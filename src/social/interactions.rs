//! Follow, like, repost and comment mutations.
//!
//! Each operation checks existence and ownership first, then issues one
//! store write. A duplicate that slips past the check between the two is
//! still reported as a conflict.

use log::info;
use serde::Deserialize;
use uuid::Uuid;

use super::store::{InteractionStore, PostStore, UserDirectory, UserLookup};
use super::types::{Comment, Follow, Like, NewComment, Repost};
use super::{normalize_content, SocialError};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCommentRequest {
    pub post_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct InteractionService<D, S> {
    directory: D,
    store: S,
}

impl<D, S> InteractionService<D, S>
where
    D: UserDirectory,
    S: PostStore + InteractionStore,
{
    pub fn new(directory: D, store: S) -> Self {
        Self { directory, store }
    }

    pub async fn follow_user(
        &self,
        current_user_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<Follow, SocialError> {
        if current_user_id == target_user_id {
            return Err(SocialError::Validation(
                "You cannot follow yourself".to_string(),
            ));
        }
        if self
            .directory
            .find_user(&UserLookup::Id(target_user_id))
            .await?
            .is_none()
        {
            return Err(SocialError::NotFound("User not found".to_string()));
        }
        if self
            .store
            .find_follow(current_user_id, target_user_id)
            .await?
            .is_some()
        {
            return Err(SocialError::Conflict(
                "You already follow this user".to_string(),
            ));
        }

        let follow = self
            .store
            .create_follow(current_user_id, target_user_id)
            .await
            .map_err(SocialError::conflict_on_constraint("You already follow this user"))?;
        info!("{current_user_id} followed {target_user_id}");
        Ok(follow)
    }

    pub async fn unfollow_user(
        &self,
        current_user_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<(), SocialError> {
        if self
            .store
            .find_follow(current_user_id, target_user_id)
            .await?
            .is_none()
        {
            return Err(SocialError::NotFound("Follow not found".to_string()));
        }
        self.store
            .delete_follow(current_user_id, target_user_id)
            .await?;
        Ok(())
    }

    pub async fn like_post(
        &self,
        current_user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Like, SocialError> {
        self.ensure_post_exists(post_id).await?;
        if self
            .store
            .find_like(current_user_id, post_id)
            .await?
            .is_some()
        {
            return Err(SocialError::Conflict(
                "You already liked this post".to_string(),
            ));
        }
        self.store
            .create_like(current_user_id, post_id)
            .await
            .map_err(SocialError::conflict_on_constraint("You already liked this post"))
    }

    pub async fn unlike_post(
        &self,
        current_user_id: Uuid,
        post_id: Uuid,
    ) -> Result<(), SocialError> {
        if self
            .store
            .find_like(current_user_id, post_id)
            .await?
            .is_none()
        {
            return Err(SocialError::NotFound("Like not found".to_string()));
        }
        self.store.delete_like(current_user_id, post_id).await?;
        Ok(())
    }

    pub async fn create_repost(
        &self,
        current_user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Repost, SocialError> {
        self.ensure_post_exists(post_id).await?;
        if self
            .store
            .find_repost_by_user_and_post(current_user_id, post_id)
            .await?
            .is_some()
        {
            return Err(SocialError::Conflict(
                "You already reposted this post".to_string(),
            ));
        }
        let repost = self
            .store
            .create_repost(current_user_id, post_id)
            .await
            .map_err(SocialError::conflict_on_constraint("You already reposted this post"))?;
        info!("{current_user_id} reposted {post_id}");
        Ok(repost)
    }

    pub async fn delete_repost(
        &self,
        current_user_id: Uuid,
        repost_id: Uuid,
    ) -> Result<(), SocialError> {
        let repost = self
            .store
            .find_repost(repost_id)
            .await?
            .ok_or_else(|| SocialError::NotFound("Repost not found".to_string()))?;
        if repost.user_id != current_user_id {
            return Err(SocialError::Forbidden(
                "You are not allowed to delete this repost".to_string(),
            ));
        }
        self.store.delete_repost(repost_id).await?;
        Ok(())
    }

    /// Creates a comment or a reply. A parent must exist and belong to the
    /// same post.
    pub async fn create_comment(
        &self,
        current_user_id: Uuid,
        request: NewCommentRequest,
    ) -> Result<Comment, SocialError> {
        self.ensure_post_exists(request.post_id).await?;
        let content = normalize_content(&request.content, "Comment")?;

        if let Some(parent_id) = request.parent_comment_id {
            let parent = self
                .store
                .find_comment(parent_id)
                .await?
                .ok_or_else(|| SocialError::NotFound("Parent comment not found".to_string()))?;
            if parent.post_id != request.post_id {
                return Err(SocialError::Validation(
                    "Parent comment must belong to the same post".to_string(),
                ));
            }
        }

        let comment = self
            .store
            .create_comment(NewComment {
                post_id: request.post_id,
                author_id: current_user_id,
                parent_id: request.parent_comment_id,
                content,
            })
            .await?;
        info!("Comment {} added to post {}", comment.id, comment.post_id);
        Ok(comment)
    }

    pub async fn delete_comment(
        &self,
        current_user_id: Uuid,
        comment_id: Uuid,
    ) -> Result<(), SocialError> {
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| SocialError::NotFound("Comment not found".to_string()))?;
        if comment.author_id != current_user_id {
            return Err(SocialError::Forbidden(
                "You are not allowed to delete this comment".to_string(),
            ));
        }
        self.store.delete_comment(comment_id).await?;
        Ok(())
    }

    async fn ensure_post_exists(&self, post_id: Uuid) -> Result<(), SocialError> {
        match self.store.find_post(post_id).await? {
            Some(_) => Ok(()),
            None => Err(SocialError::NotFound("Post not found".to_string())),
        }
    }
}
