//! Account registration, lookup and owner-only profile changes.
//!
//! Responses carry the public [`User`]; password hashes stay in the store.

use log::info;
use serde::Deserialize;
use uuid::Uuid;

use super::feed::SEARCH_PAGE_SIZE;
use super::password::{hash_password, validate_password};
use super::store::{is_valid_email, StoreError, UserDirectory, UserLookup};
use super::types::{NewUser, User, UserChanges};
use super::{normalize_content, SocialError};

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 30;
const MAX_EMAIL_CHARS: usize = 255;
const MAX_NAME_CHARS: usize = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Fields left out are not changed. A blank `bio` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
}

fn validate_email(raw: &str) -> Result<String, SocialError> {
    let email = raw.trim();
    if email.chars().count() > MAX_EMAIL_CHARS || !is_valid_email(email) {
        return Err(SocialError::Validation("Invalid email".to_string()));
    }
    Ok(email.to_string())
}

/// Usernames must stay distinguishable from ids and emails, since
/// `/api/users/{identifier}` accepts all three.
fn validate_username(raw: &str) -> Result<String, SocialError> {
    let username = raw.trim();
    let length = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&length) {
        return Err(SocialError::Validation(format!(
            "Username must be between {MIN_USERNAME_CHARS} and {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username.contains('@') || username.chars().any(char::is_whitespace) {
        return Err(SocialError::Validation(
            "Username cannot contain '@' or spaces".to_string(),
        ));
    }
    if Uuid::parse_str(username).is_ok() {
        return Err(SocialError::Validation(
            "Username cannot be a UUID".to_string(),
        ));
    }
    Ok(username.to_string())
}

fn validate_name(raw: &str) -> Result<String, SocialError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SocialError::Validation("Name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(SocialError::Validation(format!(
            "Name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn normalize_bio(raw: &str) -> Result<Option<String>, SocialError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    normalize_content(raw, "Bio").map(Some)
}

#[derive(Debug, Clone)]
pub struct UserService<D> {
    directory: D,
}

impl<D: UserDirectory> UserService<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, SocialError> {
        let email = validate_email(&request.email)?;
        let username = validate_username(&request.username)?;
        validate_password(&request.password)?;
        let name = validate_name(&request.name)?;
        let bio = match request.bio.as_deref() {
            Some(raw) => normalize_bio(raw)?,
            None => None,
        };

        self.ensure_email_free(&email, None).await?;
        self.ensure_username_free(&username, None).await?;

        let password_hash = hash_password(request.password).await?;
        let user = self
            .directory
            .create_user(NewUser {
                email,
                username,
                name,
                bio,
                password_hash,
            })
            .await
            .map_err(SocialError::conflict_on_constraint("Email or username already registered"))?;
        info!("User {} registered as {}", user.id, user.username);
        Ok(user)
    }

    /// Blank queries return nothing without touching the store.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>, SocialError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.directory.search_users(query, SEARCH_PAGE_SIZE).await?)
    }

    /// Resolves an id, an email or a username.
    pub async fn get_user(&self, identifier: &str) -> Result<User, SocialError> {
        self.resolve(&UserLookup::classify(identifier)).await
    }

    pub async fn get_current_user(&self, user_id: Uuid) -> Result<User, SocialError> {
        self.resolve(&UserLookup::Id(user_id)).await
    }

    pub async fn followers(&self, identifier: &str) -> Result<Vec<User>, SocialError> {
        let user = self.get_user(identifier).await?;
        Ok(self.directory.followers_of(user.id).await?)
    }

    pub async fn following(&self, identifier: &str) -> Result<Vec<User>, SocialError> {
        let user = self.get_user(identifier).await?;
        Ok(self.directory.followed_by(user.id).await?)
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
        current_user_id: Uuid,
    ) -> Result<User, SocialError> {
        let user = self.resolve(&UserLookup::Id(user_id)).await?;
        if user.id != current_user_id {
            return Err(SocialError::Forbidden(
                "You can only edit your own profile".to_string(),
            ));
        }

        let mut changes = UserChanges::default();
        if let Some(raw) = request.email.as_deref() {
            let email = validate_email(raw)?;
            if email != user.email {
                self.ensure_email_free(&email, Some(user.id)).await?;
                changes.email = Some(email);
            }
        }
        if let Some(raw) = request.username.as_deref() {
            let username = validate_username(raw)?;
            if username != user.username {
                self.ensure_username_free(&username, Some(user.id)).await?;
                changes.username = Some(username);
            }
        }
        if let Some(raw) = request.name.as_deref() {
            changes.name = Some(validate_name(raw)?);
        }
        if let Some(raw) = request.bio.as_deref() {
            changes.bio = Some(normalize_bio(raw)?);
        }
        if let Some(password) = request.password {
            validate_password(&password)?;
            changes.password_hash = Some(hash_password(password).await?);
        }

        let updated = self
            .directory
            .update_user(user_id, changes)
            .await
            .map_err(|err| match err {
                StoreError::Missing(_) => SocialError::NotFound("User not found".to_string()),
                other => SocialError::conflict_on_constraint(
                    "Email or username already registered",
                )(other),
            })?;
        info!("User {user_id} updated their profile");
        Ok(updated)
    }

    pub async fn delete_user(
        &self,
        user_id: Uuid,
        current_user_id: Uuid,
    ) -> Result<User, SocialError> {
        let user = self.resolve(&UserLookup::Id(user_id)).await?;
        if user.id != current_user_id {
            return Err(SocialError::Forbidden(
                "You can only delete your own profile".to_string(),
            ));
        }
        let deleted = self
            .directory
            .delete_user(user_id)
            .await
            .map_err(SocialError::not_found_on_missing("User not found"))?;
        info!("User {user_id} deleted their account");
        Ok(deleted)
    }

    async fn resolve(&self, lookup: &UserLookup) -> Result<User, SocialError> {
        self.directory
            .find_user(lookup)
            .await?
            .ok_or_else(|| SocialError::NotFound("User not found".to_string()))
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<Uuid>) -> Result<(), SocialError> {
        match self
            .directory
            .find_user(&UserLookup::Email(email.to_string()))
            .await?
        {
            Some(existing) if Some(existing.id) != owner => Err(SocialError::Conflict(
                "Email already registered".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn ensure_username_free(
        &self,
        username: &str,
        owner: Option<Uuid>,
    ) -> Result<(), SocialError> {
        match self
            .directory
            .find_user(&UserLookup::Username(username.to_string()))
            .await?
        {
            Some(existing) if Some(existing.id) != owner => Err(SocialError::Conflict(
                "Username already taken".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
