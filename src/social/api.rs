//! HTTP handlers for users, posts, interactions and conversations.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::conversations::{SendMessageRequest, StartConversationRequest};
use super::interactions::NewCommentRequest;
use super::store::SocialBackend;
use super::types::{
    ConversationRecord, ConversationSummary, FeedPost, MessageRecord, Post, PostDetails, User,
};
use super::users::{CreateUserRequest, UpdateUserRequest};
use super::SocialError;
use crate::core::shared::state::AppState;

pub use super::extract::{AppJson, AppPath, CurrentUser, USER_ID_HEADER};

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

type SharedState<S> = State<Arc<AppState<S>>>;

fn success() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true }))
}

pub async fn handle_create_user<S: SocialBackend>(
    State(state): SharedState<S>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), SocialError> {
    let user = state.users.create_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn handle_get_current_user<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<User>, SocialError> {
    Ok(Json(state.users.get_current_user(user_id).await?))
}

pub async fn handle_search_users<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, SocialError> {
    let search = query.search.unwrap_or_default();
    Ok(Json(state.users.search_users(&search).await?))
}

pub async fn handle_get_user<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(_): CurrentUser,
    AppPath(identifier): AppPath<String>,
) -> Result<Json<User>, SocialError> {
    Ok(Json(state.users.get_user(&identifier).await?))
}

pub async fn handle_get_followers<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(_): CurrentUser,
    AppPath(identifier): AppPath<String>,
) -> Result<Json<Vec<User>>, SocialError> {
    Ok(Json(state.users.followers(&identifier).await?))
}

pub async fn handle_get_following<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(_): CurrentUser,
    AppPath(identifier): AppPath<String>,
) -> Result<Json<Vec<User>>, SocialError> {
    Ok(Json(state.users.following(&identifier).await?))
}

pub async fn handle_update_user<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(current): CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<User>, SocialError> {
    Ok(Json(state.users.update_user(user_id, req, current).await?))
}

pub async fn handle_delete_user<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(current): CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<User>, SocialError> {
    Ok(Json(state.users.delete_user(user_id, current).await?))
}

pub async fn handle_create_post<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppJson(req): AppJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), SocialError> {
    let post = state.feed.create_post(&req.content, user_id).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn handle_get_timeline<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<FeedPost>>, SocialError> {
    Ok(Json(state.feed.get_timeline(user_id).await?))
}

pub async fn handle_search_posts<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<FeedPost>>, SocialError> {
    let search = query.search.unwrap_or_default();
    Ok(Json(state.feed.search_posts(&search, user_id).await?))
}

pub async fn handle_get_user_posts<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(viewer): CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Vec<FeedPost>>, SocialError> {
    Ok(Json(state.feed.get_posts_by_user(user_id, viewer).await?))
}

pub async fn handle_get_user_reposts<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(viewer): CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Vec<FeedPost>>, SocialError> {
    Ok(Json(state.feed.get_reposts_by_user(user_id, viewer).await?))
}

pub async fn handle_get_user_likes<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(viewer): CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Vec<FeedPost>>, SocialError> {
    Ok(Json(state.feed.get_liked_posts_by_user(user_id, viewer).await?))
}

pub async fn handle_get_post<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(viewer): CurrentUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<Json<PostDetails>, SocialError> {
    Ok(Json(state.feed.get_post_details(post_id, viewer).await?))
}

pub async fn handle_delete_post<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<Json<Post>, SocialError> {
    Ok(Json(state.feed.delete_post(post_id, user_id).await?))
}

pub async fn handle_follow<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(target_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, SocialError> {
    let follow = state.interactions.follow_user(user_id, target_id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

pub async fn handle_unfollow<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(target_id): AppPath<Uuid>,
) -> Result<Json<serde_json::Value>, SocialError> {
    state.interactions.unfollow_user(user_id, target_id).await?;
    Ok(success())
}

pub async fn handle_like<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, SocialError> {
    let like = state.interactions.like_post(user_id, post_id).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

pub async fn handle_unlike<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<Json<serde_json::Value>, SocialError> {
    state.interactions.unlike_post(user_id, post_id).await?;
    Ok(success())
}

pub async fn handle_create_repost<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(post_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, SocialError> {
    let repost = state.interactions.create_repost(user_id, post_id).await?;
    Ok((StatusCode::CREATED, Json(repost)))
}

pub async fn handle_delete_repost<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(repost_id): AppPath<Uuid>,
) -> Result<Json<serde_json::Value>, SocialError> {
    state.interactions.delete_repost(user_id, repost_id).await?;
    Ok(success())
}

pub async fn handle_create_comment<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppJson(req): AppJson<NewCommentRequest>,
) -> Result<impl IntoResponse, SocialError> {
    let comment = state.interactions.create_comment(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn handle_delete_comment<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(comment_id): AppPath<Uuid>,
) -> Result<Json<serde_json::Value>, SocialError> {
    state.interactions.delete_comment(user_id, comment_id).await?;
    Ok(success())
}

pub async fn handle_start_conversation<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppJson(req): AppJson<StartConversationRequest>,
) -> Result<(StatusCode, Json<ConversationRecord>), SocialError> {
    let conversation = state
        .conversations
        .start_or_get(user_id, req.recipient_id)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn handle_list_conversations<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ConversationSummary>>, SocialError> {
    Ok(Json(state.conversations.list_for_user(user_id).await?))
}

pub async fn handle_get_messages<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(conversation_id): AppPath<Uuid>,
) -> Result<Json<Vec<MessageRecord>>, SocialError> {
    Ok(Json(state.conversations.messages(user_id, conversation_id).await?))
}

pub async fn handle_send_message<S: SocialBackend>(
    State(state): SharedState<S>,
    CurrentUser(user_id): CurrentUser,
    AppPath(conversation_id): AppPath<Uuid>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageRecord>), SocialError> {
    let message = state
        .conversations
        .send_message(user_id, conversation_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub fn configure_social_routes<S: SocialBackend>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/users", post(handle_create_user::<S>))
        .route("/api/users/me", get(handle_get_current_user::<S>))
        .route("/api/users/search", get(handle_search_users::<S>))
        // GET accepts an id, email or username; PATCH and DELETE take an id.
        .route(
            "/api/users/{identifier}",
            get(handle_get_user::<S>)
                .patch(handle_update_user::<S>)
                .delete(handle_delete_user::<S>),
        )
        .route("/api/users/{identifier}/followers", get(handle_get_followers::<S>))
        .route("/api/users/{identifier}/following", get(handle_get_following::<S>))
        .route("/api/posts", post(handle_create_post::<S>))
        .route("/api/posts/timeline", get(handle_get_timeline::<S>))
        .route("/api/posts/search", get(handle_search_posts::<S>))
        .route("/api/posts/user/{user_id}", get(handle_get_user_posts::<S>))
        .route("/api/posts/user/{user_id}/reposts", get(handle_get_user_reposts::<S>))
        .route("/api/posts/user/{user_id}/likes", get(handle_get_user_likes::<S>))
        .route("/api/posts/{id}", get(handle_get_post::<S>).delete(handle_delete_post::<S>))
        .route(
            "/api/interactions/follow/{user_id}",
            post(handle_follow::<S>).delete(handle_unfollow::<S>),
        )
        .route(
            "/api/interactions/like/{post_id}",
            post(handle_like::<S>).delete(handle_unlike::<S>),
        )
        // POST takes a post id, DELETE a repost id.
        .route(
            "/api/interactions/repost/{id}",
            post(handle_create_repost::<S>).delete(handle_delete_repost::<S>),
        )
        .route("/api/interactions/comment", post(handle_create_comment::<S>))
        .route("/api/interactions/comment/{comment_id}", delete(handle_delete_comment::<S>))
        .route("/api/conversations", get(handle_list_conversations::<S>))
        .route("/api/conversations/start", post(handle_start_conversation::<S>))
        .route(
            "/api/conversations/{id}/messages",
            get(handle_get_messages::<S>).post(handle_send_message::<S>),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::{create_failing_app_state, create_test_app_state};
    use crate::social::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn request(method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send<S: SocialBackend>(
        state: Arc<AppState<S>>,
        req: Request<Body>,
    ) -> (StatusCode, Value) {
        let response = configure_social_routes::<S>()
            .with_state(state)
            .oneshot(req)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let state = create_test_app_state(MemoryStore::new());
        let (status, body) =
            send(state.clone(), request("GET", "/api/posts/timeline", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let mut bad = request("GET", "/api/posts/timeline", None, None);
        bad.headers_mut()
            .insert(USER_ID_HEADER, "not-a-uuid".parse().unwrap());
        let (status, _) = send(state, bad).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_post_then_timeline() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let state = create_test_app_state(store);

        let (status, created) = send(
            state.clone(),
            request(
                "POST",
                "/api/posts",
                Some(alice.id),
                Some(serde_json::json!({ "content": "  hello world  " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["content"], "hello world");

        let (status, timeline) =
            send(state, request("GET", "/api/posts/timeline", Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(timeline.as_array().map(Vec::len), Some(1));
        assert_eq!(timeline[0]["kind"], "direct");
        assert_eq!(timeline[0]["author"]["username"], "alice");
        assert_eq!(timeline[0]["like_count"], 0);
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let state = create_test_app_state(store);

        let (status, body) = send(
            state,
            request(
                "POST",
                "/api/posts",
                Some(alice.id),
                Some(serde_json::json!({ "content": "   " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("empty"));
    }

    #[tokio::test]
    async fn test_search_without_query_is_empty() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        store.seed_post(alice.id, "anything", Utc::now()).await;
        let state = create_test_app_state(store);

        let (status, body) =
            send(state, request("GET", "/api/posts/search", Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_post_details_and_delete_permissions() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let bob = store.seed_user("bob", "Bob").await;
        let post = store.seed_post(alice.id, "mine", Utc::now()).await;
        store
            .seed_comment(post.id, bob.id, None, "nice", Utc::now())
            .await;
        let state = create_test_app_state(store);
        let uri = format!("/api/posts/{}", post.id);

        let (status, details) = send(state.clone(), request("GET", &uri, Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["comment_count"], 1);
        assert_eq!(details["comments"][0]["content"], "nice");

        let (status, _) = send(state.clone(), request("DELETE", &uri, Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(state.clone(), request("DELETE", &uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(state, request("GET", &uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_interaction_routes() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let bob = store.seed_user("bob", "Bob").await;
        let post = store.seed_post(bob.id, "hi", Utc::now()).await;
        let state = create_test_app_state(store);

        let follow_uri = format!("/api/interactions/follow/{}", bob.id);
        let (status, _) =
            send(state.clone(), request("POST", &follow_uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) =
            send(state.clone(), request("POST", &follow_uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let self_uri = format!("/api/interactions/follow/{}", alice.id);
        let (status, _) =
            send(state.clone(), request("POST", &self_uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, repost) = send(
            state.clone(),
            request("POST", &format!("/api/interactions/repost/{}", post.id), Some(alice.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, comment) = send(
            state.clone(),
            request(
                "POST",
                "/api/interactions/comment",
                Some(alice.id),
                Some(serde_json::json!({ "post_id": post.id, "content": "great" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["parent_id"], Value::Null);

        let repost_uri = format!("/api/interactions/repost/{}", repost["id"].as_str().unwrap());
        let (status, _) =
            send(state.clone(), request("DELETE", &repost_uri, Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) =
            send(state, request("DELETE", &repost_uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let (status, body) = send(
            create_failing_app_state(),
            request("GET", "/api/posts/timeline", Some(Uuid::new_v4()), None),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal storage error");
    }

    #[tokio::test]
    async fn test_rejections_render_as_json_errors() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let state = create_test_app_state(store);

        let (status, body) = send(
            state.clone(),
            request("GET", "/api/posts/not-a-uuid", Some(alice.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let mut malformed = request("POST", "/api/posts", Some(alice.id), None);
        malformed
            .headers_mut()
            .insert("content-type", "application/json".parse().unwrap());
        *malformed.body_mut() = Body::from("{\"content\": ");
        let (status, body) = send(state.clone(), malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(
            state,
            request(
                "POST",
                "/api/interactions/comment",
                Some(alice.id),
                Some(serde_json::json!({ "post_id": "nope", "content": "hi" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_user_registration_and_lookup() {
        let state = create_test_app_state(MemoryStore::new());
        let registration = serde_json::json!({
            "email": "fox@fbi.gov",
            "username": "fox",
            "password": "trustno1!",
            "name": "Fox Mulder",
        });

        let (status, created) = send(
            state.clone(),
            request("POST", "/api/users", None, Some(registration.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["username"], "fox");
        assert!(created.get("password").is_none());
        assert!(created.get("password_hash").is_none());
        let fox_id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        let (status, _) =
            send(state.clone(), request("POST", "/api/users", None, Some(registration))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let by_id = fox_id.to_string();
        for identifier in ["fox", "fox@fbi.gov", by_id.as_str()] {
            let uri = format!("/api/users/{identifier}");
            let (status, user) =
                send(state.clone(), request("GET", &uri, Some(fox_id), None)).await;
            assert_eq!(status, StatusCode::OK, "{identifier}");
            assert_eq!(user["id"], fox_id.to_string());
        }

        let (status, me) =
            send(state.clone(), request("GET", "/api/users/me", Some(fox_id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "fox@fbi.gov");

        let (status, found) = send(
            state.clone(),
            request("GET", "/api/users/search?search=mul", Some(fox_id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().map(Vec::len), Some(1));

        let (status, posted) = send(
            state,
            request(
                "POST",
                "/api/posts",
                Some(fox_id),
                Some(serde_json::json!({ "content": "the truth is out there" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(posted["author_id"], fox_id.to_string());
    }

    #[tokio::test]
    async fn test_profile_edits_are_owner_only() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let bob = store.seed_user("bob", "Bob").await;
        let state = create_test_app_state(store);
        let uri = format!("/api/users/{}", alice.id);
        let rename = serde_json::json!({ "name": "Alice Liddell" });

        let (status, _) =
            send(state.clone(), request("PATCH", &uri, Some(bob.id), Some(rename.clone()))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, updated) =
            send(state.clone(), request("PATCH", &uri, Some(alice.id), Some(rename))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Alice Liddell");

        let (status, _) = send(state.clone(), request("DELETE", &uri, Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(state.clone(), request("DELETE", &uri, Some(alice.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(state, request("GET", &uri, Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_follower_listings_by_username() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let bob = store.seed_user("bob", "Bob").await;
        let state = create_test_app_state(store);
        let follow_uri = format!("/api/interactions/follow/{}", bob.id);
        send(state.clone(), request("POST", &follow_uri, Some(alice.id), None)).await;

        let (status, followers) = send(
            state.clone(),
            request("GET", "/api/users/bob/followers", Some(alice.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(followers[0]["username"], "alice");

        let (status, following) = send(
            state,
            request("GET", "/api/users/alice/following", Some(alice.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(following[0]["username"], "bob");
    }

    #[tokio::test]
    async fn test_conversation_routes() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice", "Alice").await;
        let bob = store.seed_user("bob", "Bob").await;
        let carol = store.seed_user("carol", "Carol").await;
        let state = create_test_app_state(store);
        let start = serde_json::json!({ "recipient_id": bob.id });

        let (status, conversation) = send(
            state.clone(),
            request("POST", "/api/conversations/start", Some(alice.id), Some(start.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, again) = send(
            state.clone(),
            request("POST", "/api/conversations/start", Some(alice.id), Some(start)),
        )
        .await;
        assert_eq!(again["id"], conversation["id"]);

        let messages_uri = format!(
            "/api/conversations/{}/messages",
            conversation["id"].as_str().unwrap()
        );
        let hello = serde_json::json!({ "content": "hello bob" });
        let (status, sent) = send(
            state.clone(),
            request("POST", &messages_uri, Some(alice.id), Some(hello.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["author"]["username"], "alice");

        let (status, _) =
            send(state.clone(), request("POST", &messages_uri, Some(carol.id), Some(hello))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, messages) =
            send(state.clone(), request("GET", &messages_uri, Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(messages[0]["content"], "hello bob");

        let (status, inbox) =
            send(state, request("GET", "/api/conversations", Some(bob.id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox[0]["participant"]["username"], "alice");
        assert_eq!(inbox[0]["last_message"]["content"], "hello bob");
    }
}
