use crate::core::config::AppConfig;
use crate::social::{
    ConversationService, FeedComposer, InteractionService, SocialBackend, UserService,
};

/// Shared handler state. The backend serves as both user directory and
/// store, so one handle is cloned into each service.
pub struct AppState<S> {
    pub config: Option<AppConfig>,
    pub feed: FeedComposer<S, S>,
    pub interactions: InteractionService<S, S>,
    pub users: UserService<S>,
    pub conversations: ConversationService<S, S>,
}

impl<S: SocialBackend> AppState<S> {
    pub fn new(config: Option<AppConfig>, backend: S) -> Self {
        Self {
            config,
            feed: FeedComposer::new(backend.clone(), backend.clone()),
            interactions: InteractionService::new(backend.clone(), backend.clone()),
            users: UserService::new(backend.clone()),
            conversations: ConversationService::new(backend.clone(), backend),
        }
    }

    pub fn backend(&self) -> &S {
        self.feed.store()
    }
}

impl<S> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
