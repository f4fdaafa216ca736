use tracing::debug;

use crate::cache::{keys, CacheManager};
use crate::models::UserInfo;

#[derive(Clone)]
pub struct Session {
    cache: CacheManager,
}

impl Session {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    /// Load the stored session bundle, if any
    pub async fn user_info(&self) -> Option<UserInfo> {
        self.cache.load(keys::USER_INFO).await
    }

    /// Get the bearer token if one is stored
    pub async fn access_token(&self) -> Option<String> {
        self.user_info()
            .await
            .and_then(|info| info.access_token)
            .filter(|token| !token.is_empty())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.user_info()
            .await
            .and_then(|info| info.refresh_token)
            .filter(|token| !token.is_empty())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Persist a full session bundle (after login)
    pub async fn save(&self, info: &UserInfo) -> bool {
        self.cache.save(keys::USER_INFO, info).await
    }

    /// Replace the access token, keeping the rest of the bundle
    pub async fn set_access_token(&self, token: String) -> bool {
        let mut info = self.user_info().await.unwrap_or_default();
        info.access_token = Some(token);
        debug!("Access token updated");
        self.save(&info).await
    }

    /// Clear session data
    pub async fn clear(&self) -> bool {
        debug!("Session cleared");
        self.cache.remove(keys::USER_INFO).await
    }
}
