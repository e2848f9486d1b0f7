use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use kind_db::Database;
use kind_gateway::dispatcher::Dispatcher;
use kind_types::events::GatewayEvent;
use kind_types::models::{User, UserStatus};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String) -> AppState {
        Arc::new(Self {
            db,
            dispatcher: Dispatcher::new(),
            jwt_secret,
        })
    }

    /// Run blocking DB work off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow!("blocking task failed"))
            })?
            .map_err(ApiError::from)
    }

    /// The caller's profile, which must exist and be active before they can
    /// post, apply or accept.
    pub async fn active_user(self: &Arc<Self>, user_id: &str) -> Result<User, ApiError> {
        let uid = user_id.to_string();
        let user = self
            .run_db(move |db| db.get_user_by_id(&uid))
            .await?
            .ok_or_else(|| ApiError::Forbidden("profile not set up".into()))?;
        if user.status != UserStatus::Active {
            return Err(ApiError::Forbidden(format!("account is {}", user.status)));
        }
        Ok(user)
    }

    pub async fn notify(&self, user_ids: &[&str], event: GatewayEvent) {
        self.dispatcher.send_to_users(user_ids, event).await;
    }
}
