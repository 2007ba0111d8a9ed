use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::domain::saml2::Saml2User;

#[derive(Debug, Clone)]
pub(crate) struct Saml2LoginEvent {
    pub user: Saml2User,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub(crate) trait LoginEventListener {
    async fn on_login(&self, event: &Saml2LoginEvent);
}

#[derive(Default)]
pub(crate) struct LoginEventBus {
    listeners: Vec<Arc<dyn LoginEventListener + Send + Sync>>,
}

impl LoginEventBus {
    pub fn with_listener(mut self, listener: Arc<dyn LoginEventListener + Send + Sync>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn publish(&self, event: &Saml2LoginEvent) {
        for listener in &self.listeners {
            listener.on_login(event).await;
        }
    }
}

pub(crate) struct TracingLoginListener;

#[async_trait]
impl LoginEventListener for TracingLoginListener {
    async fn on_login(&self, event: &Saml2LoginEvent) {
        info!(name_id = %event.user.name_id, session_index = ?event.user.session_index, "saml2 user logged in.");
    }
}
