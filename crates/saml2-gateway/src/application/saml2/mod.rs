use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{error, info};

use crate::domain::{
    error_redirect::build_error_url,
    event::{LoginEventBus, Saml2LoginEvent},
    login::{self, PostLoginResolver},
    saml2::{Error as Saml2AuthError, LogoutParams, Saml2Auth, Saml2Payload, Saml2User},
};

use super::Saml2Routes;

/// Error details handed to the next response only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ErrorContext {
    pub error_detail: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Saml2Redirect {
    pub location: String,
    pub error_context: Option<ErrorContext>,
}

impl Saml2Redirect {
    fn to(location: impl Into<String>) -> Self {
        Self { location: location.into(), error_context: None }
    }

    fn with_error(location: impl Into<String>, error_context: ErrorContext) -> Self {
        Self { location: location.into(), error_context: Some(error_context) }
    }
}

#[async_trait]
pub(crate) trait Saml2UseCase {
    fn metadata(&self) -> Result<String>;
    async fn acs(&self, payload: Saml2Payload) -> Result<Saml2Redirect>;
    fn sls(&self, payload: Saml2Payload) -> Result<Saml2Redirect>;
    fn logout(&self, cmd: LogoutCommand) -> Result<Saml2Redirect>;
    fn login(&self) -> Result<Saml2Redirect>;
}

pub(crate) struct Saml2UseCaseImpl {
    database_connection: Arc<DatabaseConnection>,
    saml2_auth: Arc<dyn Saml2Auth + Send + Sync>,
    login_event_bus: Arc<LoginEventBus>,
    post_login_resolver: Arc<PostLoginResolver>,
    routes: Arc<Saml2Routes>,
}

impl Saml2UseCaseImpl {
    pub fn new(
        database_connection: Arc<DatabaseConnection>,
        saml2_auth: Arc<dyn Saml2Auth + Send + Sync>,
        login_event_bus: Arc<LoginEventBus>,
        post_login_resolver: Arc<PostLoginResolver>,
        routes: Arc<Saml2Routes>,
    ) -> Self {
        Self { database_connection, saml2_auth, login_event_bus, post_login_resolver, routes }
    }

    fn error_redirect(&self, error_message: &str) -> Saml2Redirect {
        error!(error = %error_message, "Saml2 error_detail");

        Saml2Redirect::with_error(
            build_error_url(&self.routes.error_route, error_message),
            ErrorContext { error_detail: vec![error_message.to_owned()], errors: vec![] },
        )
    }

    async fn resolve_redirect(&self, user: &Saml2User, redirect_url: &str) -> login::Result<String> {
        let transaction = self
            .database_connection
            .begin()
            .await
            .map_err(|e| login::Error::new(login::ErrorKind::Internal, e.to_string()))?;

        let location = self.post_login_resolver.process(&transaction, user, redirect_url).await?;

        transaction.commit().await.map_err(|e| login::Error::new(login::ErrorKind::Internal, e.to_string()))?;

        Ok(location)
    }
}

#[async_trait]
impl Saml2UseCase for Saml2UseCaseImpl {
    fn metadata(&self) -> Result<String> {
        self.saml2_auth.metadata().map_err(|e| {
            error!(error = %e, "failed to get saml2 metadata.");
            Error::Saml2Auth(e)
        })
    }

    async fn acs(&self, payload: Saml2Payload) -> Result<Saml2Redirect> {
        let user = match self.saml2_auth.acs(&payload) {
            Ok(user) => user,
            Err(Saml2AuthError::Rejected { errors, last_error_reason }) => {
                error!(error = %last_error_reason, "Saml2 error_detail");
                error!(errors = ?errors, "Saml2 error");

                return Ok(Saml2Redirect::with_error(
                    self.routes.error_route.clone(),
                    ErrorContext { error_detail: vec![last_error_reason], errors },
                ));
            }
            Err(e) => return Ok(self.error_redirect(&e.to_string())),
        };

        self.login_event_bus.publish(&Saml2LoginEvent { user: user.clone() }).await;

        let redirect_url = user.intended_url.clone().unwrap_or_else(|| self.routes.login_route.clone());

        match self.resolve_redirect(&user, &redirect_url).await {
            Ok(location) => {
                info!(name_id = %user.name_id, location = %location, "saml2 login completed.");
                Ok(Saml2Redirect::to(location))
            }
            Err(e) => Ok(self.error_redirect(&e.message)),
        }
    }

    fn sls(&self, payload: Saml2Payload) -> Result<Saml2Redirect> {
        self.saml2_auth.sls(&payload, self.routes.retrieve_parameters_from_server).map_err(|e| {
            error!(error = %e, "saml2 single logout failed.");
            Error::CouldNotLogOut
        })?;

        Ok(Saml2Redirect::to(self.routes.logout_route.clone()))
    }

    fn logout(&self, cmd: LogoutCommand) -> Result<Saml2Redirect> {
        let url = self.saml2_auth.logout(&cmd.into()).map_err(|e| {
            error!(error = %e, "failed to initiate saml2 logout.");
            Error::Saml2Auth(e)
        })?;

        Ok(Saml2Redirect::to(url))
    }

    fn login(&self) -> Result<Saml2Redirect> {
        let url = self.saml2_auth.login(&self.routes.login_route).map_err(|e| {
            error!(error = %e, "failed to initiate saml2 login.");
            Error::Saml2Auth(e)
        })?;

        Ok(Saml2Redirect::to(url))
    }
}

pub(crate) struct LogoutCommand {
    pub return_to: Option<String>,
    pub name_id: Option<String>,
    pub session_index: Option<String>,
}

impl From<LogoutCommand> for LogoutParams {
    fn from(value: LogoutCommand) -> Self {
        Self { return_to: value.return_to, name_id: value.name_id, session_index: value.session_index }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("Could not log out")]
    CouldNotLogOut,
    #[error(transparent)]
    Saml2Auth(Saml2AuthError),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
