use std::sync::Arc;

use sea_orm::DatabaseTransaction;
use tracing::{info, info_span, Instrument};

use crate::domain::{
    message::{MessageError, MessageErrorKind, Record, RequestMessageProcessor},
    saml2::Saml2User,
    user::{self, LocalUser, UserService},
};

/// Names of the SAML attributes the resolver reads.
#[derive(Debug, Clone)]
pub(crate) struct AttributeNames {
    pub request_message: String,
    pub email: String,
}

/// Resolves the local account behind an asserted identity and turns its embedded request message into
/// redirect parameters.
pub(crate) struct PostLoginResolver {
    user_service: Arc<dyn UserService + Send + Sync>,
    message_processor: Arc<dyn RequestMessageProcessor + Send + Sync>,
    attribute_names: AttributeNames,
}

impl PostLoginResolver {
    pub fn new(
        user_service: Arc<dyn UserService + Send + Sync>,
        message_processor: Arc<dyn RequestMessageProcessor + Send + Sync>,
        attribute_names: AttributeNames,
    ) -> Self {
        Self { user_service, message_processor, attribute_names }
    }

    pub fn extract_embedded_message<'a>(&self, identity: &'a Saml2User) -> Option<&'a str> {
        identity.first_attribute(&self.attribute_names.request_message).filter(|message| !message.is_empty())
    }

    pub async fn resolve_local_user(&self, transaction: &DatabaseTransaction, identity: &Saml2User) -> Result<LocalUser> {
        let username = identity.first_attribute(&self.attribute_names.email).unwrap_or_default();

        self.user_service.find_by_username(transaction, username).await?.ok_or_else(|| {
            Error::new(
                ErrorKind::UserNotPresent,
                format!("Saml request with username {username} does not have an user"),
            )
        })
    }

    /// Returns the final redirect location: `redirect_url` followed by the record parameters, if any.
    pub async fn process(
        &self,
        transaction: &DatabaseTransaction,
        identity: &Saml2User,
        redirect_url: &str,
    ) -> Result<String> {
        let Some(message) = self.extract_embedded_message(identity) else {
            return Ok(redirect_url.to_owned());
        };

        let user = self.resolve_local_user(transaction, identity).await?;

        // The user only acts for the duration of this call; nothing is kept past the request.
        let record = self
            .message_processor
            .create_request(message, &user)
            .instrument(info_span!("impersonated", user_id = user.id))
            .await?;
        info!(user_id = user.id, record = ?record, "request message processed.");

        Ok(format!("{redirect_url}{}", build_redirect_params(record.as_ref())))
    }
}

pub(crate) fn build_redirect_params(record: Option<&Record>) -> String {
    match record {
        Some(record) if !record.id.is_empty() => {
            format!("&record_type={}&record_id={}", record.kind.routing_tag(), urlencoding::encode(&record.id))
        }
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    UserNotPresent,
    Message(MessageErrorKind),
    Internal,
}

#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub(crate) struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl From<MessageError> for Error {
    fn from(value: MessageError) -> Self {
        Self::new(ErrorKind::Message(value.kind), value.message)
    }
}

impl From<user::Error> for Error {
    fn from(value: user::Error) -> Self {
        match value {
            user::Error::Anyhow(e) => Self::new(ErrorKind::Internal, e.to_string()),
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
