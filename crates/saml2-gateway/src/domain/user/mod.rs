mod user_service;

#[cfg(test)]
pub(crate) use user_service::MockUserService;
pub(crate) use user_service::{PostgresUserService, UserService};

/// Application account a SAML identity is mapped onto. Never created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<crate::database::user::Model> for LocalUser {
    fn from(value: crate::database::user::Model) -> Self {
        Self { id: value.id, username: value.username, email: value.email }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
