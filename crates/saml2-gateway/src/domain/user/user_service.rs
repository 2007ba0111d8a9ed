use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sea_orm::{ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter};

use super::{Error, LocalUser, Result};

#[cfg_attr(test, automock)]
#[async_trait]
pub(crate) trait UserService {
    async fn find_by_username(&self, transaction: &DatabaseTransaction, username: &str) -> Result<Option<LocalUser>>;
}

pub(crate) struct PostgresUserService;

#[async_trait]
impl UserService for PostgresUserService {
    async fn find_by_username(&self, transaction: &DatabaseTransaction, username: &str) -> Result<Option<LocalUser>> {
        use crate::database::user;

        let user = user::Entity::find().filter(user::Column::Username.eq(username)).one(transaction).await?;

        Ok(user.map(LocalUser::from))
    }
}

impl From<DbErr> for Error {
    fn from(value: DbErr) -> Self {
        Self::Anyhow(value.into())
    }
}
