use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use url::Url;

pub(crate) mod user;

pub(crate) enum AuthMethod {
    Credential { username: String, password: Option<String> },
}

pub async fn connect_to_database(
    host: &str,
    port: u16,
    database_name: &str,
    auth: &AuthMethod,
) -> anyhow::Result<Arc<DatabaseConnection>> {
    let mut options = match auth {
        AuthMethod::Credential { username, password } => {
            let mut conn_str = Url::parse(&format!("postgres://{host}:{port}/{database_name}?sslmode=Prefer"))?;
            conn_str.set_username(username).map_err(|_| anyhow::anyhow!("invalid database username"))?;
            conn_str.set_password(password.as_deref()).map_err(|_| anyhow::anyhow!("invalid database password"))?;
            ConnectOptions::new(conn_str)
        }
    };

    options.sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Ok(Arc::new(Database::connect(options).await?))
}
