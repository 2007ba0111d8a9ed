use std::path::Path;

use config::{Config, File, FileFormat};
use directories::BaseDirs;
use serde::Deserialize;
use url::Url;

use crate::Args;

#[derive(Deserialize, Debug)]
pub(crate) struct ApplicationConfig {
    pub port: u16,
    pub base_url: Url,
    pub path_prefix: Option<String>,
    pub database: DatabaseConfig,
    pub saml2: Saml2Config,
    pub message_processor: MessageProcessorConfig,
}

#[derive(Deserialize, Debug)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub auth: DatabaseAuthConfig,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatabaseAuthConfig {
    Credential { username: String, password: Option<String> },
}

#[derive(Deserialize, Debug, Clone)]
pub struct Saml2Config {
    pub error_route: String,
    pub login_route: String,
    pub logout_route: String,
    pub retrieve_parameters_from_server: bool,
    pub entity_id: String,
    pub idp_issuer: Option<String>,
    pub sso_url: String,
    pub slo_url: Option<String>,
    /// PEM certificate the IdP signs responses with.
    pub idp_certificate: String,
    /// PEM certificate published in the SP metadata.
    pub certificate: Option<String>,
    pub attributes: Saml2AttributesConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Saml2AttributesConfig {
    pub request_message: String,
    pub email: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MessageProcessorConfig {
    pub endpoint: Url,
}

pub(super) fn load_config(args: Args) -> anyhow::Result<ApplicationConfig> {
    let config_file_path = if let Some(path_override) = args.config {
        path_override
    } else {
        let base_dirs = BaseDirs::new().ok_or_else(|| anyhow::anyhow!("failed to get base directories"))?;
        let gateway_config_dir = base_dirs.config_dir().join("saml2-gateway");
        if !gateway_config_dir.exists() {
            std::fs::create_dir_all(&gateway_config_dir)?;
        }

        let config_file_path = gateway_config_dir.join("config.toml");
        if !config_file_path.exists() {
            write_default_config_file(&config_file_path)?;
        }

        config_file_path
    };

    let config: ApplicationConfig = Config::builder()
        .set_default("port", 8080)?
        .set_default("saml2.error_route", "/error")?
        .set_default("saml2.login_route", "/")?
        .set_default("saml2.logout_route", "/")?
        .set_default("saml2.retrieve_parameters_from_server", false)?
        .set_default("saml2.attributes.request_message", "RequestMessage")?
        .set_default("saml2.attributes.email", "Email")?
        .add_source(File::from(config_file_path).format(FileFormat::Toml))
        .set_override_option("port", args.port.map(|port| port.to_string()))?
        .set_override_option("base_url", args.base_url)?
        .set_override_option("database.host", args.database_host)?
        .set_override_option("database.port", args.database_port)?
        .set_override_option("database.database_name", args.database_name)?
        .set_override_option("database.auth.username", args.database_username)?
        .set_override_option("database.auth.password", args.database_password)?
        .build()?
        .try_deserialize()?;

    Ok(config)
}

fn write_default_config_file(path: &Path) -> anyhow::Result<()> {
    let default_config_content = include_str!("../static/default_config.toml");
    std::fs::write(path, default_config_content)?;
    Ok(())
}
