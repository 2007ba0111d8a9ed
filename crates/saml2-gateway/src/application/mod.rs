use std::sync::Arc;

use openssl::x509::X509;
use sea_orm::DatabaseConnection;

use crate::{
    config::{ApplicationConfig, DatabaseAuthConfig, Saml2Config},
    database::{connect_to_database, AuthMethod},
    domain::{
        event::{LoginEventBus, TracingLoginListener},
        login::{AttributeNames, PostLoginResolver},
        message::HttpRequestMessageProcessor,
        saml2::{SamaelSaml2Auth, SamaelSaml2AuthConfig, Saml2Auth},
        user::PostgresUserService,
    },
};

use self::saml2::{Saml2UseCase, Saml2UseCaseImpl};

pub(crate) mod saml2;

/// Routes and switches the SAML2 endpoints redirect to.
#[derive(Debug, Clone)]
pub(crate) struct Saml2Routes {
    pub error_route: String,
    pub login_route: String,
    pub logout_route: String,
    pub retrieve_parameters_from_server: bool,
}

impl From<&Saml2Config> for Saml2Routes {
    fn from(value: &Saml2Config) -> Self {
        Self {
            error_route: value.error_route.clone(),
            login_route: value.login_route.clone(),
            logout_route: value.logout_route.clone(),
            retrieve_parameters_from_server: value.retrieve_parameters_from_server,
        }
    }
}

pub(crate) struct Application {
    pub(crate) database_connection: Arc<DatabaseConnection>,
    pub(crate) saml2_auth: Arc<dyn Saml2Auth + Send + Sync>,
    pub(crate) login_event_bus: Arc<LoginEventBus>,
    pub(crate) post_login_resolver: Arc<PostLoginResolver>,
    pub(crate) routes: Arc<Saml2Routes>,
}

impl Application {
    pub async fn new(config: &ApplicationConfig) -> anyhow::Result<Self> {
        let database_connection = init_database_connection(config).await?;

        let saml2_auth_config = SamaelSaml2AuthConfig::builder()
            .entity_id(&config.saml2.entity_id)
            .acs_url(config.base_url.join("saml2/acs")?)
            .sls_url(config.base_url.join("saml2/sls")?)
            .sso_url(&config.saml2.sso_url)
            .maybe_idp_issuer(config.saml2.idp_issuer.as_ref())
            .maybe_idp_slo_url(config.saml2.slo_url.as_ref())
            .idp_certificate(parse_certificate("saml2.idp_certificate", &config.saml2.idp_certificate)?)
            .maybe_certificate(
                config
                    .saml2
                    .certificate
                    .as_deref()
                    .map(|pem| parse_certificate("saml2.certificate", pem))
                    .transpose()?,
            )
            .build();
        let saml2_auth = Arc::new(SamaelSaml2Auth::new(saml2_auth_config)?);

        let post_login_resolver = Arc::new(PostLoginResolver::new(
            Arc::new(PostgresUserService),
            Arc::new(HttpRequestMessageProcessor::new(config.message_processor.endpoint.clone())),
            AttributeNames {
                request_message: config.saml2.attributes.request_message.clone(),
                email: config.saml2.attributes.email.clone(),
            },
        ));

        Ok(Self {
            database_connection,
            saml2_auth,
            login_event_bus: Arc::new(LoginEventBus::default().with_listener(Arc::new(TracingLoginListener))),
            post_login_resolver,
            routes: Arc::new((&config.saml2).into()),
        })
    }

    pub fn saml2(&self) -> impl Saml2UseCase {
        Saml2UseCaseImpl::new(
            self.database_connection.clone(),
            self.saml2_auth.clone(),
            self.login_event_bus.clone(),
            self.post_login_resolver.clone(),
            self.routes.clone(),
        )
    }
}

fn parse_certificate(key: &str, pem: &str) -> anyhow::Result<X509> {
    X509::from_pem(pem.as_bytes()).map_err(|e| anyhow::anyhow!("{key} is not a valid PEM certificate: {e}"))
}

async fn init_database_connection(config: &ApplicationConfig) -> anyhow::Result<Arc<DatabaseConnection>> {
    let database_host = &config.database.host;
    let database_port = config.database.port;
    let database_name = &config.database.database_name;
    let auth_method = create_database_auth_method(config);

    connect_to_database(database_host, database_port, database_name, &auth_method).await
}

fn create_database_auth_method(config: &ApplicationConfig) -> AuthMethod {
    match &config.database.auth {
        DatabaseAuthConfig::Credential { username, password } => {
            AuthMethod::Credential { username: username.to_owned(), password: password.to_owned() }
        }
    }
}

#[cfg(test)]
mod test {
    use super::parse_certificate;

    #[test]
    fn when_certificate_is_an_empty_pem_block_then_error_names_the_config_key() {
        let pem = "-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n";

        let error = parse_certificate("saml2.idp_certificate", pem).expect_err("parsing should fail");

        assert!(error.to_string().starts_with("saml2.idp_certificate is not a valid PEM certificate"));
    }
}
