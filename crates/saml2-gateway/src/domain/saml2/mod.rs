use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;
use url::Url;

mod samael_auth;

pub(crate) use samael_auth::{SamaelSaml2Auth, SamaelSaml2AuthConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Binding {
    #[default]
    Post,
    Redirect,
}

/// Raw SAML protocol parameters as received by an endpoint.
#[derive(Debug, Clone, Default)]
pub(crate) struct Saml2Payload {
    pub saml_request: Option<String>,
    pub saml_response: Option<String>,
    pub relay_state: Option<String>,
    pub binding: Binding,
    /// Query string exactly as the server received it, before any decoding.
    pub raw_query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LogoutParams {
    pub return_to: Option<String>,
    pub name_id: Option<String>,
    pub session_index: Option<String>,
}

/// Identity asserted by the IdP. Attribute values keep the order of the assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Saml2User {
    pub name_id: String,
    pub session_index: Option<String>,
    pub attributes: HashMap<String, Vec<String>>,
    pub intended_url: Option<String>,
}

impl Saml2User {
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|values| values.first()).map(String::as_str)
    }
}

#[cfg_attr(test, automock)]
pub(crate) trait Saml2Auth {
    fn metadata(&self) -> Result<String>;
    fn acs(&self, payload: &Saml2Payload) -> Result<Saml2User>;
    fn sls(&self, payload: &Saml2Payload, retrieve_parameters_from_server: bool) -> Result<()>;
    fn logout(&self, params: &LogoutParams) -> Result<Url>;
    fn login(&self, relay_route: &str) -> Result<Url>;
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("SAML response rejected: {}", .errors.join(", "))]
    Rejected { errors: Vec<String>, last_error_reason: String },
    #[error("{0}")]
    Identity(String),
    #[error("{0}")]
    Logout(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
