use serde::Deserialize;

use crate::{
    application::saml2::LogoutCommand,
    domain::saml2::{Binding, Saml2Payload},
};

/// Protocol parameters of the HTTP-Redirect and HTTP-POST bindings.
#[derive(Deserialize, Default)]
pub(super) struct Saml2MessageRequest {
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

impl Saml2MessageRequest {
    pub fn into_payload(self, binding: Binding, raw_query: Option<String>) -> Saml2Payload {
        Saml2Payload {
            saml_request: self.saml_request,
            saml_response: self.saml_response,
            relay_state: self.relay_state,
            binding,
            raw_query,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LogoutRequest {
    pub return_to: Option<String>,
    pub session_index: Option<String>,
    pub name_id: Option<String>,
}

impl From<LogoutRequest> for LogoutCommand {
    fn from(value: LogoutRequest) -> Self {
        Self { return_to: value.return_to, name_id: value.name_id, session_index: value.session_index }
    }
}
