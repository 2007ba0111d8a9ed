use std::{
    collections::HashMap,
    io::{Read, Write},
};

use anyhow::anyhow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bon::Builder;
use chrono::Utc;
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use samael::{
    key_info::{KeyInfo, X509Data},
    metadata::{
        Endpoint, EntityDescriptor, IdpSsoDescriptor, KeyDescriptor, HTTP_POST_BINDING, HTTP_REDIRECT_BINDING,
    },
    schema::{Assertion, Issuer, LogoutRequest, LogoutResponse, NameID},
    service_provider::{ServiceProvider, ServiceProviderBuilder},
    traits::ToXml,
};
use tracing::{debug, info};
use ulid::Ulid;
use url::Url;

use super::{Binding, Error, LogoutParams, Result, Saml2Auth, Saml2Payload, Saml2User};

const SAML_STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

#[derive(Builder)]
#[builder(on(String, into))]
pub struct SamaelSaml2AuthConfig {
    entity_id: String,
    acs_url: String,
    sls_url: String,
    sso_url: String,
    idp_issuer: Option<String>,
    idp_slo_url: Option<String>,
    idp_certificate: openssl::x509::X509,
    certificate: Option<openssl::x509::X509>,
}

pub(crate) struct SamaelSaml2Auth {
    service_provider: ServiceProvider,
    metadata: String,
    entity_id: String,
    acs_url: String,
    sso_url: String,
    idp_slo_url: Option<String>,
}

impl SamaelSaml2Auth {
    pub fn new(config: SamaelSaml2AuthConfig) -> anyhow::Result<Self> {
        let single_logout_services = config.idp_slo_url.as_deref().map(idp_endpoints).unwrap_or_default();
        let signing_key = KeyDescriptor {
            key_use: Some("signing".to_owned()),
            key_info: KeyInfo {
                id: None,
                x509_data: Some(X509Data { certificates: vec![STANDARD.encode(config.idp_certificate.to_der()?)] }),
            },
            encryption_methods: None,
        };

        let mut builder = ServiceProviderBuilder::default();
        builder
            .entity_id(config.entity_id.clone())
            .idp_metadata(EntityDescriptor {
                entity_id: config.idp_issuer,
                idp_sso_descriptors: Some(vec![IdpSsoDescriptor {
                    single_sign_on_services: idp_endpoints(&config.sso_url),
                    id: None,
                    valid_until: None,
                    cache_duration: None,
                    protocol_support_enumeration: None,
                    error_url: None,
                    signature: None,
                    key_descriptors: vec![signing_key],
                    organization: None,
                    contact_people: vec![],
                    artifact_resolution_service: vec![],
                    single_logout_services,
                    manage_name_id_services: vec![],
                    name_id_formats: vec![],
                    want_authn_requests_signed: None,
                    name_id_mapping_services: vec![],
                    assertion_id_request_services: vec![],
                    attribute_profiles: vec![],
                    attributes: vec![],
                }]),
                ..Default::default()
            })
            .acs_url(config.acs_url.clone())
            .slo_url(config.sls_url)
            .allow_idp_initiated(true);
        if let Some(certificate) = config.certificate {
            builder.certificate(certificate);
        }
        let service_provider = builder.build()?;

        let metadata = service_provider
            .metadata()
            .map_err(|e| anyhow!("failed to build service provider metadata: {e}"))?
            .to_string()
            .map_err(|e| anyhow!("failed to serialize service provider metadata: {e}"))?;

        Ok(Self {
            service_provider,
            metadata,
            entity_id: config.entity_id,
            acs_url: config.acs_url,
            sso_url: config.sso_url,
            idp_slo_url: config.idp_slo_url,
        })
    }

    fn saml2_user(&self, assertion: Assertion, relay_state: Option<&str>) -> Result<Saml2User> {
        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|subject| subject.name_id.as_ref())
            .map(|name_id| name_id.value.clone())
            .ok_or_else(|| Error::Identity("name id not found in SAML assertion".to_owned()))?;

        let session_index = assertion
            .authn_statements
            .as_ref()
            .and_then(|statements| statements.first())
            .and_then(|statement| statement.session_index.clone());

        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        for attribute in assertion.attribute_statements.iter().flatten().flat_map(|statement| &statement.attributes) {
            let Some(name) = attribute.name.as_ref() else {
                continue;
            };
            attributes
                .entry(name.clone())
                .or_default()
                .extend(attribute.values.iter().filter_map(|value| value.value.clone()));
        }

        Ok(Saml2User {
            name_id,
            session_index,
            attributes,
            intended_url: intended_url(relay_state, &self.acs_url),
        })
    }
}

impl Saml2Auth for SamaelSaml2Auth {
    fn metadata(&self) -> Result<String> {
        Ok(self.metadata.clone())
    }

    fn acs(&self, payload: &Saml2Payload) -> Result<Saml2User> {
        let encoded = payload
            .saml_response
            .as_deref()
            .ok_or_else(|| rejected("invalid_binding", "SAML Response not found, only HTTP-POST binding is supported"))?;
        let raw_response = STANDARD.decode(encoded.as_bytes()).map_err(|e| rejected("invalid_response", e))?;
        let response = String::from_utf8(raw_response).map_err(|e| rejected("invalid_response", e))?;

        let assertion =
            self.service_provider.parse_xml_response(&response, None).map_err(|e| rejected("invalid_response", e))?;

        self.saml2_user(assertion, payload.relay_state.as_deref())
    }

    fn sls(&self, payload: &Saml2Payload, retrieve_parameters_from_server: bool) -> Result<()> {
        let payload = if retrieve_parameters_from_server { payload_from_raw_query(payload)? } else { payload.clone() };

        if let Some(ref encoded) = payload.saml_response {
            let response: LogoutResponse = decode_message(encoded, payload.binding)?
                .parse()
                .map_err(|e| Error::Logout(format!("invalid logout response: {e}")))?;
            let status = response.status.as_ref().and_then(|status| status.status_code.value.as_deref());

            if status != Some(SAML_STATUS_SUCCESS) {
                return Err(Error::Logout(format!("logout not success: {}", status.unwrap_or("unknown status"))));
            }

            debug!(in_response_to = ?response.in_response_to, "logout response accepted.");
            Ok(())
        } else if let Some(ref encoded) = payload.saml_request {
            let request: LogoutRequest = decode_message(encoded, payload.binding)?
                .parse()
                .map_err(|e| Error::Logout(format!("invalid logout request: {e}")))?;

            info!(request_id = ?request.id, session_index = ?request.session_index, "logout request received.");
            Ok(())
        } else {
            Err(Error::Logout("SAML LogoutRequest/LogoutResponse not found".to_owned()))
        }
    }

    fn logout(&self, params: &LogoutParams) -> Result<Url> {
        let destination = self
            .idp_slo_url
            .as_deref()
            .ok_or_else(|| Error::Logout("IdP single logout url is not configured".to_owned()))?;

        let request = LogoutRequest {
            id: Some(format!("_{}", Ulid::new())),
            version: Some("2.0".to_owned()),
            issue_instant: Some(Utc::now()),
            destination: Some(destination.to_owned()),
            issuer: Some(Issuer { value: Some(self.entity_id.clone()), ..Default::default() }),
            name_id: params.name_id.as_ref().map(|value| NameID { value: value.clone(), format: None }),
            session_index: params.session_index.clone(),
            signature: None,
        };
        let xml = request.to_string().map_err(|e| anyhow!("failed to serialize logout request: {e}"))?;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes()).map_err(anyhow::Error::from)?;
        let compressed = encoder.finish().map_err(anyhow::Error::from)?;

        let mut url = Url::parse(destination).map_err(anyhow::Error::from)?;
        url.query_pairs_mut().append_pair("SAMLRequest", &STANDARD.encode(compressed));
        if let Some(return_to) = params.return_to.as_deref().filter(|return_to| !return_to.is_empty()) {
            url.query_pairs_mut().append_pair("RelayState", return_to);
        }

        Ok(url)
    }

    fn login(&self, relay_route: &str) -> Result<Url> {
        let request = self
            .service_provider
            .make_authentication_request(&self.sso_url)
            .map_err(|e| anyhow!("failed to make SAML authentication request: {e}"))?;

        let url = request
            .redirect(relay_route)
            .map_err(|e| anyhow!("failed to encode SAML authentication request: {e}"))?
            .ok_or_else(|| anyhow!("SAML authentication request has no destination"))?;

        Ok(url)
    }
}

fn idp_endpoints(location: &str) -> Vec<Endpoint> {
    [HTTP_POST_BINDING, HTTP_REDIRECT_BINDING]
        .into_iter()
        .map(|binding| Endpoint { binding: binding.to_string(), location: location.to_owned(), response_location: None })
        .collect()
}

fn rejected(error: &str, reason: impl std::fmt::Display) -> Error {
    Error::Rejected { errors: vec![error.to_owned()], last_error_reason: reason.to_string() }
}

/// Relay state pointing back at the ACS itself carries no destination. Control characters never reach a
/// `Location` header.
fn intended_url(relay_state: Option<&str>, acs_url: &str) -> Option<String> {
    relay_state
        .filter(|relay_state| !relay_state.is_empty() && *relay_state != acs_url)
        .filter(|relay_state| !relay_state.chars().any(char::is_control))
        .map(str::to_owned)
}

fn payload_from_raw_query(payload: &Saml2Payload) -> Result<Saml2Payload> {
    let raw_query = payload
        .raw_query
        .as_deref()
        .ok_or_else(|| Error::Logout("query string is not available on the request".to_owned()))?;

    let mut from_server =
        Saml2Payload { binding: Binding::Redirect, raw_query: Some(raw_query.to_owned()), ..Default::default() };
    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        match key.as_ref() {
            "SAMLRequest" => from_server.saml_request = Some(value.into_owned()),
            "SAMLResponse" => from_server.saml_response = Some(value.into_owned()),
            "RelayState" => from_server.relay_state = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(from_server)
}

fn decode_message(encoded: &str, binding: Binding) -> Result<String> {
    let raw = STANDARD.decode(encoded.as_bytes()).map_err(|e| Error::Logout(format!("invalid base64 message: {e}")))?;

    match binding {
        Binding::Post => String::from_utf8(raw).map_err(|e| Error::Logout(format!("invalid message encoding: {e}"))),
        Binding::Redirect => {
            let mut message = String::new();
            DeflateDecoder::new(raw.as_slice())
                .read_to_string(&mut message)
                .map_err(|e| Error::Logout(format!("failed to inflate message: {e}")))?;
            Ok(message)
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
    use openssl::{
        asn1::Asn1Time,
        hash::MessageDigest,
        pkey::PKey,
        rsa::Rsa,
        x509::{X509NameBuilder, X509},
    };
    use samael::schema::{Assertion, LogoutRequest};

    use super::{
        decode_message, intended_url, payload_from_raw_query, Binding, Error, SamaelSaml2Auth, SamaelSaml2AuthConfig,
    };
    use crate::domain::saml2::{LogoutParams, Saml2Auth, Saml2Payload};

    const ACS_URL: &str = "https://sp.example.com/saml2/acs";
    const IDP_SLO_URL: &str = "https://idp.example.com/slo";
    const LOGOUT_RESPONSE: &str = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_1" Version="2.0"/>"#;

    fn idp_certificate() -> X509 {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "idp.example.com").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    fn saml2_auth(idp_slo_url: Option<&str>) -> SamaelSaml2Auth {
        SamaelSaml2Auth::new(
            SamaelSaml2AuthConfig::builder()
                .entity_id("https://sp.example.com/saml2/metadata")
                .acs_url(ACS_URL)
                .sls_url("https://sp.example.com/saml2/sls")
                .sso_url("https://idp.example.com/sso")
                .idp_issuer("https://idp.example.com")
                .maybe_idp_slo_url(idp_slo_url)
                .idp_certificate(idp_certificate())
                .build(),
        )
        .expect("creating saml2 auth should be successful")
    }

    fn logout_response(status_code: &str) -> String {
        STANDARD.encode(format!(
            r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_2" InResponseTo="_1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z"><samlp:Status><samlp:StatusCode Value="{status_code}"/></samlp:Status></samlp:LogoutResponse>"#
        ))
    }

    #[test]
    fn when_metadata_is_requested_then_sp_entity_id_and_acs_are_published() {
        let metadata = saml2_auth(None).metadata().expect("getting metadata should be successful");

        assert!(metadata.contains("https://sp.example.com/saml2/metadata"));
        assert!(metadata.contains(ACS_URL));
    }

    #[test]
    fn when_response_is_not_signed_by_idp_then_acs_rejects_it() {
        let unsigned_response = format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z" Destination="{ACS_URL}"><saml:Issuer>https://idp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status><saml:Assertion ID="_a1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z"><saml:Issuer>https://idp.example.com</saml:Issuer><saml:Subject><saml:NameID>mallory</saml:NameID></saml:Subject><saml:AttributeStatement><saml:Attribute Name="Email"><saml:AttributeValue>admin@example.com</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion></samlp:Response>"#
        );
        let payload =
            Saml2Payload { saml_response: Some(STANDARD.encode(unsigned_response)), ..Default::default() };

        let result = saml2_auth(None).acs(&payload);

        assert!(matches!(result, Err(Error::Rejected { ref errors, .. }) if errors == &["invalid_response"]));
    }

    #[test]
    fn when_response_is_missing_then_acs_rejects_the_binding() {
        let result = saml2_auth(None).acs(&Saml2Payload::default());

        assert!(matches!(result, Err(Error::Rejected { ref errors, .. }) if errors == &["invalid_binding"]));
    }

    #[test]
    fn when_assertion_is_converted_then_identity_keeps_name_id_session_and_attribute_order() {
        let assertion: Assertion = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_a1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z"><saml:Issuer>https://idp.example.com</saml:Issuer><saml:Subject><saml:NameID>jdoe</saml:NameID></saml:Subject><saml:AuthnStatement AuthnInstant="2024-01-01T00:00:00Z" SessionIndex="_session1"><saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</saml:AuthnContextClassRef></saml:AuthnContext></saml:AuthnStatement><saml:AttributeStatement><saml:Attribute Name="Email"><saml:AttributeValue>jdoe@example.com</saml:AttributeValue></saml:Attribute><saml:Attribute Name="Role"><saml:AttributeValue>doctor</saml:AttributeValue></saml:Attribute></saml:AttributeStatement><saml:AttributeStatement><saml:Attribute Name="Role"><saml:AttributeValue>admin</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion>"#
            .parse()
            .expect("parsing assertion should be successful");

        let user = saml2_auth(None)
            .saml2_user(assertion, Some("https://app.example.com/home"))
            .expect("converting assertion should be successful");

        assert_eq!(user.name_id, "jdoe");
        assert_eq!(user.session_index.as_deref(), Some("_session1"));
        assert_eq!(user.first_attribute("Email"), Some("jdoe@example.com"));
        assert_eq!(user.attributes["Role"], vec!["doctor", "admin"]);
        assert_eq!(user.intended_url.as_deref(), Some("https://app.example.com/home"));
    }

    #[test]
    fn when_logout_is_initiated_then_deflated_logout_request_and_relay_state_are_in_query() {
        let url = saml2_auth(Some(IDP_SLO_URL))
            .logout(&LogoutParams {
                return_to: Some("https://app.example.com/bye".to_owned()),
                name_id: Some("jdoe".to_owned()),
                session_index: Some("_session1".to_owned()),
            })
            .expect("initiating logout should be successful");

        assert!(url.as_str().starts_with(IDP_SLO_URL));
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let relay_state = query.iter().find(|(key, _)| key == "RelayState").map(|(_, value)| value.as_str());
        assert_eq!(relay_state, Some("https://app.example.com/bye"));

        let encoded = &query.iter().find(|(key, _)| key == "SAMLRequest").expect("SAMLRequest should be present").1;
        let mut xml = String::new();
        DeflateDecoder::new(STANDARD.decode(encoded).unwrap().as_slice()).read_to_string(&mut xml).unwrap();
        let request: LogoutRequest = xml.parse().expect("parsing logout request should be successful");

        assert_eq!(request.name_id.map(|name_id| name_id.value), Some("jdoe".to_owned()));
        assert_eq!(request.session_index.as_deref(), Some("_session1"));
        assert_eq!(request.destination.as_deref(), Some(IDP_SLO_URL));
    }

    #[test]
    fn when_idp_slo_url_is_not_configured_then_logout_fails() {
        let result = saml2_auth(None).logout(&LogoutParams::default());

        assert!(matches!(result, Err(Error::Logout(_))));
    }

    #[test]
    fn when_logout_response_is_not_success_then_sls_fails() {
        let payload = Saml2Payload {
            saml_response: Some(logout_response("urn:oasis:names:tc:SAML:2.0:status:Requester")),
            ..Default::default()
        };

        let result = saml2_auth(None).sls(&payload, false);

        assert!(matches!(result, Err(Error::Logout(ref message)) if message.starts_with("logout not success")));
    }

    #[test]
    fn when_logout_response_is_success_then_sls_succeeds() {
        let payload = Saml2Payload {
            saml_response: Some(logout_response("urn:oasis:names:tc:SAML:2.0:status:Success")),
            ..Default::default()
        };

        saml2_auth(None).sls(&payload, false).expect("sls should be successful");
    }

    #[test]
    fn when_login_is_initiated_then_relay_route_is_carried_in_relay_state() {
        let url = saml2_auth(None).login("/dashboard").expect("initiating login should be successful");

        assert!(url.as_str().starts_with("https://idp.example.com/sso"));
        assert!(url.query_pairs().any(|(key, value)| key == "RelayState" && value == "/dashboard"));
        assert!(url.query_pairs().any(|(key, _)| key == "SAMLRequest"));
    }

    #[test]
    fn when_relay_state_is_empty_or_points_to_acs_then_intended_url_is_none() {
        assert_eq!(intended_url(None, ACS_URL), None);
        assert_eq!(intended_url(Some(""), ACS_URL), None);
        assert_eq!(intended_url(Some(ACS_URL), ACS_URL), None);
        assert_eq!(intended_url(Some("/dashboard"), ACS_URL), Some("/dashboard".to_owned()));
    }

    #[test]
    fn when_relay_state_contains_control_characters_then_intended_url_is_none() {
        assert_eq!(intended_url(Some("/home\n"), ACS_URL), None);
        assert_eq!(intended_url(Some("/home\r\nSet-Cookie: a=b"), ACS_URL), None);
    }

    #[test]
    fn when_message_uses_redirect_binding_then_it_is_inflated() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(LOGOUT_RESPONSE.as_bytes()).expect("deflating should be successful");
        let encoded = STANDARD.encode(encoder.finish().expect("deflating should be successful"));

        let decoded = decode_message(&encoded, Binding::Redirect).expect("decoding should be successful");

        assert_eq!(decoded, LOGOUT_RESPONSE);
    }

    #[test]
    fn when_message_is_not_base64_then_decoding_fails_with_logout_error() {
        let result = decode_message("not base64!", Binding::Post);

        assert!(matches!(result, Err(Error::Logout(_))));
    }

    #[test]
    fn when_parameters_are_retrieved_from_server_then_raw_query_wins_over_extracted_values() {
        let payload = Saml2Payload {
            saml_response: Some("from-extractor".to_owned()),
            raw_query: Some("SAMLResponse=abc%2Bdef%3D&RelayState=%2Fhome&Signature=xyz".to_owned()),
            ..Default::default()
        };

        let from_server = payload_from_raw_query(&payload).expect("parsing query should be successful");

        assert_eq!(from_server.saml_response.as_deref(), Some("abc+def="));
        assert_eq!(from_server.relay_state.as_deref(), Some("/home"));
        assert_eq!(from_server.binding, Binding::Redirect);
    }

    #[test]
    fn when_raw_query_is_missing_then_retrieving_parameters_from_server_fails() {
        let result = payload_from_raw_query(&Saml2Payload::default());

        assert!(matches!(result, Err(Error::Logout(_))));
    }
}
