use axum::{
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tracing::error;

use crate::application::saml2::Saml2Redirect;

pub(crate) const ERROR_DETAIL_COOKIE: &str = "saml2_error_detail";
pub(crate) const ERROR_COOKIE: &str = "saml2_error";

impl IntoResponse for Saml2Redirect {
    fn into_response(self) -> Response {
        let Ok(location) = HeaderValue::try_from(self.location.as_str()) else {
            error!(location = %self.location.escape_debug(), "redirect location is not a valid header value.");
            return StatusCode::BAD_REQUEST.into_response();
        };

        let mut jar = CookieJar::new();

        if let Some(error_context) = self.error_context {
            jar = jar.add(flash_cookie(ERROR_DETAIL_COOKIE, &error_context.error_detail));
            if !error_context.errors.is_empty() {
                jar = jar.add(flash_cookie(ERROR_COOKIE, &error_context.errors));
            }
        }

        (StatusCode::SEE_OTHER, jar, [(LOCATION, location)]).into_response()
    }
}

/// One-shot cookie holding a JSON list, base64url encoded so it survives cookie value rules.
fn flash_cookie(name: &'static str, values: &[String]) -> Cookie<'static> {
    let value = URL_SAFE_NO_PAD.encode(serde_json::Value::from(values.to_vec()).to_string());

    Cookie::build((name, value)).path("/").http_only(true).same_site(SameSite::Lax).build()
}
