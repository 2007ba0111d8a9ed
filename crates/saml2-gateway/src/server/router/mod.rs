use std::sync::Arc;

use crate::application::Application;

pub(crate) mod saml2;

pub(crate) fn router(application: Arc<Application>) -> axum::Router {
    axum::Router::new().nest("/saml2", saml2::router(application))
}
