use std::sync::Arc;

use axum::{
    extract::{Query, RawQuery, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Form, Router,
};
use axum_thiserror::ErrorStatus;
use thiserror::Error;

use crate::{
    application::{
        self,
        saml2::{Saml2Redirect, Saml2UseCase},
        Application,
    },
    domain::saml2::Binding,
};

use self::request::{LogoutRequest, Saml2MessageRequest};

mod request;

pub(crate) fn router(application: Arc<Application>) -> axum::Router {
    Router::new()
        .route("/metadata", get(handle_metadata))
        .route("/acs", get(handle_acs_redirect).post(handle_acs_post))
        .route("/sls", get(handle_sls_redirect).post(handle_sls_post))
        .route("/logout", get(handle_logout))
        .route("/login", get(handle_login))
        .with_state(application)
}

async fn handle_metadata(State(application): State<Arc<Application>>) -> Result<impl IntoResponse, Saml2RouteError> {
    let metadata = application.saml2().metadata()?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, "text/xml")], metadata))
}

async fn handle_acs_redirect(
    State(application): State<Arc<Application>>,
    RawQuery(raw_query): RawQuery,
    Query(payload): Query<Saml2MessageRequest>,
) -> Result<Saml2Redirect, Saml2RouteError> {
    Ok(application.saml2().acs(payload.into_payload(Binding::Redirect, raw_query)).await?)
}

async fn handle_acs_post(
    State(application): State<Arc<Application>>,
    RawQuery(raw_query): RawQuery,
    Form(payload): Form<Saml2MessageRequest>,
) -> Result<Saml2Redirect, Saml2RouteError> {
    Ok(application.saml2().acs(payload.into_payload(Binding::Post, raw_query)).await?)
}

async fn handle_sls_redirect(
    State(application): State<Arc<Application>>,
    RawQuery(raw_query): RawQuery,
    Query(payload): Query<Saml2MessageRequest>,
) -> Result<Saml2Redirect, Saml2RouteError> {
    Ok(application.saml2().sls(payload.into_payload(Binding::Redirect, raw_query))?)
}

async fn handle_sls_post(
    State(application): State<Arc<Application>>,
    RawQuery(raw_query): RawQuery,
    Form(payload): Form<Saml2MessageRequest>,
) -> Result<Saml2Redirect, Saml2RouteError> {
    Ok(application.saml2().sls(payload.into_payload(Binding::Post, raw_query))?)
}

async fn handle_logout(
    State(application): State<Arc<Application>>,
    Query(payload): Query<LogoutRequest>,
) -> Result<Saml2Redirect, Saml2RouteError> {
    Ok(application.saml2().logout(payload.into())?)
}

async fn handle_login(State(application): State<Arc<Application>>) -> Result<Saml2Redirect, Saml2RouteError> {
    Ok(application.saml2().login()?)
}

#[derive(Error, Debug, ErrorStatus)]
pub enum Saml2RouteError {
    #[error("Could not log out")]
    #[status(StatusCode::INTERNAL_SERVER_ERROR)]
    CouldNotLogOut,

    #[error("Failed to handle the SAML2 request")]
    #[status(StatusCode::INTERNAL_SERVER_ERROR)]
    Saml2Auth,
}

impl From<application::saml2::Error> for Saml2RouteError {
    fn from(value: application::saml2::Error) -> Self {
        match value {
            application::saml2::Error::CouldNotLogOut => Self::CouldNotLogOut,
            application::saml2::Error::Saml2Auth(_) => Self::Saml2Auth,
        }
    }
}
