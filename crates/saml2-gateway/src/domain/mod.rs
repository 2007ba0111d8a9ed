pub(crate) mod error_redirect;
pub(crate) mod event;
pub(crate) mod login;
pub(crate) mod message;
pub(crate) mod saml2;
pub(crate) mod user;
