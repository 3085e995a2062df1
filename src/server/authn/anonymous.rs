use actix_web::HttpRequest;
use anyhow::Result;

use super::{Authenticator, AuthnResponse, Principal};

/// Authenticator that provides anonymous access when no other authentication
/// is available. Anonymous visitors still go through the access decision
/// engine; their requests simply carry no account identity.
pub struct AnonymousAuthenticator;

impl AnonymousAuthenticator {
    pub fn new() -> Self {
        Self {}
    }
}

impl Authenticator for AnonymousAuthenticator {
    fn authenticate_request(
        &self,
        _req: &HttpRequest,
        user: Option<Principal>,
    ) -> Result<AuthnResponse> {
        if let Some(user) = user {
            return Ok(AuthnResponse::Ok(user));
        }

        Ok(AuthnResponse::Ok(Principal::anonymous()))
    }
}
