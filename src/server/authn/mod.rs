mod admin;
mod anonymous;
mod bearer_token;
mod union;

pub mod chain;
pub mod config;
pub mod factory;
pub mod token;

use std::collections::HashSet;

use actix_web::HttpRequest;
use anyhow::Result;

pub trait Authenticator: Send + Sync {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<Principal>,
    ) -> Result<AuthnResponse>;
}

/// Possible responses from an authentication check.
#[derive(Debug, Clone)]
pub enum AuthnResponse {
    /// The request carries this principal
    Ok(Principal),
    /// Defers decision to next authenticator in chain
    Continue,
    /// The request carried credentials, but they are invalid
    Unauthenticated,
}

/// The requesting principal, as established by the authentication chain.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Account name; empty for anonymous visitors
    pub name: String,
    /// E-mail, when the identity provider supplied one
    pub email: Option<String>,
    /// Tags of the external identity providers that vouch for this principal
    pub providers: HashSet<String>,
    /// Blanket view-all capability
    pub is_admin: bool,
    pub is_anonymous: bool,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            email: None,
            providers: HashSet::new(),
            is_admin: false,
            is_anonymous: true,
        }
    }

    /// Whether this principal owns a resource with the given owner field.
    pub fn owns(&self, owner: &str) -> bool {
        !self.is_anonymous && !owner.is_empty() && self.name == owner
    }
}

#[cfg(test)]
impl Principal {
    pub fn mock_user(name: &str) -> Self {
        Self {
            name: name.to_string(),
            email: None,
            providers: HashSet::new(),
            is_admin: false,
            is_anonymous: false,
        }
    }

    pub fn mock_admin() -> Self {
        Self {
            name: "admin".to_string(),
            email: None,
            providers: HashSet::new(),
            is_admin: true,
            is_anonymous: false,
        }
    }
}
