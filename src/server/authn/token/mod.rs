pub mod config;
pub mod factory;
pub mod jwt;

#[cfg(test)]
mod simple;

use anyhow::Result;

use crate::types::token::TokenResponse;

/// Identity carried inside a bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenIdentity {
    pub user: String,
    pub email: Option<String>,
    pub providers: Vec<String>,
}

impl TokenIdentity {
    pub fn user(user: impl ToString) -> Self {
        Self {
            user: user.to_string(),
            email: None,
            providers: vec![],
        }
    }
}

pub trait TokenGenerator {
    fn generate_token(&self, identity: TokenIdentity) -> Result<TokenResponse>;
}

pub trait TokenValidator {
    fn validate_token(&self, token: &str) -> Result<TokenIdentity>;
}
