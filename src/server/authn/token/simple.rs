use anyhow::{bail, Result};

use super::{TokenGenerator, TokenIdentity, TokenResponse, TokenValidator};

#[derive(Debug, Clone)]
pub struct SimpleToken;

impl SimpleToken {
    pub fn new() -> Self {
        Self
    }
}

impl TokenGenerator for SimpleToken {
    fn generate_token(&self, identity: TokenIdentity) -> Result<TokenResponse> {
        Ok(TokenResponse {
            user: identity.user.clone(),
            token: format!("simple-token-{}", identity.user),
            expire_in: 0,
        })
    }
}

impl TokenValidator for SimpleToken {
    fn validate_token(&self, token: &str) -> Result<TokenIdentity> {
        match token.strip_prefix("simple-token-") {
            Some(user) => Ok(TokenIdentity::user(user)),
            None => bail!("invalid simple token"),
        }
    }
}

mod tests {
    use super::*;

    #[test]
    fn test_simple_token() {
        let simple = SimpleToken::new();

        let token = simple
            .generate_token(TokenIdentity::user("Alice"))
            .unwrap();
        assert_eq!(token.token, "simple-token-Alice");

        let identity = simple.validate_token(&token.token).unwrap();
        assert_eq!(identity.user, "Alice");

        assert!(simple.validate_token("bogus").is_err());
    }
}
