use anyhow::{bail, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::time::current_timestamp;

use super::{TokenGenerator, TokenIdentity, TokenResponse, TokenValidator};

/// JWT issuer identifier
const ISSUER: &str = "agate/jwt-tokenizer";

/// Claims represents public claim values (as specified in RFC 7519), plus
/// the private claims agate needs to rebuild the principal.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    pub exp: usize,  // Required. Token expiration time (timestamp)
    pub iat: usize,  // Time at which token was issued (timestamp)
    pub iss: String, // Token issuer
    pub nbf: usize,  // Time before which token must not be accepted (timestamp)
    pub sub: String, // Subject of the token (user identifier)

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<String>,
}

pub struct JwtTokenGenerator {
    key: EncodingKey, // Private key for signing
    expiry: usize,
}

impl JwtTokenGenerator {
    pub fn new(private_key: &[u8], expiry: u64) -> Result<Self> {
        let key = match EncodingKey::from_rsa_pem(private_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA private key for jwt token generation failed: {e}"),
        };
        Ok(Self {
            key,
            expiry: expiry as usize,
        })
    }
}

impl TokenGenerator for JwtTokenGenerator {
    fn generate_token(&self, identity: TokenIdentity) -> Result<TokenResponse> {
        if identity.user.is_empty() {
            bail!("empty user identifier for jwt token");
        }
        let now = current_timestamp() as usize;

        let claims = Claims {
            exp: now + self.expiry,
            iat: now,
            iss: String::from(ISSUER),
            nbf: now,
            sub: identity.user,
            email: identity.email,
            providers: identity.providers,
        };

        // Sign the claims using RS256 algorithm
        match encode(&Header::new(Algorithm::RS256), &claims, &self.key) {
            Ok(token) => Ok(TokenResponse {
                user: claims.sub,
                token,
                expire_in: claims.exp,
            }),
            Err(e) => bail!("generate jwt token failed: {e}"),
        }
    }
}

pub struct JwtTokenValidator {
    key: DecodingKey,
}

impl JwtTokenValidator {
    pub fn new(public_key: &[u8]) -> Result<Self> {
        let key = match DecodingKey::from_rsa_pem(public_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA public key for jwt token validation failed: {e}"),
        };
        Ok(Self { key })
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate_token(&self, token: &str) -> Result<TokenIdentity> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]); // Validate issuer
        validation.set_required_spec_claims(&["exp", "iat", "iss", "nbf", "sub"]);
        // Temporal claims are checked by hand below, against our own clock
        validation.validate_exp = false;
        validation.validate_nbf = false;

        // Verify token signature and decode
        let claims = match decode::<Claims>(token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => bail!("validate jwt token failed: {e}"),
        };

        // Verify subject is not empty
        if claims.sub.is_empty() {
            bail!("validate jwt token failed: empty subject");
        }

        let now = current_timestamp() as usize;
        if now >= claims.exp {
            bail!("validate jwt token failed: token expired");
        }

        if now < claims.nbf {
            bail!("validate jwt token failed: token not yet valid");
        }

        Ok(TokenIdentity {
            user: claims.sub,
            email: claims.email,
            providers: claims.providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::rsa::generate_rsa_keys;
    use crate::server::authn::token::tests::{run_token_expiry_tests, run_token_tests};

    use super::*;

    #[test]
    fn test_jwt() {
        let (public_key, private_key) = generate_rsa_keys().unwrap();
        let generator = JwtTokenGenerator::new(&private_key, 3600).unwrap();
        let validator = JwtTokenValidator::new(&public_key).unwrap();

        run_token_tests(&generator, &validator);
        run_token_expiry_tests(&generator, &validator, 3600);
    }
}
