use std::collections::HashSet;

use actix_web::HttpRequest;
use log::{error, info};

use crate::server::authn::token::jwt::JwtTokenGenerator;
use crate::server::authn::token::{TokenGenerator, TokenIdentity};
use crate::server::response::{self, Response};

use super::Handler;

/// Issues the administrator bearer token. Ordinary principals never log in
/// here; their tokens come from the identity provider that signs them.
pub struct LoginHandler {
    admin_password: Option<String>,
    admin_allow_list: HashSet<String>,
    token_generator: JwtTokenGenerator,
}

impl LoginHandler {
    pub fn new(
        admin_password: Option<String>,
        admin_allow_list: HashSet<String>,
        token_generator: JwtTokenGenerator,
    ) -> Self {
        Self {
            admin_password,
            admin_allow_list,
            token_generator,
        }
    }

    fn is_addr_allowed(&self, req: &HttpRequest) -> bool {
        if self.admin_allow_list.contains("*") {
            return true;
        }
        let conn_info = req.connection_info();
        match conn_info.peer_addr() {
            Some(addr) => self.admin_allow_list.contains(addr),
            None => false,
        }
    }
}

impl Handler for LoginHandler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let name = path.trim_end_matches('/').to_string();
        if name.is_empty() {
            return Response::bad_request("User name is required");
        }

        if name != "admin" {
            return Response::unauthenticated(
                "only the admin account logs in here, user tokens are issued externally",
            );
        }

        let password = match body {
            Some(body) => match String::from_utf8(body) {
                Ok(password) => password,
                Err(_) => return Response::bad_request("Invalid password"),
            },
            None => return Response::bad_request("Password is required"),
        };

        let admin_password = match self.admin_password {
            Some(ref admin_password) => admin_password,
            None => return Response::unauthenticated("Admin is disabled"),
        };
        if !self.is_addr_allowed(&req) {
            return Response::unauthenticated("Address is not allowed to login as admin");
        }
        if admin_password != &password {
            return Response::unauthenticated("Invalid admin password");
        }

        let token = match self.token_generator.generate_token(TokenIdentity::user(name)) {
            Ok(token) => token,
            Err(e) => {
                error!("Generate admin token failed: {e:#}");
                return Response::error(response::TOKEN_ERROR);
            }
        };

        info!("Admin logged in");
        Response::json(token)
    }
}
