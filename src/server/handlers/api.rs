use std::sync::Arc;

use actix_web::HttpRequest;
use log::error;

use crate::server::access::engine::AccessEngine;
use crate::server::authn::chain::ChainAuthenticator;
use crate::server::authn::token::jwt::JwtTokenValidator;
use crate::server::authn::{Authenticator, AuthnResponse, Principal};
use crate::server::db::Database;
use crate::server::grants::GrantService;
use crate::server::jobs::{PropagateJob, SweepJob};
use crate::server::response::{self, Response};
use crate::types::response::WhoamiResponse;

use super::check::CheckHandler;
use super::grants::GrantsHandler;
use super::jobs::JobsHandler;
use super::resources::ResourcesHandler;
use super::Handler;

pub struct ApiHandler {
    authn: ChainAuthenticator<JwtTokenValidator>,

    check: CheckHandler,
    grants: GrantsHandler,
    resources: ResourcesHandler,
    jobs: JobsHandler,
}

impl ApiHandler {
    pub fn new(
        authn: ChainAuthenticator<JwtTokenValidator>,
        engine: Arc<AccessEngine>,
        trust_forwarded: bool,
        db: Arc<Database>,
        propagate: Arc<PropagateJob>,
        sweep: Arc<SweepJob>,
    ) -> Self {
        Self {
            authn,
            check: CheckHandler::new(engine, trust_forwarded),
            grants: GrantsHandler::new(GrantService::new(db.clone())),
            resources: ResourcesHandler::new(db, propagate.clone()),
            jobs: JobsHandler::new(propagate, sweep),
        }
    }

    fn split_api_path(path: &str) -> Result<(String, Option<String>), &'static str> {
        // Remove trailing slash if present
        let path = path.trim_end_matches('/');

        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [] => Err("empty path"),
            [""] => Err("empty resource"),
            [resource] => Ok((resource.to_string(), None)),
            [resource, id] => Ok((resource.to_string(), Some(id.to_string()))),
            _ => Err("invalid path format"),
        }
    }

    fn handle_whoami(&self, user: Principal) -> Response {
        Response::json(WhoamiResponse {
            name: user.name,
            is_admin: user.is_admin,
            is_anonymous: user.is_anonymous,
        })
    }
}

impl Handler for ApiHandler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let method = req.method().as_str().to_lowercase();
        let authn_resp = match self.authn.authenticate_request(&req, None) {
            Ok(resp) => resp,
            Err(e) => {
                error!("Authentication failed: {e:#}");
                return Response::error(response::AUTHN_ERROR);
            }
        };
        let principal = match authn_resp {
            AuthnResponse::Ok(principal) => principal,
            AuthnResponse::Continue => {
                return Response::unauthenticated("Authentication required")
            }
            AuthnResponse::Unauthenticated => return Response::unauthenticated("Invalid token"),
        };

        // The check endpoint keeps its raw tail: it carries the resource id
        // and reads query parameters from the request itself
        if let Some(rest) = path.strip_prefix("check/") {
            if method != "get" {
                return Response::method_not_allowed();
            }
            return self.check.handle(rest, &req, principal);
        }

        let (resource, id) = match Self::split_api_path(path) {
            Ok((resource, id)) => (resource, id),
            Err(msg) => return Response::bad_request(msg),
        };

        match resource.as_str() {
            "whoami" => {
                if id.is_some() {
                    return Response::bad_request("whoami does not take an id");
                }
                if method != "get" {
                    return Response::method_not_allowed();
                }
                self.handle_whoami(principal)
            }
            "grants" => {
                let id = match parse_id(id) {
                    Ok(id) => id,
                    Err(resp) => return resp,
                };
                self.grants.handle(&method, id, body, principal)
            }
            "resources" => {
                let id = match parse_id(id) {
                    Ok(id) => id,
                    Err(resp) => return resp,
                };
                self.resources.handle(&method, id, body, principal)
            }
            "jobs" => match id {
                Some(job) => self.jobs.handle(&method, &job, body, principal),
                None => Response::bad_request("Job name is required"),
            },
            _ => Response::not_found(),
        }
    }
}

fn parse_id(id: Option<String>) -> Result<Option<u64>, Response> {
    match id {
        Some(id) => match id.parse::<u64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => Err(Response::bad_request("Invalid resource id")),
        },
        None => Ok(None),
    }
}
