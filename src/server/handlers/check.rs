use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use actix_web::web::Query;
use actix_web::HttpRequest;
use log::error;

use crate::server::access::engine::AccessEngine;
use crate::server::access::{AccessCheck, AncestorCache};
use crate::server::authn::Principal;
use crate::server::response::{self, Response};
use crate::time::current_timestamp;
use crate::types::request::AccessCredential;
use crate::types::status::CheckResponse;

/// The decision boundary: `GET /api/check/{id}?access=...`. Resolves to an
/// allow/deny for every input; ambiguous credentials and malformed
/// addresses degrade to "no match", never to an error.
pub struct CheckHandler {
    engine: Arc<AccessEngine>,
    trust_forwarded: bool,
}

impl CheckHandler {
    pub fn new(engine: Arc<AccessEngine>, trust_forwarded: bool) -> Self {
        Self {
            engine,
            trust_forwarded,
        }
    }

    pub fn handle(&self, path: &str, req: &HttpRequest, principal: Principal) -> Response {
        let id: u64 = match path.trim_matches('/').parse() {
            Ok(id) => id,
            Err(_) => return Response::bad_request("Resource id is required"),
        };

        let credential = Self::parse_credential(req);
        let client_ip = self.resolve_client_ip(req);

        let check = AccessCheck {
            resource: id,
            principal: &principal,
            credential,
            client_ip,
            now: current_timestamp(),
        };
        let mut cache = AncestorCache::new();
        match self.engine.is_allowed(&check, &mut cache) {
            Ok(allow) => Response::json(CheckResponse { allow }),
            Err(e) => {
                error!("Access decision for resource {id} failed: {e:#}");
                Response::error(response::DECISION_ERROR)
            }
        }
    }

    fn parse_credential(req: &HttpRequest) -> Option<AccessCredential> {
        let params = Query::<HashMap<String, String>>::from_query(req.query_string()).ok()?;
        params
            .get("access")
            .and_then(|value| AccessCredential::parse(value))
    }

    /// The client address, optionally honoring forwarded headers. Anything
    /// unparseable counts as no address.
    fn resolve_client_ip(&self, req: &HttpRequest) -> Option<IpAddr> {
        if self.trust_forwarded {
            let conn_info = req.connection_info();
            if let Some(value) = conn_info.realip_remote_addr() {
                if let Ok(ip) = value.parse::<IpAddr>() {
                    return Some(ip);
                }
                if let Ok(addr) = value.parse::<SocketAddr>() {
                    return Some(addr.ip());
                }
            }
        }
        req.peer_addr().map(|addr| addr.ip())
    }
}
