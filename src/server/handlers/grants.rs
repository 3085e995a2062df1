use log::error;

use crate::server::grants::{GrantError, GrantService};
use crate::server::authn::Principal;
use crate::server::response::{self, Response};
use crate::types::grant::{Grant, GrantDecision, GrantSubmission};
use crate::types::request::Query;

use crate::server::db::GrantRecord;

use super::parse_body;

/// REST surface of the access-request lifecycle under `/api/grants`.
pub struct GrantsHandler {
    service: GrantService,
}

impl GrantsHandler {
    pub fn new(service: GrantService) -> Self {
        Self { service }
    }

    pub fn handle(
        &self,
        method: &str,
        id: Option<u64>,
        body: Option<Vec<u8>>,
        principal: Principal,
    ) -> Response {
        match (method, id) {
            ("put", None) => {
                let submission: GrantSubmission = match parse_body(body) {
                    Ok(submission) => submission,
                    Err(resp) => return resp,
                };
                match self.service.submit(&principal, submission) {
                    Ok(grant) => Response::json(to_api(grant)),
                    Err(err) => error_response(err),
                }
            }
            ("get", Some(id)) => match self.service.get(&principal, id) {
                Ok(grant) => Response::json(to_api(grant)),
                Err(err) => error_response(err),
            },
            ("get", None) => {
                let query: Query = match body {
                    Some(_) => match parse_body(body) {
                        Ok(query) => query,
                        Err(resp) => return resp,
                    },
                    None => Query::default(),
                };
                match self.service.list(&principal, query) {
                    Ok(grants) => {
                        let grants: Vec<Grant> = grants.into_iter().map(to_api).collect();
                        Response::json(grants)
                    }
                    Err(err) => error_response(err),
                }
            }
            ("patch", Some(id)) => {
                let decision: GrantDecision = match parse_body(body) {
                    Ok(decision) => decision,
                    Err(resp) => return resp,
                };
                match self.service.decide(&principal, id, decision.status) {
                    Ok(grant) => Response::json(to_api(grant)),
                    Err(err) => error_response(err),
                }
            }
            ("delete", Some(id)) => match self.service.delete(&principal, id) {
                Ok(()) => Response::ok(),
                Err(err) => error_response(err),
            },
            _ => Response::method_not_allowed(),
        }
    }
}

fn to_api(record: GrantRecord) -> Grant {
    let mut grant = Grant {
        id: record.id,
        user: record.user,
        email: record.email,
        token: record.token,
        status: record.status,
        enabled: record.enabled,
        recursive: record.recursive,
        resources: record.resources,
        start: record.start_time,
        end: record.end_time,
        temporal: false,
        create_time: record.create_time,
        update_time: record.update_time,
    };
    grant.temporal = grant.is_temporal();
    grant
}

fn error_response(err: GrantError) -> Response {
    match err {
        GrantError::NotFound => Response::not_found(),
        GrantError::Denied(message) => Response::unauthorized(message),
        GrantError::Invalid(message) => Response::bad_request(message),
        GrantError::Internal(err) => {
            error!("Grant operation failed: {err:#}");
            Response::error(response::DATABASE_ERROR)
        }
    }
}
