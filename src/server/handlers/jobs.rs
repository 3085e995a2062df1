use std::sync::Arc;

use log::error;

use crate::server::authn::Principal;
use crate::server::jobs::{PropagateArgs, PropagateJob, SweepJob, SyncDirection, WriteScope};
use crate::server::response::{self, Response};
use crate::time::current_timestamp;
use crate::types::request::PropagateRequest;

use super::parse_body;

/// On-demand job invocation under `/api/jobs`. Administrators only; the
/// result of a run is its log lines, the response merely acknowledges.
pub struct JobsHandler {
    propagate: Arc<PropagateJob>,
    sweep: Arc<SweepJob>,
}

impl JobsHandler {
    pub fn new(propagate: Arc<PropagateJob>, sweep: Arc<SweepJob>) -> Self {
        Self { propagate, sweep }
    }

    pub fn handle(
        &self,
        method: &str,
        job: &str,
        body: Option<Vec<u8>>,
        principal: Principal,
    ) -> Response {
        if method != "post" {
            return Response::method_not_allowed();
        }
        if !principal.is_admin {
            return Response::unauthorized("only administrators may invoke jobs");
        }

        match job {
            "propagate" => {
                let request: PropagateRequest = match body {
                    Some(_) => match parse_body(body) {
                        Ok(request) => request,
                        Err(resp) => return resp,
                    },
                    None => PropagateRequest::default(),
                };

                let args = if !request.backfill && request.sync.is_none() && request.cascade.is_empty() {
                    PropagateArgs::periodic(self.propagate.mirror_enabled())
                } else {
                    let sync = match request.sync.as_deref() {
                        Some(value) => match SyncDirection::parse(value) {
                            Ok(direction) => Some(direction),
                            Err(err) => return Response::bad_request(format!("{err:#}")),
                        },
                        None => None,
                    };
                    PropagateArgs {
                        backfill: request.backfill,
                        sync,
                        cascade: request.cascade,
                    }
                };

                match self.propagate.run(&args, &WriteScope::All) {
                    Ok(()) => Response::ok(),
                    Err(err) => {
                        error!("Propagation job failed: {err:#}");
                        Response::error(response::JOB_ERROR)
                    }
                }
            }
            "sweep" => match self.sweep.run(current_timestamp()) {
                Ok(()) => Response::ok(),
                Err(err) => {
                    error!("Embargo sweep job failed: {err:#}");
                    Response::error(response::JOB_ERROR)
                }
            },
            _ => Response::not_found(),
        }
    }
}
