use std::sync::Arc;

use anyhow::Result;
use log::error;

use crate::server::authn::Principal;
use crate::server::db::{Database, ResourceRecord, StatusRecord, Transaction, WriteScope};
use crate::server::jobs::PropagateJob;
use crate::server::response::{self, Response};
use crate::time::parse_time;
use crate::types::level::AccessLevel;
use crate::types::resource::{Resource, ResourceKind, ResourcePatch};
use crate::types::status::AccessStatus;

/// The record registry under `/api/resources`: the minimal resource store
/// the access index is kept consistent with. Creating or editing records
/// here is what triggers the propagation machinery.
pub struct ResourcesHandler {
    db: Arc<Database>,
    propagate: Arc<PropagateJob>,
}

impl ResourcesHandler {
    pub fn new(db: Arc<Database>, propagate: Arc<PropagateJob>) -> Self {
        Self { db, propagate }
    }

    pub fn handle(
        &self,
        method: &str,
        id: Option<u64>,
        body: Option<Vec<u8>>,
        principal: Principal,
    ) -> Response {
        match (method, id) {
            ("put", None) => self.handle_create(body, principal),
            ("get", Some(id)) => self.handle_get(id),
            ("patch", Some(id)) => self.handle_patch(id, body, principal),
            ("delete", Some(id)) => self.handle_delete(id, principal),
            _ => Response::method_not_allowed(),
        }
    }

    fn handle_create(&self, body: Option<Vec<u8>>, principal: Principal) -> Response {
        if principal.is_anonymous {
            return Response::unauthorized("authentication required to create resources");
        }
        let submission: Resource = match super::parse_body(body) {
            Ok(submission) => submission,
            Err(resp) => return resp,
        };

        let owner = if principal.is_admin && !submission.owner.is_empty() {
            submission.owner.clone()
        } else {
            principal.name.clone()
        };

        let result = self.db.with_transaction(|tx| {
            if let Err(message) = validate_parent(tx, submission.kind, submission.parent)? {
                return Ok(Err(message));
            }
            let record = tx.create_resource(ResourceRecord {
                id: 0,
                kind: submission.kind,
                parent: submission.parent,
                public: submission.public,
                owner: owner.clone(),
                create_time: 0,
                update_time: 0,
            })?;
            Ok(Ok(record))
        });

        let record = match result {
            Ok(Ok(record)) => record,
            Ok(Err(message)) => return Response::bad_request(message),
            Err(err) => {
                error!("Create resource failed: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }
        };

        // A freshly created record gets its index row from visibility
        if let Err(err) = self.propagate.run_backfill() {
            error!("Backfill after resource creation failed: {err:#}");
        }

        self.handle_get(record.id)
    }

    fn handle_get(&self, id: u64) -> Response {
        let result = self
            .db
            .with_transaction(|tx| Ok((tx.get_resource(id)?, tx.get_status(id)?)));
        match result {
            Ok((Some(record), status)) => Response::json(to_api(record, status)),
            Ok((None, _)) => Response::not_found(),
            Err(err) => {
                error!("Get resource {id} failed: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn handle_patch(&self, id: u64, body: Option<Vec<u8>>, principal: Principal) -> Response {
        let patch: ResourcePatch = match super::parse_body(body) {
            Ok(patch) => patch,
            Err(resp) => return resp,
        };

        let (record, status) = match self
            .db
            .with_transaction(|tx| Ok((tx.get_resource(id)?, tx.get_status(id)?)))
        {
            Ok((Some(record), status)) => (record, status),
            Ok((None, _)) => return Response::not_found(),
            Err(err) => {
                error!("Get resource {id} failed: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }
        };
        if !principal.is_admin && !principal.owns(&record.owner) {
            return Response::unauthorized("not your resource");
        }

        // Structural changes first
        let result = self.db.with_transaction(|tx| {
            if let Some(parent) = patch.parent {
                if let Err(message) = validate_parent(tx, record.kind, Some(parent))? {
                    return Ok(Some(message));
                }
                tx.update_resource_parent(id, Some(parent))?;
            }
            if let Some(public) = patch.public {
                tx.update_resource_visibility(id, public)?;
            }
            Ok(None)
        });
        match result {
            Ok(None) => {}
            Ok(Some(message)) => return Response::bad_request(message),
            Err(err) => {
                error!("Update resource {id} failed: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }
        }

        // Then the access status, if the patch touches it
        let touches_status =
            patch.level.is_some() || patch.embargo_start.is_some() || patch.embargo_end.is_some() || patch.clear_embargo;
        if touches_status {
            let level = match patch.level.or(status.as_ref().map(|s| s.level)) {
                Some(level) => level,
                None => AccessLevel::Free,
            };
            let (embargo_start, embargo_end) = if patch.clear_embargo {
                (None, None)
            } else {
                let start = match parse_patch_time(patch.embargo_start.as_deref()) {
                    Ok(time) => time.or(status.as_ref().and_then(|s| s.embargo_start)),
                    Err(resp) => return resp,
                };
                let end = match parse_patch_time(patch.embargo_end.as_deref()) {
                    Ok(time) => time.or(status.as_ref().and_then(|s| s.embargo_end)),
                    Err(resp) => return resp,
                };
                (start, end)
            };

            let result = self.db.with_transaction(|tx| {
                tx.upsert_status(StatusRecord {
                    resource: id,
                    level,
                    embargo_start,
                    embargo_end,
                    update_time: 0,
                })
            });
            if let Err(err) = result {
                error!("Update status of resource {id} failed: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }

            if patch.recursive {
                let scope = if principal.is_admin {
                    WriteScope::All
                } else {
                    WriteScope::OwnedOrPublic(principal.name.clone())
                };
                if let Err(err) = self.propagate.run_cascade(id, &scope) {
                    error!("Cascade from resource {id} failed: {err:#}");
                    return Response::error(response::JOB_ERROR);
                }
            }
        }

        self.handle_get(id)
    }

    fn handle_delete(&self, id: u64, principal: Principal) -> Response {
        let result = self.db.with_transaction(|tx| {
            let record = match tx.get_resource(id)? {
                Some(record) => record,
                None => return Ok(Some(Response::not_found())),
            };
            if !principal.is_admin && !principal.owns(&record.owner) {
                return Ok(Some(Response::unauthorized("not your resource")));
            }
            tx.delete_resource(id)?;
            Ok(None)
        });
        match result {
            Ok(Some(resp)) => resp,
            Ok(None) => Response::ok(),
            Err(err) => {
                error!("Delete resource {id} failed: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }
}

/// Container rule: items live in collections, parts live in items, and
/// collections have no parent. A missing parent is always acceptable.
fn validate_parent(
    tx: &dyn Transaction,
    kind: ResourceKind,
    parent: Option<u64>,
) -> Result<Result<(), String>> {
    let parent = match parent {
        Some(parent) => parent,
        None => return Ok(Ok(())),
    };
    let expected = match kind.parent_kind() {
        Some(expected) => expected,
        None => {
            return Ok(Err(format!(
                "a {} cannot have a parent",
                kind.as_str()
            )))
        }
    };
    match tx.get_resource(parent)? {
        Some(record) if record.kind == expected => Ok(Ok(())),
        Some(record) => Ok(Err(format!(
            "a {} must live in a {}, resource {parent} is a {}",
            kind.as_str(),
            expected.as_str(),
            record.kind.as_str()
        ))),
        None => Ok(Err(format!("parent resource {parent} does not exist"))),
    }
}

fn parse_patch_time(value: Option<&str>) -> Result<Option<u64>, Response> {
    match value {
        Some(s) => match parse_time(s) {
            Ok(time) => Ok(Some(time)),
            Err(err) => Err(Response::bad_request(format!("{err:#}"))),
        },
        None => Ok(None),
    }
}

fn to_api(record: ResourceRecord, status: Option<StatusRecord>) -> Resource {
    Resource {
        id: record.id,
        kind: record.kind,
        parent: record.parent,
        public: record.public,
        owner: record.owner,
        create_time: record.create_time,
        update_time: record.update_time,
        status: status.map(|s| AccessStatus {
            resource: s.resource,
            level: s.level,
            embargo_start: s.embargo_start,
            embargo_end: s.embargo_end,
            update_time: s.update_time,
        }),
    }
}
