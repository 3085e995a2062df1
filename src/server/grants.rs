use std::sync::Arc;

use anyhow::{anyhow, Result};
use rand::Rng;
use thiserror::Error;

use crate::server::authn::Principal;
use crate::server::db::{Database, GrantRecord, Transaction};
use crate::time::parse_time;
use crate::types::grant::{GrantStatus, GrantSubmission};
use crate::types::level::AccessLevel;
use crate::types::request::Query;

const TOKEN_LENGTH: usize = 16;
const TOKEN_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("grant not found")]
    NotFound,

    #[error("permission denied: {0}")]
    Denied(&'static str),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GrantError {
    fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<GrantError>() {
            Ok(err) => err,
            Err(err) => GrantError::Internal(err),
        }
    }
}

/// The access-request lifecycle. Visitors submit requests for themselves;
/// administrators issue, accept, and reject them. `enabled` is always
/// recomputed from the status by the store, never set directly.
pub struct GrantService {
    db: Arc<Database>,
}

impl GrantService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Creates a grant from a submission.
    ///
    /// Visitors only get to name the resources and, when anonymous, their
    /// e-mail; status is forced to new (or renew when they re-request after
    /// a settled decision) and the privileged fields are ignored.
    /// Administrators may set every field; when they identify the requester
    /// by neither user nor e-mail, an opaque token is generated instead.
    pub fn submit(
        &self,
        principal: &Principal,
        submission: GrantSubmission,
    ) -> Result<GrantRecord, GrantError> {
        if submission.resources.is_empty() {
            return Err(GrantError::Invalid(
                "at least one resource is required".to_string(),
            ));
        }

        let admin = principal.is_admin;

        let (user, email) = if admin {
            if submission.user.is_some() && submission.email.is_some() {
                return Err(GrantError::Invalid(
                    "user and e-mail are mutually exclusive".to_string(),
                ));
            }
            (submission.user.clone(), submission.email.clone())
        } else if !principal.is_anonymous {
            (Some(principal.name.clone()), None)
        } else {
            match submission.email {
                Some(ref email) if email.contains('@') => (None, Some(email.clone())),
                _ => {
                    return Err(GrantError::Invalid(
                        "an e-mail address is required for anonymous requests".to_string(),
                    ))
                }
            }
        };

        let (recursive, start_time, end_time, status) = if admin {
            let start_time = parse_optional_time(submission.start.as_deref())?;
            let end_time = parse_optional_time(submission.end.as_deref())?;
            let status = submission.status.unwrap_or(GrantStatus::New);
            (submission.recursive, start_time, end_time, status)
        } else {
            (false, None, None, GrantStatus::New)
        };

        let resources = submission.resources.clone();
        let result = self.db.with_transaction(|tx| {
            let token = if admin && user.is_none() && email.is_none() {
                Some(generate_token(tx)?)
            } else {
                None
            };

            let status = if !admin && is_renewal(tx, user.as_deref(), email.as_deref(), &resources)? {
                GrantStatus::Renew
            } else {
                status
            };

            tx.create_grant(GrantRecord {
                id: 0,
                user: user.clone(),
                email: email.clone(),
                token,
                status,
                enabled: false,
                recursive,
                resources: resources.clone(),
                start_time,
                end_time,
                create_time: 0,
                update_time: 0,
            })
        });
        result.map_err(GrantError::from_anyhow)
    }

    /// Administrator decision: accept or reject an open request.
    pub fn decide(
        &self,
        principal: &Principal,
        id: u64,
        to: GrantStatus,
    ) -> Result<GrantRecord, GrantError> {
        if !principal.is_admin {
            return Err(GrantError::Denied("only administrators may decide grants"));
        }
        if !matches!(to, GrantStatus::Accepted | GrantStatus::Rejected) {
            return Err(GrantError::Invalid(format!(
                "a decision must be accepted or rejected, not {to}"
            )));
        }

        let result = self.db.with_transaction(|tx| {
            let grant = match tx.get_grant(id)? {
                Some(grant) => grant,
                None => return Err(GrantError::NotFound.into()),
            };
            if !grant.status.can_transition(to) {
                return Err(GrantError::Invalid(format!(
                    "cannot move a {} grant to {to}; settled grants are only re-opened by a new submission",
                    grant.status
                ))
                .into());
            }

            tx.update_grant_status(id, to)?;
            match tx.get_grant(id)? {
                Some(grant) => Ok(grant),
                None => Err(GrantError::NotFound.into()),
            }
        });
        result.map_err(GrantError::from_anyhow)
    }

    pub fn get(&self, principal: &Principal, id: u64) -> Result<GrantRecord, GrantError> {
        let result = self.db.with_transaction(|tx| {
            let grant = match tx.get_grant(id)? {
                Some(grant) => grant,
                None => return Err(GrantError::NotFound.into()),
            };
            if !Self::can_view(principal, &grant) {
                return Err(GrantError::Denied("not your grant").into());
            }
            Ok(grant)
        });
        result.map_err(GrantError::from_anyhow)
    }

    pub fn list(
        &self,
        principal: &Principal,
        mut query: Query,
    ) -> Result<Vec<GrantRecord>, GrantError> {
        if !principal.is_admin {
            if principal.is_anonymous {
                return Err(GrantError::Denied("authentication required to list grants"));
            }
            // Ordinary principals only ever see their own requests
            query.user = Some(principal.name.clone());
            query.email = None;
        }

        let result = self.db.with_transaction(|tx| tx.list_grants(query));
        result.map_err(GrantError::from_anyhow)
    }

    pub fn delete(&self, principal: &Principal, id: u64) -> Result<(), GrantError> {
        if !principal.is_admin {
            return Err(GrantError::Denied("only administrators may delete grants"));
        }

        let result = self.db.with_transaction(|tx| {
            if tx.get_grant(id)?.is_none() {
                return Err(GrantError::NotFound.into());
            }
            tx.delete_grant(id)
        });
        result.map_err(GrantError::from_anyhow)
    }

    fn can_view(principal: &Principal, grant: &GrantRecord) -> bool {
        if principal.is_admin {
            return true;
        }
        if !principal.is_anonymous && grant.user.as_deref() == Some(principal.name.as_str()) {
            return true;
        }
        matches!((&grant.email, &principal.email), (Some(a), Some(b)) if a == b)
    }
}

/// A visitor re-requesting after a settled decision comes back as a renewal.
fn is_renewal(
    tx: &dyn Transaction,
    user: Option<&str>,
    email: Option<&str>,
    resources: &[u64],
) -> Result<bool> {
    let query = Query {
        user: user.map(String::from),
        email: email.map(String::from),
        ..Default::default()
    };
    let existing = tx.list_grants(query)?;
    let settled = existing.iter().any(|grant| {
        !grant.status.is_open() && grant.resources.iter().any(|id| resources.contains(id))
    });
    Ok(settled)
}

fn generate_token(tx: &dyn Transaction) -> Result<String> {
    for _ in 0..TOKEN_ATTEMPTS {
        let token = random_token(TOKEN_LENGTH);
        // Level words are reserved in the access query parameter
        if AccessLevel::is_level_keyword(&token) {
            continue;
        }
        if !tx.is_token_exists(&token)? {
            return Ok(token);
        }
    }
    Err(anyhow!(
        "failed to generate a unique grant token after {TOKEN_ATTEMPTS} attempts"
    ))
}

fn random_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<u64>, GrantError> {
    match value {
        Some(s) => match parse_time(s) {
            Ok(time) => Ok(Some(time)),
            Err(err) => Err(GrantError::Invalid(format!("{err:#}"))),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> GrantService {
        GrantService::new(Arc::new(Database::new_test()))
    }

    fn email_submission(email: &str, resources: Vec<u64>) -> GrantSubmission {
        GrantSubmission {
            email: Some(email.to_string()),
            resources,
            ..Default::default()
        }
    }

    #[test]
    fn test_visitor_submission() {
        let service = service();
        let anon = Principal::anonymous();

        // Privileged fields are ignored for visitors
        let mut submission = email_submission("alice@example.org", vec![5]);
        submission.recursive = true;
        submission.start = Some("2024-01-01".to_string());
        submission.status = Some(GrantStatus::Accepted);

        let grant = service.submit(&anon, submission).unwrap();
        assert_eq!(grant.status, GrantStatus::New);
        assert!(!grant.enabled);
        assert!(!grant.recursive);
        assert!(grant.start_time.is_none());
        assert_eq!(grant.email.as_deref(), Some("alice@example.org"));
        assert!(grant.user.is_none());
        assert!(grant.token.is_none());

        // Anonymous without an e-mail is rejected
        let result = service.submit(&anon, GrantSubmission {
            resources: vec![5],
            ..Default::default()
        });
        assert!(matches!(result, Err(GrantError::Invalid(_))));

        // Empty resource set is rejected
        let result = service.submit(&anon, email_submission("alice@example.org", vec![]));
        assert!(matches!(result, Err(GrantError::Invalid(_))));
    }

    #[test]
    fn test_authenticated_submission() {
        let service = service();
        let bob = Principal::mock_user("Bob");

        // An authenticated visitor is identified by account, the submitted
        // e-mail is ignored
        let grant = service
            .submit(&bob, email_submission("other@example.org", vec![7]))
            .unwrap();
        assert_eq!(grant.user.as_deref(), Some("Bob"));
        assert!(grant.email.is_none());
        assert_eq!(grant.status, GrantStatus::New);
    }

    #[test]
    fn test_renewal() {
        let service = service();
        let admin = Principal::mock_admin();
        let bob = Principal::mock_user("Bob");

        let grant = service
            .submit(&bob, email_submission("x@example.org", vec![7]))
            .unwrap();
        service
            .decide(&admin, grant.id, GrantStatus::Rejected)
            .unwrap();

        // Re-requesting the same resource after a settled decision
        let renewed = service
            .submit(&bob, email_submission("x@example.org", vec![7, 8]))
            .unwrap();
        assert_eq!(renewed.status, GrantStatus::Renew);

        // A request for unrelated resources is a fresh one
        let fresh = service
            .submit(&bob, email_submission("x@example.org", vec![9]))
            .unwrap();
        assert_eq!(fresh.status, GrantStatus::New);
    }

    #[test]
    fn test_admin_token_issuance() {
        let service = service();
        let admin = Principal::mock_admin();

        let submission = GrantSubmission {
            resources: vec![5],
            status: Some(GrantStatus::Accepted),
            recursive: true,
            start: Some("2024-01-01".to_string()),
            end: Some("2024-06-01 12:00:00".to_string()),
            ..Default::default()
        };
        let grant = service.submit(&admin, submission).unwrap();

        // No user and no e-mail: a token is issued
        let token = grant.token.clone().unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(!AccessLevel::is_level_keyword(&token));

        assert_eq!(grant.status, GrantStatus::Accepted);
        assert!(grant.enabled);
        assert!(grant.recursive);
        assert!(grant.start_time.is_some());
        assert!(grant.end_time.is_some());
        assert!(grant.start_time < grant.end_time);

        // Admin naming a user gets no token
        let submission = GrantSubmission {
            user: Some("Carol".to_string()),
            resources: vec![5],
            ..Default::default()
        };
        let grant = service.submit(&admin, submission).unwrap();
        assert!(grant.token.is_none());

        // user + email together is rejected
        let submission = GrantSubmission {
            user: Some("Carol".to_string()),
            email: Some("carol@example.org".to_string()),
            resources: vec![5],
            ..Default::default()
        };
        assert!(matches!(
            service.submit(&admin, submission),
            Err(GrantError::Invalid(_))
        ));

        // Malformed dates are rejected
        let submission = GrantSubmission {
            resources: vec![5],
            start: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.submit(&admin, submission),
            Err(GrantError::Invalid(_))
        ));
    }

    #[test]
    fn test_decide() {
        let service = service();
        let admin = Principal::mock_admin();
        let bob = Principal::mock_user("Bob");

        let grant = service
            .submit(&bob, email_submission("x@example.org", vec![3]))
            .unwrap();

        // Only admins decide
        assert!(matches!(
            service.decide(&bob, grant.id, GrantStatus::Accepted),
            Err(GrantError::Denied(_))
        ));

        let decided = service
            .decide(&admin, grant.id, GrantStatus::Accepted)
            .unwrap();
        assert_eq!(decided.status, GrantStatus::Accepted);
        assert!(decided.enabled);

        // A settled grant cannot be decided again
        assert!(matches!(
            service.decide(&admin, grant.id, GrantStatus::Rejected),
            Err(GrantError::Invalid(_))
        ));

        // A decision must be accepted or rejected
        let open = service
            .submit(&bob, email_submission("x@example.org", vec![4]))
            .unwrap();
        assert!(matches!(
            service.decide(&admin, open.id, GrantStatus::New),
            Err(GrantError::Invalid(_))
        ));

        assert!(matches!(
            service.decide(&admin, 99999, GrantStatus::Accepted),
            Err(GrantError::NotFound)
        ));
    }

    #[test]
    fn test_view_privileges() {
        let service = service();
        let admin = Principal::mock_admin();
        let bob = Principal::mock_user("Bob");
        let carol = Principal::mock_user("Carol");
        let anon = Principal::anonymous();

        let grant = service
            .submit(&bob, email_submission("x@example.org", vec![3]))
            .unwrap();

        assert!(service.get(&admin, grant.id).is_ok());
        assert!(service.get(&bob, grant.id).is_ok());
        assert!(matches!(
            service.get(&carol, grant.id),
            Err(GrantError::Denied(_))
        ));

        // Listing is scoped to the caller's own grants
        let all = service.list(&admin, Query::default()).unwrap();
        assert_eq!(all.len(), 1);
        let own = service.list(&bob, Query::default()).unwrap();
        assert_eq!(own.len(), 1);
        let others = service.list(&carol, Query::default()).unwrap();
        assert!(others.is_empty());
        assert!(matches!(
            service.list(&anon, Query::default()),
            Err(GrantError::Denied(_))
        ));

        // Deleting is admin-only and explicit
        assert!(matches!(
            service.delete(&bob, grant.id),
            Err(GrantError::Denied(_))
        ));
        service.delete(&admin, grant.id).unwrap();
        assert!(matches!(
            service.get(&admin, grant.id),
            Err(GrantError::NotFound)
        ));
    }
}
