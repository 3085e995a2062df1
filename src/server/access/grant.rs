use anyhow::Result;

use crate::server::db::{GrantIdent, Transaction};

use super::{AccessCheck, AccessMode, AncestorCache, ModeResponse};

/// Grants access through an individual accepted grant matching the
/// requester's user, e-mail, or token. A grant on the record itself always
/// counts; a grant on an ancestor counts only when flagged recursive. A
/// grant outside its validity window does not count.
pub struct GrantMode;

impl GrantMode {
    pub fn new() -> Self {
        Self
    }

    fn ident(check: &AccessCheck) -> GrantIdent {
        let user = if check.principal.is_anonymous {
            None
        } else {
            Some(check.principal.name.clone())
        };
        let email = check
            .credential
            .as_ref()
            .and_then(|c| c.email())
            .map(String::from)
            .or_else(|| check.principal.email.clone());
        let token = check
            .credential
            .as_ref()
            .and_then(|c| c.token())
            .map(String::from);

        GrantIdent { user, email, token }
    }
}

impl AccessMode for GrantMode {
    fn check(
        &self,
        tx: &dyn Transaction,
        check: &AccessCheck,
        cache: &mut AncestorCache,
    ) -> Result<ModeResponse> {
        let ident = Self::ident(check);
        if ident.is_empty() {
            return Ok(ModeResponse::Continue);
        }

        let direct = tx.find_enabled_grants(&ident, &[check.resource], false)?;
        if direct.iter().any(|g| g.in_window(check.now)) {
            return Ok(ModeResponse::Allow);
        }

        let ancestors = cache.ancestors(tx, check.resource)?;
        if !ancestors.is_empty() {
            let inherited = tx.find_enabled_grants(&ident, &ancestors, true)?;
            if inherited.iter().any(|g| g.in_window(check.now)) {
                return Ok(ModeResponse::Allow);
            }
        }

        Ok(ModeResponse::Continue)
    }
}
