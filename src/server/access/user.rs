use anyhow::Result;

use crate::server::db::Transaction;

use super::{AccessCheck, AccessMode, AncestorCache, ModeResponse};

/// Grants access to any authenticated session, whoever the account is.
pub struct SessionMode;

impl SessionMode {
    pub fn new() -> Self {
        Self
    }
}

impl AccessMode for SessionMode {
    fn check(
        &self,
        _tx: &dyn Transaction,
        check: &AccessCheck,
        _cache: &mut AncestorCache,
    ) -> Result<ModeResponse> {
        if check.principal.is_anonymous {
            return Ok(ModeResponse::Continue);
        }
        Ok(ModeResponse::Allow)
    }
}
