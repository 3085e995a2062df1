use std::collections::HashSet;

use anyhow::Result;

use crate::server::db::Transaction;

use super::{AccessCheck, AccessMode, AncestorCache, ModeResponse};

/// Grants access when any of the principal's external identity-provider
/// tags is among the configured providers.
pub struct ExternalMode {
    providers: HashSet<String>,
}

impl ExternalMode {
    pub fn new(providers: HashSet<String>) -> Self {
        Self { providers }
    }
}

impl AccessMode for ExternalMode {
    fn check(
        &self,
        _tx: &dyn Transaction,
        check: &AccessCheck,
        _cache: &mut AncestorCache,
    ) -> Result<ModeResponse> {
        let vouched = check
            .principal
            .providers
            .iter()
            .any(|p| self.providers.contains(p));
        if vouched {
            Ok(ModeResponse::Allow)
        } else {
            Ok(ModeResponse::Continue)
        }
    }
}
