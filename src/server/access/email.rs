use anyhow::Result;

use crate::server::db::Transaction;

use super::{AccessCheck, AccessMode, AncestorCache, ModeResponse};

/// Grants access when the principal's e-mail (or an e-mail supplied in the
/// `access` parameter) matches one of the configured patterns. A pattern is
/// either an exact address or a `*suffix` wildcard such as `*@example.org`.
pub struct EmailMode {
    patterns: Vec<String>,
}

impl EmailMode {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    fn matches(&self, email: &str) -> bool {
        for pattern in self.patterns.iter() {
            let hit = match pattern.strip_prefix('*') {
                Some(suffix) => email.to_lowercase().ends_with(&suffix.to_lowercase()),
                None => email.eq_ignore_ascii_case(pattern),
            };
            if hit {
                return true;
            }
        }
        false
    }
}

impl AccessMode for EmailMode {
    fn check(
        &self,
        _tx: &dyn Transaction,
        check: &AccessCheck,
        _cache: &mut AncestorCache,
    ) -> Result<ModeResponse> {
        if let Some(ref email) = check.principal.email {
            if self.matches(email) {
                return Ok(ModeResponse::Allow);
            }
        }
        if let Some(email) = check.credential.as_ref().and_then(|c| c.email()) {
            if self.matches(email) {
                return Ok(ModeResponse::Allow);
            }
        }
        Ok(ModeResponse::Continue)
    }
}
