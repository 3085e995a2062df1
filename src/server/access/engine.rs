use std::sync::Arc;

use anyhow::Result;

use crate::server::db::{Database, StatusRecord, Transaction};
use crate::types::level::AccessLevel;

use super::embargo::{embargo_state, EmbargoState};
use super::{AccessCheck, AccessMode, AncestorCache, ModeResponse, UnionMode};

/// The access decision engine. Orchestrates the embargo evaluator and the
/// configured credential modes against one content request.
pub struct AccessEngine {
    db: Arc<Database>,
    modes: Vec<UnionMode>,
    bypass_embargo: bool,
}

impl AccessEngine {
    pub fn new(db: Arc<Database>, modes: Vec<UnionMode>, bypass_embargo: bool) -> Self {
        Self {
            db,
            modes,
            bypass_embargo,
        }
    }

    pub fn modes(&self) -> &[UnionMode] {
        &self.modes
    }

    /// Decides one content request. Always resolves to a boolean: an error
    /// here means the store itself failed, never "denied".
    pub fn is_allowed(&self, check: &AccessCheck, cache: &mut AncestorCache) -> Result<bool> {
        self.db
            .with_transaction(|tx| self.decide(tx, check, cache))
    }

    fn decide(
        &self,
        tx: &dyn Transaction,
        check: &AccessCheck,
        cache: &mut AncestorCache,
    ) -> Result<bool> {
        // Owner and blanket-rights short circuits
        if let Some(record) = cache.resource(tx, check.resource)? {
            if check.principal.owns(&record.owner) {
                return Ok(true);
            }
        }
        if check.principal.is_admin {
            return Ok(true);
        }

        // No status here nor on any ancestor means default free. This is
        // deliberately fail-open: absent index data must never lock every
        // visitor out of a record nobody restricted.
        let status = match self.resolve_status(tx, check, cache)? {
            Some(status) => status,
            None => return Ok(true),
        };

        // Forbidden wins over everything, embargo included
        if status.level == AccessLevel::Forbidden {
            return Ok(false);
        }

        let under_embargo =
            embargo_state(status.embargo_start, status.embargo_end, check.now)
                == EmbargoState::Active;
        if under_embargo && !self.bypass_embargo {
            return Ok(false);
        }

        if status.level == AccessLevel::Free {
            return Ok(true);
        }

        // Reserved or protected: first mode to allow wins
        for mode in self.modes.iter() {
            if let ModeResponse::Allow = mode.check(tx, check, cache)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The record's own status, or the nearest ancestor's when the record
    /// has none.
    fn resolve_status(
        &self,
        tx: &dyn Transaction,
        check: &AccessCheck,
        cache: &mut AncestorCache,
    ) -> Result<Option<StatusRecord>> {
        if let Some(status) = tx.get_status(check.resource)? {
            return Ok(Some(status));
        }
        for ancestor in cache.ancestors(tx, check.resource)? {
            if let Some(status) = tx.get_status(ancestor)? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use crate::server::access::config::IpRuleConfig;
    use crate::server::access::grant::GrantMode;
    use crate::server::access::ip::{IpMode, IpReservations};
    use crate::server::access::user::SessionMode;
    use crate::server::authn::Principal;
    use crate::server::db::{GrantRecord, ResourceRecord};
    use crate::types::grant::GrantStatus;
    use crate::types::request::AccessCredential;
    use crate::types::resource::ResourceKind;

    use super::*;

    const NOW: u64 = 1_000_000;

    struct Fixture {
        db: Arc<Database>,
        collection: u64,
        item: u64,
        part: u64,
        sibling: u64,
    }

    fn build_fixture() -> Fixture {
        let db = Arc::new(Database::new_test());
        let (collection, item, part, sibling) = db
            .with_transaction(|tx| {
                let collection = tx.create_resource(ResourceRecord {
                    id: 0,
                    kind: ResourceKind::Collection,
                    parent: None,
                    public: true,
                    owner: "Alice".to_string(),
                    create_time: 0,
                    update_time: 0,
                })?;
                let item = tx.create_resource(ResourceRecord {
                    id: 0,
                    kind: ResourceKind::Item,
                    parent: Some(collection.id),
                    public: true,
                    owner: "Alice".to_string(),
                    create_time: 0,
                    update_time: 0,
                })?;
                let part = tx.create_resource(ResourceRecord {
                    id: 0,
                    kind: ResourceKind::Part,
                    parent: Some(item.id),
                    public: true,
                    owner: "Alice".to_string(),
                    create_time: 0,
                    update_time: 0,
                })?;
                let sibling = tx.create_resource(ResourceRecord {
                    id: 0,
                    kind: ResourceKind::Part,
                    parent: Some(item.id),
                    public: true,
                    owner: "Alice".to_string(),
                    create_time: 0,
                    update_time: 0,
                })?;
                Ok((collection.id, item.id, part.id, sibling.id))
            })
            .unwrap();

        Fixture {
            db,
            collection,
            item,
            part,
            sibling,
        }
    }

    fn set_status(
        db: &Database,
        resource: u64,
        level: AccessLevel,
        start: Option<u64>,
        end: Option<u64>,
    ) {
        db.with_transaction(|tx| {
            tx.upsert_status(StatusRecord {
                resource,
                level,
                embargo_start: start,
                embargo_end: end,
                update_time: 0,
            })
        })
        .unwrap();
    }

    fn engine(db: Arc<Database>, modes: Vec<UnionMode>, bypass: bool) -> AccessEngine {
        AccessEngine::new(db, modes, bypass)
    }

    fn check<'a>(resource: u64, principal: &'a Principal) -> AccessCheck<'a> {
        AccessCheck {
            resource,
            principal,
            credential: None,
            client_ip: None,
            now: NOW,
        }
    }

    fn allowed(engine: &AccessEngine, check: &AccessCheck) -> bool {
        let mut cache = AncestorCache::new();
        engine.is_allowed(check, &mut cache).unwrap()
    }

    #[test]
    fn test_forbidden_denies_everyone() {
        let fx = build_fixture();
        set_status(&fx.db, fx.part, AccessLevel::Forbidden, None, None);
        let engine = engine(fx.db.clone(), vec![UnionMode::Session(SessionMode::new())], false);

        let anon = Principal::anonymous();
        let user = Principal::mock_user("Bob");
        assert!(!allowed(&engine, &check(fx.part, &anon)));
        assert!(!allowed(&engine, &check(fx.part, &user)));

        // Embargo fields make no difference to forbidden
        set_status(&fx.db, fx.part, AccessLevel::Forbidden, Some(NOW - 10), Some(NOW + 10));
        assert!(!allowed(&engine, &check(fx.part, &user)));

        // Owner and blanket rights still get through
        let owner = Principal::mock_user("Alice");
        let admin = Principal::mock_admin();
        assert!(allowed(&engine, &check(fx.part, &owner)));
        assert!(allowed(&engine, &check(fx.part, &admin)));
    }

    #[test]
    fn test_missing_status_defaults_to_allow() {
        let fx = build_fixture();
        let engine = engine(fx.db.clone(), vec![], false);
        let anon = Principal::anonymous();

        // No status anywhere in the hierarchy
        assert!(allowed(&engine, &check(fx.part, &anon)));
        // Unknown resource id is also fail-open
        assert!(allowed(&engine, &check(99999, &anon)));
    }

    #[test]
    fn test_ancestor_status_fallback() {
        let fx = build_fixture();
        set_status(&fx.db, fx.collection, AccessLevel::Forbidden, None, None);
        let engine = engine(fx.db.clone(), vec![], false);
        let anon = Principal::anonymous();

        // Collection status governs the part lacking its own row
        assert!(!allowed(&engine, &check(fx.part, &anon)));

        // The record's own row beats the ancestor's
        set_status(&fx.db, fx.part, AccessLevel::Free, None, None);
        assert!(allowed(&engine, &check(fx.part, &anon)));
    }

    #[test]
    fn test_embargo_overrides_free() {
        let fx = build_fixture();
        set_status(
            &fx.db,
            fx.part,
            AccessLevel::Free,
            Some(NOW - 864000),
            Some(NOW + 864000),
        );
        let engine_strict = engine(fx.db.clone(), vec![], false);
        let anon = Principal::anonymous();
        assert!(!allowed(&engine_strict, &check(fx.part, &anon)));
    }

    #[test]
    fn test_embargo_bypass() {
        let fx = build_fixture();
        set_status(
            &fx.db,
            fx.part,
            AccessLevel::Reserved,
            Some(NOW - 864000),
            Some(NOW + 864000),
        );

        let anon = Principal::anonymous();
        let strict = engine(fx.db.clone(), vec![UnionMode::Session(SessionMode::new())], false);
        assert!(!allowed(&strict, &check(fx.part, &anon)));

        // With bypass the embargo is ignored, but the level still applies:
        // anonymous fails the session mode, an authenticated user passes
        let bypass = engine(fx.db.clone(), vec![UnionMode::Session(SessionMode::new())], true);
        assert!(!allowed(&bypass, &check(fx.part, &anon)));
        let user = Principal::mock_user("Bob");
        assert!(allowed(&bypass, &check(fx.part, &user)));

        // An elapsed embargo no longer denies
        set_status(
            &fx.db,
            fx.part,
            AccessLevel::Free,
            Some(NOW - 864000),
            Some(NOW - 1000),
        );
        assert!(allowed(&strict, &check(fx.part, &anon)));

        // Free under an active embargo: denied normally, open with bypass
        set_status(
            &fx.db,
            fx.part,
            AccessLevel::Free,
            Some(NOW - 864000),
            Some(NOW + 864000),
        );
        assert!(!allowed(&strict, &check(fx.part, &anon)));
        assert!(allowed(&bypass, &check(fx.part, &anon)));
    }

    #[test]
    fn test_ip_mode() {
        let fx = build_fixture();
        set_status(&fx.db, fx.part, AccessLevel::Reserved, None, None);

        let reservations = IpReservations::compile(&[IpRuleConfig {
            range: "10.1.0.0/16".to_string(),
            allow: vec![fx.collection],
            deny: vec![],
        }])
        .unwrap();
        let engine = engine(
            fx.db.clone(),
            vec![UnionMode::Ip(IpMode::new(reservations))],
            false,
        );

        let anon = Principal::anonymous();
        let mut req = check(fx.part, &anon);
        req.client_ip = Some(IpAddr::V4(Ipv4Addr::new(10, 1, 5, 9)));
        assert!(allowed(&engine, &req));

        // Outside the reserved range
        let mut req = check(fx.part, &anon);
        req.client_ip = Some(IpAddr::V4(Ipv4Addr::new(10, 2, 5, 9)));
        assert!(!allowed(&engine, &req));

        // No client address at all
        assert!(!allowed(&engine, &check(fx.part, &anon)));
    }

    #[test]
    fn test_ip_mode_deny_list() {
        let fx = build_fixture();
        set_status(&fx.db, fx.part, AccessLevel::Reserved, None, None);

        let reservations = IpReservations::compile(&[IpRuleConfig {
            range: "10.1.0.0/16".to_string(),
            allow: vec![],
            deny: vec![fx.collection],
        }])
        .unwrap();
        let engine = engine(
            fx.db.clone(),
            vec![UnionMode::Ip(IpMode::new(reservations))],
            false,
        );

        let anon = Principal::anonymous();
        let mut req = check(fx.part, &anon);
        req.client_ip = Some(IpAddr::V4(Ipv4Addr::new(10, 1, 5, 9)));
        assert!(!allowed(&engine, &req));
    }

    #[test]
    fn test_grant_mode_token() {
        let fx = build_fixture();
        set_status(&fx.db, fx.item, AccessLevel::Protected, None, None);

        fx.db
            .with_transaction(|tx| {
                tx.create_grant(GrantRecord {
                    id: 0,
                    user: None,
                    email: None,
                    token: Some("tok-42".to_string()),
                    status: GrantStatus::Accepted,
                    enabled: false,
                    recursive: false,
                    resources: vec![fx.part],
                    start_time: None,
                    end_time: None,
                    create_time: 0,
                    update_time: 0,
                })
            })
            .unwrap();

        let engine = engine(fx.db.clone(), vec![UnionMode::Grant(GrantMode::new())], false);
        let anon = Principal::anonymous();

        let mut req = check(fx.part, &anon);
        req.credential = AccessCredential::parse("tok-42");
        assert!(allowed(&engine, &req));

        // Same token on the sibling record: denied
        let mut req = check(fx.sibling, &anon);
        req.credential = AccessCredential::parse("tok-42");
        assert!(!allowed(&engine, &req));

        // No credential: denied
        assert!(!allowed(&engine, &check(fx.part, &anon)));
    }

    #[test]
    fn test_grant_mode_recursive() {
        let fx = build_fixture();
        set_status(&fx.db, fx.collection, AccessLevel::Protected, None, None);

        fx.db
            .with_transaction(|tx| {
                // Recursive grant on the collection
                tx.create_grant(GrantRecord {
                    id: 0,
                    user: Some("Bob".to_string()),
                    email: None,
                    token: None,
                    status: GrantStatus::Accepted,
                    enabled: false,
                    recursive: true,
                    resources: vec![fx.collection],
                    start_time: None,
                    end_time: None,
                    create_time: 0,
                    update_time: 0,
                })?;
                // Non-recursive grant on the item helps nobody below it
                tx.create_grant(GrantRecord {
                    id: 0,
                    user: Some("Carol".to_string()),
                    email: None,
                    token: None,
                    status: GrantStatus::Accepted,
                    enabled: false,
                    recursive: false,
                    resources: vec![fx.item],
                    start_time: None,
                    end_time: None,
                    create_time: 0,
                    update_time: 0,
                })
            })
            .unwrap();

        let engine = engine(fx.db.clone(), vec![UnionMode::Grant(GrantMode::new())], false);

        let bob = Principal::mock_user("Bob");
        assert!(allowed(&engine, &check(fx.part, &bob)));
        assert!(allowed(&engine, &check(fx.item, &bob)));

        let carol = Principal::mock_user("Carol");
        assert!(allowed(&engine, &check(fx.item, &carol)));
        assert!(!allowed(&engine, &check(fx.part, &carol)));
    }

    #[test]
    fn test_grant_mode_temporal_window() {
        let fx = build_fixture();
        set_status(&fx.db, fx.part, AccessLevel::Reserved, None, None);

        fx.db
            .with_transaction(|tx| {
                tx.create_grant(GrantRecord {
                    id: 0,
                    user: None,
                    email: None,
                    token: Some("tok-window".to_string()),
                    status: GrantStatus::Accepted,
                    enabled: false,
                    recursive: false,
                    resources: vec![fx.part],
                    start_time: Some(NOW + 1000),
                    end_time: None,
                    create_time: 0,
                    update_time: 0,
                })
            })
            .unwrap();

        let engine = engine(fx.db.clone(), vec![UnionMode::Grant(GrantMode::new())], false);
        let anon = Principal::anonymous();

        // The grant only starts in the future
        let mut req = check(fx.part, &anon);
        req.credential = AccessCredential::parse("tok-window");
        assert!(!allowed(&engine, &req));

        let mut req = check(fx.part, &anon);
        req.credential = AccessCredential::parse("tok-window");
        req.now = NOW + 2000;
        assert!(allowed(&engine, &req));
    }

    #[test]
    fn test_mode_chain_first_allow_wins() {
        let fx = build_fixture();
        set_status(&fx.db, fx.part, AccessLevel::Reserved, None, None);

        let engine = engine(
            fx.db.clone(),
            vec![
                UnionMode::Session(SessionMode::new()),
                UnionMode::Grant(GrantMode::new()),
            ],
            false,
        );

        // Authenticated principal passes the session mode before the grant
        // mode is ever consulted
        let user = Principal::mock_user("Dora");
        assert!(allowed(&engine, &check(fx.part, &user)));

        let anon = Principal::anonymous();
        assert!(!allowed(&engine, &check(fx.part, &anon)));
    }
}
