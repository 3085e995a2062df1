use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::server::db::Database;

use super::config::{AccessConfig, MODE_ORDER};
use super::email::EmailMode;
use super::engine::AccessEngine;
use super::external::ExternalMode;
use super::grant::GrantMode;
use super::ip::{IpMode, IpReservations};
use super::user::SessionMode;
use super::UnionMode;

/// Factory for building the access decision engine. Enabled modes are
/// assembled in the fixed [`MODE_ORDER`]; disabled modes are simply absent
/// from the chain.
pub struct AccessFactory;

impl AccessFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_engine(&self, cfg: &AccessConfig, db: Arc<Database>) -> Result<AccessEngine> {
        let mut modes = Vec::new();

        for name in MODE_ORDER {
            if !cfg.modes.iter().any(|m| m == name) {
                continue;
            }
            let mode = match name {
                "ip" => {
                    if cfg.ip.is_empty() {
                        warn!("IP mode is enabled but no reservations are configured");
                    }
                    let reservations = IpReservations::compile(&cfg.ip)?;
                    UnionMode::Ip(IpMode::new(reservations))
                }
                "session" => UnionMode::Session(SessionMode::new()),
                "external" => {
                    if cfg.providers.is_empty() {
                        warn!("External mode is enabled but no providers are configured");
                    }
                    UnionMode::External(ExternalMode::new(
                        cfg.providers.iter().cloned().collect(),
                    ))
                }
                "email" => {
                    if cfg.email_patterns.is_empty() {
                        warn!("Email mode is enabled but no patterns are configured");
                    }
                    UnionMode::Email(EmailMode::new(cfg.email_patterns.clone()))
                }
                "grant" => UnionMode::Grant(GrantMode::new()),
                _ => unreachable!("mode names are validated by config"),
            };
            modes.push(mode);
        }

        if cfg.bypass_embargo {
            warn!("Embargo bypass is enabled, active embargoes will not deny access");
        }

        Ok(AccessEngine::new(db, modes, cfg.bypass_embargo))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CommonConfig;

    use super::*;

    #[test]
    fn test_factory() {
        let factory = AccessFactory::new();
        let db = Arc::new(Database::new_test());

        // Default config: ip, session, grant
        let cfg = AccessConfig::default();
        let engine = factory.build_engine(&cfg, db.clone()).unwrap();
        let names: Vec<_> = engine.modes().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["ip", "session", "grant"]);

        // Every mode enabled, config order does not matter
        let mut cfg = AccessConfig::default();
        cfg.modes = vec![
            "grant".to_string(),
            "email".to_string(),
            "ip".to_string(),
            "external".to_string(),
            "session".to_string(),
        ];
        let engine = factory.build_engine(&cfg, db.clone()).unwrap();
        let names: Vec<_> = engine.modes().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["ip", "session", "external", "email", "grant"]);

        // No modes at all is a valid (deny-everything-restricted) setup
        let mut cfg = AccessConfig::default();
        cfg.modes = vec![];
        let engine = factory.build_engine(&cfg, db.clone()).unwrap();
        assert!(engine.modes().is_empty());

        // Bad reservations abort the build
        let mut cfg = AccessConfig::default();
        cfg.ip = vec![crate::server::access::config::IpRuleConfig {
            range: "not-an-ip".to_string(),
            allow: vec![],
            deny: vec![],
        }];
        assert!(factory.build_engine(&cfg, db).is_err());
    }
}
