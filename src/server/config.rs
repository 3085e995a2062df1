use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::access::config::AccessConfig;
use super::authn::config::AuthnConfig;
use super::db::config::DbConfig;
use super::jobs::config::JobsConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default = "ServerConfig::default_ssl")]
    pub ssl: bool,

    #[serde(default = "ServerConfig::default_cert_path")]
    pub cert_path: String,

    #[serde(default = "ServerConfig::default_key_path")]
    pub key_path: String,

    #[serde(default = "ServerConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "ServerConfig::default_workers")]
    pub workers: u64,

    #[serde(default = "ServerConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    #[serde(default = "AuthnConfig::default")]
    pub authn: AuthnConfig,

    #[serde(default = "AccessConfig::default")]
    pub access: AccessConfig,

    #[serde(default = "DbConfig::default")]
    pub db: DbConfig,

    #[serde(default = "JobsConfig::default")]
    pub jobs: JobsConfig,
}

impl CommonConfig for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: Self::default_ssl(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            payload_limit_mib: Self::default_payload_limit_mib(),
            authn: AuthnConfig::default(),
            access: AccessConfig::default(),
            db: DbConfig::default(),
            jobs: JobsConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            let path = ps.pki_path.join("server.crt");
            self.cert_path = format!("{}", path.display());
        }

        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            let path = ps.pki_path.join("server.key");
            self.key_path = format!("{}", path.display());
        }

        if self.payload_limit_mib == 0 {
            bail!("payload_limit_mib cannot be 0");
        }

        self.authn.complete(ps).context("authn")?;
        self.access.complete(ps).context("access")?;
        self.db.complete(ps).context("db")?;
        self.jobs.complete(ps).context("jobs")?;

        Ok(())
    }
}

impl ServerConfig {
    fn default_bind() -> String {
        String::from("127.0.0.1:7817")
    }

    fn default_ssl() -> bool {
        false
    }

    fn default_cert_path() -> String {
        String::new()
    }

    fn default_key_path() -> String {
        String::new()
    }

    fn default_keep_alive_secs() -> u64 {
        0
    }

    fn default_workers() -> u64 {
        0
    }

    fn default_payload_limit_mib() -> usize {
        10
    }
}
