use std::sync::Arc;

use anyhow::{Context, Result};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};

use crate::server::access::factory::AccessFactory;
use crate::server::authn::factory::AuthnFactory;
use crate::server::authn::token::factory::TokenFactory;
use crate::server::db::factory::DbFactory;
use crate::server::handlers::api::ApiHandler;
use crate::server::handlers::healthz::HealthzHandler;
use crate::server::handlers::login::LoginHandler;
use crate::server::jobs::factory::JobsFactory;
use crate::server::jobs::{PropagateJob, SweepJob};

use super::config::ServerConfig;
use super::db::Database;
use super::restful::{RestfulContext, RestfulServer};

pub struct ServerFactory {
    db: Arc<Database>,
    cfg: ServerConfig,
}

impl ServerFactory {
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        let db_factory = DbFactory::new();
        let db = db_factory.build_db(&cfg.db).context("init database")?;
        Ok(Self { cfg, db })
    }

    pub fn build_server(&self) -> Result<RestfulServer> {
        let ssl = self.build_ssl()?;
        let ctx = self.build_context()?;

        let mut srv =
            RestfulServer::new(self.cfg.bind.clone(), ssl, ctx, self.cfg.payload_limit_mib);
        if self.cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(self.cfg.keep_alive_secs);
        }
        if self.cfg.workers > 0 {
            srv.set_workers(self.cfg.workers);
        }

        Ok(srv)
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&self.cfg.key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&self.cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }

    pub fn build_context(&self) -> Result<Arc<RestfulContext>> {
        let token_factory = TokenFactory::new(&self.cfg.authn.token).context("init token")?;

        let authn_factory = AuthnFactory::new();
        let authn = authn_factory
            .build_authenticator(&self.cfg.authn, &token_factory)
            .context("init authenticator")?;

        let access_factory = AccessFactory::new();
        let engine = Arc::new(
            access_factory
                .build_engine(&self.cfg.access, self.db.clone())
                .context("init access engine")?,
        );

        let propagate = self.build_propagate_job();
        let sweep = self.build_sweep_job();

        let api_handler = ApiHandler::new(
            authn,
            engine,
            self.cfg.access.trust_forwarded,
            self.db.clone(),
            propagate,
            sweep,
        );
        let healthz_handler = HealthzHandler::new();

        let token_generator = token_factory
            .build_token_generator()
            .context("init token generator")?;
        let admin_password = if !self.cfg.authn.admin_password.is_empty() {
            Some(self.cfg.authn.admin_password.clone())
        } else {
            None
        };
        let login_handler = LoginHandler::new(
            admin_password,
            self.cfg.authn.admin_allow_list.clone(),
            token_generator,
        );

        let ctx = RestfulContext {
            api_handler,
            healthz_handler,
            login_handler,
        };
        Ok(Arc::new(ctx))
    }

    /// Jobs for on-demand invocation; always built, whatever the periodic
    /// loop settings say.
    pub fn build_propagate_job(&self) -> Arc<PropagateJob> {
        Arc::new(PropagateJob::new(
            self.db.clone(),
            self.cfg.jobs.propagate.clone(),
        ))
    }

    pub fn build_sweep_job(&self) -> Arc<SweepJob> {
        Arc::new(SweepJob::new(
            self.db.clone(),
            self.cfg.jobs.sweep.clone(),
            self.cfg.jobs.propagate.property.clone(),
            self.cfg.jobs.propagate.batch_size,
        ))
    }

    pub fn build_periodic_jobs(
        &self,
    ) -> Result<(Option<Arc<PropagateJob>>, Option<Arc<SweepJob>>)> {
        let jobs_factory = JobsFactory::new();
        jobs_factory.build_periodic_jobs(&self.cfg.jobs, self.db.clone())
    }
}
