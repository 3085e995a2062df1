use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{self, Bytes, Data, PayloadConfig};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use super::handlers::api::ApiHandler;
use super::handlers::healthz::HealthzHandler;
use super::handlers::login::LoginHandler;
use super::handlers::Handler;
use super::response::Response;

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<RestfulContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,

    payload_limit_mib: usize,
}

pub struct RestfulContext {
    pub api_handler: ApiHandler,
    pub healthz_handler: HealthzHandler,
    pub login_handler: LoginHandler,
}

impl RestfulServer {
    const API_PATH: &'static str = "/api";
    const HEALTHZ_PATH: &'static str = "/healthz";
    const LOGIN_PATH: &'static str = "/login";

    pub fn new(
        bind: String,
        ssl: Option<SslAcceptorBuilder>,
        ctx: Arc<RestfulContext>,
        payload_limit_mib: usize,
    ) -> Self {
        Self {
            ssl,
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
            payload_limit_mib,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let payload_limit_mib = self.payload_limit_mib;
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(ctx.clone()))
                .app_data(PayloadConfig::new(payload_limit_mib * 1024 * 1024))
                .service(
                    web::scope(Self::API_PATH)
                        .route("/{path:.*}", web::get().to(Self::handle_api))
                        .route("/{path:.*}", web::put().to(Self::handle_api))
                        .route("/{path:.*}", web::post().to(Self::handle_api))
                        .route("/{path:.*}", web::patch().to(Self::handle_api))
                        .route("/{path:.*}", web::delete().to(Self::handle_api)),
                )
                .service(
                    web::resource(Self::HEALTHZ_PATH).route(web::get().to(Self::handle_healthz)),
                )
                .service(
                    web::scope(Self::LOGIN_PATH)
                        .route("/{path:.*}", web::post().to(Self::handle_login)),
                )
                .default_service(web::route().to(Self::default_handler))
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }

    async fn handle_api(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let path = match Self::parse_path(Self::API_PATH, &req) {
            Some(path) => path,
            None => return Response::bad_request("Resource type is required").into(),
        };
        let body = body.map(|b| b.to_vec()).filter(|b| !b.is_empty());
        ctx.api_handler.handle(&path, req, body).into()
    }

    async fn handle_healthz(req: HttpRequest, ctx: Data<Arc<RestfulContext>>) -> HttpResponse {
        ctx.healthz_handler.handle("", req, None).into()
    }

    async fn handle_login(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let path = match Self::parse_path(Self::LOGIN_PATH, &req) {
            Some(path) => path,
            None => return Response::bad_request("User name is required").into(),
        };
        let body = body.map(|b| b.to_vec()).filter(|b| !b.is_empty());
        ctx.login_handler.handle(&path, req, body).into()
    }

    async fn default_handler() -> HttpResponse {
        Response::not_found().into()
    }

    fn parse_path(prefix: &str, req: &HttpRequest) -> Option<String> {
        let path = req.path().strip_prefix(prefix).unwrap_or_else(|| req.path());
        let path = path.trim_matches('/').to_string();
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}
