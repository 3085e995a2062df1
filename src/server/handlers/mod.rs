mod check;
mod grants;
mod jobs;
mod resources;

pub mod api;
pub mod healthz;
pub mod login;

use actix_web::HttpRequest;

use crate::server::response::Response;

pub trait Handler: Send + Sync {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response;
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Option<Vec<u8>>) -> Result<T, Response> {
    let body = match body {
        Some(body) => body,
        None => return Err(Response::bad_request("Request body is required")),
    };
    serde_json::from_slice(&body).map_err(|_| Response::bad_request("Invalid request json"))
}
