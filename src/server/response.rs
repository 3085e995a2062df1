use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{de::DeserializeOwned, Serialize};

use crate::types::response::{CommonResponse, ResourceResponse};

pub const AUTHN_ERROR: &str = "Authentication failed";
pub const DECISION_ERROR: &str = "Access decision failed";
pub const DATABASE_ERROR: &str = "Database error";
pub const TOKEN_ERROR: &str = "Generate token failed";
pub const JOB_ERROR: &str = "Job invocation failed";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn not_found() -> Self {
        Self::err_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthenticated(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthenticated: {}", message.as_ref());
        Self::err_response(StatusCode::UNAUTHORIZED, message)
    }

    pub fn unauthorized(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthorized: {}", message.as_ref());
        Self::err_response(StatusCode::FORBIDDEN, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::err_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn ok() -> Self {
        let resp = CommonResponse {
            code: StatusCode::OK.into(),
            message: None,
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    pub fn json<T: Serialize + DeserializeOwned>(data: T) -> Self {
        let resp = ResourceResponse {
            code: StatusCode::OK.into(),
            message: None,
            data: Some(data),
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    fn err_response(code: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: code.into(),
            message: Some(message),
        };
        Self {
            http_response: HttpResponse::build(code).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(response: Response) -> Self {
        response.http_response
    }
}
