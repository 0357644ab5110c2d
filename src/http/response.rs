//! Mapping of pipeline outcomes onto HTTP responses.
//!
//! # Design Decisions
//! - Denials are plain text; only the success body is JSON
//! - Not-found reasons stay internal: both map to the same 404 body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value};

use crate::pipeline::{Denial, Granted};
use crate::security::headers::apply_security_headers;

impl Denial {
    pub fn status(&self) -> StatusCode {
        match self {
            Denial::IpDenied => StatusCode::FORBIDDEN,
            Denial::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Denial::Unauthorized => StatusCode::UNAUTHORIZED,
            Denial::BadRequest => StatusCode::BAD_REQUEST,
            Denial::EnvNotSupported(_) | Denial::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Denial::IpDenied => "IP not allowed",
            Denial::RateLimited => "Too Many Requests",
            Denial::Unauthorized => "Unauthorized",
            Denial::BadRequest => "Invalid request path",
            Denial::EnvNotSupported(_) => "Environment not supported",
            Denial::NotFound(_) => "Configuration not found",
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

impl IntoResponse for Granted {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert(self.key, Value::String(self.value));

        let mut response = Json(Value::Object(body)).into_response();
        apply_security_headers(response.headers_mut());
        response
    }
}
