//! HTTP response building module
//!
//! Every response produced by the router carries the same three CORS headers.
//! The only exception is the bare 500 emitted by the connection layer.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};
use serde::Serialize;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
];

const JSON_CONTENT_TYPE: &str = "application/json";

fn cors_builder(status: StatusCode) -> Builder {
    CORS_HEADERS
        .iter()
        .fold(Response::builder().status(status), |builder, (name, value)| {
            builder.header(*name, *value)
        })
}

/// Build OPTIONS response (preflight request): 200, no body, CORS only
pub fn build_preflight_response() -> Response<Full<Bytes>> {
    cors_builder(StatusCode::OK)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build a JSON response from text that is already serialized
pub fn build_raw_json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    cors_builder(status)
        .header("Content-Type", JSON_CONTENT_TYPE)
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build a JSON response from a serializable value
pub fn build_json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(body) {
        Ok(json) => build_raw_json_response(status, json),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            build_500_response()
        }
    }
}

/// Build `{"error": message}` with the given status
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    build_json_response(status, &serde_json::json!({ "error": message }))
}

/// Build the generic fault response used when a request fails unexpectedly
pub fn build_500_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("Internal Server Error")))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            Response::new(Full::new(Bytes::from("Internal Server Error")))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
