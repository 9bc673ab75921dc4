//! Request routing dispatch module
//!
//! Entry point for request processing: CORS preflight, auth, then exact
//! method + path dispatch. Requests share nothing but the store.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};

use super::auth;
use super::secrets::{self, BoxError};
use crate::config::Env;
use crate::error::Error;
use crate::http;
use crate::logger;

/// Main entry point for request handling
///
/// Expected failures come back as `Ok` JSON responses. `Err` means the store
/// failed or the stored blob is unreadable; the caller decides what to send.
pub async fn handle<B>(req: Request<B>, env: &Env) -> Result<Response<Full<Bytes>>, Error>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();

    // 1. Preflight skips auth
    if parts.method == Method::OPTIONS {
        return Ok(http::build_preflight_response());
    }

    // 2. Auth runs before routing, /health included
    if !auth::is_authorized(&parts.headers, &env.auth_token) {
        logger::log_warning(&format!(
            "Unauthorized request: {} {}",
            parts.method,
            parts.uri.path()
        ));
        return Ok(http::build_error_response(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
        ));
    }

    // 3. Dispatch
    match (&parts.method, parts.uri.path()) {
        (&Method::GET, "/health") => Ok(secrets::health(env)),
        (&Method::GET, "/secrets") => secrets::pull(env).await,
        (&Method::POST, "/secrets") => secrets::push(body, env).await,
        (&Method::GET, "/secrets/keys") => secrets::list_keys(env).await,
        _ => Ok(secrets::not_found()),
    }
}
