//! Secrets route handlers
//!
//! Each handler performs at most one store read or one store write. Store
//! failures are returned as `Err` and are not turned into responses here.

use std::error::Error as StdError;

use http_body_util::{BodyExt, Full, LengthLimitError};
use hyper::body::{Body, Bytes};
use hyper::{Response, StatusCode};
use serde_json::{json, Map, Value};

use crate::config::Env;
use crate::error::Error;
use crate::http::{build_error_response, build_json_response, build_raw_json_response};
use crate::logger;
use crate::store::SECRETS_KEY;

/// Boxed body error, as produced by `http_body_util::Limited`
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Flat map of secret names to values, in the order they were pushed
pub type SecretsMap = Map<String, Value>;

/// GET /health
pub fn health(env: &Env) -> Response<Full<Bytes>> {
    build_json_response(
        StatusCode::OK,
        &json!({ "status": "healthy", "environment": env.environment }),
    )
}

/// GET /secrets: return the stored blob verbatim
pub async fn pull(env: &Env) -> Result<Response<Full<Bytes>>, Error> {
    match load_blob(env).await? {
        Some(blob) => Ok(build_raw_json_response(StatusCode::OK, blob)),
        None => Ok(build_error_response(
            StatusCode::NOT_FOUND,
            "No secrets found",
        )),
    }
}

/// POST /secrets: validate the body and overwrite the stored blob wholesale
pub async fn push<B>(body: B, env: &Env) -> Result<Response<Full<Bytes>>, Error>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return Ok(body_error_response(&e.into())),
    };

    // A bare `null` has no entries to check and is treated as unparseable
    let Ok(Some(parsed)) = serde_json::from_slice::<Option<Value>>(&bytes) else {
        return Ok(build_error_response(
            StatusCode::BAD_REQUEST,
            "Invalid JSON body",
        ));
    };

    let Some(secrets) = validate_secrets(parsed) else {
        return Ok(build_error_response(
            StatusCode::BAD_REQUEST,
            "Secrets must be string key-value pairs",
        ));
    };

    let keys: Vec<String> = secrets.keys().cloned().collect();
    let count = keys.len();
    env.store
        .put(SECRETS_KEY, Value::Object(secrets).to_string())
        .await?;

    logger::write_info(&format!("[Secrets] Stored {count} secrets"));

    Ok(build_json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "message": format!("Stored {count} secrets"),
            "keys": keys,
        }),
    ))
}

/// GET /secrets/keys: list names only, never values
pub async fn list_keys(env: &Env) -> Result<Response<Full<Bytes>>, Error> {
    let keys: Vec<String> = match load_blob(env).await? {
        Some(blob) => serde_json::from_str::<SecretsMap>(&blob)
            .map_err(Error::CorruptBlob)?
            .keys()
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    Ok(build_json_response(StatusCode::OK, &json!({ "keys": keys })))
}

/// Fallback for unmatched routes, with the endpoint help map
pub fn not_found() -> Response<Full<Bytes>> {
    build_json_response(
        StatusCode::NOT_FOUND,
        &json!({
            "error": "Not found",
            "endpoints": {
                "GET /health": "Health check",
                "GET /secrets": "Pull all secrets",
                "POST /secrets": "Push secrets (JSON body)",
                "GET /secrets/keys": "List secret keys",
            },
        }),
    )
}

/// Accept only a JSON object whose values are all strings
///
/// Every entry is checked; the first non-string value rejects the body.
pub fn validate_secrets(value: Value) -> Option<SecretsMap> {
    match value {
        Value::Object(map) if map.values().all(Value::is_string) => Some(map),
        _ => None,
    }
}

/// Read the stored blob; an empty value counts as absent
async fn load_blob(env: &Env) -> Result<Option<String>, Error> {
    let blob = env.store.get(SECRETS_KEY).await?;
    Ok(blob.filter(|b| !b.is_empty()))
}

fn body_error_response(error: &BoxError) -> Response<Full<Bytes>> {
    if error.is::<LengthLimitError>() {
        logger::log_warning("Request body exceeds configured max_body_size");
        build_error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
    } else {
        logger::log_warning(&format!("Failed to read request body: {error}"));
        build_error_response(StatusCode::BAD_REQUEST, "Invalid JSON body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_flat_string_map() {
        let map = validate_secrets(json!({ "a": "1", "b": "2" })).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_validate_rejects_non_string_value() {
        assert!(validate_secrets(json!({ "a": "1", "b": 2 })).is_none());
        assert!(validate_secrets(json!({ "a": { "nested": "x" } })).is_none());
        assert!(validate_secrets(json!({ "a": null })).is_none());
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(validate_secrets(json!(["a", "b"])).is_none());
        assert!(validate_secrets(json!("a")).is_none());
        assert!(validate_secrets(json!(5)).is_none());
        assert!(validate_secrets(Value::Null).is_none());
    }

    #[test]
    fn test_validate_empty_object() {
        assert!(validate_secrets(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_validate_keeps_insertion_order() {
        let parsed: Value = serde_json::from_str(r#"{"z":"1","a":"2","m":"3"}"#).unwrap();
        let map = validate_secrets(parsed).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
