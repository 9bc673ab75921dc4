// Connection handling module
// Accepts a TCP connection, serves it with hyper, and acts as the fault
// boundary for the router

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::sync::watch;

use crate::config::AppState;
use crate::handler;
use crate::http;
use crate::logger::{self, AccessLogEntry};

/// Accept and process a connection, checking limits.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `closing` - Flips to `true` once the server starts shutting down
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    closing: &watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_debug(&format!("Accepted connection from {peer_addr}"));

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        closing.clone(),
    );
}

/// Serve a single connection in a spawned task.
///
/// Keep-alive follows `keep_alive_timeout`; the whole connection is bounded
/// by `max(read_timeout, write_timeout)`. Once `closing` flips, an idle
/// connection closes right away and a busy one after its current response.
/// The counter is decremented when the connection ends.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut closing: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let timeout_duration = Duration::from_secs(std::cmp::max(
            performance.read_timeout,
            performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        builder.keep_alive(performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let state = Arc::clone(&service_state);
                async move { Ok::<_, Infallible>(serve_request(req, &state, peer_addr).await) }
            }),
        );
        let mut conn = std::pin::pin!(conn);

        let served = tokio::time::timeout(timeout_duration, async {
            tokio::select! {
                result = conn.as_mut() => result,
                () = shutdown_requested(&mut closing) => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            }
        });

        match served.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Resolve once `closing` is set; never resolves if the sender is gone first
async fn shutdown_requested(closing: &mut watch::Receiver<bool>) {
    let closed = closing.wait_for(|closed| *closed).await.is_ok();
    if !closed {
        std::future::pending::<()>().await;
    }
}

/// Run one request through the router
///
/// Caps the body at `http.max_body_size`, converts router faults into a bare
/// 500, and writes the access log line.
pub async fn serve_request<B>(
    req: Request<B>,
    state: &AppState,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let started = Instant::now();
    let access_entry = state
        .config
        .logging
        .access_log
        .then(|| AccessLogEntry::from_request(&req, peer_addr));

    let max_body_size = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let req = req.map(|body| Limited::new(body, max_body_size));

    let response = match handler::handle(req, &state.env).await {
        Ok(response) => response,
        Err(e) => {
            logger::log_error(&format!("Unhandled request fault: {e}"));
            http::build_500_response()
        }
    };

    if let Some(mut entry) = access_entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{KvStore, MemoryStore, StoreError, SECRETS_KEY};
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn test_config(max_body_size: u64) -> Config {
        let mut cfg = Config::load_from("nonexistent-test-config").unwrap();
        cfg.auth.token = "tok".to_string();
        cfg.environment = "test".to_string();
        cfg.logging.access_log = false;
        cfg.http.max_body_size = max_body_size;
        cfg
    }

    fn request(method: &str, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .header("Authorization", "Bearer tok")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                path: "broken".into(),
                source: std::io::Error::other("disk gone"),
            })
        }

        async fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "broken".into(),
                source: std::io::Error::other("disk gone"),
            })
        }
    }

    #[tokio::test]
    async fn test_serve_request_success() {
        let state = AppState::new(test_config(1024), Arc::new(MemoryStore::new()));
        let response = serve_request(request("GET", "/health", ""), &state, peer()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_store_fault_becomes_bare_500() {
        let state = AppState::new(test_config(1024), Arc::new(BrokenStore));
        let response = serve_request(request("GET", "/secrets", ""), &state, peer()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[tokio::test]
    async fn test_body_limit_applied() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(test_config(4), store.clone());
        let response = serve_request(request("POST", "/secrets", r#"{"a":"1"}"#), &state, peer()).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.get(SECRETS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_max_connections_rejects_extra_connection() {
        let mut cfg = test_config(1024);
        cfg.performance.max_connections = Some(1);
        let state = Arc::new(AppState::new(cfg, Arc::new(MemoryStore::new())));
        let counter = Arc::new(AtomicUsize::new(0));
        let (_closing_tx, closing) = watch::channel(false);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut first = TcpStream::connect(addr).await.unwrap();
        let (stream, peer_addr) = listener.accept().await.unwrap();
        accept_connection(stream, peer_addr, &state, &counter, &closing);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let mut second = TcpStream::connect(addr).await.unwrap();
        let (stream, peer_addr) = listener.accept().await.unwrap();
        accept_connection(stream, peer_addr, &state, &counter, &closing);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Rejected connection is closed without a response
        let mut rejected = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), second.read_to_end(&mut rejected))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)), "{read:?}");
        assert!(rejected.is_empty());

        // The admitted connection is still served
        first
            .write_all(
                b"GET /health HTTP/1.1\r\nHost: localhost\r\nAuthorization: Bearer tok\r\n\
                  Connection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), first.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");

        tokio::time::timeout(Duration::from_secs(5), async {
            while counter.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
