use std::sync::Arc;

use tokio::sync::Notify;

mod config;
mod error;
mod handler;
mod http;
mod logger;
mod server;
mod store;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Size the Tokio runtime from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::write_info(&format!("[CONFIG] Using {workers} worker threads"));
    } else {
        logger::write_info("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;

    if cfg.auth.token.is_empty() {
        logger::log_warning("auth.token is empty; every request except OPTIONS will get 401");
    }

    let store = store::open_store(&cfg.store)?;
    let listener = server::create_reusable_listener(addr)?;

    logger::log_server_start(&addr, &cfg);
    let state = Arc::new(config::AppState::new(cfg, store));

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown));

    server::run(listener, state, shutdown).await;
    logger::write_info("[Shutdown] Server stopped");
    Ok(())
}
