//! HTTP server.
//!
//! A small `tiny_http` front end over [`Site::handle`]. The site is fully
//! built before the listener opens, then shared read-only by a fixed set of
//! worker threads through an `Arc`.
//!
//! ```text
//! ┌──────────────┐   Arc<Site>   ┌──────────────┐
//! │  worker 0..n │ ────────────▶ │ Site::handle │
//! └──────┬───────┘               └──────────────┘
//!        │ recv()
//! ┌──────┴───────┐
//! │ tiny_http    │ ◀── Ctrl+C unblocks every worker
//! └──────────────┘
//! ```

use crate::site::{Reply, Site};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Invalid bind address '{0}'")]
    Address(String),
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Failed to set Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

const MAX_WORKERS: usize = 8;

/// Serve `site` until Ctrl+C.
pub fn serve(site: Site) -> Result<(), ServeError> {
    let bind = site.config().bind_addr.clone();
    let addr: SocketAddr = bind.parse().map_err(|_| ServeError::Address(bind))?;
    let server = Server::http(addr).map_err(|source| ServeError::Bind { addr, source })?;
    let server = Arc::new(server);
    let site = Arc::new(site);

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        info!("shutting down");
        shutdown(&server_for_signal, workers);
    })?;

    info!(%addr, workers, "listening");
    for handle in spawn_workers(&server, &site, workers) {
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
    Ok(())
}

/// Start `count` threads pulling requests until the server is unblocked.
fn spawn_workers(server: &Arc<Server>, site: &Arc<Site>, count: usize) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let server = Arc::clone(server);
            let site = Arc::clone(site);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    handle_request(&site, request);
                }
            })
        })
        .collect()
}

/// Each `unblock` releases exactly one blocked receiver, so every worker needs its own.
fn shutdown(server: &Server, workers: usize) {
    for _ in 0..workers {
        server.unblock();
    }
}

fn handle_request(site: &Site, request: Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let if_none_match = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("If-None-Match"))
        .map(|h| h.value.as_str().to_string());

    let reply = site.handle(&method, &url, if_none_match.as_deref());
    debug!(%method, %url, status = reply.status, "request");

    if let Err(e) = request.respond(to_response(reply)) {
        warn!(%url, error = %e, "failed to send response");
    }
}

fn to_response(reply: Reply) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    for (name, value) in &reply.headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => warn!(header = name, "dropping invalid response header"),
        }
    }
    response
}
