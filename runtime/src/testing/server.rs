// Copyright 2026 Periscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mock Redfish HTTP server.
//!
//! Serves a URI → resource map over real localhost HTTP so the
//! transport layer can be exercised end-to-end. Runs on its own
//! thread with a dedicated runtime; shuts down on drop.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// A running mock Redfish service on an ephemeral localhost port.
pub struct MockServer {
    addr: SocketAddr,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MockServer {
    /// Start serving `resources` on `127.0.0.1:0`.
    pub fn start(resources: HashMap<String, Value>) -> anyhow::Result<Self> {
        let state = Arc::new(resources);
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("mock server runtime");
            runtime.block_on(async move {
                let app = Router::new().fallback(serve_resource).with_state(state);
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind mock server");
                addr_tx
                    .send(listener.local_addr().expect("mock server addr"))
                    .expect("report mock server addr");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("serve mock resources");
            });
        });

        let addr = addr_rx.recv()?;
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Base URL clients should point their transport at.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn serve_resource(
    State(resources): State<Arc<HashMap<String, Value>>>,
    uri: Uri,
) -> (StatusCode, Json<Value>) {
    match resources.get(uri.path()) {
        Some(body) => (StatusCode::OK, Json(body.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "code": "Base.1.0.GeneralError",
                    "message": format!("resource {} does not exist", uri.path())
                }
            })),
        ),
    }
}
