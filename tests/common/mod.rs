//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use service_resilience::admin::{setup_admin_router, AdminState};
use service_resilience::config::ResilienceConfig;
use service_resilience::lifecycle::Components;

/// Counts invocations of a fake dependency and decides whether each fails.
#[derive(Debug, Clone, Default)]
pub struct FakeDependency {
    calls: Arc<AtomicU32>,
    failing: Arc<std::sync::atomic::AtomicBool>,
}

impl FakeDependency {
    pub fn failing() -> Self {
        let dep = Self::default();
        dep.set_failing(true);
        dep
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self) -> Result<&'static str, io::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "ECONNREFUSED: upstream unavailable",
            ))
        } else {
            Ok("ok")
        }
    }
}

/// Start a TCP listener that accepts and immediately drops connections.
pub async fn start_tcp_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Admin router over freshly built components.
pub fn admin_app(config: &ResilienceConfig) -> (axum::Router, Components) {
    let components = Components::build(config);
    let state = AdminState::new(
        components.registry.clone(),
        components.health.clone(),
        config.admin.api_key.clone(),
    );
    (setup_admin_router(state), components)
}
