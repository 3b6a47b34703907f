//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

use transaction_middleware::{BackendError, TransactionBackend};

/// Backend that records every call in order.
#[derive(Default)]
pub struct RecordingBackend {
    events: Mutex<Vec<String>>,
    open: AtomicBool,
    fail_begin: AtomicBool,
}

impl RecordingBackend {
    pub fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn set_fail_begin(&self, fail: bool) {
        self.fail_begin.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionBackend for RecordingBackend {
    async fn begin(&self) -> Result<(), BackendError> {
        self.record("begin");
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("database offline".to_string()));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), BackendError> {
        self.record("commit");
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        self.record("rollback");
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn abandon(&self) {
        self.record("abandon");
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
