//! Scripted backend for driving the dispatch engine deterministically
//!
//! A [`MockBackend`] replays a script of results, one per call, and keeps
//! returning the last entry once the script runs out. Every call is recorded
//! with the recipient and the (paused) instant it started.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_dispatch::{Backend, BackendError, SharedBackend};
use parking_lot::Mutex;
use tokio::time::Instant;

pub struct MockBackend {
    name: String,
    script: Mutex<VecDeque<Result<bool, BackendError>>>,
    latency: Duration,
    panics: bool,
    calls: AtomicU32,
    invocations: Mutex<Vec<(String, Instant)>>,
}

impl MockBackend {
    pub fn scripted(name: &str, script: Vec<Result<bool, BackendError>>) -> Arc<Self> {
        Self::slow(name, script, Duration::ZERO)
    }

    /// Accepts every message
    pub fn healthy(name: &str) -> Arc<Self> {
        Self::scripted(name, vec![Ok(true)])
    }

    /// Raises a connection error on every call
    pub fn broken(name: &str) -> Arc<Self> {
        Self::scripted(
            name,
            vec![Err(BackendError::ConnectionFailed(
                "connection refused".to_string(),
            ))],
        )
    }

    /// Panics on every call
    pub fn panicking(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(vec![Ok(true)].into()),
            latency: Duration::ZERO,
            panics: true,
            calls: AtomicU32::new(0),
            invocations: Mutex::new(Vec::new()),
        })
    }

    /// Every call takes `latency` to answer
    pub fn slow(
        name: &str,
        script: Vec<Result<bool, BackendError>>,
        latency: Duration,
    ) -> Arc<Self> {
        assert!(!script.is_empty(), "a mock backend needs at least one result");
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            latency,
            panics: false,
            calls: AtomicU32::new(0),
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn shared(self: &Arc<Self>) -> SharedBackend {
        Arc::clone(self) as SharedBackend
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Recipients in the order the backend was called for them
    pub fn recipients(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(|(recipient, _)| recipient.clone())
            .collect()
    }

    /// Instants at which each call started
    pub fn started(&self) -> Vec<Instant> {
        self.invocations.lock().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt_delivery(
        &self,
        recipient: &str,
        _subject: &str,
        _body: &str,
    ) -> Result<bool, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations
            .lock()
            .push((recipient.to_string(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        assert!(!self.panics, "{} lost its connection pool", self.name);

        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Ok(false))
        } else {
            script.front().cloned().unwrap_or(Ok(false))
        }
    }
}
