//! Mock transport and the manager that pools it

use crate::ManageResource;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Custom error type for the mock backend
#[derive(Debug, Clone)]
pub enum MockTransportError {
    /// Creation was refused via [`MockManager::fail_creations`]
    CreationRefused(String),
    /// A send was attempted on a transport marked unhealthy
    Unhealthy(String),
    /// Payload serialization failed
    Serialization(String),
}

impl fmt::Display for MockTransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockTransportError::CreationRefused(msg) => write!(f, "Creation refused: {}", msg),
            MockTransportError::Unhealthy(msg) => write!(f, "Transport unhealthy: {}", msg),
            MockTransportError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for MockTransportError {}

/// A trivial always-available transport
///
/// Stands in for a live broker connection. Sending stores the frame in
/// memory where tests can inspect it. A transport can be marked unhealthy
/// to make the pool discard it at the next revalidation.
#[derive(Debug, Clone)]
pub struct MockTransport {
    serial: u64,
    healthy: Arc<AtomicBool>,
    sent_frames: Arc<Mutex<Vec<Bytes>>>,
}

impl MockTransport {
    fn new(serial: u64) -> Self {
        Self {
            serial,
            healthy: Arc::new(AtomicBool::new(true)),
            sent_frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serial number assigned by the manager at creation
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Record a frame as sent
    pub fn send(&self, frame: Bytes) -> Result<(), MockTransportError> {
        if !self.is_healthy() {
            return Err(MockTransportError::Unhealthy(format!(
                "transport #{} is marked unhealthy",
                self.serial
            )));
        }
        self.sent_frames.lock().unwrap().push(frame);
        Ok(())
    }

    /// Serialize a value to JSON and send it as a frame
    pub fn send_object<T: Serialize>(&self, value: &T) -> Result<(), MockTransportError> {
        let frame = serde_json::to_vec(value)
            .map_err(|e| MockTransportError::Serialization(e.to_string()))?;
        self.send(Bytes::from(frame))
    }

    /// Get all frames sent through this transport
    pub fn sent_frames(&self) -> Vec<Bytes> {
        self.sent_frames.lock().unwrap().clone()
    }

    /// Get the most recently sent frame, if any
    pub fn last_frame(&self) -> Option<Bytes> {
        self.sent_frames.lock().unwrap().last().cloned()
    }

    /// Drop all captured frames
    pub fn clear_frames(&self) {
        self.sent_frames.lock().unwrap().clear();
    }

    /// Whether the transport currently passes revalidation
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Mark the transport broken
    ///
    /// Sends start failing and the pool discards the transport the next
    /// time it is considered for reuse.
    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }
}

/// Pool backend producing [`MockTransport`]s
///
/// Clones share their counters, so a test can hand one clone to the pool
/// and keep another for inspection.
#[derive(Debug, Clone)]
pub struct MockManager {
    label: String,
    next_serial: Arc<AtomicU64>,
    created: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_creations: Arc<AtomicBool>,
}

impl MockManager {
    /// Create a new MockManager with the given label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_serial: Arc::new(AtomicU64::new(1)),
            created: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            fail_creations: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a new MockManager with a default label
    pub fn new_default() -> Self {
        Self::new("mock-backend")
    }

    /// The label given at construction
    pub fn label(&self) -> &str {
        &self.label
    }

    /// How many transports this manager has created
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// How many transports have been disposed of through this manager
    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Make subsequent creations fail until called again with `false`
    pub fn fail_creations(&self, fail: bool) {
        self.fail_creations.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockManager {
    fn default() -> Self {
        Self::new_default()
    }
}

#[async_trait]
impl ManageResource for MockManager {
    type Resource = MockTransport;
    type Error = MockTransportError;

    async fn create(&self) -> Result<MockTransport, MockTransportError> {
        if self.fail_creations.load(Ordering::SeqCst) {
            return Err(MockTransportError::CreationRefused(format!(
                "{}: creation disabled",
                self.label
            )));
        }
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransport::new(serial))
    }

    async fn validate(&self, transport: &mut MockTransport) -> bool {
        transport.is_healthy()
    }

    fn close(&self, _transport: MockTransport) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
