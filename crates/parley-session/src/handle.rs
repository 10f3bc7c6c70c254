//! A cloneable handle for stopping a session from outside.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking the engine from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_streaming: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop applying events from the current stream.
    ///
    /// Content received so far stays in the transcript.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a stream is currently being consumed.
    pub fn is_streaming(&self) -> bool {
        self.is_streaming.load(Ordering::Acquire)
    }

    /// Install a fresh token for a new stream and return it.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_streaming.store(true, Ordering::Release);
        token
    }

    pub(crate) fn end(&self) {
        self.is_streaming.store(false, Ordering::Release);
    }
}
