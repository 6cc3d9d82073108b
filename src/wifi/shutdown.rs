use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once on SIGINT/SIGTERM. Every connect or access-point sequence checks
/// it before each external command.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
