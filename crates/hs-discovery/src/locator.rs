//! Bytecode locator capability and the shared scan session.

use crate::descriptor::MethodDescriptor;
use crate::predicate::ScanPredicate;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reported by a scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan session is closed")]
    SessionClosed,

    #[error("Scan failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid method inventory: {0}")]
    Inventory(#[from] serde_json::Error),
}

/// One-time scanner over the target process's compiled code
///
/// Implementations are expected to be deterministic for one process load.
pub trait BytecodeLocator: Send + Sync {
    fn scan_for_methods(&self, predicate: &ScanPredicate) -> Result<Vec<MethodDescriptor>, ScanError>;

    /// Release the underlying scanning resources
    fn close(&self) {}
}

/// The process-wide scanning session
///
/// Opened once at process init, shared by every discovery key, closed at
/// teardown. Scans after close fail with [`ScanError::SessionClosed`].
pub struct ScanSession {
    locator: Box<dyn BytecodeLocator>,
    open: AtomicBool,
    scans: AtomicU64,
}

impl ScanSession {
    pub fn open(locator: Box<dyn BytecodeLocator>) -> Self {
        info!("Scan session opened");
        Self {
            locator,
            open: AtomicBool::new(true),
            scans: AtomicU64::new(0),
        }
    }

    pub fn scan(&self, predicate: &ScanPredicate) -> Result<Vec<MethodDescriptor>, ScanError> {
        if !self.is_open() {
            return Err(ScanError::SessionClosed);
        }
        self.scans.fetch_add(1, Ordering::Relaxed);
        let methods = self.locator.scan_for_methods(predicate)?;
        debug!("Scan found {} methods for {:?}", methods.len(), predicate);
        Ok(methods)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of scans run so far
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Idempotent
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.locator.close();
            info!("Scan session closed after {} scans", self.scan_count());
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Modifiers;
    use std::sync::Arc;

    struct FixedLocator {
        closed: Arc<AtomicBool>,
    }

    impl BytecodeLocator for FixedLocator {
        fn scan_for_methods(&self, _: &ScanPredicate) -> Result<Vec<MethodDescriptor>, ScanError> {
            Ok(vec![MethodDescriptor::new("a.B", "c", vec![], "void", Modifiers::PUBLIC)])
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let closed = Arc::new(AtomicBool::new(false));
        let session = ScanSession::open(Box::new(FixedLocator {
            closed: Arc::clone(&closed),
        }));
        let pred = ScanPredicate::using_strings(["x"]);

        assert_eq!(session.scan(&pred).unwrap().len(), 1);
        assert_eq!(session.scan_count(), 1);

        session.close();
        session.close();
        assert!(closed.load(Ordering::SeqCst));
        assert!(matches!(session.scan(&pred), Err(ScanError::SessionClosed)));
        assert_eq!(session.scan_count(), 1);
    }
}
