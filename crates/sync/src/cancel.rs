use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag handed to a bulk sync.
///
/// Clones share the same flag, so a signal handler can hold one clone while
/// the sync loop checks another. The sync clears the flag when it honours it.
#[derive(Clone, Debug, Default)]
pub struct SyncCancel {
    flag: Arc<AtomicBool>,
}

impl SyncCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running sync to stop after its current item
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consume a pending cancellation, returning whether one was raised
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}
