//! Process-wide bulk transfer guard.
//!
//! At most one bulk transfer (full resync, project-wide download) may run
//! at a time, bounding load on the remote service. Per-file incremental
//! operations are exempt and never take this guard.

use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lock handing out at most one [`BulkTransferGuard`] at a time.
#[derive(Debug, Clone, Default)]
pub struct BulkTransferLock {
    busy: Arc<AtomicBool>,
}

/// RAII guard for an in-flight bulk transfer. Released on drop.
#[derive(Debug)]
pub struct BulkTransferGuard {
    busy: Arc<AtomicBool>,
}

impl BulkTransferLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the bulk transfer slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransferInProgress`] if another bulk transfer holds
    /// the slot.
    pub fn try_acquire(&self) -> Result<BulkTransferGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(BulkTransferGuard {
                busy: Arc::clone(&self.busy),
            })
        } else {
            Err(Error::TransferInProgress)
        }
    }
}

impl Drop for BulkTransferGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}
