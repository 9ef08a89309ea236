//! Ledger store handlers
//!
//! Both handlers serialise transactions per bill with an async mutex held by
//! the open [`BillTransaction`](tally_core::effects::BillTransaction) and
//! released when it commits or is dropped.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use tally_core::BillId;

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemLedgerStore;
pub use memory::MemoryLedgerStore;

/// One async mutex per bill id, created on first use.
///
/// Entries nobody holds or waits on are pruned on the next acquire, so the
/// map is bounded by the number of bills with open or pending transactions.
#[derive(Debug, Default)]
pub(crate) struct BillLocks {
    locks: Mutex<HashMap<BillId, Arc<tokio::sync::Mutex<()>>>>,
}

impl BillLocks {
    /// Wait for exclusive access to `id`
    pub(crate) async fn acquire(&self, id: &BillId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
