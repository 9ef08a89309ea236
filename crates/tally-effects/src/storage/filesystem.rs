//! Filesystem ledger store
//!
//! One JSON document per record:
//!
//! ```text
//! <root>/bills/<billId>/bill.json
//! <root>/bills/<billId>/debts/<participantId>.json
//! <root>/participants/<participantId>.json
//! <root>/state/watermark.json
//! ```
//!
//! Every document is written to a temporary sibling and renamed into place.
//! On commit, debts are written before the bill document, so a bill that is
//! visible always has its full debt set. A crash between the two leaves
//! orphaned debts under a bill directory with no `bill.json`; they are loaded
//! into the next transaction on that bill, and creating the bill removes any
//! that are not part of the new split.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use tally_core::effects::{
    BillTransaction, DirectoryEffects, LedgerStoreEffects, StagedBill, StoreError,
};
use tally_core::identifiers::validate_document_key;
use tally_core::{Bill, BillId, BillStatus, Debt, EventCursor, Participant, ParticipantId};

use super::BillLocks;

const BILL_FILE: &str = "bill.json";
const WATERMARK_FILE: &str = "watermark.json";

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkDocument {
    cursor: EventCursor,
}

/// Ledger store and participant directory backed by a directory tree
#[derive(Debug)]
pub struct FilesystemLedgerStore {
    root: PathBuf,
    locks: BillLocks,
    watermark_lock: Mutex<()>,
}

impl FilesystemLedgerStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in ["bills", "participants", "state"] {
            fs::create_dir_all(root.join(dir)).await.map_err(|e| {
                StoreError::backend(format!("Failed to create {}: {e}", root.join(dir).display()))
            })?;
        }
        info!(root = %root.display(), "Opened filesystem ledger store");
        Ok(Self {
            root,
            locks: BillLocks::default(),
            watermark_lock: Mutex::new(()),
        })
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert or replace a directory entry
    pub async fn upsert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let path = self.participant_path(&participant.id)?;
        write_json(&path, participant).await
    }

    /// Every directory entry, active or not, ordered by id
    pub async fn list_participants(&self) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<Participant> =
            read_json_dir(&self.root.join("participants")).await?;
        participants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(participants)
    }

    /// Overwrite the watermark unconditionally
    pub async fn reset_watermark(&self, cursor: EventCursor) -> Result<(), StoreError> {
        let _guard = self.watermark_lock.lock().await;
        write_json(&self.watermark_path(), &WatermarkDocument { cursor }).await?;
        warn!(cursor = %cursor, "Watermark reset");
        Ok(())
    }

    fn bill_dir(&self, id: &BillId) -> Result<PathBuf, StoreError> {
        validate_document_key(id.as_str()).map_err(|e| StoreError::invalid_record(e.to_string()))?;
        Ok(self.root.join("bills").join(id.as_str()))
    }

    fn participant_path(&self, id: &ParticipantId) -> Result<PathBuf, StoreError> {
        validate_document_key(id.as_str()).map_err(|e| StoreError::invalid_record(e.to_string()))?;
        Ok(self.root.join("participants").join(format!("{id}.json")))
    }

    fn watermark_path(&self) -> PathBuf {
        self.root.join("state").join(WATERMARK_FILE)
    }

    async fn load_debts(&self, bill_dir: &Path) -> Result<Vec<Debt>, StoreError> {
        let mut debts: Vec<Debt> = read_json_dir(&bill_dir.join("debts")).await?;
        debts.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        Ok(debts)
    }
}

#[async_trait]
impl LedgerStoreEffects for FilesystemLedgerStore {
    async fn get_bill(&self, id: &BillId) -> Result<Option<Bill>, StoreError> {
        read_json(&self.bill_dir(id)?.join(BILL_FILE)).await
    }

    async fn list_debts(&self, id: &BillId) -> Result<Vec<Debt>, StoreError> {
        self.load_debts(&self.bill_dir(id)?).await
    }

    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        let bills_dir = self.root.join("bills");
        let mut entries = match fs::read_dir(&bills_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::backend(format!("Failed to read bills: {e}"))),
        };

        let mut bills = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::backend(format!("Failed to read bills: {e}")))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(bill) = read_json::<Bill>(&entry.path().join(BILL_FILE)).await? {
                bills.push(bill);
            }
        }
        bills.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(bills)
    }

    async fn begin_bill(&self, id: &BillId) -> Result<Box<dyn BillTransaction>, StoreError> {
        let dir = self.bill_dir(id)?;
        let guard = self.locks.acquire(id).await;
        let bill = read_json(&dir.join(BILL_FILE)).await?;
        let debts = self.load_debts(&dir).await?;
        Ok(Box::new(FilesystemBillTransaction {
            staged: StagedBill::new(id.clone(), bill, debts),
            dir,
            _guard: guard,
        }))
    }

    async fn load_watermark(&self) -> Result<Option<EventCursor>, StoreError> {
        let doc: Option<WatermarkDocument> = read_json(&self.watermark_path()).await?;
        Ok(doc.map(|d| d.cursor))
    }

    async fn compare_and_set_watermark(
        &self,
        expected: Option<EventCursor>,
        next: EventCursor,
    ) -> Result<bool, StoreError> {
        let _guard = self.watermark_lock.lock().await;
        let current: Option<WatermarkDocument> = read_json(&self.watermark_path()).await?;
        if current.map(|d| d.cursor) != expected {
            return Ok(false);
        }
        write_json(&self.watermark_path(), &WatermarkDocument { cursor: next }).await?;
        debug!(cursor = %next, "Watermark written");
        Ok(true)
    }
}

#[async_trait]
impl DirectoryEffects for FilesystemLedgerStore {
    async fn active_participants(&self) -> Result<Vec<Participant>, StoreError> {
        Ok(self
            .list_participants()
            .await?
            .into_iter()
            .filter(|p| p.active)
            .collect())
    }
}

struct FilesystemBillTransaction {
    staged: StagedBill,
    dir: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl BillTransaction for FilesystemBillTransaction {
    fn bill(&self) -> Option<&Bill> {
        self.staged.bill()
    }

    fn debts(&self) -> &[Debt] {
        self.staged.debts()
    }

    fn put_bill(&mut self, bill: Bill) -> Result<(), StoreError> {
        self.staged.put_bill(bill)
    }

    fn put_debt(&mut self, debt: Debt) -> Result<(), StoreError> {
        validate_document_key(debt.participant_id.as_str())
            .map_err(|e| StoreError::invalid_record(e.to_string()))?;
        self.staged.put_debt(debt)
    }

    fn remove_debt(&mut self, participant_id: &ParticipantId) -> Result<(), StoreError> {
        self.staged.remove_debt(participant_id);
        Ok(())
    }

    fn set_status(&mut self, status: BillStatus) -> Result<(), StoreError> {
        self.staged.set_status(status)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.staged.check_consistency()?;
        for participant in self.staged.removed_debts() {
            let path = self.dir.join("debts").join(format!("{participant}.json"));
            remove_file(&path).await?;
        }
        for debt in self.staged.dirty_debts() {
            let path = self
                .dir
                .join("debts")
                .join(format!("{}.json", debt.participant_id));
            write_json(&path, debt).await?;
        }
        if let Some(bill) = self.staged.dirty_bill() {
            write_json(&self.dir.join(BILL_FILE), bill).await?;
        }
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            StoreError::serialization(format!("{}: {e}", path.display()))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::backend(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

async fn read_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StoreError::backend(format!(
                "Failed to read directory {}: {e}",
                dir.display()
            )))
        }
    };

    let mut out = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::backend(format!("Failed to read directory entry: {e}")))?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if let Some(doc) = read_json(&path).await? {
            out.push(doc);
        }
    }
    Ok(out)
}

async fn remove_file(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::backend(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::backend(format!("Failed to create directory: {e}")))?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::backend(format!("Failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::backend(format!("Failed to replace {}: {e}", path.display())))
}
