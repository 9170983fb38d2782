use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc::UnboundedSender, watch};
use tracing::{error, info};
use uuid::Uuid;

use crate::identity::identity::create_safe_chain_unique_id;
use crate::models::{
    model::{
        Chain, Safe, SafeSyncStatus, SelectedSafe, SyncEvent, SyncProgress, SyncReport, SyncState,
    },
    traits::{LedgerStore, TransferSource},
};
use crate::safe_client::client::filter_trusted_transfers;

/// Per-wallet fetch sizes the sync surface accepts.
pub const TRANSFER_LIMITS: [u32; 4] = [10, 50, 100, 200];
pub const DEFAULT_TRANSFER_LIMIT: u32 = 50;

/// Pause between successive ledger writes. Rate-limit courtesy towards the
/// transaction service, not a correctness requirement.
pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum SyncError {
    Validation(String),
    Fetch {
        safe_address: String,
        chain: Chain,
        reason: String,
    },
    Store {
        safe_address: String,
        chain: Chain,
        reason: String,
    },
    Write {
        transfer_id: String,
        reason: String,
    },
    Cancelled,
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Validation(reason) => write!(f, "Invalid sync request: {}", reason),
            SyncError::Fetch {
                safe_address,
                chain,
                reason,
            } => write!(
                f,
                "Failed to fetch transfers for safe {} on {}: {}",
                safe_address,
                chain.as_str(),
                reason
            ),
            SyncError::Store {
                safe_address,
                chain,
                reason,
            } => write!(
                f,
                "Failed to read stored transfers for safe {} on {}: {}",
                safe_address,
                chain.as_str(),
                reason
            ),
            SyncError::Write {
                transfer_id,
                reason,
            } => write!(f, "Failed to write transfer {}: {}", transfer_id, reason),
            SyncError::Cancelled => write!(f, "Sync cancelled"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Cooperative cancellation handle for a sync run. Cloneable; cancelling
/// aborts the in-flight fetch instead of waiting it out.
#[derive(Clone)]
pub struct SyncCancellation {
    sender: Arc<watch::Sender<bool>>,
}

impl SyncCancellation {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for SyncCancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Brings the ledger up to date with the transaction service for every safe
/// of an organization. Safes are processed strictly sequentially, transfers
/// strictly in fetch order; the first fetch/read/write failure halts the
/// whole run, leaving already-committed writes in place.
pub struct SyncService<S, F> {
    store: Arc<S>,
    source: Arc<F>,
    write_delay: Duration,
}

impl<S: LedgerStore, F: TransferSource> SyncService<S, F> {
    pub fn new(store: Arc<S>, source: Arc<F>, write_delay: Duration) -> Self {
        Self {
            store,
            source,
            write_delay,
        }
    }

    pub async fn sync_organization(
        &self,
        organization_id: Uuid,
        transfer_limit: u32,
        events: &UnboundedSender<SyncEvent>,
        cancel: &SyncCancellation,
    ) -> Result<SyncReport, SyncError> {
        if !TRANSFER_LIMITS.contains(&transfer_limit) {
            return Err(SyncError::Validation(format!(
                "transfer limit must be one of {:?}, got {}",
                TRANSFER_LIMITS, transfer_limit
            )));
        }

        let safes = self
            .store
            .safes_for_organization(organization_id)
            .map_err(|e| SyncError::Validation(format!("failed to load safes: {}", e)))?;

        info!(
            "Starting sync for organization {} ({} safes, limit {})",
            organization_id,
            safes.len(),
            transfer_limit
        );

        let mut report = SyncReport::default();

        // Every safe is announced as pending before any work starts.
        for safe in &safes {
            emit(
                events,
                &mut report,
                safe,
                SyncState::Pending,
                None,
                SyncProgress::default(),
            );
        }

        for safe in &safes {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            self.sync_safe(safe, transfer_limit, events, cancel, &mut report)
                .await?;
        }

        info!(
            "Sync completed for organization {}: {} written, {} skipped",
            organization_id, report.written, report.skipped
        );

        Ok(report)
    }

    async fn sync_safe(
        &self,
        safe: &Safe,
        transfer_limit: u32,
        events: &UnboundedSender<SyncEvent>,
        cancel: &SyncCancellation,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let mut progress = SyncProgress::default();
        emit(events, report, safe, SyncState::Syncing, None, progress);

        let existing = match self.store.existing_transfer_ids(&safe.address, safe.chain) {
            Ok(ids) => ids,
            Err(e) => {
                let err = SyncError::Store {
                    safe_address: safe.address.clone(),
                    chain: safe.chain,
                    reason: e.to_string(),
                };
                error!("{}", err);
                emit(
                    events,
                    report,
                    safe,
                    SyncState::Error,
                    Some(err.to_string()),
                    progress,
                );
                return Err(err);
            }
        };

        let page = tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = self
                .source
                .fetch_transfers(&safe.address, safe.chain, transfer_limit, None) => {
                match result {
                    Ok(page) => page,
                    Err(e) => {
                        let err = SyncError::Fetch {
                            safe_address: safe.address.clone(),
                            chain: safe.chain,
                            reason: e.to_string(),
                        };
                        error!("{}", err);
                        emit(
                            events,
                            report,
                            safe,
                            SyncState::Error,
                            Some(err.to_string()),
                            progress,
                        );
                        return Err(err);
                    }
                }
            }
        };

        let transfers = filter_trusted_transfers(page.results);
        progress.total = transfers.len();
        emit(events, report, safe, SyncState::Syncing, None, progress);

        for fetched in &transfers {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            progress.current += 1;

            if existing.contains(&fetched.transfer_id) {
                progress.skipped += 1;
                report.skipped += 1;
                emit(events, report, safe, SyncState::Syncing, None, progress);
                continue;
            }

            match self.store.insert_transfer_if_absent(&fetched.to_stored()) {
                Ok(inserted) => {
                    if inserted {
                        report.written += 1;
                    } else {
                        // A concurrent run won the race; the storage-level
                        // dedup swallowed the duplicate.
                        report.skipped += 1;
                    }
                }
                Err(e) => {
                    let err = SyncError::Write {
                        transfer_id: fetched.transfer_id.clone(),
                        reason: e.to_string(),
                    };
                    error!("{}", err);
                    emit(
                        events,
                        report,
                        safe,
                        SyncState::Error,
                        Some(err.to_string()),
                        progress,
                    );
                    return Err(err);
                }
            }

            emit(events, report, safe, SyncState::Syncing, None, progress);

            tokio::select! {
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(self.write_delay) => {}
            }
        }

        emit(events, report, safe, SyncState::Completed, None, progress);
        Ok(())
    }
}

fn emit(
    events: &UnboundedSender<SyncEvent>,
    report: &mut SyncReport,
    safe: &Safe,
    state: SyncState,
    message: Option<String>,
    progress: SyncProgress,
) {
    let safe_id = create_safe_chain_unique_id(&safe.address, safe.chain);
    let status = SafeSyncStatus {
        safe: SelectedSafe {
            address: safe.address.clone(),
            chain: safe.chain,
        },
        state,
        message,
        progress,
    };

    report.statuses.insert(safe_id.clone(), status.clone());

    // A dropped receiver only means nobody is watching progress.
    let _ = events.send(SyncEvent { safe_id, status });
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use anyhow::{Result, anyhow};
    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::model::{SafeTransfer, TokenInfo, Transfer, TransferPage, TransferType};

    struct FakeStore {
        safes: Vec<Safe>,
        transfers: Mutex<HashMap<String, Transfer>>,
        fail_writes: bool,
    }

    impl FakeStore {
        fn new(safes: Vec<Safe>) -> Self {
            Self {
                safes,
                transfers: Mutex::new(HashMap::new()),
                fail_writes: false,
            }
        }

        fn stored_count(&self) -> usize {
            self.transfers.lock().unwrap().len()
        }
    }

    impl LedgerStore for FakeStore {
        fn safes_for_organization(&self, organization_id: Uuid) -> Result<Vec<Safe>> {
            Ok(self
                .safes
                .iter()
                .filter(|s| s.organization_id == organization_id)
                .cloned()
                .collect())
        }

        fn existing_transfer_ids(
            &self,
            safe_address: &str,
            chain: Chain,
        ) -> Result<HashSet<String>> {
            Ok(self
                .transfers
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.safe_address == safe_address && t.safe_chain == chain)
                .map(|t| t.transfer_id.clone())
                .collect())
        }

        fn insert_transfer_if_absent(&self, transfer: &Transfer) -> Result<bool> {
            if self.fail_writes {
                return Err(anyhow!("disk on fire"));
            }

            let mut transfers = self.transfers.lock().unwrap();
            if transfers.contains_key(&transfer.transfer_id) {
                return Ok(false);
            }

            transfers.insert(transfer.transfer_id.clone(), transfer.clone());
            Ok(true)
        }
    }

    struct FakeSource {
        pages: HashMap<String, Vec<SafeTransfer>>,
        fail_for: Option<String>,
    }

    impl TransferSource for FakeSource {
        async fn fetch_transfers(
            &self,
            safe_address: &str,
            chain: Chain,
            _limit: u32,
            _token_address: Option<&str>,
        ) -> Result<TransferPage> {
            if self.fail_for.as_deref() == Some(safe_address) {
                return Err(anyhow!(
                    "failed to fetch transfers for safe {} on {}: HTTP 502",
                    safe_address,
                    chain.as_str()
                ));
            }

            let results = self.pages.get(safe_address).cloned().unwrap_or_default();
            Ok(TransferPage {
                count: results.len(),
                results,
            })
        }
    }

    fn safe(address: &str, organization_id: Uuid) -> Safe {
        Safe {
            address: address.to_string(),
            chain: Chain::ETH,
            organization_id,
            removed: false,
            removed_at: None,
            created_at: Utc::now(),
        }
    }

    fn fetched(safe_address: &str, transfer_id: &str) -> SafeTransfer {
        SafeTransfer {
            safe_address: safe_address.to_string(),
            chain: Chain::ETH,
            transfer_type: TransferType::EtherTransfer,
            execution_date: Utc::now(),
            block_number: 19_000_000,
            transaction_hash: format!("0xtx_{}", transfer_id),
            transfer_id: transfer_id.to_string(),
            to: safe_address.to_string(),
            from: "0x0000000000000000000000000000000000000009".to_string(),
            value: Some("1000000000000000000".to_string()),
            token_address: None,
            token_info: None,
        }
    }

    fn untrusted(safe_address: &str, transfer_id: &str) -> SafeTransfer {
        let mut transfer = fetched(safe_address, transfer_id);
        transfer.transfer_type = TransferType::Erc20Transfer;
        transfer.token_info = Some(TokenInfo {
            address: Some("0x000000000000000000000000000000000000dEaD".to_string()),
            name: "Spam".to_string(),
            symbol: "SPM".to_string(),
            decimals: 18,
            logo_uri: None,
            trusted: false,
        });
        transfer
    }

    fn service(
        store: FakeStore,
        source: FakeSource,
    ) -> SyncService<FakeStore, FakeSource> {
        SyncService::new(Arc::new(store), Arc::new(source), Duration::from_millis(0))
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut collected = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn second_run_skips_every_transfer() {
        let org = Uuid::new_v4();
        let store = FakeStore::new(vec![safe("0xaaa0", org)]);
        let source = FakeSource {
            pages: HashMap::from([(
                "0xaaa0".to_string(),
                vec![fetched("0xaaa0", "t1"), fetched("0xaaa0", "t2"), fetched("0xaaa0", "t3")],
            )]),
            fail_for: None,
        };

        let service = service(store, source);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();

        let first = service
            .sync_organization(org, 50, &tx, &cancel)
            .await
            .unwrap();
        assert_eq!(first.written, 3);
        assert_eq!(first.skipped, 0);

        let second = service
            .sync_organization(org, 50, &tx, &cancel)
            .await
            .unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(service.store.stored_count(), 3);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| e.status.state == SyncState::Completed));
    }

    #[tokio::test]
    async fn fetch_failure_halts_the_run_and_leaves_later_safes_pending() {
        let org = Uuid::new_v4();
        let store = FakeStore::new(vec![
            safe("0xaaa1", org),
            safe("0xaaa2", org),
            safe("0xaaa3", org),
        ]);
        let source = FakeSource {
            pages: HashMap::from([
                ("0xaaa1".to_string(), vec![fetched("0xaaa1", "t1")]),
                ("0xaaa3".to_string(), vec![fetched("0xaaa3", "t2")]),
            ]),
            fail_for: Some("0xaaa2".to_string()),
        };

        let service = service(store, source);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();

        let result = service.sync_organization(org, 50, &tx, &cancel).await;
        assert!(matches!(result, Err(SyncError::Fetch { .. })));

        let events = drain(&mut rx);
        let last_state = |safe_id: &str| {
            events
                .iter()
                .filter(|e| e.safe_id == safe_id)
                .last()
                .map(|e| e.status.state)
        };

        assert_eq!(last_state("0xaaa1_eth"), Some(SyncState::Completed));
        assert_eq!(last_state("0xaaa2_eth"), Some(SyncState::Error));
        // The third safe never left its initial state.
        assert_eq!(last_state("0xaaa3_eth"), Some(SyncState::Pending));
        assert_eq!(service.store.stored_count(), 1);
    }

    #[tokio::test]
    async fn write_failure_halts_the_run() {
        let org = Uuid::new_v4();
        let mut store = FakeStore::new(vec![safe("0xbbb1", org)]);
        store.fail_writes = true;
        let source = FakeSource {
            pages: HashMap::from([("0xbbb1".to_string(), vec![fetched("0xbbb1", "t1")])]),
            fail_for: None,
        };

        let service = service(store, source);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();

        let result = service.sync_organization(org, 50, &tx, &cancel).await;
        assert!(matches!(result, Err(SyncError::Write { .. })));

        let events = drain(&mut rx);
        let error = events
            .iter()
            .find(|e| e.status.state == SyncState::Error)
            .expect("an error status should have been emitted");
        assert!(error.status.message.as_ref().unwrap().contains("t1"));
    }

    #[tokio::test]
    async fn untrusted_token_transfers_are_never_written() {
        let org = Uuid::new_v4();
        let store = FakeStore::new(vec![safe("0xccc1", org)]);
        let source = FakeSource {
            pages: HashMap::from([(
                "0xccc1".to_string(),
                vec![fetched("0xccc1", "t1"), untrusted("0xccc1", "spam1")],
            )]),
            fail_for: None,
        };

        let service = service(store, source);
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();

        let report = service
            .sync_organization(org, 50, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(report.written, 1);
        assert!(
            !service
                .store
                .transfers
                .lock()
                .unwrap()
                .contains_key("spam1")
        );
    }

    #[tokio::test]
    async fn progress_counts_skipped_transfers() {
        let org = Uuid::new_v4();
        let store = FakeStore::new(vec![safe("0xddd1", org)]);
        store
            .transfers
            .lock()
            .unwrap()
            .insert("t1".to_string(), fetched("0xddd1", "t1").to_stored());

        let source = FakeSource {
            pages: HashMap::from([(
                "0xddd1".to_string(),
                vec![fetched("0xddd1", "t1"), fetched("0xddd1", "t2")],
            )]),
            fail_for: None,
        };

        let service = service(store, source);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();

        let report = service
            .sync_organization(org, 50, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);

        let events = drain(&mut rx);
        let final_progress = events
            .iter()
            .filter(|e| e.safe_id == "0xddd1_eth")
            .last()
            .unwrap()
            .status
            .progress;
        assert_eq!(final_progress.current, 2);
        assert_eq!(final_progress.total, 2);
        assert_eq!(final_progress.skipped, 1);
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_processing() {
        let org = Uuid::new_v4();
        let store = FakeStore::new(vec![safe("0xeee1", org)]);
        let source = FakeSource {
            pages: HashMap::from([("0xeee1".to_string(), vec![fetched("0xeee1", "t1")])]),
            fail_for: None,
        };

        let service = service(store, source);
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();
        cancel.cancel();

        let result = service.sync_organization(org, 50, &tx, &cancel).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert_eq!(service.store.stored_count(), 0);
    }

    #[tokio::test]
    async fn rejects_limits_outside_the_supported_set() {
        let org = Uuid::new_v4();
        let service = service(
            FakeStore::new(vec![]),
            FakeSource {
                pages: HashMap::new(),
                fail_for: None,
            },
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = SyncCancellation::new();

        let result = service.sync_organization(org, 37, &tx, &cancel).await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }
}
