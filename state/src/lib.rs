//! The global state shared between workers
//!
//! Ownership follows the pipeline: the matching engine owns live books and
//! publishes read-only snapshots here; the settlement coordinator is the
//! sole mutator of settlement records; the completed-match log is append
//! only. The whitelist is swapped atomically as a whole snapshot

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

mod whitelist;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use common::{
    new_shared,
    types::{BookSnapshot, MatchResult, SettlementRecord},
    Shared,
};

pub use whitelist::WhitelistSnapshot;

/// Error message emitted when the settlements lock is poisoned
const ERR_SETTLEMENTS_POISONED: &str = "settlements lock poisoned";
/// Error message emitted when the match log lock is poisoned
const ERR_MATCHES_POISONED: &str = "match log lock poisoned";
/// Error message emitted when the pending queue lock is poisoned
const ERR_PENDING_POISONED: &str = "pending match queue lock poisoned";
/// Error message emitted when the book snapshot lock is poisoned
const ERR_BOOKS_POISONED: &str = "book snapshots lock poisoned";
/// Error message emitted when the whitelist lock is poisoned
const ERR_WHITELIST_POISONED: &str = "whitelist lock poisoned";

/// The top-level state handle, cheaply cloneable across workers
#[derive(Clone, Debug)]
pub struct State {
    /// Settlement records indexed by match identifier
    settlements: Shared<HashMap<String, SettlementRecord>>,
    /// Match identifiers in record-creation order, for stable listings
    settlement_order: Shared<Vec<String>>,
    /// The append-only log of completed matches
    completed_matches: Shared<Vec<MatchResult>>,
    /// Matches awaiting proof generation, in FIFO order
    pending_matches: Shared<VecDeque<MatchResult>>,
    /// The latest published book snapshot per asset
    book_snapshots: Shared<HashMap<String, BookSnapshot>>,
    /// The current whitelist snapshot; swapped atomically on rebuild
    whitelist: Shared<Arc<WhitelistSnapshot>>,
}

impl State {
    /// Construct the global state around an initial whitelist
    pub fn new(whitelist: WhitelistSnapshot) -> Self {
        Self {
            settlements: new_shared(HashMap::new()),
            settlement_order: new_shared(Vec::new()),
            completed_matches: new_shared(Vec::new()),
            pending_matches: new_shared(VecDeque::new()),
            book_snapshots: new_shared(HashMap::new()),
            whitelist: new_shared(Arc::new(whitelist)),
        }
    }

    // -------------
    // | Whitelist |
    // -------------

    /// Take a reference to the current whitelist snapshot
    ///
    /// The returned snapshot is immutable; a concurrent rebuild installs a
    /// new snapshot without touching this one
    pub fn whitelist(&self) -> Arc<WhitelistSnapshot> {
        self.whitelist.read().expect(ERR_WHITELIST_POISONED).clone()
    }

    /// Atomically install a rebuilt whitelist snapshot
    pub fn install_whitelist(&self, snapshot: WhitelistSnapshot) {
        *self.whitelist.write().expect(ERR_WHITELIST_POISONED) = Arc::new(snapshot);
    }

    // -------------------
    // | Book Snapshots |
    // -------------------

    /// Publish a fresh read-only snapshot of one asset's book
    pub fn publish_book_snapshot(&self, snapshot: BookSnapshot) {
        self.book_snapshots
            .write()
            .expect(ERR_BOOKS_POISONED)
            .insert(snapshot.asset.clone(), snapshot);
    }

    /// The latest snapshot for an asset, or an empty book if none exists
    pub fn book_snapshot(&self, asset: &str) -> BookSnapshot {
        self.book_snapshots
            .read()
            .expect(ERR_BOOKS_POISONED)
            .get(asset)
            .cloned()
            .unwrap_or_else(|| BookSnapshot::empty(asset))
    }

    // -----------
    // | Matches |
    // -----------

    /// Record a freshly struck match: append to the completed log and the
    /// pending-proof queue
    pub fn record_match(&self, match_result: MatchResult) {
        self.completed_matches
            .write()
            .expect(ERR_MATCHES_POISONED)
            .push(match_result.clone());
        self.pending_matches.write().expect(ERR_PENDING_POISONED).push_back(match_result);
    }

    /// All completed matches, oldest first
    pub fn completed_matches(&self) -> Vec<MatchResult> {
        self.completed_matches.read().expect(ERR_MATCHES_POISONED).clone()
    }

    /// Remove a specific match from the pending queue; returns whether it
    /// was present
    pub fn remove_pending_match(&self, match_id: &str) -> bool {
        let mut pending = self.pending_matches.write().expect(ERR_PENDING_POISONED);
        let before = pending.len();
        pending.retain(|m| m.match_id != match_id);
        pending.len() != before
    }

    /// Drain the pending match queue in FIFO order
    pub fn drain_pending_matches(&self) -> Vec<MatchResult> {
        self.pending_matches.write().expect(ERR_PENDING_POISONED).drain(..).collect()
    }

    /// The number of matches awaiting proof generation
    pub fn n_pending_matches(&self) -> usize {
        self.pending_matches.read().expect(ERR_PENDING_POISONED).len()
    }

    // ---------------
    // | Settlements |
    // ---------------

    /// Create a settlement record; returns false if one already exists for
    /// the match
    pub fn create_settlement_record(&self, record: SettlementRecord) -> bool {
        let mut settlements = self.settlements.write().expect(ERR_SETTLEMENTS_POISONED);
        if settlements.contains_key(&record.match_id) {
            return false;
        }

        self.settlement_order
            .write()
            .expect(ERR_SETTLEMENTS_POISONED)
            .push(record.match_id.clone());
        settlements.insert(record.match_id.clone(), record);
        true
    }

    /// Read a settlement record by match identifier
    pub fn settlement_record(&self, match_id: &str) -> Option<SettlementRecord> {
        self.settlements.read().expect(ERR_SETTLEMENTS_POISONED).get(match_id).cloned()
    }

    /// Apply a mutation to a settlement record
    ///
    /// Only the settlement coordinator calls this; returns false if the
    /// record does not exist
    pub fn update_settlement_record<F>(&self, match_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut SettlementRecord),
    {
        let mut settlements = self.settlements.write().expect(ERR_SETTLEMENTS_POISONED);
        match settlements.get_mut(match_id) {
            Some(record) => {
                update(record);
                true
            },
            None => false,
        }
    }

    /// List settlement records, optionally filtered to one trader, in
    /// record-creation order
    pub fn settlements(&self, trader: Option<&str>) -> Vec<SettlementRecord> {
        let settlements = self.settlements.read().expect(ERR_SETTLEMENTS_POISONED);
        let order = self.settlement_order.read().expect(ERR_SETTLEMENTS_POISONED);

        order
            .iter()
            .filter_map(|match_id| settlements.get(match_id))
            .filter(|record| match trader {
                Some(addr) => record.buyer == addr || record.seller == addr,
                None => true,
            })
            .cloned()
            .collect()
    }
}
