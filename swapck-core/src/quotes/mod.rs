//! Quote book: the latest set of payment quotes, one per payable token.
//!
//! A refresh cycle produces a complete [`QuoteSnapshot`] which replaces the
//! previous one wholesale. Readers hold an `Arc` to an immutable snapshot,
//! so they never observe a half-updated set.

pub mod refresher;

pub use refresher::{QuoteParams, QuoteRefresher, fetch_cycle, quote_token};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swapck_sdk::objects::{Felt, Quote};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// All quotes of one refresh cycle, keyed by the token being sold.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    cycle: u64,
    fetched_at: time::OffsetDateTime,
    quotes: HashMap<Felt, Quote>,
}

impl QuoteSnapshot {
    pub fn new(cycle: u64, quotes: HashMap<Felt, Quote>) -> Self {
        Self {
            cycle,
            fetched_at: time::OffsetDateTime::now_utc(),
            quotes,
        }
    }

    /// The snapshot a book starts with: cycle 0, no quotes.
    pub fn empty() -> Self {
        Self {
            cycle: 0,
            fetched_at: time::OffsetDateTime::UNIX_EPOCH,
            quotes: HashMap::new(),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn fetched_at(&self) -> time::OffsetDateTime {
        self.fetched_at
    }

    /// Quote for selling `token` into the settlement token.
    pub fn get(&self, token: &Felt) -> Option<&Quote> {
        self.quotes.get(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Felt, &Quote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Publisher side of the quote snapshots.
///
/// Cloning shares the same book. Cycle numbers are handed out in order and a
/// snapshot is only published if its cycle is newer than the current one, so
/// a slow cycle finishing late cannot overwrite a fresher result.
#[derive(Debug, Clone)]
pub struct QuoteBook {
    tx: Arc<watch::Sender<Arc<QuoteSnapshot>>>,
    next_cycle: Arc<AtomicU64>,
}

impl QuoteBook {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(QuoteSnapshot::empty()));
        Self {
            tx: Arc::new(tx),
            next_cycle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Reserve the number of a new refresh cycle.
    pub fn begin_cycle(&self) -> u64 {
        self.next_cycle.fetch_add(1, Ordering::SeqCst)
    }

    /// Replace the current snapshot if `snapshot` is newer.
    ///
    /// Returns whether it was published.
    pub fn publish(&self, snapshot: QuoteSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        self.tx.send_if_modified(|current| {
            if snapshot.cycle > current.cycle {
                *current = snapshot;
                true
            } else {
                false
            }
        })
    }

    /// Drop every quote, e.g. when the wallet disconnects.
    pub fn clear(&self) {
        let cycle = self.begin_cycle();
        self.publish(QuoteSnapshot::new(cycle, HashMap::new()));
    }

    pub fn current(&self) -> Arc<QuoteSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<QuoteSnapshot>> {
        self.tx.subscribe()
    }

    /// Snapshots as a stream, starting with the current one.
    pub fn stream(&self) -> WatchStream<Arc<QuoteSnapshot>> {
        WatchStream::new(self.subscribe())
    }
}

impl Default for QuoteBook {
    fn default() -> Self {
        Self::new()
    }
}
