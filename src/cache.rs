//! Single-flight cache of computed indicator series.
//!
//! Entries are keyed by (indicator, category, range, grouping) and stamped with the
//! mention store's data version. A stamp mismatch forces a recompute, and the
//! first request at a newer version drops every older entry. The
//! computation for a key runs in its own task, so it completes and fills
//! the cache even if every caller waiting on it goes away.

use crate::error::{IndicatorError, Result};
use crate::models::{Category, Grouping, IndicatorSeries, PeriodRange};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Identity of a cached series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub indicator_id: String,
    pub category: Option<Category>,
    pub range: PeriodRange,
    pub grouping: Grouping,
}

impl CacheKey {
    pub fn new(
        indicator_id: impl Into<String>,
        category: Option<&str>,
        range: PeriodRange,
        grouping: Grouping,
    ) -> Self {
        Self {
            indicator_id: indicator_id.into(),
            category: category.map(String::from),
            range,
            grouping,
        }
    }
}

type SharedComputation = Shared<BoxFuture<'static, Result<Arc<IndicatorSeries>>>>;

enum Slot {
    Ready {
        version: u64,
        series: Arc<IndicatorSeries>,
    },
    Pending {
        version: u64,
        ticket: u64,
        computation: SharedComputation,
    },
}

impl Slot {
    fn version(&self) -> u64 {
        match self {
            Slot::Ready { version, .. } | Slot::Pending { version, .. } => *version,
        }
    }
}

type Slots = Arc<Mutex<HashMap<CacheKey, Slot>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memoizes indicator series with single-flight semantics.
///
/// The map lock is only held to look up or swap a slot, never while a
/// computation runs, so distinct keys compute in parallel.
#[derive(Default)]
pub struct SeriesCache {
    slots: Slots,
    next_ticket: AtomicU64,
    latest_version: AtomicU64,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached series for `key` at `version`, or compute it.
    ///
    /// Concurrent callers for the same key and version share one run of
    /// `compute`. Failures are returned to every waiter and not cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        version: u64,
        compute: F,
    ) -> Result<Arc<IndicatorSeries>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IndicatorSeries>> + Send + 'static,
    {
        let computation = {
            let mut slots = lock(&self.slots);

            if version > self.latest_version.load(Ordering::SeqCst) {
                self.latest_version.store(version, Ordering::SeqCst);
                let before = slots.len();
                slots.retain(|_, slot| slot.version() >= version);
                if slots.len() < before {
                    debug!(
                        "Dropped {} cache entries older than data version {}",
                        before - slots.len(),
                        version
                    );
                }
            }

            match slots.get(&key) {
                Some(Slot::Ready { version: v, series }) if *v == version => {
                    debug!("Cache hit for {} ({})", key.indicator_id, key.grouping);
                    return Ok(Arc::clone(series));
                }
                Some(Slot::Pending {
                    version: v,
                    computation,
                    ..
                }) if *v == version => {
                    debug!("Joining in-flight computation for {}", key.indicator_id);
                    computation.clone()
                }
                stale => {
                    if stale.is_some() {
                        debug!("Cache entry for {} is stale", key.indicator_id);
                    } else {
                        debug!("Cache miss for {} ({})", key.indicator_id, key.grouping);
                    }

                    let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
                    let computation = self.spawn(key.clone(), version, ticket, compute());
                    slots.insert(
                        key,
                        Slot::Pending {
                            version,
                            ticket,
                            computation: computation.clone(),
                        },
                    );
                    computation
                }
            }
        };

        computation.await
    }

    /// Run `work` on its own task and settle the slot when it finishes.
    fn spawn<Fut>(&self, key: CacheKey, version: u64, ticket: u64, work: Fut) -> SharedComputation
    where
        Fut: Future<Output = Result<IndicatorSeries>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);

        let handle = tokio::spawn(async move {
            let outcome = work.await.map(Arc::new);

            let mut slots = lock(&slots);
            let still_ours = matches!(
                slots.get(&key),
                Some(Slot::Pending { ticket: t, .. }) if *t == ticket
            );
            if still_ours {
                match &outcome {
                    Ok(series) => {
                        slots.insert(
                            key,
                            Slot::Ready {
                                version,
                                series: Arc::clone(series),
                            },
                        );
                    }
                    Err(_) => {
                        slots.remove(&key);
                    }
                }
            }

            outcome
        });

        async move {
            handle
                .await
                .map_err(|e| IndicatorError::ComputationFailed(e.to_string()))?
        }
        .boxed()
        .shared()
    }

    /// Number of ready or in-flight entries.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
