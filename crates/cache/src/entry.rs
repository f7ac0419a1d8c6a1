use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RwLock};

use crate::key::RRsetKey;
use crate::rrset::RRsetData;

/// One rrset's slot in the store: an identity tag plus the reader/writer
/// lock around its data. `id` lives outside the lock (an `AtomicU64`) so a
/// reference can be checked for staleness without first blocking on the
/// data lock.
pub struct RRsetEntry {
    id: AtomicU64,
    last_touch: AtomicU64,
    data: Arc<RwLock<RRsetData>>,
}

impl RRsetEntry {
    pub fn new(id: u64, data: RRsetData, now: u64) -> Self {
        Self {
            id: AtomicU64::new(id),
            last_touch: AtomicU64::new(now),
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Acquire)
    }

    /// Stamp a fresh id, invalidating every outstanding `RRsetRef` whose
    /// `id` no longer matches. Called only while holding `data`'s write
    /// lock, so a concurrent reader either observes the old id under the
    /// old data or blocks until both have changed together.
    pub(crate) fn set_id(&self, id: u64) {
        self.id.store(id, Ordering::Release);
    }

    pub fn last_touch(&self) -> u64 {
        self.last_touch.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self, now: u64) {
        self.last_touch.store(now, Ordering::Relaxed);
    }

    pub(crate) fn read_arc(&self) -> ArcRwLockReadGuard<RRsetData> {
        self.data.read_arc()
    }

    pub(crate) fn write_arc(&self) -> ArcRwLockWriteGuard<RRsetData> {
        self.data.write_arc()
    }
}

enum RRsetGuard {
    Read(ArcRwLockReadGuard<RRsetData>),
    Write(ArcRwLockWriteGuard<RRsetData>),
}

impl RRsetGuard {
    fn data(&self) -> &RRsetData {
        match self {
            Self::Read(g) => g,
            Self::Write(g) => g,
        }
    }
}

/// A locked, verified handle on one rrset entry, returned by
/// `RRsetStore::lookup` and `RRsetStore::lock_refs`. Holds the entry's
/// `Arc` alongside the guard so `unlock_touch` can queue a deferred touch
/// on `ScratchArena` without re-deriving the entry from its key.
pub struct LockedRRset {
    pub key: RRsetKey,
    pub id: u64,
    entry: Arc<RRsetEntry>,
    guard: RRsetGuard,
}

impl LockedRRset {
    pub(crate) fn new_read(key: RRsetKey, id: u64, entry: Arc<RRsetEntry>, guard: ArcRwLockReadGuard<RRsetData>) -> Self {
        Self {
            key,
            id,
            entry,
            guard: RRsetGuard::Read(guard),
        }
    }

    pub(crate) fn new_write(key: RRsetKey, id: u64, entry: Arc<RRsetEntry>, guard: ArcRwLockWriteGuard<RRsetData>) -> Self {
        Self {
            key,
            id,
            entry,
            guard: RRsetGuard::Write(guard),
        }
    }

    pub fn data(&self) -> &RRsetData {
        self.guard.data()
    }

    pub fn data_mut(&mut self) -> Option<&mut RRsetData> {
        match &mut self.guard {
            RRsetGuard::Write(g) => Some(g),
            RRsetGuard::Read(_) => None,
        }
    }

    /// Hand out the entry's `Arc` so a caller can queue a touch on it in
    /// a `ScratchArena` without holding this guard open.
    pub(crate) fn entry_handle(&self) -> Arc<RRsetEntry> {
        self.entry.clone()
    }
}
