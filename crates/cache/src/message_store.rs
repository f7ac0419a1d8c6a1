use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcRwLockReadGuard, RwLock};

use crate::key::QueryKey;
use crate::reply::ReplyInfo;

struct MessageEntry {
    data: Arc<RwLock<ReplyInfo>>,
}

/// A locked, read-only handle on a cached reply. The caller drives
/// synthesis (locking the constituent rrsets, copying into an arena)
/// while holding this, then drops it to release the message lock.
pub struct LockedReply {
    guard: ArcRwLockReadGuard<ReplyInfo>,
}

impl LockedReply {
    pub fn data(&self) -> &ReplyInfo {
        &self.guard
    }
}

/// Concurrent reply cache: `QueryKey` to a message entry referencing
/// rrsets in an `RRsetStore` by identity.
pub struct MessageStore {
    map: DashMap<QueryKey, Arc<MessageEntry>>,
    capacity: usize,
}

impl MessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn lookup(&self, qkey: &QueryKey) -> Option<LockedReply> {
        let entry = self.map.get(qkey)?.value().clone();
        let guard = entry.data.read_arc();
        Some(LockedReply { guard })
    }

    /// Installs `reply` under `qkey`. `reply.ttl` (the caller's ceiling,
    /// `ReplyInfo::UNBOUNDED_TTL` if it has none) is honored rather than
    /// reinterpreted: the final stored value is the min of that ceiling,
    /// the constituent `rrset_ttls`, and `now + max_ttl`. A caller that
    /// deliberately set `reply.ttl = 0` — e.g. a referral it never wants
    /// cached even though its NS rrset is still good — is never
    /// overridden back up by a longer-lived rrset. If the result comes
    /// out to `now` or earlier the message is not retained at all — but
    /// the caller has already inserted the constituent rrsets into the
    /// `RRsetStore`, so delegation information from this reply survives
    /// regardless. Returns whether the message was actually stored.
    pub fn store(&self, qkey: QueryKey, mut reply: ReplyInfo, rrset_ttls: &[u64], now: u64, max_ttl: u64) -> bool {
        let min_rrset_ttl = rrset_ttls.iter().copied().min().unwrap_or(now);
        let capped = now.saturating_add(max_ttl);
        reply.ttl = reply.ttl.min(min_rrset_ttl).min(capped);

        if reply.ttl <= now {
            tracing::debug!(qname = ?qkey.qname, "reply has zero or negative ttl, not retaining message");
            return false;
        }
        if reply.rrset_count() == 0 {
            tracing::warn!(qname = ?qkey.qname, "refusing to store a reply with no constituent rrsets");
            return false;
        }

        reply.sort_refs();
        self.map.insert(qkey, Arc::new(MessageEntry { data: Arc::new(RwLock::new(reply)) }));
        self.evict_if_over_capacity();
        true
    }

    pub fn remove(&self, qkey: &QueryKey) {
        self.map.remove(qkey);
    }

    fn evict_if_over_capacity(&self) {
        if self.map.len() <= self.capacity {
            return;
        }
        // Approximate LRU: evict an arbitrary entry near the front of
        // iteration order. Message entries don't carry their own touch
        // timestamp (unlike rrsets, they're cheap to recompute on a
        // miss), so exactness here isn't load-bearing.
        if let Some(key) = self.map.iter().next().map(|e| e.key().clone()) {
            self.map.remove(&key);
        }
    }
}
