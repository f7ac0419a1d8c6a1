use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::arena::ScratchArena;
use crate::entry::{LockedRRset, RRsetEntry};
use crate::key::RRsetKey;
use crate::rrset::{RRsetData, RRsetRef, extend_ttls, rrsetdata_equal};

/// Concurrent rrset cache: `RRsetKey` to entry, each guarded by its own
/// reader/writer lock. Capacity is enforced by evicting the
/// least-recently-touched entry whenever an insert grows the map past
/// it; insertion itself never fails on account of being full.
pub struct RRsetStore {
    map: DashMap<RRsetKey, Arc<RRsetEntry>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl RRsetStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Finds the entry for `key`, verifies it isn't expired as of `now`,
    /// and returns it locked in the requested mode. An absent or expired
    /// entry is a miss, not an error.
    pub fn lookup(&self, key: &RRsetKey, wr: bool, now: u64) -> Option<LockedRRset> {
        let entry = self.map.get(key)?.value().clone();
        if wr {
            let guard = entry.write_arc();
            let id = entry.id();
            if id == 0 || guard.ttl <= now {
                return None;
            }
            Some(LockedRRset::new_write(key.clone(), id, entry.clone(), guard))
        } else {
            let guard = entry.read_arc();
            let id = entry.id();
            if id == 0 || guard.ttl <= now {
                return None;
            }
            Some(LockedRRset::new_read(key.clone(), id, entry.clone(), guard))
        }
    }

    /// Installs or merges `data` under `r.key`, rewriting `r` in place to
    /// point at whatever the store now considers canonical for that key.
    pub fn insert(&self, r: &mut RRsetRef, data: RRsetData, now: u64) -> anyhow::Result<()> {
        match self.map.entry(r.key.clone()) {
            Entry::Vacant(v) => {
                let id = self.next_id.fetch_add(1, Ordering::AcqRel);
                let entry = Arc::new(RRsetEntry::new(id, data, now));
                v.insert(entry);
                r.id = id;
                tracing::debug!(key = ?r.key, id, "inserted new rrset entry");
            }
            Entry::Occupied(o) => {
                let existing = o.get().clone();
                let mut guard = existing.write_arc();
                if guard.trust > data.trust {
                    tracing::trace!(key = ?r.key, "lower-trust insert discarded, keeping existing");
                    r.key = o.key().clone();
                    r.id = existing.id();
                } else if rrsetdata_equal(&guard, &data) {
                    extend_ttls(&mut guard, &data);
                    r.key = o.key().clone();
                    r.id = existing.id();
                } else {
                    let new_id = self.next_id.fetch_add(1, Ordering::AcqRel);
                    *guard = data;
                    drop(guard);
                    existing.set_id(new_id);
                    r.key = o.key().clone();
                    r.id = new_id;
                    tracing::debug!(key = ?r.key, id = new_id, "replaced rrset entry, invalidating prior refs");
                }
            }
        }
        self.evict_if_over_capacity();
        Ok(())
    }

    fn evict_if_over_capacity(&self) {
        if self.map.len() <= self.capacity {
            return;
        }
        let mut oldest: Option<(RRsetKey, u64)> = None;
        for item in self.map.iter() {
            let t = item.value().last_touch();
            if oldest.as_ref().map(|(_, ot)| t < *ot).unwrap_or(true) {
                oldest = Some((item.key().clone(), t));
            }
        }
        if let Some((key, _)) = oldest {
            if let Some((_, entry)) = self.map.remove(&key) {
                entry.set_id(0);
                tracing::trace!(key = ?key, "evicted rrset entry over capacity");
            }
        }
    }

    /// Acquires a read lock on every entry named by `refs`, in the total
    /// order `RRsetKey::cmp` defines, verifying each against its `id`. On
    /// the first mismatch (absent, stale, or expired) every previously
    /// acquired lock is released and `None` is returned — a stale
    /// reference anywhere in a cached reply makes the whole reply a miss.
    pub fn lock_refs(&self, refs: &[RRsetRef], now: u64) -> Option<Vec<LockedRRset>> {
        let mut order: Vec<usize> = (0..refs.len()).collect();
        order.sort_by(|&a, &b| refs[a].key.cmp(&refs[b].key));

        let mut out: Vec<Option<LockedRRset>> = (0..refs.len()).map(|_| None).collect();
        for idx in order {
            let r = &refs[idx];
            let locked = self.map.get(&r.key).and_then(|entry| {
                let entry = entry.value().clone();
                let guard = entry.read_arc();
                let id = entry.id();
                if id == 0 || id != r.id || guard.ttl <= now {
                    None
                } else {
                    Some(LockedRRset::new_read(r.key.clone(), id, entry, guard))
                }
            });
            match locked {
                Some(l) => out[idx] = Some(l),
                None => return None,
            }
        }
        Some(out.into_iter().map(|o| o.expect("filled above")).collect())
    }

    /// Releases every lock in `locked` (by drop) without recording a
    /// touch.
    pub fn unlock_refs(&self, locked: Vec<LockedRRset>) {
        drop(locked);
    }

    /// Releases every lock in `locked`, queueing an LRU touch for each
    /// into `scratch` rather than stamping it here. The caller flushes
    /// `scratch` once it's done synthesizing the reply, batching every
    /// touch from the request into a single pass.
    pub fn unlock_touch(&self, locked: Vec<LockedRRset>, scratch: &mut ScratchArena, now: u64) {
        for l in &locked {
            scratch.queue_touch(l.entry_handle(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{SecurityStatus, TrustRank};
    use reso_dns::{ClassType, DnsRecord, DnsRecordData, DomainName, RecordType};

    fn a_rrset(owner: &str, ttl: u32, now: u64, trust: TrustRank) -> RRsetData {
        let record = DnsRecord {
            name: DomainName::from_ascii(owner).unwrap(),
            record_type: RecordType::A,
            class: ClassType::IN,
            ttl,
            data: DnsRecordData::Ipv4(std::net::Ipv4Addr::new(192, 0, 2, 1)),
        };
        RRsetData::new(vec![record], 0, now, trust, SecurityStatus::Unchecked)
    }

    fn key(owner: &str) -> RRsetKey {
        RRsetKey::new(DomainName::from_ascii(owner).unwrap(), RecordType::A, ClassType::IN, 0)
    }

    #[test]
    fn test_insert_then_lookup_round_trip() {
        let store = RRsetStore::new(100);
        let mut r = RRsetRef::new(key("example.com"));
        store.insert(&mut r, a_rrset("example.com", 300, 1000, TrustRank::AnswerWithAa), 1000).unwrap();
        assert_ne!(r.id, 0);

        let locked = store.lookup(&key("example.com"), false, 1010).unwrap();
        assert_eq!(locked.data().ttl, 1300);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let store = RRsetStore::new(100);
        let mut r = RRsetRef::new(key("example.com"));
        store.insert(&mut r, a_rrset("example.com", 10, 1000, TrustRank::AnswerWithAa), 1000).unwrap();
        assert!(store.lookup(&key("example.com"), false, 2000).is_none());
    }

    #[test]
    fn test_lower_trust_insert_is_discarded() {
        let store = RRsetStore::new(100);
        let mut r1 = RRsetRef::new(key("example.com"));
        store.insert(&mut r1, a_rrset("example.com", 300, 1000, TrustRank::Validated), 1000).unwrap();
        let original_id = r1.id;

        let mut r2 = RRsetRef::new(key("example.com"));
        store.insert(&mut r2, a_rrset("example.com", 300, 1000, TrustRank::Glue), 1000).unwrap();
        assert_eq!(r2.id, original_id);

        let locked = store.lookup(&key("example.com"), false, 1000).unwrap();
        assert_eq!(locked.data().trust, TrustRank::Validated);
    }

    #[test]
    fn test_byte_equal_insert_extends_ttl_without_bumping_id() {
        let store = RRsetStore::new(100);
        let mut r1 = RRsetRef::new(key("example.com"));
        store.insert(&mut r1, a_rrset("example.com", 60, 1000, TrustRank::AnswerWithAa), 1000).unwrap();
        let id_before = r1.id;

        let mut r2 = RRsetRef::new(key("example.com"));
        store.insert(&mut r2, a_rrset("example.com", 300, 1000, TrustRank::AnswerWithAa), 1000).unwrap();
        assert_eq!(r2.id, id_before);

        let locked = store.lookup(&key("example.com"), false, 1000).unwrap();
        assert_eq!(locked.data().ttl, 1300);
    }

    #[test]
    fn test_differing_data_insert_bumps_id() {
        let store = RRsetStore::new(100);
        let mut r1 = RRsetRef::new(key("example.com"));
        store.insert(&mut r1, a_rrset("example.com", 300, 1000, TrustRank::AnswerWithAa), 1000).unwrap();
        let id_before = r1.id;

        let record = DnsRecord {
            name: DomainName::from_ascii("example.com").unwrap(),
            record_type: RecordType::A,
            class: ClassType::IN,
            ttl: 300,
            data: DnsRecordData::Ipv4(std::net::Ipv4Addr::new(192, 0, 2, 2)),
        };
        let different = RRsetData::new(vec![record], 0, 1000, TrustRank::AnswerWithAa, SecurityStatus::Unchecked);

        let mut r2 = RRsetRef::new(key("example.com"));
        store.insert(&mut r2, different, 1000).unwrap();
        assert_ne!(r2.id, id_before);
    }

    #[test]
    fn test_stale_reference_fails_lock_refs() {
        let store = RRsetStore::new(100);
        let mut r = RRsetRef::new(key("example.com"));
        store.insert(&mut r, a_rrset("example.com", 300, 1000, TrustRank::AnswerWithAa), 1000).unwrap();

        let stale_ref = RRsetRef { key: r.key.clone(), id: r.id };

        let record = DnsRecord {
            name: DomainName::from_ascii("example.com").unwrap(),
            record_type: RecordType::A,
            class: ClassType::IN,
            ttl: 300,
            data: DnsRecordData::Ipv4(std::net::Ipv4Addr::new(192, 0, 2, 9)),
        };
        let different = RRsetData::new(vec![record], 0, 1000, TrustRank::AnswerWithAa, SecurityStatus::Unchecked);
        let mut r2 = RRsetRef::new(key("example.com"));
        store.insert(&mut r2, different, 1000).unwrap();

        assert!(store.lock_refs(&[stale_ref], 1000).is_none());
    }

    #[test]
    fn test_lock_refs_acquires_in_sorted_order_and_returns_in_original_order() {
        let store = RRsetStore::new(100);
        let mut r_ns = RRsetRef::new(RRsetKey::new(
            DomainName::from_ascii("example.com").unwrap(),
            RecordType::NS,
            ClassType::IN,
            0,
        ));
        let ns_record = DnsRecord {
            name: DomainName::from_ascii("example.com").unwrap(),
            record_type: RecordType::NS,
            class: ClassType::IN,
            ttl: 300,
            data: DnsRecordData::DomainName(DomainName::from_ascii("ns1.example.com").unwrap()),
        };
        store
            .insert(
                &mut r_ns,
                RRsetData::new(vec![ns_record], 0, 1000, TrustRank::AuthorityWithAa, SecurityStatus::Unchecked),
                1000,
            )
            .unwrap();

        let mut r_a = RRsetRef::new(key("example.com"));
        store.insert(&mut r_a, a_rrset("example.com", 300, 1000, TrustRank::AnswerWithAa), 1000).unwrap();

        let refs = vec![r_ns.clone(), r_a.clone()];
        let locked = store.lock_refs(&refs, 1000).unwrap();
        assert_eq!(locked.len(), 2);
        assert_eq!(locked[0].key, r_ns.key);
        assert_eq!(locked[1].key, r_a.key);
    }
}
