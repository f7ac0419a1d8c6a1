use reso_dns::{ClassType, DnsFlags, DnsRecord, RecordType};

use crate::error::CacheError;
use crate::key::RRsetKey;
use crate::trust::{SecurityStatus, TrustRank};

/// Caller-supplied scratch space a served reply is copied into. Modeled
/// as owned, reference-counted-free Rust values rather than a literal
/// bump allocator, per the allowance that a typed implementation may
/// return owned records instead of fixing up pointers into a raw region.
/// The `budget` is what stands in for the arena's fixed capacity: built
/// with [`Arena::unbounded`] it never fails, but a caller that wants
/// `OutOfMemory` to be reachable can size it with
/// [`Arena::with_capacity`] and charge bytes as records are copied in.
pub struct Arena {
    remaining: usize,
}

impl Arena {
    pub fn with_capacity(bytes: usize) -> Self {
        Self { remaining: bytes }
    }

    pub fn unbounded() -> Self {
        Self {
            remaining: usize::MAX,
        }
    }

    pub(crate) fn charge(&mut self, n: usize) -> Result<(), CacheError> {
        match self.remaining.checked_sub(n) {
            Some(rest) => {
                self.remaining = rest;
                Ok(())
            }
            None => Err(CacheError::OutOfMemory),
        }
    }
}

/// Per-rrset record batch as handed back to a caller: the same records
/// that were stored, with each record's `ttl` converted from an absolute
/// expiry to seconds remaining as of the lookup's `now`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedRRset {
    pub key: RRsetKey,
    pub records: Vec<DnsRecord>,
    pub trust: TrustRank,
    pub security: SecurityStatus,
}

/// The object returned by a successful lookup or delegation build. Owned
/// by the caller's [`Arena`]; never aliases cache memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedMessage {
    pub qname: reso_dns::DomainName,
    pub qtype: RecordType,
    pub qclass: ClassType,
    pub flags: DnsFlags,
    pub answer: Vec<ServedRRset>,
    pub authority: Vec<ServedRRset>,
    pub additional: Vec<ServedRRset>,
}

impl ServedMessage {
    pub fn an_numrrsets(&self) -> usize {
        self.answer.len()
    }

    pub fn ns_numrrsets(&self) -> usize {
        self.authority.len()
    }

    pub fn ar_numrrsets(&self) -> usize {
        self.additional.len()
    }
}

/// Batches LRU touch bookkeeping for `RRsetStore::unlock_touch`:
/// `unlock_touch` only queues each entry's `Arc` here instead of
/// stamping it immediately, so a caller walking several locked rrsets
/// in one lookup defers every touch to a single pass at the end of the
/// request (`flush`) rather than one at a time as each lock is released.
#[derive(Default)]
pub struct ScratchArena {
    pending: Vec<(std::sync::Arc<crate::entry::RRsetEntry>, u64)>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn queue_touch(&mut self, entry: std::sync::Arc<crate::entry::RRsetEntry>, now: u64) {
        self.pending.push((entry, now));
    }

    /// Apply every queued touch and clear the queue.
    pub fn flush(&mut self) {
        for (entry, now) in self.pending.drain(..) {
            entry.touch(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_charge_fails_past_capacity() {
        let mut arena = Arena::with_capacity(16);
        assert!(arena.charge(10).is_ok());
        assert!(arena.charge(10).is_err());
    }

    #[test]
    fn test_unbounded_arena_never_fails() {
        let mut arena = Arena::unbounded();
        assert!(arena.charge(usize::MAX / 2).is_ok());
    }

    #[test]
    fn test_flush_applies_queued_touches() {
        use crate::entry::RRsetEntry;
        use crate::rrset::RRsetData;
        use crate::trust::{SecurityStatus, TrustRank};
        use reso_dns::{DnsRecordData, DomainName};
        use std::sync::Arc;

        let record = DnsRecord {
            name: DomainName::from_ascii("example.com").unwrap(),
            record_type: RecordType::A,
            class: ClassType::IN,
            ttl: 300,
            data: DnsRecordData::Ipv4(std::net::Ipv4Addr::new(192, 0, 2, 1)),
        };
        let data = RRsetData::new(vec![record], 0, 0, TrustRank::AnswerWithAa, SecurityStatus::Unchecked);
        let entry = Arc::new(RRsetEntry::new(1, data, 0));
        assert_eq!(entry.last_touch(), 0);

        let mut scratch = ScratchArena::new();
        scratch.queue_touch(entry.clone(), 500);
        assert_eq!(entry.last_touch(), 0, "touch must not apply until flush");

        scratch.flush();
        assert_eq!(entry.last_touch(), 500);
    }
}
