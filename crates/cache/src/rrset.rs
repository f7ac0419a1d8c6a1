use reso_dns::DnsRecord;

use crate::key::RRsetKey;
use crate::trust::{SecurityStatus, TrustRank};

/// Payload for one rrset cache entry.
///
/// `records` holds `count` primary records followed by `rrsig_count`
/// covering signatures — `count + rrsig_count` entries total, each paired
/// positionally with an absolute-expiry timestamp in `rr_expiry`. A
/// parallel packed `rr_len`/`rr_data`/`rr_ttl` layout would save a little
/// footprint, but `DnsRecord` already carries a record's wire-form rdata
/// and length, so only the one field it can't express — absolute rather
/// than relative TTL — needs its own parallel array.
#[derive(Debug, Clone, PartialEq)]
pub struct RRsetData {
    pub records: Vec<DnsRecord>,
    pub rr_expiry: Vec<u64>,
    pub count: u16,
    pub rrsig_count: u16,
    /// Set-level absolute expiry: `min(rr_expiry[0..count+rrsig_count])`.
    pub ttl: u64,
    pub trust: TrustRank,
    pub security: SecurityStatus,
}

impl RRsetData {
    /// Build a fresh entry from records just read off the wire (or
    /// synthesized), whose `ttl` fields are relative seconds, stamping
    /// each with an absolute expiry of `now + ttl`.
    pub fn new(
        records: Vec<DnsRecord>,
        rrsig_count: u16,
        now: u64,
        trust: TrustRank,
        security: SecurityStatus,
    ) -> Self {
        let count = (records.len() as u16).saturating_sub(rrsig_count);
        let rr_expiry: Vec<u64> = records
            .iter()
            .map(|r| now.saturating_add(r.ttl as u64))
            .collect();
        let ttl = rr_expiry.iter().copied().min().unwrap_or(now);
        Self {
            records,
            rr_expiry,
            count,
            rrsig_count,
            ttl,
            trust,
            security,
        }
    }

    #[cfg(test)]
    fn ttl_matches_min_invariant(&self) -> bool {
        self.rr_expiry.iter().copied().min() == Some(self.ttl)
    }

    /// Build the served copy handed to a caller's arena: the same records
    /// with each `ttl` field rewritten from an absolute expiry to the
    /// number of seconds remaining at `now`. Never produces a ttl greater
    /// than what was actually stored.
    pub fn to_served(&self, now: u64) -> Vec<DnsRecord> {
        self.records
            .iter()
            .zip(self.rr_expiry.iter())
            .map(|(r, &expiry)| {
                let mut r = r.clone();
                let remaining = expiry.saturating_sub(now).min(r.ttl as u64);
                r.ttl = remaining as u32;
                r
            })
            .collect()
    }
}

/// Whether two rrset payloads carry the same records, ignoring TTL. Used
/// as the merge-policy test on insert: byte-equal data just extends
/// lifetime instead of replacing (and bumping) the entry's id.
pub fn rrsetdata_equal(a: &RRsetData, b: &RRsetData) -> bool {
    if a.count != b.count || a.rrsig_count != b.rrsig_count {
        return false;
    }
    if a.records.len() != b.records.len() {
        return false;
    }
    a.records.iter().zip(b.records.iter()).all(|(x, y)| {
        x.name == y.name && x.record_type == y.record_type && x.class == y.class && x.data == y.data
    })
}

/// Extend `existing`'s TTLs to the max of `existing` and `incoming`,
/// record by record. Callers must have already verified
/// `rrsetdata_equal(existing, incoming)`.
pub fn extend_ttls(existing: &mut RRsetData, incoming: &RRsetData) {
    for (e, i) in existing.rr_expiry.iter_mut().zip(incoming.rr_expiry.iter()) {
        *e = (*e).max(*i);
    }
    for (e, i) in existing.records.iter_mut().zip(incoming.records.iter()) {
        e.ttl = e.ttl.max(i.ttl);
    }
    existing.ttl = existing.rr_expiry.iter().copied().min().unwrap_or(existing.ttl);
}

/// A durable, non-owning reference to an rrset entry. `id` is verified
/// against the live entry's id tag before every dereference; a mismatch
/// means the reference is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRsetRef {
    pub key: RRsetKey,
    pub id: u64,
}

impl RRsetRef {
    pub fn new(key: RRsetKey) -> Self {
        Self { key, id: 0 }
    }

    /// A freshly constructed ref with no assigned id is never live.
    pub fn is_unassigned(&self) -> bool {
        self.id == 0
    }
}
