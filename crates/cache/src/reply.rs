use reso_dns::DnsFlags;

use crate::rrset::RRsetRef;

/// Which section of the original reply a constituent rrset belongs to.
/// Tracked alongside `refs` because `sort_refs` reorders `refs` into
/// lock-acquisition order, which has nothing to do with section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

/// A cached reply's metadata and the rrsets it's built from, referenced
/// by identity rather than by value so the constituent rrsets can be
/// independently evicted or replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyInfo {
    pub flags: DnsFlags,
    pub qdcount: u16,
    pub an_numrrsets: u16,
    pub ns_numrrsets: u16,
    pub ar_numrrsets: u16,
    /// Caller-supplied ttl ceiling, honored (not reinterpreted) by
    /// `MessageStore::store`: the final stored value is the min of this,
    /// the constituent rrsets' actual ttl, and the store's `max_ttl` cap.
    /// Pass [`ReplyInfo::UNBOUNDED_TTL`] when the caller has no ceiling of
    /// its own and wants the ttl derived purely from the rrsets (the
    /// common case); pass `0` for a reply that must never be retained
    /// regardless of how long its constituent rrsets live (e.g. a
    /// referral message whose NS rrset is still cacheable on its own).
    pub ttl: u64,
    /// Parallel to `sections`: `refs[i]` belongs to `sections[i]`.
    pub refs: Vec<RRsetRef>,
    pub sections: Vec<Section>,
}

impl ReplyInfo {
    /// Sentinel for `ttl` meaning "no caller ceiling, derive purely from
    /// the constituent rrsets' own ttl".
    pub const UNBOUNDED_TTL: u64 = u64::MAX;

    pub fn new(
        flags: DnsFlags,
        qdcount: u16,
        answer: Vec<RRsetRef>,
        authority: Vec<RRsetRef>,
        additional: Vec<RRsetRef>,
        ttl: u64,
    ) -> Self {
        let an_numrrsets = answer.len() as u16;
        let ns_numrrsets = authority.len() as u16;
        let ar_numrrsets = additional.len() as u16;

        let mut refs = Vec::with_capacity(answer.len() + authority.len() + additional.len());
        let mut sections = Vec::with_capacity(refs.capacity());
        for r in answer {
            refs.push(r);
            sections.push(Section::Answer);
        }
        for r in authority {
            refs.push(r);
            sections.push(Section::Authority);
        }
        for r in additional {
            refs.push(r);
            sections.push(Section::Additional);
        }

        Self {
            flags,
            qdcount,
            an_numrrsets,
            ns_numrrsets,
            ar_numrrsets,
            ttl,
            refs,
            sections,
        }
    }

    pub fn rrset_count(&self) -> u16 {
        self.an_numrrsets + self.ns_numrrsets + self.ar_numrrsets
    }

    /// Sort `refs` (and `sections` alongside it) by the total order
    /// `lock_refs` relies on for deadlock-free multi-entry locking.
    pub fn sort_refs(&mut self) {
        let mut paired: Vec<(RRsetRef, Section)> = self.refs.drain(..).zip(self.sections.drain(..)).collect();
        paired.sort_by(|a, b| a.0.key.cmp(&b.0.key));
        for (r, s) in paired {
            self.refs.push(r);
            self.sections.push(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::RRsetKey;
    use reso_dns::{ClassType, DomainName, RecordType};

    fn rref(name: &str, rt: RecordType) -> RRsetRef {
        RRsetRef::new(RRsetKey::new(DomainName::from_ascii(name).unwrap(), rt, ClassType::IN, 0))
    }

    #[test]
    fn test_rrset_count_sums_sections() {
        let info = ReplyInfo::new(
            DnsFlags::default(),
            1,
            vec![rref("a.com", RecordType::A), rref("b.com", RecordType::A)],
            vec![rref("c.com", RecordType::NS)],
            vec![rref("d.com", RecordType::A), rref("e.com", RecordType::A), rref("f.com", RecordType::A)],
            ReplyInfo::UNBOUNDED_TTL,
        );
        assert_eq!(info.rrset_count(), 6);
    }

    #[test]
    fn test_sort_refs_keeps_sections_paired_with_their_ref() {
        let mut info = ReplyInfo::new(
            DnsFlags::default(),
            1,
            vec![rref("b.com", RecordType::CNAME)],
            Vec::new(),
            vec![rref("a.com", RecordType::A)],
            ReplyInfo::UNBOUNDED_TTL,
        );
        info.sort_refs();
        assert_eq!(info.refs[0].key.record_type, RecordType::A);
        assert_eq!(info.sections[0], Section::Additional);
        assert_eq!(info.refs[1].key.record_type, RecordType::CNAME);
        assert_eq!(info.sections[1], Section::Answer);
    }
}
