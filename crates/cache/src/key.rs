use std::cmp::Ordering;

use reso_dns::{ClassType, DomainName, RecordType};

/// Composite identity of an rrset cache entry.
///
/// Equality and hashing use all four fields in this declaration order,
/// which is also the order a wire-parser building a key from a freshly
/// decoded record would populate them in, so keys built from either side
/// land in the same hash bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RRsetKey {
    pub owner: DomainName,
    pub record_type: RecordType,
    pub class: ClassType,
    /// Opaque bitfield distinguishing entries that otherwise share
    /// owner/type/class — e.g. glue vs. an authoritative copy of the same
    /// rrset.
    pub flags: u32,
}

impl RRsetKey {
    pub fn new(owner: DomainName, record_type: RecordType, class: ClassType, flags: u32) -> Self {
        Self {
            owner,
            record_type,
            class,
            flags,
        }
    }

    /// The total order `lock_refs` acquires locks in: type, then owner
    /// length, then owner canonically, then class, then flags. This order
    /// (not the field-declaration order used for hashing) is what
    /// deadlock-freedom in the Synthesizer depends on — two threads
    /// locking the same set of rrsets always acquire them in this order.
    fn sort_key(&self) -> (u16, usize, &DomainName, u16, u32) {
        (
            self.record_type as u16,
            self.owner.wire_len(),
            &self.owner,
            self.class as u16,
            self.flags,
        )
    }
}

impl PartialOrd for RRsetKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RRsetKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Identity of a cached reply message. Name comparisons are
/// case-insensitive because `DomainName` is always stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub qname: DomainName,
    pub qtype: RecordType,
    pub qclass: ClassType,
}

impl QueryKey {
    pub fn new(qname: DomainName, qtype: RecordType, qclass: ClassType) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(owner: &str, rt: RecordType, flags: u32) -> RRsetKey {
        RRsetKey::new(
            DomainName::from_ascii(owner).unwrap(),
            rt,
            ClassType::IN,
            flags,
        )
    }

    #[test]
    fn test_equality_is_case_insensitive_via_domain_name() {
        let a = key("Example.COM", RecordType::A, 0);
        let b = key("example.com", RecordType::A, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_flags_are_distinct_entries() {
        let a = key("example.com", RecordType::A, 0);
        let b = key("example.com", RecordType::A, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sort_order_is_type_then_len_then_name() {
        let ns = key("example.com", RecordType::NS, 0);
        let a = key("example.com", RecordType::A, 0);
        let cname = key("www.example.com", RecordType::CNAME, 0);

        let mut keys = vec![cname.clone(), ns.clone(), a.clone()];
        keys.sort();

        // A(1) < NS(2) < CNAME(5) by record type ordinal.
        assert_eq!(keys, vec![a, ns, cname]);
    }
}
