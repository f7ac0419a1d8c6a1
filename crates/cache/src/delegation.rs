use reso_dns::{ClassType, DnsFlags, DnsRecordData, DomainName, RecordType};

use crate::arena::{Arena, ServedMessage, ServedRRset};
use crate::env::CacheEnv;
use crate::key::RRsetKey;

/// One nameserver named by a delegation, plus whatever A/AAAA glue the
/// store happens to have for it. An empty `addresses` list just means no
/// glue is cached yet, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct NameserverInfo {
    pub name: DomainName,
    pub addresses: Vec<ServedRRset>,
}

/// The best known zone cut for a name: owner, nameservers with whatever
/// glue is cached, and an optional DS/NSEC proof. Lives in the caller's
/// arena.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationPoint {
    pub owner: DomainName,
    pub nameservers: Vec<NameserverInfo>,
    pub security: Option<ServedRRset>,
}

/// Walks ancestors of `qname` (including itself) looking for the closest
/// cached NS set, then attaches glue and DNSSEC security records.
/// Allocation failures along the way are logged and the partially
/// populated `DelegationPoint` is returned anyway — missing glue is
/// never fatal to a delegation.
pub fn find_delegation(
    env: &CacheEnv,
    qname: &DomainName,
    qclass: ClassType,
    now: u64,
    arena: &mut Arena,
    want_referral: bool,
) -> Option<(DelegationPoint, Option<ServedMessage>)> {
    let (owner, ns_served) = find_closest_ns(env, qname, qclass, now)?;

    let ns_names: Vec<DomainName> = ns_served
        .records
        .iter()
        .filter_map(|r| match &r.data {
            DnsRecordData::DomainName(name) => Some(name.clone()),
            _ => None,
        })
        .collect();

    let mut referral = if want_referral {
        Some(ServedMessage {
            qname: qname.clone(),
            qtype: RecordType::NS,
            qclass,
            flags: DnsFlags { qr: true, ..Default::default() },
            answer: Vec::new(),
            authority: vec![ns_served.clone()],
            additional: Vec::new(),
        })
    } else {
        None
    };

    let security = lookup_security(env, &owner, qclass, now, arena);
    if let (Some(msg), Some(sec)) = (referral.as_mut(), security.as_ref()) {
        msg.authority.push(sec.clone());
    }

    let mut nameservers = Vec::with_capacity(ns_names.len());
    for ns_name in ns_names {
        let mut addresses = Vec::new();
        for rtype in [RecordType::A, RecordType::AAAA] {
            let key = RRsetKey::new(ns_name.clone(), rtype, qclass, 0);
            if let Some(locked) = env.rrsets.lookup(&key, false, now) {
                if arena.charge(1).is_err() {
                    tracing::warn!(key = ?key, "arena exhausted attaching glue, returning delegation as-is");
                    continue;
                }
                let served = ServedRRset {
                    key: locked.key.clone(),
                    records: locked.data().to_served(now),
                    trust: locked.data().trust,
                    security: locked.data().security,
                };
                env.rrsets.unlock_refs(vec![locked]);
                if let Some(msg) = referral.as_mut() {
                    msg.additional.push(served.clone());
                }
                addresses.push(served);
            }
        }
        nameservers.push(NameserverInfo { name: ns_name, addresses });
    }

    Some((
        DelegationPoint {
            owner,
            nameservers,
            security,
        },
        referral,
    ))
}

fn find_closest_ns(env: &CacheEnv, qname: &DomainName, qclass: ClassType, now: u64) -> Option<(DomainName, ServedRRset)> {
    for (ancestor, _) in qname.ancestors() {
        let key = RRsetKey::new(ancestor.clone(), RecordType::NS, qclass, 0);
        if let Some(locked) = env.rrsets.lookup(&key, false, now) {
            let served = ServedRRset {
                key: locked.key.clone(),
                records: locked.data().to_served(now),
                trust: locked.data().trust,
                security: locked.data().security,
            };
            env.rrsets.unlock_refs(vec![locked]);
            return Some((ancestor, served));
        }
    }
    None
}

/// DS first, falling back to NSEC at the delegation owner (parent side).
/// NSEC3 opt-in is not handled, matching the limitation already present
/// upstream of this cache.
fn lookup_security(env: &CacheEnv, owner: &DomainName, qclass: ClassType, now: u64, arena: &mut Arena) -> Option<ServedRRset> {
    for rtype in [RecordType::DS, RecordType::NSEC] {
        let key = RRsetKey::new(owner.clone(), rtype, qclass, 0);
        if let Some(locked) = env.rrsets.lookup(&key, false, now) {
            if arena.charge(1).is_err() {
                tracing::warn!(key = ?key, "arena exhausted attaching security record");
                return None;
            }
            let served = ServedRRset {
                key: locked.key.clone(),
                records: locked.data().to_served(now),
                trust: locked.data().trust,
                security: locked.data().security,
            };
            env.rrsets.unlock_refs(vec![locked]);
            return Some(served);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrset::{RRsetData, RRsetRef};
    use crate::trust::{SecurityStatus, TrustRank};
    use reso_dns::DnsRecord;

    fn insert_ns(env: &CacheEnv, owner: &str, ns_name: &str, now: u64) {
        let mut r = RRsetRef::new(RRsetKey::new(DomainName::from_ascii(owner).unwrap(), RecordType::NS, ClassType::IN, 0));
        let record = DnsRecord {
            name: DomainName::from_ascii(owner).unwrap(),
            record_type: RecordType::NS,
            class: ClassType::IN,
            ttl: 3600,
            data: DnsRecordData::DomainName(DomainName::from_ascii(ns_name).unwrap()),
        };
        env.rrsets
            .insert(&mut r, RRsetData::new(vec![record], 0, now, TrustRank::AuthorityWithAa, SecurityStatus::Unchecked), now)
            .unwrap();
    }

    fn insert_a(env: &CacheEnv, owner: &str, ip: [u8; 4], now: u64) {
        let mut r = RRsetRef::new(RRsetKey::new(DomainName::from_ascii(owner).unwrap(), RecordType::A, ClassType::IN, 0));
        let record = DnsRecord {
            name: DomainName::from_ascii(owner).unwrap(),
            record_type: RecordType::A,
            class: ClassType::IN,
            ttl: 3600,
            data: DnsRecordData::Ipv4(std::net::Ipv4Addr::from(ip)),
        };
        env.rrsets
            .insert(&mut r, RRsetData::new(vec![record], 0, now, TrustRank::Glue, SecurityStatus::Unchecked), now)
            .unwrap();
    }

    #[test]
    fn test_delegation_walk_finds_closest_ancestor_ns() {
        let env = CacheEnv::new(1000, 1000, 3600);
        let now = 1000;
        insert_ns(&env, "example.com", "ns1.example.com", now);
        insert_a(&env, "ns1.example.com", [192, 0, 2, 53], now);

        let mut arena = Arena::unbounded();
        let (delegation, referral) = find_delegation(&env, &DomainName::from_ascii("www.example.com").unwrap(), ClassType::IN, now, &mut arena, true).unwrap();

        assert_eq!(delegation.owner.as_str(), "example.com");
        assert_eq!(delegation.nameservers.len(), 1);
        assert_eq!(delegation.nameservers[0].name.as_str(), "ns1.example.com");
        assert_eq!(delegation.nameservers[0].addresses.len(), 1);

        let referral = referral.unwrap();
        assert_eq!(referral.authority.len(), 1);
        assert_eq!(referral.additional.len(), 1);
    }

    #[test]
    fn test_no_ns_anywhere_is_a_miss() {
        let env = CacheEnv::new(1000, 1000, 3600);
        let result = find_delegation(&env, &DomainName::from_ascii("www.example.com").unwrap(), ClassType::IN, 1000, &mut Arena::unbounded(), false);
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_glue_does_not_fail_the_delegation() {
        let env = CacheEnv::new(1000, 1000, 3600);
        let now = 1000;
        insert_ns(&env, "example.com", "ns1.example.com", now);

        let (delegation, _) = find_delegation(&env, &DomainName::from_ascii("www.example.com").unwrap(), ClassType::IN, now, &mut Arena::unbounded(), false).unwrap();
        assert_eq!(delegation.nameservers[0].addresses.len(), 0);
    }
}
