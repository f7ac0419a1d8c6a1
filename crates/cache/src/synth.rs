use reso_dns::{ClassType, DnsFlags, DnsRecord, DnsRecordData, DnsResponseCode, DomainName, RecordType};

use crate::arena::{Arena, ScratchArena, ServedMessage, ServedRRset};
use crate::entry::LockedRRset;
use crate::env::CacheEnv;
use crate::key::{QueryKey, RRsetKey};
use crate::reply::Section;
use crate::trust::{SecurityStatus, TrustRank};

/// Produces served replies from cached state: an exact message hit, a
/// DNAME-synthesized CNAME, a bare CNAME, or a miss — in that order.
/// DNAME is checked before CNAME at every step, per the RFC 6672 rule
/// that a DNAME's synthesis takes precedence.
pub fn lookup(
    env: &CacheEnv,
    qname: &DomainName,
    qtype: RecordType,
    qclass: ClassType,
    now: u64,
    arena: &mut Arena,
    scratch: &mut ScratchArena,
) -> Option<ServedMessage> {
    if let Some(served) = exact_message_hit(env, qname, qtype, qclass, now, arena, scratch) {
        scratch.flush();
        return Some(served);
    }
    if let Some(served) = dname_synthesis(env, qname, qtype, qclass, now, arena) {
        return Some(served);
    }
    if let Some(served) = cname_hit(env, qname, qtype, qclass, now, arena) {
        return Some(served);
    }
    None
}

fn locked_to_served(locked: &LockedRRset, now: u64) -> ServedRRset {
    ServedRRset {
        key: locked.key.clone(),
        records: locked.data().to_served(now),
        trust: locked.data().trust,
        security: locked.data().security,
    }
}

fn exact_message_hit(
    env: &CacheEnv,
    qname: &DomainName,
    qtype: RecordType,
    qclass: ClassType,
    now: u64,
    arena: &mut Arena,
    scratch: &mut ScratchArena,
) -> Option<ServedMessage> {
    let qkey = QueryKey::new(qname.clone(), qtype, qclass);
    let locked_reply = env.messages.lookup(&qkey)?;

    if locked_reply.data().ttl <= now {
        tracing::trace!(qname = %qname, "cached message expired");
        return None;
    }

    let refs = locked_reply.data().refs.clone();
    let sections = locked_reply.data().sections.clone();
    let flags = locked_reply.data().flags;

    let locked_rrsets = env.rrsets.lock_refs(&refs, now)?;

    arena.charge(locked_rrsets.len()).ok()?;

    let mut answer = Vec::new();
    let mut authority = Vec::new();
    let mut additional = Vec::new();
    for (locked, section) in locked_rrsets.iter().zip(sections.iter()) {
        let served = locked_to_served(locked, now);
        match section {
            Section::Answer => answer.push(served),
            Section::Authority => authority.push(served),
            Section::Additional => additional.push(served),
        }
    }

    env.rrsets.unlock_touch(locked_rrsets, scratch, now);
    drop(locked_reply);

    Some(ServedMessage {
        qname: qname.clone(),
        qtype,
        qclass,
        flags,
        answer,
        authority,
        additional,
    })
}

fn dname_synthesis(env: &CacheEnv, qname: &DomainName, qtype: RecordType, qclass: ClassType, now: u64, arena: &mut Arena) -> Option<ServedMessage> {
    for (ancestor, stripped) in qname.ancestors() {
        let key = RRsetKey::new(ancestor, RecordType::DNAME, qclass, 0);
        let Some(locked) = env.rrsets.lookup(&key, false, now) else {
            continue;
        };

        let target = match locked.data().records.first().map(|r| &r.data) {
            Some(DnsRecordData::Dname(target)) => target.clone(),
            _ => {
                tracing::warn!(key = ?key, "dname entry has malformed rdata, treating as a miss");
                return None;
            }
        };

        arena.charge(1).ok()?;
        let dname_served = locked_to_served(&locked, now);
        env.rrsets.unlock_refs(vec![locked]);

        let mut flags = DnsFlags {
            qr: true,
            ..Default::default()
        };
        let mut answer = vec![dname_served];

        match qname.rebase(stripped, &target) {
            Ok(rebased) if qtype != RecordType::DNAME => {
                arena.charge(1).ok()?;
                let cname_key = RRsetKey::new(qname.clone(), RecordType::CNAME, qclass, 0);
                let record = DnsRecord {
                    name: qname.clone(),
                    record_type: RecordType::CNAME,
                    class: qclass,
                    ttl: 0,
                    data: DnsRecordData::DomainName(rebased),
                };
                answer.push(ServedRRset {
                    key: cname_key,
                    records: vec![record],
                    trust: TrustRank::AnswerWithoutAa,
                    security: SecurityStatus::Unchecked,
                });
            }
            Ok(_) => {
                // qtype == DNAME: the DNAME itself already answers the
                // query, no synthesized CNAME needed.
            }
            Err(_) => {
                flags.rcode_low = u8::from(DnsResponseCode::YxDomain);
            }
        }

        return Some(ServedMessage {
            qname: qname.clone(),
            qtype,
            qclass,
            flags,
            answer,
            authority: Vec::new(),
            additional: Vec::new(),
        });
    }
    None
}

fn cname_hit(env: &CacheEnv, qname: &DomainName, qtype: RecordType, qclass: ClassType, now: u64, arena: &mut Arena) -> Option<ServedMessage> {
    let key = RRsetKey::new(qname.clone(), RecordType::CNAME, qclass, 0);
    let locked = env.rrsets.lookup(&key, false, now)?;
    arena.charge(1).ok()?;
    let served = locked_to_served(&locked, now);
    env.rrsets.unlock_refs(vec![locked]);

    Some(ServedMessage {
        qname: qname.clone(),
        qtype,
        qclass,
        flags: DnsFlags {
            qr: true,
            ..Default::default()
        },
        answer: vec![served],
        authority: Vec::new(),
        additional: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::rrset::{RRsetData, RRsetRef};
    use crate::trust::{SecurityStatus, TrustRank};
    use reso_dns::{ClassType, DnsRecord, DomainName};

    fn env() -> CacheEnv {
        CacheEnv::new(1000, 1000, 3600)
    }

    fn insert_a(env: &CacheEnv, owner: &str, ip: [u8; 4], ttl: u32, now: u64) -> RRsetRef {
        let mut r = RRsetRef::new(RRsetKey::new(DomainName::from_ascii(owner).unwrap(), RecordType::A, ClassType::IN, 0));
        let record = DnsRecord {
            name: DomainName::from_ascii(owner).unwrap(),
            record_type: RecordType::A,
            class: ClassType::IN,
            ttl,
            data: DnsRecordData::Ipv4(std::net::Ipv4Addr::from(ip)),
        };
        let data = RRsetData::new(vec![record], 0, now, TrustRank::AnswerWithAa, SecurityStatus::Unchecked);
        env.rrsets.insert(&mut r, data, now).unwrap();
        r
    }

    #[test]
    fn test_store_then_lookup_round_trip() {
        let env = env();
        let now = 1000;
        let r = insert_a(&env, "example.com", [192, 0, 2, 1], 300, now);

        let reply = crate::reply::ReplyInfo::new(DnsFlags { qr: true, ..Default::default() }, 1, vec![r], Vec::new(), Vec::new(), crate::reply::ReplyInfo::UNBOUNDED_TTL);
        env.messages.store(
            QueryKey::new(DomainName::from_ascii("example.com").unwrap(), RecordType::A, ClassType::IN),
            reply,
            &[now + 300],
            now,
            3600,
        );

        let mut arena = Arena::unbounded();
        let mut scratch = ScratchArena::new();
        let served = lookup(
            &env,
            &DomainName::from_ascii("example.com").unwrap(),
            RecordType::A,
            ClassType::IN,
            now + 10,
            &mut arena,
            &mut scratch,
        )
        .unwrap();

        assert_eq!(served.an_numrrsets(), 1);
        assert_eq!(served.answer[0].records[0].ttl, 290);
    }

    #[test]
    fn test_dname_preferred_over_cname() {
        let env = env();
        let now = 1000;

        let mut dname_ref = RRsetRef::new(RRsetKey::new(DomainName::from_ascii("example.com").unwrap(), RecordType::DNAME, ClassType::IN, 0));
        let dname_record = DnsRecord {
            name: DomainName::from_ascii("example.com").unwrap(),
            record_type: RecordType::DNAME,
            class: ClassType::IN,
            ttl: 3600,
            data: DnsRecordData::Dname(DomainName::from_ascii("example.net").unwrap()),
        };
        env.rrsets
            .insert(
                &mut dname_ref,
                RRsetData::new(vec![dname_record], 0, now, TrustRank::AnswerWithAa, SecurityStatus::Unchecked),
                now,
            )
            .unwrap();

        let mut cname_ref = RRsetRef::new(RRsetKey::new(DomainName::from_ascii("www.example.com").unwrap(), RecordType::CNAME, ClassType::IN, 0));
        let cname_record = DnsRecord {
            name: DomainName::from_ascii("www.example.com").unwrap(),
            record_type: RecordType::CNAME,
            class: ClassType::IN,
            ttl: 300,
            data: DnsRecordData::DomainName(DomainName::from_ascii("old.example.com").unwrap()),
        };
        env.rrsets
            .insert(
                &mut cname_ref,
                RRsetData::new(vec![cname_record], 0, now, TrustRank::AnswerWithAa, SecurityStatus::Unchecked),
                now,
            )
            .unwrap();

        let mut arena = Arena::unbounded();
        let served = dname_synthesis(
            &env,
            &DomainName::from_ascii("www.example.com").unwrap(),
            RecordType::A,
            ClassType::IN,
            now,
            &mut arena,
        )
        .unwrap();

        assert_eq!(served.answer.len(), 2);
        assert_eq!(served.answer[0].key.record_type, RecordType::DNAME);
        assert_eq!(served.answer[1].key.record_type, RecordType::CNAME);
        assert_eq!(served.answer[1].records[0].ttl, 0);
        match &served.answer[1].records[0].data {
            DnsRecordData::DomainName(target) => assert_eq!(target.as_str(), "www.example.net"),
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[test]
    fn test_dname_target_overflow_yields_yxdomain() {
        let env = env();
        let now = 1000;

        let long_label = "b".repeat(63);
        let target_str = format!("{}.{}.{}.{}", long_label, long_label, long_label, long_label);

        let mut dname_ref = RRsetRef::new(RRsetKey::new(DomainName::from_ascii("a").unwrap(), RecordType::DNAME, ClassType::IN, 0));
        let dname_record = DnsRecord {
            name: DomainName::from_ascii("a").unwrap(),
            record_type: RecordType::DNAME,
            class: ClassType::IN,
            ttl: 3600,
            data: DnsRecordData::Dname(DomainName::from_ascii(&target_str).unwrap()),
        };
        env.rrsets
            .insert(
                &mut dname_ref,
                RRsetData::new(vec![dname_record], 0, now, TrustRank::AnswerWithAa, SecurityStatus::Unchecked),
                now,
            )
            .unwrap();

        let mut arena = Arena::unbounded();
        let served = dname_synthesis(&env, &DomainName::from_ascii("www.a").unwrap(), RecordType::A, ClassType::IN, now, &mut arena).unwrap();

        assert_eq!(served.answer.len(), 1);
        assert_eq!(served.flags.rcode_low, u8::from(DnsResponseCode::YxDomain));
    }

    #[test]
    fn test_stale_reference_self_invalidates_message() {
        let env = env();
        let now = 1000;
        let r = insert_a(&env, "example.com", [192, 0, 2, 1], 300, now);

        let reply = crate::reply::ReplyInfo::new(DnsFlags { qr: true, ..Default::default() }, 1, vec![r], Vec::new(), Vec::new(), crate::reply::ReplyInfo::UNBOUNDED_TTL);
        env.messages.store(
            QueryKey::new(DomainName::from_ascii("example.com").unwrap(), RecordType::A, ClassType::IN),
            reply,
            &[now + 300],
            now,
            3600,
        );

        // Directly replace the rrset with different data, bumping its id.
        insert_a(&env, "example.com", [192, 0, 2, 2], 300, now);

        let mut arena = Arena::unbounded();
        let mut scratch = ScratchArena::new();
        let served = lookup(
            &env,
            &DomainName::from_ascii("example.com").unwrap(),
            RecordType::A,
            ClassType::IN,
            now,
            &mut arena,
            &mut scratch,
        );
        assert!(served.is_none());
    }
}
