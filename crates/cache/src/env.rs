use reso_dns::{ClassType, DomainName, RecordType};

use crate::arena::{Arena, ScratchArena, ServedMessage};
use crate::delegation::{self, DelegationPoint};
use crate::key::QueryKey;
use crate::message_store::MessageStore;
use crate::reply::ReplyInfo;
use crate::rrset_store::RRsetStore;
use crate::synth;

/// Bundles both caches and the one tunable the original left as an
/// explicit config decision (`max_ttl`). Carries no clock of its own —
/// every operation takes `now` explicitly, so test code can drive time
/// deterministically instead of the core reading the wall clock.
pub struct CacheEnv {
    pub rrsets: RRsetStore,
    pub messages: MessageStore,
    pub max_ttl: u64,
}

impl CacheEnv {
    pub fn new(rrset_capacity: usize, message_capacity: usize, max_ttl: u64) -> Self {
        Self {
            rrsets: RRsetStore::new(rrset_capacity),
            messages: MessageStore::new(message_capacity),
            max_ttl,
        }
    }

    /// Inserts every constituent rrset of `reply` (merging per the
    /// store's policy and rewriting each ref to the store-canonical
    /// key/id), then installs the message itself, unless its capped
    /// `ttl` comes out non-positive.
    pub fn store_msg(&self, qkey: QueryKey, mut reply: ReplyInfo, rrset_data: Vec<crate::rrset::RRsetData>, now: u64) -> bool {
        if reply.refs.len() != rrset_data.len() {
            tracing::warn!("store_msg called with mismatched refs/data lengths, refusing to store");
            return false;
        }

        let mut rrset_ttls = Vec::with_capacity(reply.refs.len());
        for (r, data) in reply.refs.iter_mut().zip(rrset_data.into_iter()) {
            if let Err(err) = self.rrsets.insert(r, data, now) {
                tracing::warn!(error = %err, "rrset insert failed during store_msg");
                return false;
            }
        }
        for r in &reply.refs {
            if let Some(locked) = self.rrsets.lookup(&r.key, false, now) {
                rrset_ttls.push(locked.data().ttl);
            }
        }

        reply.sort_refs();
        self.messages.store(qkey, reply, &rrset_ttls, now, self.max_ttl)
    }

    pub fn lookup(&self, qname: &DomainName, qtype: RecordType, qclass: ClassType, now: u64, arena: &mut Arena, scratch: &mut ScratchArena) -> Option<ServedMessage> {
        synth::lookup(self, qname, qtype, qclass, now, arena, scratch)
    }

    pub fn find_delegation(&self, qname: &DomainName, qclass: ClassType, now: u64, arena: &mut Arena, want_referral: bool) -> Option<(DelegationPoint, Option<ServedMessage>)> {
        delegation::find_delegation(self, qname, qclass, now, arena, want_referral)
    }
}

/// `dns_cache_store_msg` — install a fully resolved reply (and its
/// constituent rrsets) into `env`.
pub fn dns_cache_store_msg(env: &CacheEnv, qkey: QueryKey, reply: ReplyInfo, rrset_data: Vec<crate::rrset::RRsetData>, now: u64) -> bool {
    env.store_msg(qkey, reply, rrset_data, now)
}

/// `dns_cache_lookup` — synthesize a served reply from cached state, or
/// `None` on a total miss.
pub fn dns_cache_lookup(env: &CacheEnv, qname: &DomainName, qtype: RecordType, qclass: ClassType, now: u64, arena: &mut Arena, scratch: &mut ScratchArena) -> Option<ServedMessage> {
    env.lookup(qname, qtype, qclass, now, arena, scratch)
}

/// `dns_cache_find_delegation` — find the closest enclosing zone cut for
/// `qname`, optionally building a referral `ServedMessage` alongside it.
pub fn dns_cache_find_delegation(env: &CacheEnv, qname: &DomainName, qclass: ClassType, now: u64, arena: &mut Arena, want_referral: bool) -> Option<(DelegationPoint, Option<ServedMessage>)> {
    env.find_delegation(qname, qclass, now, arena, want_referral)
}
