pub mod arena;
pub mod delegation;
pub mod entry;
pub mod env;
pub mod error;
pub mod key;
pub mod message_store;
pub mod reply;
pub mod rrset;
pub mod rrset_store;
pub mod synth;
pub mod trust;

pub use arena::{Arena, ScratchArena, ServedMessage, ServedRRset};
pub use delegation::{DelegationPoint, NameserverInfo};
pub use entry::LockedRRset;
pub use env::{CacheEnv, dns_cache_find_delegation, dns_cache_lookup, dns_cache_store_msg};
pub use error::CacheError;
pub use key::{QueryKey, RRsetKey};
pub use message_store::MessageStore;
pub use reply::{ReplyInfo, Section};
pub use rrset::{RRsetData, RRsetRef, extend_ttls, rrsetdata_equal};
pub use rrset_store::RRsetStore;
pub use trust::{SecurityStatus, TrustRank};
