use std::fmt;

/// Errors that escape the cache core as an `Err`.
///
/// Every other failure mode the cache core can hit internally (a stale
/// reference, an expired entry, malformed cached data, an invariant
/// violation) is recovered locally and surfaces only as a miss (`None`).
/// `OutOfMemory` is the sole exception: an allocation failure in the
/// caller's arena or in the store itself propagates outward rather than
/// silently degrading, so the caller can apply backpressure.
#[derive(Debug)]
pub enum CacheError {
    OutOfMemory,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("cache allocation failed"),
        }
    }
}

impl std::error::Error for CacheError {}
