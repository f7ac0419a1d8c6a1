/// Ordinal trust rank of a cached rrset, lowest to highest. On merge
/// (`RRsetStore::insert`), an incoming rrset with strictly lower trust than
/// what's already cached is discarded in favor of the existing data, and
/// the stored trust for a key never decreases.
///
/// Declared in ascending order so `#[derive(Ord)]` gives the intended
/// ranking directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrustRank {
    None,
    AdditionalWithoutAa,
    AuthorityWithoutAa,
    AdditionalWithAa,
    NonauthAnswerWithAa,
    AnswerWithoutAa,
    Glue,
    AuthorityWithAa,
    AnswerWithAa,
    SecondaryNoglue,
    PrimaryNoglue,
    Validated,
    Ultimate,
}

/// DNSSEC validation status carried alongside a cached rrset. The cache
/// core never computes this — it is assigned by the validator and merely
/// stored and propagated on merge and on serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityStatus {
    #[default]
    Unchecked,
    Bogus,
    Indeterminate,
    Insecure,
    Secure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_rank_ordering() {
        assert!(TrustRank::None < TrustRank::Glue);
        assert!(TrustRank::Glue < TrustRank::AnswerWithAa);
        assert!(TrustRank::AnswerWithAa < TrustRank::Validated);
        assert!(TrustRank::Validated < TrustRank::Ultimate);
    }
}
