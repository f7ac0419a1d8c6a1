use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use idna::AsciiDenyList;

/// A wrapper type for domain names.
/// The input is stored as lowercase to allow case-insensitive comparisons.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct DomainName(Arc<str>);

impl DomainName {
    /// Create a new Qname from an ASCII string.
    /// The domain name is validated according to RFC 1035.
    ///
    /// NOTE: This function does not support Unicode domain names and should only be called with ASCII input.
    pub fn from_ascii(s: impl AsRef<str>) -> anyhow::Result<Self> {
        let mut str: String = s.as_ref().into();

        // Handle root
        if &str == "." || str.is_empty() {
            return Ok(Self(Arc::from(".")));
        }

        // Remove trailing dot if present.
        if str.ends_with('.') {
            str.pop();
        }

        let bytes = str.as_bytes();

        // Validate the domain name according to RFC 1035.
        if bytes.len() > 255 {
            anyhow::bail!("domain name too long (bytes): {}", str);
        }

        for label in str.split('.') {
            // No empty labels allowed (except for root, which is handled above).
            if label.is_empty() {
                anyhow::bail!("empty domain label in: {}", str);
            }

            // Every label must be between 1 and 63 characters long (RFC 1035).
            if label.len() > 63 {
                anyhow::bail!("domain label too long: {}", label);
            }
        }

        str.make_ascii_lowercase();

        Ok(Self(Arc::from(str.trim())))
    }

    /// Create a new Qname from a user input string.
    /// This function supports Unicode domain names and performs IDNA conversion.
    pub fn from_user(s: impl AsRef<str>) -> anyhow::Result<Self> {
        let input = s.as_ref().trim();

        if input == "." {
            return Ok(Self(Arc::from(".")));
        }

        let name = if input.ends_with('.') {
            input.strip_suffix('.').unwrap()
        } else {
            input
        };

        // IDNA to ASCII
        let ascii = idna::domain_to_ascii_cow(name.as_bytes(), AsciiDenyList::URL)
            .map_err(|_| anyhow::anyhow!("invalid IDNA domain: {}", input))?;

        Self::from_ascii(&ascii)
    }

    /// Get the string representation of the DomainName.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DNS root, the zero-label name ".".
    pub fn root() -> Self {
        Self(Arc::from("."))
    }

    /// Whether this is the root name.
    pub fn is_root(&self) -> bool {
        &*self.0 == "."
    }

    /// The labels of this name, left to right, closest-to-root last.
    /// The root name has zero labels.
    pub fn labels(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            self.0.split('.').collect()
        }
    }

    /// Number of labels (0 for the root).
    pub fn label_count(&self) -> usize {
        if self.is_root() { 0 } else { self.0.split('.').count() }
    }

    /// Length of this name in its wire (length-prefixed) encoding: one
    /// length byte per label plus its bytes, plus the one-byte root
    /// terminator. This is the quantity RFC 1035 caps at 255.
    pub fn wire_len(&self) -> usize {
        self.labels().iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Iterate over this name and its ancestors, root last, pairing each
    /// with the number of labels stripped off `self` to reach it (0 for
    /// `self` itself).
    pub fn ancestors(&self) -> impl Iterator<Item = (DomainName, usize)> + '_ {
        let labels = self.labels();
        let total = labels.len();
        (0..=total).map(move |stripped| {
            let kept = &labels[stripped..];
            let name = if kept.is_empty() {
                DomainName::root()
            } else {
                DomainName(Arc::from(kept.join(".")))
            };
            (name, stripped)
        })
    }

    /// Build the name formed by keeping this name's leftmost `stripped`
    /// labels (the part of the name below the ancestor `stripped` was
    /// paired with by [`Self::ancestors`]) and appending `suffix` in
    /// place of the rest. Used to rewrite a qname under a DNAME's target
    /// subtree. Fails (mapped by callers to `YXDOMAIN`) if the result
    /// would exceed the 255-byte wire length limit.
    pub fn rebase(&self, stripped: usize, suffix: &DomainName) -> anyhow::Result<DomainName> {
        let labels = self.labels();
        anyhow::ensure!(
            stripped <= labels.len(),
            "cannot strip {} labels from a {}-label name",
            stripped,
            labels.len()
        );
        let prefix = &labels[..stripped];

        let combined = if prefix.is_empty() {
            suffix.clone()
        } else if suffix.is_root() {
            DomainName(Arc::from(prefix.join(".")))
        } else {
            DomainName(Arc::from(format!("{}.{}", prefix.join("."), suffix.as_str())))
        };

        anyhow::ensure!(
            combined.wire_len() <= 255,
            "rebased name exceeds 255 bytes: {}",
            combined
        );
        Ok(combined)
    }
}

impl PartialOrd for DomainName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DomainName {
    /// Canonical DNS name ordering (RFC 4034 §6.1): compare labels
    /// right-to-left (TLD first), shorter name sorts first on a shared
    /// prefix.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let a = self.labels();
        let b = other.labels();
        a.iter().rev().cmp(b.iter().rev())
    }
}

impl Deref for DomainName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_name_creation() {
        let dn = DomainName::from_ascii("Example.com.").unwrap();
        assert_eq!(dn.as_str(), "example.com");

        let dn2 = DomainName::from_ascii("sub.domain.example.com").unwrap();
        assert_eq!(dn2.as_str(), "sub.domain.example.com");

        assert!(DomainName::from_ascii("a".repeat(256)).is_err());
        assert!(DomainName::from_ascii("label..example.com").is_err());
        assert!(DomainName::from_ascii("a".repeat(64) + ".com").is_err());
    }

    #[test]
    fn test_ancestors_walk_includes_self_and_root() {
        let name = DomainName::from_ascii("www.example.com").unwrap();
        let walk: Vec<_> = name.ancestors().map(|(n, s)| (n.to_string(), s)).collect();
        assert_eq!(
            walk,
            vec![
                ("www.example.com".to_string(), 0),
                ("example.com".to_string(), 1),
                ("com".to_string(), 2),
                (".".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_rebase_concatenates_prefix_and_target() {
        let qname = DomainName::from_ascii("www.example.com").unwrap();
        let target = DomainName::from_ascii("example.net").unwrap();
        // example.com matched at stripped=1, leaving prefix "www".
        let rebased = qname.rebase(1, &target).unwrap();
        assert_eq!(rebased.as_str(), "www.example.net");
    }

    #[test]
    fn test_rebase_overflow_is_rejected() {
        let qname = DomainName::from_ascii("a").unwrap();
        let long_label = "b".repeat(63);
        let target_str = format!(
            "{}.{}.{}.{}",
            long_label, long_label, long_label, long_label
        );
        let target = DomainName::from_ascii(target_str).unwrap();
        assert!(qname.rebase(1, &target).is_err());
    }

    #[test]
    fn test_canonical_ordering_is_rightmost_label_first() {
        let a = DomainName::from_ascii("z.example.com").unwrap();
        let b = DomainName::from_ascii("a.example.net").unwrap();
        // "com" < "net", so a (under .com) sorts before b (under .net)
        // regardless of the leftmost label.
        assert!(a < b);
    }

    #[test]
    fn test_wire_len() {
        assert_eq!(DomainName::root().wire_len(), 1);
        assert_eq!(DomainName::from_ascii("com").unwrap().wire_len(), 5);
        assert_eq!(
            DomainName::from_ascii("example.com").unwrap().wire_len(),
            13
        );
    }
}
