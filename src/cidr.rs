use ipnetwork::IpNetwork;
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::warn;

/// A set of CIDR ranges with set semantics: insertion is idempotent,
/// removal is by exact CIDR string, iteration order is irrelevant.
///
/// Kept as two parallel collections: `raw` preserves the exact strings
/// callers inserted (for removal-by-string and for round-tripping back
/// to the store), `parsed` is what membership tests actually walk.
/// Entries that fail to parse are recorded in `raw` but skipped in
/// `parsed` -- a malformed CIDR from the store degrades that one entry,
/// it does not reject the whole set (spec: ConfigParse errors skip the
/// offending member).
#[derive(Debug, Clone, Default)]
pub struct CidrSet {
    raw: HashSet<String>,
    parsed: Vec<IpNetwork>,
}

impl CidrSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from CIDR strings as read back from the store,
    /// logging and skipping anything unparseable.
    pub fn from_members(members: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::new();
        for member in members {
            set.insert(member);
        }
        set
    }

    pub fn insert(&mut self, cidr: impl Into<String>) {
        let cidr = cidr.into();
        if self.raw.insert(cidr.clone()) {
            match Self::parse(&cidr) {
                Some(network) => self.parsed.push(network),
                None => warn!(cidr = %cidr, "skipping unparseable CIDR"),
            }
        }
    }

    pub fn remove(&mut self, cidr: &str) {
        if self.raw.remove(cidr) {
            if let Some(network) = Self::parse(cidr) {
                self.parsed.retain(|n| *n != network);
            }
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &String> {
        self.raw.iter()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// True iff `ip` lies within any CIDR in the set.
    #[inline]
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.parsed.iter().any(|network| network.contains(ip))
    }

    /// Accept either a bare CIDR ("10.0.0.0/8") or a single address
    /// ("10.0.0.1"), matching the teacher's IP filter parsing.
    fn parse(s: &str) -> Option<IpNetwork> {
        if let Ok(network) = s.parse::<IpNetwork>() {
            return Some(network);
        }

        match s.parse::<IpAddr>().ok()? {
            IpAddr::V4(v4) => Some(IpNetwork::V4(ipnetwork::Ipv4Network::new(v4, 32).ok()?)),
            IpAddr::V6(v6) => Some(IpNetwork::V6(ipnetwork::Ipv6Network::new(v6, 128).ok()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_exact_ip() {
        let set = CidrSet::from_members(["192.168.1.100".to_string()]);
        assert!(set.contains("192.168.1.100".parse().unwrap()));
        assert!(!set.contains("192.168.1.101".parse().unwrap()));
    }

    #[test]
    fn contains_cidr_range() {
        let set = CidrSet::from_members(["10.0.0.0/8".to_string()]);
        assert!(set.contains("10.0.0.1".parse().unwrap()));
        assert!(set.contains("10.255.255.255".parse().unwrap()));
        assert!(!set.contains("11.0.0.1".parse().unwrap()));
    }

    #[test]
    fn insertion_is_idempotent() {
        let mut set = CidrSet::new();
        set.insert("10.0.0.0/8");
        set.insert("10.0.0.0/8");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn removal_by_exact_string() {
        let mut set = CidrSet::new();
        set.insert("10.0.0.0/8");
        set.remove("10.0.0.0/8");
        assert!(set.is_empty());
        assert!(!set.contains("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn unparseable_member_is_skipped_not_fatal() {
        let mut set = CidrSet::new();
        set.insert("not-a-cidr");
        // recorded for round-tripping, but matches nothing
        assert_eq!(set.len(), 1);
        assert!(!set.contains("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn ipv6_ranges() {
        let set = CidrSet::from_members(["2001:db8::/32".to_string()]);
        assert!(set.contains("2001:db8::1".parse().unwrap()));
        assert!(!set.contains("2001:db9::1".parse().unwrap()));
    }
}
