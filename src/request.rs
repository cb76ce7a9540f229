use std::net::IpAddr;

/// Normalized inbound request descriptor, as delivered by whatever
/// front-end adapter speaks the external authorization protocol.
///
/// `remote_address` is kept as the raw string the adapter received: most
/// requests carry a parseable IP, but a malformed one must not abort the
/// pipeline (spec: MalformedRequest -> treat as non-matching for CIDR
/// predicates, rate limiting still runs keyed on the raw string).
#[derive(Debug, Clone)]
pub struct Request {
    pub remote_address: String,
    pub authority: String,
    pub path: String,
    pub method: String,
}

impl Request {
    pub fn new(
        remote_address: impl Into<String>,
        authority: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            remote_address: remote_address.into(),
            authority: authority.into(),
            path: path.into(),
            method: method.into(),
        }
    }

    /// Parse `remote_address` as an IP, if it is one. CIDR predicates use
    /// this; a parse failure just means "no CIDR set will match", it is
    /// not an error for the overall decision.
    pub fn parsed_ip(&self) -> Option<IpAddr> {
        self.remote_address.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ipv4() {
        let req = Request::new("192.168.1.2", "example.com", "/", "GET");
        assert_eq!(req.parsed_ip(), Some("192.168.1.2".parse().unwrap()));
    }

    #[test]
    fn unparseable_address_yields_none() {
        let req = Request::new("not-an-ip", "example.com", "/", "GET");
        assert_eq!(req.parsed_ip(), None);
    }

    #[test]
    fn parses_valid_ipv6() {
        let req = Request::new("::1", "example.com", "/", "GET");
        assert_eq!(req.parsed_ip(), Some("::1".parse().unwrap()));
    }
}
