//! Target address handling.

use url::{Host, Url};

/// Schemes a target may already carry before a default is prefixed.
const WEB_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Prefixes `https://` to a target that has no web scheme.
///
/// # Examples
///
/// ```
/// use uptimer::utils::normalize_url;
///
/// assert_eq!(normalize_url("example.org"), "https://example.org");
/// assert_eq!(normalize_url("http://example.org"), "http://example.org");
/// ```
#[must_use]
pub fn normalize_url(target: &str) -> String {
    normalize_with(target, &WEB_SCHEMES)
}

fn normalize_with(target: &str, schemes: &[&str]) -> String {
    let target = target.trim();
    if schemes.iter().any(|s| target.starts_with(s)) {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

/// Host and port extracted from a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// The normalized URL.
    pub url: String,
    /// Scheme without `://`.
    pub scheme: String,
    /// Hostname or IP literal, without IPv6 brackets.
    pub host: String,
    /// Port written in the target, if any.
    pub port: Option<u16>,
}

impl Endpoint {
    /// Port written in the target, else the scheme default (443 for https,
    /// 80 otherwise).
    #[must_use]
    pub fn port_or_scheme_default(&self) -> u16 {
        self.port
            .unwrap_or(if self.scheme == "https" { 443 } else { 80 })
    }
}

/// Parses `target` into an [`Endpoint`]. Targets without an accepted scheme
/// get `https://`. `extra_schemes` widens the accepted set (e.g. `tcp://`).
///
/// Returns `None` when no hostname can be found.
#[must_use]
pub fn host_and_port(target: &str, extra_schemes: &[&str]) -> Option<Endpoint> {
    let mut schemes: Vec<&str> = WEB_SCHEMES.to_vec();
    schemes.extend_from_slice(extra_schemes);
    let normalized = normalize_with(target, &schemes);

    let parsed = Url::parse(&normalized).ok()?;
    let host = match parsed.host()? {
        Host::Domain(d) if !d.is_empty() => d.to_string(),
        Host::Domain(_) => return None,
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };

    Some(Endpoint {
        scheme: parsed.scheme().to_string(),
        port: parsed.port(),
        url: normalized,
        host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_defaults_to_https() {
        let ep = host_and_port("example.org", &[]).unwrap();
        assert_eq!(ep.url, "https://example.org");
        assert_eq!(ep.scheme, "https");
        assert_eq!(ep.host, "example.org");
        assert_eq!(ep.port, None);
        assert_eq!(ep.port_or_scheme_default(), 443);
    }

    #[test]
    fn test_explicit_port_and_http() {
        let ep = host_and_port("http://example.org:8080/health", &[]).unwrap();
        assert_eq!(ep.port, Some(8080));
        assert_eq!(ep.port_or_scheme_default(), 8080);

        let ep = host_and_port("http://example.org/", &[]).unwrap();
        assert_eq!(ep.port_or_scheme_default(), 80);
    }

    #[test]
    fn test_extra_scheme() {
        let ep = host_and_port("tcp://db.internal:5432", &["tcp://"]).unwrap();
        assert_eq!(ep.scheme, "tcp");
        assert_eq!(ep.host, "db.internal");
        assert_eq!(ep.port, Some(5432));
    }

    #[test]
    fn test_ip_literals() {
        let ep = host_and_port("https://[::1]:8443", &[]).unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, Some(8443));
        let ep = host_and_port("127.0.0.1:9000", &[]).unwrap();
        assert_eq!(ep.host, "127.0.0.1");
    }

    #[test]
    fn test_no_hostname() {
        assert!(host_and_port("https://", &[]).is_none());
        assert!(host_and_port("", &[]).is_none());
    }
}
