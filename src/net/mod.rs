//! URL plumbing shared by the fetcher, the gates and the link discovery.

pub mod challenge;
pub mod client;
pub mod robots;

use url::Url;

/// Lowercase a host and strip any `:port` suffix.
pub fn normalize_host(host: &str) -> String {
    host.split(':').next().unwrap_or("").to_ascii_lowercase()
}

/// Host of an absolute URL, lowercased and port-stripped. Empty when the
/// URL does not parse or carries no host.
pub fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Whether a link belongs to the target domain. An empty host counts as a
/// match (relative artifacts); otherwise the link host must end with the
/// port-stripped target.
pub fn same_domain(link: &str, domain: &str) -> bool {
    match Url::parse(link) {
        Ok(u) => {
            let host = u.host_str().unwrap_or("").to_ascii_lowercase();
            host.is_empty() || host.ends_with(&normalize_host(domain))
        }
        Err(_) => false,
    }
}

/// Resolve `href` against `base` and strip the fragment. Non-http(s)
/// results (`mailto:`, `tel:`, `javascript:`) are rejected so the empty
/// host rule in [`same_domain`] cannot smuggle them into the frontier.
pub fn defrag_and_norm(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM:8080"), "example.com");
        assert_eq!(normalize_host("example.com"), "example.com");
        assert_eq!(normalize_host(""), "");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://Sub.Example.com:8443/x?y=1"), "sub.example.com");
        assert_eq!(host_of("not a url"), "");
        assert_eq!(host_of("mailto:a@b.pl"), "");
    }

    #[test]
    fn test_same_domain_suffix_match() {
        assert!(same_domain("https://example.com/a", "example.com"));
        assert!(same_domain("https://shop.example.com/a", "example.com"));
        assert!(same_domain("http://EXAMPLE.com:8080/", "example.com"));
        assert!(!same_domain("https://other.org/", "example.com"));
    }

    #[test]
    fn test_same_domain_ignores_port_in_target() {
        assert!(same_domain("http://127.0.0.1:3999/page", "127.0.0.1:3999"));
    }

    #[test]
    fn test_same_domain_empty_host() {
        // Preserved rule: schemes without a host pass the domain test.
        assert!(same_domain("mailto:a@b.pl", "example.com"));
    }

    #[test]
    fn test_defrag_and_norm_joins_and_strips() {
        assert_eq!(
            defrag_and_norm("https://example.com/a/b", "../c#frag"),
            Some("https://example.com/c".to_string())
        );
        assert_eq!(
            defrag_and_norm("https://example.com/", "/oferta/1"),
            Some("https://example.com/oferta/1".to_string())
        );
        assert_eq!(
            defrag_and_norm("https://example.com/x", "https://example.com/y#top"),
            Some("https://example.com/y".to_string())
        );
    }

    #[test]
    fn test_defrag_and_norm_rejects_non_web_schemes() {
        assert_eq!(defrag_and_norm("https://example.com/", "mailto:a@b.pl"), None);
        assert_eq!(defrag_and_norm("https://example.com/", "tel:+48123456789"), None);
        assert_eq!(defrag_and_norm("https://example.com/", "javascript:void(0)"), None);
    }
}
