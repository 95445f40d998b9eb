//! Anti-bot challenge classification.
//!
//! Two predicates drive the tiered fetch escalation: a response-level check
//! for Cloudflare fronting and an HTML-level check that tells rendered
//! content apart from an interstitial.

use reqwest::header::{HeaderMap, SERVER};
use reqwest::StatusCode;

/// Body phrases that identify a Cloudflare interstitial.
pub const CF_BODY_SIGNS: [&str; 5] = [
    "attention required! | cloudflare",
    "checking your browser before accessing",
    "just a moment...",
    "cf-chl-bypass",
    "cf-browser-verification",
];

/// Whether a response smells like Cloudflare fronting: a `cloudflare`
/// server header, a `cf-ray` id, a challenge-prone status code, or a
/// signature phrase in the body.
pub fn looks_like_cloudflare(status: StatusCode, headers: &HeaderMap, body: Option<&str>) -> bool {
    if let Some(server) = headers.get(SERVER).and_then(|v| v.to_str().ok()) {
        if server.to_ascii_lowercase().starts_with("cloudflare") {
            return true;
        }
    }
    if headers.contains_key("cf-ray") {
        return true;
    }
    if matches!(status.as_u16(), 403 | 409 | 429 | 503) {
        return true;
    }
    if let Some(body) = body {
        let low = body.to_ascii_lowercase();
        if CF_BODY_SIGNS.iter().any(|sign| low.contains(sign)) {
            return true;
        }
    }
    false
}

/// Classify fetched HTML as a challenge rather than content.
///
/// Nil and empty bodies count as challenges, as do signature phrases,
/// script-heavy pages with almost no links, and `<noscript>` fallbacks.
pub fn looks_like_challenge(html: Option<&str>) -> bool {
    let html = match html {
        Some(html) if !html.is_empty() => html,
        _ => return true,
    };
    let low = html.to_ascii_lowercase();
    if CF_BODY_SIGNS.iter().any(|sign| low.contains(sign)) {
        return true;
    }
    if low.matches("<a ").count() < 3 && low.matches("<script").count() >= 3 {
        return true;
    }
    low.contains("<noscript")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_cloudflare_server_header() {
        let h = headers(&[("server", "cloudflare")]);
        assert!(looks_like_cloudflare(StatusCode::OK, &h, Some("<html>fine</html>")));
    }

    #[test]
    fn test_cloudflare_cf_ray() {
        let h = headers(&[("cf-ray", "8a1b2c3d4e5f-WAW")]);
        assert!(looks_like_cloudflare(StatusCode::OK, &h, None));
    }

    #[test]
    fn test_cloudflare_status_codes() {
        let h = HeaderMap::new();
        for code in [403u16, 409, 429, 503] {
            assert!(looks_like_cloudflare(StatusCode::from_u16(code).unwrap(), &h, None));
        }
        assert!(!looks_like_cloudflare(StatusCode::NOT_FOUND, &h, None));
    }

    #[test]
    fn test_cloudflare_body_signature() {
        let h = HeaderMap::new();
        assert!(looks_like_cloudflare(StatusCode::OK, &h, Some("<title>Just a moment...</title>")));
        assert!(!looks_like_cloudflare(StatusCode::OK, &h, Some("<html>hello</html>")));
    }

    #[test]
    fn test_challenge_nil_and_empty() {
        assert!(looks_like_challenge(None));
        assert!(looks_like_challenge(Some("")));
    }

    #[test]
    fn test_challenge_signature_phrase() {
        assert!(looks_like_challenge(Some("<html>Checking your browser before accessing</html>")));
    }

    #[test]
    fn test_challenge_script_heavy_link_poor() {
        let html = "<html><script>a</script><script>b</script><script>c</script></html>";
        assert!(looks_like_challenge(Some(html)));
        // Enough links makes the same script count acceptable.
        let html = format!("<html><a href=x>1</a><a href=y>2</a><a href=z>3</a>{html}</html>");
        assert!(!looks_like_challenge(Some(&html)));
    }

    #[test]
    fn test_challenge_noscript() {
        assert!(looks_like_challenge(Some("<html><noscript>enable js</noscript></html>")));
    }

    #[test]
    fn test_challenge_plain_content() {
        assert!(!looks_like_challenge(Some("<html><body><h1>Oferta</h1>tel: 600 700 800</body></html>")));
    }
}
