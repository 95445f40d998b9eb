//! Optional robots.txt gate.

use std::time::Duration;

use tracing::debug;
use url::Url;

use super::client::HttpFetcher;

/// Agents whose `Disallow` blocks apply to this crawler.
const AGENTS: [&str; 3] = ["*", "phorn", "phorn-bot"];

/// Disallow rules parsed from the target's robots.txt. Empty when robots
/// are not obeyed or the fetch failed, which never blocks the crawl.
#[derive(Debug, Default, Clone)]
pub struct RobotsRules {
    rules: Vec<String>,
}

impl RobotsRules {
    /// Fetch `robots.txt` for the target, HTTPS first with an HTTP
    /// fallback. Any failure yields no rules.
    pub async fn fetch(fetcher: &HttpFetcher, domain: &str) -> Self {
        let timeout = Duration::from_secs(8);
        let text = match fetcher
            .fetch_text(&format!("https://{domain}/robots.txt"), timeout)
            .await
        {
            Some(text) => text,
            None => match fetcher
                .fetch_text(&format!("http://{domain}/robots.txt"), timeout)
                .await
            {
                Some(text) => text,
                None => {
                    debug!(domain, "robots.txt not fetched, crawling without rules");
                    return Self::default();
                }
            },
        };
        Self::parse(&text)
    }

    /// Parse `User-agent:` / `Disallow:` lines. Comments and blanks are
    /// skipped, rules outside our agent blocks are ignored, and an empty
    /// `Disallow` value blocks the whole site.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        let mut current_agent: Option<String> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if key == "user-agent" {
                current_agent = Some(value.to_ascii_lowercase());
            } else if key == "disallow"
                && current_agent
                    .as_deref()
                    .is_some_and(|agent| AGENTS.contains(&agent))
            {
                rules.push(if value.is_empty() { "/".to_string() } else { value.to_string() });
            }
        }
        Self { rules }
    }

    /// Whether the URL's path escapes every rule. A `/` rule blocks the
    /// whole site; otherwise a rule blocks paths it prefixes.
    pub fn allowed(&self, url: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(u) => {
                let path = u.path().to_string();
                if path.is_empty() {
                    "/".to_string()
                } else {
                    path
                }
            }
            Err(_) => return true,
        };
        for rule in &self.rules {
            if rule == "/" || path.starts_with(rule.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
# comment line
User-agent: *
Disallow: /private
Disallow: /tmp/

User-agent: googlebot
Disallow: /only-for-google

User-agent: phorn-bot
Disallow: /no-phorn
";

    #[test]
    fn test_parse_collects_matching_agents() {
        let rules = RobotsRules::parse(ROBOTS);
        assert_eq!(rules.len(), 3);
        assert!(!rules.allowed("https://example.com/private/x"));
        assert!(!rules.allowed("https://example.com/tmp/a.html"));
        assert!(!rules.allowed("https://example.com/no-phorn"));
        assert!(rules.allowed("https://example.com/only-for-google"));
        assert!(rules.allowed("https://example.com/public"));
    }

    #[test]
    fn test_parse_ignores_rules_before_any_agent() {
        let rules = RobotsRules::parse("Disallow: /early\nUser-agent: *\nDisallow: /late\n");
        assert!(rules.allowed("https://example.com/early"));
        assert!(!rules.allowed("https://example.com/late"));
    }

    #[test]
    fn test_empty_disallow_blocks_whole_site() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n");
        assert!(!rules.allowed("https://example.com/anything"));
        assert!(!rules.allowed("https://example.com/"));
    }

    #[test]
    fn test_no_rules_allows_everything() {
        let rules = RobotsRules::default();
        assert!(rules.is_empty());
        assert!(rules.allowed("https://example.com/private"));
    }
}
