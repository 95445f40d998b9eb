//! The two-client HTTP stack behind the tiered fetch strategy.
//!
//! The standard client speaks HTTP/1.1 with browser-like headers; responses
//! that look Cloudflare-fronted are retried once through the aggressive
//! HTTP/2-capable client. Both share the proxy and a pool sized to the
//! worker count.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, COOKIE, PRAGMA,
    USER_AGENT,
};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy, StatusCode};
use tracing::debug;

use super::challenge::looks_like_cloudflare;

/// Desktop Chrome user agent shared by the HTTP clients and the browser.
pub const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(UA));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers
}

/// HTTP side of the fetch ladder: a standard HTTP/1.1 client plus an
/// aggressive HTTP/2 client used on Cloudflare-looking responses or for
/// every request when `aggr_net` is set.
pub struct HttpFetcher {
    standard: Client,
    aggressive: Client,
    aggr_net: bool,
}

impl HttpFetcher {
    /// Build both clients. The pool holds `max(20, 5 * concurrency)` idle
    /// connections per host so the workers never starve it.
    pub fn new(proxy: Option<&str>, concurrency: usize, aggr_net: bool) -> Result<Self> {
        let pool_size = std::cmp::max(20, 5 * concurrency);

        let mut standard = Client::builder()
            .default_headers(browser_headers())
            .timeout(Duration::from_secs(12))
            .connect_timeout(Duration::from_secs(6))
            .read_timeout(Duration::from_secs(8))
            .redirect(Policy::limited(10))
            .pool_max_idle_per_host(pool_size)
            .http1_only();

        let mut aggressive = Client::builder()
            .default_headers(browser_headers())
            .timeout(Duration::from_secs(12))
            .redirect(Policy::limited(10))
            .pool_max_idle_per_host(pool_size);

        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy).with_context(|| format!("invalid proxy url: {proxy}"))?;
            standard = standard.proxy(proxy.clone());
            aggressive = aggressive.proxy(proxy);
        }

        Ok(Self {
            standard: standard.build().context("failed to build standard http client")?,
            aggressive: aggressive.build().context("failed to build aggressive http client")?,
            aggr_net,
        })
    }

    /// Worker entry point: aggressive-only when `aggr_net` is set,
    /// otherwise the standard tier with its internal HTTP/2 retry.
    pub async fn get_html(&self, url: &str, cookie: Option<&str>) -> Option<String> {
        if self.aggr_net {
            self.fetch_html_aggressive(url, cookie).await
        } else {
            self.fetch_html(url, cookie).await
        }
    }

    /// Standard fetch. A 200 with an html-ish payload wins; a response
    /// that looks Cloudflare-fronted is retried once over HTTP/2;
    /// everything else is nil.
    pub async fn fetch_html(&self, url: &str, cookie: Option<&str>) -> Option<String> {
        let mut request = self.standard.get(url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "standard fetch failed");
                return None;
            }
        };
        let status = response.status();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::OK && is_html(&content_type, &body) {
            return Some(body);
        }
        if looks_like_cloudflare(status, &headers, Some(&body)) {
            debug!(url, status = status.as_u16(), "cloudflare response, retrying over http/2");
            return self.fetch_html_aggressive(url, cookie).await;
        }
        None
    }

    /// Aggressive fetch over the HTTP/2-capable client.
    pub async fn fetch_html_aggressive(&self, url: &str, cookie: Option<&str>) -> Option<String> {
        let mut request = self.aggressive.get(url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "aggressive fetch failed");
                return None;
            }
        };
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::OK && is_html(&content_type, &body) {
            Some(body)
        } else {
            None
        }
    }

    /// Plain 200-or-nothing text fetch used for robots.txt and sitemaps.
    pub async fn fetch_text(&self, url: &str, timeout: Duration) -> Option<String> {
        match self.standard.get(url).timeout(timeout).send().await {
            Ok(response) if response.status() == StatusCode::OK => response.text().await.ok(),
            Ok(_) | Err(_) => None,
        }
    }

    /// Probe the seed URL for Cloudflare fronting.
    pub async fn detect_cloudflare(&self, url: &str) -> bool {
        let response = match self
            .standard
            .get(url)
            .timeout(Duration::from_secs(8))
            .send()
            .await
        {
            Ok(response) => response,
            Err(_) => return false,
        };
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        looks_like_cloudflare(status, &headers, Some(&body))
    }
}

fn is_html(content_type: &str, body: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
        || body.to_ascii_lowercase().contains("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html; charset=utf-8", ""));
        assert!(is_html("", "<!doctype html><HTML>"));
        assert!(!is_html("application/xml", "<urlset></urlset>"));
    }

    #[test]
    fn test_builds_without_proxy() {
        assert!(HttpFetcher::new(None, 4, false).is_ok());
    }

    #[test]
    fn test_rejects_bad_proxy() {
        assert!(HttpFetcher::new(Some("::not a proxy::"), 1, false).is_err());
    }
}
