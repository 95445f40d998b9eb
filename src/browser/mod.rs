//! Headless render tier and the human-assisted unlock tier.
//!
//! A single Chromium instance with a persistent per-domain profile is
//! launched lazily on the first render and reused for the rest of the run.
//! Launch failures are reported through `on_detail` and downgrade the crawl
//! to HTTP-only; they never abort it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::Cookie;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::crawler::cookies::CookieJar;
use crate::net::client::UA;
use crate::net::host_of;
use crate::observer::CrawlObserver;

/// Launch flags that hide the automation fingerprints Chromium ships with.
const LAUNCH_ARGS: [&str; 3] = [
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
];

/// Consent-button labels clicked during interactive unlock.
const CONSENT_LABELS: [&str; 6] = ["Akceptuj", "Zgadzam", "Accept", "I agree", "OK", "Got it"];

/// Best-effort automation patch injected into every new document.
const STEALTH_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

/// Lazy singleton around a headless Chromium. Renders are serialized by a
/// one-permit semaphore, as are interactive unlocks; captured cookies flow
/// straight into the shared jar.
pub struct BrowserController {
    domain: String,
    proxy: Option<String>,
    jar: CookieJar,
    observer: Arc<dyn CrawlObserver>,
    session: Mutex<Option<BrowserSession>>,
    render_sem: Semaphore,
    interact_sem: Semaphore,
}

impl BrowserController {
    pub fn new(
        domain: &str,
        proxy: Option<String>,
        jar: CookieJar,
        observer: Arc<dyn CrawlObserver>,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            proxy,
            jar,
            observer,
            session: Mutex::new(None),
            render_sem: Semaphore::new(1),
            interact_sem: Semaphore::new(1),
        }
    }

    /// Render a URL in the shared headless session and return the DOM
    /// serialization. A successful render refreshes the cookie jar for the
    /// page's host; any launch or navigation failure yields nil.
    pub async fn render(&self, url: &str, timeout: Duration) -> Option<String> {
        let _permit = self.render_sem.acquire().await.ok()?;
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            *slot = self.launch(true, &profile_dir_for(&self.domain)).await;
        }
        let session = slot.as_ref()?;
        let html = render_on(&session.page, url, timeout).await?;
        if let Ok(cookies) = session.page.get_cookies().await {
            let header = cookie_header_from(name_value_pairs(&cookies));
            if !header.is_empty() {
                self.jar.put(&host_of(url), &header);
                self.observer.on_detail("cookies: captured (render)");
            }
        }
        Some(html)
    }

    /// Open a visible browser with its own profile and wait for a human to
    /// clear the challenge; success is the appearance of a `cf_clearance`
    /// cookie. The captured header lands in the jar; returns the page
    /// content, or nil on timeout.
    pub async fn interactive_unlock(&self, url: &str, timeout: Duration) -> Option<String> {
        let _permit = self.interact_sem.acquire().await.ok()?;
        let profile = profile_dir_for(&format!("{}-headful", self.domain));
        let Some(mut session) = self.launch(false, &profile).await else {
            self.observer.on_detail("interactive: cannot start browser");
            return None;
        };
        let result = self.unlock_loop(&session.page, url, timeout).await;
        let _ = session.browser.close().await;
        session.handler.abort();
        result
    }

    /// One-off headful visit of the seed to pre-populate cookies before
    /// the workers start. Best effort; every failure is only logged.
    pub async fn bootstrap(&self, url: &str) {
        let Ok(_permit) = self.interact_sem.acquire().await else {
            return;
        };
        let profile = profile_dir_for(&format!("{}-headful", self.domain));
        let Some(mut session) = self.launch(false, &profile).await else {
            self.observer.on_detail("bootstrap: cannot start browser");
            return;
        };
        if matches!(
            tokio::time::timeout(Duration::from_secs(30), session.page.goto(url)).await,
            Ok(Ok(_))
        ) {
            tokio::time::sleep(Duration::from_secs(3)).await;
            if let Ok(cookies) = session.page.get_cookies().await {
                let header = cookie_header_from(name_value_pairs(&cookies));
                if !header.is_empty() {
                    self.jar.put(&host_of(url), &header);
                    self.observer.on_detail("cookies: captured (bootstrap)");
                }
            }
        }
        let _ = session.browser.close().await;
        session.handler.abort();
    }

    /// Tear down the shared headless session, if one was ever launched.
    pub async fn shutdown(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            let _ = session.browser.close().await;
            session.handler.abort();
        }
    }

    async fn launch(&self, headless: bool, profile_dir: &Path) -> Option<BrowserSession> {
        if let Err(e) = std::fs::create_dir_all(profile_dir) {
            self.observer.on_detail(&format!("profile dir error: {e}"));
        }
        cleanup_chrome_singleton(profile_dir);

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(1366, 768)
            .arg(format!("--user-agent={UA}"))
            .arg("--lang=pl-PL");
        for arg in LAUNCH_ARGS {
            builder = builder.arg(arg);
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        if !headless {
            builder = builder.with_head();
        }
        let config = match builder.build() {
            Ok(config) => config,
            Err(e) => {
                self.observer.on_detail(&format!("browser launch failed: {e}"));
                warn!(error = %e, "browser config rejected");
                return None;
            }
        };

        let (mut browser, mut events) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                self.observer.on_detail(&format!("browser launch failed: {e}"));
                warn!(error = %e, "browser launch failed");
                return None;
            }
        };
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                self.observer.on_detail(&format!("browser page failed: {e}"));
                let _ = browser.close().await;
                handler.abort();
                return None;
            }
        };
        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS.to_string()))
            .await
        {
            debug!(error = %e, "stealth patch rejected");
        }

        Some(BrowserSession { browser, page, handler })
    }

    async fn unlock_loop(&self, page: &Page, url: &str, timeout: Duration) -> Option<String> {
        match tokio::time::timeout(Duration::from_secs(30), page.goto(url)).await {
            Ok(Ok(_)) => {}
            _ => {
                self.observer.on_detail("interactive: initial navigation failed");
                return None;
            }
        }
        let started = Instant::now();
        let mut last_progress = 0;
        while started.elapsed() < timeout {
            if click_consent(page).await {
                self.observer.on_detail("interactive: clicked cookie banner");
                tokio::time::sleep(Duration::from_millis(500)).await;
                reload(page).await;
            }
            if let Ok(cookies) = page.get_cookies().await {
                if has_cf_clearance(cookies.iter().map(|c| c.name.as_str())) {
                    let header = cookie_header_from(name_value_pairs(&cookies));
                    let html = page.content().await.ok();
                    if !header.is_empty() {
                        self.jar.put(&host_of(url), &header);
                        self.observer.on_detail("cookies: captured (interactive)");
                    }
                    return html;
                }
            }
            let waited = started.elapsed().as_secs();
            if waited > 0 && waited % 5 == 0 && waited != last_progress {
                last_progress = waited;
                self.observer.on_detail(&format!(
                    "interactive: waiting {waited}s/{}s, reloading",
                    timeout.as_secs()
                ));
                reload(page).await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.observer.on_detail("interactive: timeout");
        None
    }
}

async fn render_on(page: &Page, url: &str, timeout: Duration) -> Option<String> {
    let navigate = async {
        page.goto(url).await?;
        page.wait_for_navigation().await?;
        Ok::<(), chromiumoxide::error::CdpError>(())
    };
    match tokio::time::timeout(timeout, navigate).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(url, error = %e, "render navigation failed");
            return None;
        }
        Err(_) => {
            debug!(url, "render navigation timed out");
            return None;
        }
    }
    // Give late XHR-driven content a moment to settle.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    page.content().await.ok()
}

/// Reload via script; the evaluation handle may die mid-navigation, which
/// is fine.
async fn reload(page: &Page) {
    let _ = page.evaluate("location.reload()").await;
}

/// Click the first visible consent button whose label matches the
/// multilingual set. Runs in page context so text matching works across
/// cookie-banner frameworks.
async fn click_consent(page: &Page) -> bool {
    let labels = CONSENT_LABELS
        .iter()
        .map(|label| format!("\"{label}\""))
        .collect::<Vec<_>>()
        .join(",");
    let script = format!(
        r#"(() => {{
            const labels = [{labels}];
            const candidates = document.querySelectorAll('button, [role="button"], input[type="submit"]');
            for (const el of candidates) {{
                const text = (el.innerText || el.value || '').trim();
                if (!text) continue;
                if (!labels.some(l => text.includes(l))) continue;
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 || rect.height === 0) continue;
                el.click();
                return true;
            }}
            return false;
        }})()"#
    );
    match page.evaluate(script).await {
        Ok(value) => value.into_value::<bool>().unwrap_or(false),
        Err(_) => false,
    }
}

fn name_value_pairs(cookies: &[Cookie]) -> impl Iterator<Item = (&str, &str)> {
    cookies
        .iter()
        .map(|cookie| (cookie.name.as_str(), cookie.value.as_str()))
}

fn has_cf_clearance<'a>(names: impl IntoIterator<Item = &'a str>) -> bool {
    names
        .into_iter()
        .any(|name| name.to_ascii_lowercase().starts_with("cf_clearance"))
}

/// Serialize browser cookies to a `name=value; name=value` header.
fn cookie_header_from<'a>(cookies: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    cookies
        .into_iter()
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Profile directory for a target, under `~/.phorn/profiles`.
fn profile_dir_for(domain: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".phorn")
        .join("profiles")
        .join(domain.replace(':', "_"))
}

/// Remove stale Chrome single-instance lock files left by a previous run.
fn cleanup_chrome_singleton(profile_dir: &Path) {
    for name in ["SingletonLock", "SingletonCookie", "SingletonSocket"] {
        let path = profile_dir.join(name);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "singleton cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_serialization() {
        let pairs = [("a", "1"), ("", "skip"), ("b", "2")];
        assert_eq!(cookie_header_from(pairs), "a=1; b=2");
    }

    #[test]
    fn test_cf_clearance_detection() {
        assert!(has_cf_clearance(["CF_Clearance_x"]));
        assert!(!has_cf_clearance(["session", "cfz"]));
    }

    #[test]
    fn test_profile_dir_replaces_port_colon() {
        let dir = profile_dir_for("example.com:8080");
        assert!(dir.ends_with("example.com_8080"));
    }
}
