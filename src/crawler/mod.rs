//! The crawl driver: seeding, the worker pool, and the per-URL state
//! machine (gate, fetch with escalation, classify, extract, discover).

pub mod cookies;
pub mod frontier;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::browser::BrowserController;
use crate::config::settings::Settings;
use crate::extract::{self, PageContent};
use crate::models::hit::Hit;
use crate::models::mode::{RenderMode, ScanMode};
use crate::net::challenge::looks_like_challenge;
use crate::net::client::HttpFetcher;
use crate::net::robots::RobotsRules;
use crate::net::{defrag_and_norm, host_of, normalize_host, same_domain};
use crate::observer::CrawlObserver;
use self::cookies::CookieJar;
use self::frontier::{Frontier, FrontierItem};

/// How long a worker waits on an empty frontier before re-checking the
/// exit conditions.
const POP_WAIT: Duration = Duration::from_secs(1);

/// Case-insensitive sitemap `<loc>` scanner.
static LOC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<loc>\s*([^<\s]+)\s*</loc>").expect("loc regex"));

#[derive(Default)]
struct PageStats {
    unique_phones: HashSet<String>,
    unique_emails: HashSet<String>,
    path_counter: HashMap<String, usize>,
}

/// Shared crawl state. Workers hold it through an `Arc` and run identical
/// loops against the frontier.
pub struct Crawler {
    settings: Arc<Settings>,
    domain_host: String,
    mode: ScanMode,
    include: Option<Regex>,
    exclude: Option<Regex>,
    fetcher: HttpFetcher,
    browser: BrowserController,
    jar: CookieJar,
    frontier: Frontier,
    robots: OnceCell<RobotsRules>,
    /// Effective render mode; the seed probe may upgrade 0 to 1 before the
    /// workers start.
    render_mode: AtomicU8,
    scanned: AtomicUsize,
    found: AtomicUsize,
    errors: AtomicUsize,
    in_flight: AtomicUsize,
    stats: Mutex<PageStats>,
    hits: Mutex<Vec<Hit>>,
    observer: Arc<dyn CrawlObserver>,
}

impl Crawler {
    pub fn new(settings: Settings, observer: Arc<dyn CrawlObserver>) -> Result<Self> {
        settings.validate()?;
        let mode = ScanMode::from_u8(settings.crawl.mode).context("invalid scan mode")?;
        let include = compile_filter(&settings.crawl.include_re)?;
        let exclude = compile_filter(&settings.crawl.exclude_re)?;
        let fetcher = HttpFetcher::new(
            settings.network.proxy.as_deref(),
            settings.crawl.concurrency.max(1),
            settings.network.aggr_net,
        )?;
        let jar = CookieJar::new();
        let browser = BrowserController::new(
            &settings.crawl.domain,
            settings.network.proxy.clone(),
            jar.clone(),
            observer.clone(),
        );
        Ok(Self {
            domain_host: normalize_host(&settings.crawl.domain),
            mode,
            include,
            exclude,
            fetcher,
            browser,
            jar,
            frontier: Frontier::new(),
            robots: OnceCell::new(),
            render_mode: AtomicU8::new(settings.render.render_mode),
            scanned: AtomicUsize::new(0),
            found: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            stats: Mutex::new(PageStats::default()),
            hits: Mutex::new(Vec::new()),
            observer,
            settings: Arc::new(settings),
        })
    }

    /// Run the crawl to completion and return the accumulated hits.
    pub async fn run(self: Arc<Self>) -> Result<Vec<Hit>> {
        let cfg = &self.settings.crawl;

        self.seed_cookies();

        let rules = if cfg.obey_robots {
            let rules = RobotsRules::fetch(&self.fetcher, &cfg.domain).await;
            self.observer
                .on_detail(&format!("robots: {} disallow rules", rules.len()));
            rules
        } else {
            RobotsRules::default()
        };
        let _ = self.robots.set(rules);

        if let Some(start_url) = &cfg.start_url {
            self.frontier.push(start_url.clone(), 0).await;
        }
        self.frontier.push(format!("https://{}/", cfg.domain), 0).await;
        self.frontier.push(format!("http://{}/", cfg.domain), 0).await;

        let seed = cfg
            .start_url
            .clone()
            .unwrap_or_else(|| format!("https://{}/", cfg.domain));
        if self.render_mode.load(Ordering::SeqCst) == 0
            && self.fetcher.detect_cloudflare(&seed).await
        {
            info!("cloudflare detected on seed, enabling render fallback");
            self.observer.on_detail("cloudflare detected: render fallback enabled");
            self.render_mode.store(1, Ordering::SeqCst);
        }

        if cfg.use_sitemap {
            self.seed_from_sitemaps().await;
        }

        if self.settings.render.bootstrap_headful_first {
            self.observer.on_detail("bootstrap: opening browser");
            self.browser.bootstrap(&seed).await;
        }

        let worker_count = cfg.concurrency.max(1);
        info!(
            domain = %cfg.domain,
            workers = worker_count,
            max_pages = cfg.max_pages,
            mode = %self.mode,
            "starting crawl"
        );
        let mut handles = Vec::with_capacity(worker_count);
        for wid in 0..worker_count {
            let crawler = Arc::clone(&self);
            handles.push(tokio::spawn(async move { crawler.worker(wid).await }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker aborted");
            }
        }

        self.browser.shutdown().await;
        self.export_cookies();
        self.observer.on_status(
            self.scanned.load(Ordering::SeqCst),
            0,
            self.found.load(Ordering::SeqCst),
            self.errors.load(Ordering::SeqCst),
        );
        Ok(self.hits.lock().clone())
    }

    async fn worker(&self, wid: usize) {
        debug!(worker = wid, "worker started");
        let max_pages = self.settings.crawl.max_pages;
        loop {
            if self.scanned.load(Ordering::SeqCst) >= max_pages {
                break;
            }
            let Some(item) = self.frontier.pop(POP_WAIT).await else {
                if self.scanned.load(Ordering::SeqCst) >= max_pages {
                    break;
                }
                if self.frontier.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            };
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            self.process(item).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        debug!(worker = wid, "worker finished");
    }

    /// The per-URL state machine.
    async fn process(&self, item: FrontierItem) {
        let FrontierItem { url, depth } = item;

        // Gate: claim the URL, then apply the regex/depth/robots filters.
        if !self.frontier.mark_visited(&url).await {
            self.emit_status();
            return;
        }
        if let Some(include) = &self.include {
            if !include.is_match(&url) {
                self.emit_status();
                return;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&url) {
                self.emit_status();
                return;
            }
        }
        if let Some(max_depth) = self.settings.crawl.max_depth {
            if depth > max_depth {
                self.emit_status();
                return;
            }
        }
        if self.settings.crawl.obey_robots {
            let allowed = self.robots.get().map(|rules| rules.allowed(&url)).unwrap_or(true);
            if !allowed {
                self.observer.on_detail("robots: disallow");
                self.emit_status();
                return;
            }
        }

        self.observer.on_scan(&url);
        self.observer.on_detail("start");

        let html = self.fetch(&url).await;

        self.scanned.fetch_add(1, Ordering::SeqCst);
        if looks_like_challenge(html.as_deref()) {
            self.errors.fetch_add(1, Ordering::SeqCst);
            self.observer.on_detail("skip: challenge/timeout");
            self.emit_status();
            self.pace().await;
            return;
        }
        self.emit_status();

        let Some(html) = html else { return };
        let content = extract::extract_page(&html, self.mode);
        self.record_stats(&url, &content);
        self.record_hits(&url, &content);
        self.discover_links(&url, depth, &content.links).await;
        self.pace().await;
    }

    /// Fetch one URL through the tier selected by the effective render mode.
    async fn fetch(&self, url: &str) -> Option<String> {
        let cookie = self.jar.get(&host_of(url));
        let render_mode =
            RenderMode::from_u8(self.render_mode.load(Ordering::SeqCst)).unwrap_or(RenderMode::Http);
        match render_mode {
            RenderMode::Http => {
                self.observer.on_detail("fetch: http");
                self.fetcher.get_html(url, cookie.as_deref()).await
            }
            RenderMode::Always => {
                self.observer.on_detail("render: headless (always)");
                match self.browser.render(url, Duration::from_millis(15_000)).await {
                    Some(html) => Some(html),
                    None => {
                        self.observer.on_detail("render failed, falling back to http");
                        self.fetcher.get_html(url, cookie.as_deref()).await
                    }
                }
            }
            RenderMode::Fallback => {
                self.observer.on_detail("fetch: http (fallback first)");
                let mut html = self.fetcher.get_html(url, cookie.as_deref()).await;
                if looks_like_challenge(html.as_deref()) {
                    self.observer.on_detail("challenge detected: rendering headless");
                    if let Some(rendered) =
                        self.browser.render(url, Duration::from_millis(12_000)).await
                    {
                        html = Some(rendered);
                    }
                }
                if looks_like_challenge(html.as_deref()) && self.settings.render.interactive_unlock
                {
                    self.observer.on_detail("still blocked: interactive unlock");
                    let timeout = Duration::from_secs(self.settings.render.interactive_timeout_s);
                    if let Some(unlocked) = self.browser.interactive_unlock(url, timeout).await {
                        html = Some(unlocked);
                    }
                }
                html
            }
        }
    }

    fn record_stats(&self, url: &str, content: &PageContent) {
        let segment = path_segment(url);
        let (unique_phones, unique_emails, top_paths) = {
            let mut stats = self.stats.lock();
            *stats.path_counter.entry(segment).or_insert(0) += 1;
            stats.unique_phones.extend(content.phones.iter().cloned());
            stats.unique_emails.extend(content.emails.iter().cloned());
            let mut top: Vec<(String, usize)> = stats
                .path_counter
                .iter()
                .map(|(segment, count)| (segment.clone(), *count))
                .collect();
            top.sort_by(|a, b| b.1.cmp(&a.1));
            top.truncate(5);
            (stats.unique_phones.len(), stats.unique_emails.len(), top)
        };
        self.observer.on_stats(unique_phones, unique_emails, &top_paths);
    }

    /// Assemble hits for one page: the Cartesian product when both kinds
    /// are present, otherwise one hit per phone or per email.
    fn record_hits(&self, url: &str, content: &PageContent) {
        let domain = &self.settings.crawl.domain;
        let mut page_hits = Vec::new();
        if !content.phones.is_empty() && !content.emails.is_empty() {
            for phone in &content.phones {
                for email in &content.emails {
                    page_hits.push(Hit {
                        source_domain: domain.clone(),
                        username: content.username.clone(),
                        phone: phone.clone(),
                        email: email.clone(),
                        url: url.to_string(),
                    });
                }
            }
        } else if !content.phones.is_empty() {
            for phone in &content.phones {
                page_hits.push(Hit {
                    source_domain: domain.clone(),
                    username: content.username.clone(),
                    phone: phone.clone(),
                    email: String::new(),
                    url: url.to_string(),
                });
            }
        } else {
            for email in &content.emails {
                page_hits.push(Hit {
                    source_domain: domain.clone(),
                    username: String::new(),
                    phone: String::new(),
                    email: email.clone(),
                    url: url.to_string(),
                });
            }
        }
        if page_hits.is_empty() {
            return;
        }
        self.found.fetch_add(page_hits.len(), Ordering::SeqCst);
        {
            let mut hits = self.hits.lock();
            hits.extend(page_hits.iter().cloned());
        }
        for hit in &page_hits {
            self.observer.on_found(hit);
        }
    }

    /// Resolve hrefs against the current page, re-apply the gates, and
    /// enqueue everything not yet visited at depth + 1.
    async fn discover_links(&self, base: &str, depth: u32, hrefs: &[String]) {
        let before = self.frontier.len();
        for href in hrefs {
            let Some(next) = defrag_and_norm(base, href) else { continue };
            if !same_domain(&next, &self.settings.crawl.domain) {
                continue;
            }
            if let Some(include) = &self.include {
                if !include.is_match(&next) {
                    continue;
                }
            }
            if let Some(exclude) = &self.exclude {
                if exclude.is_match(&next) {
                    continue;
                }
            }
            let next_depth = depth + 1;
            if let Some(max_depth) = self.settings.crawl.max_depth {
                if next_depth > max_depth {
                    continue;
                }
            }
            self.frontier.push_if_unvisited(next, next_depth).await;
        }
        let after = self.frontier.len();
        if after > before {
            self.observer
                .on_detail(&format!("enqueued: +{} (queue={after})", after - before));
        }
    }

    async fn seed_from_sitemaps(&self) {
        let domain = &self.settings.crawl.domain;
        for path in ["/sitemap.xml", "/sitemap_index.xml"] {
            let timeout = Duration::from_secs(12);
            let mut body = self
                .fetcher
                .fetch_text(&format!("https://{domain}{path}"), timeout)
                .await;
            if body.is_none() {
                body = self
                    .fetcher
                    .fetch_text(&format!("http://{domain}{path}"), timeout)
                    .await;
            }
            let Some(body) = body else { continue };
            let mut added = 0usize;
            for capture in LOC_RE.captures_iter(&body) {
                let loc = capture[1].trim().to_string();
                if same_domain(&loc, domain) {
                    self.frontier.push(loc, 0).await;
                    added += 1;
                }
            }
            if added > 0 {
                self.observer
                    .on_detail(&format!("sitemap: +{added} seeds from {path}"));
            }
        }
    }

    fn seed_cookies(&self) {
        let cookies = &self.settings.cookies;
        if let Some(header) = &cookies.seed_header {
            let header = header.trim();
            if !header.is_empty() {
                self.jar.put(&self.domain_host, header);
                self.observer.on_detail("cookies: seeded (config)");
            }
        }
        if !cookies.import_file.is_empty() {
            match std::fs::read_to_string(&cookies.import_file) {
                Ok(contents) => {
                    let header = contents.trim();
                    if !header.is_empty() {
                        self.jar.put(&self.domain_host, header);
                        self.observer.on_detail("cookies: seeded (file)");
                    }
                }
                Err(e) => self.observer.on_detail(&format!("cookies import error: {e}")),
            }
        }
    }

    /// Persist the jar for the next run. Best effort; failures are logged
    /// and swallowed.
    fn export_cookies(&self) {
        let path = &self.settings.cookies.export_file;
        if path.is_empty() {
            return;
        }
        let Some(header) = self.jar.export_for(&self.domain_host) else {
            return;
        };
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(path, header) {
            self.observer.on_detail(&format!("cookies export error: {e}"));
            debug!(path = %path, error = %e, "cookie export failed");
        }
    }

    fn emit_status(&self) {
        self.observer.on_status(
            self.scanned.load(Ordering::SeqCst),
            self.frontier.len(),
            self.found.load(Ordering::SeqCst),
            self.errors.load(Ordering::SeqCst),
        );
    }

    async fn pace(&self) {
        let delay_ms = self.settings.crawl.delay_ms;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

/// Run a crawl with the given settings and observer.
pub async fn crawl(settings: Settings, observer: Arc<dyn CrawlObserver>) -> Result<Vec<Hit>> {
    Arc::new(Crawler::new(settings, observer)?).run().await
}

fn compile_filter(pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    let regex =
        Regex::new(pattern).with_context(|| format!("invalid url filter regex: {pattern}"))?;
    Ok(Some(regex))
}

/// First segment of the URL path, empty for the root.
fn path_segment(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    path.trim_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment() {
        assert_eq!(path_segment("https://example.com/"), "");
        assert_eq!(path_segment("https://example.com/oferta/123"), "oferta");
        assert_eq!(path_segment("https://example.com/kontakt"), "kontakt");
        assert_eq!(path_segment("not a url"), "");
    }

    #[test]
    fn test_compile_filter() {
        assert!(compile_filter("").unwrap().is_none());
        assert!(compile_filter("/oferta/").unwrap().is_some());
        assert!(compile_filter("(unclosed").is_err());
    }
}
