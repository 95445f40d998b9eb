use crate::models::hit::Hit;

/// Callback surface consumed by a UI or logging frontend.
///
/// Every method has a no-op default, so implementors pick only the events
/// they care about. Workers invoke these concurrently; implementations must
/// tolerate interleaved calls.
pub trait CrawlObserver: Send + Sync {
    /// A URL passed all gates and is about to be fetched.
    fn on_scan(&self, _url: &str) {}

    /// A contact was extracted.
    fn on_found(&self, _hit: &Hit) {}

    /// Counter snapshot: pages scanned, frontier size, hits, errors.
    fn on_status(&self, _scanned: usize, _queued: usize, _found: usize, _errors: usize) {}

    /// Free-form progress line (fetch tier changes, cookie captures, ...).
    fn on_detail(&self, _msg: &str) {}

    /// Unique phone/email counts and the five most-scanned path segments.
    fn on_stats(&self, _unique_phones: usize, _unique_emails: usize, _top_paths: &[(String, usize)]) {}
}

/// Observer that drops every event.
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}
