//! Process-wide per-host cookie state.

use std::sync::Arc;

use dashmap::DashMap;

/// Host to serialized `Cookie` header mapping shared by the HTTP tiers and
/// the browser controller. A write also lands under the host's parent
/// domain (`a.b.c` mirrors to `b.c`); the most recent write per host wins.
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    entries: Arc<DashMap<String, String>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a header under `host` and mirror it under the parent domain.
    pub fn put(&self, host: &str, header: &str) {
        if host.is_empty() || header.is_empty() {
            return;
        }
        let host = host.to_ascii_lowercase();
        if let Some((_, parent)) = host.split_once('.') {
            if !parent.is_empty() {
                self.entries.insert(parent.to_string(), header.to_string());
            }
        }
        self.entries.insert(host, header.to_string());
    }

    /// Exact lookup; callers pass lowercased, port-stripped hosts.
    pub fn get(&self, host: &str) -> Option<String> {
        self.entries.get(host).map(|entry| entry.value().clone())
    }

    /// Header to persist at crawl end: the target's entry, or any entry
    /// when the target never collected one.
    pub fn export_for(&self, host: &str) -> Option<String> {
        self.get(host)
            .or_else(|| self.entries.iter().next().map(|entry| entry.value().clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
