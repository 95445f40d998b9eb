//! FIFO frontier with an atomically coupled visited set.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

/// A URL waiting to be crawled, tagged with its discovery depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    pub url: String,
    pub depth: u32,
}

#[derive(Default)]
struct FrontierState {
    queue: VecDeque<FrontierItem>,
    visited: HashSet<String>,
}

/// The crawl queue. One mutex covers both the FIFO and the visited set so
/// the check-and-insert step is atomic; a lock-free length mirror keeps
/// status reporting cheap.
#[derive(Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    len: AtomicUsize,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue unconditionally. Used for seeds, which dedupe at pop time.
    pub async fn push(&self, url: String, depth: u32) {
        let mut state = self.state.lock().await;
        state.queue.push_back(FrontierItem { url, depth });
        self.len.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Enqueue a discovered link unless it was already visited. Returns
    /// whether the item was queued.
    pub async fn push_if_unvisited(&self, url: String, depth: u32) -> bool {
        let mut state = self.state.lock().await;
        if state.visited.contains(&url) {
            return false;
        }
        state.queue.push_back(FrontierItem { url, depth });
        self.len.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
        true
    }

    /// Pop the next item, waiting up to `wait` for one to appear.
    pub async fn pop(&self, wait: Duration) -> Option<FrontierItem> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(item) = state.queue.pop_front() {
                    self.len.fetch_sub(1, Ordering::SeqCst);
                    return Some(item);
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Record a URL as visited. Returns false when some worker already
    /// claimed it, in which case the caller drops the item.
    pub async fn mark_visited(&self, url: &str) -> bool {
        let mut state = self.state.lock().await;
        state.visited.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let frontier = Frontier::new();
        frontier.push("a".into(), 0).await;
        frontier.push("b".into(), 1).await;
        let first = frontier.pop(Duration::from_millis(10)).await.unwrap();
        let second = frontier.pop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.url, "a");
        assert_eq!(second.url, "b");
        assert_eq!(second.depth, 1);
    }

    #[tokio::test]
    async fn test_pop_times_out_on_empty_queue() {
        let frontier = Frontier::new();
        assert!(frontier.pop(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn test_mark_visited_claims_once() {
        let frontier = Frontier::new();
        assert!(frontier.mark_visited("https://example.com/").await);
        assert!(!frontier.mark_visited("https://example.com/").await);
    }

    #[tokio::test]
    async fn test_push_if_unvisited_skips_claimed_urls() {
        let frontier = Frontier::new();
        frontier.mark_visited("seen").await;
        assert!(!frontier.push_if_unvisited("seen".into(), 1).await);
        assert!(frontier.push_if_unvisited("new".into(), 1).await);
        assert_eq!(frontier.len(), 1);
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let frontier = std::sync::Arc::new(Frontier::new());
        let popper = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.pop(Duration::from_secs(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        frontier.push("late".into(), 0).await;
        let item = popper.await.unwrap().unwrap();
        assert_eq!(item.url, "late");
    }
}
