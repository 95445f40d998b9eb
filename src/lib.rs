//! PHORN: a single-domain contact crawler.
//!
//! The engine combines a bounded-concurrency frontier scheduler, a tiered
//! fetch ladder (plain HTTP, HTTP/2 with browser headers, headless render,
//! interactive human-assisted unlock), per-host cookie state and
//! Polish-format phone/email extraction. Progress flows to the embedding
//! frontend through the [`observer::CrawlObserver`] callbacks.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod models;
pub mod net;
pub mod observer;
pub mod output;
