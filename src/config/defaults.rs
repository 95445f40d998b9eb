use super::settings::{CookieConfig, CrawlConfig, LoggingConfig, NetworkConfig, RenderConfig};

// ---------------------------------------------------------------------------
// Section defaults
// ---------------------------------------------------------------------------

pub fn default_crawl_config() -> CrawlConfig {
    CrawlConfig {
        domain: String::new(),
        mode: default_mode(),
        max_pages: default_max_pages(),
        start_url: None,
        concurrency: default_concurrency(),
        delay_ms: 0,
        max_depth: None,
        use_sitemap: false,
        obey_robots: false,
        include_re: String::new(),
        exclude_re: String::new(),
    }
}

pub fn default_network_config() -> NetworkConfig {
    NetworkConfig {
        proxy: None,
        aggr_net: false,
    }
}

pub fn default_render_config() -> RenderConfig {
    RenderConfig {
        render_mode: 0,
        interactive_unlock: false,
        interactive_timeout_s: default_interactive_timeout_s(),
        bootstrap_headful_first: false,
    }
}

pub fn default_cookie_config() -> CookieConfig {
    CookieConfig {
        seed_header: None,
        import_file: String::new(),
        export_file: String::new(),
    }
}

pub fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        file: default_log_file(),
    }
}

// ---------------------------------------------------------------------------
// Field defaults
// ---------------------------------------------------------------------------

pub fn default_mode() -> u8 {
    1
}

pub fn default_max_pages() -> usize {
    200
}

pub fn default_concurrency() -> usize {
    1
}

pub fn default_interactive_timeout_s() -> u64 {
    60
}

pub fn default_log_level() -> String {
    String::from("info")
}

pub fn default_log_file() -> String {
    String::from("phorn.log")
}
