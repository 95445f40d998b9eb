//! Phone/email extraction from rendered HTML.
//!
//! Phones are matched in the visible page text and in `tel:` anchors, then
//! normalized to E.164 (`+48XXXXXXXXX`). Emails come from the text and from
//! `mailto:` anchors. The parse is fully synchronous; nothing from the DOM
//! survives past the returned [`PageContent`].

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::models::mode::ScanMode;

/// Polish phone candidates: optional `+48`/`48` prefix, nine digits with
/// space/dash/dot runs between them.
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+?48[\s\-.]?)?(?:\d[\s\-.]?){9}").expect("phone regex"));

/// Email shape with bounded local and domain parts and a 2+ char TLD.
pub static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9._%+-]{1,64}@[a-zA-Z0-9.-]{1,255}\.[A-Za-z0-9-]{2,}\b")
        .expect("email regex")
});

/// Anchored variant used to validate decoded `mailto:` payloads.
static EMAIL_EXACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]{1,64}@[a-zA-Z0-9.-]{1,255}\.[A-Za-z0-9-]{2,}$")
        .expect("email exact regex")
});

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector"));
static HEADING_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1", "h2", "h3"]
        .iter()
        .map(|tag| Selector::parse(tag).expect("heading selector"))
        .collect()
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector"));

/// Everything harvested from one page in a single parse.
#[derive(Debug, Default)]
pub struct PageContent {
    /// First non-empty heading or title, collapsed and capped at 80 chars.
    pub username: String,
    pub phones: BTreeSet<String>,
    pub emails: BTreeSet<String>,
    /// Raw anchor hrefs, in document order; resolution happens at the caller.
    pub links: Vec<String>,
}

/// Parse a page and collect phones, emails, the username guess and every
/// anchor href, honoring the scan mode.
pub fn extract_page(html: &str, mode: ScanMode) -> PageContent {
    let doc = Html::parse_document(html);
    let text = page_text(&doc);

    let mut content = PageContent {
        username: guess_username(&doc),
        ..Default::default()
    };

    let anchors: Vec<String> = doc
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect();

    if mode.wants_phones() {
        for m in PHONE_RE.find_iter(&text) {
            if let Some(phone) = clean_phone(m.as_str()) {
                content.phones.insert(phone);
            }
        }
        for href in &anchors {
            if let Some(raw) = strip_scheme(href, "tel:") {
                if let Some(phone) = clean_phone(&percent_decode(raw)) {
                    content.phones.insert(phone);
                }
            }
        }
    }

    if mode.wants_emails() {
        for m in EMAIL_RE.find_iter(&text) {
            content.emails.insert(m.as_str().to_string());
        }
        for href in &anchors {
            if let Some(raw) = strip_scheme(href, "mailto:") {
                let decoded = percent_decode(raw);
                let address = decoded.split('?').next().unwrap_or("");
                if EMAIL_EXACT_RE.is_match(address) {
                    content.emails.insert(address.to_string());
                }
            }
        }
    }

    content.links = anchors;
    content
}

/// Normalize a raw phone match to E.164. Nine digits get the `48` country
/// code prepended; anything that does not end up as `48` + nine digits is
/// rejected.
pub fn clean_phone(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 9 {
        digits = format!("48{digits}");
    }
    if digits.len() == 11 && digits.starts_with("48") {
        Some(format!("+{digits}"))
    } else {
        None
    }
}

/// Tag-stripped, whitespace-collapsed text of the whole document.
pub fn page_text(doc: &Html) -> String {
    let joined = doc.root_element().text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty `h1`/`h2`/`h3` text, falling back to `<title>`,
/// collapsed to single spaces and truncated to 80 characters.
pub fn guess_username(doc: &Html) -> String {
    for selector in HEADING_SELECTORS.iter() {
        if let Some(element) = doc.select(selector).next() {
            let text = collapse_ws(&element.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                return truncate_chars(&text, 80);
            }
        }
    }
    if let Some(title) = doc.select(&TITLE_SELECTOR).next() {
        let text = collapse_ws(&title.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() {
            return truncate_chars(&text, 80);
        }
    }
    String::new()
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn strip_scheme<'a>(href: &'a str, scheme: &str) -> Option<&'a str> {
    let head = href.get(..scheme.len())?;
    if head.eq_ignore_ascii_case(scheme) {
        href.get(scheme.len()..)
    } else {
        None
    }
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_phone_with_prefix_and_separators() {
        assert_eq!(clean_phone("+48 123-456-789"), Some("+48123456789".to_string()));
    }

    #[test]
    fn test_clean_phone_bare_nine_digits() {
        assert_eq!(clean_phone("123.456.789"), Some("+48123456789".to_string()));
        assert_eq!(clean_phone("600 700 800"), Some("+48600700800".to_string()));
    }

    #[test]
    fn test_clean_phone_rejects_foreign_numbers() {
        assert_eq!(clean_phone("+1 555 123 4567"), None);
        assert_eq!(clean_phone("12345"), None);
        assert_eq!(clean_phone("+49 123456789 00"), None);
    }

    #[test]
    fn test_phone_from_text_and_tel_href() {
        let html = r#"<html><body>
            <p>Zadzwon: 600-700-800</p>
            <a href="tel:%2B48%20111%20222%20333">call</a>
        </body></html>"#;
        let content = extract_page(html, ScanMode::Phones);
        assert!(content.phones.contains("+48600700800"));
        assert!(content.phones.contains("+48111222333"));
        assert!(content.emails.is_empty());
    }

    #[test]
    fn test_email_from_text_and_mailto() {
        let html = r#"<html><body>
            biuro@example.pl
            <a href="mailto:kontakt@example.pl?subject=oferta">mail</a>
            <a href="mailto:not-an-email">broken</a>
        </body></html>"#;
        let content = extract_page(html, ScanMode::Emails);
        assert!(content.emails.contains("biuro@example.pl"));
        assert!(content.emails.contains("kontakt@example.pl"));
        assert_eq!(content.emails.len(), 2);
    }

    #[test]
    fn test_mode_gates_extraction() {
        let html = "<html><body>600 700 800 biuro@example.pl</body></html>";
        let phones_only = extract_page(html, ScanMode::Phones);
        assert!(!phones_only.phones.is_empty());
        assert!(phones_only.emails.is_empty());
        let emails_only = extract_page(html, ScanMode::Emails);
        assert!(emails_only.phones.is_empty());
        assert!(!emails_only.emails.is_empty());
        let both = extract_page(html, ScanMode::Both);
        assert!(!both.phones.is_empty() && !both.emails.is_empty());
    }

    #[test]
    fn test_guess_username_prefers_headings() {
        let doc = Html::parse_document(
            "<html><head><title>Strona</title></head><body><h1>  Jan \n Kowalski </h1></body></html>",
        );
        assert_eq!(guess_username(&doc), "Jan Kowalski");
    }

    #[test]
    fn test_guess_username_title_fallback_and_cap() {
        let long = "x".repeat(120);
        let doc = Html::parse_document(&format!("<html><head><title>{long}</title></head></html>"));
        assert_eq!(guess_username(&doc).chars().count(), 80);
    }

    #[test]
    fn test_guess_username_empty_when_nothing_matches() {
        let doc = Html::parse_document("<html><body><p>no headings</p></body></html>");
        assert_eq!(guess_username(&doc), "");
    }

    #[test]
    fn test_links_collected_in_document_order() {
        let html = r#"<html><body><a href="/a">a</a><a href="/b">b</a></body></html>"#;
        let content = extract_page(html, ScanMode::Phones);
        assert_eq!(content.links, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn test_page_text_collapses_whitespace() {
        let doc = Html::parse_document("<html><body><p>a\n  b</p><div>c</div></body></html>");
        assert_eq!(page_text(&doc), "a b c");
    }
}
