/// A single extracted contact. Appended to the result list and emitted
/// through `on_found` as soon as a page yields it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub source_domain: String,
    /// Page title or heading guess; empty for email-only hits.
    pub username: String,
    /// E.164 Polish number (`+48XXXXXXXXX`) or empty.
    pub phone: String,
    /// Empty when the hit is phone-only.
    pub email: String,
    pub url: String,
}
