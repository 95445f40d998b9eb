use std::fmt;

/// What the extractors collect from a scanned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Phones,
    Emails,
    Both,
}

impl ScanMode {
    pub fn from_u8(mode: u8) -> Option<Self> {
        match mode {
            1 => Some(Self::Phones),
            2 => Some(Self::Emails),
            3 => Some(Self::Both),
            _ => None,
        }
    }

    pub fn wants_phones(self) -> bool {
        matches!(self, Self::Phones | Self::Both)
    }

    pub fn wants_emails(self) -> bool {
        matches!(self, Self::Emails | Self::Both)
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Phones => write!(f, "phones"),
            ScanMode::Emails => write!(f, "emails"),
            ScanMode::Both => write!(f, "phones+emails"),
        }
    }
}

/// How a page is fetched: plain HTTP, HTTP with a render fallback chain,
/// or a headless render for every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Http,
    Fallback,
    Always,
}

impl RenderMode {
    pub fn from_u8(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::Http),
            1 => Some(Self::Fallback),
            2 => Some(Self::Always),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_from_u8() {
        assert_eq!(ScanMode::from_u8(1), Some(ScanMode::Phones));
        assert_eq!(ScanMode::from_u8(3), Some(ScanMode::Both));
        assert_eq!(ScanMode::from_u8(0), None);
        assert_eq!(ScanMode::from_u8(4), None);
    }

    #[test]
    fn test_scan_mode_wants() {
        assert!(ScanMode::Phones.wants_phones());
        assert!(!ScanMode::Phones.wants_emails());
        assert!(ScanMode::Both.wants_phones());
        assert!(ScanMode::Both.wants_emails());
    }

    #[test]
    fn test_render_mode_from_u8() {
        assert_eq!(RenderMode::from_u8(0), Some(RenderMode::Http));
        assert_eq!(RenderMode::from_u8(2), Some(RenderMode::Always));
        assert_eq!(RenderMode::from_u8(3), None);
    }
}
