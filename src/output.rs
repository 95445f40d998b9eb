//! CSV export of the final hit list.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::models::hit::Hit;

/// Write the hits to `contacts_{YYYYMMDD_HHMMSS}.csv` in the working
/// directory and return the path.
pub fn save_csv(hits: &[Hit]) -> Result<PathBuf> {
    let path = PathBuf::from(format!("contacts_{}.csv", Local::now().format("%Y%m%d_%H%M%S")));
    write_csv(&path, hits)?;
    Ok(path)
}

/// Write the header row and one record per hit.
pub fn write_csv(path: &Path, hits: &[Hit]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["source_domain", "username", "phone", "email", "url"])?;
    for hit in hits {
        writer.write_record([
            hit.source_domain.as_str(),
            hit.username.as_str(),
            hit.phone.as_str(),
            hit.email.as_str(),
            hit.url.as_str(),
        ])?;
    }
    writer.flush().context("Failed to flush csv")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(username: &str, phone: &str, email: &str) -> Hit {
        Hit {
            source_domain: "example.com".into(),
            username: username.into(),
            phone: phone.into(),
            email: email.into(),
            url: "https://example.com/kontakt".into(),
        }
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.csv");
        write_csv(&path, &[hit("Jan K", "+48123456789", "a@b.pl")]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("source_domain,username,phone,email,url"));
        assert_eq!(
            lines.next(),
            Some("example.com,Jan K,+48123456789,a@b.pl,https://example.com/kontakt")
        );
    }

    #[test]
    fn test_write_csv_quotes_awkward_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.csv");
        write_csv(&path, &[hit("Biuro, Oddzial \"A\"", "", "a@b.pl")]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"Biuro, Oddzial \"\"A\"\"\""));
    }

    #[test]
    fn test_write_csv_empty_hits_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.csv");
        write_csv(&path, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), "source_domain,username,phone,email,url");
    }
}
