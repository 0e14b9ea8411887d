//! Parser for destination folders given as Google Drive URLs or raw IDs.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

/// Regex patterns for Google Drive folder URLs.
static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static OPEN_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

/// Valid Google Drive ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Google Drive folder ID from a URL or validate a raw ID.
///
/// Supports the following formats:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/open?id=<ID>`
/// - Raw ID string (including the `root` alias for My Drive)
///
/// # Examples
///
/// ```
/// use drive_upload::url_parser::extract_folder_id;
///
/// let id = extract_folder_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_folder_id("1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn extract_folder_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    for regex in [&*FOLDER_URL_REGEX, &*OPEN_URL_REGEX] {
        if let Some(id) = regex.captures(trimmed).and_then(|captures| captures.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_folder_url() {
        let url = "https://drive.google.com/drive/folders/1g1cvcyagkRWgv1NT_VjyptdRJA8IgOIE";
        assert_eq!(
            extract_folder_id(url).unwrap(),
            "1g1cvcyagkRWgv1NT_VjyptdRJA8IgOIE"
        );
    }

    #[test]
    fn test_extract_folder_url_with_user() {
        let url = "https://drive.google.com/drive/u/2/folders/1abc123XYZ";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn test_extract_open_url() {
        let url = "https://drive.google.com/open?id=1abc123XYZ";
        assert_eq!(extract_folder_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn test_extract_raw_id() {
        assert_eq!(extract_folder_id("abc-123_XYZ").unwrap(), "abc-123_XYZ");
        assert_eq!(extract_folder_id("root").unwrap(), "root");
    }

    #[test]
    fn test_invalid_input() {
        assert!(extract_folder_id("https://drive.google.com/file/d/1abc/view").is_err());
        assert!(extract_folder_id("").is_err());
        assert!(extract_folder_id("   ").is_err());
    }
}
