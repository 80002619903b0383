//! Display metadata for sources.
//!
//! Hosts may pass an explicit title and creator. Whatever is missing is
//! inferred from the final path segment of the source URL:
//!
//! - percent-decode and strip the extension
//! - `Creator - Title` splits into both fields
//! - split on whitespace and underscores, title-case each word

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Host-supplied metadata; either field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
}

/// Metadata after inference. Only the creator may remain unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub creator: Option<String>,
}

impl TrackInfo {
    /// Merge explicit metadata over what the URL implies.
    pub fn resolve(url: &Url, explicit: Option<&SourceMetadata>) -> Self {
        let derived = derive_from_url(url);
        let explicit_title = explicit.and_then(|m| non_empty(m.title.as_deref()));
        let explicit_creator = explicit.and_then(|m| non_empty(m.creator.as_deref()));

        Self {
            title: explicit_title
                .or(derived.title)
                .unwrap_or_else(|| "Unknown".to_string()),
            creator: explicit_creator.or(derived.creator),
        }
    }

    /// Get display creator.
    pub fn display_creator(&self) -> &str {
        self.creator.as_deref().unwrap_or("Unknown Artist")
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Infer title and creator from the URL's final path segment.
pub fn derive_from_url(url: &Url) -> SourceMetadata {
    let Some(segment) = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
    else {
        return SourceMetadata::default();
    };

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let stem = match decoded.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => decoded,
    };
    let spaced = stem.replace('_', " ");

    let (creator, title) = match spaced.split_once(" - ") {
        Some((creator, title)) if !creator.trim().is_empty() && !title.trim().is_empty() => {
            (Some(title_case(creator)), title_case(title))
        }
        _ => (None, title_case(&spaced)),
    };

    SourceMetadata {
        title: Some(title).filter(|t| !t.is_empty()),
        creator,
    }
}

/// Capitalize the first letter of every whitespace-separated word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased file extension of the URL path, used as a decoder hint.
pub fn extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_title_from_underscored_name() {
        let meta = derive_from_url(&url("https://example.com/media/late_night_drive.mp3"));
        assert_eq!(meta.title.as_deref(), Some("Late Night Drive"));
        assert_eq!(meta.creator, None);
    }

    #[test]
    fn test_title_is_percent_decoded() {
        let meta = derive_from_url(&url("https://example.com/my%20first%20song.ogg"));
        assert_eq!(meta.title.as_deref(), Some("My First Song"));
    }

    #[test]
    fn test_creator_title_split() {
        let meta = derive_from_url(&url("https://example.com/the_band%20-%20open_road.flac"));
        assert_eq!(meta.creator.as_deref(), Some("The Band"));
        assert_eq!(meta.title.as_deref(), Some("Open Road"));
    }

    #[test]
    fn test_title_case_keeps_inner_letters() {
        assert_eq!(title_case("mix by DJ x"), "Mix By DJ X");
        assert_eq!(title_case("  spaced   out "), "Spaced Out");
    }

    #[test]
    fn test_no_segment() {
        let meta = derive_from_url(&url("https://example.com/"));
        assert_eq!(meta, SourceMetadata::default());
    }

    #[test]
    fn test_explicit_metadata_wins() {
        let explicit = SourceMetadata {
            title: Some("Overture".to_string()),
            creator: None,
        };
        let info = TrackInfo::resolve(&url("https://example.com/ignored.mp3"), Some(&explicit));
        assert_eq!(info.title, "Overture");
        assert_eq!(info.display_creator(), "Unknown Artist");
    }

    #[test]
    fn test_blank_explicit_title_falls_back() {
        let explicit = SourceMetadata {
            title: Some("   ".to_string()),
            creator: Some("Someone".to_string()),
        };
        let info = TrackInfo::resolve(&url("https://example.com/a.mp3"), Some(&explicit));
        assert_eq!(info.title, "A");
        assert_eq!(info.creator.as_deref(), Some("Someone"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension(&url("https://example.com/a.MP3")).as_deref(), Some("mp3"));
        assert_eq!(extension(&url("https://example.com/stream")), None);
    }
}
