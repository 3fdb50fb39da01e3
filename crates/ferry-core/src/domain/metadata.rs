//! Video metadata sent when a resumable session is opened.

use serde::{Deserialize, Serialize};

use super::errors::UploadError;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

/// "People & Blogs"
pub const DEFAULT_CATEGORY_ID: &str = "22";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl std::str::FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "unlisted" => Ok(Self::Unlisted),
            "public" => Ok(Self::Public),
            other => Err(format!("unknown privacy status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_category_id")]
    pub category_id: String,
    #[serde(default)]
    pub privacy: PrivacyStatus,
    #[serde(default)]
    pub made_for_kids: bool,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_category_id() -> String {
    DEFAULT_CATEGORY_ID.to_string()
}

fn default_mime_type() -> String {
    "video/*".to_string()
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            category_id: default_category_id(),
            privacy: PrivacyStatus::default(),
            made_for_kids: false,
            mime_type: default_mime_type(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyStatus) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Checks the limits the remote enforces, before any network call.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.title.trim().is_empty() {
            return Err(UploadError::InvalidMetadata("title is empty".into()));
        }
        let title_chars = self.title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            return Err(UploadError::InvalidMetadata(format!(
                "title has {title_chars} characters, limit is {MAX_TITLE_CHARS}"
            )));
        }
        let description_chars = self.description.chars().count();
        if description_chars > MAX_DESCRIPTION_CHARS {
            return Err(UploadError::InvalidMetadata(format!(
                "description has {description_chars} characters, limit is {MAX_DESCRIPTION_CHARS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_private_people_and_blogs() {
        let meta = VideoMetadata::new("holiday");
        assert_eq!(meta.privacy, PrivacyStatus::Private);
        assert_eq!(meta.category_id, "22");
        assert!(!meta.made_for_kids);
        assert_eq!(meta.mime_type, "video/*");
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn rejects_blank_and_oversized_fields() {
        assert!(matches!(
            VideoMetadata::new("   ").validate(),
            Err(UploadError::InvalidMetadata(_))
        ));
        assert!(matches!(
            VideoMetadata::new("t".repeat(101)).validate(),
            Err(UploadError::InvalidMetadata(_))
        ));
        assert!(VideoMetadata::new("t".repeat(100)).validate().is_ok());
        assert!(matches!(
            VideoMetadata::new("ok").with_description("d".repeat(5001)).validate(),
            Err(UploadError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn privacy_parses_case_insensitively() {
        assert_eq!("Unlisted".parse::<PrivacyStatus>(), Ok(PrivacyStatus::Unlisted));
        assert!("secret".parse::<PrivacyStatus>().is_err());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let meta: VideoMetadata = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(meta, VideoMetadata::new("x"));
    }
}
