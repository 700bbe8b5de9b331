//! Defines the core data structures used in the contact-harvester application.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single input URL, kept exactly as the caller provided it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct ScrapeTarget(String);

impl ScrapeTarget {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScrapeTarget {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Social networks we look for, in the order they are exported.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Linkedin,
    Twitter,
    Facebook,
    Instagram,
    Youtube,
    Github,
}

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 6] = [
        SocialPlatform::Linkedin,
        SocialPlatform::Twitter,
        SocialPlatform::Facebook,
        SocialPlatform::Instagram,
        SocialPlatform::Youtube,
        SocialPlatform::Github,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Linkedin => "linkedin",
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::Youtube => "youtube",
            SocialPlatform::Github => "github",
        }
    }
}

/// Outcome of scraping one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeStatus {
    Success,
    /// Success through the plain HTTP fallback after the browser was unavailable.
    SuccessSimple,
    Error(String),
}

impl ScrapeStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, ScrapeStatus::Error(_))
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeStatus::Success => f.write_str("success"),
            ScrapeStatus::SuccessSimple => f.write_str("success (simple scraper)"),
            ScrapeStatus::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}

impl From<&str> for ScrapeStatus {
    fn from(s: &str) -> Self {
        match s {
            "success" => ScrapeStatus::Success,
            "success (simple scraper)" => ScrapeStatus::SuccessSimple,
            other => ScrapeStatus::Error(
                other
                    .strip_prefix("Error: ")
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }
}

impl Serialize for ScrapeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScrapeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ScrapeStatus::from(s.as_str()))
    }
}

/// Contact details harvested from one target URL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// The normalized URL that was fetched.
    pub url: String,
    /// Host component of `url`.
    pub domain: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub social_media: BTreeMap<SocialPlatform, String>,
    pub status: ScrapeStatus,
}

impl ExtractionResult {
    /// Builds a successful result; the sets become sorted lists here and nowhere else.
    pub fn success(
        url: String,
        domain: String,
        emails: BTreeSet<String>,
        phones: BTreeSet<String>,
        social_media: BTreeMap<SocialPlatform, String>,
        status: ScrapeStatus,
    ) -> Self {
        Self {
            url,
            domain,
            emails: emails.into_iter().collect(),
            phones: phones.into_iter().collect(),
            social_media,
            status,
        }
    }

    /// Builds a result for a target that could not be scraped.
    pub fn failed(url: String, domain: String, reason: impl Into<String>) -> Self {
        Self {
            url,
            domain,
            emails: Vec::new(),
            phones: Vec::new(),
            social_media: BTreeMap::new(),
            status: ScrapeStatus::Error(reason.into()),
        }
    }
}

/// Lifecycle of a batch job.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Initializing,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Initializing => "initializing",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(ScrapeStatus::Success.to_string(), "success");
        assert_eq!(
            ScrapeStatus::SuccessSimple.to_string(),
            "success (simple scraper)"
        );
        assert_eq!(
            ScrapeStatus::Error("timed out".into()).to_string(),
            "Error: timed out"
        );
        assert_eq!(
            ScrapeStatus::from("Error: timed out"),
            ScrapeStatus::Error("timed out".into())
        );
    }

    #[test]
    fn test_result_serializes_lists_and_platform_keys() {
        let mut social = BTreeMap::new();
        social.insert(
            SocialPlatform::Github,
            "https://github.com/acme".to_string(),
        );
        let result = ExtractionResult::success(
            "https://acme.io".into(),
            "acme.io".into(),
            BTreeSet::from(["sales@acme.io".to_string()]),
            BTreeSet::new(),
            social,
            ScrapeStatus::Success,
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["emails"], serde_json::json!(["sales@acme.io"]));
        assert_eq!(json["phones"], serde_json::json!([]));
        assert_eq!(json["social_media"]["github"], "https://github.com/acme");
        assert_eq!(json["status"], "success");
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = ExtractionResult::failed("https://x.test".into(), "x.test".into(), "boom");
        assert!(result.emails.is_empty());
        assert!(result.phones.is_empty());
        assert!(result.social_media.is_empty());
        assert!(!result.status.is_success());
    }

    #[test]
    fn test_target_trims_input() {
        assert_eq!(ScrapeTarget::new("  acme.io \n").as_str(), "acme.io");
    }
}
