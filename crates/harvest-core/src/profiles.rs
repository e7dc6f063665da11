//! The profile record shared by the extractor, the API client, and the
//! backend store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::CoreError;

/// Connection counts above this are scraping artifacts, not real counts.
pub const MAX_CONNECTIONS: u64 = 100_000;
/// Follower counts above this are scraping artifacts, not real counts.
pub const MAX_FOLLOWERS: u64 = 50_000_000;
pub const MAX_EXPERIENCE: usize = 5;
pub const MAX_EDUCATION: usize = 5;
pub const MAX_SKILLS: usize = 15;

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    #[default]
    Pending,
    Success,
    Partial,
    Failed,
}

impl ExtractionStatus {
    pub const ALL: [ExtractionStatus; 4] = [
        ExtractionStatus::Pending,
        ExtractionStatus::Success,
        ExtractionStatus::Partial,
        ExtractionStatus::Failed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::Success => "success",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExtractionStatus::Pending),
            "success" => Ok(ExtractionStatus::Success),
            "partial" => Ok(ExtractionStatus::Partial),
            "failed" => Ok(ExtractionStatus::Failed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub school: String,
    #[serde(default)]
    pub degree: Option<String>,
}

/// A scraped LinkedIn profile.
///
/// Every field except `name` and `url` is optional on the wire; missing
/// required fields surface as validation errors rather than parse errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileRecord {
    pub name: String,
    pub url: String,
    pub about: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub follower_count: u32,
    pub connection_count: u32,
    pub bio_line: Option<String>,
    pub headline: Option<String>,
    pub industry: Option<String>,
    pub profile_picture: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<String>,
    pub extraction_status: ExtractionStatus,
    pub extraction_errors: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    /// A record for a page the extractor could not read at all.
    #[must_use]
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extraction_status: ExtractionStatus::Failed,
            extraction_errors: Some(message.into()),
            extracted_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Trims text fields, drops empty optionals, resets implausible counts,
    /// caps list lengths, deduplicates skills, and recomputes
    /// `extraction_status`.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.url = self.url.trim().to_string();
        for field in [
            &mut self.about,
            &mut self.bio,
            &mut self.location,
            &mut self.bio_line,
            &mut self.headline,
            &mut self.industry,
            &mut self.profile_picture,
            &mut self.extraction_errors,
        ] {
            *field = clean_optional(field.take());
        }
        self.connection_count = sanitize_count(u64::from(self.connection_count), MAX_CONNECTIONS);
        self.follower_count = sanitize_count(u64::from(self.follower_count), MAX_FOLLOWERS);

        self.experience.retain(|e| !e.title.trim().is_empty());
        self.experience.truncate(MAX_EXPERIENCE);
        self.education.retain(|e| !e.school.trim().is_empty());
        self.education.truncate(MAX_EDUCATION);
        self.skills = dedup_skills(std::mem::take(&mut self.skills));

        self.recompute_status();
    }

    /// Derives `extraction_status` from the record's completeness.
    pub fn recompute_status(&mut self) {
        self.extraction_status = derive_status(
            &self.name,
            self.bio_line.as_deref(),
            self.location.as_deref(),
        );
    }

    /// Checks the fields the store refuses to persist without.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation {
                field: "name",
                reason: "name is required".to_string(),
            });
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(CoreError::Validation {
                field: "name",
                reason: format!("name must be at most {MAX_NAME_LEN} characters"),
            });
        }
        if self.url.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "url",
                reason: "url is required".to_string(),
            });
        }
        normalize_profile_url(&self.url).map_err(|e| CoreError::Validation {
            field: "url",
            reason: e.to_string(),
        })?;
        if let Some(picture) = self.profile_picture.as_deref() {
            if Url::parse(picture).is_err() {
                return Err(CoreError::Validation {
                    field: "profilePicture",
                    reason: format!("'{picture}' is not a valid URL"),
                });
            }
        }
        Ok(())
    }
}

/// `failed` without a name; `partial` with a name but neither bio line nor
/// location; `success` otherwise.
#[must_use]
pub fn derive_status(name: &str, bio_line: Option<&str>, location: Option<&str>) -> ExtractionStatus {
    let present = |v: Option<&str>| v.is_some_and(|s| !s.trim().is_empty());
    if name.trim().is_empty() {
        ExtractionStatus::Failed
    } else if !present(bio_line) && !present(location) {
        ExtractionStatus::Partial
    } else {
        ExtractionStatus::Success
    }
}

/// Resets implausible counts to zero.
#[must_use]
pub fn sanitize_count(value: u64, ceiling: u64) -> u32 {
    if value > ceiling {
        0
    } else {
        u32::try_from(value).unwrap_or(0)
    }
}

/// Canonical form of a profile URL: `https://<host>/in/<slug>`.
///
/// The host and slug are lowercased and a leading `www.` is dropped, so
/// every spelling of one profile maps to one string. Query string,
/// fragment, and any path below the slug are discarded.
///
/// # Errors
///
/// Returns [`CoreError::InvalidProfileUrl`] when the input is not an
/// absolute LinkedIn URL with an `/in/<slug>` path.
pub fn normalize_profile_url(raw: &str) -> Result<String, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidProfileUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(raw.trim()).map_err(|_| invalid("not an absolute URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }

    let host = parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| invalid("missing host"))?;
    let host = host.strip_prefix("www.").unwrap_or(host.as_str()).to_string();
    if host != "linkedin.com" && !host.ends_with(".linkedin.com") {
        return Err(invalid("host must be linkedin.com"));
    }

    let mut segments = parsed
        .path_segments()
        .ok_or_else(|| invalid("missing path"))?
        .filter(|s| !s.is_empty());
    if segments.next() != Some("in") {
        return Err(invalid("path must start with /in/"));
    }
    let slug = segments
        .next()
        .ok_or_else(|| invalid("missing profile slug"))?
        .to_lowercase();

    Ok(format!("https://{host}/in/{slug}"))
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn dedup_skills(skills: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(MAX_SKILLS)
        .collect()
}

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;
