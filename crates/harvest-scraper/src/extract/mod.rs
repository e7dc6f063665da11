//! DOM extraction of a LinkedIn profile page into a [`ProfileRecord`].
//!
//! Extraction never fails: a page that yields no name produces a record with
//! status `failed`, and a panic anywhere in the selector walk is caught and
//! reported the same way.

mod counts;
mod selectors;

use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use harvest_core::{
    normalize_profile_url, sanitize_count, EducationEntry, ExperienceEntry, ExtractionStatus,
    ProfileRecord, MAX_CONNECTIONS, MAX_EDUCATION, MAX_EXPERIENCE, MAX_FOLLOWERS, MAX_SKILLS,
};
use scraper::{ElementRef, Html, Selector};

use counts::{classify, parse_count, CountKind};
use selectors::{ListRule, Source, TextField, COUNT_SCAN, EDUCATION, EXPERIENCE, FIELD_RULES, SKILLS};

/// Count snippets longer than this belong to container elements.
const MAX_COUNT_TEXT_LEN: usize = 60;

pub(crate) const NO_NAME_MESSAGE: &str = "profile name not found on page";

/// Extracts a profile from a fully loaded page.
///
/// `url` is recorded on the result, normalized when it is a valid profile
/// URL and kept verbatim otherwise.
#[must_use]
pub fn extract_profile(html: &str, url: &str) -> ProfileRecord {
    match panic::catch_unwind(AssertUnwindSafe(|| extract_document(html, url))) {
        Ok(record) => record,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(url, error = %message, "extractor panicked");
            ProfileRecord::failed(record_url(url), format!("extraction error: {message}"))
        }
    }
}

fn record_url(url: &str) -> String {
    normalize_profile_url(url).unwrap_or_else(|_| url.trim().to_string())
}

fn extract_document(html: &str, url: &str) -> ProfileRecord {
    let document = Html::parse_document(html);
    let mut record = ProfileRecord {
        url: record_url(url),
        extracted_at: Some(Utc::now()),
        ..ProfileRecord::default()
    };

    for rule in FIELD_RULES {
        let value = rule.candidates.iter().find_map(|candidate| {
            select_all(&document, candidate.selector)
                .into_iter()
                .filter_map(|el| read(el, candidate.source))
                .find(|value| (rule.accept)(value))
        });
        let Some(value) = value else { continue };
        match rule.field {
            TextField::Name => record.name = value,
            TextField::BioLine => record.bio_line = Some(value),
            TextField::Location => record.location = Some(value),
            TextField::About => record.about = Some(value),
            TextField::ProfilePicture => record.profile_picture = Some(value),
            TextField::Industry => record.industry = Some(value),
        }
    }
    record.headline.clone_from(&record.bio_line);
    record.bio.clone_from(&record.bio_line);

    let (connections, followers) = extract_counts(&document);
    record.connection_count = sanitize_count(connections, MAX_CONNECTIONS);
    record.follower_count = sanitize_count(followers, MAX_FOLLOWERS);

    record.experience = extract_list(&document, &EXPERIENCE, MAX_EXPERIENCE)
        .into_iter()
        .map(|(title, company)| ExperienceEntry {
            title,
            company: company.map(|c| first_segment(&c)),
        })
        .collect();
    record.education = extract_list(&document, &EDUCATION, MAX_EDUCATION)
        .into_iter()
        .map(|(school, degree)| EducationEntry { school, degree })
        .collect();
    record.skills = extract_skills(&document);

    record.normalize();
    if record.extraction_status == ExtractionStatus::Failed {
        record.extraction_errors = Some(NO_NAME_MESSAGE.to_string());
    }
    record
}

/// Selectors that fail to parse are skipped, not fatal.
fn select_all<'a>(root: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(parsed) => root.select(&parsed).collect(),
        Err(e) => {
            tracing::warn!(selector, error = %e, "skipping unparseable selector");
            Vec::new()
        }
    }
}

fn select_within<'a>(root: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let parsed = Selector::parse(selector).ok()?;
    root.select(&parsed).next()
}

/// Element text with whitespace runs collapsed to single spaces.
fn clean_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn read(el: ElementRef<'_>, source: Source) -> Option<String> {
    let value = match source {
        Source::Text => clean_text(el),
        Source::Attr(name) => el.value().attr(name)?.trim().to_string(),
    };
    (!value.is_empty()).then_some(value)
}

fn extract_counts(document: &Html) -> (u64, u64) {
    let mut connections = None;
    let mut followers = None;
    for el in select_all(document, COUNT_SCAN) {
        if connections.is_some() && followers.is_some() {
            break;
        }
        let text = clean_text(el);
        if text.len() > MAX_COUNT_TEXT_LEN {
            continue;
        }
        let slot = match classify(&text) {
            Some(CountKind::Connections) => &mut connections,
            Some(CountKind::Followers) => &mut followers,
            None => continue,
        };
        if slot.is_none() {
            *slot = parse_count(&text);
        }
    }
    (connections.unwrap_or(0), followers.unwrap_or(0))
}

/// `(primary, secondary)` text pairs from the first item selector that
/// matches anything.
fn extract_list(document: &Html, rule: &ListRule, cap: usize) -> Vec<(String, Option<String>)> {
    let first_text = |item: ElementRef<'_>, candidates: &[&str]| {
        candidates
            .iter()
            .filter_map(|selector| select_within(item, selector))
            .map(clean_text)
            .find(|text| !text.is_empty())
    };

    for selector in rule.items {
        let entries: Vec<_> = select_all(document, selector)
            .into_iter()
            .filter_map(|item| {
                let primary = first_text(item, rule.primary)?;
                Some((primary, first_text(item, rule.secondary)))
            })
            .take(cap)
            .collect();
        if !entries.is_empty() {
            return entries;
        }
    }
    Vec::new()
}

fn extract_skills(document: &Html) -> Vec<String> {
    for selector in SKILLS {
        let skills: Vec<String> = select_all(document, selector)
            .into_iter()
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .collect();
        if !skills.is_empty() {
            // Over-collect so deduplication in `normalize` still fills the cap.
            return skills.into_iter().take(MAX_SKILLS * 2).collect();
        }
    }
    Vec::new()
}

/// "Acme Corp · Full-time" -> "Acme Corp".
fn first_segment(value: &str) -> String {
    value
        .split('·')
        .next()
        .unwrap_or(value)
        .trim()
        .to_string()
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
