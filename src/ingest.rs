//! Raw posting intake: source adapters, normalization, and in-batch dedup

use crate::config::PipelineConfig;
use crate::error::{JobTrackerError, Result};
use crate::posting::{Posting, PostingKey};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Unvalidated record as produced by a scraping adapter. Every field is
/// optional; the normalizer decides what survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPosting {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub searched_city: Option<String>,
    pub searched_role: Option<String>,
    pub job_url: Option<String>,
    pub date_posted: Option<String>,
    pub description: Option<String>,
}

/// Producer of raw posting records. Scraping adapters live outside this
/// core; the pipeline only consumes this interface.
pub trait PostingSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<RawPosting>>;
}

/// Reads scraped records from a JSON file (the output format of the
/// external scraping step).
pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PostingSource for JsonSource {
    fn fetch(&self) -> Result<Vec<RawPosting>> {
        if !self.path.exists() {
            return Err(JobTrackerError::Source(format!(
                "Scraped data file not found: {}",
                self.path.display()
            )));
        }
        let content = std::fs::read_to_string(&self.path)?;
        let records: Vec<RawPosting> = serde_json::from_str(&content)?;
        Ok(records)
    }
}

/// Canonicalizes raw records into deduplicated postings.
pub struct Normalizer {
    target_cities: Vec<String>,
}

impl Normalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            target_cities: config.target_cities.clone(),
        }
    }

    /// Normalize a raw batch into canonical postings keyed by
    /// (title, company, city).
    ///
    /// Records without a title or company are dropped. On in-batch key
    /// collisions the later record wins, except that its null fields never
    /// erase earlier non-null values.
    pub fn normalize_batch(&self, raw: Vec<RawPosting>) -> Vec<Posting> {
        let mut by_key: BTreeMap<PostingKey, Posting> = BTreeMap::new();
        let mut dropped = 0usize;

        for record in raw {
            let Some(posting) = self.normalize_one(record) else {
                dropped += 1;
                continue;
            };

            match by_key.get_mut(&posting.key()) {
                Some(existing) => merge_into(existing, posting),
                None => {
                    by_key.insert(posting.key(), posting);
                }
            }
        }

        if dropped > 0 {
            debug!("Dropped {} raw records missing title or company", dropped);
        }
        by_key.into_values().collect()
    }

    fn normalize_one(&self, record: RawPosting) -> Option<Posting> {
        let title = non_empty(record.title)?;
        let company = non_empty(record.company)?;
        let location = record.location.unwrap_or_default();
        let city = self.normalize_city(record.searched_city.as_deref(), &location);

        let key = PostingKey::new(&title, &company, &city);
        Some(Posting {
            id: key.to_id(),
            title,
            company,
            location,
            city,
            role: record.searched_role.unwrap_or_default(),
            url: record.job_url.unwrap_or_default(),
            date_posted: record.date_posted.as_deref().and_then(parse_date),
            description: record.description.filter(|d| !d.trim().is_empty()),
            skills: Vec::new(),
            embedding: None,
        })
    }

    /// Map a source location string to one of the target cities, or the
    /// catch-all "Unknown" bucket. Matching is case-insensitive substring,
    /// checking the adapter-supplied city first, then the raw location.
    pub fn normalize_city(&self, searched_city: Option<&str>, location: &str) -> String {
        for candidate in [searched_city.unwrap_or(""), location] {
            let folded = candidate.to_lowercase();
            if folded.trim().is_empty() {
                continue;
            }
            for city in &self.target_cities {
                if folded.contains(&city.to_lowercase()) {
                    return city.clone();
                }
            }
        }
        "Unknown".to_string()
    }
}

/// Last-write-wins merge where null never overwrites non-null.
fn merge_into(existing: &mut Posting, newer: Posting) {
    if !newer.location.is_empty() {
        existing.location = newer.location;
    }
    if !newer.role.is_empty() {
        existing.role = newer.role;
    }
    if !newer.url.is_empty() {
        existing.url = newer.url;
    }
    if newer.date_posted.is_some() {
        existing.date_posted = newer.date_posted;
    }
    if newer.description.is_some() {
        existing.description = newer.description;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Best-effort posting date parsing: plain ISO dates first, then ISO
/// datetimes with the time part dropped.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .ok()
}
