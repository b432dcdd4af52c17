//! Core data model: postings, identity keys, subscriptions, and snapshots

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A normalized, deduplicated job listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Stable identifier derived from the identity key
    pub id: String,
    pub title: String,
    pub company: String,
    /// Raw location string from the source
    pub location: String,
    /// Normalized city ("Unknown" when no target city matched)
    pub city: String,
    /// Role keyword the posting was found under
    pub role: String,
    pub url: String,
    pub date_posted: Option<NaiveDate>,
    pub description: Option<String>,
    /// Canonical skill names detected in the posting text
    #[serde(default)]
    pub skills: Vec<String>,
    /// Fixed-dimension vector, populated by the embedding sweep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Dedup/upsert identity: casefolded (title, company, city).
///
/// Display fields keep their original casing; only the key is folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostingKey {
    pub title: String,
    pub company: String,
    pub city: String,
}

impl PostingKey {
    pub fn new(title: &str, company: &str, city: &str) -> Self {
        Self {
            title: title.trim().to_lowercase(),
            company: company.trim().to_lowercase(),
            city: city.trim().to_lowercase(),
        }
    }

    /// Hex posting id from the FNV-1a hash of the key triple.
    pub fn to_id(&self) -> String {
        let mut hash = fnv1a64(self.title.as_bytes(), FNV_OFFSET);
        hash = fnv1a64(b"|", hash);
        hash = fnv1a64(self.company.as_bytes(), hash);
        hash = fnv1a64(b"|", hash);
        hash = fnv1a64(self.city.as_bytes(), hash);
        format!("{:016x}", hash)
    }
}

impl Posting {
    pub fn key(&self) -> PostingKey {
        PostingKey::new(&self.title, &self.company, &self.city)
    }

    /// Text the subscription change detector matches keywords against.
    pub fn digest_text(&self) -> String {
        let mut parts = vec![
            self.title.clone(),
            self.company.clone(),
            self.role.clone(),
        ];
        parts.extend(self.skills.iter().cloned());
        parts.join(" ").to_lowercase()
    }
}

/// A (email, keyword) alert registration, consumed read-only by the
/// change detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub email: String,
    pub keyword: String,
}

/// Immutable view of the dataset served to all read endpoints.
///
/// A new snapshot is published atomically at the end of a successful
/// pipeline run; readers never observe a half-updated dataset.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub postings: Vec<Posting>,
    pub version: u64,
}

impl Snapshot {
    pub fn new(postings: Vec<Posting>, version: u64) -> Arc<Self> {
        Arc::new(Self { postings, version })
    }

    pub fn find(&self, id: &str) -> Option<&Posting> {
        self.postings.iter().find(|p| p.id == id)
    }
}

pub(crate) const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a over a byte slice, continuing from a running hash state.
pub(crate) fn fnv1a64(bytes: &[u8], mut state: u64) -> u64 {
    for byte in bytes {
        state ^= u64::from(*byte);
        state = state.wrapping_mul(FNV_PRIME);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_casefolds_and_trims() {
        let a = PostingKey::new(" Data Engineer ", "ACME", "Casablanca");
        let b = PostingKey::new("data engineer", "acme", "CASABLANCA");
        assert_eq!(a, b);
        assert_eq!(a.to_id(), b.to_id());
    }

    #[test]
    fn test_distinct_keys_get_distinct_ids() {
        let a = PostingKey::new("Data Engineer", "ACME", "Casablanca");
        let b = PostingKey::new("Data Engineer", "ACME", "Rabat");
        assert_ne!(a.to_id(), b.to_id());
    }

    #[test]
    fn test_digest_text_includes_skills() {
        let posting = Posting {
            id: "x".to_string(),
            title: "Backend Developer".to_string(),
            company: "ACME".to_string(),
            location: "Rabat, Morocco".to_string(),
            city: "Rabat".to_string(),
            role: "Data Engineer".to_string(),
            url: String::new(),
            date_posted: None,
            description: None,
            skills: vec!["React".to_string()],
            embedding: None,
        };
        let text = posting.digest_text();
        assert!(text.contains("react"));
        assert!(text.contains("backend developer"));
    }
}
