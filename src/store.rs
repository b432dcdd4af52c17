//! Durable posting store: upsert-by-key with a JSON document file backend

use crate::error::{JobTrackerError, Result};
use crate::posting::{Posting, PostingKey};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Result of pushing a normalized batch into the store. `new_keys` is the
/// side channel the change detector consumes: identity keys that did not
/// exist before this run.
#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    pub new_keys: Vec<PostingKey>,
    pub updated: usize,
    pub total: usize,
}

/// Key-value posting store with upsert-by-identity-key semantics.
///
/// The persistence transport is out of scope; this trait is the whole
/// surface the pipeline relies on.
pub trait JobStore: Send + Sync {
    /// All postings currently persisted, in stable key order.
    fn load_all(&self) -> Result<Vec<Posting>>;

    /// Upsert a batch: an existing identity key is refreshed field-by-field
    /// (its stored embedding survives re-tagging); a new key inserts.
    fn upsert_batch(&self, postings: &[Posting]) -> Result<UpsertOutcome>;

    /// Persist embeddings for the given posting ids as one all-or-nothing
    /// step.
    fn save_embeddings(&self, updates: &[(String, Vec<f32>)]) -> Result<()>;
}

/// JSON-file-backed store. The whole document set is held in memory and
/// rewritten on mutation via write-to-temp-then-rename, so readers of the
/// file never observe a half-written dataset.
pub struct JsonStore {
    path: PathBuf,
    postings: Mutex<BTreeMap<PostingKey, Posting>>,
}

impl JsonStore {
    /// Open the store, loading any existing data file.
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut postings = BTreeMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let loaded: Vec<Posting> = serde_json::from_str(&content)?;
            for posting in loaded {
                postings.insert(posting.key(), posting);
            }
            info!("Loaded {} postings from {}", postings.len(), path.display());
        } else {
            debug!("No existing store at {}; starting empty", path.display());
        }

        Ok(Self {
            path,
            postings: Mutex::new(postings),
        })
    }

    fn persist(&self, postings: &BTreeMap<PostingKey, Posting>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let values: Vec<&Posting> = postings.values().collect();
        let content = serde_json::to_string_pretty(&values)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<PostingKey, Posting>>> {
        self.postings
            .lock()
            .map_err(|_| JobTrackerError::Store("Store lock poisoned".to_string()))
    }
}

impl JobStore for JsonStore {
    fn load_all(&self) -> Result<Vec<Posting>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn upsert_batch(&self, batch: &[Posting]) -> Result<UpsertOutcome> {
        let mut postings = self.lock()?;
        let mut outcome = UpsertOutcome::default();

        for posting in batch {
            let key = posting.key();
            match postings.get_mut(&key) {
                Some(existing) => {
                    let embedding = existing.embedding.take();
                    *existing = posting.clone();
                    existing.embedding = embedding;
                    outcome.updated += 1;
                }
                None => {
                    outcome.new_keys.push(key.clone());
                    postings.insert(key, posting.clone());
                }
            }
        }

        outcome.total = postings.len();
        self.persist(&postings)?;
        Ok(outcome)
    }

    fn save_embeddings(&self, updates: &[(String, Vec<f32>)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut postings = self.lock()?;
        for (id, embedding) in updates {
            if let Some(posting) = postings.values_mut().find(|p| &p.id == id) {
                posting.embedding = Some(embedding.clone());
            }
        }
        self.persist(&postings)
    }
}
