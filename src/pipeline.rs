//! Pipeline orchestration: fetch, normalize, tag, embed, publish, notify

use crate::config::{EmbeddingConfig, PipelineConfig};
use crate::embedding::{Embedder, EmbeddingGenerator};
use crate::error::{JobTrackerError, Result};
use crate::ingest::{Normalizer, PostingSource};
use crate::posting::{Posting, Snapshot, Subscription};
use crate::skills::SkillTagger;
use crate::store::JobStore;
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Phase the pipeline is currently in. Observability only; control flow
/// never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Ingesting,
    Tagging,
    Embedding,
    Persisted,
    Diffing,
}

/// Summary of one completed pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub normalized: usize,
    pub new_postings: usize,
    pub updated: usize,
    pub embedded: usize,
    pub failed_embedding_batches: usize,
    pub snapshot_version: u64,
    pub digests: Vec<DigestSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestSummary {
    pub email: String,
    pub keyword: String,
    pub matched: usize,
    pub delivered: usize,
}

/// Digest of new postings matching one subscription. `matched_total` may
/// exceed `postings.len()` when the delivery cap truncated the list.
#[derive(Debug, Clone)]
pub struct Digest {
    pub email: String,
    pub keyword: String,
    pub postings: Vec<Posting>,
    pub matched_total: usize,
}

/// Delivery channel for subscription digests. Delivery transport is
/// pluggable; a failed delivery never fails the run.
pub trait Notifier: Send + Sync {
    fn send_digest(&self, digest: &Digest) -> Result<()>;
}

/// Writes digests to the log instead of delivering them anywhere.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_digest(&self, digest: &Digest) -> Result<()> {
        info!(
            "Digest for {}: {} new posting(s) matching '{}' ({} delivered)",
            digest.email,
            digest.matched_total,
            digest.keyword,
            digest.postings.len()
        );
        for posting in &digest.postings {
            info!("  {} at {} ({})", posting.title, posting.company, posting.city);
        }
        Ok(())
    }
}

/// Load subscriptions from a JSON file. A missing file is an empty list,
/// not an error.
pub fn load_subscriptions(path: &Path) -> Result<Vec<Subscription>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let subscriptions: Vec<Subscription> = serde_json::from_str(&content)?;
    Ok(subscriptions)
}

/// The end-to-end sync pipeline. Holds the published snapshot that search
/// and analytics read; a run builds a fresh snapshot and swaps it in only
/// after every persistence step succeeded.
pub struct Pipeline {
    source: Arc<dyn PostingSource>,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    tagger: SkillTagger,
    normalizer: Normalizer,
    generator: EmbeddingGenerator,
    subscriptions: Vec<Subscription>,
    config: PipelineConfig,
    snapshot: RwLock<Arc<Snapshot>>,
    state: Mutex<RunState>,
    running: AtomicBool,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn PostingSource>,
        store: Arc<dyn JobStore>,
        embedder: Arc<dyn Embedder>,
        notifier: Arc<dyn Notifier>,
        subscriptions: Vec<Subscription>,
        config: PipelineConfig,
        embedding_config: &EmbeddingConfig,
    ) -> Result<Self> {
        let tagger = SkillTagger::new()?;
        let normalizer = Normalizer::new(&config);
        let generator =
            EmbeddingGenerator::new(embedder, store.clone(), embedding_config.batch_size);

        // Seed the snapshot from whatever the store already holds, so
        // search works before the first run of this process
        let postings = store.load_all()?;
        let snapshot = Arc::new(Snapshot {
            postings,
            version: 0,
        });

        Ok(Self {
            source,
            store,
            notifier,
            tagger,
            normalizer,
            generator,
            subscriptions,
            config,
            snapshot: RwLock::new(snapshot),
            state: Mutex::new(RunState::Idle),
            running: AtomicBool::new(false),
        })
    }

    /// The currently published snapshot. Cheap to call; the Arc is cloned,
    /// never the postings.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            // A poisoned lock still holds a valid snapshot
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(RunState::Idle)
    }

    fn set_state(&self, state: RunState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    /// Execute one full sync run. Rejected with `PipelineAlreadyRunning`
    /// while another run is in flight. On failure the previously published
    /// snapshot stays in place.
    pub async fn run(&self) -> Result<RunReport> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JobTrackerError::PipelineAlreadyRunning);
        }
        let _guard = RunGuard(self);

        let result = self.run_inner().await;
        self.set_state(RunState::Idle);
        result
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        self.set_state(RunState::Ingesting);
        let raw = self.fetch_with_timeout().await?;
        report.fetched = raw.len();
        info!("Fetched {} raw records", report.fetched);

        let mut postings = self.normalizer.normalize_batch(raw);
        report.normalized = postings.len();

        self.set_state(RunState::Tagging);
        for posting in &mut postings {
            let text = SkillTagger::posting_text(
                &posting.title,
                posting.description.as_deref(),
                &posting.role,
            );
            posting.skills = self.tagger.tag(&text);
        }

        self.set_state(RunState::Embedding);
        let outcome = self.store.upsert_batch(&postings)?;
        report.new_postings = outcome.new_keys.len();
        report.updated = outcome.updated;
        info!(
            "Upserted batch: {} new, {} updated, {} total",
            report.new_postings, report.updated, outcome.total
        );

        let sweep = self.generator.sweep()?;
        report.embedded = sweep.embedded;
        report.failed_embedding_batches = sweep.failed_batches;

        // Publish: build the new snapshot fully, then swap the Arc
        self.set_state(RunState::Persisted);
        let published = {
            let postings = self.store.load_all()?;
            let previous = self.snapshot();
            let next = Arc::new(Snapshot {
                postings,
                version: previous.version + 1,
            });
            match self.snapshot.write() {
                Ok(mut guard) => *guard = next.clone(),
                Err(poisoned) => *poisoned.into_inner() = next.clone(),
            }
            next
        };
        report.snapshot_version = published.version;

        self.set_state(RunState::Diffing);
        report.digests = self.notify(&published, &outcome.new_keys);

        Ok(report)
    }

    async fn fetch_with_timeout(&self) -> Result<Vec<crate::ingest::RawPosting>> {
        let source = self.source.clone();
        let timeout = Duration::from_secs(self.config.source_timeout_secs);

        let handle = tokio::task::spawn_blocking(move || source.fetch());
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(JobTrackerError::Source(format!(
                "Source task failed: {}",
                join_error
            ))),
            Err(_) => Err(JobTrackerError::Source(format!(
                "Source timed out after {}s",
                self.config.source_timeout_secs
            ))),
        }
    }

    /// Match this run's new postings against subscriptions and send one
    /// capped digest per subscription with matches.
    fn notify(&self, snapshot: &Snapshot, new_keys: &[crate::posting::PostingKey]) -> Vec<DigestSummary> {
        if self.subscriptions.is_empty() || new_keys.is_empty() {
            return Vec::new();
        }

        let new_postings: Vec<&Posting> = snapshot
            .postings
            .iter()
            .filter(|p| new_keys.contains(&p.key()))
            .collect();

        let mut summaries = Vec::new();
        for subscription in &self.subscriptions {
            let keyword = subscription.keyword.trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }

            let matched: Vec<&Posting> = new_postings
                .iter()
                .copied()
                .filter(|p| p.digest_text().contains(&keyword))
                .collect();
            if matched.is_empty() {
                continue;
            }

            let matched_total = matched.len();
            let digest = Digest {
                email: subscription.email.clone(),
                keyword: subscription.keyword.clone(),
                postings: matched
                    .into_iter()
                    .take(self.config.digest_cap)
                    .cloned()
                    .collect(),
                matched_total,
            };
            let delivered = digest.postings.len();

            if let Err(e) = self.notifier.send_digest(&digest) {
                warn!("Digest delivery to {} failed: {}", subscription.email, e);
                continue;
            }
            summaries.push(DigestSummary {
                email: subscription.email.clone(),
                keyword: subscription.keyword.clone(),
                matched: matched_total,
                delivered,
            });
        }
        summaries
    }

    /// Run on a fixed interval until the process is stopped. A failed run
    /// is logged and the next tick proceeds as usual.
    pub async fn watch(&self) -> Result<()> {
        let period = Duration::from_secs(self.config.sync_interval_minutes.max(1) * 60);
        let mut ticker = tokio::time::interval(period);

        loop {
            ticker.tick().await;
            match self.run().await {
                Ok(report) => info!(
                    "Sync complete: {} new, {} updated, snapshot v{}",
                    report.new_postings, report.updated, report.snapshot_version
                ),
                Err(e) => warn!("Sync run failed: {}", e),
            }
        }
    }
}

struct RunGuard<'a>(&'a Pipeline);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}
