// crates/pipeline/src/driver.rs
//! The pipeline driver: pulls raw items in id order, runs cleanup and
//! categorization, optionally refines and classifies through the LLM
//! layer, groups, dedups against persisted state, and commits batches
//! atomically with a checkpoint after every commit.
//!
//! State machine per run:
//!
//! ```text
//! init -> loading -> grouping -> [flushing <-> checkpointing] -> finalizing -> done
//!                       |                                            |
//!                       '------------- on fatal error ------------ failed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nomenorm_core::{
    extract, HierarchicalClassifier, LlmCoordinator, PipelineConfig, PatternDetector,
    RuleCategorizer, StatsCollector, FALLBACK_CATEGORY,
};
use nomenorm_db::{Database, DbError, RawTableSpec};
use nomenorm_types::{AttributeTriple, Checkpoint, GroupKey, NormalizedItem, RawItem};

use crate::checkpoint::CheckpointManager;
use crate::dedup::{DuplicateScorer, LexicalScorer, DUPLICATE_THRESHOLD};
use crate::grouping::{build_canonical, AiRefinement, GroupValue, GroupingEngine};
use crate::progress::ProgressSender;
use crate::refine::refine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Loading,
    Grouping,
    Flushing,
    Checkpointing,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Loading => "loading",
            Self::Grouping => "grouping",
            Self::Flushing => "flushing",
            Self::Checkpointing => "checkpointing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Db(#[from] DbError),

    #[error("run cancelled")]
    Cancelled,
}

/// Final figures for one completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub upload_id: String,
    /// Raw rows processed to completion this run (including the resumed
    /// prefix of an interrupted earlier run).
    pub processed: u64,
    /// New canonical rows inserted.
    pub persisted: u64,
    /// Source rows folded into already-persisted canonical rows.
    pub merged_duplicates: u64,
    /// Groups flushed over the whole run.
    pub groups: u64,
    pub duration_ms: u64,
    /// `Some(n)` when the run resumed from a checkpoint at n processed.
    pub resumed_from: Option<u64>,
}

pub struct PipelineDriver {
    db: Database,
    config: PipelineConfig,
    stats: StatsCollector,
    categorizer: RuleCategorizer,
    detector: PatternDetector,
    scorer: Box<dyn DuplicateScorer>,
    coordinator: Option<Arc<LlmCoordinator>>,
    classifier: Option<Arc<HierarchicalClassifier>>,
    checkpoints: CheckpointManager,
    progress: ProgressSender,
    cancel: CancellationToken,
    state: PipelineState,
}

impl PipelineDriver {
    pub fn new(db: Database, config: PipelineConfig) -> Self {
        let checkpoints =
            CheckpointManager::new(config.checkpoints.dir.clone(), config.checkpoints.enabled);
        Self {
            db,
            config,
            stats: StatsCollector::new(),
            categorizer: RuleCategorizer::with_defaults(),
            detector: PatternDetector::new(),
            scorer: Box::new(LexicalScorer),
            coordinator: None,
            classifier: None,
            checkpoints,
            progress: ProgressSender::disabled(),
            cancel: CancellationToken::new(),
            state: PipelineState::Init,
        }
    }

    /// Attach the LLM layer (refinement coordinator + classifier walker).
    pub fn with_ai(
        mut self,
        coordinator: Arc<LlmCoordinator>,
        classifier: Arc<HierarchicalClassifier>,
    ) -> Self {
        self.coordinator = Some(coordinator);
        self.classifier = Some(classifier);
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_categorizer(mut self, categorizer: RuleCategorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn with_scorer(mut self, scorer: Box<dyn DuplicateScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn stats(&self) -> StatsCollector {
        self.stats.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = self.state.as_str(), to = next.as_str(), "pipeline state");
        self.state = next;
    }

    /// Run the whole pipeline for one upload. Fatal store errors (and
    /// cancellation) end in `Failed`; everything else ends in `Done`.
    pub async fn run(
        &mut self,
        upload_id: &str,
        spec: &RawTableSpec,
    ) -> Result<RunSummary, PipelineError> {
        match self.run_inner(upload_id, spec).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.stats.record_error("pipeline_fatal", err.to_string());
                self.transition(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn run_inner(
        &mut self,
        upload_id: &str,
        spec: &RawTableSpec,
    ) -> Result<RunSummary, PipelineError> {
        let t0 = std::time::Instant::now();
        self.transition(PipelineState::Loading);

        let total = self.db.count_raw_items(spec).await?;
        let mut checkpoint = self
            .checkpoints
            .load(upload_id)
            .unwrap_or_else(|| Checkpoint::new(upload_id, total, self.config.batch_size));
        checkpoint.total_count = total;
        let resumed_from = if checkpoint.processed_count > 0 {
            info!(
                upload_id,
                processed = checkpoint.processed_count,
                last_id = checkpoint.last_processed_id,
                "resuming from checkpoint"
            );
            Some(checkpoint.processed_count)
        } else {
            None
        };

        let mut grouping = GroupingEngine::new();
        let mut processed = checkpoint.processed_count;
        let mut after_id = checkpoint.last_processed_id;
        let mut persisted: u64 = 0;
        let mut merged: u64 = 0;
        let mut groups_flushed: u64 = 0;

        self.transition(PipelineState::Grouping);
        loop {
            let page = self
                .db
                .fetch_raw_page(spec, after_id, self.config.batch_size as i64)
                .await?;
            if page.is_empty() {
                break;
            }

            for raw in page {
                if self.cancel.is_cancelled() {
                    // Graceful shutdown: persist the last committed position.
                    checkpoint.last_save_time = chrono::Utc::now();
                    if let Err(err) = self.checkpoints.save(&checkpoint) {
                        warn!(error = %err, "final checkpoint write failed");
                        self.stats.record_error("checkpoint_write", err.to_string());
                    }
                    self.progress.emit(format!("run {upload_id} cancelled"));
                    return Err(PipelineError::Cancelled);
                }

                after_id = raw.id;
                self.process_one(raw, &mut grouping).await;
                processed += 1;

                if grouping.pending_items() >= self.config.batch_size as u64 {
                    let flushed = self
                        .flush_and_checkpoint(
                            &mut grouping,
                            &mut checkpoint,
                            processed,
                            after_id,
                        )
                        .await?;
                    persisted += flushed.persisted;
                    merged += flushed.merged;
                    groups_flushed += flushed.groups;
                    self.transition(PipelineState::Grouping);
                }
            }
        }

        self.transition(PipelineState::Finalizing);
        let flushed = self
            .flush_and_checkpoint(&mut grouping, &mut checkpoint, processed, after_id)
            .await?;
        persisted += flushed.persisted;
        merged += flushed.merged;
        groups_flushed += flushed.groups;

        self.checkpoints.delete(upload_id);
        self.transition(PipelineState::Done);

        let summary = RunSummary {
            upload_id: upload_id.to_string(),
            processed,
            persisted,
            merged_duplicates: merged,
            groups: groups_flushed,
            duration_ms: t0.elapsed().as_millis() as u64,
            resumed_from,
        };
        info!(
            upload_id,
            processed = summary.processed,
            persisted = summary.persisted,
            merged = summary.merged_duplicates,
            duration_ms = summary.duration_ms,
            "pipeline run finished"
        );
        self.progress.emit(format!(
            "run {upload_id} finished: {} processed, {} persisted, {} merged",
            summary.processed, summary.persisted, summary.merged_duplicates
        ));
        Ok(summary)
    }

    /// C1 -> C2 -> (optional C4 refinement) -> grouping (-> C5 on a new
    /// group). LLM failures downgrade the item to rule-only processing.
    async fn process_one(&self, raw: RawItem, grouping: &mut GroupingEngine) {
        let t0 = std::time::Instant::now();

        // Strip junk patterns (technical codes, article refs, runaway
        // punctuation) before extraction. Dimension spans stay: they are
        // data, and the attribute extractor owns them.
        let matches: Vec<_> = self
            .detector
            .detect(&raw.name)
            .into_iter()
            .filter(|m| m.rule_type != "embedded_dimension")
            .collect();
        let cleaned = if matches.iter().any(|m| m.auto_fixable) {
            self.detector.apply_fixes(&raw.name, &matches)
        } else {
            raw.name.clone()
        };

        let extraction = extract(&cleaned);
        let mut normalized_name = extraction.base_name;
        let mut category = self.categorizer.categorize(&normalized_name).to_string();
        let mut ai: Option<AiRefinement> = None;

        if let Some(coordinator) = &self.coordinator {
            if category == FALLBACK_CATEGORY && !normalized_name.is_empty() {
                match refine(coordinator, &normalized_name).await {
                    Ok(Some(refinement))
                        if refinement.confidence >= self.config.ai.min_confidence =>
                    {
                        normalized_name = refinement.normalized_name.clone();
                        category = refinement.category.clone();
                        ai = Some(refinement);
                    }
                    Ok(Some(refinement)) => {
                        tracing::debug!(
                            confidence = refinement.confidence,
                            "ai refinement below min_confidence, keeping rule result"
                        );
                    }
                    Ok(None) => {
                        self.stats
                            .record_error("ai_invalid_response", "unparseable refinement reply");
                    }
                    Err(err) => {
                        // Already counted by the coordinator; rule-only fallback.
                        tracing::debug!(error = %err, "ai refinement failed, keeping rule result");
                    }
                }
            }
        }

        let key = GroupKey::new(category, normalized_name);
        let is_new = grouping.insert(key.clone(), raw, extraction.attributes, ai);

        if is_new && !key.normalized_name.is_empty() {
            if let Some(classifier) = &self.classifier {
                let outcome = classifier.classify(&key.normalized_name, &key.category).await;
                grouping.assign_classification(&key, outcome, self.config.ai.min_confidence);
            }
        }

        self.stats.record_item(t0.elapsed());
    }

    async fn flush_and_checkpoint(
        &mut self,
        grouping: &mut GroupingEngine,
        checkpoint: &mut Checkpoint,
        processed: u64,
        last_id: i64,
    ) -> Result<FlushOutcome, PipelineError> {
        self.transition(PipelineState::Flushing);

        let drained = grouping.drain();
        let groups = drained.len() as u64;
        let mut outgoing: Vec<(NormalizedItem, &GroupValue)> = Vec::with_capacity(drained.len());
        for (key, value) in &drained {
            if let Some(item) = build_canonical(key, value) {
                outgoing.push((item, value));
            }
        }

        // Dedup against persisted canonical rows. Increments land before
        // the insert transaction: if we crash in between, the folded state
        // is already authoritative and the dropped rows are re-derivable.
        let mut merged: u64 = 0;
        if !outgoing.is_empty() {
            let names: Vec<String> = outgoing
                .iter()
                .map(|(item, _)| item.normalized_name.clone())
                .collect();
            let existing = self.db.find_by_normalized_names(&names).await?;
            if !existing.is_empty() {
                let mut surviving = Vec::with_capacity(outgoing.len());
                for (item, value) in outgoing {
                    let best = existing
                        .iter()
                        .map(|persisted| (persisted.id, self.scorer.score(&item, &persisted.item)))
                        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                    match best {
                        Some((id, score)) if score >= DUPLICATE_THRESHOLD => {
                            self.db
                                .increment_merged_count_by(id, item.merged_count)
                                .await?;
                            merged += item.merged_count as u64;
                        }
                        _ => surviving.push((item, value)),
                    }
                }
                outgoing = surviving;
            }
        }

        let mut batch: Vec<NormalizedItem> = Vec::with_capacity(outgoing.len());
        let mut attributes_by_code: HashMap<String, Vec<AttributeTriple>> = HashMap::new();
        for (item, value) in outgoing {
            self.stats.record_tier(item.processing_level);
            batch.push(item);
            for (code, attributes) in &value.attributes_by_code {
                attributes_by_code
                    .entry(code.clone())
                    .or_default()
                    .extend(attributes.iter().cloned());
            }
        }

        let persisted = self
            .db
            .insert_normalized_with_attributes(&batch, &attributes_by_code)
            .await?;

        self.transition(PipelineState::Checkpointing);
        checkpoint.processed_count = processed;
        checkpoint.last_processed_id = last_id;
        checkpoint.last_save_time = chrono::Utc::now();
        if let Err(err) = self.checkpoints.save(checkpoint) {
            // Best-effort: progress is recoverable by rescanning.
            warn!(error = %err, "checkpoint write failed, continuing");
            self.stats.record_error("checkpoint_write", err.to_string());
        }

        self.progress.emit(format!(
            "processed {}/{} ({} persisted, {} merged)",
            processed, checkpoint.total_count, persisted, merged
        ));

        Ok(FlushOutcome {
            persisted,
            merged,
            groups,
        })
    }
}

struct FlushOutcome {
    persisted: u64,
    merged: u64,
    groups: u64,
}
