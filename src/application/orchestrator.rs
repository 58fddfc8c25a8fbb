// ============================================================
// Layer 2 - Scoring Orchestrator
// ============================================================
// Groups features into batches of `batch_size`, calls the
// scorer once per batch and writes one ScoredResult per
// candidate before moving on to the next batch.
//
// Batches are cut in generation order, so results leave in
// increasing unique_id order without any reordering buffer.
//
// If the scorer only reports one loss for a whole batch, that
// value is attached to every candidate of the batch. With
// batch_size > 1 this is an approximation and is logged once.
//
// A NaN loss (nothing left to score, or a broken model) is
// written as `"loss":null` with a warning.

use std::io::Write;

use crate::data::writer::ResultWriter;
use crate::domain::candidate::Candidate;
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::feature::Feature;
use crate::domain::result::ScoredResult;
use crate::domain::traits::{BatchLoss, Scorer};

pub struct ScoringOrchestrator<'s, S: Scorer + ?Sized> {
    scorer:     &'s S,
    batch_size: usize,
}

impl<'s, S: Scorer + ?Sized> ScoringOrchestrator<'s, S> {
    pub fn new(scorer: &'s S, batch_size: usize) -> PipelineResult<Self> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch size must be at least 1"));
        }
        Ok(Self { scorer, batch_size })
    }

    /// Score every feature and stream the results to `writer`.
    /// Returns the number of batches sent to the scorer.
    pub fn run<W: Write>(
        &self,
        candidates: &[Candidate],
        features:   &[Feature],
        writer:     &mut ResultWriter<W>,
    ) -> PipelineResult<usize> {
        if candidates.len() != features.len() {
            return Err(PipelineError::scorer(format!(
                "{} candidates but {} features",
                candidates.len(),
                features.len()
            )));
        }
        for (c, f) in candidates.iter().zip(features) {
            if c.unique_id != f.unique_id {
                return Err(PipelineError::encoding(c.unique_id, format!(
                    "feature {} is out of step with its candidate",
                    f.unique_id
                )));
            }
        }

        let mut batches = 0;
        let mut warned_aggregate = false;

        for (cands, feats) in candidates.chunks(self.batch_size).zip(features.chunks(self.batch_size)) {
            let losses = match self.scorer.score(feats)? {
                BatchLoss::PerExample(losses) => {
                    if losses.len() != feats.len() {
                        return Err(PipelineError::scorer(format!(
                            "scorer returned {} losses for a batch of {} (first candidate {})",
                            losses.len(),
                            feats.len(),
                            feats[0].unique_id
                        )));
                    }
                    losses
                }
                BatchLoss::Aggregate(loss) => {
                    if feats.len() > 1 && !warned_aggregate {
                        tracing::warn!(
                            "Scorer reports one loss per batch; every candidate in a batch of {} \
                             shares it. Use batch size 1 for per-candidate scores.",
                            feats.len()
                        );
                        warned_aggregate = true;
                    }
                    vec![loss; feats.len()]
                }
            };

            for ((candidate, feature), &loss) in cands.iter().zip(feats).zip(&losses) {
                if loss.is_nan() {
                    warn_no_score(candidate, feature);
                }
                writer.write(&ScoredResult::new(candidate, loss))?;
            }
            writer.flush()?;

            batches += 1;
            tracing::debug!("batch {}: losses {:?}", batches, losses);
        }

        tracing::info!("Scored {} candidates in {} batches", candidates.len(), batches);
        Ok(batches)
    }
}

/// A NaN loss is written as `null`. Say whether truncation explains it.
fn warn_no_score(candidate: &Candidate, feature: &Feature) {
    // [CLS] + left context already fill everything before [SEP]
    if candidate.left_tokens.len() >= feature.seq_length().saturating_sub(2) {
        tracing::warn!(
            "candidate {}: span truncated away at sequence length {}, loss is null",
            candidate.unique_id,
            feature.seq_length()
        );
    } else {
        tracing::warn!("candidate {}: scorer returned NaN, loss is null", candidate.unique_id);
    }
}
