// ============================================================
// Layer 5 - Burn Scorer
// ============================================================
// Implements the domain Scorer trait on top of MaskedLmModel.
//
// For one batch of features:
//   1. Check the batch fits the model (length and vocabulary)
//   2. Stack features into tensors with FeatureBatcher
//   3. Forward pass → logits [batch, seq_len, vocab]
//   4. span_nll over positions whose target is not the sentinel
//   5. Report either one mean NLL per feature (PerExample) or a
//      single token-weighted mean for the batch (Batch)
//
// A feature whose span was truncated away has nothing to score;
// it gets NaN in per-example mode.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::batcher::FeatureBatcher;
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::feature::Feature;
use crate::domain::traits::{BatchLoss, Scorer};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{span_nll, MaskedLmConfig, MaskedLmModel};

/// How losses are reported for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossGranularity {
    /// One loss per feature
    PerExample,
    /// A single loss shared by the whole batch
    Batch,
}

pub struct BurnScorer<B: Backend> {
    model:       MaskedLmModel<B>,
    config:      MaskedLmConfig,
    batcher:     FeatureBatcher<B>,
    sentinel:    u32,
    granularity: LossGranularity,
}

impl<B: Backend> BurnScorer<B> {
    pub fn new(
        model:       MaskedLmModel<B>,
        config:      MaskedLmConfig,
        device:      B::Device,
        sentinel:    u32,
        granularity: LossGranularity,
    ) -> Self {
        Self {
            model,
            config,
            batcher: FeatureBatcher::new(device),
            sentinel,
            granularity,
        }
    }

    /// Rebuild the model from `model_config.json` and load its weights.
    pub fn from_checkpoint(
        ckpt:        &CheckpointManager,
        device:      B::Device,
        sentinel:    u32,
        granularity: LossGranularity,
    ) -> Result<Self> {
        let config = ckpt.load_config()?;
        let model: MaskedLmModel<B> = config.init(&device);
        let model = ckpt.load_model(model, &device)?;
        tracing::info!(
            "Scorer ready: {} layers, d_model={}, vocab={}, max_seq_len={}",
            config.num_layers, config.d_model, config.vocab_size, config.max_seq_len
        );
        Ok(Self::new(model, config, device, sentinel, granularity))
    }

    pub fn model_config(&self) -> &MaskedLmConfig {
        &self.config
    }

    fn validate(&self, batch: &[Feature]) -> PipelineResult<()> {
        let seq_len = batch[0].seq_length();
        if seq_len > self.config.max_seq_len {
            return Err(PipelineError::scorer(format!(
                "sequence length {seq_len} exceeds the model's max_seq_len {}",
                self.config.max_seq_len
            )));
        }
        for f in batch {
            if f.seq_length() != seq_len {
                return Err(PipelineError::scorer(format!(
                    "candidate {} has length {}, batch expects {seq_len}",
                    f.unique_id,
                    f.seq_length()
                )));
            }
            let max_id = f.input_ids.iter().chain(&f.target_ids).copied().max().unwrap_or(0);
            if max_id as usize >= self.config.vocab_size {
                return Err(PipelineError::scorer(format!(
                    "candidate {} uses token id {max_id}, model vocabulary has {} entries",
                    f.unique_id, self.config.vocab_size
                )));
            }
        }
        Ok(())
    }
}

impl<B: Backend> Scorer for BurnScorer<B> {
    fn score(&self, batch: &[Feature]) -> PipelineResult<BatchLoss> {
        if batch.is_empty() {
            return Err(PipelineError::scorer("empty batch"));
        }
        self.validate(batch)?;

        let tensors = self.batcher.batch(batch.to_vec());
        let logits  = self.model.forward(tensors.input_ids, tensors.segment_ids, tensors.input_mask);
        let nll     = span_nll(logits, tensors.target_ids, self.sentinel);

        let sums: Vec<f32>   = nll.sums.into_data().iter::<f32>().collect();
        let counts: Vec<f32> = nll.counts.into_data().iter::<f32>().collect();
        if sums.len() != batch.len() || counts.len() != batch.len() {
            return Err(PipelineError::scorer(format!(
                "model returned {} losses for a batch of {}",
                sums.len(),
                batch.len()
            )));
        }

        Ok(match self.granularity {
            LossGranularity::PerExample => BatchLoss::PerExample(
                sums.iter()
                    .zip(&counts)
                    .map(|(&s, &c)| if c > 0.0 { s / c } else { f32::NAN })
                    .collect(),
            ),
            LossGranularity::Batch => {
                let total: f32 = counts.iter().sum();
                let loss = if total > 0.0 { sums.iter().sum::<f32>() / total } else { f32::NAN };
                BatchLoss::Aggregate(loss)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> MaskedLmConfig {
        MaskedLmConfig::new(16, 8, 16, 2, 1, 32)
    }

    fn scorer(granularity: LossGranularity) -> BurnScorer<TestBackend> {
        let device = Default::default();
        let model = config().init::<TestBackend>(&device);
        BurnScorer::new(model, config(), device, 0, granularity)
    }

    fn feature(unique_id: usize, span: &[u32]) -> Feature {
        let mut input_ids = vec![1u32];
        let mut target_ids = vec![0u32];
        for &id in span {
            input_ids.push(id);
            target_ids.push(id);
        }
        input_ids.extend([5, 2]);
        target_ids.extend([0, 0]);
        let real = input_ids.len();
        let mut input_mask = vec![1u32; real];
        input_ids.resize(8, 0);
        target_ids.resize(8, 0);
        input_mask.resize(8, 0);
        Feature { unique_id, raw_id: 0, input_ids, target_ids, input_mask, segment_ids: vec![0; 8] }
    }

    #[test]
    fn test_per_example_returns_one_finite_loss_per_feature() {
        let s = scorer(LossGranularity::PerExample);
        let loss = s.score(&[feature(0, &[7]), feature(1, &[8, 9])]).unwrap();
        match loss {
            BatchLoss::PerExample(v) => {
                assert_eq!(v.len(), 2);
                assert!(v.iter().all(|x| x.is_finite() && *x > 0.0));
            }
            other => panic!("expected per-example losses, got {other:?}"),
        }
    }

    #[test]
    fn test_scores_are_deterministic() {
        let s = scorer(LossGranularity::PerExample);
        let batch = [feature(0, &[7]), feature(1, &[8, 9])];
        assert_eq!(s.score(&batch).unwrap(), s.score(&batch).unwrap());
    }

    #[test]
    fn test_per_example_does_not_depend_on_batch_mates() {
        let s = scorer(LossGranularity::PerExample);
        let alone = match s.score(&[feature(0, &[7])]).unwrap() {
            BatchLoss::PerExample(v) => v[0],
            other => panic!("unexpected {other:?}"),
        };
        let paired = match s.score(&[feature(0, &[7]), feature(1, &[8, 9])]).unwrap() {
            BatchLoss::PerExample(v) => v[0],
            other => panic!("unexpected {other:?}"),
        };
        assert!((alone - paired).abs() < 1e-4);
    }

    #[test]
    fn test_batch_granularity_gives_one_value() {
        let s = scorer(LossGranularity::Batch);
        let loss = s.score(&[feature(0, &[7]), feature(1, &[8, 9])]).unwrap();
        assert!(matches!(loss, BatchLoss::Aggregate(x) if x.is_finite()));
    }

    #[test]
    fn test_feature_without_span_scores_nan() {
        let s = scorer(LossGranularity::PerExample);
        match s.score(&[feature(0, &[])]).unwrap() {
            BatchLoss::PerExample(v) => assert!(v[0].is_nan()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejects_ids_outside_vocabulary() {
        let s = scorer(LossGranularity::PerExample);
        let err = s.score(&[feature(3, &[16])]).unwrap_err();
        assert!(matches!(err, PipelineError::Scorer(_)));
        assert!(err.to_string().contains("candidate 3"));
    }

    #[test]
    fn test_rejects_sequences_longer_than_model() {
        let s = scorer(LossGranularity::PerExample);
        let mut f = feature(0, &[7]);
        for v in [&mut f.input_ids, &mut f.target_ids, &mut f.input_mask, &mut f.segment_ids] {
            v.resize(9, 0);
        }
        assert!(matches!(s.score(&[f]), Err(PipelineError::Scorer(_))));
    }

    #[test]
    fn test_rejects_empty_batch() {
        let s = scorer(LossGranularity::PerExample);
        assert!(matches!(s.score(&[]), Err(PipelineError::Scorer(_))));
    }
}
