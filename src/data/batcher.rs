// ============================================================
// Layer 4 - Feature Batcher
// ============================================================
// Implements Burn's Batcher trait to stack Features into
// tensors for the scorer's forward pass.
//
//   Input:  Vec of N Features, each with sequences of length S
//   Output: FeatureBatch with four Int tensors of shape [N, S]
//
// Every Feature is already padded to the same length, so the
// sequences are flattened row by row and reshaped.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::feature::Feature;

/// A batch of encoded candidates ready for the forward pass.
#[derive(Debug, Clone)]
pub struct FeatureBatch<B: Backend> {
    /// [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// [batch_size, seq_len], sentinel id outside the candidate span
    pub target_ids: Tensor<B, 2, Int>,

    /// [batch_size, seq_len], 1 = real token, 0 = padding
    pub input_mask: Tensor<B, 2, Int>,

    /// [batch_size, seq_len], all 0 for single-segment input
    pub segment_ids: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct FeatureBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> FeatureBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, items: &[Feature], pick: fn(&Feature) -> &[u32]) -> Tensor<B, 2, Int> {
        let batch_size = items.len();
        let seq_len    = items.first().map_or(0, |f| pick(f).len());
        // Burn uses i32 for Int tensors
        let flat: Vec<i32> = items
            .iter()
            .flat_map(|f| pick(f).iter().map(|&x| x as i32))
            .collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<Feature, FeatureBatch<B>> for FeatureBatcher<B> {
    fn batch(&self, items: Vec<Feature>) -> FeatureBatch<B> {
        FeatureBatch {
            input_ids:   self.stack(&items, |f| f.input_ids.as_slice()),
            target_ids:  self.stack(&items, |f| f.target_ids.as_slice()),
            input_mask:  self.stack(&items, |f| f.input_mask.as_slice()),
            segment_ids: self.stack(&items, |f| f.segment_ids.as_slice()),
        }
    }
}
