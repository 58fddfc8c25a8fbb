// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The tokenizer and the model are external collaborators.
// The pipeline only sees them through these two traits:
//
//   SubwordTokenizer  -> implemented by infra::TokenizerAdapter
//   Scorer            -> implemented by ml::BurnScorer
//
// Tests implement Scorer with small deterministic fakes.

use crate::domain::error::PipelineResult;
use crate::domain::feature::Feature;

/// Ids of the reserved tokens the encoder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds {
    pub cls: u32,
    pub sep: u32,
    /// Padding id, also used as the "exclude from loss" sentinel
    pub pad: u32,
    pub unk: u32,
}

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";
pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";

/// Subword tokenization and id mapping.
pub trait SubwordTokenizer {
    /// Split text into subword tokens, without special tokens.
    fn tokenize(&self, text: &str) -> PipelineResult<Vec<String>>;

    /// Map tokens to ids; unknown tokens map to `special_ids().unk`.
    fn ids_of(&self, tokens: &[String]) -> Vec<u32>;

    fn special_ids(&self) -> SpecialIds;
}

/// What a scorer reports for one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchLoss {
    /// One loss per feature, in batch order
    PerExample(Vec<f32>),
    /// A single loss for the whole batch
    Aggregate(f32),
}

/// Returns an implausibility score for a batch of features.
pub trait Scorer {
    fn score(&self, batch: &[Feature]) -> PipelineResult<BatchLoss>;
}
