// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything between raw text lines and scorer-ready tensors,
// plus the output stream:
//
//   input lines
//       │
//       ▼
//   CandidateGenerator  -> dictionary match, context split,
//       │                  one candidate per expansion
//       ▼
//   FeatureEncoder      -> [CLS] ... [SEP], selective targets,
//       │                  truncation and padding
//       ▼
//   FeatureBatcher      -> stacks features into Burn tensors
//       │
//       ▼
//   (scorer)
//       │
//       ▼
//   ResultWriter        -> one JSON line per candidate

/// Abbreviation -> expansions mapping, loaded once
pub mod dictionary;

/// Builds candidates from input lines
pub mod generator;

/// Encodes candidates into fixed-length features
pub mod encoder;

/// Implements Burn's Batcher trait for features
pub mod batcher;

/// Streams scored results (and feature dumps) as JSON lines
pub mod writer;
