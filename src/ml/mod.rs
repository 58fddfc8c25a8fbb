// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All model code lives here:
//
//   model.rs  - BERT-style masked language model and the
//               span negative log-likelihood
//   scorer.rs - the Scorer implementation the orchestrator
//               calls once per batch
//
// Backend is chosen at build time: ndarray on the CPU by
// default, wgpu with `--features wgpu`.

/// Masked language model architecture
pub mod model;

/// Burn-backed implementation of the domain Scorer trait
pub mod scorer;

#[cfg(feature = "wgpu")]
pub type ScoreBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type ScoreBackend = burn::backend::NdArray;
