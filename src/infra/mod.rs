// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Files on disk that outlive a single run:
//
//   checkpoint.rs      - model weights (CompactRecorder) and
//                        model_config.json
//   tokenizer_store.rs - tokenizer.json loading, the adapter
//                        that implements SubwordTokenizer, and
//                        the word-level builder used by
//                        init-checkpoint

/// Model weights and architecture config
pub mod checkpoint;

/// Tokenizer loading, building and the SubwordTokenizer adapter
pub mod tokenizer_store;
