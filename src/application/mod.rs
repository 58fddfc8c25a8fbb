// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Wires the lower layers together for each subcommand:
//
//   score            - dictionary + tokenizer + model → scores.jsonl
//   encode           - dictionary + tokenizer → features.jsonl
//   init-checkpoint  - corpus + dictionary → tokenizer + random model
//
// No model math and no printing here; those belong to Layer 5
// and Layer 1.

/// Batching, scorer calls and result streaming
pub mod orchestrator;

/// The scoring workflow and its configuration
pub mod score_use_case;

/// Feature dump without a model
pub mod encode_use_case;

/// Random-init checkpoint for smoke tests
pub mod init_use_case;
