// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing the scoring
// pipeline: lines, candidates, features, results, errors.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - NO tokenizer implementation details
//
// Everything above and below this layer talks in these types,
// so the generator and encoder can be tested without a model.

// One input line plus one scorable candidate built from it
pub mod candidate;

// Fixed-length encoding of a candidate
pub mod feature;

// Output record for one scored candidate
pub mod result;

// Typed error taxonomy shared by every layer
pub mod error;

// Seams to the external tokenizer and scorer
pub mod traits;
