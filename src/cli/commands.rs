// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Three subcommands: `score`, `encode` and `init-checkpoint`.
// `score` and `encode` share the PipelineArgs flags.

use clap::{Args, Subcommand};

use crate::application::{init_use_case::InitConfig, score_use_case::ScoreConfig};
use crate::data::generator::MatchPolicy;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score each abbreviation and its expansions in context
    Score(ScoreArgs),

    /// Write the encoded features as JSON lines without scoring
    Encode(PipelineArgs),

    /// Write a randomly initialised model and word-level tokenizer
    InitCheckpoint(InitArgs),
}

/// Inputs and encoding options shared by `score` and `encode`.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Text file, one sentence per line
    #[arg(long)]
    pub input_file: String,

    /// JSON object mapping each abbreviation to a list of expansions
    #[arg(long)]
    pub dict_file: String,

    /// Where to write the JSON lines
    #[arg(long)]
    pub output_file: String,

    /// Directory holding the model and, unless --tokenizer-file is
    /// given, tokenizer.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// HuggingFace tokenizer.json to use instead of the checkpoint's
    #[arg(long)]
    pub tokenizer_file: Option<String>,

    /// Total tokens per sequence including [CLS] and [SEP]
    #[arg(long, default_value_t = 128)]
    pub max_seq_length: usize,

    /// Lowercase text before tokenizing
    #[arg(long)]
    pub do_lower_case: bool,

    /// Which abbreviation to expand when a line contains several
    #[arg(long, default_value = "last")]
    pub match_policy: MatchPolicy,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Candidates per forward pass
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// Report one loss per batch instead of one per candidate.
    /// Only exact with --batch-size 1
    #[arg(long)]
    pub batch_loss: bool,
}

/// The application layer never sees clap types.
impl From<PipelineArgs> for ScoreConfig {
    fn from(a: PipelineArgs) -> Self {
        ScoreConfig {
            input_file:     a.input_file,
            dict_file:      a.dict_file,
            output_file:    a.output_file,
            tokenizer_file: a.tokenizer_file,
            checkpoint_dir: a.checkpoint_dir,
            max_seq_length: a.max_seq_length,
            do_lower_case:  a.do_lower_case,
            match_policy:   a.match_policy,
            ..ScoreConfig::default()
        }
    }
}

impl From<ScoreArgs> for ScoreConfig {
    fn from(a: ScoreArgs) -> Self {
        ScoreConfig {
            batch_size: a.batch_size,
            batch_loss: a.batch_loss,
            ..a.pipeline.into()
        }
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Text whose words go into the tokenizer vocabulary
    #[arg(long)]
    pub input_file: String,

    /// Abbreviation dictionary; its keys and expansions are added too
    #[arg(long)]
    pub dict_file: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Longest sequence the model accepts
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    /// Upper bound on tokenizer entries, special tokens included
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 128)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 512)]
    pub d_ff: usize,
}

impl From<InitArgs> for InitConfig {
    fn from(a: InitArgs) -> Self {
        InitConfig {
            input_file:     a.input_file,
            dict_file:      a.dict_file,
            checkpoint_dir: a.checkpoint_dir,
            max_seq_len:    a.max_seq_len,
            vocab_size:     a.vocab_size,
            d_model:        a.d_model,
            num_heads:      a.num_heads,
            num_layers:     a.num_layers,
            d_ff:           a.d_ff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_score_args_convert_with_defaults() {
        let cli = Cli::try_parse_from([
            "abbr-ppl", "score",
            "--input-file", "in.txt",
            "--dict-file", "dict.json",
            "--output-file", "out.jsonl",
        ])
        .unwrap();
        let Commands::Score(args) = cli.command else {
            panic!("expected score");
        };
        let cfg: ScoreConfig = args.into();
        assert_eq!(cfg.max_seq_length, 128);
        assert_eq!(cfg.batch_size, 1);
        assert_eq!(cfg.match_policy, MatchPolicy::Last);
        assert!(!cfg.batch_loss);
        assert_eq!(cfg.tokenizer_file, None);
    }

    #[test]
    fn test_match_policy_flag_parses() {
        let cli = Cli::try_parse_from([
            "abbr-ppl", "encode",
            "--input-file", "in.txt",
            "--dict-file", "dict.json",
            "--output-file", "out.jsonl",
            "--match-policy", "first",
        ])
        .unwrap();
        let Commands::Encode(args) = cli.command else {
            panic!("expected encode");
        };
        assert_eq!(ScoreConfig::from(args).match_policy, MatchPolicy::First);
    }

    #[test]
    fn test_unknown_match_policy_is_rejected() {
        let parsed = Cli::try_parse_from([
            "abbr-ppl", "encode",
            "--input-file", "in.txt",
            "--dict-file", "dict.json",
            "--output-file", "out.jsonl",
            "--match-policy", "all",
        ]);
        assert!(parsed.is_err());
    }
}
