// ============================================================
// Layer 4 - Feature Encoder
// ============================================================
// Converts a Candidate into a fixed-length Feature.
//
// Construction, in order:
//   1. tokens  = left + span + right
//      targets = Ignore over left, the span tokens, Ignore over right
//      (a tagged list built in lockstep with `tokens`)
//   2. Check both lists have the same length, then truncate both
//      to seq_length - 2 by dropping trailing positions
//   3. Wrap in [CLS] ... [SEP]; both special positions are Ignore
//   4. Map to ids. Ignore becomes the pad id, the sentinel a
//      scorer skips when computing the loss
//   5. input_mask = 1 over real positions; right-pad all four
//      sequences to seq_length. input_ids and target_ids are
//      padded with the tokenizer's [PAD] id, which is 0 for BERT
//      vocabularies but need not be 0 elsewhere; padded targets
//      must equal the sentinel. input_mask and segment_ids pad
//      with 0
//
// The input sequence never contains [MASK]: the model sees the
// whole sentence, and only the target side is selective.
//
// Pair inputs (an optional second segment) are supported for
// completeness: segment B gets segment id 1, Ignore targets,
// and a trailing [SEP]; the pair is truncated to seq_length - 3
// by repeatedly dropping the last token of the longer segment.

use crate::domain::candidate::Candidate;
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::feature::Feature;
use crate::domain::traits::{SubwordTokenizer, CLS_TOKEN, SEP_TOKEN};

/// Target label for one position of segment A.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target<'t> {
    Ignore,
    Token(&'t str),
}

pub struct FeatureEncoder<'a, T: SubwordTokenizer> {
    tokenizer:  &'a T,
    seq_length: usize,
}

impl<'a, T: SubwordTokenizer> FeatureEncoder<'a, T> {
    /// `seq_length` must leave room for [CLS], [SEP] and one token.
    pub fn new(tokenizer: &'a T, seq_length: usize) -> PipelineResult<Self> {
        if seq_length < 3 {
            return Err(PipelineError::config(format!(
                "max sequence length must be at least 3, got {seq_length}"
            )));
        }
        Ok(Self { tokenizer, seq_length })
    }

    pub fn encode(&self, candidate: &Candidate) -> PipelineResult<Feature> {
        self.encode_with_tokens(candidate, None).map(|(feature, _)| feature)
    }

    pub fn encode_all(&self, candidates: &[Candidate]) -> PipelineResult<Vec<Feature>> {
        candidates.iter().map(|c| self.encode(c)).collect()
    }

    /// Encode `candidate` (and an optional second segment), also
    /// returning the token strings that were kept, for inspection.
    pub fn encode_with_tokens(
        &self,
        candidate: &Candidate,
        segment_b: Option<&[String]>,
    ) -> PipelineResult<(Feature, Vec<String>)> {
        let uid = candidate.unique_id;

        let mut tokens_a = candidate.sentence_tokens();
        let mut targets: Vec<Target> = std::iter::repeat(Target::Ignore)
            .take(candidate.left_tokens.len())
            .chain(candidate.span_tokens.iter().map(|t| Target::Token(t.as_str())))
            .chain(std::iter::repeat(Target::Ignore).take(candidate.right_tokens.len()))
            .collect();

        if tokens_a.len() != targets.len() {
            return Err(PipelineError::encoding(uid, format!(
                "token list has {} entries but target list has {}",
                tokens_a.len(),
                targets.len()
            )));
        }

        let mut tokens_b: Vec<String> = segment_b.map(<[String]>::to_vec).unwrap_or_default();
        if tokens_b.is_empty() {
            tokens_a.truncate(self.seq_length - 2);
            targets.truncate(self.seq_length - 2);
        } else {
            truncate_seq_pair(&mut tokens_a, &mut targets, &mut tokens_b, self.seq_length - 3);
        }

        let special = self.tokenizer.special_ids();
        let a_ids = self.tokenizer.ids_of(&tokens_a);

        let mut input_ids   = Vec::with_capacity(self.seq_length);
        let mut target_ids  = Vec::with_capacity(self.seq_length);
        let mut segment_ids = Vec::with_capacity(self.seq_length);
        let mut kept        = Vec::with_capacity(self.seq_length);

        input_ids.push(special.cls);
        target_ids.push(special.pad);
        segment_ids.push(0);
        kept.push(CLS_TOKEN.to_string());

        for ((token, id), target) in tokens_a.iter().zip(&a_ids).zip(&targets) {
            input_ids.push(*id);
            target_ids.push(match target {
                Target::Ignore => special.pad,
                Target::Token(_) => *id,
            });
            segment_ids.push(0);
            kept.push(token.clone());
        }

        input_ids.push(special.sep);
        target_ids.push(special.pad);
        segment_ids.push(0);
        kept.push(SEP_TOKEN.to_string());

        if !tokens_b.is_empty() {
            for (token, id) in tokens_b.iter().zip(self.tokenizer.ids_of(&tokens_b)) {
                input_ids.push(id);
                target_ids.push(special.pad);
                segment_ids.push(1);
                kept.push(token.clone());
            }
            input_ids.push(special.sep);
            target_ids.push(special.pad);
            segment_ids.push(1);
            kept.push(SEP_TOKEN.to_string());
        }

        let mut input_mask = vec![1u32; input_ids.len()];

        // Zero-pad up to the sequence length. Padding targets use the
        // pad id so they are excluded from the loss as well.
        input_ids.resize(self.seq_length, special.pad);
        target_ids.resize(self.seq_length, special.pad);
        input_mask.resize(self.seq_length, 0);
        segment_ids.resize(self.seq_length, 0);

        let feature = Feature {
            unique_id: uid,
            raw_id: candidate.raw_id,
            input_ids,
            target_ids,
            input_mask,
            segment_ids,
        };

        if !feature.is_well_formed(self.seq_length) {
            return Err(PipelineError::encoding(uid, format!(
                "feature sequences do not all have length {} with a prefix mask",
                self.seq_length
            )));
        }

        tracing::debug!(
            unique_id = uid,
            original = candidate.is_original(),
            tokens = %kept.join(" "),
            span = %candidate.span_tokens.join(" "),
            "encoded candidate"
        );

        Ok((feature, kept))
    }
}

/// Drop the last token of the longer segment until the pair fits in
/// `max_length`. Segment A's targets are dropped along with its tokens.
fn truncate_seq_pair(
    tokens_a: &mut Vec<String>,
    targets:  &mut Vec<Target>,
    tokens_b: &mut Vec<String>,
    max_length: usize,
) {
    while tokens_a.len() + tokens_b.len() > max_length {
        if tokens_a.len() > tokens_b.len() {
            tokens_a.pop();
            targets.pop();
        } else {
            tokens_b.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::{test_adapter, TokenizerAdapter};

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn candidate(left: &str, span: &str, right: &str) -> Candidate {
        Candidate {
            unique_id:    0,
            raw_id:       0,
            left_tokens:  words(left),
            span_tokens:  words(span),
            right_tokens: words(right),
            display_text: span.to_string(),
            span_index:   1,
        }
    }

    fn tok() -> TokenizerAdapter {
        // the=104 pt=105 was=106 stable=107 physical=108 therapy=109
        test_adapter(&["the", "pt", "was", "stable", "physical", "therapy"])
    }

    #[test]
    fn test_layout_of_a_short_candidate() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 10).unwrap();
        let f = enc.encode(&candidate("the", "physical therapy", "was stable")).unwrap();

        assert_eq!(f.input_ids,   vec![101, 104, 108, 109, 106, 107, 102, 0, 0, 0]);
        assert_eq!(f.target_ids,  vec![0,   0,   108, 109, 0,   0,   0,   0, 0, 0]);
        assert_eq!(f.input_mask,  vec![1,   1,   1,   1,   1,   1,   1,   0, 0, 0]);
        assert_eq!(f.segment_ids, vec![0; 10]);
    }

    #[test]
    fn test_all_sequences_have_seq_length() {
        let t = tok();
        for seq_length in [3, 4, 8, 16, 64] {
            let enc = FeatureEncoder::new(&t, seq_length).unwrap();
            let f = enc.encode(&candidate("the the the", "pt", "was stable stable")).unwrap();
            assert_eq!(f.input_ids.len(), seq_length);
            assert_eq!(f.target_ids.len(), seq_length);
            assert_eq!(f.input_mask.len(), seq_length);
            assert_eq!(f.segment_ids.len(), seq_length);
        }
    }

    #[test]
    fn test_targets_are_sentinel_outside_span() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 16).unwrap();
        let c = candidate("the", "pt", "was stable");
        let f = enc.encode(&c).unwrap();

        let span_start = 1 + c.left_tokens.len();
        let span_end = span_start + c.span_tokens.len();
        for i in 0..16 {
            if (span_start..span_end).contains(&i) {
                assert_eq!(f.target_ids[i], f.input_ids[i]);
            } else {
                assert_eq!(f.target_ids[i], 0, "position {i}");
            }
        }
    }

    #[test]
    fn test_mask_counts_real_tokens() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 16).unwrap();
        let c = candidate("the", "pt", "was stable");
        let f = enc.encode(&c).unwrap();
        assert_eq!(f.input_mask.iter().sum::<u32>() as usize, c.token_count() + 2);
        assert!(f.is_well_formed(16));
    }

    #[test]
    fn test_truncation_keeps_leading_tokens() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 8).unwrap();
        // 10 tokens: 4 left + 2 span + 4 right
        let c = candidate("the the the the", "physical therapy", "was was was stable");
        let f = enc.encode(&c).unwrap();

        let body = &f.input_ids[1..7];
        assert_eq!(body, &[104, 104, 104, 104, 108, 109]);
        assert_eq!(f.input_ids[7], 102);
        assert_eq!(f.input_mask, vec![1; 8]);
    }

    #[test]
    fn test_truncation_can_cut_the_span() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 6).unwrap();
        let f = enc.encode(&candidate("the the the", "physical therapy", "stable")).unwrap();
        // [CLS] the the the physical [SEP]
        assert_eq!(f.input_ids, vec![101, 104, 104, 104, 108, 102]);
        assert_eq!(f.target_ids, vec![0, 0, 0, 0, 108, 0]);
    }

    #[test]
    fn test_unknown_span_token_maps_to_unk_in_both_sequences() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 8).unwrap();
        let f = enc.encode(&candidate("the", "zebra", "")).unwrap();
        assert_eq!(f.input_ids[2], 1);
        assert_eq!(f.target_ids[2], 1);
    }

    #[test]
    fn test_pair_input_uses_segment_one() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 12).unwrap();
        let b = words("was stable");
        let (f, kept) = enc
            .encode_with_tokens(&candidate("the", "pt", ""), Some(&b))
            .unwrap();

        assert_eq!(kept, words("[CLS] the pt [SEP] was stable [SEP]"));
        assert_eq!(&f.segment_ids[..7], &[0, 0, 0, 0, 1, 1, 1]);
        assert_eq!(&f.target_ids[..7], &[0, 0, 105, 0, 0, 0, 0]);
        assert!(f.is_well_formed(12));
    }

    #[test]
    fn test_pair_truncation_trims_longer_segment() {
        let t = tok();
        let enc = FeatureEncoder::new(&t, 8).unwrap();
        let b = words("was was was was was stable");
        let (_, kept) = enc
            .encode_with_tokens(&candidate("the", "pt", ""), Some(&b))
            .unwrap();
        // 2 + 6 tokens must fit in 5: B loses tokens until it reaches 3
        assert_eq!(kept, words("[CLS] the pt [SEP] was was was [SEP]"));
    }

    #[test]
    fn test_truncate_seq_pair_drops_targets_with_tokens() {
        let mut a = words("a b c d");
        let mut targets = vec![Target::Ignore, Target::Token("b"), Target::Ignore, Target::Ignore];
        let mut b = words("x");
        truncate_seq_pair(&mut a, &mut targets, &mut b, 3);
        assert_eq!(a, words("a b"));
        assert_eq!(targets, vec![Target::Ignore, Target::Token("b")]);
        assert_eq!(b, words("x"));
    }

    #[test]
    fn test_padding_uses_the_vocabulary_pad_id() {
        struct PadSeven;
        impl SubwordTokenizer for PadSeven {
            fn tokenize(&self, text: &str) -> PipelineResult<Vec<String>> {
                Ok(words(text))
            }
            fn ids_of(&self, tokens: &[String]) -> Vec<u32> {
                tokens.iter().map(|t| t.len() as u32 + 10).collect()
            }
            fn special_ids(&self) -> crate::domain::traits::SpecialIds {
                crate::domain::traits::SpecialIds { cls: 1, sep: 2, pad: 7, unk: 3 }
            }
        }

        let enc = FeatureEncoder::new(&PadSeven, 6).unwrap();
        let f = enc.encode(&candidate("", "pt", "")).unwrap();

        assert_eq!(f.input_ids,   vec![1, 12, 2, 7, 7, 7]);
        assert_eq!(f.target_ids,  vec![7, 12, 7, 7, 7, 7]);
        assert_eq!(f.input_mask,  vec![1, 1, 1, 0, 0, 0]);
        assert_eq!(f.segment_ids, vec![0; 6]);
    }

    #[test]
    fn test_rejects_tiny_seq_length() {
        let t = tok();
        assert!(matches!(FeatureEncoder::new(&t, 2), Err(PipelineError::Config(_))));
    }
}
