// ============================================================
// Layer 3 - Feature
// ============================================================
// Fixed-length encoding of a Candidate. Four parallel sequences
// of length `seq_length`:
//
//   tokens:      [CLS] the  pt   was  stable [SEP] [PAD] ...
//   input_ids:   101   7    8    9    10     102   0     ...
//   target_ids:  0     0    8    0    0      0     0     ...
//   input_mask:  1     1    1    1    1      1     0     ...
//   segment_ids: 0     0    0    0    0      0     0     ...
//
// `target_ids` holds the sentinel id everywhere except under the
// candidate span, so a scorer that ignores sentinel targets
// returns the likelihood of the span alone, with the context
// left visible in `input_ids`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub unique_id:   usize,
    pub raw_id:      usize,
    pub input_ids:   Vec<u32>,
    pub target_ids:  Vec<u32>,
    pub input_mask:  Vec<u32>,
    pub segment_ids: Vec<u32>,
}

impl Feature {
    pub fn seq_length(&self) -> usize {
        self.input_ids.len()
    }

    /// Number of non-padding positions.
    pub fn real_length(&self) -> usize {
        self.input_mask.iter().filter(|&&m| m == 1).count()
    }

    /// True when all four sequences have length `seq_length` and the
    /// mask is a run of 1s followed by a run of 0s.
    pub fn is_well_formed(&self, seq_length: usize) -> bool {
        let lengths_ok = self.input_ids.len() == seq_length
            && self.target_ids.len() == seq_length
            && self.input_mask.len() == seq_length
            && self.segment_ids.len() == seq_length;
        let real = self.real_length();
        let mask_ok = self.input_mask.iter().enumerate()
            .all(|(i, &m)| m == u32::from(i < real));
        lengths_ok && mask_ok
    }
}
