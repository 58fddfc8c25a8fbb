// ============================================================
// Layer 5 - Masked Language Model
// ============================================================
// A BERT-style encoder with a language-model head:
//
//   token + position + segment embeddings
//       → N encoder blocks (self-attention + GELU feed-forward,
//         padding positions masked out of attention)
//       → final layer norm
//       → lm_head: d_model → vocab_size logits per position
//
// `span_nll` turns the logits into the negative log-likelihood
// of the target ids, counting only positions whose target is
// not the sentinel. Per row it returns the summed NLL and the
// number of counted positions, so callers can average per
// example or over the whole batch.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, log_softmax},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct MaskedLmConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
}

impl MaskedLmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MaskedLmModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let segment_embedding  = EmbeddingConfig::new(self.type_vocab_size, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head    = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        MaskedLmModel {
            token_embedding, position_embedding, segment_embedding,
            layers, final_norm, lm_head, dropout,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask` is true at padding positions, shape [batch, seq_len].
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(pad_mask);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct MaskedLmModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
}

/// Summed span NLL and counted positions, one entry per row.
pub struct SpanNll<B: Backend> {
    pub sums:   Tensor<B, 1>,
    pub counts: Tensor<B, 1>,
}

impl<B: Backend> MaskedLmModel<B> {
    /// All inputs [batch, seq_len] → logits [batch, seq_len, vocab_size]
    pub fn forward(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        segment_ids: Tensor<B, 2, Int>,
        input_mask:  Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let tok_emb = self.token_embedding.forward(input_ids);
        let seg_emb = self.segment_embedding.forward(segment_ids);

        // Learned absolute positions 0..seq_len
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let pad_mask = input_mask.equal_elem(0);

        let mut x = self.dropout.forward(tok_emb + pos_emb + seg_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        let x = self.final_norm.forward(x);
        self.lm_head.forward(x)
    }
}

/// Negative log-likelihood of `target_ids` under `logits`, skipping
/// every position whose target equals `sentinel`.
pub fn span_nll<B: Backend>(
    logits:     Tensor<B, 3>,
    target_ids: Tensor<B, 2, Int>,
    sentinel:   u32,
) -> SpanNll<B> {
    let [batch_size, seq_len, _] = logits.dims();

    let log_probs = log_softmax(logits, 2);
    let picked = log_probs
        .gather(2, target_ids.clone().reshape([batch_size, seq_len, 1]))
        .reshape([batch_size, seq_len]);

    let keep = target_ids.equal_elem(sentinel as i64).bool_not().float();
    let nll  = picked.neg() * keep.clone();

    SpanNll {
        sums:   nll.sum_dim(1).reshape([batch_size]),
        counts: keep.sum_dim(1).reshape([batch_size]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> MaskedLmConfig {
        MaskedLmConfig::new(20, 8, 16, 2, 2, 32)
    }

    fn ints(rows: &[[i32; 8]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i32> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 8])
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: MaskedLmModel<TestBackend> = tiny_config().init(&device);
        let ids  = ints(&[[3, 5, 7, 4, 0, 0, 0, 0], [3, 6, 4, 0, 0, 0, 0, 0]]);
        let segs = ints(&[[0; 8], [0; 8]]);
        let mask = ints(&[[1, 1, 1, 1, 0, 0, 0, 0], [1, 1, 1, 0, 0, 0, 0, 0]]);

        let logits = model.forward(ids, segs, mask);
        assert_eq!(logits.dims(), [2, 8, 20]);
    }

    #[test]
    fn test_span_nll_counts_only_non_sentinel_targets() {
        // Uniform logits: every position costs ln(vocab_size)
        let logits = Tensor::<TestBackend, 3>::zeros([2, 8, 20], &Default::default());
        let targets = ints(&[[0, 0, 5, 6, 0, 0, 0, 0], [0, 7, 0, 0, 0, 0, 0, 0]]);

        let nll = span_nll(logits, targets, 0);
        let sums: Vec<f32>   = nll.sums.into_data().iter::<f32>().collect();
        let counts: Vec<f32> = nll.counts.into_data().iter::<f32>().collect();

        let ln_v = (20f32).ln();
        assert_eq!(counts, vec![2.0, 1.0]);
        assert!((sums[0] - 2.0 * ln_v).abs() < 1e-4);
        assert!((sums[1] - ln_v).abs() < 1e-4);
    }

    #[test]
    fn test_span_nll_prefers_likely_tokens() {
        let device = Default::default();
        // One position, vocabulary of 20: token 5 gets a large logit
        let mut row = vec![0f32; 20];
        row[5] = 10.0;
        let logits = Tensor::<TestBackend, 1>::from_floats(row.as_slice(), &device)
            .reshape([1, 1, 20]);

        let likely = span_nll(
            logits.clone(),
            Tensor::<TestBackend, 1, Int>::from_ints([5].as_slice(), &device).reshape([1, 1]),
            0,
        );
        let unlikely = span_nll(
            logits,
            Tensor::<TestBackend, 1, Int>::from_ints([6].as_slice(), &device).reshape([1, 1]),
            0,
        );
        let a: f32 = likely.sums.into_scalar().elem();
        let b: f32 = unlikely.sums.into_scalar().elem();
        assert!(a < b);
    }
}
