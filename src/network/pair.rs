// network/pair.rs
//
// The pair composition network: two event vectors, a missing-slot tag and
// an entity-salience feature block are concatenated, pushed through a tanh
// encoder stack, and squashed to a scalar coherence by a logistic head.
//
// The head starts at zero so an untrained network scores every pair at
// exactly 0.5.

use anyhow::{bail, Result};
use burn::module::{Module, Param};
use burn::tensor::{activation, backend::Backend, Tensor, TensorData};

use crate::network::argument::EncoderStack;

#[derive(Module, Debug)]
pub struct PairCompositionNetwork<B: Backend> {
    pub stack: EncoderStack<B>,
    pub head_w: Param<Tensor<B, 1>>, // [z_dim]
    pub head_b: Param<Tensor<B, 1>>, // [1]
    pub event_dim: usize,
    pub salience_dim: usize,
}

impl<B: Backend> PairCompositionNetwork<B> {
    /// `hidden_sizes` may be empty, in which case the logistic head reads
    /// the concatenated input directly. The visible width is
    /// 2 * event_dim + 1 + salience_dim.
    pub fn new(
        event_dim: usize,
        salience_dim: usize,
        hidden_sizes: &[usize],
        seed: u64,
        device: &B::Device,
    ) -> Self {
        let input_dim = 2 * event_dim + 1 + salience_dim;
        let mut sizes = vec![input_dim];
        sizes.extend_from_slice(hidden_sizes);
        let z_dim = *sizes.last().unwrap();
        Self {
            stack: EncoderStack::new(&sizes, seed, device),
            head_w: Param::from_tensor(Tensor::zeros([z_dim], device)),
            head_b: Param::from_tensor(Tensor::zeros([1], device)),
            event_dim,
            salience_dim,
        }
    }

    /// Full width chain, input width first.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let input_dim = 2 * self.event_dim + 1 + self.salience_dim;
        let stack_sizes = self.stack.sizes();
        if stack_sizes.is_empty() {
            vec![input_dim]
        } else {
            stack_sizes
        }
    }

    /// Lifts host-side slot tags and salience rows into the input block.
    pub fn input_tail(
        &self,
        slots: &[i64],
        salience: Option<&[f32]>,
        device: &B::Device,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let n = slots.len();
        let slot_f: Vec<f32> = slots.iter().map(|&s| s as f32).collect();
        let slot_t = Tensor::from_data(TensorData::new(slot_f, [n, 1]), device);
        let sal_t = match salience {
            Some(rows) => {
                if rows.len() != n * self.salience_dim {
                    bail!(
                        "salience block has {} floats for {} rows of width {}",
                        rows.len(),
                        n,
                        self.salience_dim
                    );
                }
                Tensor::from_data(TensorData::new(rows.to_vec(), [n, self.salience_dim]), device)
            }
            // Absent salience is zero-filled, not feature-dropped.
            None => Tensor::zeros([n, self.salience_dim], device),
        };
        Ok((slot_t, sal_t))
    }

    /// Scalar coherence in [0, 1] for a batch of independent pairs.
    /// a, b: [B, event_dim]; slot: [B, 1]; salience: [B, salience_dim].
    pub fn coherence(
        &self,
        a: Tensor<B, 2>,
        b: Tensor<B, 2>,
        slot: Tensor<B, 2>,
        salience: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let x = Tensor::cat(vec![a, b, slot, salience], 1);
        let z = self.stack.forward(x); // [B, z_dim]
        let logits = (z * self.head_w.val().unsqueeze()).sum_dim(1) + self.head_b.val().unsqueeze();
        activation::sigmoid(logits.squeeze(1))
    }

    /// Sum of squared regularised weights and their scalar count: every
    /// stacked encoder matrix plus the logistic head weights. Biases are
    /// excluded.
    pub fn weight_squares(&self) -> (Tensor<B, 1>, usize) {
        let hw = self.head_w.val();
        let head_sq = (hw.clone() * hw).sum();
        let head_n = self.head_w.val().dims()[0];
        match self.stack.weight_squares() {
            Some(sq) => (sq + head_sq, self.stack.weight_count() + head_n),
            None => (head_sq, head_n),
        }
    }
}

/// The triple objective: push the positive pair's coherence up and the
/// negative pair's down. Both coherences are clamped away from {0, 1} so
/// the logs stay finite.
pub fn triple_loss<B: Backend>(c_pos: Tensor<B, 1>, c_neg: Tensor<B, 1>) -> Tensor<B, 1> {
    let eps = 1e-7;
    let c_pos = c_pos.clamp(eps, 1.0 - eps);
    let c_neg = c_neg.clamp(eps, 1.0 - eps);
    let per_example = -(c_pos.log()) - (c_neg.neg().add_scalar(1.0)).log();
    per_example.mean()
}
