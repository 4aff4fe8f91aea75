// training/model.rs
//
// The full trainable system: word embedding matrix, argument composition
// network and pair composition network bundled into one module so the
// optimizer can step whichever subset is unfrozen and snapshots cover
// everything at once.

use anyhow::Result;
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

use crate::network::{ArgumentCompositionNetwork, PairCompositionNetwork};
use crate::script::types::{EventBatch, TripleBatch};
use crate::training::config::FineTuneConfig;
use crate::vocab::WordEmbedding;

#[derive(Module, Debug)]
pub struct EventCompositionModel<B: Backend> {
    pub embedding: WordEmbedding<B>,
    pub arg_comp: ArgumentCompositionNetwork<B>,
    pub pair_comp: PairCompositionNetwork<B>,
}

impl<B: Backend> EventCompositionModel<B> {
    pub fn new(
        embedding: WordEmbedding<B>,
        arg_comp: ArgumentCompositionNetwork<B>,
        pair_comp: PairCompositionNetwork<B>,
    ) -> Self {
        Self { embedding, arg_comp, pair_comp }
    }

    /// Assembles the trainable-parameter set once, by freezing every
    /// submodule the update flags leave out. The pair network always
    /// trains.
    pub fn with_update_flags(mut self, cfg: &FineTuneConfig) -> Self {
        if !cfg.update_input_vectors {
            self.embedding = self.embedding.no_grad();
        }
        self.arg_comp = self
            .arg_comp
            .freeze(!cfg.update_event_vectors, !cfg.update_empty_vectors);
        self
    }

    /// Projects a batch of indexed events to event vectors.
    pub fn project(&self, batch: &EventBatch, device: &B::Device) -> Tensor<B, 2> {
        self.arg_comp.project(&self.embedding, batch, device)
    }

    /// Coherence of two indexed-event batches, pairwise by row.
    pub fn coherence(
        &self,
        left: &EventBatch,
        right: &EventBatch,
        slots: &[i64],
        salience: Option<&[f32]>,
        device: &B::Device,
    ) -> Result<Tensor<B, 1>> {
        let e_left = self.project(left, device);
        let e_right = self.project(right, device);
        let (slot_t, sal_t) = self.pair_comp.input_tail(slots, salience, device)?;
        Ok(self.pair_comp.coherence(e_left, e_right, slot_t, sal_t))
    }

    /// Coherence of the positive and negative pairs of a triple batch,
    /// sharing all parameters between the two passes.
    pub fn coherence_pair(
        &self,
        batch: &TripleBatch,
        salience: Option<&[f32]>,
        device: &B::Device,
    ) -> Result<(Tensor<B, 1>, Tensor<B, 1>)> {
        let e_left = self.project(&batch.left, device);
        let e_pos = self.project(&batch.pos, device);
        let e_neg = self.project(&batch.neg, device);
        let (slot_t, sal_t) = self.pair_comp.input_tail(&batch.slot, salience, device)?;
        let c_pos = self
            .pair_comp
            .coherence(e_left.clone(), e_pos, slot_t.clone(), sal_t.clone());
        let c_neg = self.pair_comp.coherence(e_left, e_neg, slot_t, sal_t);
        Ok((c_pos, c_neg))
    }

    /// L2 penalty over the regularised weight matrices of the trainable
    /// set, averaged by the total regularised scalar count. Biases and the
    /// empty-slot vectors are excluded.
    pub fn regularization(&self, cfg: &FineTuneConfig) -> (Tensor<B, 1>, usize) {
        let (mut sq, mut count) = self.pair_comp.weight_squares();
        if cfg.update_event_vectors {
            if let Some(s) = self.arg_comp.stack.weight_squares() {
                sq = sq + s;
                count += self.arg_comp.stack.weight_count();
            }
        }
        if cfg.update_input_vectors {
            let w = self.embedding.weight.val();
            let dims = w.dims();
            sq = sq + (w.clone() * w).sum();
            count += dims[0] * dims[1];
        }
        (sq, count)
    }
}
