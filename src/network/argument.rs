// network/argument.rs
//
// The argument composition network: four vocabulary rows (predicate,
// subject, object, prepositional object) are concatenated and pushed
// through a stack of tanh encoders. Empty slots (-1) take a learned
// per-role vector.

use anyhow::{bail, Result};
use burn::module::{Module, Param};
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::network::autoencoder::DenoisingAutoencoder;
use crate::network::l2_normalize;
use crate::script::types::EventBatch;
use crate::vocab::WordEmbedding;

/// Learnable stand-in vectors for missing subject / object / pobj slots,
/// initialised to zero. A separate module so the fine tuner can freeze it
/// independently of the encoder stack.
#[derive(Module, Debug)]
pub struct EmptySlots<B: Backend> {
    pub subj: Param<Tensor<B, 1>>,
    pub obj: Param<Tensor<B, 1>>,
    pub pobj: Param<Tensor<B, 1>>,
}

impl<B: Backend> EmptySlots<B> {
    pub fn new(dim: usize, device: &B::Device) -> Self {
        Self {
            subj: Param::from_tensor(Tensor::zeros([dim], device)),
            obj: Param::from_tensor(Tensor::zeros([dim], device)),
            pobj: Param::from_tensor(Tensor::zeros([dim], device)),
        }
    }
}

/// A plain stack of tanh encoder layers.
#[derive(Module, Debug)]
pub struct EncoderStack<B: Backend> {
    pub layers: Vec<DenoisingAutoencoder<B>>,
}

impl<B: Backend> EncoderStack<B> {
    /// `sizes` is the full width chain: visible width followed by every
    /// hidden width, e.g. [4D, h1, h2].
    pub fn new(sizes: &[usize], seed: u64, device: &B::Device) -> Self {
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, w)| DenoisingAutoencoder::new(w[0], w[1], seed.wrapping_add(i as u64), device))
            .collect();
        Self { layers }
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.layers.len() + 1);
        if let Some(first) = self.layers.first() {
            sizes.push(first.n_vis());
        }
        sizes.extend(self.layers.iter().map(|l| l.n_hid()));
        sizes
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.layers.iter().fold(x, |h, layer| layer.encode(h))
    }

    /// Applies only layers 0..k, producing the visible input of layer k.
    pub fn forward_to(&self, k: usize, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.layers[..k].iter().fold(x, |h, layer| layer.encode(h))
    }

    pub fn weight_squares(&self) -> Option<Tensor<B, 1>> {
        let mut acc: Option<Tensor<B, 1>> = None;
        for layer in &self.layers {
            let sq = layer.weight_squares();
            acc = Some(match acc {
                Some(a) => a + sq,
                None => sq,
            });
        }
        acc
    }

    pub fn weight_count(&self) -> usize {
        self.layers.iter().map(|l| l.weight_count()).sum()
    }
}

#[derive(Module, Debug)]
pub struct ArgumentCompositionNetwork<B: Backend> {
    pub stack: EncoderStack<B>,
    pub empties: EmptySlots<B>,
    pub dim: usize,
}

impl<B: Backend> ArgumentCompositionNetwork<B> {
    /// `hidden_sizes` are the stacked encoder widths; the visible width is
    /// always 4 * dim.
    pub fn new(dim: usize, hidden_sizes: &[usize], seed: u64, device: &B::Device) -> Result<Self> {
        if hidden_sizes.is_empty() {
            bail!("argument composition needs at least one hidden layer");
        }
        let mut sizes = vec![4 * dim];
        sizes.extend_from_slice(hidden_sizes);
        Ok(Self {
            stack: EncoderStack::new(&sizes, seed, device),
            empties: EmptySlots::new(dim, device),
            dim,
        })
    }

    pub fn layer_sizes(&self) -> Vec<usize> {
        self.stack.sizes()
    }

    pub fn event_dim(&self) -> usize {
        self.stack.layers.last().map(|l| l.n_hid()).unwrap_or(4 * self.dim)
    }

    /// Number of stacked layers.
    pub fn depth(&self) -> usize {
        self.stack.layers.len()
    }

    /// Gathers one slot column: rows for non-negative indices, the empty
    /// vector elsewhere. Batch-parallel and differentiable through both the
    /// embedding matrix and the empty vector.
    fn slot_vectors(
        &self,
        embedding: &WordEmbedding<B>,
        indices: &[i64],
        empty: Option<Tensor<B, 1>>,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        let n = indices.len();
        let clamped: Vec<i32> = indices.iter().map(|&i| i.max(0) as i32).collect();
        let idx = Tensor::<B, 1, Int>::from_ints(clamped.as_slice(), device);
        let rows = embedding.select(idx); // [B, D]
        match empty {
            None => rows,
            Some(empty) => {
                let mask: Vec<f32> = indices
                    .iter()
                    .map(|&i| if i >= 0 { 1.0 } else { 0.0 })
                    .collect();
                let mask = Tensor::<B, 2>::from_data(TensorData::new(mask, [n, 1]), device);
                let inv = mask.ones_like() - mask.clone();
                rows * mask + empty.unsqueeze() * inv
            }
        }
    }

    /// Builds the visible layer [B, 4D] for a batch of indexed events.
    pub fn compose_input(
        &self,
        embedding: &WordEmbedding<B>,
        batch: &EventBatch,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        let v_pred = self.slot_vectors(embedding, &batch.pred, None, device);
        let v_subj =
            self.slot_vectors(embedding, &batch.subj, Some(self.empties.subj.val()), device);
        let v_obj = self.slot_vectors(embedding, &batch.obj, Some(self.empties.obj.val()), device);
        let v_pobj =
            self.slot_vectors(embedding, &batch.pobj, Some(self.empties.pobj.val()), device);
        Tensor::cat(vec![v_pred, v_subj, v_obj, v_pobj], 1)
    }

    /// Projects a batch of indexed events to event vectors [B, h_L].
    pub fn project(
        &self,
        embedding: &WordEmbedding<B>,
        batch: &EventBatch,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        self.stack.forward(self.compose_input(embedding, batch, device))
    }

    /// Unit-length projection, for nearest-neighbour evaluation.
    pub fn project_normalized(
        &self,
        embedding: &WordEmbedding<B>,
        batch: &EventBatch,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        l2_normalize(self.project(embedding, batch, device))
    }

    /// The visible input of layer k, used by the layerwise pretrainer as the
    /// training target for that layer.
    pub fn layer_input(
        &self,
        k: usize,
        embedding: &WordEmbedding<B>,
        batch: &EventBatch,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        self.stack.forward_to(k, self.compose_input(embedding, batch, device))
    }

    /// Freezes the encoder stack and/or the empty-slot vectors, leaving the
    /// rest trainable. Called once when the fine tuner assembles its
    /// parameter set.
    pub fn freeze(mut self, freeze_stack: bool, freeze_empties: bool) -> Self {
        if freeze_stack {
            self.stack = self.stack.no_grad();
        }
        if freeze_empties {
            self.empties = self.empties.no_grad();
        }
        self
    }
}
