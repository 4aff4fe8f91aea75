// network/autoencoder.rs
//
// One denoising autoencoder layer: tanh encoder with a tied-weight tanh
// decoder used only during layerwise pretraining. Once trained, enclosing
// networks call `encode` alone.

use burn::module::{Module, Param};
use burn::tensor::{activation, backend::Backend, Tensor, TensorData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

#[derive(Module, Debug)]
pub struct DenoisingAutoencoder<B: Backend> {
    pub w: Param<Tensor<B, 2>>,     // [n_vis, n_hid]
    pub b: Param<Tensor<B, 1>>,     // [n_hid]
    pub b_rec: Param<Tensor<B, 1>>, // [n_vis]
}

impl<B: Backend> DenoisingAutoencoder<B> {
    /// Xavier-uniform weight init with a fixed seed for reproducibility.
    pub fn new(n_vis: usize, n_hid: usize, seed: u64, device: &B::Device) -> Self {
        let limit = (6.0f32 / ((n_vis + n_hid) as f32)).sqrt();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let weights: Vec<f32> = (0..n_vis * n_hid)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        let w = Tensor::from_data(TensorData::new(weights, [n_vis, n_hid]), device);
        let b = Tensor::zeros([n_hid], device);
        let b_rec = Tensor::zeros([n_vis], device);
        Self {
            w: Param::from_tensor(w),
            b: Param::from_tensor(b),
            b_rec: Param::from_tensor(b_rec),
        }
    }

    /// Builds a layer from explicit parameter values.
    pub fn from_parts(
        w: Tensor<B, 2>,
        b: Tensor<B, 1>,
        b_rec: Tensor<B, 1>,
    ) -> Self {
        Self {
            w: Param::from_tensor(w),
            b: Param::from_tensor(b),
            b_rec: Param::from_tensor(b_rec),
        }
    }

    pub fn n_vis(&self) -> usize {
        self.w.val().dims()[0]
    }

    pub fn n_hid(&self) -> usize {
        self.w.val().dims()[1]
    }

    /// h = tanh(xW + b), x: [B, n_vis] -> [B, n_hid]
    pub fn encode(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        activation::tanh(x.matmul(self.w.val()) + self.b.val().unsqueeze())
    }

    /// x_hat = tanh(h W^T + b_rec), h: [B, n_hid] -> [B, n_vis]
    pub fn reconstruct(&self, h: Tensor<B, 2>) -> Tensor<B, 2> {
        activation::tanh(h.matmul(self.w.val().transpose()) + self.b_rec.val().unsqueeze())
    }

    /// Mean squared reconstruction error against the uncorrupted input.
    pub fn reconstruction_loss(
        &self,
        corrupted: Tensor<B, 2>,
        clean: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let x_hat = self.reconstruct(self.encode(corrupted));
        let diff = x_hat - clean;
        (diff.clone() * diff).mean()
    }

    /// Sum of squared encoder weights, for the L2 penalty.
    pub fn weight_squares(&self) -> Tensor<B, 1> {
        let w = self.w.val();
        (w.clone() * w).sum()
    }

    pub fn weight_count(&self) -> usize {
        self.n_vis() * self.n_hid()
    }
}

/// Samples a Bernoulli(1 - p) keep mask for one minibatch and lifts it to a
/// tensor. Corruption is applied by elementwise multiplication.
pub fn corruption_mask<B: Backend>(
    rows: usize,
    cols: usize,
    p: f32,
    rng: &mut ChaCha20Rng,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mask: Vec<f32> = (0..rows * cols)
        .map(|_| if rng.gen::<f32>() < p { 0.0 } else { 1.0 })
        .collect();
    Tensor::from_data(TensorData::new(mask, [rows, cols]), device)
}
