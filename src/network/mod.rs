// network/mod.rs

pub mod autoencoder;
pub mod argument;
pub mod pair;

pub use autoencoder::{corruption_mask, DenoisingAutoencoder};
pub use argument::{ArgumentCompositionNetwork, EmptySlots, EncoderStack};
pub use pair::{triple_loss, PairCompositionNetwork};

use burn::tensor::{backend::Backend, Tensor};

/// L2-normalize along the last dim of [B, D] -> [B, D].
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norms = (x.clone() * x.clone())
        .sum_dim(1)
        .sqrt()
        .add_scalar(1e-12);
    x / norms
}
