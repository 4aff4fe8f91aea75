// vocab/embedding.rs
//
// The word vector matrix as a burn module, so fine tuning can flow
// gradients into individual rows via differentiable row selection.

use burn::module::{Module, Param};
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::vocab::store::WordVectorStore;

#[derive(Module, Debug)]
pub struct WordEmbedding<B: Backend> {
    pub weight: Param<Tensor<B, 2>>,
    pub dim: usize,
}

impl<B: Backend> WordEmbedding<B> {
    pub fn from_store(store: &WordVectorStore, device: &B::Device) -> Self {
        let data = TensorData::new(store.raw().to_vec(), [store.len(), store.dim()]);
        Self {
            weight: Param::from_tensor(Tensor::from_data(data, device)),
            dim: store.dim(),
        }
    }

    pub fn rows(&self) -> usize {
        self.weight.val().dims()[0]
    }

    /// Gathers matrix rows for a batch of indices: [B] -> [B, D].
    pub fn select(&self, indices: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        self.weight.val().select(0, indices)
    }

    /// Copies the matrix back to the host, row-major.
    pub fn to_raw(&self) -> Vec<f32> {
        self.weight
            .val()
            .into_data()
            .convert::<f32>()
            .to_vec()
            .expect("embedding matrix to host")
    }
}
