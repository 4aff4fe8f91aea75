pub mod corpus;
pub mod document;
pub mod eval;
pub mod network;
pub mod script;
pub mod training;
pub mod vocab;

/// CPU inference backend.
pub type CpuBackend = burn_ndarray::NdArray<f32>;
/// Autodiff-wrapped CPU backend used by both trainers.
pub type TrainBackend = burn_autodiff::Autodiff<CpuBackend>;

pub use eval::{EvalReport, Evaluator};
pub use training::EventCompositionModel;
