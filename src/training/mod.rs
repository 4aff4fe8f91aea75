// training/mod.rs

pub mod config;
pub mod finetune;
pub mod model;
pub mod pretrain;
pub mod snapshot;

pub use config::{parse_layer_sizes, FineTuneConfig, PretrainConfig};
pub use finetune::{FineTuneOutcome, PairFineTuner};
pub use model::EventCompositionModel;
pub use pretrain::AutoencoderPretrainer;
