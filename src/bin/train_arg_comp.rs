// bin/train_arg_comp.rs
//
// Stage 1: greedy layerwise pretraining of the argument composition
// network over an indexed corpus of single events.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use event_comp::corpus::{IndexedCorpus, PRETRAIN_WIDTH};
use event_comp::network::ArgumentCompositionNetwork;
use event_comp::training::config::load_pretrain_config;
use event_comp::training::{parse_layer_sizes, AutoencoderPretrainer, PretrainConfig};
use event_comp::vocab::WordVectorStore;
use event_comp::TrainBackend;

#[derive(Parser, Debug)]
#[command(
    name = "train-arg-comp",
    version,
    about = "Pretrain the argument composition network layer by layer"
)]
struct Args {
    /// Indexed corpus directory (shards + line_count)
    #[arg(long)]
    corpus: PathBuf,

    /// Model output directory; snapshots land under <model>/pretraining/
    #[arg(long)]
    model: PathBuf,

    /// Vocabulary text file for the base word vectors
    #[arg(long)]
    vocab: PathBuf,

    /// Little-endian f32 binary matrix for the base word vectors
    #[arg(long)]
    vectors: PathBuf,

    /// Optional TOML training config; explicit flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated hidden sizes of the encoder stack
    #[arg(long)]
    layer_sizes: Option<String>,

    /// Autoencoder input-drop probability, in [0, 1]
    #[arg(long)]
    corruption: Option<f32>,

    /// Records per minibatch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Epoch cap per layer
    #[arg(long)]
    iterations: Option<usize>,

    /// L2 coefficient on the layer weights
    #[arg(long)]
    regularization: Option<f32>,

    /// Fixed learning rate
    #[arg(long)]
    lr: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn config(&self) -> Result<PretrainConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_pretrain_config(path)?,
            None => PretrainConfig::default(),
        };
        if let Some(s) = &self.layer_sizes {
            cfg.layer_sizes = parse_layer_sizes(s)?;
        }
        if let Some(v) = self.corruption {
            cfg.corruption = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.iterations {
            cfg.iterations = v;
        }
        if let Some(v) = self.regularization {
            cfg.regularization = v;
        }
        if let Some(v) = self.lr {
            cfg.lr = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = args.config()?;

    let store = WordVectorStore::load(&args.vocab, &args.vectors)?;
    eprintln!("[vocab] {} words, dim {}", store.len(), store.dim());

    let corpus = IndexedCorpus::open(&args.corpus, PRETRAIN_WIDTH)?;
    let device = Default::default();
    let net = ArgumentCompositionNetwork::<TrainBackend>::new(
        store.dim(),
        &cfg.layer_sizes,
        cfg.seed,
        &device,
    )?;

    let trainer = AutoencoderPretrainer::<TrainBackend>::new(cfg, device)?;
    trainer.train(&store, net, &corpus, &args.model)?;
    Ok(())
}
