// bin/train_pair_comp.rs
//
// Stages 2 and 3: fine tune the pair composition network with the triple
// objective. Stage 2 starts from a stage-1 snapshot and trains the pair
// network alone; stage 3 continues from a stage-2 snapshot, optionally
// unfreezing the event stack, the empty-slot vectors and the word vectors.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;

use event_comp::corpus::{IndexedCorpus, PAIR_WIDTH};
use event_comp::network::PairCompositionNetwork;
use event_comp::script::types::SALIENCE_DIM;
use event_comp::training::snapshot::{
    self, epoch_of, FINETUNE_SUBDIR, PRETRAIN_SUBDIR,
};
use event_comp::training::config::load_finetune_config;
use event_comp::training::{
    parse_layer_sizes, EventCompositionModel, FineTuneConfig, PairFineTuner,
};
use event_comp::vocab::WordEmbedding;
use event_comp::TrainBackend;

#[derive(Parser, Debug)]
#[command(
    name = "train-pair-comp",
    version,
    about = "Fine tune the pair composition network with the triple objective"
)]
struct Args {
    /// Indexed corpus directory of pair-tuning triples
    #[arg(long)]
    corpus: PathBuf,

    /// Model directory holding the prerequisite snapshots
    #[arg(long)]
    model: PathBuf,

    /// 2 = train the pair network on top of stage 1;
    /// 3 = continue from stage 2 with the update flags below
    #[arg(long, default_value_t = 2)]
    stage: u32,

    /// Optional TOML training config; explicit flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated hidden sizes of the pair-network stack
    #[arg(long)]
    layer_sizes: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Epoch cap
    #[arg(long)]
    iterations: Option<usize>,

    /// L2 coefficient on the regularised weight matrices
    #[arg(long)]
    regularization: Option<f32>,

    /// Learning rate at the start of the first epoch
    #[arg(long)]
    lr: Option<f64>,

    /// Learning rate floor reached by the end of the first epoch
    #[arg(long)]
    min_lr: Option<f64>,

    #[arg(long)]
    update_empty_vectors: bool,

    #[arg(long)]
    update_event_vectors: bool,

    #[arg(long)]
    update_input_vectors: bool,

    /// Resume from a fine-tuning snapshot name, e.g. iter_7; epoch
    /// numbering continues after it
    #[arg(long)]
    resume: Option<String>,

    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn config(&self) -> Result<FineTuneConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_finetune_config(path)?,
            None => FineTuneConfig::default(),
        };
        if let Some(s) = &self.layer_sizes {
            cfg.layer_sizes = parse_layer_sizes(s)?;
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
        if let Some(v) = self.min_lr {
            cfg.min_lr = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        cfg.update_empty_vectors |= self.update_empty_vectors;
        cfg.update_event_vectors |= self.update_event_vectors;
        cfg.update_input_vectors |= self.update_input_vectors;
        Ok(cfg)
    }
}

/// Finds a fine-tuning snapshot directory, preferring the `_full` variant.
fn finetune_snapshot(model: &Path, name: &str) -> Option<PathBuf> {
    for cand in [format!("{}_full", name), name.to_string()] {
        let dir = model.join(FINETUNE_SUBDIR).join(&cand);
        if snapshot::has_pair_comp(&dir) {
            return Some(dir);
        }
    }
    None
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = args.config()?;

    let device = Default::default();
    let stage1 = args.model.join(PRETRAIN_SUBDIR).join("finish");
    if !snapshot::has_arg_comp(&stage1) {
        bail!(
            "stage {} needs a stage-1 snapshot at {}; run train-arg-comp first",
            args.stage,
            stage1.display()
        );
    }

    // Composition weights come from the newest snapshot that carries them.
    let (comp_dir, pair_dir) = match args.stage {
        2 => (stage1.clone(), None),
        3 => {
            let prior = finetune_snapshot(&args.model, "finish").ok_or_else(|| {
                anyhow::anyhow!(
                    "stage 3 needs a stage-2 snapshot under {}; run stage 2 first",
                    args.model.join(FINETUNE_SUBDIR).display()
                )
            })?;
            let comp = if snapshot::has_arg_comp(&prior) {
                prior.clone()
            } else {
                stage1.clone()
            };
            (comp, Some(prior))
        }
        other => bail!("unknown stage {}; expected 2 or 3", other),
    };

    let (comp_dir, pair_dir, start_epoch) = match &args.resume {
        Some(name) => {
            let dir = finetune_snapshot(&args.model, name).ok_or_else(|| {
                anyhow::anyhow!(
                    "resume snapshot '{}' not found under {}",
                    name,
                    args.model.join(FINETUNE_SUBDIR).display()
                )
            })?;
            let epoch = epoch_of(name)
                .ok_or_else(|| anyhow::anyhow!("cannot parse epoch from '{}'", name))?;
            let comp = if snapshot::has_arg_comp(&dir) { dir.clone() } else { comp_dir };
            (comp, Some(dir), epoch + 1)
        }
        None => (comp_dir, pair_dir, 0),
    };

    let mut store = if snapshot::has_embedding(&comp_dir) {
        snapshot::load_embedding(&comp_dir)?
    } else {
        snapshot::load_embedding(&stage1)?
    };
    eprintln!("[vocab] {} words, dim {}", store.len(), store.dim());

    let arg_comp = snapshot::load_arg_comp::<TrainBackend>(&comp_dir, &device)?;
    let event_dim = arg_comp.event_dim();
    let pair_comp = match &pair_dir {
        Some(dir) => snapshot::load_pair_comp::<TrainBackend>(dir, event_dim, &device)?,
        None => PairCompositionNetwork::<TrainBackend>::new(
            event_dim,
            SALIENCE_DIM,
            &cfg.layer_sizes,
            cfg.seed,
            &device,
        ),
    };

    let embedding = WordEmbedding::<TrainBackend>::from_store(&store, &device);
    let model = EventCompositionModel::new(embedding, arg_comp, pair_comp)
        .with_update_flags(&cfg);

    let corpus = IndexedCorpus::open(&args.corpus, PAIR_WIDTH)?;
    let tuner = PairFineTuner::<TrainBackend>::new(cfg, device)?;
    let outcome = tuner.train(model, &mut store, &corpus, &args.model, start_epoch)?;
    eprintln!(
        "[finetune] done: epochs={} converged={} cost={:.6}",
        outcome.epochs_run, outcome.converged, outcome.final_cost
    );
    Ok(())
}
