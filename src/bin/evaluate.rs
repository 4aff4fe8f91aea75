// bin/evaluate.rs
//
// Held-out argument prediction: for every entity-linked slot of every
// event, rank the script's entities by mean pair coherence against the
// remaining events and report accuracy@1 and MRR.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use event_comp::script::{read_corpus, EventIndexer};
use event_comp::training::snapshot::{self, FINETUNE_SUBDIR, PRETRAIN_SUBDIR};
use event_comp::training::EventCompositionModel;
use event_comp::vocab::WordEmbedding;
use event_comp::{CpuBackend, Evaluator};

#[derive(Parser, Debug)]
#[command(
    name = "evaluate",
    version,
    about = "Rank entity candidates for held-out argument slots"
)]
struct Args {
    /// Model directory; the newest fine-tuning snapshot is used
    #[arg(long)]
    model: PathBuf,

    /// Script corpus in the text format
    #[arg(long)]
    scripts: PathBuf,

    /// Optional JSON map of mention head word -> corpus count, for the
    /// salience block
    #[arg(long)]
    head_counts: Option<PathBuf>,

    /// Index surface words instead of lemmas
    #[arg(long)]
    no_lemma: bool,

    /// Report every vocabulary lookup back-off on stderr
    #[arg(long)]
    log_backoff: bool,
}

/// Snapshot directory for one component, preferring the stage-3 `_full`
/// variant over the stage-2 one.
fn pick(model: &Path, names: &[&str], present: fn(&Path) -> bool) -> Option<PathBuf> {
    for name in names {
        let dir = model.join(name);
        if present(&dir) {
            return Some(dir);
        }
    }
    None
}

fn main() -> Result<()> {
    let args = Args::parse();
    let device = Default::default();

    let finish_full = format!("{}/finish_full", FINETUNE_SUBDIR);
    let finish = format!("{}/finish", FINETUNE_SUBDIR);
    let pretrain_finish = format!("{}/finish", PRETRAIN_SUBDIR);

    let pair_dir = match pick(
        &args.model,
        &[&finish_full, &finish],
        snapshot::has_pair_comp,
    ) {
        Some(d) => d,
        None => bail!(
            "no fine-tuning snapshot under {}; run train-pair-comp first",
            args.model.join(FINETUNE_SUBDIR).display()
        ),
    };
    let comp_dir = match pick(
        &args.model,
        &[&finish_full, &pretrain_finish],
        snapshot::has_arg_comp,
    ) {
        Some(d) => d,
        None => bail!(
            "no composition snapshot under {}; run train-arg-comp first",
            args.model.display()
        ),
    };
    let embed_dir = match pick(
        &args.model,
        &[&finish_full, &pretrain_finish],
        snapshot::has_embedding,
    ) {
        Some(d) => d,
        None => bail!("no word-embedding snapshot under {}", args.model.display()),
    };
    eprintln!(
        "[eval] pair={} comp={} vectors={}",
        pair_dir.display(),
        comp_dir.display(),
        embed_dir.display()
    );

    let mut store = snapshot::load_embedding(&embed_dir)?;
    store.log_backoff = args.log_backoff;
    let arg_comp = snapshot::load_arg_comp::<CpuBackend>(&comp_dir, &device)?;
    let event_dim = arg_comp.event_dim();
    let pair_comp = snapshot::load_pair_comp::<CpuBackend>(&pair_dir, event_dim, &device)?;
    let embedding = WordEmbedding::<CpuBackend>::from_store(&store, &device);
    let model = EventCompositionModel::new(embedding, arg_comp, pair_comp);

    let head_counts: Option<HashMap<String, u64>> = match &args.head_counts {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("open head-count table {}", path.display()))?;
            Some(
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("parse head-count table {}", path.display()))?,
            )
        }
        None => None,
    };

    let file = File::open(&args.scripts)
        .with_context(|| format!("open script corpus {}", args.scripts.display()))?;
    let scripts = read_corpus(BufReader::new(file))?;
    eprintln!("[data] {} scripts from {}", scripts.len(), args.scripts.display());

    let indexer = EventIndexer::new(&store, !args.no_lemma);
    let evaluator = Evaluator::new(&indexer, &model, device, head_counts.as_ref());
    let report = evaluator.evaluate_corpus(&scripts)?;
    println!(
        "accuracy={:.4} mrr={:.4} queries={}",
        report.accuracy(),
        report.mrr(),
        report.queries
    );
    Ok(())
}
