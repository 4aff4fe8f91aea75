// training/snapshot.rs
//
// Model snapshot layout. A snapshot directory holds up to three kinds of
// artefacts: the word-embedding binary plus its vocabulary file, an
// `arg-comp/` subdirectory for the argument composition network, and
// top-level `weights` / `layer_sizes` for the pair network. Training stages
// write snapshots under `pretraining/...` and `fine_tuning/...` subpaths.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::module::Module;
use burn::record::{DefaultFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;

use crate::network::{ArgumentCompositionNetwork, PairCompositionNetwork};
use crate::script::types::SALIENCE_DIM;
use crate::vocab::{WordEmbedding, WordVectorStore};

pub const PRETRAIN_SUBDIR: &str = "pretraining";
pub const FINETUNE_SUBDIR: &str = "fine_tuning";

const ARG_COMP_SUBDIR: &str = "arg-comp";
const WEIGHTS_FILE: &str = "weights";
const LAYER_SIZES_FILE: &str = "layer_sizes";
const EMBEDDING_BIN: &str = "word2vec.bin";
const EMBEDDING_VOCAB: &str = "word2vec.vocab";

// Full precision on disk: half-precision records lose enough mantissa to
// perturb resumed runs and reloaded projections.
type WeightRecorder = DefaultFileRecorder<FullPrecisionSettings>;

/// Resolves and creates a snapshot directory, e.g.
/// `<root>/pretraining/layer_0` or `<root>/fine_tuning/iter_3_full`.
pub fn snapshot_dir(root: &Path, stage: &str, name: &str) -> Result<PathBuf> {
    let dir = root.join(stage).join(name);
    fs::create_dir_all(&dir)
        .with_context(|| format!("create snapshot directory {}", dir.display()))?;
    Ok(dir)
}

/// Epoch number encoded in a fine-tuning snapshot name: `iter_7` and
/// `iter_7_full` both map to 7.
pub fn epoch_of(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("iter_")?;
    let rest = rest.strip_suffix("_full").unwrap_or(rest);
    rest.parse().ok()
}

fn write_layer_sizes(path: &Path, sizes: &[usize]) -> Result<()> {
    let line: Vec<String> = sizes.iter().map(|s| s.to_string()).collect();
    fs::write(path, format!("{}\n", line.join(",")))
        .with_context(|| format!("write layer sizes {}", path.display()))?;
    Ok(())
}

fn read_layer_sizes(path: &Path) -> Result<Vec<usize>> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("missing layer sizes {}", path.display()))?;
    txt.trim()
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .with_context(|| format!("bad layer size '{}' in {}", p, path.display()))
        })
        .collect()
}

/* ------------------ argument composition ------------------ */

pub fn save_arg_comp<B: Backend>(dir: &Path, net: &ArgumentCompositionNetwork<B>) -> Result<()> {
    let sub = dir.join(ARG_COMP_SUBDIR);
    fs::create_dir_all(&sub)?;
    write_layer_sizes(&sub.join(LAYER_SIZES_FILE), &net.layer_sizes())?;
    WeightRecorder::new()
        .record(net.clone().into_record(), sub.join(WEIGHTS_FILE))
        .with_context(|| format!("record arg-comp weights under {}", sub.display()))?;
    Ok(())
}

pub fn load_arg_comp<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<ArgumentCompositionNetwork<B>> {
    let sub = dir.join(ARG_COMP_SUBDIR);
    let sizes = read_layer_sizes(&sub.join(LAYER_SIZES_FILE))?;
    if sizes.len() < 2 || sizes[0] % 4 != 0 {
        bail!("arg-comp layer sizes {:?} in {} are malformed", sizes, sub.display());
    }
    let dim = sizes[0] / 4;
    let net = ArgumentCompositionNetwork::<B>::new(dim, &sizes[1..], 0, device)?;
    let record = WeightRecorder::new()
        .load(sub.join(WEIGHTS_FILE), device)
        .with_context(|| format!("load arg-comp weights under {}", sub.display()))?;
    Ok(net.load_record(record))
}

pub fn has_arg_comp(dir: &Path) -> bool {
    dir.join(ARG_COMP_SUBDIR).join(LAYER_SIZES_FILE).is_file()
}

/* ------------------ pair composition ------------------ */

pub fn save_pair_comp<B: Backend>(dir: &Path, net: &PairCompositionNetwork<B>) -> Result<()> {
    write_layer_sizes(&dir.join(LAYER_SIZES_FILE), &net.layer_sizes())?;
    WeightRecorder::new()
        .record(net.clone().into_record(), dir.join(WEIGHTS_FILE))
        .with_context(|| format!("record pair-comp weights under {}", dir.display()))?;
    Ok(())
}

pub fn load_pair_comp<B: Backend>(
    dir: &Path,
    event_dim: usize,
    device: &B::Device,
) -> Result<PairCompositionNetwork<B>> {
    let sizes = read_layer_sizes(&dir.join(LAYER_SIZES_FILE))?;
    let input_dim = sizes[0];
    if input_dim < 2 * event_dim + 1 {
        bail!(
            "pair-comp input width {} in {} is too small for event dim {}",
            input_dim,
            dir.display(),
            event_dim
        );
    }
    let salience_dim = input_dim - 2 * event_dim - 1;
    if salience_dim != 0 && salience_dim != SALIENCE_DIM {
        bail!(
            "pair-comp salience width {} in {} is neither 0 nor {}",
            salience_dim,
            dir.display(),
            SALIENCE_DIM
        );
    }
    let net =
        PairCompositionNetwork::<B>::new(event_dim, salience_dim, &sizes[1..], 0, device);
    let record = WeightRecorder::new()
        .load(dir.join(WEIGHTS_FILE), device)
        .with_context(|| format!("load pair-comp weights under {}", dir.display()))?;
    Ok(net.load_record(record))
}

pub fn has_pair_comp(dir: &Path) -> bool {
    dir.join(LAYER_SIZES_FILE).is_file()
}

/* ------------------ word embedding ------------------ */

pub fn save_embedding(dir: &Path, store: &WordVectorStore) -> Result<()> {
    store.save(&dir.join(EMBEDDING_VOCAB), &dir.join(EMBEDDING_BIN))
}

pub fn load_embedding(dir: &Path) -> Result<WordVectorStore> {
    WordVectorStore::load(&dir.join(EMBEDDING_VOCAB), &dir.join(EMBEDDING_BIN))
}

pub fn has_embedding(dir: &Path) -> bool {
    dir.join(EMBEDDING_VOCAB).is_file() && dir.join(EMBEDDING_BIN).is_file()
}

/// Writes the updated embedding matrix back into the host store before it
/// is saved, after input-vector fine tuning.
pub fn sync_store<B: Backend>(store: &mut WordVectorStore, embedding: &WordEmbedding<B>) -> Result<()> {
    store.set_raw(embedding.to_raw())
}
