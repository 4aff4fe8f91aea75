// training/finetune.rs
//
// Discriminative fine tuning of the pair composition network with the
// triple objective, optionally flowing updates into the event-composition
// stack, the empty-slot vectors and the word vectors themselves.

use std::path::Path;

use anyhow::{Context, Result};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;

use crate::corpus::IndexedCorpus;
use crate::network::triple_loss;
use crate::training::config::FineTuneConfig;
use crate::training::model::EventCompositionModel;
use crate::training::snapshot;
use crate::vocab::WordVectorStore;

/// Epochs of near-identical cost required before the run stops early.
const CONVERGENCE_STREAK: usize = 5;

/// Learning rate for batch `bi` of `epoch`: a linear ramp from `lr` down to
/// `min_lr` across the first epoch, with the last batch of that epoch
/// landing exactly on `min_lr`. Every later epoch holds `min_lr`.
pub fn batch_lr(cfg: &FineTuneConfig, epoch: usize, bi: usize, num_batch: usize) -> f64 {
    if epoch > 0 {
        return cfg.min_lr;
    }
    let span = (num_batch.saturating_sub(1)).max(1) as f64;
    cfg.lr - (cfg.lr - cfg.min_lr) * (bi as f64 / span)
}

pub struct PairFineTuner<B: AutodiffBackend> {
    cfg: FineTuneConfig,
    device: B::Device,
}

pub struct FineTuneOutcome<B: AutodiffBackend> {
    pub model: EventCompositionModel<B>,
    pub epochs_run: usize,
    pub converged: bool,
    pub final_cost: f64,
}

impl<B: AutodiffBackend> PairFineTuner<B> {
    pub fn new(cfg: FineTuneConfig, device: B::Device) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg, device })
    }

    /// Runs up to `iterations` epochs starting at `start_epoch` (non-zero
    /// when resuming from an `iter_<k>` snapshot). The model must already
    /// have its update flags applied.
    pub fn train(
        &self,
        model: EventCompositionModel<B>,
        store: &mut WordVectorStore,
        corpus: &IndexedCorpus,
        model_dir: &Path,
        start_epoch: usize,
    ) -> Result<FineTuneOutcome<B>> {
        let mut model = model;
        let num_batch = corpus.num_batches(self.cfg.batch_size).max(1);
        eprintln!(
            "[finetune] corpus={} triples={} batches/epoch={} start_epoch={}",
            corpus.dir().display(),
            corpus.len(),
            num_batch,
            start_epoch
        );

        if start_epoch == 0 {
            self.snapshot(model_dir, "init", &model, store)?;
        }

        let mut opt = SgdConfig::new().init::<B, EventCompositionModel<B>>();
        let mut prev_cost: Option<f64> = None;
        let mut streak = 0usize;
        let mut converged = false;
        let mut last_cost = f64::NAN;
        let mut epochs_run = 0usize;

        for epoch in start_epoch..start_epoch + self.cfg.iterations {
            let mut total = 0.0f64;
            let mut batches = 0usize;
            let shuffle_seed = self.cfg.seed.wrapping_add(epoch as u64);

            for (bi, batch) in corpus.batches(self.cfg.batch_size, shuffle_seed).enumerate() {
                let batch = batch.context("read pair-tuning batch")?;
                let triples = batch.as_triples()?;

                let lr = batch_lr(&self.cfg, epoch, bi, num_batch);

                let (c_pos, c_neg) = model.coherence_pair(&triples, None, &self.device)?;
                let data_loss = triple_loss(c_pos, c_neg);
                let (reg_sq, reg_count) = model.regularization(&self.cfg);
                let loss = data_loss
                    + reg_sq.mul_scalar(self.cfg.regularization / reg_count.max(1) as f32);

                let value = loss
                    .clone()
                    .into_data()
                    .as_slice::<f32>()
                    .map(|s| s[0] as f64)
                    .unwrap_or(f64::NAN);
                total += value;
                batches += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = opt.step(lr, model, grads);
            }

            let cost = if batches > 0 { total / batches as f64 } else { 0.0 };
            last_cost = cost;
            epochs_run += 1;
            if cost.is_nan() {
                // Not auto-recovered; the operator reads the log and acts.
                eprintln!("[finetune epoch {}] cost=NaN", epoch);
            } else {
                eprintln!("[finetune epoch {}] cost={:.6}", epoch, cost);
            }

            self.snapshot(model_dir, &self.iter_name(epoch), &model, store)?;

            if let Some(prev) = prev_cost {
                let rel = if prev.abs() > 0.0 {
                    ((prev - cost) / prev).abs()
                } else {
                    0.0
                };
                if rel < self.cfg.tolerance {
                    streak += 1;
                } else {
                    streak = 0;
                }
                if streak >= CONVERGENCE_STREAK {
                    eprintln!("[finetune] converged after epoch {}", epoch);
                    converged = true;
                    break;
                }
            }
            prev_cost = Some(cost);
        }

        let finish = if self.cfg.updates_composition() {
            "finish_full"
        } else {
            "finish"
        };
        self.snapshot(model_dir, finish, &model, store)?;

        Ok(FineTuneOutcome { model, epochs_run, converged, final_cost: last_cost })
    }

    fn iter_name(&self, epoch: usize) -> String {
        if self.cfg.updates_composition() {
            format!("iter_{}_full", epoch)
        } else {
            format!("iter_{}", epoch)
        }
    }

    fn snapshot(
        &self,
        model_dir: &Path,
        name: &str,
        model: &EventCompositionModel<B>,
        store: &mut WordVectorStore,
    ) -> Result<()> {
        let dir = snapshot::snapshot_dir(model_dir, snapshot::FINETUNE_SUBDIR, name)?;
        snapshot::save_pair_comp(&dir, &model.pair_comp)?;
        if self.cfg.updates_composition() {
            snapshot::save_arg_comp(&dir, &model.arg_comp)?;
            if self.cfg.update_input_vectors {
                snapshot::sync_store(store, &model.embedding)?;
            }
            snapshot::save_embedding(&dir, store)?;
        }
        eprintln!("[ckpt] saved {}", dir.display());
        Ok(())
    }
}
