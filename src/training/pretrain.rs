// training/pretrain.rs
//
// Greedy layerwise pretraining of the argument composition network. Each
// layer is trained on the (frozen) output of the layers below it, with
// corrupted inputs and an L2-penalised reconstruction loss.

use std::path::Path;

use anyhow::{Context, Result};
use burn::module::Module;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::corpus::IndexedCorpus;
use crate::network::{corruption_mask, ArgumentCompositionNetwork, DenoisingAutoencoder};
use crate::training::config::PretrainConfig;
use crate::training::snapshot;
use crate::vocab::{WordEmbedding, WordVectorStore};

pub struct AutoencoderPretrainer<B: AutodiffBackend> {
    cfg: PretrainConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> AutoencoderPretrainer<B> {
    pub fn new(cfg: PretrainConfig, device: B::Device) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg, device })
    }

    /// Trains every layer of `net` in turn, snapshotting under
    /// `<model_dir>/pretraining/`. The embedding matrix is frozen; only the
    /// layer currently being trained receives updates.
    pub fn train(
        &self,
        store: &WordVectorStore,
        mut net: ArgumentCompositionNetwork<B>,
        corpus: &IndexedCorpus,
        model_dir: &Path,
    ) -> Result<ArgumentCompositionNetwork<B>> {
        let embedding = WordEmbedding::<B>::from_store(store, &self.device).no_grad();
        let depth = net.depth();
        eprintln!(
            "[pretrain] corpus={} records={} layers={:?}",
            corpus.dir().display(),
            corpus.len(),
            net.layer_sizes()
        );

        let mut mask_rng = ChaCha20Rng::seed_from_u64(self.cfg.seed);

        for layer_idx in 0..depth {
            let name = if layer_idx == 0 {
                "init".to_string()
            } else {
                format!("layer_{}", layer_idx - 1)
            };
            self.snapshot(model_dir, &name, &net, store)?;

            let mut layer = net.stack.layers[layer_idx].clone();
            let mut opt = SgdConfig::new().init::<B, DenoisingAutoencoder<B>>();

            for epoch in 0..self.cfg.iterations {
                let mut total = 0.0f64;
                let mut batches = 0usize;
                let shuffle_seed = self
                    .cfg
                    .seed
                    .wrapping_add((layer_idx * 1000 + epoch) as u64);
                for batch in corpus.batches(self.cfg.batch_size, shuffle_seed) {
                    let batch = batch.context("read pretraining batch")?;
                    let events = batch.as_events()?;
                    // Visible input to this layer: the stack below is fixed
                    // while the layer trains, so cut the graph here.
                    let x = net
                        .layer_input(layer_idx, &embedding, &events, &self.device)
                        .detach();
                    let [rows, cols] = x.dims();
                    let mask = corruption_mask::<B>(
                        rows,
                        cols,
                        self.cfg.corruption,
                        &mut mask_rng,
                        &self.device,
                    );
                    let corrupted = x.clone() * mask;

                    let mse = layer.reconstruction_loss(corrupted, x);
                    let reg = layer
                        .weight_squares()
                        .mul_scalar(self.cfg.regularization);
                    let loss = mse + reg;

                    let value = loss
                        .clone()
                        .into_data()
                        .as_slice::<f32>()
                        .map(|s| s[0] as f64)
                        .unwrap_or(f64::NAN);
                    total += value;
                    batches += 1;

                    let grads = GradientsParams::from_grads(loss.backward(), &layer);
                    layer = opt.step(self.cfg.lr, layer, grads);
                }
                let mean = if batches > 0 { total / batches as f64 } else { 0.0 };
                eprintln!("[pretrain layer {} epoch {}] cost={:.6}", layer_idx, epoch, mean);
            }

            net.stack.layers[layer_idx] = layer;
            self.snapshot(model_dir, &format!("layer_{}", layer_idx), &net, store)?;
        }

        self.snapshot(model_dir, "finish", &net, store)?;
        Ok(net)
    }

    fn snapshot(
        &self,
        model_dir: &Path,
        name: &str,
        net: &ArgumentCompositionNetwork<B>,
        store: &WordVectorStore,
    ) -> Result<()> {
        let dir = snapshot::snapshot_dir(model_dir, snapshot::PRETRAIN_SUBDIR, name)?;
        snapshot::save_arg_comp(&dir, net)?;
        // The embedding is untouched by pretraining; persist it once at the
        // end so the snapshot tree is self-contained.
        if name == "finish" {
            snapshot::save_embedding(&dir, store)?;
        }
        eprintln!("[ckpt] saved {}", dir.display());
        Ok(())
    }
}
