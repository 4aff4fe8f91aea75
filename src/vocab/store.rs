// vocab/store.rs
//
// Read-only map from token strings to rows of a unit-normalised embedding
// matrix, with the slot-conditioned lookup chain used when indexing event
// arguments. The matrix rows become trainable parameters only when the
// pair fine tuner enables input-vector updates.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::script::types::NerTag;

/// Which slot a token is being resolved for. The tag conditions the
/// vocabulary form tried first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTag {
    Pred,
    Subj,
    Obj,
    Prep(String),
}

impl SlotTag {
    pub fn suffix(&self) -> String {
        match self {
            SlotTag::Pred => "PRED".to_string(),
            SlotTag::Subj => "SUBJ".to_string(),
            SlotTag::Obj => "OBJ".to_string(),
            SlotTag::Prep(p) => format!("PREP_{}", p),
        }
    }

    pub fn is_prep(&self) -> bool {
        matches!(self, SlotTag::Prep(_))
    }
}

pub struct WordVectorStore {
    words: Vec<String>,
    index: HashMap<String, usize>,
    dim: usize,
    vectors: Vec<f32>, // row-major, len = words.len() * dim
    /// When set, every lookup back-off is reported on stderr so coverage
    /// rates can be asserted by a test harness.
    pub log_backoff: bool,
}

impl WordVectorStore {
    /// Builds a store from raw rows; rows are L2-normalised in place.
    pub fn new(words: Vec<String>, dim: usize, mut vectors: Vec<f32>) -> Result<Self> {
        if vectors.len() != words.len() * dim {
            bail!(
                "vector data has {} floats for {} words of dim {}",
                vectors.len(),
                words.len(),
                dim
            );
        }
        for row in vectors.chunks_mut(dim) {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 1e-12 {
                for x in row.iter_mut() {
                    *x /= norm;
                }
            }
        }
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Ok(Self { words, index, dim, vectors, log_backoff: false })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn word(&self, i: usize) -> Option<&str> {
        self.words.get(i).map(|s| s.as_str())
    }

    pub fn index(&self, text: &str) -> Option<usize> {
        self.index.get(text).copied()
    }

    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        if i < self.words.len() {
            Some(&self.vectors[i * self.dim..(i + 1) * self.dim])
        } else {
            None
        }
    }

    pub fn raw(&self) -> &[f32] {
        &self.vectors
    }

    /// Slot-conditioned lookup with NER and UNK back-offs. Candidates are
    /// tried in order; the first hit wins, -1 when even UNK is absent.
    pub fn lookup(&self, core: &str, ner: Option<NerTag>, slot: &SlotTag) -> i64 {
        let suffix = slot.suffix();
        let mut candidates = vec![format!("{}-{}", core, suffix)];
        if slot.is_prep() {
            candidates.push(format!("{}-PREP", core));
        }
        if let Some(tag) = ner {
            candidates.push(format!("{}-{}", tag.as_str(), suffix));
            if slot.is_prep() {
                candidates.push(format!("{}-PREP", tag.as_str()));
            }
        }
        candidates.push(format!("UNK-{}", suffix));

        for (ci, cand) in candidates.iter().enumerate() {
            if let Some(i) = self.index(cand) {
                if ci > 0 && self.log_backoff {
                    eprintln!("[vocab] backoff {} -> {}", candidates[0], cand);
                }
                return i as i64;
            }
        }
        if self.log_backoff {
            eprintln!("[vocab] no row for {} (slot {})", core, suffix);
        }
        -1
    }

    /// Cosine nearest neighbours of a query vector over the normalised rows.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let qn: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        if qn < 1e-12 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| {
                let row = self.vector(i).unwrap();
                let dot: f32 = row.iter().zip(query).map(|(a, b)| a * b).sum();
                (i, dot / qn)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Overwrites the matrix rows, e.g. after input-vector fine tuning.
    pub fn set_raw(&mut self, vectors: Vec<f32>) -> Result<()> {
        if vectors.len() != self.words.len() * self.dim {
            bail!(
                "updated matrix has {} floats, store expects {}",
                vectors.len(),
                self.words.len() * self.dim
            );
        }
        self.vectors = vectors;
        Ok(())
    }

    /* ------------------ on-disk format ------------------ */

    /// Loads a store from a vocabulary text file (`N D` header, one word per
    /// line) and an adjacent little-endian f32 binary matrix.
    pub fn load(vocab_path: &Path, bin_path: &Path) -> Result<Self> {
        let vf = File::open(vocab_path)
            .with_context(|| format!("open vocabulary file {}", vocab_path.display()))?;
        let mut lines = BufReader::new(vf).lines();
        let header = lines
            .next()
            .context("vocabulary file is empty")??;
        let mut parts = header.split_whitespace();
        let n: usize = parts
            .next()
            .context("vocabulary header missing row count")?
            .parse()?;
        let dim: usize = parts
            .next()
            .context("vocabulary header missing dimension")?
            .parse()?;
        let mut words = Vec::with_capacity(n);
        for line in lines {
            words.push(line?);
        }
        if words.len() != n {
            bail!(
                "vocabulary {} declares {} words but carries {}",
                vocab_path.display(),
                n,
                words.len()
            );
        }

        let mut bf = File::open(bin_path)
            .with_context(|| format!("open embedding file {}", bin_path.display()))?;
        let mut bytes = Vec::new();
        bf.read_to_end(&mut bytes)?;
        if bytes.len() != n * dim * 4 {
            bail!(
                "embedding file {} has {} bytes, expected {}",
                bin_path.display(),
                bytes.len(),
                n * dim * 4
            );
        }
        let vectors: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::new(words, dim, vectors)
    }

    pub fn save(&self, vocab_path: &Path, bin_path: &Path) -> Result<()> {
        let mut vf = BufWriter::new(File::create(vocab_path).with_context(|| {
            format!("create vocabulary file {}", vocab_path.display())
        })?);
        writeln!(vf, "{} {}", self.words.len(), self.dim)?;
        for w in &self.words {
            writeln!(vf, "{}", w)?;
        }
        vf.flush()?;

        let mut bf = BufWriter::new(File::create(bin_path).with_context(|| {
            format!("create embedding file {}", bin_path.display())
        })?);
        for x in &self.vectors {
            bf.write_all(&x.to_le_bytes())?;
        }
        bf.flush()?;
        Ok(())
    }
}
