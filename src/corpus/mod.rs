// corpus/mod.rs
//
// On-disk indexed corpus: a directory of line-oriented shards (bz2 when the
// name says so) plus a `line_count` file, streamed as fixed-width integer
// minibatches. Pretraining records are 4 wide; pair-tuning records are 13
// wide (three 4-tuples and a trailing slot).

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::script::types::{EventBatch, IndexedEvent, IndexedTriple, TripleBatch};

pub mod build;
pub use build::{write_event_records, write_triple_records};

pub const PRETRAIN_WIDTH: usize = 4;
pub const PAIR_WIDTH: usize = 13;

const LINE_COUNT_FILE: &str = "line_count";

/* --------------------- reading --------------------- */

#[derive(Debug)]
pub struct IndexedCorpus {
    dir: PathBuf,
    shards: Vec<PathBuf>,
    len: usize,
    width: usize,
}

impl IndexedCorpus {
    /// Opens a corpus directory. A missing directory or `line_count` file is
    /// a fatal start-up error, reported with the absolute path.
    pub fn open(dir: &Path, width: usize) -> Result<Self> {
        let abs = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        if !dir.is_dir() {
            bail!("indexed corpus directory not found: {}", abs.display());
        }
        let count_path = dir.join(LINE_COUNT_FILE);
        let len: usize = fs::read_to_string(&count_path)
            .with_context(|| format!("missing line_count in {}", abs.display()))?
            .trim()
            .parse()
            .with_context(|| format!("unparseable line_count in {}", abs.display()))?;

        let mut shards: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .map(|n| n != LINE_COUNT_FILE)
                        .unwrap_or(false)
            })
            .collect();
        shards.sort();
        if shards.is_empty() {
            bail!("no corpus shards in {}", abs.display());
        }
        Ok(Self { dir: dir.to_path_buf(), shards, len, width })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len.div_ceil(batch_size)
    }

    /// Streams minibatches of `batch_size` rows. A fresh permutation is
    /// drawn per batch and applied to whole rows, so the parallel columns
    /// of a record stay aligned.
    pub fn batches(&self, batch_size: usize, shuffle_seed: u64) -> BatchIter {
        BatchIter {
            shards: self.shards.clone(),
            next_shard: 0,
            reader: None,
            width: self.width,
            batch_size,
            rng: fastrand::Rng::with_seed(shuffle_seed),
            done: false,
        }
    }
}

fn open_shard(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).with_context(|| format!("open corpus shard {}", path.display()))?;
    let is_bz2 = path
        .extension()
        .map(|e| e == "bz2")
        .unwrap_or(false);
    if is_bz2 {
        Ok(Box::new(BufReader::new(BzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

fn parse_record(line: &str, width: usize) -> Result<Vec<i64>> {
    let mut out = Vec::with_capacity(width);
    let ints = if width == PAIR_WIDTH {
        let (ints, slot) = line
            .rsplit_once(" / ")
            .with_context(|| format!("pair record '{}' missing slot separator", line))?;
        out.push(
            slot.trim()
                .parse::<i64>()
                .with_context(|| format!("pair record '{}' slot", line))?,
        );
        ints
    } else {
        line
    };
    let mut values = Vec::with_capacity(width);
    for field in ints.trim().split(',') {
        values.push(
            field
                .trim()
                .parse::<i64>()
                .with_context(|| format!("record '{}' field '{}'", line, field))?,
        );
    }
    values.extend(out); // slot goes last
    if values.len() != width {
        bail!("record '{}' has {} values, expected {}", line, values.len(), width);
    }
    Ok(values)
}

/// One minibatch of fixed-width rows.
#[derive(Debug, Clone)]
pub struct Batch {
    pub rows: Vec<Vec<i64>>,
    pub width: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_events(&self) -> Result<EventBatch> {
        if self.width != PRETRAIN_WIDTH {
            bail!("batch width {} is not an event batch", self.width);
        }
        let mut out = EventBatch::with_capacity(self.rows.len());
        for r in &self.rows {
            out.push(IndexedEvent::new(r[0], r[1], r[2], r[3]));
        }
        Ok(out)
    }

    pub fn as_triples(&self) -> Result<TripleBatch> {
        if self.width != PAIR_WIDTH {
            bail!("batch width {} is not a triple batch", self.width);
        }
        let mut out = TripleBatch::default();
        for r in &self.rows {
            out.push(IndexedTriple {
                left: IndexedEvent::new(r[0], r[1], r[2], r[3]),
                pos: IndexedEvent::new(r[4], r[5], r[6], r[7]),
                neg: IndexedEvent::new(r[8], r[9], r[10], r[11]),
                slot: r[12] as usize,
            });
        }
        Ok(out)
    }
}

pub struct BatchIter {
    shards: Vec<PathBuf>,
    next_shard: usize,
    reader: Option<Box<dyn BufRead>>,
    width: usize,
    batch_size: usize,
    rng: fastrand::Rng,
    done: bool,
}

impl BatchIter {
    fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if self.reader.is_none() {
                if self.next_shard >= self.shards.len() {
                    return Ok(None);
                }
                self.reader = Some(open_shard(&self.shards[self.next_shard])?);
                self.next_shard += 1;
            }
            let mut line = String::new();
            let n = self
                .reader
                .as_mut()
                .unwrap()
                .read_line(&mut line)?;
            if n == 0 {
                self.reader = None;
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }
}

impl Iterator for BatchIter {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut rows = Vec::with_capacity(self.batch_size);
        while rows.len() < self.batch_size {
            match self.next_line() {
                Ok(Some(line)) => match parse_record(&line, self.width) {
                    Ok(r) => rows.push(r),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        if rows.is_empty() {
            self.done = true;
            return None;
        }
        // In-batch shuffle: one permutation applied to whole rows.
        let mut order: Vec<usize> = (0..rows.len()).collect();
        self.rng.shuffle(&mut order);
        let shuffled: Vec<Vec<i64>> = order.into_iter().map(|i| rows[i].clone()).collect();
        Some(Ok(Batch { rows: shuffled, width: self.width }))
    }
}

/* --------------------- writing --------------------- */

/// Streams indexed records into sharded files and writes `line_count` at
/// the end. Dropping the writer without `finish` loses the count file.
pub struct CorpusWriter {
    dir: PathBuf,
    compress: bool,
    shard_cap: usize,
    shard_idx: usize,
    in_shard: usize,
    count: usize,
    sink: Option<Sink>,
}

enum Sink {
    Plain(BufWriter<File>),
    Bz2(BzEncoder<BufWriter<File>>),
}

impl Sink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        match self {
            Sink::Plain(w) => {
                w.write_all(line.as_bytes())?;
                w.write_all(b"\n")?;
            }
            Sink::Bz2(w) => {
                w.write_all(line.as_bytes())?;
                w.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Bz2(w) => {
                w.finish()?.flush()?;
            }
        }
        Ok(())
    }
}

impl CorpusWriter {
    pub fn create(dir: &Path, compress: bool, shard_cap: usize) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create corpus directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            compress,
            shard_cap: shard_cap.max(1),
            shard_idx: 0,
            in_shard: 0,
            count: 0,
            sink: None,
        })
    }

    fn roll_shard(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.take() {
            sink.finish()?;
        }
        let name = if self.compress {
            format!("shard-{:04}.bz2", self.shard_idx)
        } else {
            format!("shard-{:04}", self.shard_idx)
        };
        let f = BufWriter::new(File::create(self.dir.join(&name))?);
        self.sink = Some(if self.compress {
            Sink::Bz2(BzEncoder::new(f, Compression::default()))
        } else {
            Sink::Plain(f)
        });
        self.shard_idx += 1;
        self.in_shard = 0;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        if self.sink.is_none() || self.in_shard >= self.shard_cap {
            self.roll_shard()?;
        }
        self.sink.as_mut().unwrap().write_line(line)?;
        self.in_shard += 1;
        self.count += 1;
        Ok(())
    }

    pub fn write_event(&mut self, e: &IndexedEvent) -> Result<()> {
        self.write_line(&format!("{},{},{},{}", e.pred, e.subj, e.obj, e.pobj))
    }

    pub fn write_triple(&mut self, t: &IndexedTriple) -> Result<()> {
        let l = t.left.as_array();
        let p = t.pos.as_array();
        let n = t.neg.as_array();
        self.write_line(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{} / {}",
            l[0], l[1], l[2], l[3], p[0], p[1], p[2], p[3], n[0], n[1], n[2], n[3], t.slot
        ))
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(mut self) -> Result<usize> {
        if let Some(sink) = self.sink.take() {
            sink.finish()?;
        }
        fs::write(self.dir.join(LINE_COUNT_FILE), format!("{}\n", self.count))?;
        Ok(self.count)
    }
}
