// bin/index_corpus.rs
//
// Stage 0: turn a text script corpus into the sharded integer corpora the
// trainers consume. Without --triples it writes one 4-tuple per event for
// pretraining; with --triples it writes pair-tuning triples.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use event_comp::corpus::{write_event_records, write_triple_records, CorpusWriter};
use event_comp::script::{read_corpus, EventIndexer, NegSampleMode, PredicateSubsampler};
use event_comp::vocab::WordVectorStore;

#[derive(Parser, Debug)]
#[command(
    name = "index-corpus",
    version,
    about = "Index a script corpus into sharded training records"
)]
struct Args {
    /// Script corpus in the text format
    #[arg(long)]
    scripts: PathBuf,

    /// Vocabulary text file for the base word vectors
    #[arg(long)]
    vocab: PathBuf,

    /// Little-endian f32 binary matrix for the base word vectors
    #[arg(long)]
    vectors: PathBuf,

    /// Output directory for the shards and line_count file
    #[arg(long)]
    output: PathBuf,

    /// Write pair-tuning triples instead of pretraining events
    #[arg(long)]
    triples: bool,

    /// Negative-sampling mode for --triples: one, neg or all
    #[arg(long, default_value = "one")]
    neg_mode: String,

    /// bz2-compress the shards
    #[arg(long)]
    compress: bool,

    /// Records per shard
    #[arg(long, default_value_t = 100_000)]
    shard_size: usize,

    /// Optional JSON map of predicate core -> corpus count; enables
    /// high-frequency predicate subsampling
    #[arg(long)]
    pred_counts: Option<PathBuf>,

    /// Subsampling threshold t: keep probability is sqrt(t / f)
    #[arg(long, default_value_t = 1e-4)]
    subsample: f64,

    /// Index surface words instead of lemmas
    #[arg(long)]
    no_lemma: bool,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let store = WordVectorStore::load(&args.vocab, &args.vectors)?;
    eprintln!("[vocab] {} words, dim {}", store.len(), store.dim());

    let file = File::open(&args.scripts)
        .with_context(|| format!("open script corpus {}", args.scripts.display()))?;
    let scripts = read_corpus(BufReader::new(file))?;
    eprintln!("[data] {} scripts from {}", scripts.len(), args.scripts.display());

    let mut subsampler = match &args.pred_counts {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("open predicate counts {}", path.display()))?;
            let counts: HashMap<String, u64> = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parse predicate counts {}", path.display()))?;
            Some(PredicateSubsampler::new(args.subsample, &counts, args.seed))
        }
        None => None,
    };

    let indexer = EventIndexer::new(&store, !args.no_lemma);
    let mut writer = CorpusWriter::create(&args.output, args.compress, args.shard_size)?;
    let written = if args.triples {
        let mode = NegSampleMode::parse(&args.neg_mode)?;
        write_triple_records(
            &scripts,
            &indexer,
            mode,
            args.seed,
            subsampler.as_mut(),
            &mut writer,
        )?
    } else {
        write_event_records(&scripts, &indexer, subsampler.as_mut(), &mut writer)?
    };
    writer.finish()?;
    eprintln!("[data] wrote {} records to {}", written, args.output.display());
    Ok(())
}
