use std::collections::{HashMap, HashSet};

use event_comp::corpus::{
    write_event_records, write_triple_records, CorpusWriter, IndexedCorpus, PAIR_WIDTH,
    PRETRAIN_WIDTH,
};
use event_comp::document::{CorefChain, DepEdge, DocToken, Document, Sentence};
use event_comp::script::{
    EventIndexer, IndexedEvent, IndexedTriple, Mention, NegSampleMode, NerTag,
    PredicateSubsampler, Script, ScriptBuilder, SLOT_OBJ, SLOT_SUBJ,
};
use event_comp::vocab::WordVectorStore;
use tempfile::TempDir;

fn event(base: i64) -> IndexedEvent {
    IndexedEvent::new(base, base + 1, base + 2, base + 3)
}

fn triple(base: i64, slot: usize) -> IndexedTriple {
    let pos = event(base + 10);
    IndexedTriple {
        left: event(base),
        pos,
        neg: pos.with_slot(slot, base + 99),
        slot,
    }
}

#[test]
fn event_corpus_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut writer = CorpusWriter::create(dir.path(), false, 1000).unwrap();
    for i in 0..25 {
        writer.write_event(&event(i * 100)).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), 25);

    let corpus = IndexedCorpus::open(dir.path(), PRETRAIN_WIDTH).unwrap();
    assert_eq!(corpus.len(), 25);
    assert_eq!(corpus.num_batches(10), 3);

    let mut seen = HashSet::new();
    for batch in corpus.batches(10, 1) {
        let events = batch.unwrap().as_events().unwrap();
        for i in 0..events.len() {
            let e = events.get(i);
            // Row alignment: all four columns come from the same record.
            assert_eq!(e.subj, e.pred + 1);
            assert_eq!(e.obj, e.pred + 2);
            assert_eq!(e.pobj, e.pred + 3);
            seen.insert(e.pred);
        }
    }
    assert_eq!(seen.len(), 25);
}

#[test]
fn compressed_triple_corpus_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut writer = CorpusWriter::create(dir.path(), true, 4).unwrap();
    for i in 0..10 {
        let slot = if i % 2 == 0 { SLOT_SUBJ } else { SLOT_OBJ };
        writer.write_triple(&triple(i * 1000, slot)).unwrap();
    }
    writer.finish().unwrap();

    // 10 records at 4 per shard: three .bz2 shards plus line_count.
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["line_count", "shard-0000.bz2", "shard-0001.bz2", "shard-0002.bz2"]
    );

    let corpus = IndexedCorpus::open(dir.path(), PAIR_WIDTH).unwrap();
    assert_eq!(corpus.len(), 10);

    let mut rows = 0usize;
    for batch in corpus.batches(3, 99) {
        let triples = batch.unwrap().as_triples().unwrap();
        for i in 0..triples.len() {
            let t = IndexedTriple {
                left: triples.left.get(i),
                pos: triples.pos.get(i),
                neg: triples.neg.get(i),
                slot: triples.slot[i] as usize,
            };
            // The shuffle permutes whole rows, so pos and neg still differ
            // only in the slot under test.
            t.validate().unwrap();
            rows += 1;
        }
    }
    assert_eq!(rows, 10);
}

#[test]
fn in_batch_shuffle_is_seed_stable() {
    let dir = TempDir::new().unwrap();
    let mut writer = CorpusWriter::create(dir.path(), false, 1000).unwrap();
    for i in 0..20 {
        writer.write_event(&event(i)).unwrap();
    }
    writer.finish().unwrap();

    let corpus = IndexedCorpus::open(dir.path(), PRETRAIN_WIDTH).unwrap();
    let order = |seed: u64| -> Vec<i64> {
        corpus
            .batches(20, seed)
            .map(|b| b.unwrap().as_events().unwrap().pred)
            .flatten()
            .collect()
    };
    assert_eq!(order(5), order(5));
    assert_ne!(order(5), order(6));
}

#[test]
fn missing_directory_is_a_fatal_open_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    let err = IndexedCorpus::open(&missing, PRETRAIN_WIDTH).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn missing_line_count_is_a_fatal_open_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("shard-0000"), "1,2,3,4\n").unwrap();
    assert!(IndexedCorpus::open(dir.path(), PRETRAIN_WIDTH).is_err());
}

/* ------------------ script -> corpus pipeline ------------------ */

/// Three one-verb sentences, each subject a singleton coref chain.
fn three_event_script() -> Script {
    let people = ["Alice", "Bob", "Carol"];
    let verbs = [("bought", "buy"), ("sold", "sell"), ("read", "read")];
    let mut tokens = Vec::new();
    let mut deps = Vec::new();
    let mut corefs = Vec::new();
    for (i, (name, (word, lemma))) in people.iter().zip(verbs.iter()).enumerate() {
        let n = 2 * i;
        tokens.push(DocToken::new(n, name, &name.to_lowercase(), "NNP", Some(NerTag::Per)));
        tokens.push(DocToken::new(n + 1, word, lemma, "VBD", None));
        deps.push(DepEdge::new("nsubj", n + 1, n));
        corefs.push(CorefChain {
            mentions: vec![Mention {
                sent: 0,
                start: n,
                end: n + 1,
                head: n,
                representative: true,
                ner: Some(NerTag::Per),
                tokens: vec![name.to_string()],
            }],
        });
    }
    let doc = Document {
        name: "doc-pipeline".to_string(),
        sentences: vec![Sentence { tokens, deps }],
        corefs,
    };
    ScriptBuilder::default().build(&doc).unwrap()
}

fn pipeline_store() -> WordVectorStore {
    let words = ["buy-PRED", "sell-PRED", "read-PRED", "alice-SUBJ", "bob-SUBJ", "carol-SUBJ"];
    let dim = 4;
    let mut vectors = Vec::with_capacity(words.len() * dim);
    for i in 0..words.len() {
        for j in 0..dim {
            vectors.push(((i * dim + j) as f32 + 1.0).sin() + 1.5);
        }
    }
    WordVectorStore::new(words.iter().map(|s| s.to_string()).collect(), dim, vectors).unwrap()
}

#[test]
fn event_pipeline_produces_a_loadable_corpus() {
    let dir = TempDir::new().unwrap();
    let script = three_event_script();
    let store = pipeline_store();
    let indexer = EventIndexer::new(&store, true);

    let mut writer = CorpusWriter::create(dir.path(), false, 1000).unwrap();
    let written =
        write_event_records(std::slice::from_ref(&script), &indexer, None, &mut writer).unwrap();
    assert_eq!(written, 3);
    assert_eq!(writer.finish().unwrap(), 3);

    let corpus = IndexedCorpus::open(dir.path(), PRETRAIN_WIDTH).unwrap();
    assert_eq!(corpus.len(), 3);
    let mut preds = HashSet::new();
    for batch in corpus.batches(10, 0) {
        let events = batch.unwrap().as_events().unwrap();
        for i in 0..events.len() {
            let e = events.get(i);
            preds.insert(e.pred);
            assert!(e.subj >= 0);
            assert_eq!(e.obj, -1);
            assert_eq!(e.pobj, -1);
        }
    }
    let expected: HashSet<i64> = ["buy-PRED", "sell-PRED", "read-PRED"]
        .iter()
        .map(|w| store.index(w).unwrap() as i64)
        .collect();
    assert_eq!(preds, expected);
}

#[test]
fn triple_pipeline_produces_a_loadable_corpus() {
    let dir = TempDir::new().unwrap();
    let script = three_event_script();
    let store = pipeline_store();
    let indexer = EventIndexer::new(&store, true);

    let mut writer = CorpusWriter::create(dir.path(), true, 1000).unwrap();
    // Three events, one linked subject each, two negative entities: six
    // triples under per-negative sampling.
    let written = write_triple_records(
        std::slice::from_ref(&script),
        &indexer,
        NegSampleMode::Neg,
        17,
        None,
        &mut writer,
    )
    .unwrap();
    assert_eq!(written, 6);
    writer.finish().unwrap();

    let corpus = IndexedCorpus::open(dir.path(), PAIR_WIDTH).unwrap();
    assert_eq!(corpus.len(), 6);
    for batch in corpus.batches(10, 0) {
        let triples = batch.unwrap().as_triples().unwrap();
        for i in 0..triples.len() {
            let t = IndexedTriple {
                left: triples.left.get(i),
                pos: triples.pos.get(i),
                neg: triples.neg.get(i),
                slot: triples.slot[i] as usize,
            };
            t.validate().unwrap();
            assert_eq!(t.slot, SLOT_SUBJ);
        }
    }
}

/// A zero threshold maps every listed predicate to keep probability zero,
/// which makes the subsampler deterministic.
#[test]
fn subsampled_predicates_leave_the_emitted_stream() {
    let script = three_event_script();
    let store = pipeline_store();
    let indexer = EventIndexer::new(&store, true);

    let mut counts = HashMap::new();
    counts.insert("buy".to_string(), 100u64);
    counts.insert("sell".to_string(), 100u64);

    let events_dir = TempDir::new().unwrap();
    let mut sampler = PredicateSubsampler::new(0.0, &counts, 5);
    let mut writer = CorpusWriter::create(events_dir.path(), false, 1000).unwrap();
    let written = write_event_records(
        std::slice::from_ref(&script),
        &indexer,
        Some(&mut sampler),
        &mut writer,
    )
    .unwrap();
    writer.finish().unwrap();
    // "read" is not in the table, so it survives alone.
    assert_eq!(written, 1);

    let corpus = IndexedCorpus::open(events_dir.path(), PRETRAIN_WIDTH).unwrap();
    let batch = corpus.batches(10, 0).next().unwrap().unwrap();
    let events = batch.as_events().unwrap();
    assert_eq!(events.get(0).pred, store.index("read-PRED").unwrap() as i64);

    // Dropping "buy" before triple generation removes its positives and
    // its context appearances: two events remain, one context each.
    let mut counts = HashMap::new();
    counts.insert("buy".to_string(), 100u64);
    let triples_dir = TempDir::new().unwrap();
    let mut sampler = PredicateSubsampler::new(0.0, &counts, 5);
    let mut writer = CorpusWriter::create(triples_dir.path(), false, 1000).unwrap();
    let written = write_triple_records(
        std::slice::from_ref(&script),
        &indexer,
        NegSampleMode::Neg,
        17,
        Some(&mut sampler),
        &mut writer,
    )
    .unwrap();
    writer.finish().unwrap();
    assert_eq!(written, 4);
}

#[test]
fn malformed_record_surfaces_as_batch_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("shard-0000"), "1,2,three,4\n").unwrap();
    std::fs::write(dir.path().join("line_count"), "1\n").unwrap();
    let corpus = IndexedCorpus::open(dir.path(), PRETRAIN_WIDTH).unwrap();
    let first = corpus.batches(10, 0).next().unwrap();
    assert!(first.is_err());
}
