use std::collections::HashMap;

use event_comp::document::{CorefChain, DepEdge, DocToken, Document, Sentence};
use event_comp::script::{
    EventIndexer, Mention, NegSampleMode, NerTag, PredicateSubsampler, ScriptBuilder,
    TripleGenerator, SLOT_SUBJ,
};
use event_comp::vocab::WordVectorStore;

fn mention(sent: usize, start: usize, end: usize, head: usize, rep: bool, ner: Option<NerTag>, tokens: &[&str]) -> Mention {
    Mention {
        sent,
        start,
        end,
        head,
        representative: rep,
        ner,
        tokens: tokens.iter().map(|s| s.to_string()).collect(),
    }
}

/// "Alice bought a book from Bob." with coref chains for Alice and Bob.
fn sample_document() -> Document {
    let tokens = vec![
        DocToken::new(0, "Alice", "alice", "NNP", Some(NerTag::Per)),
        DocToken::new(1, "bought", "buy", "VBD", None),
        DocToken::new(2, "a", "a", "DT", None),
        DocToken::new(3, "book", "book", "NN", None),
        DocToken::new(4, "from", "from", "IN", None),
        DocToken::new(5, "Bob", "bob", "NNP", Some(NerTag::Per)),
    ];
    let deps = vec![
        DepEdge::new("nsubj", 1, 0),
        DepEdge::new("det", 3, 2),
        DepEdge::new("dobj", 1, 3),
        DepEdge::new("case", 5, 4),
        DepEdge::new("nmod:from", 1, 5),
    ];
    Document {
        name: "doc-001".to_string(),
        sentences: vec![Sentence { tokens, deps }],
        corefs: vec![
            CorefChain {
                mentions: vec![mention(0, 0, 1, 0, true, Some(NerTag::Per), &["Alice"])],
            },
            CorefChain {
                mentions: vec![mention(0, 5, 6, 5, true, Some(NerTag::Per), &["Bob"])],
            },
        ],
    }
}

fn store_for(words: &[&str], dim: usize) -> WordVectorStore {
    // Deterministic non-degenerate rows; the store normalises them.
    let mut vectors = Vec::with_capacity(words.len() * dim);
    for i in 0..words.len() {
        for j in 0..dim {
            vectors.push(((i * dim + j) as f32 + 1.0).sin() + 1.5);
        }
    }
    WordVectorStore::new(words.iter().map(|s| s.to_string()).collect(), dim, vectors).unwrap()
}

#[test]
fn builder_extracts_one_event_with_all_roles() {
    let script = ScriptBuilder::default().build(&sample_document()).unwrap();

    assert_eq!(script.entities.len(), 2);
    assert_eq!(script.events.len(), 1);

    let event = &script.events[0];
    assert_eq!(event.predicate.token.lemma, "buy");
    assert!(!event.predicate.negated);

    let subj = event.subject.as_ref().unwrap();
    assert_eq!(subj.entity_idx, 0);
    assert_eq!(subj.token.word, "Alice");

    let obj = event.object.as_ref().unwrap();
    assert_eq!(obj.entity_idx, -1);
    assert_eq!(obj.token.lemma, "book");

    assert_eq!(event.pobjs.len(), 1);
    assert_eq!(event.pobjs[0].0, "from");
    assert_eq!(event.pobjs[0].1.entity_idx, 1);
}

#[test]
fn copula_and_xcomp_verbs_are_skipped() {
    let mut doc = sample_document();
    // "Alice was happy" style copula plus an xcomp-governed verb.
    doc.sentences[0].tokens.push(DocToken::new(6, "was", "be", "VBD", None));
    doc.sentences[0].tokens.push(DocToken::new(7, "running", "run", "VBG", None));
    doc.sentences[0].deps.push(DepEdge::new("nsubj", 6, 0));
    doc.sentences[0].deps.push(DepEdge::new("xcomp", 1, 7));
    doc.sentences[0].deps.push(DepEdge::new("nsubj", 7, 0));

    let script = ScriptBuilder::default().build(&doc).unwrap();
    assert_eq!(script.events.len(), 1);
    assert_eq!(script.events[0].predicate.token.lemma, "buy");
}

#[test]
fn negation_and_particle_are_picked_up() {
    let mut doc = sample_document();
    doc.sentences[0].tokens.push(DocToken::new(6, "not", "not", "RB", None));
    doc.sentences[0].tokens.push(DocToken::new(7, "up", "up", "RP", None));
    doc.sentences[0].deps.push(DepEdge::new("neg", 1, 6));
    doc.sentences[0].deps.push(DepEdge::new("compound:prt", 1, 7));

    let script = ScriptBuilder::default().build(&doc).unwrap();
    let pred = &script.events[0].predicate;
    assert!(pred.negated);
    assert_eq!(pred.prt.as_deref(), Some("up"));
    assert_eq!(pred.core(), "buy_up");
}

/// Token indices are the reader's, not list positions: a document whose
/// sentence starts at idx 10 must still resolve arguments and coref heads.
#[test]
fn offset_token_indices_still_resolve() {
    let tokens = vec![
        DocToken::new(10, "Alice", "alice", "NNP", Some(NerTag::Per)),
        DocToken::new(11, "bought", "buy", "VBD", None),
        DocToken::new(12, "a", "a", "DT", None),
        DocToken::new(13, "book", "book", "NN", None),
    ];
    let deps = vec![
        DepEdge::new("nsubj", 11, 10),
        DepEdge::new("det", 13, 12),
        DepEdge::new("dobj", 11, 13),
    ];
    let doc = Document {
        name: "doc-offset".to_string(),
        sentences: vec![Sentence { tokens, deps }],
        corefs: vec![CorefChain {
            mentions: vec![mention(0, 10, 11, 10, false, Some(NerTag::Per), &["Alice"])],
        }],
    };

    let script = ScriptBuilder::default().build(&doc).unwrap();
    assert_eq!(script.events.len(), 1);
    let event = &script.events[0];
    assert_eq!(event.subject.as_ref().unwrap().token.word, "Alice");
    assert_eq!(event.subject.as_ref().unwrap().entity_idx, 0);
    assert_eq!(event.object.as_ref().unwrap().token.lemma, "book");
    // The unset representative flag is repaired through the same lookup.
    assert_eq!(script.entities[0].representative().head_word(), "Alice");
}

#[test]
fn representative_is_repaired_when_absent() {
    let mut doc = sample_document();
    // A chain where no mention carries the representative flag: the proper
    // noun should win over the pronoun.
    doc.sentences[0].tokens.push(DocToken::new(6, "she", "she", "PRP", None));
    doc.corefs[0].mentions = vec![
        mention(0, 6, 7, 6, false, None, &["she"]),
        mention(0, 0, 1, 0, false, Some(NerTag::Per), &["Alice"]),
    ];

    let script = ScriptBuilder::default().build(&doc).unwrap();
    let rep = script.entities[0].representative();
    assert_eq!(rep.head_word(), "Alice");
}

#[test]
fn indexer_resolves_every_slot() {
    let script = ScriptBuilder::default().build(&sample_document()).unwrap();
    let store = store_for(
        &["buy-PRED", "alice-SUBJ", "book-OBJ", "bob-PREP_from", "UNK-SUBJ"],
        4,
    );
    let indexer = EventIndexer::new(&store, true);

    let indexed = indexer.index_event(&script, &script.events[0]).unwrap().unwrap();
    assert_eq!(indexed.pred, store.index("buy-PRED").unwrap() as i64);
    assert_eq!(indexed.subj, store.index("alice-SUBJ").unwrap() as i64);
    assert_eq!(indexed.obj, store.index("book-OBJ").unwrap() as i64);
    assert_eq!(indexed.pobj, store.index("bob-PREP_from").unwrap() as i64);
}

#[test]
fn unresolvable_predicate_drops_the_event() {
    let script = ScriptBuilder::default().build(&sample_document()).unwrap();
    let store = store_for(&["alice-SUBJ", "book-OBJ"], 4);
    let indexer = EventIndexer::new(&store, true);
    assert!(indexer.index_event(&script, &script.events[0]).unwrap().is_none());
}

#[test]
fn salience_counts_mention_kinds() {
    let mut doc = sample_document();
    doc.sentences[0].tokens.push(DocToken::new(6, "she", "she", "PRP", None));
    doc.corefs[0]
        .mentions
        .push(mention(0, 6, 7, 6, false, None, &["she"]));

    let script = ScriptBuilder::default().build(&doc).unwrap();
    let store = store_for(&["buy-PRED"], 4);
    let indexer = EventIndexer::new(&store, true);

    let mut counts = HashMap::new();
    counts.insert("alice".to_string(), 7u64);
    let sal = indexer.salience(&script, 0, Some(&counts));
    assert_eq!(sal.first_loc, 0.0);
    assert_eq!(sal.head_count, 7.0);
    assert_eq!(sal.num_mentions_named, 1.0);
    assert_eq!(sal.num_mentions_pronominal, 1.0);
    assert_eq!(sal.num_mentions_nominal, 0.0);
    assert_eq!(sal.num_mentions_total, 2.0);
}

/// Three events, three entities, one linked subject each: the three
/// sampling modes scale triple counts as 1, (entities - 1) and
/// (contexts * (entities - 1)) per linked slot.
#[test]
fn sampling_modes_scale_triple_counts() {
    let names = ["Alice", "Bob", "Carol"];
    let verbs = [("bought", "buy"), ("sold", "sell"), ("read", "read")];
    let mut tokens = Vec::new();
    let mut deps = Vec::new();
    let mut corefs = Vec::new();
    for (i, (name, (word, _))) in names.iter().zip(verbs.iter()).enumerate() {
        let n = 2 * i;
        tokens.push(DocToken::new(n, name, &name.to_lowercase(), "NNP", Some(NerTag::Per)));
        tokens.push(DocToken::new(n + 1, word, verbs[i].1, "VBD", None));
        deps.push(DepEdge::new("nsubj", n + 1, n));
        corefs.push(CorefChain {
            mentions: vec![mention(0, n, n + 1, n, true, Some(NerTag::Per), &[name])],
        });
    }
    let doc = Document {
        name: "doc-modes".to_string(),
        sentences: vec![Sentence { tokens, deps }],
        corefs,
    };
    let script = ScriptBuilder::default().build(&doc).unwrap();
    assert_eq!(script.events.len(), 3);
    assert_eq!(script.entities.len(), 3);

    let store = store_for(
        &[
            "buy-PRED", "sell-PRED", "read-PRED", "alice-SUBJ", "bob-SUBJ", "carol-SUBJ",
        ],
        4,
    );
    let indexer = EventIndexer::new(&store, true);

    let count = |mode: NegSampleMode| {
        TripleGenerator::new(&indexer, mode, 7)
            .triples(&script)
            .unwrap()
    };
    let one = count(NegSampleMode::One);
    let neg = count(NegSampleMode::Neg);
    let all = count(NegSampleMode::All);
    assert_eq!(one.len(), 3);
    assert_eq!(neg.len(), 6);
    assert_eq!(all.len(), 12);

    for t in one.iter().chain(neg.iter()).chain(all.iter()) {
        t.validate().unwrap();
        assert_eq!(t.slot, SLOT_SUBJ);
        assert_ne!(t.pos.subj, t.neg.subj);
    }
}

#[test]
fn subsampler_keeps_rare_predicates() {
    let mut counts = HashMap::new();
    counts.insert("say".to_string(), 90u64);
    counts.insert("defenestrate".to_string(), 10u64);
    let sampler = PredicateSubsampler::new(0.1, &counts, 3);

    let p_common = sampler.keep_probability("say");
    assert!((p_common - (0.1f64 / 0.9).sqrt()).abs() < 1e-9);
    assert_eq!(sampler.keep_probability("defenestrate"), 1.0);
    assert_eq!(sampler.keep_probability("unseen"), 1.0);
}
