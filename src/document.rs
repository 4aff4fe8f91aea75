// document.rs
//
// The contract an external parsed-document reader must satisfy. The
// rich-script builder consumes only these fields; how a reader stores or
// produces them is its own business.

use crate::script::types::{Mention, NerTag};

/// One token of a parsed sentence, with its in-sentence index.
#[derive(Debug, Clone)]
pub struct DocToken {
    pub idx: usize,
    pub word: String,
    pub lemma: String,
    pub pos: String,
    pub ner: Option<NerTag>,
}

impl DocToken {
    pub fn new(idx: usize, word: &str, lemma: &str, pos: &str, ner: Option<NerTag>) -> Self {
        Self {
            idx,
            word: word.to_string(),
            lemma: lemma.to_string(),
            pos: pos.to_string(),
            ner,
        }
    }
}

/// A labelled dependency edge between two tokens of the same sentence,
/// head and dependent given as token indices.
#[derive(Debug, Clone)]
pub struct DepEdge {
    pub label: String,
    pub head: usize,
    pub dep: usize,
}

impl DepEdge {
    pub fn new(label: &str, head: usize, dep: usize) -> Self {
        Self { label: label.to_string(), head, dep }
    }
}

/// An ordered list of tokens plus a labelled dependency graph over them.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    pub tokens: Vec<DocToken>,
    pub deps: Vec<DepEdge>,
}

/// A coreference chain over mention spans. The representative flag may be
/// unset on every mention; the builder then repairs it.
#[derive(Debug, Clone, Default)]
pub struct CorefChain {
    pub mentions: Vec<Mention>,
}

/// A parsed document as delivered by an external reader.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub name: String,
    pub sentences: Vec<Sentence>,
    pub corefs: Vec<CorefChain>,
}
