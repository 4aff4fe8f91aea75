// script/builder.rs
//
// Converts parsed documents into scripts (stage A) and scripts into the
// indexed integer tuples the networks consume (stage B), including entity
// salience, negative-candidate construction and pair-tuning triples.

use std::collections::HashMap;

use anyhow::{bail, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::document::{DepEdge, Document, Sentence};
use crate::script::types::{
    Argument, Entity, EntitySalience, Event, IndexedEvent, IndexedTriple, Mention, NerTag,
    Predicate, Script, Token, SLOT_OBJ, SLOT_POBJ, SLOT_SUBJ,
};
use crate::vocab::{SlotTag, WordVectorStore};

const SUBJECT_LABELS: &[&str] = &["nsubj", "nmod:agent", "nsubj:xsubj"];
const OBJECT_LABELS: &[&str] = &["dobj", "nsubjpass"];

/* ------------------ stage A: extraction ------------------ */

#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    pub use_lemma: bool,
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self { use_lemma: true }
    }
}

impl ScriptBuilder {
    pub fn new(use_lemma: bool) -> Self {
        Self { use_lemma }
    }

    pub fn build(&self, doc: &Document) -> Result<Script> {
        let entities = build_entities(doc);

        // Head-token back-references: (sent, token idx) -> (entity, mention).
        let mut links: HashMap<(usize, usize), (i32, i32)> = HashMap::new();
        for (ei, entity) in entities.iter().enumerate() {
            for (mi, mention) in entity.mentions.iter().enumerate() {
                links
                    .entry((mention.sent, mention.head))
                    .or_insert((ei as i32, mi as i32));
            }
        }

        let mut events = Vec::new();
        for (si, sentence) in doc.sentences.iter().enumerate() {
            extract_events(si, sentence, &links, &mut events);
        }

        let script = Script { name: doc.name.clone(), entities, events };
        script.validate()?;
        Ok(script)
    }
}

fn build_entities(doc: &Document) -> Vec<Entity> {
    doc.corefs
        .iter()
        .filter(|c| !c.mentions.is_empty())
        .map(|chain| {
            let mut mentions = chain.mentions.clone();
            if mentions.iter().filter(|m| m.representative).count() != 1 {
                repair_representative(doc, &mut mentions);
            }
            Entity { mentions }
        })
        .collect()
}

/// Picks a representative when the chain has none (or several): prefer a
/// head POS starting with NNP, else NN, else any; within the preferred
/// class take the longest surface text, lowest mention index on ties.
fn repair_representative(doc: &Document, mentions: &mut [Mention]) {
    for m in mentions.iter_mut() {
        m.representative = false;
    }
    let head_pos = |m: &Mention| -> String {
        doc.sentences
            .get(m.sent)
            .and_then(|s| s.tokens.iter().find(|t| t.idx == m.head))
            .map(|t| t.pos.clone())
            .unwrap_or_default()
    };
    let class = |m: &Mention| -> u8 {
        let pos = head_pos(m);
        if pos.starts_with("NNP") {
            0
        } else if pos.starts_with("NN") {
            1
        } else {
            2
        }
    };
    let best_class = mentions.iter().map(|m| class(m)).min().unwrap_or(2);
    let mut best: usize = 0;
    let mut best_len = 0usize;
    for (i, m) in mentions.iter().enumerate() {
        if class(m) != best_class {
            continue;
        }
        let len = m.text().len();
        if best_len == 0 || len > best_len {
            best = i;
            best_len = len.max(1);
        }
    }
    mentions[best].representative = true;
}

fn extract_events(
    sent_idx: usize,
    sentence: &Sentence,
    links: &HashMap<(usize, usize), (i32, i32)>,
    out: &mut Vec<Event>,
) {
    for token in &sentence.tokens {
        if !token.pos.starts_with("VB") {
            continue;
        }
        if token.lemma == "be" {
            continue;
        }
        // Verbs governed by xcomp are folded into their governor's clause.
        if sentence
            .deps
            .iter()
            .any(|e| e.label == "xcomp" && e.dep == token.idx)
        {
            continue;
        }

        let edges: Vec<&DepEdge> = sentence
            .deps
            .iter()
            .filter(|e| e.head == token.idx)
            .collect();

        // Edges address tokens by their `idx` field, which readers are not
        // required to keep dense or zero-based.
        let token_at = |idx: usize| sentence.tokens.iter().find(|t| t.idx == idx);

        let make_arg = |idx: usize| -> Option<Argument> {
            let t = token_at(idx)?;
            let token = Token::new(&t.word, &t.lemma, &t.pos, t.ner);
            let (entity_idx, mention_idx) = links
                .get(&(sent_idx, idx))
                .copied()
                .unwrap_or((-1, -1));
            Some(Argument { token, entity_idx, mention_idx })
        };

        let subjects: Vec<Argument> = edges
            .iter()
            .filter(|e| SUBJECT_LABELS.contains(&e.label.as_str()))
            .filter_map(|e| make_arg(e.dep))
            .collect();
        let objects: Vec<Argument> = edges
            .iter()
            .filter(|e| OBJECT_LABELS.contains(&e.label.as_str()))
            .filter_map(|e| make_arg(e.dep))
            .collect();

        let mut pobjs: Vec<(usize, String, Argument)> = edges
            .iter()
            .filter(|e| e.label.starts_with("nmod:") && e.label != "nmod:agent")
            .filter_map(|e| {
                let prep = e.label["nmod:".len()..].to_string();
                make_arg(e.dep).map(|a| (e.dep, prep, a))
            })
            .collect();
        pobjs.sort_by_key(|(dep, _, _)| *dep);
        let pobjs: Vec<(String, Argument)> =
            pobjs.into_iter().map(|(_, p, a)| (p, a)).collect();

        if subjects.is_empty() && objects.is_empty() {
            continue;
        }

        let negated = edges.iter().any(|e| e.label == "neg");
        let prt = edges
            .iter()
            .find(|e| e.label == "compound:prt")
            .and_then(|e| token_at(e.dep))
            .map(|t| t.word.clone());
        let predicate = Predicate {
            token: Token::new(&token.word, &token.lemma, &token.pos, token.ner),
            negated,
            prt,
        };

        let mut emit = |subject: Option<Argument>, object: Option<Argument>| {
            out.push(Event {
                predicate: predicate.clone(),
                subject,
                object,
                pobjs: pobjs.clone(),
            });
        };

        if objects.is_empty() {
            for s in &subjects {
                emit(Some(s.clone()), None);
            }
        } else if subjects.is_empty() {
            for o in &objects {
                emit(None, Some(o.clone()));
            }
        } else {
            for s in &subjects {
                for o in &objects {
                    emit(Some(s.clone()), Some(o.clone()));
                }
            }
        }
    }
}

/* ------------------ stage B: indexing ------------------ */

pub struct EventIndexer<'a> {
    store: &'a WordVectorStore,
    use_lemma: bool,
}

impl<'a> EventIndexer<'a> {
    pub fn new(store: &'a WordVectorStore, use_lemma: bool) -> Self {
        Self { store, use_lemma }
    }

    /// Core string and NER for one argument: the representative mention's
    /// head word when the argument is entity-linked, the token itself
    /// otherwise.
    fn arg_core(&self, script: &Script, arg: &Argument) -> Result<(String, Option<NerTag>)> {
        if arg.is_linked() {
            let entity = match script.entities.get(arg.entity_idx as usize) {
                Some(e) => e,
                None => bail!(
                    "argument '{}' references entity {} outside the script table",
                    arg.token.word,
                    arg.entity_idx
                ),
            };
            let rep = entity.representative();
            let core = if self.use_lemma {
                rep.head_word().to_lowercase()
            } else {
                rep.head_word().to_string()
            };
            Ok((core, entity.ner()))
        } else {
            let core = if self.use_lemma {
                arg.token.lemma.to_lowercase()
            } else {
                arg.token.word.clone()
            };
            Ok((core, arg.token.ner))
        }
    }

    fn arg_index(
        &self,
        script: &Script,
        arg: Option<&Argument>,
        slot: SlotTag,
    ) -> Result<i64> {
        match arg {
            None => Ok(-1),
            Some(arg) => {
                let (core, ner) = self.arg_core(script, arg)?;
                Ok(self.store.lookup(&core, ner, &slot))
            }
        }
    }

    /// Indexes one event; None when its predicate has no vocabulary row.
    /// Multiple prepositional objects collapse to the first one, matching
    /// the single pobj slot of the indexed form.
    pub fn index_event(&self, script: &Script, event: &Event) -> Result<Option<IndexedEvent>> {
        let pred = self
            .store
            .lookup(&event.predicate.core(), None, &SlotTag::Pred);
        if pred < 0 {
            return Ok(None);
        }
        let subj = self.arg_index(script, event.subject.as_ref(), SlotTag::Subj)?;
        let obj = self.arg_index(script, event.object.as_ref(), SlotTag::Obj)?;
        let pobj = match event.pobjs.first() {
            Some((prep, arg)) => {
                self.arg_index(script, Some(arg), SlotTag::Prep(prep.clone()))?
            }
            None => -1,
        };
        Ok(Some(IndexedEvent::new(pred, subj, obj, pobj)))
    }

    /// Indexes every event of a script, dropping the unresolvable ones.
    pub fn index_script(&self, script: &Script) -> Result<Vec<(usize, IndexedEvent)>> {
        let mut out = Vec::new();
        for (i, event) in script.events.iter().enumerate() {
            if let Some(ie) = self.index_event(script, event)? {
                out.push((i, ie));
            }
        }
        Ok(out)
    }

    /// Vocabulary row a given entity resolves to when proposed as the
    /// filler of `slot` for `event`.
    pub fn candidate_index(
        &self,
        script: &Script,
        event: &Event,
        entity_idx: usize,
        slot: usize,
    ) -> i64 {
        let entity = &script.entities[entity_idx];
        let rep = entity.representative();
        let core = if self.use_lemma {
            rep.head_word().to_lowercase()
        } else {
            rep.head_word().to_string()
        };
        let tag = match slot {
            SLOT_SUBJ => SlotTag::Subj,
            SLOT_OBJ => SlotTag::Obj,
            _ => match event.pobjs.first() {
                Some((prep, _)) => SlotTag::Prep(prep.clone()),
                None => SlotTag::Obj,
            },
        };
        self.store.lookup(&core, entity.ner(), &tag)
    }

    /// Per-entity prominence features. `head_counts` is an optional corpus
    /// frequency table for mention head words.
    pub fn salience(
        &self,
        script: &Script,
        entity_idx: usize,
        head_counts: Option<&HashMap<String, u64>>,
    ) -> EntitySalience {
        let entity = &script.entities[entity_idx];
        let first_loc = entity
            .mentions
            .iter()
            .map(|m| m.sent)
            .min()
            .unwrap_or(0) as f32;
        let head = entity.representative().head_word().to_lowercase();
        let head_count = head_counts
            .and_then(|c| c.get(&head))
            .copied()
            .unwrap_or(0) as f32;

        let mut named = 0u32;
        let mut pronominal = 0u32;
        let mut nominal = 0u32;
        for m in &entity.mentions {
            if m.ner.is_some() {
                named += 1;
            } else if is_pronoun(m.head_word()) {
                pronominal += 1;
            } else {
                nominal += 1;
            }
        }
        EntitySalience {
            first_loc,
            head_count,
            num_mentions_named: named as f32,
            num_mentions_nominal: nominal as f32,
            num_mentions_pronominal: pronominal as f32,
            num_mentions_total: entity.mentions.len() as f32,
        }
    }
}

fn is_pronoun(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "i" | "me" | "my" | "mine" | "myself" | "we" | "us" | "our" | "ours" | "ourselves"
            | "you" | "your" | "yours" | "yourself" | "he" | "him" | "his" | "himself"
            | "she" | "her" | "hers" | "herself" | "it" | "its" | "itself" | "they"
            | "them" | "their" | "theirs" | "themselves" | "who" | "whom" | "which" | "that"
    )
}

/* ------------------ triple generation ------------------ */

/// How many (context, negative) pairs each positive slot produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegSampleMode {
    /// One sampled negative and one sampled context event.
    One,
    /// One sampled context event per negative candidate.
    Neg,
    /// Every context event paired with every negative candidate.
    All,
}

impl NegSampleMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "one" => Ok(NegSampleMode::One),
            "neg" => Ok(NegSampleMode::Neg),
            "all" => Ok(NegSampleMode::All),
            other => bail!("unknown negative-sampling mode '{}'", other),
        }
    }
}

pub struct TripleGenerator<'a> {
    indexer: &'a EventIndexer<'a>,
    mode: NegSampleMode,
    rng: ChaCha20Rng,
}

impl<'a> TripleGenerator<'a> {
    pub fn new(indexer: &'a EventIndexer<'a>, mode: NegSampleMode, seed: u64) -> Self {
        Self { indexer, mode, rng: ChaCha20Rng::seed_from_u64(seed) }
    }

    /// Emits pair-tuning triples for one script. Every triple's pos and neg
    /// differ only in the slot under test.
    pub fn triples(&mut self, script: &Script) -> Result<Vec<IndexedTriple>> {
        let indexed = self.indexer.index_script(script)?;
        let mut out = Vec::new();
        if indexed.len() < 2 || script.entities.len() < 2 {
            return Ok(out);
        }

        for (pos_i, (event_i, pos)) in indexed.iter().enumerate() {
            let event = &script.events[*event_i];
            let contexts: Vec<IndexedEvent> = indexed
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != pos_i)
                .map(|(_, (_, e))| *e)
                .collect();

            for slot in [SLOT_SUBJ, SLOT_OBJ, SLOT_POBJ] {
                let arg = match event.argument(slot) {
                    Some(a) if a.is_linked() => a,
                    _ => continue,
                };
                let true_entity = arg.entity_idx as usize;

                let negatives: Vec<i64> = (0..script.entities.len())
                    .filter(|&e| e != true_entity)
                    .map(|e| self.indexer.candidate_index(script, event, e, slot))
                    .collect();
                if negatives.is_empty() {
                    continue;
                }

                match self.mode {
                    NegSampleMode::One => {
                        let n = negatives[self.rng.gen_range(0..negatives.len())];
                        let c = contexts[self.rng.gen_range(0..contexts.len())];
                        out.push(IndexedTriple {
                            left: c,
                            pos: *pos,
                            neg: pos.with_slot(slot, n),
                            slot,
                        });
                    }
                    NegSampleMode::Neg => {
                        for &n in &negatives {
                            let c = contexts[self.rng.gen_range(0..contexts.len())];
                            out.push(IndexedTriple {
                                left: c,
                                pos: *pos,
                                neg: pos.with_slot(slot, n),
                                slot,
                            });
                        }
                    }
                    NegSampleMode::All => {
                        for &c in &contexts {
                            for &n in &negatives {
                                out.push(IndexedTriple {
                                    left: c,
                                    pos: *pos,
                                    neg: pos.with_slot(slot, n),
                                    slot,
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/* ------------------ predicate subsampling ------------------ */

/// High-frequency predicate subsampling: a predicate with relative
/// frequency f is kept with probability sqrt(t / f).
pub struct PredicateSubsampler {
    threshold: f64,
    freqs: HashMap<String, f64>,
    rng: ChaCha20Rng,
}

impl PredicateSubsampler {
    pub fn new(threshold: f64, counts: &HashMap<String, u64>, seed: u64) -> Self {
        let total: u64 = counts.values().sum();
        let freqs = counts
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total.max(1) as f64))
            .collect();
        Self { threshold, freqs, rng: ChaCha20Rng::seed_from_u64(seed) }
    }

    pub fn keep_probability(&self, pred_core: &str) -> f64 {
        match self.freqs.get(pred_core) {
            Some(&f) if f > 0.0 => (self.threshold / f).sqrt().min(1.0),
            _ => 1.0,
        }
    }

    pub fn keep(&mut self, pred_core: &str) -> bool {
        let p = self.keep_probability(pred_core);
        p >= 1.0 || self.rng.gen::<f64>() < p
    }
}
