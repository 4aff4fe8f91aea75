// script/types.rs
//
// Core data model: tokens, mentions, entities, events, scripts, and the
// integer-indexed forms consumed by the networks.

use std::fmt;

use anyhow::{bail, Result};

/// Coarse named-entity tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NerTag {
    Per,
    Org,
    Loc,
    Temp,
    Num,
    Misc,
}

impl NerTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NerTag::Per => "PER",
            NerTag::Org => "ORG",
            NerTag::Loc => "LOC",
            NerTag::Temp => "TEMP",
            NerTag::Num => "NUM",
            NerTag::Misc => "MISC",
        }
    }

    pub fn parse(s: &str) -> Option<NerTag> {
        match s {
            "PER" => Some(NerTag::Per),
            "ORG" => Some(NerTag::Org),
            "LOC" => Some(NerTag::Loc),
            "TEMP" => Some(NerTag::Temp),
            "NUM" => Some(NerTag::Num),
            "MISC" => Some(NerTag::Misc),
            _ => None,
        }
    }
}

impl fmt::Display for NerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token as it appears inside a script: surface form, lemma, POS and
/// optional coarse NER. Sentence/token positions live on the document side;
/// the script text format does not carry them for event arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub lemma: String,
    pub pos: String,
    pub ner: Option<NerTag>,
}

impl Token {
    pub fn new(word: &str, lemma: &str, pos: &str, ner: Option<NerTag>) -> Self {
        Self {
            word: word.to_string(),
            lemma: lemma.to_string(),
            pos: pos.to_string(),
            ner,
        }
    }
}

/// A verb token with negation flag and optional particle compound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub token: Token,
    pub negated: bool,
    pub prt: Option<String>,
}

impl Predicate {
    /// Vocabulary core form: lemma, with the particle appended when present.
    pub fn core(&self) -> String {
        match &self.prt {
            Some(prt) => format!("{}_{}", self.token.lemma, prt),
            None => self.token.lemma.clone(),
        }
    }
}

/// An event argument, optionally linked into the script's entity table.
/// Both indices are -1 when the argument is not part of an entity chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub token: Token,
    pub entity_idx: i32,
    pub mention_idx: i32,
}

impl Argument {
    pub fn unlinked(token: Token) -> Self {
        Self { token, entity_idx: -1, mention_idx: -1 }
    }

    pub fn linked(token: Token, entity_idx: i32, mention_idx: i32) -> Self {
        Self { token, entity_idx, mention_idx }
    }

    pub fn is_linked(&self) -> bool {
        self.entity_idx >= 0
    }
}

/// A contiguous token span in one sentence. `head` is an absolute token
/// index inside the sentence; invariant `start <= head < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub sent: usize,
    pub start: usize,
    pub end: usize,
    pub head: usize,
    pub representative: bool,
    pub ner: Option<NerTag>,
    pub tokens: Vec<String>,
}

impl Mention {
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Surface word of the head token.
    pub fn head_word(&self) -> &str {
        &self.tokens[self.head - self.start]
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.start <= self.head && self.head < self.end) {
            bail!(
                "mention head {} outside span [{}, {}) in sentence {}",
                self.head,
                self.start,
                self.end,
                self.sent
            );
        }
        if self.tokens.len() != self.end - self.start {
            bail!(
                "mention span [{}, {}) carries {} tokens",
                self.start,
                self.end,
                self.tokens.len()
            );
        }
        Ok(())
    }
}

/// A coreference entity: a non-empty ordered list of mentions, exactly one
/// of which is representative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub mentions: Vec<Mention>,
}

impl Entity {
    pub fn representative(&self) -> &Mention {
        self.mentions
            .iter()
            .find(|m| m.representative)
            .unwrap_or(&self.mentions[0])
    }

    /// Plurality NER over the mentions, ties broken by first occurrence.
    pub fn ner(&self) -> Option<NerTag> {
        let mut seen: Vec<(NerTag, usize)> = Vec::new();
        for m in &self.mentions {
            if let Some(tag) = m.ner {
                match seen.iter_mut().find(|(t, _)| *t == tag) {
                    Some((_, n)) => *n += 1,
                    None => seen.push((tag, 1)),
                }
            }
        }
        // `seen` is in first-occurrence order, so max_by_key with a strict
        // comparison keeps the earliest tag on ties.
        let mut best: Option<(NerTag, usize)> = None;
        for (tag, n) in seen {
            match best {
                Some((_, bn)) if n <= bn => {}
                _ => best = Some((tag, n)),
            }
        }
        best.map(|(t, _)| t)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mentions.is_empty() {
            bail!("entity with no mentions");
        }
        let reps = self.mentions.iter().filter(|m| m.representative).count();
        if reps != 1 {
            bail!("entity has {} representative mentions, expected 1", reps);
        }
        for m in &self.mentions {
            m.validate()?;
        }
        Ok(())
    }
}

/// A predicate with up to four role-filled slots. At least one of
/// subject/object is present; prepositional objects preserve token order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub predicate: Predicate,
    pub subject: Option<Argument>,
    pub object: Option<Argument>,
    pub pobjs: Vec<(String, Argument)>,
}

impl Event {
    pub fn validate(&self) -> Result<()> {
        if self.subject.is_none() && self.object.is_none() {
            bail!("event '{}' has neither subject nor object", self.predicate.core());
        }
        for (prep, _) in &self.pobjs {
            if prep.is_empty() {
                bail!("event '{}' has a pobj with empty preposition", self.predicate.core());
            }
        }
        Ok(())
    }

    pub fn argument(&self, slot: usize) -> Option<&Argument> {
        match slot {
            SLOT_SUBJ => self.subject.as_ref(),
            SLOT_OBJ => self.object.as_ref(),
            SLOT_POBJ => self.pobjs.first().map(|(_, a)| a),
            _ => None,
        }
    }
}

/// One document's entities and events. Events reference entities by integer
/// index only; the script owns both tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub entities: Vec<Entity>,
    pub events: Vec<Event>,
}

impl Script {
    /// Checks the data-integrity invariants. Out-of-range entity or mention
    /// back-references are bugs in the producing reader; fail loud.
    pub fn validate(&self) -> Result<()> {
        for entity in &self.entities {
            entity.validate()?;
        }
        for (ei, event) in self.events.iter().enumerate() {
            event.validate()?;
            let args = event
                .subject
                .iter()
                .chain(event.object.iter())
                .chain(event.pobjs.iter().map(|(_, a)| a));
            for arg in args {
                if arg.entity_idx < 0 {
                    continue;
                }
                let entity = self.entities.get(arg.entity_idx as usize);
                let mention = entity
                    .and_then(|e| e.mentions.get(arg.mention_idx as usize));
                if mention.is_none() {
                    bail!(
                        "event {} argument '{}' references entity {} mention {} \
                         outside the script tables",
                        ei,
                        arg.token.word,
                        arg.entity_idx,
                        arg.mention_idx
                    );
                }
            }
        }
        Ok(())
    }
}

/* ------------------- indexed forms ------------------- */

pub const SLOT_SUBJ: usize = 1;
pub const SLOT_OBJ: usize = 2;
pub const SLOT_POBJ: usize = 3;

/// A 4-tuple of row indices into the word vector store; -1 means the slot
/// is empty and the learned empty-slot vector stands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedEvent {
    pub pred: i64,
    pub subj: i64,
    pub obj: i64,
    pub pobj: i64,
}

impl IndexedEvent {
    pub fn new(pred: i64, subj: i64, obj: i64, pobj: i64) -> Self {
        Self { pred, subj, obj, pobj }
    }

    pub fn as_array(&self) -> [i64; 4] {
        [self.pred, self.subj, self.obj, self.pobj]
    }

    pub fn get(&self, slot: usize) -> i64 {
        self.as_array()[slot]
    }

    pub fn with_slot(mut self, slot: usize, idx: i64) -> Self {
        match slot {
            SLOT_SUBJ => self.subj = idx,
            SLOT_OBJ => self.obj = idx,
            SLOT_POBJ => self.pobj = idx,
            _ => self.pred = idx,
        }
        self
    }
}

/// A pair-tuning training example: context event, positive event, negative
/// event and the slot in which pos and neg differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedTriple {
    pub left: IndexedEvent,
    pub pos: IndexedEvent,
    pub neg: IndexedEvent,
    pub slot: usize,
}

impl IndexedTriple {
    pub fn validate(&self) -> Result<()> {
        if !(SLOT_SUBJ..=SLOT_POBJ).contains(&self.slot) {
            bail!("triple slot {} outside 1..=3", self.slot);
        }
        for s in 0..4 {
            if s != self.slot && self.pos.get(s) != self.neg.get(s) {
                bail!("triple pos/neg differ at position {} (slot under test is {})", s, self.slot);
            }
        }
        Ok(())
    }
}

/// Parallel columns of indexed events, ready to become tensors.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    pub pred: Vec<i64>,
    pub subj: Vec<i64>,
    pub obj: Vec<i64>,
    pub pobj: Vec<i64>,
}

impl EventBatch {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            pred: Vec::with_capacity(n),
            subj: Vec::with_capacity(n),
            obj: Vec::with_capacity(n),
            pobj: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, e: IndexedEvent) {
        self.pred.push(e.pred);
        self.subj.push(e.subj);
        self.obj.push(e.obj);
        self.pobj.push(e.pobj);
    }

    pub fn len(&self) -> usize {
        self.pred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pred.is_empty()
    }

    pub fn get(&self, i: usize) -> IndexedEvent {
        IndexedEvent::new(self.pred[i], self.subj[i], self.obj[i], self.pobj[i])
    }
}

/// Parallel triple columns for one minibatch.
#[derive(Debug, Clone, Default)]
pub struct TripleBatch {
    pub left: EventBatch,
    pub pos: EventBatch,
    pub neg: EventBatch,
    pub slot: Vec<i64>,
}

impl TripleBatch {
    pub fn push(&mut self, t: IndexedTriple) {
        self.left.push(t.left);
        self.pos.push(t.pos);
        self.neg.push(t.neg);
        self.slot.push(t.slot as i64);
    }

    pub fn len(&self) -> usize {
        self.slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }
}

/// Fixed-length per-entity prominence features fed to the pair network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySalience {
    pub first_loc: f32,
    pub head_count: f32,
    pub num_mentions_named: f32,
    pub num_mentions_nominal: f32,
    pub num_mentions_pronominal: f32,
    pub num_mentions_total: f32,
}

pub const SALIENCE_DIM: usize = 6;

impl EntitySalience {
    pub fn zeros() -> Self {
        Self {
            first_loc: 0.0,
            head_count: 0.0,
            num_mentions_named: 0.0,
            num_mentions_nominal: 0.0,
            num_mentions_pronominal: 0.0,
            num_mentions_total: 0.0,
        }
    }

    pub fn as_array(&self) -> [f32; SALIENCE_DIM] {
        [
            self.first_loc,
            self.head_count,
            self.num_mentions_named,
            self.num_mentions_nominal,
            self.num_mentions_pronominal,
            self.num_mentions_total,
        ]
    }
}
