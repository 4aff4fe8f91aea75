// eval.rs
//
// Scoring-time flow: a script's events become indexed candidates and
// contexts, the pair network scores every (context, candidate) pair, and
// candidates are ranked by mean coherence. Used to predict which entity
// fills a missing argument slot.

use std::collections::HashMap;

use anyhow::Result;
use burn::tensor::backend::Backend;

use crate::script::builder::EventIndexer;
use crate::script::types::{EventBatch, Script, SLOT_OBJ, SLOT_POBJ, SLOT_SUBJ};
use crate::training::model::EventCompositionModel;

/// Scripts smaller than this contribute nothing to evaluation.
const MIN_EVENTS: usize = 2;
const MIN_ENTITIES: usize = 2;

#[derive(Debug, Default, Clone)]
pub struct EvalReport {
    pub scripts_evaluated: usize,
    pub scripts_skipped: usize,
    pub queries: usize,
    pub correct: usize,
    pub mrr_sum: f64,
}

impl EvalReport {
    pub fn accuracy(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.correct as f64 / self.queries as f64
        }
    }

    pub fn mrr(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.mrr_sum / self.queries as f64
        }
    }
}

pub struct Evaluator<'a, B: Backend> {
    indexer: &'a EventIndexer<'a>,
    model: &'a EventCompositionModel<B>,
    device: B::Device,
    head_counts: Option<&'a HashMap<String, u64>>,
}

impl<'a, B: Backend> Evaluator<'a, B> {
    pub fn new(
        indexer: &'a EventIndexer<'a>,
        model: &'a EventCompositionModel<B>,
        device: B::Device,
        head_counts: Option<&'a HashMap<String, u64>>,
    ) -> Self {
        Self { indexer, model, device, head_counts }
    }

    /// Ranks every entity of the script as a filler for `slot` of the given
    /// event, highest mean coherence first. Ties keep entity order.
    pub fn rank_candidates(
        &self,
        script: &Script,
        event_idx: usize,
        slot: usize,
    ) -> Result<Vec<(usize, f32)>> {
        let indexed = self.indexer.index_script(script)?;
        let base = match indexed.iter().find(|(i, _)| *i == event_idx) {
            Some((_, e)) => *e,
            None => return Ok(Vec::new()),
        };
        let contexts: Vec<_> = indexed
            .iter()
            .filter(|(i, _)| *i != event_idx)
            .map(|(_, e)| *e)
            .collect();
        if contexts.is_empty() {
            return Ok(Vec::new());
        }
        let event = &script.events[event_idx];

        let mut scored = Vec::with_capacity(script.entities.len());
        for entity_idx in 0..script.entities.len() {
            let cand_row = self
                .indexer
                .candidate_index(script, event, entity_idx, slot);
            let candidate = base.with_slot(slot, cand_row);

            let mut left = EventBatch::with_capacity(contexts.len());
            let mut right = EventBatch::with_capacity(contexts.len());
            let mut slots = Vec::with_capacity(contexts.len());
            for c in &contexts {
                left.push(*c);
                right.push(candidate);
                slots.push(slot as i64);
            }
            let sal = self
                .indexer
                .salience(script, entity_idx, self.head_counts)
                .as_array();
            let sal_rows: Vec<f32> = contexts.iter().flat_map(|_| sal).collect();

            let scores = self
                .model
                .coherence(&left, &right, &slots, Some(&sal_rows), &self.device)?;
            let values = scores
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .unwrap_or_default();
            let mean = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f32>() / values.len() as f32
            };
            scored.push((entity_idx, mean));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }

    /// Evaluates every entity-linked slot of every event. Returns None when
    /// the script is below the size thresholds.
    pub fn evaluate_script(&self, script: &Script, report: &mut EvalReport) -> Result<()> {
        if script.events.len() < MIN_EVENTS || script.entities.len() < MIN_ENTITIES {
            report.scripts_skipped += 1;
            return Ok(());
        }
        let mut any = false;
        for (event_idx, event) in script.events.iter().enumerate() {
            for slot in [SLOT_SUBJ, SLOT_OBJ, SLOT_POBJ] {
                let arg = match event.argument(slot) {
                    Some(a) if a.is_linked() => a,
                    _ => continue,
                };
                let true_entity = arg.entity_idx as usize;
                let ranking = self.rank_candidates(script, event_idx, slot)?;
                if ranking.is_empty() {
                    continue;
                }
                any = true;
                report.queries += 1;
                if ranking[0].0 == true_entity {
                    report.correct += 1;
                }
                if let Some(rank) = ranking.iter().position(|(e, _)| *e == true_entity) {
                    report.mrr_sum += 1.0 / (rank + 1) as f64;
                }
            }
        }
        if any {
            report.scripts_evaluated += 1;
        } else {
            report.scripts_skipped += 1;
        }
        Ok(())
    }

    pub fn evaluate_corpus(&self, scripts: &[Script]) -> Result<EvalReport> {
        let mut report = EvalReport::default();
        for script in scripts {
            self.evaluate_script(script, &mut report)?;
        }
        eprintln!(
            "[eval] scripts={} skipped={} queries={} acc={:.3} mrr={:.3}",
            report.scripts_evaluated,
            report.scripts_skipped,
            report.queries,
            report.accuracy(),
            report.mrr()
        );
        Ok(report)
    }
}
