// corpus/build.rs
//
// Drives scripts through the indexer into sharded training corpora: event
// records for pretraining, triples for pair tuning. An optional predicate
// subsampler thins high-frequency predicates out of the emitted stream.

use anyhow::Result;

use crate::corpus::CorpusWriter;
use crate::script::builder::{EventIndexer, NegSampleMode, PredicateSubsampler, TripleGenerator};
use crate::script::types::Script;

/// Writes one 4-tuple per indexable event. Returns the number of records
/// written; events whose predicate misses the vocabulary are dropped, as
/// are events the subsampler rejects.
pub fn write_event_records(
    scripts: &[Script],
    indexer: &EventIndexer<'_>,
    mut subsampler: Option<&mut PredicateSubsampler>,
    writer: &mut CorpusWriter,
) -> Result<usize> {
    let mut written = 0usize;
    for script in scripts {
        for event in &script.events {
            if let Some(s) = subsampler.as_deref_mut() {
                if !s.keep(&event.predicate.core()) {
                    continue;
                }
            }
            if let Some(ie) = indexer.index_event(script, event)? {
                writer.write_event(&ie)?;
                written += 1;
            }
        }
    }
    Ok(written)
}

/// Writes pair-tuning triples. Subsampling happens before triple
/// generation, so a rejected predicate contributes neither positives nor
/// context events.
pub fn write_triple_records(
    scripts: &[Script],
    indexer: &EventIndexer<'_>,
    mode: NegSampleMode,
    seed: u64,
    mut subsampler: Option<&mut PredicateSubsampler>,
    writer: &mut CorpusWriter,
) -> Result<usize> {
    let mut generator = TripleGenerator::new(indexer, mode, seed);
    let mut written = 0usize;
    for script in scripts {
        let thinned;
        let script = match subsampler.as_deref_mut() {
            Some(s) => {
                thinned = subsample_events(script, s);
                &thinned
            }
            None => script,
        };
        for triple in generator.triples(script)? {
            writer.write_triple(&triple)?;
            written += 1;
        }
    }
    Ok(written)
}

fn subsample_events(script: &Script, sampler: &mut PredicateSubsampler) -> Script {
    Script {
        name: script.name.clone(),
        entities: script.entities.clone(),
        events: script
            .events
            .iter()
            .filter(|e| sampler.keep(&e.predicate.core()))
            .cloned()
            .collect(),
    }
}
