// script/mod.rs

pub mod builder;
pub mod text;
pub mod types;

pub use builder::{EventIndexer, NegSampleMode, PredicateSubsampler, ScriptBuilder, TripleGenerator};
pub use text::{emit_script, parse_script, read_corpus, write_corpus};
pub use types::*;
