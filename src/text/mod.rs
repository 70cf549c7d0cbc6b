//! Text analysis: tokenization, script classification and root forms
//!
//! The analyzer turns page text into per-document lemma counts and maps
//! free-standing words to the same lemmas for snippet highlighting.

mod analyzer;
mod morphology;

pub use analyzer::{classify_script, clean_word, Script, TextAnalyzer};
pub use morphology::{Language, MorphInfo, Morphology, SnowballMorphology, WordClass};
