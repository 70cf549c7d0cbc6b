use crate::text::morphology::{MorphInfo, Morphology, SnowballMorphology};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Unresolvable words kept for inspection; older entries are not evicted
const MAX_UNRESOLVED: usize = 10_000;

/// Script of a cleaned token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Latin,
    Cyrillic,
}

/// Classifies a lowercase token as pure Latin `[a-z]+` or pure Cyrillic `[а-яё]+`
pub fn classify_script(token: &str) -> Option<Script> {
    if token.is_empty() {
        return None;
    }
    if token.chars().all(|c| c.is_ascii_lowercase()) {
        Some(Script::Latin)
    } else if token.chars().all(|c| ('а'..='я').contains(&c) || c == 'ё') {
        Some(Script::Cyrillic)
    } else {
        None
    }
}

/// Drops punctuation and symbols from a raw word and lowercases it
pub fn clean_word(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Reduces page text to lemma frequency counts
///
/// Latin and Cyrillic words are resolved through their own morphology and
/// merged into one map. Words of other or mixed scripts are skipped;
/// words the morphology cannot resolve are remembered in
/// [`TextAnalyzer::unresolved_words`].
pub struct TextAnalyzer {
    tag_pattern: Regex,
    latin: Box<dyn Morphology>,
    cyrillic: Box<dyn Morphology>,
    unresolved: Mutex<Vec<String>>,
}

impl TextAnalyzer {
    /// Creates an analyzer backed by the English and Russian stemmers
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_morphologies(
            Box::new(SnowballMorphology::english()),
            Box::new(SnowballMorphology::russian()),
        )
    }

    pub fn with_morphologies(
        latin: Box<dyn Morphology>,
        cyrillic: Box<dyn Morphology>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            tag_pattern: Regex::new(r"<[^>]*>")?,
            latin,
            cyrillic,
            unresolved: Mutex::new(Vec::new()),
        })
    }

    /// Counts the lemmas of a text
    ///
    /// Markup is stripped first, so both raw HTML and extracted plain text
    /// are accepted.
    pub fn tokenize(&self, text: &str) -> BTreeMap<String, u32> {
        let stripped = self.tag_pattern.replace_all(text, " ");
        let mut counts = BTreeMap::new();

        for raw in stripped.split_whitespace() {
            let word = clean_word(raw);
            let Some(morphology) = self.morphology_for(&word) else {
                continue;
            };

            match morphology.analyze(&word) {
                Some(MorphInfo { class, .. }) if class.is_function_word() => {}
                Some(MorphInfo { root, .. }) => {
                    *counts.entry(root).or_insert(0) += 1;
                }
                None => self.record_unresolved(word),
            }
        }

        counts
    }

    /// Distinct lemmas of a query, in sorted order
    pub fn lemma_set(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_keys().collect()
    }

    /// Root form of a single word
    ///
    /// Falls back to the cleaned word when it has no morphology or cannot
    /// be resolved. Function words keep their own form.
    pub fn root_form(&self, raw: &str) -> String {
        let word = clean_word(raw);
        self.morphology_for(&word)
            .and_then(|morphology| morphology.analyze(&word))
            .map(|info| info.root)
            .unwrap_or(word)
    }

    /// Words seen so far that no morphology could resolve
    pub fn unresolved_words(&self) -> Vec<String> {
        match self.unresolved.lock() {
            Ok(words) => words.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn unresolved_count(&self) -> usize {
        match self.unresolved.lock() {
            Ok(words) => words.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn morphology_for(&self, word: &str) -> Option<&dyn Morphology> {
        match classify_script(word)? {
            Script::Latin => Some(self.latin.as_ref()),
            Script::Cyrillic => Some(self.cyrillic.as_ref()),
        }
    }

    fn record_unresolved(&self, word: String) {
        tracing::debug!(word = %word, "Unresolvable word skipped");
        let mut words = match self.unresolved.lock() {
            Ok(words) => words,
            Err(poisoned) => poisoned.into_inner(),
        };
        if words.len() < MAX_UNRESOLVED {
            words.push(word);
        }
    }
}
