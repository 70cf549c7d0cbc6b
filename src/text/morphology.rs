//! Dictionary lookups for single words
//!
//! A [`Morphology`] maps one lowercase word of its script to a root form and
//! a word class. Roots come from the Snowball stemmers; word classes come
//! from closed tables of each language's function words.

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

/// Words longer than this are treated as noise (glued tokens, hashes)
const MAX_WORD_CHARS: usize = 40;

/// Languages with a morphology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Russian,
}

/// Part-of-speech classes the analyzer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordClass {
    Content,
    Preposition,
    Conjunction,
    Particle,
    Interjection,
    Article,
}

impl WordClass {
    /// Function words carry no meaning of their own and are never indexed
    pub fn is_function_word(&self) -> bool {
        !matches!(self, Self::Content)
    }
}

/// Result of a dictionary lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphInfo {
    pub root: String,
    pub class: WordClass,
}

/// Per-language root-form lookup
pub trait Morphology: Send + Sync {
    fn language(&self) -> Language;

    /// Looks up a lowercase word of this language's script
    ///
    /// Returns `None` when the word cannot be resolved.
    fn analyze(&self, word: &str) -> Option<MorphInfo>;
}

const ENGLISH_ARTICLES: &[&str] = &["a", "an", "the"];

const ENGLISH_PREPOSITIONS: &[&str] = &[
    "about", "above", "across", "after", "against", "along", "among", "around", "at", "before",
    "behind", "below", "beneath", "beside", "between", "beyond", "by", "despite", "down",
    "during", "except", "for", "from", "in", "inside", "into", "near", "of", "off", "on",
    "onto", "out", "outside", "over", "past", "per", "since", "through", "throughout", "till",
    "toward", "towards", "under", "underneath", "until", "up", "upon", "via", "with", "within",
    "without",
];

const ENGLISH_CONJUNCTIONS: &[&str] = &[
    "and", "but", "or", "nor", "so", "yet", "because", "although", "though", "unless",
    "whereas", "while", "whether", "if", "than", "that", "once", "lest",
];

const ENGLISH_PARTICLES: &[&str] = &["not", "to", "no", "only", "just", "even"];

const ENGLISH_INTERJECTIONS: &[&str] = &[
    "ah", "aha", "alas", "eh", "hey", "hmm", "oh", "oops", "ouch", "uh", "um", "wow", "yay",
];

const RUSSIAN_PREPOSITIONS: &[&str] = &[
    "в", "во", "на", "за", "к", "ко", "по", "с", "со", "у", "о", "об", "обо", "от", "ото",
    "до", "из", "изо", "без", "для", "под", "подо", "над", "при", "про", "через", "между",
    "перед", "около", "среди", "вокруг", "после", "кроме", "сквозь", "ради", "вместо",
];

const RUSSIAN_CONJUNCTIONS: &[&str] = &[
    "и", "а", "но", "или", "либо", "да", "что", "чтобы", "если", "как", "когда", "хотя",
    "потому", "поэтому", "также", "тоже", "зато", "однако", "пока", "будто", "словно", "ибо",
];

const RUSSIAN_PARTICLES: &[&str] = &[
    "не", "ни", "бы", "б", "же", "ж", "ли", "ль", "вот", "вон", "даже", "лишь", "только",
    "уже", "ведь", "разве", "неужели", "пусть", "пускай", "именно", "почти",
];

const RUSSIAN_INTERJECTIONS: &[&str] = &[
    "ах", "ох", "эх", "ой", "ай", "ух", "эй", "ура", "увы", "ну", "ага", "ого", "фу", "тьфу",
];

/// Snowball stemmer plus a function-word table for one language
pub struct SnowballMorphology {
    language: Language,
    stemmer: Stemmer,
    function_words: HashMap<&'static str, WordClass>,
}

impl SnowballMorphology {
    pub fn new(language: Language) -> Self {
        let (algorithm, tables): (Algorithm, [(&[&'static str], WordClass); 5]) = match language {
            Language::English => (
                Algorithm::English,
                [
                    (ENGLISH_ARTICLES, WordClass::Article),
                    (ENGLISH_PREPOSITIONS, WordClass::Preposition),
                    (ENGLISH_CONJUNCTIONS, WordClass::Conjunction),
                    (ENGLISH_PARTICLES, WordClass::Particle),
                    (ENGLISH_INTERJECTIONS, WordClass::Interjection),
                ],
            ),
            Language::Russian => (
                Algorithm::Russian,
                [
                    (&[], WordClass::Article),
                    (RUSSIAN_PREPOSITIONS, WordClass::Preposition),
                    (RUSSIAN_CONJUNCTIONS, WordClass::Conjunction),
                    (RUSSIAN_PARTICLES, WordClass::Particle),
                    (RUSSIAN_INTERJECTIONS, WordClass::Interjection),
                ],
            ),
        };

        let mut function_words = HashMap::new();
        for (words, class) in tables {
            for word in words {
                function_words.entry(*word).or_insert(class);
            }
        }

        Self {
            language,
            stemmer: Stemmer::create(algorithm),
            function_words,
        }
    }

    pub fn english() -> Self {
        Self::new(Language::English)
    }

    pub fn russian() -> Self {
        Self::new(Language::Russian)
    }
}

impl Morphology for SnowballMorphology {
    fn language(&self) -> Language {
        self.language
    }

    fn analyze(&self, word: &str) -> Option<MorphInfo> {
        if word.is_empty() || word.chars().count() > MAX_WORD_CHARS {
            return None;
        }

        let word = match self.language {
            Language::Russian => word.replace('ё', "е"),
            Language::English => word.to_string(),
        };

        if let Some(class) = self.function_words.get(word.as_str()) {
            return Some(MorphInfo {
                root: word,
                class: *class,
            });
        }

        let root = self.stemmer.stem(&word);
        if root.is_empty() {
            return None;
        }

        Some(MorphInfo {
            root: root.into_owned(),
            class: WordClass::Content,
        })
    }
}
