//! Snippet extraction around the first matching word

use crate::text::{clean_word, TextAnalyzer};

/// Builds a snippet from page text
///
/// Finds the first word whose root form contains one of `lemmas`, wraps its
/// cleaned form in `<b>` and keeps `context` words on each side. Returns an
/// empty string if no word matches.
pub fn build_snippet(
    analyzer: &TextAnalyzer,
    content: &str,
    lemmas: &[String],
    context: usize,
) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();

    let Some(hit) = words.iter().position(|word| {
        let root = analyzer.root_form(word);
        !root.is_empty() && lemmas.iter().any(|lemma| root.contains(lemma.as_str()))
    }) else {
        return String::new();
    };

    let start = hit.saturating_sub(context);
    let end = (hit + context + 1).min(words.len());

    let mut parts: Vec<String> = Vec::with_capacity(end - start);
    parts.extend(words[start..hit].iter().map(|word| word.to_string()));
    parts.push(format!("<b>{}</b>", clean_word(words[hit])));
    parts.extend(words[hit + 1..end].iter().map(|word| word.to_string()));

    format!("{}...", parts.join(" "))
}
