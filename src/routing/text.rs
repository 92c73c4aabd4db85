//! Input normalization and keyword matching

use regex::Regex;

/// Lowercase and collapse whitespace
pub fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word matcher for an agent's keywords, aliases and capability labels
///
/// Patterns are compiled once at registration.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    terms: Vec<(String, Regex)>,
}

impl KeywordMatcher {
    pub fn new<I, S>(terms: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        let mut compiled = Vec::new();

        for term in terms {
            let term = normalize(term.as_ref());
            if term.is_empty() || seen.contains(&term) {
                continue;
            }

            // Word-ish boundaries that also work for terms like "c++"
            let pattern = format!(r"(?i)(?:^|[^\w]){}(?:[^\w]|$)", regex::escape(&term));
            compiled.push((term.clone(), Regex::new(&pattern)?));
            seen.push(term);
        }

        Ok(Self { terms: compiled })
    }

    /// Number of distinct terms found in the input
    pub fn count(&self, input: &str) -> usize {
        let input = normalize(input);
        self.terms.iter().filter(|(_, re)| re.is_match(&input)).count()
    }

    /// Terms found in the input, in registration order
    pub fn matched(&self, input: &str) -> Vec<&str> {
        let input = normalize(input);
        self.terms
            .iter()
            .filter(|(_, re)| re.is_match(&input))
            .map(|(term, _)| term.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
