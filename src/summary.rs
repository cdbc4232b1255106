//! Short contextual summaries for headlines, drawn under the image.

use std::sync::LazyLock;

use regex::Regex;

/// Produces body text for a headline. Never fails and never returns an
/// empty string.
pub trait Summarizer {
    fn summarize(&self, headline: &str) -> String;
}

/// Keyword-driven summarizer. Each heuristic contributes one sentence.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordSummarizer;

const CONTEXT_KEYWORDS: &[(&str, &str)] = &[
    ("arrest", "law enforcement action"),
    ("protest", "public demonstration"),
    ("rally", "public gathering"),
    ("election", "democratic process"),
    ("court", "legal proceedings"),
    ("government", "official policy"),
    ("technology", "technological advancement"),
    ("economy", "economic impact"),
    ("health", "public health"),
    ("climate", "environmental impact"),
    ("sports", "athletic competition"),
    ("entertainment", "cultural event"),
];

const CONTEXT_VARIANTS: &[(&str, &str)] = &[
    ("arrested", "arrest"),
    ("protesting", "protest"),
    ("rallying", "rally"),
    ("voting", "election"),
    ("technological", "technology"),
    ("economic", "economy"),
];

const LOCATIONS: &[(&str, &str)] = &[
    ("london", "United Kingdom capital city"),
    ("paris", "French capital city"),
    ("new york", "US major metropolitan area"),
    ("washington", "US capital region"),
    ("beijing", "Chinese capital city"),
    ("tokyo", "Japanese capital city"),
    ("berlin", "German capital city"),
    ("moscow", "Russian capital city"),
];

const NUMBER_WORDS: &[(&str, u64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("dozen", 12),
    ("hundred", 100),
    ("thousand", 1000),
    ("million", 1_000_000),
];

const HIGH_IMPACT: &[&str] = &["breaking", "major", "massive", "unprecedented", "historic", "crisis"];
const POLICY: &[&str] = &["government", "policy", "law", "legislation", "regulation"];

const TEMPORAL: &[(&str, &str)] = &[
    ("breaking", "This is a developing story with ongoing updates expected"),
    ("continues", "This represents an ongoing situation"),
    ("begins", "This marks the start of a new development"),
    ("ends", "This concludes a significant period or event"),
    ("announces", "This is a recent official announcement"),
    ("reports", "This information has been recently disclosed"),
];

const DEFAULT_TEMPORAL: &str = "This story is part of current news coverage";

fn lookup<V: Copy>(table: &[(&str, V)], key: &str) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn normalize(headline: &str) -> String {
    headline
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn bare(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != ',')
        .trim_end_matches(',')
}

/// Digits, comma-grouped digits (`12,000`) and number words.
fn extract_numbers(text: &str) -> Vec<u64> {
    text.split_whitespace()
        .filter_map(|raw| {
            let word = bare(raw).to_lowercase();
            if word.is_empty() {
                None
            } else if word.chars().all(|c| c.is_ascii_digit()) {
                word.parse().ok()
            } else if is_grouped_number(&word) {
                word.replace(',', "").parse().ok()
            } else {
                lookup(NUMBER_WORDS, &word)
            }
        })
        .collect()
}

/// Thousands-grouped figures such as `1,000` or `12,500,000`.
static GROUPED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(,\d{3})*$").unwrap());

fn is_grouped_number(word: &str) -> bool {
    GROUPED_NUMBER.is_match(word)
}

/// Known cities, and capitalized words following "in".
fn extract_locations(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().map(bare).collect();
    let mut locations = Vec::new();

    for (i, word) in words.iter().enumerate() {
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        if !capitalized || word.chars().count() <= 2 {
            continue;
        }
        let known = lookup(LOCATIONS, &word.to_lowercase()).is_some();
        let after_in = i > 0 && words[i - 1].eq_ignore_ascii_case("in");
        if known || after_in {
            locations.push(word.to_string());
        }
    }
    locations
}

fn context_type(words: &[String]) -> Option<&'static str> {
    words
        .iter()
        .find_map(|w| CONTEXT_KEYWORDS.iter().find(|(k, _)| *k == w.as_str()).map(|(k, _)| *k))
        .or_else(|| words.iter().find_map(|w| lookup(CONTEXT_VARIANTS, w)))
}

fn impact(lower: &str, numbers: &[u64]) -> Option<&'static str> {
    let largest = numbers.iter().copied().max().unwrap_or(0);
    if HIGH_IMPACT.iter().any(|w| lower.contains(w)) {
        Some("This appears to be a high-impact news event with potential widespread implications")
    } else if largest > 1000 {
        Some("The scale of this event suggests significant community or regional impact")
    } else if largest > 100 {
        Some("This event involves substantial participation or impact")
    } else if POLICY.iter().any(|w| lower.contains(w)) {
        Some("This development may have policy implications and affect regulatory frameworks")
    } else {
        None
    }
}

impl Summarizer for KeywordSummarizer {
    fn summarize(&self, headline: &str) -> String {
        let clean = normalize(headline);
        let lower = clean.to_lowercase();
        let words: Vec<String> = lower.split_whitespace().map(|w| bare(w).to_string()).collect();
        let numbers = extract_numbers(&clean);

        let mut parts: Vec<String> = Vec::new();

        if let Some(kind) = context_type(&words)
            && let Some(desc) = lookup(CONTEXT_KEYWORDS, kind)
        {
            parts.push(format!("This headline reports on a {desc}"));
        }

        if numbers.iter().any(|&n| n > 100) {
            parts.push("Involving a significant number of people".into());
        } else if numbers.iter().any(|&n| n > 10) {
            parts.push("Affecting multiple individuals".into());
        }

        for location in extract_locations(&clean) {
            match lookup(LOCATIONS, &location.to_lowercase()) {
                Some(ctx) => parts.push(format!("Taking place in {location} ({ctx})")),
                None => parts.push(format!("Occurring in {location}")),
            }
        }

        if let Some(impact) = impact(&lower, &numbers) {
            parts.push(impact.into());
        }

        let temporal = words.iter().find_map(|w| lookup(TEMPORAL, w));

        if parts.is_empty() && temporal.is_none() {
            if clean.is_empty() {
                return "News Update. This story is part of ongoing current events coverage.".into();
            }
            return format!(
                "Breaking news: {clean}. This developing story represents a significant current \
                 event that may have broader implications for the affected community and stakeholders."
            );
        }

        parts.push(temporal.unwrap_or(DEFAULT_TEMPORAL).into());
        parts.join(". ") + "."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_numbers_and_location() {
        let summary = KeywordSummarizer.summarize("Police arrest 150 protesters in London");
        assert_eq!(
            summary,
            "This headline reports on a law enforcement action. \
             Involving a significant number of people. \
             Taking place in London (United Kingdom capital city). \
             This event involves substantial participation or impact. \
             This story is part of current news coverage."
        );
    }

    #[test]
    fn variants_and_temporal() {
        let summary = KeywordSummarizer.summarize("Economic slowdown continues");
        assert!(summary.starts_with("This headline reports on a economic impact."));
        assert!(summary.ends_with("This represents an ongoing situation."));
    }

    #[test]
    fn unknown_place_after_in() {
        let summary = KeywordSummarizer.summarize("Festival opens in Reykjavik");
        assert!(summary.contains("Occurring in Reykjavik"));
    }

    #[test]
    fn high_impact_beats_numbers() {
        let summary = KeywordSummarizer.summarize("Historic storm leaves 20,000 without power");
        assert!(summary.contains("high-impact news event"));
        assert!(summary.contains("Involving a significant number of people"));
    }

    #[test]
    fn fallback_when_nothing_applies() {
        let summary = KeywordSummarizer.summarize("  \"cat naps quietly\"  ");
        assert!(summary.starts_with("Breaking news: cat naps quietly. This developing story"));
    }

    #[test]
    fn never_empty() {
        assert!(!KeywordSummarizer.summarize("").is_empty());
        assert!(!KeywordSummarizer.summarize("   ").is_empty());
    }

    #[test]
    fn number_extraction() {
        assert_eq!(
            extract_numbers("Two dozen, 1,250 and 7 (plus 12,34)"),
            vec![2, 12, 1250, 7]
        );
        assert!(is_grouped_number("1,000,000"));
        assert!(!is_grouped_number("1000,00"));
        assert!(!is_grouped_number("12,50"));
        assert!(!is_grouped_number(",000"));
        assert!(!is_grouped_number("1,000a"));
    }
}
