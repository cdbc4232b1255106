use std::fmt;

use serde::{Deserialize, Serialize};

use crate::history::HistoryWindow;

/// Visual treatment requested from the render server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Style {
    News,
    Funny,
    Artistic,
    Realistic,
}

impl Style {
    /// Lenient name lookup. Anything unrecognized is `News`, so
    /// `"news illustration"` and `"photo"` both resolve sensibly.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("funny") || lower.contains("humor") {
            Style::Funny
        } else if lower.contains("art") {
            Style::Artistic
        } else if lower.contains("realistic") || lower.contains("photo") {
            Style::Realistic
        } else {
            Style::News
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Style::News => "news",
            Style::Funny => "funny",
            Style::Artistic => "artistic",
            Style::Realistic => "realistic",
        }
    }
}

impl From<String> for Style {
    fn from(name: String) -> Self {
        Style::from_name(&name)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when every candidate was already seen in a previous cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Re-use the unfiltered candidates (truncated to the selection size).
    #[default]
    Unfiltered,
    /// Select nothing for this cycle.
    Skip,
}

/// Content-based style overrides, evaluated first-match-wins.
const STYLE_RULES: &[(&[&str], Style)] = &[
    (&["funny", "bizarre", "weird", "unusual", "odd"], Style::Funny),
    (&["art", "culture", "design", "creative"], Style::Artistic),
    (&["breaking", "urgent", "news", "report"], Style::News),
];

const KEYWORD_WEIGHT: i32 = 10;
const MAX_LENGTH_BONUS: i32 = 5;
const SHORT_HEADLINE_LEN: usize = 30;
const SHORT_HEADLINE_PENALTY: i32 = 5;

/// Scores, de-duplicates and styles a batch of candidate headlines.
#[derive(Debug, Clone)]
pub struct HeadlineSelector {
    priority_keywords: Vec<String>,
    styles: Vec<Style>,
    fallback: FallbackPolicy,
}

impl HeadlineSelector {
    pub fn new(priority_keywords: &[String], styles: Vec<Style>, fallback: FallbackPolicy) -> Self {
        Self {
            priority_keywords: priority_keywords.iter().map(|k| k.to_lowercase()).collect(),
            styles,
            fallback,
        }
    }

    /// Pick up to `max_count` headlines, best first, each paired with a style.
    ///
    /// Headlines present in `history` are dropped. If that drops every
    /// candidate, the fallback policy decides: `Unfiltered` re-uses the first
    /// `max_count` candidates, so a non-empty batch always yields a selection.
    pub fn select(
        &self,
        candidates: &[String],
        history: &HistoryWindow,
        max_count: usize,
    ) -> Vec<(String, Style)> {
        if max_count == 0 {
            return Vec::new();
        }

        let fresh: Vec<&String> = candidates.iter().filter(|h| !history.contains(h)).collect();
        let pool: Vec<&String> = if !fresh.is_empty() {
            fresh
        } else {
            match self.fallback {
                FallbackPolicy::Unfiltered => candidates.iter().take(max_count).collect(),
                FallbackPolicy::Skip => Vec::new(),
            }
        };

        let mut scored: Vec<(i32, &String)> = pool.into_iter().map(|h| (self.score(h), h)).collect();
        // Stable: equal scores keep fetch order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(max_count)
            .enumerate()
            .map(|(index, (_, headline))| (headline.clone(), self.style_for(headline, index)))
            .collect()
    }

    /// Priority keywords, descriptiveness bonus and short-headline penalty.
    pub fn score(&self, headline: &str) -> i32 {
        let lower = headline.to_lowercase();
        let mut score = 0;

        for keyword in &self.priority_keywords {
            if lower.contains(keyword.as_str()) {
                score += KEYWORD_WEIGHT;
            }
        }

        let len = headline.chars().count();
        score += ((len / 10) as i32).min(MAX_LENGTH_BONUS);
        if len < SHORT_HEADLINE_LEN {
            score -= SHORT_HEADLINE_PENALTY;
        }

        score
    }

    /// Keyword rule first, otherwise round-robin over the configured styles.
    pub fn style_for(&self, headline: &str, index: usize) -> Style {
        let lower = headline.to_lowercase();

        for &(words, style) in STYLE_RULES {
            if words.iter().any(|w| lower.contains(w)) {
                return style;
            }
        }

        if self.styles.is_empty() {
            Style::News
        } else {
            self.styles[index % self.styles.len()]
        }
    }
}
