//! # Scoring Rubric
//!
//! Text statistics and the four criteria an answer is scored on. Every
//! function here is pure: the same text and metadata always give the same
//! scores.
//!
//! ## Criteria:
//! - **substance** (0.30): answer length against the difficulty's word band
//! - **relevance** (0.30): coverage of expected keywords
//! - **structure** (0.20): sentence count and connective/example/outcome markers
//! - **clarity** (0.20): filler-word ratio and average sentence length

use super::request::Difficulty;
use std::collections::BTreeSet;

pub const SUBSTANCE_WEIGHT: f64 = 0.30;
pub const RELEVANCE_WEIGHT: f64 = 0.30;
pub const STRUCTURE_WEIGHT: f64 = 0.20;
pub const CLARITY_WEIGHT: f64 = 0.20;

/// Scores below this get an improvement tip.
pub const TIP_THRESHOLD: f64 = 0.7;

const MAX_DERIVED_KEYWORDS: usize = 8;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "being", "below", "between", "could", "describe", "does",
    "doing", "during", "explain", "from", "have", "having", "other", "should", "tell",
    "their", "there", "these", "they", "this", "those", "through", "under", "what", "when",
    "where", "which", "while", "would", "your", "yours", "yourself",
];

const CONNECTIVES: &[&str] = &[
    "first", "firstly", "second", "then", "next", "because", "however", "therefore",
    "finally", "afterwards", "also", "meanwhile",
];
const EXAMPLE_MARKERS: &[&str] = &["for example", "for instance", "such as", "e.g", "in one case"];
const OUTCOME_MARKERS: &[&str] = &[
    "result", "outcome", "impact", "improved", "reduced", "increased", "learned", "delivered",
    "achieved", "saved",
];

const FILLER_WORDS: &[&str] = &["um", "uh", "erm", "like", "basically", "actually", "literally"];
const FILLER_PHRASES: &[&str] = &["you know", "kind of", "sort of", "i mean"];

/// Word and sentence statistics for an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerStats {
    /// Lower-cased words with surrounding punctuation stripped
    pub words: Vec<String>,
    pub sentences: usize,
    /// Words joined by single spaces, padded, for phrase matching
    normalized: String,
}

impl AnswerStats {
    pub fn analyze(text: &str) -> Self {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        let sentences = text
            .split(|c| matches!(c, '.' | '!' | '?'))
            .filter(|s| s.chars().any(char::is_alphanumeric))
            .count()
            .max(usize::from(!words.is_empty()));

        let normalized = format!(" {} ", words.join(" "));

        Self {
            words,
            sentences,
            normalized,
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Whole-word (or whole-phrase) match, tolerating a plural `s`.
    pub fn mentions(&self, term: &str) -> bool {
        let term = term
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if term.is_empty() {
            return false;
        }
        self.normalized.contains(&format!(" {} ", term))
            || self.normalized.contains(&format!(" {}s ", term))
    }

    fn count_phrase(&self, phrase: &str) -> usize {
        self.normalized.matches(&format!(" {} ", phrase)).count()
    }

    pub fn average_sentence_length(&self) -> f64 {
        if self.sentences == 0 {
            return 0.0;
        }
        self.word_count() as f64 / self.sentences as f64
    }
}

/// A criterion's score in [0, 1] and the advice to give if it is low.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub tip: String,
}

pub fn substance(stats: &AnswerStats, difficulty: Difficulty) -> Assessment {
    let (min, max) = difficulty.word_band();
    let count = stats.word_count();

    if count < min {
        Assessment {
            score: count as f64 / min as f64,
            tip: format!(
                "Add more detail: aim for at least {} words on a {} question (this answer has {}).",
                min,
                difficulty.label(),
                count
            ),
        }
    } else if count > max {
        Assessment {
            score: (max as f64 / count as f64).max(0.4),
            tip: format!(
                "Tighten the answer: aim for at most {} words (this answer has {}).",
                max, count
            ),
        }
    } else {
        Assessment {
            score: 1.0,
            tip: String::new(),
        }
    }
}

/// Keywords taken from the question when the caller supplies none.
pub fn derive_keywords(question_text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    question_text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.chars().count() >= 5 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_DERIVED_KEYWORDS)
        .collect()
}

/// Keyword coverage. `None` when there is nothing to compare against.
///
/// Keywords derived from the question are a rough proxy, so covering half of
/// them already earns full marks.
pub fn relevance(stats: &AnswerStats, keywords: &[String], derived: bool) -> Option<Assessment> {
    if keywords.is_empty() {
        return None;
    }

    let missing: Vec<&str> = keywords
        .iter()
        .filter(|k| !stats.mentions(k))
        .map(String::as_str)
        .collect();
    let fraction = (keywords.len() - missing.len()) as f64 / keywords.len() as f64;
    let score = if derived { (2.0 * fraction).min(1.0) } else { fraction };

    let suggestions: Vec<&str> = missing.iter().take(3).copied().collect();
    let tip = if suggestions.is_empty() {
        "Address the question more directly.".to_string()
    } else {
        format!(
            "Address the question more directly; consider covering: {}.",
            suggestions.join(", ")
        )
    };

    Some(Assessment { score, tip })
}

pub fn structure(stats: &AnswerStats) -> Assessment {
    let sentence_score = stats.sentences.min(4) as f64 / 4.0;

    let has = |markers: &[&str]| markers.iter().any(|m| stats.count_phrase(m) > 0);
    let marker_groups = [
        has(CONNECTIVES),
        has(EXAMPLE_MARKERS),
        has(OUTCOME_MARKERS),
    ];
    let marker_score = marker_groups.iter().filter(|&&present| present).count() as f64 / 3.0;

    let tip = if !marker_groups[1] {
        "Back the answer with a concrete example (\"for example, ...\") and finish with the outcome."
    } else if !marker_groups[2] {
        "Close with the result: what changed because of your work?"
    } else {
        "Break the answer into a few clear sentences that walk through situation, action and result."
    };

    Assessment {
        score: 0.5 * sentence_score + 0.5 * marker_score,
        tip: tip.to_string(),
    }
}

pub fn clarity(stats: &AnswerStats) -> Assessment {
    let words = stats.word_count().max(1) as f64;
    let fillers = stats
        .words
        .iter()
        .filter(|w| FILLER_WORDS.contains(&w.as_str()))
        .count()
        + FILLER_PHRASES.iter().map(|p| stats.count_phrase(p)).sum::<usize>();
    let filler_ratio = fillers as f64 / words;
    let filler_score = (1.0 - 10.0 * filler_ratio).clamp(0.0, 1.0);

    let average = stats.average_sentence_length();
    let length_score = if average < 8.0 {
        average / 8.0
    } else if average > 25.0 {
        25.0 / average
    } else {
        1.0
    };

    let tip = if filler_score < length_score {
        format!(
            "Cut filler words (\"um\", \"like\", \"you know\"): {} in {} words.",
            fillers,
            stats.word_count()
        )
    } else if average > 25.0 {
        format!(
            "Use shorter sentences: they average {:.0} words; 10 to 20 is easier to follow.",
            average
        )
    } else {
        "Develop each point in full sentences instead of fragments.".to_string()
    };

    Assessment {
        score: 0.6 * filler_score + 0.4 * length_score,
        tip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_counts_words_and_sentences() {
        let stats = AnswerStats::analyze("I led the team. We shipped on time! Any questions?");
        assert_eq!(stats.word_count(), 10);
        assert_eq!(stats.sentences, 3);
        assert_eq!(stats.words[0], "i");
        assert_eq!(stats.words[3], "team");
    }

    #[test]
    fn test_unpunctuated_text_is_one_sentence() {
        assert_eq!(AnswerStats::analyze("just some words").sentences, 1);
    }

    #[test]
    fn test_mentions_whole_words_and_plurals() {
        let stats = AnswerStats::analyze("We added caches and a load balancer.");
        assert!(stats.mentions("cache"));
        assert!(stats.mentions("Load Balancer"));
        assert!(!stats.mentions("load balancing"));
        assert!(!stats.mentions("add"));
    }

    #[test]
    fn test_substance_band() {
        let short = AnswerStats::analyze(&"word ".repeat(25));
        let fitting = AnswerStats::analyze(&"word ".repeat(100));
        let long = AnswerStats::analyze(&"word ".repeat(400));

        assert!((substance(&short, Difficulty::Medium).score - 0.5).abs() < 1e-9);
        assert_eq!(substance(&fitting, Difficulty::Medium).score, 1.0);
        assert!((substance(&long, Difficulty::Medium).score - 0.5).abs() < 1e-9);
        assert!(substance(&short, Difficulty::Easy).score > substance(&short, Difficulty::Hard).score);
    }

    #[test]
    fn test_derive_keywords_skips_short_and_stop_words() {
        let keywords = derive_keywords("Tell me about a time you improved database performance.");
        assert_eq!(keywords, vec!["improved", "database", "performance"]);
    }

    #[test]
    fn test_relevance() {
        let stats = AnswerStats::analyze("I tuned the database indexes.");
        let keywords = vec!["database".to_string(), "caching".to_string()];

        let explicit = relevance(&stats, &keywords, false).unwrap();
        assert!((explicit.score - 0.5).abs() < 1e-9);
        assert!(explicit.tip.contains("caching"));

        let derived = relevance(&stats, &keywords, true).unwrap();
        assert_eq!(derived.score, 1.0);

        assert!(relevance(&stats, &[], false).is_none());
    }

    #[test]
    fn test_structure_rewards_markers() {
        let flat = AnswerStats::analyze("I did the work");
        let rich = AnswerStats::analyze(
            "First I profiled the service. For example, the login path was slow. \
             Then I added caching. As a result latency was reduced by half.",
        );
        assert!(structure(&rich).score > structure(&flat).score);
        assert_eq!(structure(&rich).score, 1.0);
    }

    #[test]
    fn test_clarity_penalises_fillers() {
        let clean = AnswerStats::analyze("I measured the queue depth and added two more workers to the pool.");
        let filler = AnswerStats::analyze("Um I like basically you know added um workers and like stuff.");
        assert!(clarity(&clean).score > clarity(&filler).score);
        assert!(clarity(&filler).tip.contains("filler"));
    }
}
