//! Lexicon sentiment scorer.
//!
//! Scores text by summing word valences (roughly -4..4), flipping and damping
//! words that follow a negation, scaling words after an intensifier, then
//! normalizing the sum into [-1, 1] with `s / sqrt(s² + 15)`.

use anyhow::{anyhow, Result};
use market_pulse_core::SentimentScorer;
use regex::Regex;
use std::collections::HashMap;

const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_INCREMENT: f64 = 0.293;
/// How many preceding tokens a negation reaches
const NEGATION_REACH: usize = 3;

const LEXICON: &[(&str, f64)] = &[
    // general
    ("good", 1.9),
    ("great", 3.1),
    ("excellent", 2.7),
    ("amazing", 2.8),
    ("love", 3.2),
    ("like", 1.5),
    ("happy", 2.7),
    ("win", 2.8),
    ("winning", 2.4),
    ("best", 3.2),
    ("strong", 2.3),
    ("safe", 1.9),
    ("profit", 1.9),
    ("profits", 1.9),
    ("gain", 2.4),
    ("gains", 1.8),
    ("bad", -2.5),
    ("terrible", -2.1),
    ("awful", -2.0),
    ("hate", -2.7),
    ("worst", -3.1),
    ("fear", -2.2),
    ("scared", -2.2),
    ("panic", -2.3),
    ("loss", -1.3),
    ("losses", -1.7),
    ("lose", -1.7),
    ("lost", -1.3),
    ("weak", -1.9),
    ("risk", -1.1),
    ("risky", -1.4),
    ("scam", -2.9),
    ("fraud", -2.8),
    ("hack", -1.6),
    ("hacked", -2.1),
    ("crash", -1.7),
    ("crashed", -1.7),
    ("dump", -1.6),
    ("dumping", -1.6),
    // market slang
    ("bullish", 2.2),
    ("bull", 1.5),
    ("moon", 2.0),
    ("mooning", 2.4),
    ("pump", 1.0),
    ("rally", 1.9),
    ("surge", 1.7),
    ("soar", 2.0),
    ("soaring", 2.2),
    ("breakout", 1.4),
    ("ath", 1.8),
    ("hodl", 1.2),
    ("adoption", 1.2),
    ("bearish", -2.2),
    ("bear", -1.2),
    ("rekt", -2.6),
    ("plunge", -2.1),
    ("plummet", -2.3),
    ("selloff", -1.8),
    ("fud", -1.5),
    ("bubble", -1.3),
    ("rugpull", -3.0),
    ("liquidated", -2.2),
    ("ban", -1.8),
    ("banned", -2.0),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "isnt",
    "isn't", "aint", "ain't", "dont", "don't", "doesnt", "doesn't", "didnt", "didn't", "cant",
    "can't", "cannot", "wont", "won't", "wasnt", "wasn't", "arent", "aren't",
];

const BOOSTERS: &[&str] = &[
    "very", "really", "extremely", "super", "so", "incredibly", "hugely", "totally", "absolutely",
];

/// Word-list scorer with negation and intensifier handling.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<&'static str, f64>,
    url: Regex,
    control: Regex,
    symbols: Regex,
    spaces: Regex,
}

impl LexiconScorer {
    /// Builds the scorer with the built-in lexicon.
    ///
    /// # Errors
    /// Returns an error if a cleaning pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            lexicon: LEXICON.iter().copied().collect(),
            url: compile(r"https?://\S+")?,
            control: compile(r"[\r\n\t]+")?,
            symbols: compile(r#"[^\w\s\-'"]+"#)?,
            spaces: compile(r"\s+")?,
        })
    }

    /// Strips URLs and punctuation, collapses whitespace.
    #[must_use]
    pub fn clean(&self, text: &str) -> String {
        let text = self.url.replace_all(text, "");
        let text = self.control.replace_all(&text, " ");
        let text = self.symbols.replace_all(&text, " ");
        self.spaces.replace_all(&text, " ").trim().to_string()
    }

    fn raw_sum(&self, cleaned: &str) -> f64 {
        let tokens: Vec<String> = cleaned
            .split_whitespace()
            .map(|t| t.trim_matches(|c| c == '\'' || c == '"' || c == '-').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        tokens
            .iter()
            .enumerate()
            .filter_map(|(i, token)| {
                let mut valence = *self.lexicon.get(token.as_str())?;

                if i > 0 && BOOSTERS.contains(&tokens[i - 1].as_str()) {
                    valence += BOOSTER_INCREMENT * valence.signum();
                }

                let window = &tokens[i.saturating_sub(NEGATION_REACH)..i];
                if window.iter().any(|t| NEGATIONS.contains(&t.as_str())) {
                    valence *= NEGATION_SCALAR;
                }

                Some(valence)
            })
            .sum()
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        let sum = self.raw_sum(&self.clean(text));
        if sum == 0.0 {
            return 0.0;
        }
        (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow!("Invalid pattern '{}': {}", pattern, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> LexiconScorer {
        LexiconScorer::new().unwrap()
    }

    #[test]
    fn test_neutral_text_scores_zero() {
        assert_eq!(scorer().score("the block height is 880000"), 0.0);
        assert_eq!(scorer().score(""), 0.0);
    }

    #[test]
    fn test_polarity() {
        let s = scorer();
        assert!(s.score("BTC looking bullish, great rally today") > 0.5);
        assert!(s.score("another exchange hacked, total scam") < -0.5);
    }

    #[test]
    fn test_score_bounded() {
        let s = scorer();
        let text = "great ".repeat(200);
        let score = s.score(&text);
        assert!(score <= 1.0 && score > 0.99);
    }

    #[test]
    fn test_negation_flips_sign() {
        let s = scorer();
        assert!(s.score("this is good") > 0.0);
        assert!(s.score("this is not good") < 0.0);
        assert!(s.score("don't really like it") < 0.0);
    }

    #[test]
    fn test_booster_increases_magnitude() {
        let s = scorer();
        assert!(s.score("very bullish") > s.score("bullish"));
        assert!(s.score("very bearish") < s.score("bearish"));
    }

    #[test]
    fn test_clean_strips_urls_and_punctuation() {
        let s = scorer();
        assert_eq!(
            s.clean("ETH to the moon!!! https://example.com/x?y=1\n\tfor real"),
            "ETH to the moon for real"
        );
        assert_eq!(s.score("moon!!! https://scam.example"), s.score("moon"));
    }

    #[test]
    fn test_normalization_formula() {
        // "good" alone: 1.9 / sqrt(1.9^2 + 15)
        let expected = 1.9 / (1.9_f64 * 1.9 + 15.0).sqrt();
        assert!((scorer().score("good") - expected).abs() < 1e-12);
    }
}
