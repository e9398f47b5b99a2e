//! Sentiment attribution of posts to symbols.

use market_pulse_core::Post;
use serde::Serialize;

/// Mean sentiment and the number of posts it was taken over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub avg_sentiment: Option<f64>,
    pub post_count: i64,
}

impl SentimentSummary {
    fn of<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Self {
        let (sum, count) = posts
            .into_iter()
            .fold((0.0, 0_i64), |(sum, count), p| (sum + p.sentiment, count + 1));

        Self {
            avg_sentiment: (count > 0).then(|| sum / count as f64),
            post_count: count,
        }
    }
}

/// Returns true if the lowercased text contains any keyword.
#[must_use]
pub fn matches_keywords(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
}

/// Attributes the effective post set to one symbol.
///
/// Posts matching `keywords` are used when there are any. Otherwise (no
/// keyword list, or nothing matched) the whole set is used, which yields
/// `None` / 0 only when `posts` is empty.
#[must_use]
pub fn attribute_sentiment(posts: &[Post], keywords: Option<&[String]>) -> SentimentSummary {
    if let Some(keywords) = keywords {
        let matched = SentimentSummary::of(posts.iter().filter(|p| matches_keywords(&p.text, keywords)));
        if matched.post_count > 0 {
            return matched;
        }
    }
    SentimentSummary::of(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(id: &str, text: &str, sentiment: f64) -> Post {
        let ts = Utc.with_ymd_and_hms(2025, 1, 29, 12, 0, 0).unwrap();
        Post::new(id, "test", text, sentiment, ts)
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn test_keyword_match_is_case_insensitive_substring() {
        let keywords = words(&["eth", "ethereum"]);
        assert!(matches_keywords("ETH merge done", &keywords));
        assert!(matches_keywords("tether depeg?", &keywords));
        assert!(!matches_keywords("bitcoin only", &keywords));
    }

    #[test]
    fn test_matching_posts_only() {
        let posts = vec![
            post("1", "ETH to 10k", 0.8),
            post("2", "bitcoin dip", -0.4),
            post("3", "ethereum gas fees", 0.2),
        ];
        let keywords = words(&["eth"]);

        let summary = attribute_sentiment(&posts, Some(keywords.as_slice()));

        assert_eq!(summary.post_count, 2);
        assert!((summary.avg_sentiment.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_no_match_falls_back_to_all_posts() {
        let posts = vec![post("1", "ETH to 10k", 0.8), post("2", "markets flat", 0.0)];
        let keywords = words(&["btc", "bitcoin"]);

        let summary = attribute_sentiment(&posts, Some(keywords.as_slice()));

        assert_eq!(summary.post_count, 2);
        assert!((summary.avg_sentiment.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_no_keywords_uses_all_posts() {
        let posts = vec![post("1", "a", 0.5), post("2", "b", -0.1)];

        let summary = attribute_sentiment(&posts, None);

        assert_eq!(summary.post_count, 2);
        assert!((summary.avg_sentiment.unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_no_posts() {
        let keywords = words(&["btc"]);
        let expected = SentimentSummary {
            avg_sentiment: None,
            post_count: 0,
        };

        assert_eq!(attribute_sentiment(&[], Some(keywords.as_slice())), expected);
        assert_eq!(attribute_sentiment(&[], None), expected);
    }
}
