//! Paywall heuristic based on subscription-gate phrases.
//!
//! The indicator lists are plain configuration: [`PaywallIndicators::default`]
//! carries built-in English and Japanese phrases, and a config file can
//! replace either list.

use serde::{Deserialize, Serialize};

/// Phrases correlated with subscription-gated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaywallIndicators {
    pub english: Vec<String>,
    pub japanese: Vec<String>,
}

impl Default for PaywallIndicators {
    fn default() -> Self {
        let english = [
            "subscribe to continue",
            "subscribe to read",
            "subscription required",
            "subscribers only",
            "for subscribers",
            "already a subscriber",
            "sign in to read",
            "sign in to continue",
            "log in to continue",
            "to continue reading",
            "premium content",
            "members only",
            "become a member",
            "start your free trial",
            "unlock this article",
        ];
        let japanese = [
            "有料会員",
            "会員限定",
            "有料記事",
            "この記事は有料",
            "続きを読むには",
            "ログインして続きを読む",
            "会員登録",
            "購読手続き",
            "無料会員",
        ];
        Self {
            english: english.iter().map(|s| s.to_string()).collect(),
            japanese: japanese.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Outcome of a paywall check.
#[derive(Debug, Clone, PartialEq)]
pub struct PaywallVerdict {
    pub paywalled: bool,
    /// Distinct indicators found, in list order.
    pub matched: Vec<String>,
}

/// Length-aware paywall classifier.
///
/// - shorter than `short_length` chars: one indicator is enough
/// - `short_length..lenient_length` chars: two distinct indicators needed
/// - `lenient_length` chars or more: never paywalled
#[derive(Debug, Clone)]
pub struct PaywallDetector {
    indicators: Vec<String>,
    short_length: usize,
    lenient_length: usize,
}

impl PaywallDetector {
    pub fn new(indicators: &PaywallIndicators, short_length: usize, lenient_length: usize) -> Self {
        let mut lowered: Vec<String> = Vec::new();
        for phrase in indicators.english.iter().chain(indicators.japanese.iter()) {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && !lowered.contains(&phrase) {
                lowered.push(phrase);
            }
        }
        Self {
            indicators: lowered,
            short_length,
            lenient_length,
        }
    }

    pub fn detect(&self, text: &str) -> PaywallVerdict {
        let length = text.chars().count();
        let haystack = text.to_lowercase();
        let matched: Vec<String> = self
            .indicators
            .iter()
            .filter(|phrase| haystack.contains(phrase.as_str()))
            .cloned()
            .collect();

        let paywalled = if length >= self.lenient_length {
            false
        } else if length >= self.short_length {
            matched.len() >= 2
        } else {
            !matched.is_empty()
        };

        PaywallVerdict { paywalled, matched }
    }
}

impl Default for PaywallDetector {
    fn default() -> Self {
        Self::new(&PaywallIndicators::default(), 200, 1500)
    }
}
