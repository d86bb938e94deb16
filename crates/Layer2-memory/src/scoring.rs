//! Message importance scoring and keyword extraction
//!
//! 휴리스틱 기반 점수 - 모델 호출 없이 메시지 보존 우선순위를 결정

use crate::message::Role;
use regex::Regex;
use std::sync::OnceLock;

/// Words that mark a message as worth keeping (substring match)
pub const IMPORTANT_KEYWORDS: &[&str] = &[
    "important", "urgent", "problem", "error", "bug", "critical", "how", "why", "explain",
    "define", "what", "when", "where", "solve", "solution", "help", "need", "fix", "issue",
];

const QUESTION_OPENERS: &[&str] = &["how", "why", "what", "where", "when"];

/// English and French stop words dropped from keywords
pub const STOP_WORDS: &[&str] = &[
    // English
    "the", "a", "an", "and", "or", "is", "are", "was", "were", "in", "on", "at", "to", "for",
    "of", "with", "by", "from", "as", "that", "this", "these", "those", "it", "its",
    // French
    "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "est", "sont", "au", "aux",
    "ce", "cette", "ces", "dans", "pour", "avec", "sur", "par", "je", "tu", "il", "elle", "nous",
    "vous", "ils", "elles", "mon", "ma", "mes",
];

/// Keywords kept per message
pub const MAX_KEYWORDS: usize = 5;

const BASE_SCORE: f64 = 0.5;
const LONG_MESSAGE_CHARS: usize = 200;
const SHORT_MESSAGE_CHARS: usize = 50;

/// Importance of a message in `[0.0, 1.0]`
///
/// | factor                                   | delta |
/// |------------------------------------------|-------|
/// | base                                     | 0.5   |
/// | user message                             | +0.1  |
/// | longer than 200 chars / shorter than 50  | ±0.1  |
/// | contains an important keyword            | +0.1  |
/// | contains `?` or opens with a question    | +0.15 |
/// | contains a code fence or 3+ backticks    | +0.1  |
///
/// The additions are applied in this order, so `"hello there"` from a user
/// scores `0.5 + 0.1 - 0.1`.
pub fn importance_score(content: &str, role: Role) -> f64 {
    let mut score = BASE_SCORE;

    if role == Role::User {
        score += 0.1;
    }

    let length = content.chars().count();
    if length > LONG_MESSAGE_CHARS {
        score += 0.1;
    } else if length < SHORT_MESSAGE_CHARS {
        score -= 0.1;
    }

    let lowered = content.to_lowercase();
    if IMPORTANT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        score += 0.1;
    }

    if content.contains('?') || QUESTION_OPENERS.iter().any(|q| lowered.starts_with(q)) {
        score += 0.15;
    }

    if content.contains("```") || content.matches('`').count() > 2 {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s]").expect("literal pattern compiles"))
}

/// First five meaningful words of a message, in order of appearance
///
/// Punctuation becomes whitespace, then stop words and words of three
/// characters or fewer are dropped. Duplicates are kept.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let lowered = content.to_lowercase();
    let cleaned = punctuation().replace_all(&lowered, " ");

    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(word))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_greeting() {
        // 0.5 + 0.1 (user) - 0.1 (short)
        let score = importance_score("Hi", Role::User);
        assert!((score - 0.5).abs() < 1e-9);

        let score = importance_score("Hi", Role::Assistant);
        assert!((score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_question_with_keyword() {
        // 0.5 + 0.1 + (-0.1) + 0.1 + 0.15
        let score = importance_score("How does quantum computing work?", Role::User);
        assert!((score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_plain_user_message_is_not_retained() {
        // exactly 0.6: not above the 0.6 retention threshold
        let content = "x".repeat(100);
        assert!(importance_score(&content, Role::User) <= 0.6);
    }

    #[test]
    fn test_code_and_length() {
        let content = format!("Here is the snippet:\n```rust\nfn main() {{}}\n```\n{}", "z".repeat(200));
        // 0.5 + 0.1 (long) + 0.1 (code)
        let score = importance_score(&content, Role::Assistant);
        assert!((score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_clamped() {
        let content = format!(
            "Why is this critical error happening? `a` `b` `c` {}",
            "padding ".repeat(40)
        );
        let score = importance_score(&content, Role::User);
        assert!(score <= 1.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            extract_keywords("What is quantum computing?"),
            vec!["what", "quantum", "computing"]
        );
        assert_eq!(
            extract_keywords("Explain machine-learning algorithms, then data pipelines and tooling"),
            vec!["explain", "machine", "learning", "algorithms", "then"]
        );
        assert!(extract_keywords("Is it on?").is_empty());
    }

    #[test]
    fn test_keywords_drop_french_stop_words() {
        assert_eq!(
            extract_keywords("Pour les développeurs dans cette équipe"),
            vec!["développeurs", "équipe"]
        );
    }
}
