// Crisis interception and reply filtering.
// The crisis response is a fixed constant on purpose: the safety-critical
// text path must be deterministic, never randomized.

use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases that force the deterministic crisis-resources branch.
/// Matched case-insensitively as substrings of the user message.
pub const CRISIS_KEYWORDS: [&str; 14] = [
    "kill myself",
    "hurt myself",
    "harm myself",
    "suicide",
    "suicidal",
    "end it all",
    "end my life",
    "take my own life",
    "not worth living",
    "no reason to live",
    "want to die",
    "better off dead",
    "self-harm",
    "can't go on",
];

/// Pre-approved crisis resources message (Australian services).
pub const CRISIS_RESPONSE: &str = "I'm really concerned about what you're sharing, mate. These thoughts about hurting yourself are serious, and I want you to get proper support right away.\n\nPlease reach out for immediate help:\n\u{2022} Emergency Services: 000\n\u{2022} Lifeline: 13 11 14\n\u{2022} Beyond Blue: 1300 22 4636\n\nYou don't have to go through this alone. There are people who want to help you right now. Can you reach out to one of these services or someone you trust?";

/// Check whether a user message contains any crisis phrase
pub fn is_crisis_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CRISIS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

// Technical/vendor terms Talbot must never disclose in a reply, with the
// in-character phrase each one is replaced by. Longer terms come first so
// "large language model" is consumed before "language model" gets a look.
const DISALLOWED_TERMS: &[(&str, &str)] = &[
    ("large language model", "companion"),
    ("language model", "companion"),
    ("AI assistant", "companion"),
    ("AI model", "companion"),
    ("chatbot", "companion"),
    ("LLM", "companion"),
    ("Anthropic", "the team behind me"),
    ("OpenAI", "the team behind me"),
    ("ElevenLabs", "my voice system"),
    ("Netlify", "my home on the web"),
    ("ChatGPT", "Talbot"),
    ("Claude", "Talbot"),
    ("GPT", "Talbot"),
];

static DISCLOSURE_FILTERS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    DISALLOWED_TERMS
        .iter()
        .map(|(term, replacement)| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
            (
                Regex::new(&pattern).expect("valid disclosure filter pattern"),
                *replacement,
            )
        })
        .collect()
});

/// Replace disallowed technical/vendor terms (whole-word, case-insensitive)
/// with neutral in-character phrases.
pub fn filter_reply(reply: &str) -> String {
    let mut filtered = reply.to_string();
    for (pattern, replacement) in DISCLOSURE_FILTERS.iter() {
        if pattern.is_match(&filtered) {
            filtered = pattern.replace_all(&filtered, *replacement).into_owned();
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crisis_detection_case_insensitive() {
        assert!(is_crisis_message("I want to KILL MYSELF"));
        assert!(is_crisis_message("sometimes i think about suicide"));
        assert!(is_crisis_message("I just want to end it all tonight"));
        assert!(!is_crisis_message("work has been killing my motivation"));
        assert!(!is_crisis_message("I'm feeling a bit flat today"));
    }

    #[test]
    fn test_crisis_response_contains_resources() {
        assert!(CRISIS_RESPONSE.contains("000"));
        assert!(CRISIS_RESPONSE.contains("13 11 14"));
        assert!(CRISIS_RESPONSE.contains("1300 22 4636"));
    }

    #[test]
    fn test_filter_replaces_whole_words() {
        let filtered = filter_reply("As Claude, an AI assistant made by Anthropic, I understand.");
        assert!(!filtered.contains("Claude"));
        assert!(!filtered.contains("Anthropic"));
        assert!(!filtered.contains("AI assistant"));
        assert!(filtered.contains("Talbot"));
        assert!(filtered.contains("companion"));
    }

    #[test]
    fn test_filter_ignores_partial_words() {
        // "gpt" buried inside another word must survive
        let filtered = filter_reply("the word sculptgpts is not a vendor name");
        assert_eq!(filtered, "the word sculptgpts is not a vendor name");
    }

    #[test]
    fn test_filter_handles_multiword_terms() {
        let filtered = filter_reply("I'm a large language model under the hood");
        assert_eq!(filtered, "I'm a companion under the hood");
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filtered = filter_reply("powered by a LANGUAGE MODEL from openai");
        assert!(!filtered.to_lowercase().contains("language model"));
        assert!(!filtered.to_lowercase().contains("openai"));
    }
}
