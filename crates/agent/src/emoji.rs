//! Keyword/sentiment emoji heuristics for react decisions.
//!
//! Fixed priority: funny > positive > sad > surprised > loving >
//! questioning > default pool. Selection is deterministic for identical
//! input, including the default-pool pick.

const FUNNY: &[&str] = &["lol", "lmao", "haha", "hilarious", "funny", "joke", "😂", "🤣"];
const POSITIVE: &[&str] = &[
    "great", "awesome", "nice", "amazing", "cool", "congrats", "well done", "thanks",
];
const SAD: &[&str] = &["sad", "sorry", "unfortunately", "crying", "rip", "miss him", "miss her", "😢"];
const SURPRISED: &[&str] = &["wow", "whoa", "no way", "omg", "unbelievable", "really?!"];
const LOVING: &[&str] = &["love", "adore", "heart", "miss you", "❤", "🥰"];
const QUESTION_WORDS: &[&str] = &["how ", "why ", "what if"];

const DEFAULT_POOL: &[&str] = &["👍", "😄", "🙂", "✨", "👀"];

/// Pick an emoji for a message's content.
pub fn suggest(content: &str) -> String {
    let lower = content.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if contains_any(FUNNY) {
        "😂".into()
    } else if contains_any(POSITIVE) {
        "👍".into()
    } else if contains_any(SAD) {
        "😢".into()
    } else if contains_any(SURPRISED) {
        "😮".into()
    } else if contains_any(LOVING) {
        "❤️".into()
    } else if lower.contains('?') || contains_any(QUESTION_WORDS) {
        "🤔".into()
    } else {
        // Deterministic pick: content length selects from the pool.
        DEFAULT_POOL[content.chars().count() % DEFAULT_POOL.len()].into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_funny_first() {
        // "lmao" (funny) beats "awesome" (positive) and "?" (questioning)
        assert_eq!(suggest("lmao that is awesome?"), "😂");
    }

    #[test]
    fn positive_beats_sad() {
        assert_eq!(suggest("congrats, sorry I'm late"), "👍");
    }

    #[test]
    fn each_category_maps() {
        assert_eq!(suggest("haha good one"), "😂");
        assert_eq!(suggest("that's awesome"), "👍");
        assert_eq!(suggest("so sorry to hear that"), "😢");
        assert_eq!(suggest("wow I did not expect that"), "😮");
        assert_eq!(suggest("I adore this band"), "❤️");
        assert_eq!(suggest("is that right?"), "🤔");
    }

    #[test]
    fn default_pool_is_deterministic() {
        let content = "just some ordinary text";
        let first = suggest(content);
        assert_eq!(suggest(content), first);
        assert!(DEFAULT_POOL.contains(&first.as_str()));
    }

    #[test]
    fn never_returns_empty() {
        for content in ["", "x", "plain message", "??", "🤷"] {
            assert!(!suggest(content).is_empty());
        }
    }
}
