//! Maps free-form user text to an intent key via keyword sets, and thence
//! to a response category.

pub struct IntentClassifier {
    intents: Vec<(&'static str, &'static [&'static str], &'static str)>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            intents: vec![
                (
                    "praise",
                    &["good boy", "good dog", "well done", "nice job"],
                    "response_good_dog",
                ),
                (
                    "scold",
                    &["bad dog", "no!", "stop it", "naughty"],
                    "response_bad_dog",
                ),
                (
                    "affection",
                    &["love you", "good boy", "cuddle", "pet you"],
                    "affection_expressing",
                ),
                ("farewell", &["bye", "goodbye", "see you"], "farewell_general"),
                ("greeting", &["hello", "hi there", "hey"], "greeting_unknown_person"),
            ],
        }
    }

    /// Returns the intent key for the first matching keyword set.
    pub fn classify(&self, text: &str) -> Option<&'static str> {
        let lowered = text.to_lowercase();
        self.intents
            .iter()
            .find(|(_, keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(key, _, _)| *key)
    }

    /// Returns the response category for a matched intent, if any.
    pub fn classify_to_category(&self, text: &str) -> Option<&'static str> {
        let lowered = text.to_lowercase();
        self.intents
            .iter()
            .find(|(_, keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, _, category)| *category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_praise() {
        let classifier = IntentClassifier::new();
        assert_eq!(classifier.classify("good boy!"), Some("praise"));
    }

    #[test]
    fn unmatched_text_yields_none() {
        let classifier = IntentClassifier::new();
        assert_eq!(classifier.classify("the weather is nice today"), None);
    }

    #[test]
    fn category_lookup_matches_classify() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify_to_category("bad dog, no!"),
            Some("response_bad_dog")
        );
    }
}
