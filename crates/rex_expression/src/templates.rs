//! Static registry of categorized (speech, actions) response variants.
//!
//! `get_response` selects uniformly at random among a category's variants;
//! a `category_{mood_modifier}` specialization wins over the base category
//! when present. Missing `{placeholder}` substitutions are left literal.

use rand::seq::SliceRandom;
use rex_core::Action;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ResponseVariant {
    pub speech: &'static str,
    pub actions: &'static [Action],
}

pub struct TemplateLibrary {
    categories: HashMap<&'static str, Vec<ResponseVariant>>,
}

macro_rules! variant {
    ($speech:expr, [$($action:expr),* $(,)?]) => {
        ResponseVariant { speech: $speech, actions: &[$($action),*] }
    };
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLibrary {
    pub fn new() -> Self {
        use Action::*;
        let mut categories: HashMap<&'static str, Vec<ResponseVariant>> = HashMap::new();

        categories.insert(
            "greeting_known_person",
            vec![
                variant!("Hey, it's {name}!", [WagTail, Sit]),
                variant!("{name}! Good to see you.", [WagTail]),
            ],
        );
        categories.insert(
            "greeting_known_person_excited",
            vec![
                variant!("{name}! {name}! You're here!", [WagTail, TwistBody]),
                variant!("{name} is back!!", [WagTail, HighFive]),
            ],
        );
        categories.insert(
            "greeting_known_person_tired",
            vec![variant!("Oh... hi {name}.", [WagTail])],
        );
        categories.insert(
            "greeting_returning_person",
            vec![
                variant!("{name}, you came back!", [WagTail, TwistBody]),
                variant!("Welcome back, {name}.", [WagTail]),
            ],
        );
        categories.insert(
            "greeting_unknown_person",
            vec![
                variant!("Oh, hello there!", [Nod, WagTail]),
                variant!("Who's this?", [Nod]),
            ],
        );
        categories.insert(
            "reaction_too_close",
            vec![variant!("Whoa, too close!", [Backward, Surprise])],
        );
        categories.insert(
            "reaction_obstacle",
            vec![variant!("Careful, something's there.", [Backward])],
        );
        categories.insert(
            "affection_being_pet",
            vec![
                variant!("That feels nice.", [WagTail, Pant]),
                variant!("Mmm, more please!", [WagTail]),
            ],
        );
        categories.insert(
            "response_bad_dog",
            vec![variant!("Okay, okay, sorry!", [Backward, ShakeHead])],
        );
        categories.insert(
            "response_good_dog",
            vec![
                variant!("Yay, thank you!", [WagTail, TwistBody]),
                variant!("I did good!", [WagTail, HighFive]),
            ],
        );
        categories.insert("reaction_surprised", vec![variant!("Oh!", [Surprise])]);
        categories.insert(
            "goal_working_on",
            vec![variant!("I'm working on it.", [Think])],
        );
        categories.insert(
            "goal_completed",
            vec![variant!("I did it! I finally learned it!", [TwistBody, WagTail])],
        );
        categories.insert(
            "bored_playful",
            vec![variant!("Wanna play?", [WagTail, TwistBody])],
        );
        categories.insert(
            "bored_restless",
            vec![variant!("I need to move around.", [Forward, TurnLeft])],
        );
        categories.insert("bored_idle", vec![variant!("...", [Stretch])]);
        categories.insert(
            "curious_investigating",
            vec![variant!("What's that?", [Nod])],
        );
        categories.insert(
            "curious_sniffing",
            vec![variant!("Hmm, interesting smell.", [Forward])],
        );
        categories.insert(
            "exploring_start",
            vec![variant!("Let's go explore!", [Forward])],
        );
        categories.insert(
            "tired_going_to_sleep",
            vec![variant!("I'm going to rest now.", [Lie, DozeOff])],
        );
        categories.insert("tired_general", vec![variant!("So sleepy...", [DozeOff])]);
        categories.insert(
            "happy_excited",
            vec![variant!("This is the best!", [TwistBody, WagTail])],
        );
        categories.insert("happy_general", vec![variant!("I'm happy.", [WagTail])]);
        categories.insert(
            "happy_content",
            vec![variant!("Life is good.", [WagTail, Stretch])],
        );
        categories.insert("idle_sounds", vec![variant!("", [Nod])]);
        categories.insert(
            "farewell_sad",
            vec![variant!("Aw, you're leaving already?", [])],
        );
        categories.insert(
            "farewell_known_person",
            vec![variant!("Bye {name}, see you soon!", [WagTail])],
        );
        categories.insert("farewell_general", vec![variant!("Goodbye!", [WagTail])]);
        categories.insert(
            "affection_seeking",
            vec![variant!("Can I get some pets?", [Nod])],
        );
        categories.insert(
            "affection_expressing",
            vec![variant!("I love you!", [WagTail, LickHand])],
        );

        Self { categories }
    }

    /// Select uniformly among `category`'s variants (or `category_{modifier}`
    /// if that specialization exists), substituting `{key}` placeholders.
    pub fn get_response(
        &self,
        category: &str,
        mood_modifier: Option<&str>,
        subs: &HashMap<&str, String>,
    ) -> Option<(String, Vec<Action>)> {
        let specialized = mood_modifier.map(|m| format!("{category}_{m}"));
        let variants = specialized
            .as_deref()
            .and_then(|k| self.categories.get(k))
            .or_else(|| self.categories.get(category))?;

        let chosen = variants.choose(&mut rand::thread_rng())?;
        let mut speech = chosen.speech.to_string();
        for (key, value) in subs {
            speech = speech.replace(&format!("{{{key}}}"), value);
        }
        Some((speech, chosen.actions.to_vec()))
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders() {
        let lib = TemplateLibrary::new();
        let mut subs = HashMap::new();
        subs.insert("name", "Joe".to_string());
        let (speech, _) = lib.get_response("greeting_known_person", None, &subs).unwrap();
        assert!(speech.contains("Joe"));
    }

    #[test]
    fn missing_placeholder_left_literal() {
        let lib = TemplateLibrary::new();
        let (speech, _) = lib
            .get_response("farewell_known_person", None, &HashMap::new())
            .unwrap();
        assert!(speech.contains("{name}"));
    }

    #[test]
    fn mood_specialization_wins_when_present() {
        let lib = TemplateLibrary::new();
        let mut subs = HashMap::new();
        subs.insert("name", "Ann".to_string());
        let (speech, _) = lib
            .get_response("greeting_known_person", Some("excited"), &subs)
            .unwrap();
        assert!(speech.contains("Ann"));
    }

    #[test]
    fn unknown_category_returns_none() {
        let lib = TemplateLibrary::new();
        assert!(lib
            .get_response("does_not_exist", None, &HashMap::new())
            .is_none());
    }
}
