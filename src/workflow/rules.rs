//! Steady-state dispatch rules.
//!
//! An ordered list of keyword/regex rules run against the normalized
//! utterance. The first rule that matches decides the intent; order is part
//! of the behavior ("I ate 12 laps" is a meal question, not exercise).

use regex::{Captures, Regex};
use tracing::debug;

use crate::parser::{self, ExerciseEntry};

/// What the user asked for at steady state.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// "what do i eat for lunch"
    AskPlan { meal: String },
    /// "i ate lunch" / "i ate breakfast as planned"
    AteMeal { meal: Option<String>, per_plan: bool },
    /// "swam 12 laps", "walked 30 minutes"
    Exercise(ExerciseEntry),
    /// The fixed off-plan fast-food confession.
    Cheat,
    /// "i didn't eat lunch", "skip dinner"
    SkipMeal { meal: String },
}

type Extract = fn(&Captures<'_>, &str) -> Option<Intent>;

/// A named rule with a compiled regex.
pub struct Rule {
    pub name: &'static str,
    regex: Regex,
    extract: Extract,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, extract: Extract) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("dispatch rule pattern"),
            extract,
        }
    }

    fn apply(&self, text: &str) -> Option<Intent> {
        let caps = self.regex.captures(text)?;
        (self.extract)(&caps, text)
    }
}

fn group(caps: &Captures<'_>, i: usize) -> Option<String> {
    caps.get(i).map(|m| m.as_str().to_string())
}

/// The ordered steady-state rules.
pub struct RuleBook {
    rules: Vec<Rule>,
}

impl RuleBook {
    pub fn default_rules() -> Self {
        let rules = vec![
            Rule::new("ask_plan", r"what do i eat for\s+(\w+)", |caps, _| {
                Some(Intent::AskPlan {
                    meal: group(caps, 1)?,
                })
            }),
            Rule::new("ate_meal", r"\bi ate\b(?:\s+(\w+))?", |caps, text| {
                Some(Intent::AteMeal {
                    meal: group(caps, 1),
                    per_plan: text.contains("plan") || text.contains("suggested"),
                })
            }),
            Rule::new(
                "exercise",
                r"\d+(?:\.\d+)?\s*(?:laps|miles|minutes|min)",
                |_, text| parser::find_exercise(text).map(Intent::Exercise),
            ),
            Rule::new("cheat", r"fucked up|bacanator", |_, _| Some(Intent::Cheat)),
            Rule::new(
                "skip_meal",
                r"(?:didn't eat|skip(?:ped)?)\s+(\w+)",
                |caps, _| {
                    Some(Intent::SkipMeal {
                        meal: group(caps, 1)?,
                    })
                },
            ),
        ];
        Self { rules }
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// First matching rule for already-normalized `text`.
    pub fn classify(&self, text: &str) -> Option<(&'static str, Intent)> {
        let hit = self
            .rules
            .iter()
            .find_map(|rule| rule.apply(text).map(|intent| (rule.name, intent)));
        if let Some((name, _)) = &hit {
            debug!(rule = *name, "Dispatch rule matched");
        }
        hit
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ExerciseKind;

    fn classify(text: &str) -> Option<(&'static str, Intent)> {
        RuleBook::default_rules().classify(&parser::normalize(text))
    }

    #[test]
    fn rule_order_is_fixed() {
        assert_eq!(
            RuleBook::default_rules().names(),
            vec!["ask_plan", "ate_meal", "exercise", "cheat", "skip_meal"]
        );
    }

    #[test]
    fn ask_plan_captures_meal() {
        assert_eq!(
            classify("What do I eat for lunch?"),
            Some((
                "ask_plan",
                Intent::AskPlan {
                    meal: "lunch".into()
                }
            ))
        );
    }

    #[test]
    fn ate_meal_with_and_without_plan() {
        assert_eq!(
            classify("I ate lunch"),
            Some((
                "ate_meal",
                Intent::AteMeal {
                    meal: Some("lunch".into()),
                    per_plan: false
                }
            ))
        );
        assert_eq!(
            classify("I ate breakfast like you suggested"),
            Some((
                "ate_meal",
                Intent::AteMeal {
                    meal: Some("breakfast".into()),
                    per_plan: true
                }
            ))
        );
        assert_eq!(
            classify("i ate"),
            Some((
                "ate_meal",
                Intent::AteMeal {
                    meal: None,
                    per_plan: false
                }
            ))
        );
    }

    #[test]
    fn ate_meal_wins_over_exercise() {
        let (name, _) = classify("I ate dinner after 12 laps").unwrap();
        assert_eq!(name, "ate_meal");
    }

    #[test]
    fn exercise_wins_over_cheat() {
        let (name, intent) = classify("Bacanator then 30 minutes walking").unwrap();
        assert_eq!(name, "exercise");
        match intent {
            Intent::Exercise(e) => {
                assert_eq!(e.kind, ExerciseKind::Walking);
                assert_eq!(e.amount, 30.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn laps_are_exercise() {
        let (_, intent) = classify("swam 12 laps").unwrap();
        assert!(matches!(
            intent,
            Intent::Exercise(ExerciseEntry {
                kind: ExerciseKind::Laps,
                ..
            })
        ));
    }

    #[test]
    fn mins_is_exercise() {
        let (name, intent) = classify("walked 30 mins after dinner").unwrap();
        assert_eq!(name, "exercise");
        assert!(matches!(
            intent,
            Intent::Exercise(ExerciseEntry {
                kind: ExerciseKind::Walking,
                ..
            })
        ));
    }

    #[test]
    fn cheat_phrases() {
        assert_eq!(classify("I fucked up today").unwrap().1, Intent::Cheat);
        assert_eq!(classify("had a Bacanator").unwrap().1, Intent::Cheat);
    }

    #[test]
    fn skip_accepts_curly_apostrophe() {
        assert_eq!(
            classify("I didn\u{2019}t eat dinner"),
            Some((
                "skip_meal",
                Intent::SkipMeal {
                    meal: "dinner".into()
                }
            ))
        );
        assert_eq!(classify("skipped snack").unwrap().0, "skip_meal");
    }

    #[test]
    fn unmatched_text_falls_through() {
        assert_eq!(classify("how am I doing?"), None);
    }
}
