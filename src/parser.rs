//! Utterance parser: pure functions turning raw text into typed field values.
//!
//! Each parser either yields a value or a [`ParseError`] that tells the
//! caller to ask the same question again. Nothing here touches state.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::session::{ExerciseKind, MealName, SetupField};

/// Minutes of swimming per lap (8 minutes per 12 laps).
pub const MINUTES_PER_LAP: f64 = 8.0 / 12.0;

/// Calories burned per 12 laps.
pub const CALORIES_PER_12_LAPS: f64 = 923.0;

static QUANTITY_FOOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)g\s+(.+)$").expect("quantity pattern"));

static EXERCISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(laps|miles|minutes|min)").expect("exercise pattern")
});

static NO_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(no|none|nope)\b").expect("no pattern"));

static SKIP_REPLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(no|nope|nothing|skip|skipped|didn't|didnt)\b").expect("skip pattern")
});

/// A parsed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Number(f64),
    Date(String),
    Food(FoodEntry),
    Exercise(ExerciseEntry),
    /// "nothing", "skip", "no": answered, but nothing to record.
    NoEntry,
}

/// What kind of answer a prompt field expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Date,
    QuantityFood,
    Exercise,
}

/// Daily-check meal slots and the meal they are recorded under.
pub const MEAL_SLOTS: [(&str, MealName); 5] = [
    ("Breakfast", MealName::Breakfast),
    ("Snack1", MealName::Snack),
    ("Lunch", MealName::Lunch),
    ("Snack2", MealName::Snack),
    ("Dinner", MealName::Dinner),
];

/// The meal a daily-check slot name refers to.
pub fn meal_slot(field: &str) -> Option<MealName> {
    MEAL_SLOTS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, meal)| *meal)
}

/// Map a gateway field name to the answer shape it expects.
pub fn field_kind(field: &str) -> Option<FieldKind> {
    if let Some(setup) = SetupField::from_name(field) {
        return Some(if setup.is_numeric() {
            FieldKind::Number
        } else {
            FieldKind::Date
        });
    }
    if field == "YesterdayExercise" {
        return Some(FieldKind::Exercise);
    }
    meal_slot(field).map(|_| FieldKind::QuantityFood)
}

/// Parse `text` as the given kind.
pub fn parse(kind: FieldKind, text: &str) -> Result<Parsed, ParseError> {
    match kind {
        FieldKind::Number => parse_number(text).map(Parsed::Number),
        FieldKind::Date => parse_date(text).map(Parsed::Date),
        FieldKind::QuantityFood => parse_meal_entry(text),
        FieldKind::Exercise => parse_exercise_report(text),
    }
}

/// First whitespace-delimited token as a float.
pub fn parse_number(text: &str) -> Result<f64, ParseError> {
    text.split_whitespace()
        .next()
        .and_then(|tok| tok.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .ok_or_else(|| ParseError::NotANumber {
            input: text.trim().to_string(),
        })
}

/// Trimmed text verbatim. Calendar validation is left to storage.
pub fn parse_date(text: &str) -> Result<String, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyDate);
    }
    Ok(trimmed.to_string())
}

/// Grams of a named food.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoodEntry {
    pub quantity_grams: i64,
    pub food: String,
}

impl FoodEntry {
    /// Calories given the food's calories per 100 g.
    pub fn calories(&self, per_100g: f64) -> f64 {
        self.quantity_grams as f64 / 100.0 * per_100g
    }
}

/// Match `<integer>g <food>`.
pub fn parse_food(text: &str) -> Option<FoodEntry> {
    let caps = QUANTITY_FOOD.captures(text.trim())?;
    let quantity_grams = caps.get(1)?.as_str().parse().ok()?;
    let food = caps.get(2)?.as_str().trim().to_string();
    if food.is_empty() {
        return None;
    }
    Some(FoodEntry {
        quantity_grams,
        food,
    })
}

/// A meal-slot answer: a quantity/food pair, or "nothing"/"skip".
pub fn parse_meal_entry(text: &str) -> Result<Parsed, ParseError> {
    let lower = normalize(text);
    if lower.contains("nothing") || lower.contains("skip") {
        return Ok(Parsed::NoEntry);
    }
    parse_food(text)
        .map(Parsed::Food)
        .ok_or_else(|| ParseError::NoQuantityFood {
            input: text.trim().to_string(),
        })
}

/// A reported exercise: laps or a walking duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseEntry {
    /// The number the user gave (laps, miles or minutes).
    pub amount: f64,
    pub kind: ExerciseKind,
}

impl ExerciseEntry {
    /// Duration recorded in minutes. Laps convert at 8 minutes per 12 laps.
    pub fn duration_minutes(&self) -> f64 {
        match self.kind {
            ExerciseKind::Laps => self.amount * MINUTES_PER_LAP,
            ExerciseKind::Walking => self.amount,
        }
    }

    /// Calories burned, known only for laps.
    pub fn calories_burned(&self) -> Option<i64> {
        match self.kind {
            ExerciseKind::Laps => Some((self.amount * CALORIES_PER_12_LAPS / 12.0).floor() as i64),
            ExerciseKind::Walking => None,
        }
    }

    /// Laps counted towards the progress log (zero for walking).
    pub fn laps(&self) -> f64 {
        match self.kind {
            ExerciseKind::Laps => self.amount,
            ExerciseKind::Walking => 0.0,
        }
    }
}

/// Find an exercise mention anywhere in `text`.
pub fn find_exercise(text: &str) -> Option<ExerciseEntry> {
    let caps = EXERCISE.captures(text)?;
    let amount = caps.get(1)?.as_str().parse().ok()?;
    let kind = if normalize(text).contains("laps") {
        ExerciseKind::Laps
    } else {
        ExerciseKind::Walking
    };
    Some(ExerciseEntry { amount, kind })
}

/// Answer to "did you exercise yesterday": an entry, or "no".
pub fn parse_exercise_report(text: &str) -> Result<Parsed, ParseError> {
    if let Some(entry) = find_exercise(text) {
        return Ok(Parsed::Exercise(entry));
    }
    if NO_WORD.is_match(&normalize(text)) {
        return Ok(Parsed::NoEntry);
    }
    Err(ParseError::NoExercise {
        input: text.trim().to_string(),
    })
}

/// Whether a meal-detail reply says the meal was skipped.
pub fn is_skip_reply(text: &str) -> bool {
    SKIP_REPLY.is_match(&normalize(text))
}

/// Lowercase with typographic apostrophes folded to ASCII.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_takes_first_token() {
        assert_eq!(parse_number("180"), Ok(180.0));
        assert_eq!(parse_number("  182.5 lbs"), Ok(182.5));
        assert!(matches!(parse_number("abc"), Err(ParseError::NotANumber { .. })));
        assert!(parse_number("").is_err());
        assert!(parse_number("lbs 180").is_err());
    }

    #[test]
    fn date_is_verbatim() {
        assert_eq!(parse_date("  2027-01-01 "), Ok("2027-01-01".to_string()));
        assert_eq!(parse_date("next spring"), Ok("next spring".to_string()));
        assert_eq!(parse_date("   "), Err(ParseError::EmptyDate));
    }

    #[test]
    fn quantity_food_pairs() {
        assert_eq!(
            parse_food("50g Ribeye"),
            Some(FoodEntry {
                quantity_grams: 50,
                food: "Ribeye".into()
            })
        );
        assert_eq!(parse_food("100G ground beef").unwrap().food, "ground beef");
        assert!(parse_food("Ribeye 50g").is_none());
        assert!(parse_food("50 g Ribeye").is_none());
    }

    #[test]
    fn meal_entry_exception_words() {
        assert_eq!(parse_meal_entry("nothing"), Ok(Parsed::NoEntry));
        assert_eq!(parse_meal_entry("skip"), Ok(Parsed::NoEntry));
        assert_eq!(parse_meal_entry("I'll SKIP it"), Ok(Parsed::NoEntry));
        assert!(matches!(
            parse_meal_entry("50g Ribeye"),
            Ok(Parsed::Food(FoodEntry { quantity_grams: 50, .. }))
        ));
        assert!(matches!(
            parse_meal_entry("a steak"),
            Err(ParseError::NoQuantityFood { .. })
        ));
    }

    #[test]
    fn twelve_laps() {
        let entry = find_exercise("did 12 laps this morning").unwrap();
        assert_eq!(entry.kind, ExerciseKind::Laps);
        assert_eq!(entry.amount, 12.0);
        assert!((entry.duration_minutes() - 8.0).abs() < 1e-9);
        assert_eq!(entry.calories_burned(), Some(923));
        assert_eq!(entry.laps(), 12.0);
    }

    #[test]
    fn fractional_laps_round_calories_down() {
        let entry = find_exercise("5 laps").unwrap();
        // 5 * 923 / 12 = 384.58
        assert_eq!(entry.calories_burned(), Some(384));
    }

    #[test]
    fn walking_units() {
        let entry = find_exercise("walked 2.5 miles").unwrap();
        assert_eq!(entry.kind, ExerciseKind::Walking);
        assert_eq!(entry.amount, 2.5);
        assert_eq!(entry.duration_minutes(), 2.5);
        assert_eq!(entry.calories_burned(), None);

        let entry = find_exercise("30 minutes on the treadmill").unwrap();
        assert_eq!(entry.amount, 30.0);
        assert_eq!(entry.laps(), 0.0);
        assert!(find_exercise("30min").is_some());
        assert!(find_exercise("went for a walk").is_none());
    }

    #[test]
    fn plural_mins_is_walking() {
        let entry = find_exercise("walked 30 mins").unwrap();
        assert_eq!(entry.kind, ExerciseKind::Walking);
        assert_eq!(entry.amount, 30.0);
        assert_eq!(entry.calories_burned(), None);
        assert!(matches!(
            parse_exercise_report("45mins on the bike"),
            Ok(Parsed::Exercise(ExerciseEntry { amount, .. })) if amount == 45.0
        ));
    }

    #[test]
    fn exercise_report_no() {
        assert_eq!(parse_exercise_report("no"), Ok(Parsed::NoEntry));
        assert_eq!(parse_exercise_report("Nope, rest day"), Ok(Parsed::NoEntry));
        assert!(matches!(
            parse_exercise_report("12 laps, nothing else"),
            Ok(Parsed::Exercise(_))
        ));
        assert!(matches!(
            parse_exercise_report("a little"),
            Err(ParseError::NoExercise { .. })
        ));
    }

    #[test]
    fn skip_replies() {
        assert!(is_skip_reply("no"));
        assert!(is_skip_reply("I didn\u{2019}t eat"));
        assert!(is_skip_reply("skipped it"));
        assert!(!is_skip_reply("100g canola fried chicken"));
        assert!(!is_skip_reply("100g bacon"));
    }

    #[test]
    fn field_kinds() {
        assert_eq!(field_kind("StartWeight"), Some(FieldKind::Number));
        assert_eq!(field_kind("TargetDate"), Some(FieldKind::Date));
        assert_eq!(field_kind("YesterdayExercise"), Some(FieldKind::Exercise));
        assert_eq!(field_kind("Snack2"), Some(FieldKind::QuantityFood));
        assert_eq!(field_kind("Mood"), None);
        assert_eq!(meal_slot("Snack1"), Some(MealName::Snack));
        assert_eq!(meal_slot("Dinner"), Some(MealName::Dinner));
    }

    #[test]
    fn parse_dispatches_on_kind() {
        assert_eq!(parse(FieldKind::Number, "200"), Ok(Parsed::Number(200.0)));
        assert_eq!(
            parse(FieldKind::Date, "2027-03-01"),
            Ok(Parsed::Date("2027-03-01".into()))
        );
        assert_eq!(parse(FieldKind::QuantityFood, "nothing"), Ok(Parsed::NoEntry));
        assert!(parse(FieldKind::Exercise, "lots").is_err());
    }
}
