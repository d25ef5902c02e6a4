//! Session data models: setup fields, prompts, meal names, plans, transcript.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One of the onboarding fields collected on day 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SetupField {
    StartWeight,
    TargetWeight,
    TargetDate,
    CurrentWeight,
    HeightCm,
    AgeYears,
}

impl SetupField {
    /// Every field `complete_setup` needs, in prompt order.
    pub const REQUIRED: [SetupField; 6] = [
        SetupField::StartWeight,
        SetupField::TargetWeight,
        SetupField::TargetDate,
        SetupField::CurrentWeight,
        SetupField::HeightCm,
        SetupField::AgeYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartWeight => "StartWeight",
            Self::TargetWeight => "TargetWeight",
            Self::TargetDate => "TargetDate",
            Self::CurrentWeight => "CurrentWeight",
            Self::HeightCm => "HeightCm",
            Self::AgeYears => "AgeYears",
        }
    }

    /// Resolve a gateway field name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::REQUIRED.into_iter().find(|f| f.as_str() == name)
    }

    /// Whether the field holds a number (everything except the target date).
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::TargetDate)
    }

    /// Question used when the gateway never prompted for this field.
    pub fn fallback_prompt(&self) -> &'static str {
        match self {
            Self::StartWeight => "What's your starting weight in lbs?",
            Self::TargetWeight => "What weight are you aiming for, in lbs?",
            Self::TargetDate => "When do you want to hit that target? (YYYY-MM-DD)",
            Self::CurrentWeight => "What do you weigh today, in lbs?",
            Self::HeightCm => "How tall are you, in cm?",
            Self::AgeYears => "How old are you?",
        }
    }
}

impl std::fmt::Display for SetupField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity level fed into the baseline calorie calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivityLevel {
    Sedentary,
    #[default]
    SomewhatActive,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// Multiplier applied to the resting metabolic rate.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::SomewhatActive => 1.375,
            Self::Active => 1.55,
            Self::VeryActive => 1.725,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sedentary => "Sedentary",
            Self::SomewhatActive => "SomewhatActive",
            Self::Active => "Active",
            Self::VeryActive => "VeryActive",
        }
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "sedentary" => Ok(Self::Sedentary),
            "somewhatactive" => Ok(Self::SomewhatActive),
            "active" => Ok(Self::Active),
            "veryactive" => Ok(Self::VeryActive),
            other => Err(format!("unknown activity level '{other}'")),
        }
    }
}

/// A stored setup value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// The six onboarding fields, all present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupSubmission {
    pub start_weight: f64,
    pub target_weight: f64,
    pub target_date: String,
    pub current_weight: f64,
    pub height_cm: f64,
    pub age_years: f64,
}

/// Setup data accumulated across onboarding turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupData {
    values: BTreeMap<SetupField, FieldValue>,
    pub activity_level: ActivityLevel,
}

impl SetupData {
    pub fn with_activity_level(activity_level: ActivityLevel) -> Self {
        Self {
            values: BTreeMap::new(),
            activity_level,
        }
    }

    pub fn set_number(&mut self, field: SetupField, value: f64) {
        self.values.insert(field, FieldValue::Number(value));
    }

    pub fn set_text(&mut self, field: SetupField, value: impl Into<String>) {
        self.values.insert(field, FieldValue::Text(value.into()));
    }

    pub fn get(&self, field: SetupField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn number(&self, field: SetupField) -> Option<f64> {
        match self.values.get(&field) {
            Some(FieldValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn contains(&self, field: SetupField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Required fields not yet collected, in prompt order.
    pub fn missing_required(&self) -> Vec<SetupField> {
        SetupField::REQUIRED
            .into_iter()
            .filter(|f| !self.values.contains_key(f))
            .collect()
    }

    /// All six fields, or the ones still missing.
    pub fn submission(&self) -> Result<SetupSubmission, Vec<SetupField>> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(missing);
        }
        let num = |f| self.number(f).unwrap_or_default();
        let target_date = match self.values.get(&SetupField::TargetDate) {
            Some(v) => v.to_string(),
            None => String::new(),
        };
        Ok(SetupSubmission {
            start_weight: num(SetupField::StartWeight),
            target_weight: num(SetupField::TargetWeight),
            target_date,
            current_weight: num(SetupField::CurrentWeight),
            height_cm: num(SetupField::HeightCm),
            age_years: num(SetupField::AgeYears),
        })
    }

    /// Refill the data from a stored profile.
    pub fn hydrate(&mut self, profile: &SetupSubmission) {
        self.set_number(SetupField::StartWeight, profile.start_weight);
        self.set_number(SetupField::TargetWeight, profile.target_weight);
        self.set_text(SetupField::TargetDate, profile.target_date.clone());
        self.set_number(SetupField::CurrentWeight, profile.current_weight);
        self.set_number(SetupField::HeightCm, profile.height_cm);
        self.set_number(SetupField::AgeYears, profile.age_years);
    }
}

impl std::fmt::Display for SetupData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActivityLevel: {}", self.activity_level)?;
        for (field, value) in &self.values {
            write!(f, ", {field}: {value}")?;
        }
        Ok(())
    }
}

/// A question supplied by the gateway: (label, prompt text, field name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub label: String,
    pub text: String,
    pub field: String,
}

impl Prompt {
    pub fn new(label: impl Into<String>, text: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            field: field.into(),
        }
    }
}

/// The four canonical meal labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealName {
    Breakfast,
    Snack,
    Lunch,
    Dinner,
}

impl MealName {
    /// Case-insensitive lookup of a canonical meal name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Some(Self::Breakfast),
            "snack" => Some(Self::Snack),
            "lunch" => Some(Self::Lunch),
            "dinner" => Some(Self::Dinner),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Snack => "snack",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }

    /// Label used in stored meal records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Snack => "Snack",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
        }
    }

    /// How many of this meal the day's schedule expects (two snacks).
    pub fn daily_slots(&self) -> usize {
        match self {
            Self::Snack => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for MealName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Walking covers every non-lap duration (miles and minutes alike).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseKind {
    Laps,
    Walking,
}

impl ExerciseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Laps => "Laps",
            Self::Walking => "Walking",
        }
    }

    pub fn from_name(s: &str) -> Self {
        if s.eq_ignore_ascii_case("laps") {
            Self::Laps
        } else {
            Self::Walking
        }
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One meal of a generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMeal {
    pub index: usize,
    pub meal_name: String,
    pub food_name: String,
    pub quantity_grams: i64,
    pub calories: i64,
}

/// Today's plan, kept until the next plan generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub text: String,
    pub meals: Vec<PlanMeal>,
    pub fasting: bool,
}

impl DailyPlan {
    /// A fasting day carries a single "no food" pseudo-meal.
    pub fn fasting(date: NaiveDate, text: impl Into<String>) -> Self {
        Self {
            date,
            text: text.into(),
            meals: vec![PlanMeal {
                index: 0,
                meal_name: "Fasting".to_string(),
                food_name: "No food".to_string(),
                quantity_grams: 0,
                calories: 0,
            }],
            fasting: true,
        }
    }

    /// The `nth` plan entry whose label matches `meal` (case-insensitive).
    /// "snack" matches any label starting with "snack".
    pub fn entry_for(&self, meal: &str, nth: usize) -> Option<&PlanMeal> {
        let wanted = meal.trim().to_ascii_lowercase();
        self.meals
            .iter()
            .filter(|m| {
                let label = m.meal_name.to_ascii_lowercase();
                label == wanted || (wanted == "snack" && label.starts_with("snack"))
            })
            .nth(nth)
    }
}

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_setup() -> SetupData {
        let mut data = SetupData::default();
        data.set_number(SetupField::StartWeight, 220.0);
        data.set_number(SetupField::TargetWeight, 180.0);
        data.set_text(SetupField::TargetDate, "2027-06-01");
        data.set_number(SetupField::CurrentWeight, 220.0);
        data.set_number(SetupField::HeightCm, 180.0);
        data.set_number(SetupField::AgeYears, 40.0);
        data
    }

    #[test]
    fn submission_requires_all_six_fields() {
        let complete = full_setup();
        let sub = complete.submission().unwrap();
        assert_eq!(sub.target_date, "2027-06-01");
        assert_eq!(sub.height_cm, 180.0);

        for field in SetupField::REQUIRED {
            let mut partial = SetupData::default();
            for other in SetupField::REQUIRED.into_iter().filter(|f| *f != field) {
                match other {
                    SetupField::TargetDate => partial.set_text(other, "2027-06-01"),
                    _ => partial.set_number(other, 1.0),
                }
            }
            let missing = partial.submission().unwrap_err();
            assert_eq!(missing, vec![field], "only {field} should be missing");
        }
    }

    #[test]
    fn empty_setup_misses_everything_in_order() {
        let data = SetupData::default();
        assert_eq!(data.missing_required(), SetupField::REQUIRED.to_vec());
    }

    #[test]
    fn setup_display_lists_values() {
        let data = full_setup();
        let text = data.to_string();
        assert!(text.starts_with("ActivityLevel: SomewhatActive"));
        assert!(text.contains("StartWeight: 220"));
        assert!(text.contains("TargetDate: 2027-06-01"));
    }

    #[test]
    fn hydrate_round_trips_submission() {
        let sub = full_setup().submission().unwrap();
        let mut data = SetupData::default();
        data.hydrate(&sub);
        assert_eq!(data.submission().unwrap(), sub);
    }

    #[test]
    fn field_names_resolve() {
        assert_eq!(SetupField::from_name("HeightCm"), Some(SetupField::HeightCm));
        assert_eq!(SetupField::from_name("heightcm"), None);
        assert!(!SetupField::TargetDate.is_numeric());
        assert!(SetupField::AgeYears.is_numeric());
    }

    #[test]
    fn activity_level_parses_loosely() {
        assert_eq!("very_active".parse::<ActivityLevel>(), Ok(ActivityLevel::VeryActive));
        assert_eq!("SomewhatActive".parse::<ActivityLevel>(), Ok(ActivityLevel::SomewhatActive));
        assert!("couch".parse::<ActivityLevel>().is_err());
    }

    #[test]
    fn meal_names_are_case_insensitive() {
        assert_eq!(MealName::parse("LUNCH"), Some(MealName::Lunch));
        assert_eq!(MealName::parse(" snack "), Some(MealName::Snack));
        assert_eq!(MealName::parse("brunch"), None);
        assert_eq!(MealName::Snack.daily_slots(), 2);
        assert_eq!(MealName::Dinner.daily_slots(), 1);
    }

    #[test]
    fn plan_lookup_treats_snack_as_wildcard() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let meal = |index, name: &str, food: &str| PlanMeal {
            index,
            meal_name: name.to_string(),
            food_name: food.to_string(),
            quantity_grams: 100,
            calories: 200,
        };
        let plan = DailyPlan {
            date,
            text: String::new(),
            meals: vec![
                meal(0, "Breakfast", "Bacon"),
                meal(1, "Snack 1", "Beef Jerky"),
                meal(2, "Lunch", "Ribeye"),
                meal(3, "Snack 2", "Pork Rinds"),
            ],
            fasting: false,
        };
        assert_eq!(plan.entry_for("LUNCH", 0).unwrap().food_name, "Ribeye");
        assert_eq!(plan.entry_for("snack", 0).unwrap().food_name, "Beef Jerky");
        assert_eq!(plan.entry_for("snack", 1).unwrap().food_name, "Pork Rinds");
        assert!(plan.entry_for("dinner", 0).is_none());
    }

    #[test]
    fn fasting_plan_has_single_entry() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let plan = DailyPlan::fasting(date, "Fast today.");
        assert!(plan.fasting);
        assert_eq!(plan.meals.len(), 1);
        assert_eq!(plan.meals[0].food_name, "No food");
    }
}
