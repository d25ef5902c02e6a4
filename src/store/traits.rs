//! `FitnessStore` trait: the persistence gateway the workflow talks to.
//!
//! Every method is one transaction: it either commits fully or returns a
//! `DatabaseError` with nothing written.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::DatabaseError;
use crate::session::{ActivityLevel, ExerciseKind, Prompt, SetupSubmission};

/// Result of completing day-1 setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOutcome {
    /// True when no foods were active and the defaults were switched on.
    pub seeded_default_foods: bool,
}

/// An exercise row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseLogged {
    pub date: NaiveDate,
    pub calories_burned: i64,
}

/// A meal to record.
#[derive(Debug, Clone, PartialEq)]
pub struct MealRecord {
    pub date: NaiveDate,
    pub food_name: String,
    pub quantity_grams: i64,
    pub total_calories: f64,
    /// Stored label: Breakfast, Snack, Lunch or Dinner.
    pub meal_name: String,
}

/// Outcome of recording a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealLogged {
    /// The food was not on the active list and a deviation was written.
    pub deviation: bool,
}

/// Calorie totals for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyTotals {
    pub burned: i64,
    pub intake: f64,
}

/// One row of a generated plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub meal_name: String,
    pub food_name: String,
    pub quantity_grams: i64,
    pub calories: i64,
}

/// What plan generation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedPlan {
    Fasting { note: String },
    Meals { allowance: i64, entries: Vec<PlanEntry> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSummary {
    pub date: NaiveDate,
    pub kind: ExerciseKind,
    pub duration_minutes: f64,
    pub calories_burned: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalSummary {
    pub description: String,
    pub start_weight: f64,
    pub target_weight: f64,
    pub target_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub laps: f64,
    pub calories_burned: i64,
    pub weight: Option<f64>,
}

/// Backend-agnostic persistence gateway.
#[async_trait]
pub trait FitnessStore: Send + Sync {
    // ── Prompts ─────────────────────────────────────────────────────

    /// Day-1 setup questions; empty once setup is complete.
    async fn fetch_setup_prompts(&self) -> Result<Vec<Prompt>, DatabaseError>;

    /// Check-in questions still outstanding for `today`.
    async fn fetch_daily_prompts(&self, today: NaiveDate) -> Result<Vec<Prompt>, DatabaseError>;

    // ── Setup ───────────────────────────────────────────────────────

    /// Persist the goal and body measurements; activate default foods when
    /// none are active.
    async fn complete_setup(
        &self,
        setup: &SetupSubmission,
        today: NaiveDate,
    ) -> Result<SetupOutcome, DatabaseError>;

    /// The stored profile of a user who already finished setup.
    async fn load_profile(&self) -> Result<Option<SetupSubmission>, DatabaseError>;

    // ── Records ─────────────────────────────────────────────────────

    async fn record_weight(&self, date: NaiveDate, weight: f64) -> Result<(), DatabaseError>;

    /// Store an exercise. Missing calories are estimated from the duration.
    async fn record_exercise(
        &self,
        date: NaiveDate,
        kind: ExerciseKind,
        duration_minutes: f64,
        calories: Option<i64>,
    ) -> Result<ExerciseLogged, DatabaseError>;

    async fn record_progress(
        &self,
        date: NaiveDate,
        laps: f64,
        calories: i64,
        weight: Option<f64>,
    ) -> Result<(), DatabaseError>;

    /// Store a meal, writing a deviation first for foods off the active list.
    async fn record_meal(&self, meal: &MealRecord) -> Result<MealLogged, DatabaseError>;

    /// Calories per 100 g of an active food.
    async fn lookup_food_calories(&self, food_name: &str) -> Result<Option<f64>, DatabaseError>;

    // ── Business rules ──────────────────────────────────────────────

    async fn compute_baseline_calories(
        &self,
        current_weight: f64,
        height_cm: f64,
        age_years: f64,
        activity: ActivityLevel,
    ) -> Result<i64, DatabaseError>;

    async fn compute_daily_deficit(
        &self,
        current_weight: f64,
        yesterday_burn: i64,
        yesterday_intake: f64,
    ) -> Result<i64, DatabaseError>;

    /// Build (and store) the plan for `date` within `target_calories`.
    async fn generate_daily_plan(
        &self,
        date: NaiveDate,
        target_calories: i64,
    ) -> Result<GeneratedPlan, DatabaseError>;

    // ── Reads ───────────────────────────────────────────────────────

    async fn count_exercises_on(&self, date: NaiveDate) -> Result<i64, DatabaseError>;

    /// Distinct canonical meal labels recorded on `date`.
    async fn count_distinct_meals_on(&self, date: NaiveDate) -> Result<i64, DatabaseError>;

    async fn daily_totals(&self, date: NaiveDate) -> Result<DailyTotals, DatabaseError>;

    /// Most recent exercises, newest first.
    async fn recent_exercises(&self, limit: usize) -> Result<Vec<ExerciseSummary>, DatabaseError>;

    async fn active_goal(&self) -> Result<Option<GoalSummary>, DatabaseError>;

    async fn active_foods(&self) -> Result<Vec<String>, DatabaseError>;

    async fn latest_progress(&self) -> Result<Option<ProgressSummary>, DatabaseError>;
}
