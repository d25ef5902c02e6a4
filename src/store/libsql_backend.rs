//! libSQL backend: async `FitnessStore` implementation.
//!
//! Supports local file and in-memory databases. The calorie rules that used
//! to live in stored procedures (baseline, deficit, plan generation) are
//! computed here against the same connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::session::{ActivityLevel, ExerciseKind, Prompt, SetupSubmission};
use crate::store::migrations;
use crate::store::traits::{
    DailyTotals, ExerciseLogged, ExerciseSummary, FitnessStore, GeneratedPlan, GoalSummary,
    MealLogged, MealRecord, PlanEntry, ProgressSummary, SetupOutcome,
};

/// Estimated burn for walking when no figure is given.
pub const WALKING_KCAL_PER_MINUTE: f64 = 4.0;

/// Below this target the plan becomes a fasting day.
pub const FASTING_THRESHOLD: i64 = 800;

/// Share of the daily target per plan slot, in serving order.
const PLAN_SLOTS: [(&str, f64); 5] = [
    ("Breakfast", 0.25),
    ("Snack", 0.10),
    ("Lunch", 0.30),
    ("Snack", 0.10),
    ("Dinner", 0.25),
];

/// Foods switched on when setup finds no active foods and no zero-carb rows.
const DEFAULT_FOODS: [(&str, f64, f64, f64); 3] = [
    ("Beef Ribeye", 291.0, 24.0, 22.0),
    ("Bacon", 541.0, 37.0, 42.0),
    ("Ground Beef (80/20)", 307.0, 17.0, 26.0),
];

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Every
/// operation holds the connection lock from its first statement to its last,
/// so a transaction never runs another caller's statements.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Mutex<Connection>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn: Mutex::new(conn),
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn: Mutex::new(conn),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get a lock on the underlying connection.
    ///
    /// Callers hold the lock for the duration of their DB operation.
    async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await;
        migrations::run_migrations(&conn).await
    }
}

// ── Helper functions ────────────────────────────────────────────────

async fn begin(conn: &Connection) -> Result<libsql::Transaction, DatabaseError> {
    conn.transaction()
        .await
        .map_err(|e| DatabaseError::Query(format!("begin transaction: {e}")))
}

async fn count_exercises(conn: &Connection, date: NaiveDate) -> Result<i64, DatabaseError> {
    query_count(
        conn,
        "count_exercises_on",
        "SELECT COUNT(*) FROM exercise WHERE date = ?1",
        params![date.to_string()],
    )
    .await
}

fn opt_real(v: Option<f64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Real(v),
        None => libsql::Value::Null,
    }
}

fn opt_integer(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Serialization(format!("bad date '{s}': {e}")))
}

fn lbs_to_kg(lbs: f64) -> f64 {
    lbs * 0.453_592_37
}

/// Mifflin-St Jeor resting rate scaled by activity.
pub fn baseline_calories(
    weight_lbs: f64,
    height_cm: f64,
    age_years: f64,
    activity: ActivityLevel,
) -> i64 {
    let bmr = 10.0 * lbs_to_kg(weight_lbs) + 6.25 * height_cm - 5.0 * age_years + 5.0;
    (bmr * activity.multiplier()).round() as i64
}

/// Calories to cut today given yesterday's burn and intake.
///
/// Heavier users get a larger base cut (clamped 300..=750); yesterday's
/// exercise earns some of it back and overeating past 2000 kcal adds to it.
pub fn daily_deficit(weight_lbs: f64, yesterday_burn: i64, yesterday_intake: f64) -> i64 {
    let base = (weight_lbs * 2.5).clamp(300.0, 750.0);
    let earned = yesterday_burn as f64 / 4.0;
    let overshoot = (yesterday_intake - 2000.0).max(0.0) / 4.0;
    (base - earned + overshoot).clamp(0.0, 1000.0).round() as i64
}

/// Shortest text that may match a food by a word prefix instead of its full name.
const MIN_PARTIAL_MATCH: usize = 3;

/// Escape `LIKE` wildcards so user text only matches literally.
fn like_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Active food with its calorie density, matched case-insensitively. An
/// exact name wins; otherwise the text must start the name or one of its
/// words, and be at least `MIN_PARTIAL_MATCH` characters long.
async fn find_active_food(
    conn: &Connection,
    name: &str,
) -> Result<Option<(i64, String, f64)>, DatabaseError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    let partial = name.chars().count() >= MIN_PARTIAL_MATCH;
    let escaped = like_escape(name);
    let mut rows = conn
        .query(
            "SELECT id, name, CAST(calories_per_100g AS REAL) FROM food_items
             WHERE active = 1
               AND (name = ?1
                    OR (?4 AND (name LIKE ?2 ESCAPE '\\' OR name LIKE ?3 ESCAPE '\\')))
             ORDER BY (name = ?1) DESC, length(name) ASC
             LIMIT 1",
            params![
                name,
                format!("{escaped}%"),
                format!("% {escaped}%"),
                partial as i64
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_active_food: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("find_active_food: {e}")))?
    {
        Some(row) => {
            let id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("find_active_food: {e}")))?;
            let food: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("find_active_food: {e}")))?;
            let per_100g: f64 = row
                .get(2)
                .map_err(|e| DatabaseError::Query(format!("find_active_food: {e}")))?;
            Ok(Some((id, food, per_100g)))
        }
        None => Ok(None),
    }
}

async fn query_count(
    conn: &Connection,
    op: &str,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}"))),
        None => Ok(0),
    }
}

async fn load_prompts(conn: &Connection, kind: &str) -> Result<Vec<Prompt>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT label, prompt, field FROM prompt_catalog WHERE kind = ?1 ORDER BY position",
            params![kind],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("load_prompts: {e}")))?;

    let mut prompts = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("load_prompts: {e}")))?
    {
        let label: String = row.get(0).unwrap_or_default();
        let text: String = row.get(1).unwrap_or_default();
        let field: String = row.get(2).unwrap_or_default();
        prompts.push(Prompt::new(label, text, field));
    }
    Ok(prompts)
}

/// Date of the active goal, if setup ever completed.
async fn goal_created_on(conn: &Connection) -> Result<Option<NaiveDate>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT created_on FROM goals WHERE goal_type = 'LongTerm' AND active = 1
             ORDER BY id DESC LIMIT 1",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("goal_created_on: {e}")))?;
    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("goal_created_on: {e}")))?
    {
        Some(row) => {
            let s: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("goal_created_on: {e}")))?;
            Ok(Some(parse_date(&s)?))
        }
        None => Ok(None),
    }
}

// ── FitnessStore implementation ─────────────────────────────────────

#[async_trait]
impl FitnessStore for LibSqlBackend {
    async fn fetch_setup_prompts(&self) -> Result<Vec<Prompt>, DatabaseError> {
        let conn = self.conn().await;
        if goal_created_on(&conn).await?.is_some() {
            return Ok(Vec::new());
        }
        load_prompts(&conn, "setup").await
    }

    async fn fetch_daily_prompts(&self, today: NaiveDate) -> Result<Vec<Prompt>, DatabaseError> {
        let conn = self.conn().await;
        let Some(created) = goal_created_on(&conn).await? else {
            return Ok(Vec::new());
        };
        // Nothing to look back on the day setup ran.
        if created >= today {
            return Ok(Vec::new());
        }

        let yesterday = today - Duration::days(1);
        let today_s = today.to_string();
        let yesterday_s = yesterday.to_string();

        let weighed = query_count(
            &conn,
            "fetch_daily_prompts",
            "SELECT COUNT(*) FROM weight_log WHERE date = ?1",
            params![today_s],
        )
        .await?;
        let exercised = count_exercises(&conn, yesterday).await?;

        let mut meal_counts = std::collections::HashMap::new();
        for meal in ["Breakfast", "Snack", "Lunch", "Dinner"] {
            let n = query_count(
                &conn,
                "fetch_daily_prompts",
                "SELECT COUNT(*) FROM actual_meals WHERE date = ?1 AND meal_name = ?2",
                params![yesterday_s.clone(), meal],
            )
            .await?;
            meal_counts.insert(meal, n);
        }

        let catalog = load_prompts(&conn, "daily").await?;
        let wanted = |field: &str| -> bool {
            match field {
                "CurrentWeight" => weighed == 0,
                "YesterdayExercise" => exercised == 0,
                "Snack1" => meal_counts.get("Snack").copied().unwrap_or(0) < 1,
                "Snack2" => meal_counts.get("Snack").copied().unwrap_or(0) < 2,
                other => meal_counts.get(other).copied().unwrap_or(0) == 0,
            }
        };
        let prompts: Vec<Prompt> = catalog.into_iter().filter(|p| wanted(&p.field)).collect();
        debug!(count = prompts.len(), %today, "Daily prompts outstanding");
        Ok(prompts)
    }

    async fn complete_setup(
        &self,
        setup: &SetupSubmission,
        today: NaiveDate,
    ) -> Result<SetupOutcome, DatabaseError> {
        let conn = self.conn().await;
        let tx = begin(&conn).await?;
        let today_s = today.to_string();

        tx.execute(
            "UPDATE goals SET active = 0 WHERE goal_type = 'LongTerm' AND active = 1",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("complete_setup: {e}")))?;

        let description = format!(
            "Go from {} lbs to {} lbs by {}",
            setup.start_weight, setup.target_weight, setup.target_date
        );
        tx.execute(
            "INSERT INTO goals (goal_type, description, start_weight, target_weight, target_date,
                                height_cm, age_years, created_on, active)
             VALUES ('LongTerm', ?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                description,
                setup.start_weight,
                setup.target_weight,
                setup.target_date.clone(),
                setup.height_cm,
                setup.age_years,
                today_s.clone(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("complete_setup: {e}")))?;

        tx.execute(
            "INSERT INTO weight_log (date, recorded_weight) VALUES (?1, ?2)",
            params![today_s, setup.current_weight],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("complete_setup: {e}")))?;

        let active = query_count(
            &tx,
            "complete_setup",
            "SELECT COUNT(*) FROM food_items WHERE active = 1",
            (),
        )
        .await?;

        let mut seeded = false;
        if active == 0 {
            let switched = tx
                .execute(
                    "UPDATE food_items SET active = 1 WHERE carbohydrates = 0",
                    (),
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("complete_setup: {e}")))?;
            if switched == 0 {
                for (name, calories, protein, fat) in DEFAULT_FOODS {
                    tx.execute(
                        "INSERT INTO food_items (name, calories_per_100g, protein, carbohydrates, fat, active)
                         VALUES (?1, ?2, ?3, 0, ?4, 1)
                         ON CONFLICT(name) DO UPDATE SET active = 1",
                        params![name, calories, protein, fat],
                    )
                    .await
                    .map_err(|e| DatabaseError::Query(format!("complete_setup: {e}")))?;
                }
            }
            seeded = true;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_setup commit: {e}")))?;

        info!(seeded_default_foods = seeded, "Setup completed");
        Ok(SetupOutcome {
            seeded_default_foods: seeded,
        })
    }

    async fn load_profile(&self) -> Result<Option<SetupSubmission>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT g.start_weight, g.target_weight, g.target_date, g.height_cm, g.age_years,
                        (SELECT recorded_weight FROM weight_log ORDER BY date DESC, id DESC LIMIT 1)
                 FROM goals g
                 WHERE g.goal_type = 'LongTerm' AND g.active = 1
                 ORDER BY g.id DESC LIMIT 1",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?
        else {
            return Ok(None);
        };

        let start_weight: f64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?;
        let latest: Option<f64> = row.get::<f64>(5).ok();
        Ok(Some(SetupSubmission {
            start_weight,
            target_weight: row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?,
            target_date: row
                .get(2)
                .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?,
            current_weight: latest.unwrap_or(start_weight),
            height_cm: row
                .get(3)
                .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?,
            age_years: row
                .get(4)
                .map_err(|e| DatabaseError::Query(format!("load_profile: {e}")))?,
        }))
    }

    async fn record_weight(&self, date: NaiveDate, weight: f64) -> Result<(), DatabaseError> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO weight_log (date, recorded_weight) VALUES (?1, ?2)",
            params![date.to_string(), weight],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_weight: {e}")))?;
        debug!(%date, weight, "Weight recorded");
        Ok(())
    }

    async fn record_exercise(
        &self,
        date: NaiveDate,
        kind: ExerciseKind,
        duration_minutes: f64,
        calories: Option<i64>,
    ) -> Result<ExerciseLogged, DatabaseError> {
        let burned =
            calories.unwrap_or_else(|| (duration_minutes * WALKING_KCAL_PER_MINUTE).round() as i64);
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO exercise (date, exercise_type, duration_minutes, calorie_burn)
             VALUES (?1, ?2, ?3, ?4)",
            params![date.to_string(), kind.as_str(), duration_minutes, burned],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_exercise: {e}")))?;
        debug!(%date, kind = kind.as_str(), duration_minutes, burned, "Exercise recorded");
        Ok(ExerciseLogged {
            date,
            calories_burned: burned,
        })
    }

    async fn record_progress(
        &self,
        date: NaiveDate,
        laps: f64,
        calories: i64,
        weight: Option<f64>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO progress_log (log_date, laps, calories_burned, weight)
             VALUES (?1, ?2, ?3, ?4)",
            params![date.to_string(), laps, calories, opt_real(weight)],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_progress: {e}")))?;
        Ok(())
    }

    async fn record_meal(&self, meal: &MealRecord) -> Result<MealLogged, DatabaseError> {
        let conn = self.conn().await;
        let tx = begin(&conn).await?;
        let date = meal.date.to_string();

        let food = find_active_food(&tx, &meal.food_name).await?;
        let deviation = food.is_none();
        if deviation {
            tx.execute(
                "INSERT INTO deviations (date, reason) VALUES (?1, ?2)",
                params![
                    date.clone(),
                    format!("Ate off-plan {} for {}", meal.food_name, meal.meal_name)
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_meal: {e}")))?;
        }

        tx.execute(
            "INSERT INTO actual_meals (date, food_id, description, quantity, total_calories, meal_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                date,
                opt_integer(food.map(|(id, _, _)| id)),
                meal.food_name.clone(),
                meal.quantity_grams as f64,
                meal.total_calories,
                meal.meal_name.clone(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_meal: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("record_meal commit: {e}")))?;

        debug!(
            meal = %meal.meal_name,
            food = %meal.food_name,
            deviation,
            "Meal recorded"
        );
        Ok(MealLogged { deviation })
    }

    async fn lookup_food_calories(&self, food_name: &str) -> Result<Option<f64>, DatabaseError> {
        let conn = self.conn().await;
        Ok(find_active_food(&conn, food_name)
            .await?
            .map(|(_, _, per_100g)| per_100g))
    }

    async fn compute_baseline_calories(
        &self,
        current_weight: f64,
        height_cm: f64,
        age_years: f64,
        activity: ActivityLevel,
    ) -> Result<i64, DatabaseError> {
        Ok(baseline_calories(
            current_weight,
            height_cm,
            age_years,
            activity,
        ))
    }

    async fn compute_daily_deficit(
        &self,
        current_weight: f64,
        yesterday_burn: i64,
        yesterday_intake: f64,
    ) -> Result<i64, DatabaseError> {
        Ok(daily_deficit(
            current_weight,
            yesterday_burn,
            yesterday_intake,
        ))
    }

    async fn generate_daily_plan(
        &self,
        date: NaiveDate,
        target_calories: i64,
    ) -> Result<GeneratedPlan, DatabaseError> {
        if target_calories < FASTING_THRESHOLD {
            info!(%date, target_calories, "Fasting day");
            return Ok(GeneratedPlan::Fasting {
                note: format!(
                    "Today's a fasting day: a {target_calories} cal target is too low to split into meals. Water, black coffee, electrolytes."
                ),
            });
        }

        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT name, CAST(calories_per_100g AS REAL) FROM food_items
                 WHERE active = 1 AND calories_per_100g > 0 ORDER BY id",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("generate_daily_plan: {e}")))?;
        let mut foods: Vec<(String, f64)> = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("generate_daily_plan: {e}")))?
        {
            let name: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("generate_daily_plan: {e}")))?;
            let per_100g: f64 = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("generate_daily_plan: {e}")))?;
            foods.push((name, per_100g));
        }

        if foods.is_empty() {
            return Ok(GeneratedPlan::Meals {
                allowance: target_calories,
                entries: Vec::new(),
            });
        }

        let entries: Vec<PlanEntry> = PLAN_SLOTS
            .iter()
            .enumerate()
            .map(|(i, (meal, share))| {
                let (food, per_100g) = &foods[i % foods.len()];
                let calories = (target_calories as f64 * share).round() as i64;
                PlanEntry {
                    meal_name: (*meal).to_string(),
                    food_name: food.clone(),
                    quantity_grams: (calories as f64 * 100.0 / per_100g).round() as i64,
                    calories,
                }
            })
            .collect();

        let tx = begin(&conn).await?;
        let date_s = date.to_string();
        tx.execute(
            "DELETE FROM planned_meals WHERE date = ?1",
            params![date_s.clone()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("generate_daily_plan: {e}")))?;
        for (position, entry) in entries.iter().enumerate() {
            tx.execute(
                "INSERT INTO planned_meals (date, position, meal_name, food_name, quantity_grams, calories)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    date_s.clone(),
                    position as i64,
                    entry.meal_name.clone(),
                    entry.food_name.clone(),
                    entry.quantity_grams,
                    entry.calories,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("generate_daily_plan: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("generate_daily_plan commit: {e}")))?;

        info!(%date, target_calories, meals = entries.len(), "Daily plan generated");
        Ok(GeneratedPlan::Meals {
            allowance: target_calories,
            entries,
        })
    }

    async fn count_exercises_on(&self, date: NaiveDate) -> Result<i64, DatabaseError> {
        let conn = self.conn().await;
        count_exercises(&conn, date).await
    }

    async fn count_distinct_meals_on(&self, date: NaiveDate) -> Result<i64, DatabaseError> {
        let conn = self.conn().await;
        query_count(
            &conn,
            "count_distinct_meals_on",
            "SELECT COUNT(DISTINCT meal_name) FROM actual_meals
             WHERE date = ?1 AND meal_name IN ('Breakfast', 'Lunch', 'Dinner', 'Snack')",
            params![date.to_string()],
        )
        .await
    }

    async fn daily_totals(&self, date: NaiveDate) -> Result<DailyTotals, DatabaseError> {
        let date = date.to_string();
        let conn = self.conn().await;
        let burned = query_count(
            &conn,
            "daily_totals",
            "SELECT CAST(COALESCE(SUM(calorie_burn), 0) AS INTEGER) FROM exercise WHERE date = ?1",
            params![date.clone()],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT TOTAL(total_calories) FROM actual_meals WHERE date = ?1",
                params![date],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("daily_totals: {e}")))?;
        let intake = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("daily_totals: {e}")))?
        {
            Some(row) => row.get::<f64>(0).unwrap_or(0.0),
            None => 0.0,
        };
        Ok(DailyTotals { burned, intake })
    }

    async fn recent_exercises(&self, limit: usize) -> Result<Vec<ExerciseSummary>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT date, exercise_type, CAST(duration_minutes AS REAL), calorie_burn
                 FROM exercise ORDER BY date DESC, id DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_exercises: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_exercises: {e}")))?
        {
            let date: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("recent_exercises: {e}")))?;
            let kind: String = row.get(1).unwrap_or_default();
            out.push(ExerciseSummary {
                date: parse_date(&date)?,
                kind: ExerciseKind::from_name(&kind),
                duration_minutes: row.get(2).unwrap_or(0.0),
                calories_burned: row.get(3).unwrap_or(0),
            });
        }
        Ok(out)
    }

    async fn active_goal(&self) -> Result<Option<GoalSummary>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT description, start_weight, target_weight, target_date FROM goals
                 WHERE goal_type = 'LongTerm' AND active = 1 ORDER BY id DESC LIMIT 1",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("active_goal: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("active_goal: {e}")))?
        {
            Some(row) => Ok(Some(GoalSummary {
                description: row.get(0).unwrap_or_default(),
                start_weight: row.get(1).unwrap_or(0.0),
                target_weight: row.get(2).unwrap_or(0.0),
                target_date: row.get(3).unwrap_or_default(),
            })),
            None => Ok(None),
        }
    }

    async fn active_foods(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT name FROM food_items WHERE active = 1 ORDER BY id",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("active_foods: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("active_foods: {e}")))?
        {
            out.push(
                row.get::<String>(0)
                    .map_err(|e| DatabaseError::Query(format!("active_foods: {e}")))?,
            );
        }
        Ok(out)
    }

    async fn latest_progress(&self) -> Result<Option<ProgressSummary>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                "SELECT CAST(laps AS REAL), calories_burned, weight FROM progress_log
                 ORDER BY logged_at DESC, id DESC LIMIT 1",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_progress: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_progress: {e}")))?
        {
            Some(row) => Ok(Some(ProgressSummary {
                laps: row.get(0).unwrap_or(0.0),
                calories_burned: row.get(1).unwrap_or(0),
                weight: row.get::<f64>(2).ok(),
            })),
            None => Ok(None),
        }
    }
}
