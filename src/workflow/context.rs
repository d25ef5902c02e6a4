//! Context string handed to the composer alongside each prompt.

use crate::error::DatabaseError;
use crate::session::SessionState;
use crate::store::FitnessStore;

const RECENT_WORKOUTS: usize = 5;

/// Snapshot of stored progress plus the session's plan and setup data.
pub async fn build_context(
    store: &dyn FitnessStore,
    session: &SessionState,
) -> Result<String, DatabaseError> {
    let workouts: Vec<String> = store
        .recent_exercises(RECENT_WORKOUTS)
        .await?
        .into_iter()
        .map(|w| {
            format!(
                "{}: {} min, {} cal on {}",
                w.kind, w.duration_minutes, w.calories_burned, w.date
            )
        })
        .collect();
    let workouts = if workouts.is_empty() {
        "None yet".to_string()
    } else {
        workouts.join(", ")
    };

    let goal = match store.active_goal().await? {
        Some(g) => format!(
            "{}, Start: {} lbs, Target: {} lbs by {}",
            g.description, g.start_weight, g.target_weight, g.target_date
        ),
        None => "Not set".to_string(),
    };

    let foods = store.active_foods().await?;
    let foods = if foods.is_empty() {
        "None set".to_string()
    } else {
        foods.join(", ")
    };

    let progress = match store.latest_progress().await? {
        Some(p) => {
            let weight = p
                .weight
                .map(|w| format!("{w} lbs"))
                .unwrap_or_else(|| "not recorded".to_string());
            format!("Laps: {}, Burn: {} cal, Weight: {}", p.laps, p.calories_burned, weight)
        }
        None => "No progress logged".to_string(),
    };

    let plan = match &session.daily_plan {
        Some(plan) => format!("Today's Plan: {}", plan.text),
        None => "No plan yet".to_string(),
    };

    let logged = if session.meals_logged_today.is_empty() {
        "None".to_string()
    } else {
        session
            .meals_logged_today
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    Ok(format!(
        "Workouts: {workouts}. Goal: {goal}. Foods: {foods}. Last Progress: {progress}. \
         {plan}. Logged Today: {logged}. Setup: {}.",
        session.setup_data
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ActivityLevel, MealName, SetupSubmission};
    use crate::store::LibSqlBackend;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn empty_store_context() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let session = SessionState::new("s", ActivityLevel::Active);
        let ctx = build_context(&store, &session).await.unwrap();
        assert_eq!(
            ctx,
            "Workouts: None yet. Goal: Not set. Foods: None set. Last Progress: No progress logged. \
             No plan yet. Logged Today: None. Setup: ActivityLevel: Active."
        );
    }

    #[tokio::test]
    async fn context_reflects_stored_goal_and_meals() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .complete_setup(
                &SetupSubmission {
                    start_weight: 200.0,
                    target_weight: 180.0,
                    target_date: "2027-06-01".into(),
                    current_weight: 200.0,
                    height_cm: 180.0,
                    age_years: 40.0,
                },
                NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            )
            .await
            .unwrap();
        let mut session = SessionState::new("s", ActivityLevel::default());
        session.meals_logged_today.push(MealName::Lunch);

        let ctx = build_context(&store, &session).await.unwrap();
        assert!(ctx.contains("Target: 180 lbs by 2027-06-01"));
        assert!(ctx.contains("Foods: Beef Ribeye, Bacon, Ground Beef (80/20)"));
        assert!(ctx.contains("Logged Today: lunch"));
    }
}
