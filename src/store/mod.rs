//! Persistence layer: libSQL-backed storage for goals, logs and plans.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    DailyTotals, ExerciseLogged, ExerciseSummary, FitnessStore, GeneratedPlan, GoalSummary,
    MealLogged, MealRecord, PlanEntry, ProgressSummary, SetupOutcome,
};
