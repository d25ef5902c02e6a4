//! Session state: the per-conversation record mutated by every turn.

pub mod model;
pub mod state;

pub use model::{
    ActivityLevel, DailyPlan, ExerciseKind, FieldValue, MealName, PlanMeal, Prompt, SetupData,
    SetupField, SetupSubmission, Speaker, TranscriptEntry,
};
pub use state::{Checkpoint, Mode, SessionState, Step};
