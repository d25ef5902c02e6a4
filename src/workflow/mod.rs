//! Conversation workflow: steady-state rules, the daily check-in, and the
//! step sequencer that ties them to storage and the composer.

pub mod clock;
pub mod context;
pub mod engine;
pub mod meals;
pub mod rules;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::build_context;
pub use engine::Workflow;
pub use meals::missing_meals;
pub use rules::{Intent, RuleBook};
