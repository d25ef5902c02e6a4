//! Session state machine data: mode, step and the per-session record.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::model::{
    ActivityLevel, DailyPlan, MealName, Prompt, SetupData, Speaker, TranscriptEntry,
};

/// Which sub-machine is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Fitness,
    Chat,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fitness => write!(f, "fitness"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fitness" => Ok(Self::Fitness),
            "chat" => Ok(Self::Chat),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Where the conversation is.
///
/// Each variant owns the data that is only meaningful while it is active:
/// the onboarding prompt list, the daily-check queue, the meal awaiting
/// detail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Nothing asked yet.
    #[default]
    Initial,
    /// Collecting setup fields; `index` is 1-based into `prompts`.
    Onboarding { index: usize, prompts: Vec<Prompt> },
    /// Working through today's outstanding check-in questions.
    DailyCheck {
        pending: VecDeque<Prompt>,
        total: usize,
    },
    /// Waiting for the quantity/food of a meal the user says they ate.
    MealDetail { meal: String },
    /// Free interaction.
    Steady,
}

impl Step {
    /// Legacy numeric step code: 0, 1..N, 10, 13, 100.
    pub fn code(&self) -> u32 {
        match self {
            Self::Initial => 0,
            Self::Onboarding { index, .. } => *index as u32,
            Self::DailyCheck { .. } => 10,
            Self::MealDetail { .. } => 13,
            Self::Steady => 100,
        }
    }

    /// Prompts still to be asked, front first.
    pub fn pending_prompts(&self) -> Vec<&Prompt> {
        match self {
            Self::Onboarding { index, prompts } => {
                prompts.iter().skip(index.saturating_sub(1)).collect()
            }
            Self::DailyCheck { pending, .. } => pending.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn pending_meal(&self) -> Option<&str> {
        match self {
            Self::MealDetail { meal } => Some(meal),
            _ => None,
        }
    }

    pub fn is_onboarding(&self) -> bool {
        matches!(self, Self::Initial | Self::Onboarding { .. })
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Onboarding { index, prompts } => {
                write!(f, "onboarding {index}/{}", prompts.len())
            }
            Self::DailyCheck { pending, total } => {
                write!(f, "daily_check {}/{total}", total - pending.len() + 1)
            }
            Self::MealDetail { meal } => write!(f, "meal_detail({meal})"),
            Self::Steady => write!(f, "steady"),
        }
    }
}

/// Everything a failed turn must roll back (all but the transcript).
#[derive(Debug, Clone)]
pub struct Checkpoint {
    mode: Mode,
    step: Step,
    setup_data: SetupData,
    daily_plan: Option<DailyPlan>,
    meals_logged_today: Vec<MealName>,
}

/// One conversation's progress.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub id: String,
    pub mode: Mode,
    pub step: Step,
    pub setup_data: SetupData,
    pub daily_plan: Option<DailyPlan>,
    pub meals_logged_today: Vec<MealName>,
    pub transcript: Vec<TranscriptEntry>,
}

impl SessionState {
    pub fn new(id: impl Into<String>, activity_level: ActivityLevel) -> Self {
        Self {
            id: id.into(),
            mode: Mode::default(),
            step: Step::default(),
            setup_data: SetupData::with_activity_level(activity_level),
            daily_plan: None,
            meals_logged_today: Vec::new(),
            transcript: Vec::new(),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::Assistant,
            text: text.into(),
        });
    }

    /// How many times `meal` was logged (or skipped) today.
    pub fn logged_count(&self, meal: MealName) -> usize {
        self.meals_logged_today.iter().filter(|m| **m == meal).count()
    }

    /// Record an eaten meal. Each meal name is logged once per day, so this
    /// returns false when `meal` is already handled.
    pub fn mark_meal(&mut self, meal: MealName) -> bool {
        if self.logged_count(meal) > 0 {
            return false;
        }
        self.meals_logged_today.push(meal);
        true
    }

    /// Record a skipped meal. A skip may fill any open schedule slot, which
    /// is how a second snack gets cleared.
    pub fn mark_skipped(&mut self, meal: MealName) -> bool {
        if self.logged_count(meal) >= meal.daily_slots() {
            return false;
        }
        self.meals_logged_today.push(meal);
        true
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            mode: self.mode,
            step: self.step.clone(),
            setup_data: self.setup_data.clone(),
            daily_plan: self.daily_plan.clone(),
            meals_logged_today: self.meals_logged_today.clone(),
        }
    }

    /// Roll back to `checkpoint`, keeping the transcript.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.mode = checkpoint.mode;
        self.step = checkpoint.step;
        self.setup_data = checkpoint.setup_data;
        self.daily_plan = checkpoint.daily_plan;
        self.meals_logged_today = checkpoint.meals_logged_today;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts(n: usize) -> Vec<Prompt> {
        (1..=n)
            .map(|i| Prompt::new(format!("L{i}"), format!("Q{i}?"), format!("F{i}")))
            .collect()
    }

    #[test]
    fn step_codes_match_legacy_numbers() {
        assert_eq!(Step::Initial.code(), 0);
        assert_eq!(
            Step::Onboarding {
                index: 3,
                prompts: prompts(6)
            }
            .code(),
            3
        );
        assert_eq!(
            Step::DailyCheck {
                pending: VecDeque::new(),
                total: 0
            }
            .code(),
            10
        );
        assert_eq!(
            Step::MealDetail {
                meal: "lunch".into()
            }
            .code(),
            13
        );
        assert_eq!(Step::Steady.code(), 100);
    }

    #[test]
    fn pending_meal_only_in_meal_detail() {
        assert_eq!(
            Step::MealDetail {
                meal: "lunch".into()
            }
            .pending_meal(),
            Some("lunch")
        );
        assert_eq!(Step::Steady.pending_meal(), None);
    }

    #[test]
    fn onboarding_pending_prompts_start_at_index() {
        let step = Step::Onboarding {
            index: 5,
            prompts: prompts(6),
        };
        let pending = step.pending_prompts();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].field, "F5");
    }

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!("Chat".parse::<Mode>(), Ok(Mode::Chat));
        assert_eq!(Mode::Fitness.to_string(), "fitness");
        assert!("gym".parse::<Mode>().is_err());
    }

    #[test]
    fn mark_meal_rejects_repeats() {
        let mut s = SessionState::new("t", ActivityLevel::default());
        assert!(s.mark_meal(MealName::Lunch));
        assert!(!s.mark_meal(MealName::Lunch));
        assert!(s.mark_meal(MealName::Snack));
        assert!(!s.mark_meal(MealName::Snack));
        assert_eq!(s.logged_count(MealName::Snack), 1);
    }

    #[test]
    fn skip_fills_the_second_snack_slot() {
        let mut s = SessionState::new("t", ActivityLevel::default());
        assert!(s.mark_meal(MealName::Snack));
        assert!(s.mark_skipped(MealName::Snack));
        assert!(!s.mark_skipped(MealName::Snack));
        assert!(s.mark_skipped(MealName::Dinner));
        assert!(!s.mark_skipped(MealName::Dinner));
        assert_eq!(s.logged_count(MealName::Snack), 2);
    }

    #[test]
    fn restore_keeps_transcript() {
        let mut s = SessionState::new("t", ActivityLevel::default());
        let cp = s.checkpoint();
        s.step = Step::Steady;
        s.meals_logged_today.push(MealName::Dinner);
        s.push_user("hi");
        s.restore(cp);
        assert_eq!(s.step, Step::Initial);
        assert!(s.meals_logged_today.is_empty());
        assert_eq!(s.transcript.len(), 1);
    }
}
