//! Workflow state machine: the step sequencer.
//!
//! Given a session, the latest utterance and the current step, decides what
//! to extract, what to persist through the [`FitnessStore`], which step comes
//! next and what to say. Replies are collected during the turn and phrased
//! by the [`ResponseComposer`] once the turn's state is settled.
//!
//! A turn that hits a storage error is rolled back to the state it started
//! from (only the transcript keeps the user's words) and answered with an
//! apology.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::context::build_context;
use super::meals::missing_meals;
use super::rules::{Intent, RuleBook};
use crate::composer::ResponseComposer;
use crate::error::{ParseError, WorkflowError};
use crate::parser::{self, ExerciseEntry, FieldKind, FoodEntry, Parsed};
use crate::session::{
    DailyPlan, ExerciseKind, MealName, Mode, PlanMeal, Prompt, SessionState, SetupField, Step,
};
use crate::store::{ExerciseLogged, FitnessStore, GeneratedPlan, MealRecord};

const CHEAT_FOOD: &str = "Bacanator combo";
const CHEAT_CALORIES: f64 = 960.0;
const MEALS_PER_DAY: usize = 5;
const TALLY_UNAVAILABLE: &str = "an unknown count (I couldn't tally today's logs)";

const STORAGE_APOLOGY: &str = "Ugh, I couldn't save that just now. Nothing changed on my end, \
                               so give it another go in a moment.";

/// A reply waiting to be phrased, with a note describing where we are.
struct Reply {
    prompt: String,
    note: String,
}

/// Replies produced during one turn.
#[derive(Default)]
struct Turn {
    replies: Vec<Reply>,
}

impl Turn {
    fn say(&mut self, prompt: impl Into<String>, note: impl Into<String>) {
        self.replies.push(Reply {
            prompt: prompt.into(),
            note: note.into(),
        });
    }
}

enum Action<'a> {
    Start,
    Message(&'a str),
    SetMode(Mode),
}

/// Where a logged meal's food and calories come from.
enum MealSource {
    Plan,
    Explicit(FoodEntry),
}

/// Re-ask `prompt` after `err`.
fn reprompt(err: &ParseError, prompt: &Prompt) -> String {
    let hint = match err {
        ParseError::NotANumber { .. } => "I need a number for that one.",
        ParseError::EmptyDate => "I need a date for that one.",
        ParseError::NoQuantityFood { .. } => "Try something like '100g Ribeye', or 'nothing'.",
        ParseError::NoExercise { .. } => "Say 'no', or something like '12 laps'.",
    };
    format!("{hint} {}", prompt.text)
}

fn onboarding_note(index: usize, total: usize, prompt: &Prompt) -> String {
    format!(
        "Day 1 setup, question {index} of {total}: expecting {}.",
        prompt.field
    )
}

fn daily_note(position: usize, total: usize, prompt: &Prompt) -> String {
    format!(
        "Daily check-in {position} of {total}: expecting {}.",
        prompt.field
    )
}

pub struct Workflow {
    store: Arc<dyn FitnessStore>,
    composer: Arc<dyn ResponseComposer>,
    clock: Arc<dyn Clock>,
    rules: RuleBook,
}

impl Workflow {
    pub fn new(store: Arc<dyn FitnessStore>, composer: Arc<dyn ResponseComposer>) -> Self {
        Self {
            store,
            composer,
            clock: Arc::new(SystemClock),
            rules: RuleBook::default_rules(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Leave `Initial`: begin onboarding, or greet a returning user.
    /// Does nothing once the session has started.
    pub async fn start(&self, session: &mut SessionState) -> Vec<String> {
        if session.step != Step::Initial {
            return Vec::new();
        }
        self.run(session, Action::Start).await
    }

    /// Process one user utterance and return the replies.
    pub async fn handle_message(&self, session: &mut SessionState, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        session.push_user(text);
        self.run(session, Action::Message(text)).await
    }

    /// Switch between fitness and chat. Entering fitness runs the daily
    /// check-in (or resumes onboarding).
    pub async fn set_mode(&self, session: &mut SessionState, mode: Mode) -> Vec<String> {
        info!(session = %session.id, %mode, "Mode switch");
        self.run(session, Action::SetMode(mode)).await
    }

    async fn run(&self, session: &mut SessionState, action: Action<'_>) -> Vec<String> {
        let checkpoint = session.checkpoint();
        let mut turn = Turn::default();

        let result = match action {
            Action::Start => self.begin(session, &mut turn).await,
            Action::Message(text) => self.dispatch(session, text, &mut turn).await,
            Action::SetMode(mode) => self.switch_mode(session, mode, &mut turn).await,
        };

        match result {
            Ok(()) => {}
            Err(WorkflowError::Storage(err)) => {
                warn!(session = %session.id, error = %err, "Storage failure, rolling back turn");
                session.restore(checkpoint);
                turn.replies.clear();
                turn.say(
                    STORAGE_APOLOGY,
                    "A storage error interrupted this turn; nothing was saved.",
                );
            }
            Err(WorkflowError::Parse(err)) => {
                debug!(session = %session.id, error = %err, "Unparseable answer");
                session.restore(checkpoint);
                turn.replies.clear();
                match session.step.pending_prompts().first() {
                    Some(prompt) => turn.say(reprompt(&err, prompt), format!("Re-asking {}.", prompt.field)),
                    None => turn.say(err.to_string(), ""),
                }
            }
            Err(err @ WorkflowError::IncompletePrecondition { .. }) => {
                turn.say(err.to_string(), "");
            }
        }

        debug!(session = %session.id, step = %session.step, "Turn complete");
        self.finish(session, turn).await
    }

    /// Phrase the turn's replies and append them to the transcript.
    async fn finish(&self, session: &mut SessionState, turn: Turn) -> Vec<String> {
        if turn.replies.is_empty() {
            return Vec::new();
        }

        let mode = session.mode;
        let shared = match mode {
            Mode::Chat => match build_context(self.store.as_ref(), session).await {
                Ok(context) => context,
                Err(e) => {
                    warn!(session = %session.id, error = %e, "Could not build chat context");
                    "No stored context available.".to_string()
                }
            },
            Mode::Fitness => match self.store.active_foods().await {
                Ok(foods) if !foods.is_empty() => format!("Active foods: {}.", foods.join(", ")),
                Ok(_) => "Active foods: meat only (carnivore diet).".to_string(),
                Err(e) => {
                    warn!(session = %session.id, error = %e, "Could not load active foods");
                    String::new()
                }
            },
        };

        let mut out = Vec::with_capacity(turn.replies.len());
        for reply in turn.replies {
            let context = match mode {
                Mode::Chat => shared.clone(),
                Mode::Fitness => format!("{} {shared}", reply.note).trim().to_string(),
            };
            let text = match self.composer.compose(mode, &reply.prompt, &context).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => reply.prompt,
                Err(e) => {
                    warn!(session = %session.id, error = %e, "Composer failed, sending unstyled reply");
                    reply.prompt
                }
            };
            session.push_assistant(text.clone());
            out.push(text);
        }
        out
    }

    async fn dispatch(
        &self,
        session: &mut SessionState,
        text: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        if session.mode == Mode::Chat {
            turn.say(text, "");
            return Ok(());
        }

        match session.step.clone() {
            Step::Initial => self.begin(session, turn).await,
            Step::Onboarding { index, prompts } => {
                self.onboarding_answer(session, index, prompts, text, turn)
                    .await
            }
            Step::DailyCheck { pending, total } => {
                self.daily_answer(session, pending, total, text, turn).await
            }
            Step::MealDetail { meal } => self.meal_detail(session, &meal, text, turn).await,
            Step::Steady => self.steady(session, text, turn).await,
        }
    }

    // ── Onboarding ──────────────────────────────────────────────────

    async fn begin(&self, session: &mut SessionState, turn: &mut Turn) -> Result<(), WorkflowError> {
        let prompts = self.store.fetch_setup_prompts().await?;
        if let Some(first) = prompts.first() {
            info!(session = %session.id, questions = prompts.len(), "Starting onboarding");
            let prompt = format!("Let's get you set up. {}", first.text);
            let note = onboarding_note(1, prompts.len(), first);
            session.step = Step::Onboarding { index: 1, prompts };
            turn.say(prompt, note);
            return Ok(());
        }

        if let Some(profile) = self.store.load_profile().await? {
            session.setup_data.hydrate(&profile);
        }
        session.step = Step::Steady;
        let tally = self.tally().await?;
        turn.say(
            format!("Welcome back! You're at {tally}. What's new?"),
            "Returning user, setup already complete.",
        );
        self.ensure_today_plan(session, turn).await;
        Ok(())
    }

    async fn onboarding_answer(
        &self,
        session: &mut SessionState,
        index: usize,
        prompts: Vec<Prompt>,
        text: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let total = prompts.len();
        let Some(prompt) = prompts.get(index.saturating_sub(1)) else {
            return self.finish_setup(session, prompts, turn).await;
        };

        match SetupField::from_name(&prompt.field) {
            Some(field) => {
                let kind = if field.is_numeric() {
                    FieldKind::Number
                } else {
                    FieldKind::Date
                };
                match parser::parse(kind, text)? {
                    Parsed::Number(n) => {
                        session.setup_data.set_number(field, n);
                        if field == SetupField::StartWeight {
                            session.setup_data.set_number(SetupField::CurrentWeight, n);
                        }
                    }
                    Parsed::Date(d) => session.setup_data.set_text(field, d),
                    _ => {}
                }
                debug!(session = %session.id, %field, "Setup field collected");
            }
            None => warn!(field = %prompt.field, "Unknown setup field, skipping"),
        }

        if let Some(next) = prompts.get(index) {
            let (prompt, note) = (next.text.clone(), onboarding_note(index + 1, total, next));
            session.step = Step::Onboarding {
                index: index + 1,
                prompts,
            };
            turn.say(prompt, note);
            return Ok(());
        }
        self.finish_setup(session, prompts, turn).await
    }

    async fn finish_setup(
        &self,
        session: &mut SessionState,
        mut prompts: Vec<Prompt>,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let submission = match session.setup_data.submission() {
            Ok(submission) => submission,
            Err(missing) => {
                let err = WorkflowError::IncompletePrecondition {
                    missing: missing.iter().map(|f| f.to_string()).collect(),
                };
                warn!(session = %session.id, %err, "Setup incomplete");
                let start = prompts.len() + 1;
                prompts.extend(
                    missing
                        .iter()
                        .map(|f| Prompt::new(f.as_str(), f.fallback_prompt(), f.as_str())),
                );
                let total = prompts.len();
                let first = &prompts[start - 1];
                let (prompt, note) = (
                    format!("{err}. Let's fill those in. {}", first.text),
                    onboarding_note(start, total, first),
                );
                session.step = Step::Onboarding {
                    index: start,
                    prompts,
                };
                turn.say(prompt, note);
                return Ok(());
            }
        };

        let outcome = self
            .store
            .complete_setup(&submission, self.clock.today())
            .await?;
        info!(session = %session.id, "Onboarding complete");
        session.step = Step::Steady;
        turn.say(
            "Setup's done! Your goal is locked in.",
            "Day 1 setup completed.",
        );

        if outcome.seeded_default_foods {
            match self.store.active_foods().await {
                Ok(foods) => turn.say(
                    format!(
                        "I switched on your starter meats: {}. Time to plan your day!",
                        foods.join(", ")
                    ),
                    "Default foods activated.",
                ),
                Err(e) => warn!(session = %session.id, error = %e, "Could not list seeded foods"),
            }
        }

        self.ensure_today_plan(session, turn).await;
        Ok(())
    }

    // ── Mode switching and the daily check-in ───────────────────────

    async fn switch_mode(
        &self,
        session: &mut SessionState,
        mode: Mode,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        session.mode = mode;
        match mode {
            Mode::Chat => {
                turn.say(
                    "Just you and me now. What's on your mind?",
                    "Switching to chat mode.",
                );
                Ok(())
            }
            Mode::Fitness => match session.step.clone() {
                Step::Initial => self.begin(session, turn).await,
                Step::Onboarding { index, prompts } => match prompts.get(index.saturating_sub(1)) {
                    Some(prompt) => {
                        turn.say(
                            format!("Back to your setup. {}", prompt.text),
                            onboarding_note(index, prompts.len(), prompt),
                        );
                        Ok(())
                    }
                    None => self.finish_setup(session, prompts, turn).await,
                },
                _ => self.start_daily_check(session, turn).await,
            },
        }
    }

    async fn start_daily_check(
        &self,
        session: &mut SessionState,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        if !session.setup_data.missing_required().is_empty() {
            if let Some(profile) = self.store.load_profile().await? {
                session.setup_data.hydrate(&profile);
            }
        }

        let prompts = self.store.fetch_daily_prompts(self.clock.today()).await?;
        let Some(first) = prompts.first() else {
            session.step = Step::Steady;
            let tally = self.tally().await?;
            turn.say(
                format!("You're all caught up: {tally}. Any updates?"),
                "Daily check-in: nothing outstanding.",
            );
            self.ensure_today_plan(session, turn).await;
            return Ok(());
        };

        let total = prompts.len();
        info!(session = %session.id, questions = total, "Starting daily check-in");
        let (prompt, note) = (
            format!("Quick check-in first. {}", first.text),
            daily_note(1, total, first),
        );
        session.step = Step::DailyCheck {
            pending: prompts.into(),
            total,
        };
        turn.say(prompt, note);
        Ok(())
    }

    async fn daily_answer(
        &self,
        session: &mut SessionState,
        mut pending: VecDeque<Prompt>,
        total: usize,
        text: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let Some(head) = pending.front().cloned() else {
            return self.close_daily_check(session, turn).await;
        };
        let position = total.saturating_sub(pending.len()) + 1;
        let today = self.clock.today();
        let yesterday = today - Duration::days(1);

        match parser::field_kind(&head.field) {
            Some(kind) => match parser::parse(kind, text)? {
                Parsed::Number(value) => {
                    if let Some(field) = SetupField::from_name(&head.field) {
                        if field == SetupField::CurrentWeight {
                            self.store.record_weight(today, value).await?;
                        }
                        session.setup_data.set_number(field, value);
                    }
                }
                Parsed::Exercise(entry) => {
                    self.log_exercise(session, yesterday, entry).await?;
                }
                Parsed::Food(food) => match parser::meal_slot(&head.field) {
                    Some(meal) => {
                        let calories = self.food_calories(&food).await?;
                        self.store
                            .record_meal(&MealRecord {
                                date: yesterday,
                                food_name: food.food.clone(),
                                quantity_grams: food.quantity_grams,
                                total_calories: calories,
                                meal_name: meal.label().to_string(),
                            })
                            .await?;
                    }
                    None => warn!(field = %head.field, "Food answer for a non-meal field"),
                },
                Parsed::Date(_) | Parsed::NoEntry => {}
            },
            None => warn!(field = %head.field, "Unknown daily field, skipping"),
        }

        pending.pop_front();
        if let Some(next) = pending.front() {
            let (prompt, note) = (next.text.clone(), daily_note(position + 1, total, next));
            session.step = Step::DailyCheck { pending, total };
            turn.say(prompt, note);
            return Ok(());
        }
        self.close_daily_check(session, turn).await
    }

    async fn close_daily_check(
        &self,
        session: &mut SessionState,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        session.step = Step::Steady;
        let tally = self.settled_tally(session).await;
        turn.say(
            format!("Got it all! You've logged {tally}. Any updates?"),
            "Daily check-in complete.",
        );
        self.ensure_today_plan(session, turn).await;
        Ok(())
    }

    // ── Steady state ────────────────────────────────────────────────

    async fn steady(
        &self,
        session: &mut SessionState,
        text: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let normalized = parser::normalize(text);
        let Some((_, intent)) = self.rules.classify(&normalized) else {
            return self.nudge_or_fallback(session, turn).await;
        };

        match intent {
            Intent::AskPlan { meal } => self.answer_plan_question(session, &meal, turn).await,
            Intent::AteMeal {
                meal: Some(meal),
                per_plan: true,
            } => self.log_meal(session, &meal, MealSource::Plan, turn).await,
            Intent::AteMeal {
                meal: Some(meal),
                per_plan: false,
            } => {
                turn.say(
                    format!(
                        "You ate {meal}? What did you have? Give me the details, like '100g Ribeye'."
                    ),
                    "Awaiting meal details: expecting 'quantity food' or 'no'.",
                );
                session.step = Step::MealDetail { meal };
                Ok(())
            }
            Intent::AteMeal { meal: None, .. } => {
                turn.say(
                    "You ate what? Say something like 'I ate breakfast'.",
                    "Steady: meal not named.",
                );
                Ok(())
            }
            Intent::Exercise(entry) => {
                let logged = self
                    .log_exercise(session, self.clock.today(), entry)
                    .await?;
                let tally = self.settled_tally(session).await;
                let what = match entry.kind {
                    ExerciseKind::Laps => format!("{} laps", entry.amount),
                    ExerciseKind::Walking => {
                        format!("a {} minute walk", entry.duration_minutes())
                    }
                };
                turn.say(
                    format!(
                        "Logged {what}, about {} cal. Now at {tally}. What else?",
                        logged.calories_burned
                    ),
                    "Steady: exercise logged.",
                );
                Ok(())
            }
            Intent::Cheat => {
                self.store
                    .record_meal(&MealRecord {
                        date: self.clock.today(),
                        food_name: CHEAT_FOOD.to_string(),
                        quantity_grams: 1,
                        total_calories: CHEAT_CALORIES,
                        meal_name: MealName::Lunch.label().to_string(),
                    })
                    .await?;
                session.mark_meal(MealName::Lunch);
                let tally = self.settled_tally(session).await;
                turn.say(
                    format!("A Bacanator? Logged it as a slip-up. Now at {tally}. Back to meat tomorrow?"),
                    "Steady: off-plan meal logged as a deviation.",
                );
                Ok(())
            }
            Intent::SkipMeal { meal } => self.skip_meal(session, &meal, turn).await,
        }
    }

    async fn nudge_or_fallback(
        &self,
        session: &mut SessionState,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let hour = self.clock.hour();
        let missing = missing_meals(hour, &session.meals_logged_today);
        if hour >= 7 && !missing.is_empty() {
            turn.say(
                format!(
                    "Hey, it's {hour}:00 and you haven't logged {} yet. Did you eat it or skip it?",
                    missing[0]
                ),
                "Steady: overdue meal reminder.",
            );
            return Ok(());
        }

        let tally = self.tally().await?;
        turn.say(
            format!("You're at {tally}. What do you want to update?"),
            "Steady: nothing matched.",
        );
        Ok(())
    }

    async fn answer_plan_question(
        &self,
        session: &mut SessionState,
        word: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        self.ensure_today_plan(session, turn).await;
        let Some(plan) = &session.daily_plan else {
            return Ok(());
        };

        if plan.fasting {
            turn.say(
                format!("Today's a fasting day, so nothing's planned for {word}. Hang in there!"),
                "Steady: fasting day.",
            );
            return Ok(());
        }

        let nth = MealName::parse(word)
            .map(|m| session.logged_count(m).min(m.daily_slots() - 1))
            .unwrap_or(0);
        match plan.entry_for(word, nth) {
            Some(entry) => turn.say(
                format!(
                    "For {}, dig into {} ({}g, {} cal).",
                    entry.meal_name, entry.food_name, entry.quantity_grams, entry.calories
                ),
                "Steady: plan lookup.",
            ),
            None => turn.say(
                format!("There's no {word} in today's plan. Stick to what's on it!"),
                "Steady: plan lookup.",
            ),
        }
        Ok(())
    }

    async fn meal_detail(
        &self,
        session: &mut SessionState,
        meal: &str,
        text: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        if let Some(food) = parser::parse_food(text) {
            session.step = Step::Steady;
            return self
                .log_meal(session, meal, MealSource::Explicit(food), turn)
                .await;
        }
        if parser::is_skip_reply(text) {
            session.step = Step::Steady;
            return self.skip_meal(session, meal, turn).await;
        }
        turn.say(
            format!("What did you eat for {meal}? Say '100g Ribeye', or 'no' if you skipped it."),
            "Awaiting meal details: expecting 'quantity food' or 'no'.",
        );
        Ok(())
    }

    // ── Shared actions ──────────────────────────────────────────────

    async fn log_meal(
        &self,
        session: &mut SessionState,
        word: &str,
        source: MealSource,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let Some(meal) = MealName::parse(word) else {
            turn.say(
                format!("{word}? Pick breakfast, snack, lunch, or dinner."),
                "Meal name not recognised.",
            );
            return Ok(());
        };
        if session.logged_count(meal) > 0 {
            turn.say(
                format!("You already logged {meal} today. Something else?"),
                "Duplicate meal rejected.",
            );
            return Ok(());
        }

        let today = self.clock.today();
        match source {
            MealSource::Plan => {
                let entry = session
                    .daily_plan
                    .as_ref()
                    .filter(|plan| plan.date == today)
                    .and_then(|plan| plan.entry_for(meal.as_str(), session.logged_count(meal)))
                    .cloned();
                let Some(entry) = entry else {
                    turn.say(
                        format!("Nothing's planned for {meal} today. Tell me what you had, like 'I ate {meal}'."),
                        "No plan entry for this meal.",
                    );
                    return Ok(());
                };

                self.store
                    .record_meal(&MealRecord {
                        date: today,
                        food_name: entry.food_name.clone(),
                        quantity_grams: entry.quantity_grams,
                        total_calories: entry.calories as f64,
                        meal_name: meal.label().to_string(),
                    })
                    .await?;
                session.mark_meal(meal);
                let tally = self.settled_tally(session).await;
                turn.say(
                    format!(
                        "Logged your {meal} as planned: {}g {}, {} cal. Now at {tally}. What's next?",
                        entry.quantity_grams, entry.food_name, entry.calories
                    ),
                    "Meal logged from the plan.",
                );
            }
            MealSource::Explicit(food) => {
                let calories = self.food_calories(&food).await?;
                let logged = self
                    .store
                    .record_meal(&MealRecord {
                        date: today,
                        food_name: food.food.clone(),
                        quantity_grams: food.quantity_grams,
                        total_calories: calories,
                        meal_name: meal.label().to_string(),
                    })
                    .await?;
                session.mark_meal(meal);
                let tally = self.settled_tally(session).await;
                if logged.deviation {
                    turn.say(
                        format!(
                            "{} for {meal}? That's off the list, so I logged it as a slip-up. Now at {tally}. What else?",
                            food.food
                        ),
                        "Off-plan meal logged as a deviation.",
                    );
                } else {
                    turn.say(
                        format!(
                            "Logged {}g {} for {meal}, {calories:.0} cal. Now at {tally}. Sticking to the plan?",
                            food.quantity_grams, food.food
                        ),
                        "Meal logged.",
                    );
                }
            }
        }
        debug!(session = %session.id, %meal, "Meal logged");
        Ok(())
    }

    async fn skip_meal(
        &self,
        session: &mut SessionState,
        word: &str,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let Some(meal) = MealName::parse(word) else {
            turn.say(
                "Skip what? Say something like 'I didn't eat lunch'.",
                "Meal name not recognised.",
            );
            return Ok(());
        };
        if !session.mark_skipped(meal) {
            turn.say(
                format!("You already logged {meal} today. Something else?"),
                "Duplicate meal rejected.",
            );
            return Ok(());
        }
        let tally = self.tally().await?;
        turn.say(
            format!("Skipped {meal}? Got it, now at {tally}. What's next?"),
            "Meal marked as skipped.",
        );
        Ok(())
    }

    async fn log_exercise(
        &self,
        session: &SessionState,
        date: NaiveDate,
        entry: ExerciseEntry,
    ) -> Result<ExerciseLogged, WorkflowError> {
        let logged = self
            .store
            .record_exercise(
                date,
                entry.kind,
                entry.duration_minutes(),
                entry.calories_burned(),
            )
            .await?;
        self.store
            .record_progress(
                logged.date,
                entry.laps(),
                logged.calories_burned,
                session.setup_data.number(SetupField::CurrentWeight),
            )
            .await?;
        Ok(logged)
    }

    async fn food_calories(&self, food: &FoodEntry) -> Result<f64, WorkflowError> {
        Ok(self
            .store
            .lookup_food_calories(&food.food)
            .await?
            .map(|per_100g| food.calories(per_100g))
            .unwrap_or(0.0))
    }

    async fn tally(&self) -> Result<String, WorkflowError> {
        let today = self.clock.today();
        let exercises = self.store.count_exercises_on(today).await?;
        let meals = self.store.count_distinct_meals_on(today).await?;
        Ok(format!(
            "{exercises} exercises and {meals}/{MEALS_PER_DAY} meals today"
        ))
    }

    /// Tally for a reply that follows a committed write. A failed count must
    /// not roll the turn back, so it degrades to a placeholder.
    async fn settled_tally(&self, session: &SessionState) -> String {
        match self.tally().await {
            Ok(tally) => tally,
            Err(e) => {
                warn!(session = %session.id, error = %e, "Could not count today's logs");
                TALLY_UNAVAILABLE.to_string()
            }
        }
    }

    // ── Daily plan ──────────────────────────────────────────────────

    /// Generate today's plan unless the session already holds it. Failures
    /// are reported to the user but do not fail the turn.
    async fn ensure_today_plan(&self, session: &mut SessionState, turn: &mut Turn) {
        let today = self.clock.today();
        if session
            .daily_plan
            .as_ref()
            .is_some_and(|plan| plan.date == today)
        {
            return;
        }
        if let Err(e) = self.generate_plan(session, turn).await {
            warn!(session = %session.id, error = %e, "Plan generation failed");
            turn.say(
                "I couldn't put today's plan together just now. Ask me what to eat in a bit and I'll try again.",
                "Plan generation failed.",
            );
        }
    }

    async fn generate_plan(
        &self,
        session: &mut SessionState,
        turn: &mut Turn,
    ) -> Result<(), WorkflowError> {
        let data = &session.setup_data;
        let weight = data
            .number(SetupField::CurrentWeight)
            .or_else(|| data.number(SetupField::StartWeight));
        let (Some(weight), Some(height), Some(age)) = (
            weight,
            data.number(SetupField::HeightCm),
            data.number(SetupField::AgeYears),
        ) else {
            let missing = [
                SetupField::CurrentWeight,
                SetupField::HeightCm,
                SetupField::AgeYears,
            ]
            .into_iter()
            .filter(|f| data.number(*f).is_none())
            .map(|f| f.to_string())
            .collect();
            return Err(WorkflowError::IncompletePrecondition { missing });
        };
        let activity = data.activity_level;

        let today = self.clock.today();
        let yesterday = today - Duration::days(1);
        let baseline = self
            .store
            .compute_baseline_calories(weight, height, age, activity)
            .await?;
        let totals = self.store.daily_totals(yesterday).await?;
        let deficit = self
            .store
            .compute_daily_deficit(weight, totals.burned, totals.intake)
            .await?;
        let target = baseline - deficit;
        let note = format!(
            "Generating today's plan: baseline {baseline} cal, target {target} cal after a {deficit} cal deficit."
        );

        match self.store.generate_daily_plan(today, target).await? {
            GeneratedPlan::Fasting { note: text } => {
                session.daily_plan = Some(DailyPlan::fasting(today, text.clone()));
                session.meals_logged_today.clear();
                let tally = self.settled_tally(session).await;
                turn.say(format!("{text} You're at {tally}. Any updates?"), note);
            }
            GeneratedPlan::Meals { entries, .. } if entries.is_empty() => {
                turn.say(
                    "There are no active foods to build a plan from yet, so today is freestyle. Log what you eat and I'll keep count.",
                    note,
                );
                return Ok(());
            }
            GeneratedPlan::Meals { allowance, entries } => {
                let total: i64 = entries.iter().map(|e| e.calories).sum();
                let mut text = format!(
                    "Here's your plan for today ({total} cal total, aiming for {allowance} cal):"
                );
                for e in &entries {
                    text.push_str(&format!(
                        "\n{}: {} ({}g, {} cal)",
                        e.meal_name, e.food_name, e.quantity_grams, e.calories
                    ));
                }
                let meals = entries
                    .into_iter()
                    .enumerate()
                    .map(|(index, e)| PlanMeal {
                        index,
                        meal_name: e.meal_name,
                        food_name: e.food_name,
                        quantity_grams: e.quantity_grams,
                        calories: e.calories,
                    })
                    .collect();
                session.daily_plan = Some(DailyPlan {
                    date: today,
                    text: text.clone(),
                    meals,
                    fasting: false,
                });
                session.meals_logged_today.clear();
                let tally = self.settled_tally(session).await;
                turn.say(format!("{text}\nYou're at {tally}. Any updates?"), note);
            }
        }

        info!(session = %session.id, %today, baseline, deficit, target, "Daily plan ready");
        Ok(())
    }
}
