//! Which meals are overdue at a given hour.

use crate::session::MealName;

/// Meal slots in the order they fall due, with the hour each becomes due and
/// how many of that meal must already be logged to count it as done.
const SCHEDULE: [(&str, u32, MealName, usize); 5] = [
    ("breakfast", 7, MealName::Breakfast, 1),
    ("snack 1", 10, MealName::Snack, 1),
    ("lunch", 12, MealName::Lunch, 1),
    ("snack 2", 15, MealName::Snack, 2),
    ("dinner", 18, MealName::Dinner, 1),
];

/// Meals due by `hour` that are not in `logged`, earliest first.
pub fn missing_meals(hour: u32, logged: &[MealName]) -> Vec<&'static str> {
    SCHEDULE
        .iter()
        .filter(|(_, due, meal, needed)| {
            hour >= *due && logged.iter().filter(|m| *m == meal).count() < *needed
        })
        .map(|(label, ..)| *label)
        .collect()
}
