use chrono::NaiveDate;
use serde::Serialize;
use tend_core::models::{Cadence, Habit};

use crate::commands::common::{
    format_habit_lines, normalize_title, resolve_record, short_id, today, AppState,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HabitSummary<'a> {
    #[serde(flatten)]
    habit: &'a Habit,
    streak: u32,
    done_today: bool,
}

pub fn run_habit_add(app: &AppState, name_parts: &[String], cadence: Cadence) -> Result<(), CliError> {
    let name = normalize_title(name_parts).ok_or(CliError::EmptyTitle)?;
    let habit = app.stores.habits.mutate(Habit::new(name, cadence));
    println!("{}", habit.id);
    Ok(())
}

pub fn run_habit_check(app: &AppState, id: &str, on: Option<NaiveDate>) -> Result<(), CliError> {
    let habit = resolve_record(&app.stores.habits, id)?;
    let today = today();
    let day = on.unwrap_or(today);

    let updated = app
        .stores
        .habits
        .update(&habit.id, |habit| habit.check_in(day))
        .ok_or_else(|| CliError::NotFound {
            domain: "habits".to_string(),
            query: habit.id.clone(),
        })?;
    println!(
        "Checked in {} on {day} (streak {})",
        short_id(&updated.id),
        updated.streak(today)
    );
    Ok(())
}

pub fn active_habits(app: &AppState) -> Vec<Habit> {
    let mut habits: Vec<Habit> = app
        .stores
        .habits
        .get_all()
        .into_iter()
        .filter(|habit| !habit.is_archived)
        .collect();
    habits.sort_by(|left, right| left.created_at.cmp(&right.created_at));
    habits
}

pub fn run_habit_list(app: &AppState, json: bool) -> Result<(), CliError> {
    let habits = active_habits(app);
    let today = today();

    if json {
        let summaries: Vec<HabitSummary<'_>> = habits
            .iter()
            .map(|habit| HabitSummary {
                habit,
                streak: habit.streak(today),
                done_today: habit.is_done_on(today),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if habits.is_empty() {
        println!("No habits.");
        return Ok(());
    }
    for line in format_habit_lines(&habits, today) {
        println!("{line}");
    }
    Ok(())
}
