use tend_core::models::{Preferences, Transaction, TransactionKind};
use tend_core::util::normalize_text_option;

use crate::commands::common::AppState;
use crate::error::CliError;

pub fn validate_amount(amount: f64) -> Result<f64, CliError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(CliError::InvalidAmount(format!(
            "{amount} (must be a positive number)"
        )))
    }
}

pub fn run_spend(
    app: &AppState,
    amount: f64,
    category: &str,
    income: bool,
    note: Option<String>,
) -> Result<(), CliError> {
    let amount = validate_amount(amount)?;
    let category = normalize_text_option(Some(category.to_string()))
        .ok_or(CliError::EmptyCategory)?;
    let kind = if income {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    };

    let mut transaction = Transaction::new(amount, kind, category);
    transaction.note = normalize_text_option(note);
    let transaction = app.stores.transactions.mutate(transaction);

    let preferences = Preferences::load(&app.local);
    println!(
        "{}  {} {}",
        transaction.id,
        preferences.format_amount(transaction.signed_amount()),
        transaction.category
    );
    Ok(())
}
