//! Personal finance records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::{impl_sync_record, Domain};
use super::timestamp::deserialize_lenient;
use crate::util::new_record_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

/// A single income or expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    #[serde(default)]
    pub kind: TransactionKind,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Transaction, Domain::Transactions);

impl Transaction {
    #[must_use]
    pub fn new(amount: f64, kind: TransactionKind, category: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            amount,
            kind,
            category: category.into(),
            note: None,
            occurred_at: now,
            is_deleted: false,
            updated_at: Some(now),
        }
    }

    /// Amount with sign applied: income positive, expense negative.
    #[must_use]
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DebtDirection {
    OwedToMe,
    IOwe,
}

/// Money lent or borrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: String,
    pub counterparty: String,
    pub amount: f64,
    pub direction: DebtDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settled: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Debt, Domain::Debts);

impl Debt {
    #[must_use]
    pub fn new(counterparty: impl Into<String>, amount: f64, direction: DebtDirection) -> Self {
        Self {
            id: new_record_id(),
            counterparty: counterparty.into(),
            amount,
            direction,
            due_at: None,
            settled: false,
            updated_at: Some(Utc::now()),
        }
    }
}

/// A savings goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub saved_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Goal, Domain::Goals);

impl Goal {
    #[must_use]
    pub fn new(name: impl Into<String>, target_amount: f64) -> Self {
        Self {
            id: new_record_id(),
            name: name.into(),
            target_amount,
            saved_amount: 0.0,
            deadline: None,
            updated_at: Some(Utc::now()),
        }
    }

    /// Fraction of the target saved so far, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 1.0;
        }
        (self.saved_amount / self.target_amount).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

/// A recurring paid subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub cycle: BillingCycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_billing_on: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Subscription, Domain::Subscriptions);

const fn default_true() -> bool {
    true
}

impl Subscription {
    #[must_use]
    pub fn new(name: impl Into<String>, amount: f64, cycle: BillingCycle) -> Self {
        Self {
            id: new_record_id(),
            name: name.into(),
            amount,
            cycle,
            next_billing_on: None,
            is_active: true,
            updated_at: Some(Utc::now()),
        }
    }

    /// Cost normalized to one month.
    #[must_use]
    pub fn monthly_cost(&self) -> f64 {
        match self.cycle {
            BillingCycle::Monthly => self.amount,
            BillingCycle::Yearly => self.amount / 12.0,
        }
    }
}

/// A tracked investment position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub units: f64,
    pub cost_basis: f64,
    pub current_value: f64,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Investment, Domain::Investments);

impl Investment {
    #[must_use]
    pub fn new(name: impl Into<String>, units: f64, cost_basis: f64) -> Self {
        Self {
            id: new_record_id(),
            name: name.into(),
            symbol: None,
            units,
            cost_basis,
            current_value: cost_basis,
            updated_at: Some(Utc::now()),
        }
    }

    /// Unrealized gain (negative for a loss).
    #[must_use]
    pub fn gain(&self) -> f64 {
        self.current_value - self.cost_basis
    }
}
